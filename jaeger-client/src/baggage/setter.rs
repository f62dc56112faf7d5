use std::sync::Arc;

use super::RestrictionManager;
use crate::metrics::Metrics;
use crate::trace::{SpanContext, Tag};

/// Applies baggage restrictions when a baggage item is set on a span.
///
/// A denied key leaves the context untouched. An allowed value longer than
/// the restriction's limit is truncated. When the span is sampled, every
/// attempt is recorded as a span log with the fields `event=baggage`, `key`
/// and `value`, plus `override`, `truncated` or `invalid` when they apply.
#[derive(Clone, Debug)]
pub struct BaggageSetter {
    restriction_manager: Arc<dyn RestrictionManager>,
    metrics: Arc<Metrics>,
}

impl BaggageSetter {
    /// Create a setter consulting `restriction_manager`.
    pub fn new(restriction_manager: Arc<dyn RestrictionManager>, metrics: Arc<Metrics>) -> Self {
        BaggageSetter {
            restriction_manager,
            metrics,
        }
    }

    /// Returns `context` with `key` set to `value`, as far as the restriction
    /// of `service` allows. `log` receives the span log fields and is only
    /// called for sampled contexts.
    pub fn set_baggage<F>(
        &self,
        service: &str,
        context: &SpanContext,
        key: &str,
        value: &str,
        log: F,
    ) -> SpanContext
    where
        F: FnOnce(Vec<Tag>),
    {
        let restriction = self.restriction_manager.get_restriction(service, key);
        if !restriction.key_allowed() {
            if context.is_sampled() {
                log(baggage_log_fields(key, value, false, false, true));
            }
            self.metrics.baggage_update_failure().inc(1);
            return context.clone();
        }

        let truncated_value = truncate(value, restriction.max_value_length());
        let truncated = truncated_value.len() < value.len();
        if truncated {
            self.metrics.baggage_truncate().inc(1);
        }

        let overridden = context
            .baggage_item(key)
            .is_some_and(|previous| !previous.is_empty());
        let updated = context.with_baggage_item(key, truncated_value);
        if context.is_sampled() {
            log(baggage_log_fields(key, truncated_value, overridden, truncated, false));
        }
        self.metrics.baggage_update_success().inc(1);
        updated
    }
}

fn baggage_log_fields(
    key: &str,
    value: &str,
    overridden: bool,
    truncated: bool,
    invalid: bool,
) -> Vec<Tag> {
    let mut fields = vec![
        Tag::new("event", "baggage"),
        Tag::new("key", key),
        Tag::new("value", value),
    ];
    if overridden {
        fields.push(Tag::new("override", "true"));
    }
    if truncated {
        fields.push(Tag::new("truncated", "true"));
    }
    if invalid {
        fields.push(Tag::new("invalid", "true"));
    }
    fields
}

/// The longest prefix of `value` of at most `max_len` bytes ending on a char
/// boundary.
fn truncate(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baggage::{DefaultRestrictionManager, Restriction};
    use crate::metrics::{InMemoryStatsReporter, StatsFactoryImpl};
    use crate::trace::{TraceFlags, TraceId};
    use std::collections::HashMap;

    #[derive(Debug)]
    struct DenyKey(&'static str);

    impl RestrictionManager for DenyKey {
        fn get_restriction(&self, _service: &str, key: &str) -> Restriction {
            if key == self.0 {
                Restriction::denied()
            } else {
                Restriction::new(true, 5)
            }
        }
    }

    fn setter(manager: impl RestrictionManager + 'static) -> (BaggageSetter, Arc<InMemoryStatsReporter>) {
        let reporter = Arc::new(InMemoryStatsReporter::new());
        let metrics = Arc::new(Metrics::new(&StatsFactoryImpl::new(reporter.clone())));
        (BaggageSetter::new(Arc::new(manager), metrics), reporter)
    }

    fn context(flags: TraceFlags) -> SpanContext {
        SpanContext::new(TraceId::new(0, 1), 1, 0, flags, HashMap::new())
    }

    fn field<'a>(fields: &'a [Tag], key: &str) -> Option<&'a str> {
        fields.iter().find(|tag| tag.key == key).map(|tag| match &tag.value {
            crate::trace::TagValue::String(s) => s.as_str(),
            _ => "",
        })
    }

    #[test]
    fn denied_key_is_not_set() {
        let (setter, stats) = setter(DenyKey("secret"));
        let mut logged = None;
        let updated = setter.set_baggage("svc", &context(TraceFlags::SAMPLED), "secret", "v", |fields| {
            logged = Some(fields)
        });

        assert_eq!(updated.baggage_item("secret"), None);
        let fields = logged.unwrap();
        assert_eq!(field(&fields, "invalid"), Some("true"));
        assert_eq!(field(&fields, "value"), Some("v"));
        assert_eq!(stats.counter_value("jaeger.baggage-update.result=err"), 1);
    }

    #[test]
    fn long_values_are_truncated() {
        let (setter, stats) = setter(DenyKey("secret"));
        let mut logged = None;
        let updated = setter.set_baggage("svc", &context(TraceFlags::SAMPLED), "user", "abcdefgh", |fields| {
            logged = Some(fields)
        });

        assert_eq!(updated.baggage_item("user"), Some("abcde"));
        let fields = logged.unwrap();
        assert_eq!(field(&fields, "truncated"), Some("true"));
        assert_eq!(field(&fields, "override"), None);
        assert_eq!(stats.counter_value("jaeger.baggage-truncate"), 1);
        assert_eq!(stats.counter_value("jaeger.baggage-update.result=ok"), 1);
    }

    #[test]
    fn replacing_a_value_is_an_override() {
        let (setter, _) = setter(DefaultRestrictionManager::default());
        let original = context(TraceFlags::SAMPLED).with_baggage_item("user", "alice");
        let mut logged = None;
        let updated = setter.set_baggage("svc", &original, "user", "bob", |fields| logged = Some(fields));

        assert_eq!(updated.baggage_item("user"), Some("bob"));
        assert_eq!(original.baggage_item("user"), Some("alice"));
        assert_eq!(field(&logged.unwrap(), "override"), Some("true"));
    }

    #[test]
    fn unsampled_spans_are_not_logged() {
        let (setter, stats) = setter(DefaultRestrictionManager::default());
        let updated = setter.set_baggage("svc", &context(TraceFlags::NOT_SAMPLED), "user", "alice", |_| {
            panic!("unsampled span logged")
        });

        assert_eq!(updated.baggage_item("user"), Some("alice"));
        assert_eq!(stats.counter_value("jaeger.baggage-update.result=ok"), 1);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("héllo", 3), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
