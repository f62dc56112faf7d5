//! # Span
//!
//! A [`Span`] records one unit of work of a trace: its operation name, timing,
//! tags, logs and references to other spans. Its [`SpanContext`] identifies
//! it and carries the trace's sampling flags and baggage.
//!
//! Spans are safe to share between threads: every mutation goes through a
//! per-span lock. Once a span is finished further calls to
//! [`set_tag`](Span::set_tag), [`set_operation_name`](Span::set_operation_name)
//! and [`log`](Span::log) are ignored, and a snapshot of its data is handed to
//! the tracer's reporter as a [`FinishedSpan`].
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use super::{
    LogRecord, Reference, SpanContext, Tag, TagValue, TraceFlags, Tracer,
    SAMPLING_PRIORITY_TAG_KEY,
};

#[derive(Debug)]
struct SpanData {
    context: SpanContext,
    operation_name: String,
    start_time: SystemTime,
    start_instant: Instant,
    /// Zero until the span is finished.
    duration: Duration,
    tags: Vec<Tag>,
    logs: Vec<LogRecord>,
}

impl SpanData {
    fn is_finished(&self) -> bool {
        !self.duration.is_zero()
    }
}

/// Single operation within a trace.
///
/// Dropping an unfinished span finishes it.
#[derive(Debug)]
pub struct Span {
    data: Mutex<SpanData>,
    references: Vec<Reference>,
    tracer: Tracer,
}

/// Options applied when finishing a [`Span`].
#[derive(Clone, Debug, Default)]
pub struct FinishSpanOptions {
    /// Monotonic finish time. Defaults to now.
    pub finish_instant: Option<Instant>,
    /// Log records appended to the span when it finishes, whether or not it
    /// is sampled.
    pub log_records: Vec<LogRecord>,
}

impl Span {
    pub(crate) fn new(
        tracer: Tracer,
        context: SpanContext,
        operation_name: String,
        start_time: SystemTime,
        start_instant: Instant,
        tags: Vec<Tag>,
        references: Vec<Reference>,
    ) -> Self {
        Span {
            data: Mutex::new(SpanData {
                context,
                operation_name,
                start_time,
                start_instant,
                duration: Duration::ZERO,
                tags,
                logs: Vec::new(),
            }),
            references,
            tracer,
        }
    }

    /// Operate on a shared reference to span data
    fn with_data_ref<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&SpanData) -> T,
    {
        self.data.lock().ok().map(|guard| f(&guard))
    }

    /// Operate on a mutable reference to span data
    fn with_data<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanData) -> T,
    {
        self.data.lock().ok().map(|mut guard| f(&mut guard))
    }

    /// A copy of the span's current context.
    pub fn context(&self) -> SpanContext {
        self.with_data_ref(|data| data.context.clone())
            .unwrap_or_default()
    }

    /// The operation name.
    pub fn operation_name(&self) -> String {
        self.with_data_ref(|data| data.operation_name.clone())
            .unwrap_or_default()
    }

    /// Rename the operation. Ignored once the span is finished.
    pub fn set_operation_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.with_data(|data| {
            if !data.is_finished() {
                data.operation_name = name;
            }
        });
    }

    /// Add a tag. Ignored once the span is finished or if it is not sampled.
    ///
    /// The `sampling.priority` tag is not recorded. Instead a positive
    /// priority marks the trace as sampled and debug from this span on, and a
    /// non-positive one clears the sampled flag.
    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<TagValue>) {
        let key = key.into();
        let value = value.into();
        self.with_data(|data| {
            if data.is_finished() {
                return;
            }
            if key == SAMPLING_PRIORITY_TAG_KEY {
                let flags = data.context.flags();
                let flags = if value.as_sampling_priority() {
                    flags | TraceFlags::SAMPLED | TraceFlags::DEBUG
                } else {
                    flags & !TraceFlags::SAMPLED
                };
                data.context = data.context.with_flags(flags);
                return;
            }
            if data.context.is_sampled() {
                data.tags.push(Tag { key, value });
            }
        });
    }

    /// Record fields at the current time. Ignored once the span is finished
    /// or if it is not sampled.
    pub fn log(&self, fields: Vec<Tag>) {
        self.log_at(SystemTime::now(), fields);
    }

    /// Record fields at `timestamp`. Ignored once the span is finished or if
    /// it is not sampled.
    pub fn log_at(&self, timestamp: SystemTime, fields: Vec<Tag>) {
        self.with_data(|data| {
            if !data.is_finished() && data.context.is_sampled() {
                data.logs.push(LogRecord::new(timestamp, fields));
            }
        });
    }

    /// Set a baggage item, propagated to every descendant of this span.
    ///
    /// The tracer's baggage restrictions may reject the key or truncate the
    /// value. Sampled spans record the attempt as a log.
    pub fn set_baggage_item(&self, key: &str, value: &str) {
        let setter = self.tracer.baggage_setter();
        let service_name = self.tracer.service_name();
        self.with_data(|data| {
            let mut fields = None;
            let context = setter.set_baggage(service_name, &data.context, key, value, |logged| {
                fields = Some(logged)
            });
            data.context = context;
            if let Some(fields) = fields.filter(|_| !data.is_finished()) {
                data.logs.push(LogRecord::new(SystemTime::now(), fields));
            }
        });
    }

    /// The value of a baggage item, if set.
    pub fn baggage_item(&self, key: &str) -> Option<String> {
        self.with_data_ref(|data| data.context.baggage_item(key).map(str::to_string))
            .flatten()
    }

    /// Finish the span now.
    pub fn finish(&self) {
        self.finish_with_options(FinishSpanOptions::default());
    }

    /// Finish the span. Only the first call has any effect.
    ///
    /// Every finished span is counted by the tracer; sampled ones are handed
    /// to its reporter.
    pub fn finish_with_options(&self, options: FinishSpanOptions) {
        let finish_instant = options.finish_instant.unwrap_or_else(Instant::now);
        let finished = self.with_data(|data| {
            if data.is_finished() {
                return None;
            }
            data.duration = finish_instant
                .saturating_duration_since(data.start_instant)
                .max(Duration::from_nanos(1));
            data.logs.extend(options.log_records);
            Some(FinishedSpan {
                context: data.context.clone(),
                operation_name: data.operation_name.clone(),
                start_time: data.start_time,
                duration: data.duration,
                tags: data.tags.clone(),
                logs: data.logs.clone(),
                references: self.references.clone(),
                process: self.tracer.process(),
            })
        });

        if let Some(span) = finished.flatten() {
            self.tracer.report_span(span);
        }
    }

    /// Whether the span has been finished.
    pub fn is_finished(&self) -> bool {
        self.with_data_ref(SpanData::is_finished).unwrap_or(true)
    }

    /// Wall-clock start time.
    pub fn start_time(&self) -> SystemTime {
        self.with_data_ref(|data| data.start_time)
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// The span's duration, zero while it is not finished.
    pub fn duration(&self) -> Duration {
        self.with_data_ref(|data| data.duration).unwrap_or_default()
    }

    /// The recorded tags.
    pub fn tags(&self) -> Vec<Tag> {
        self.with_data_ref(|data| data.tags.clone()).unwrap_or_default()
    }

    /// The recorded logs.
    pub fn logs(&self) -> Vec<LogRecord> {
        self.with_data_ref(|data| data.logs.clone()).unwrap_or_default()
    }

    /// References to other spans, excluding any self reference.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The tracer that started this span.
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Service description attached to every reported span.
#[derive(Clone, Debug, PartialEq)]
pub struct Process {
    /// Name of the traced service.
    pub service_name: String,
    /// Tracer-level tags such as the client version and hostname.
    pub tags: Vec<Tag>,
}

/// Snapshot of a finished span, handed to a [`Reporter`](super::Reporter).
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedSpan {
    /// Final context of the span.
    pub context: SpanContext,
    /// The operation name.
    pub operation_name: String,
    /// Wall-clock start time.
    pub start_time: SystemTime,
    /// Duration, at least one nanosecond.
    pub duration: Duration,
    /// Tags, including the sampler tags of root spans.
    pub tags: Vec<Tag>,
    /// Logs.
    pub logs: Vec<LogRecord>,
    /// References to other spans.
    pub references: Vec<Reference>,
    /// The process that produced the span.
    pub process: Arc<Process>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{ConstSampler, InMemoryReporter, StartSpanOptions, TraceId};
    use std::thread;

    fn tracer(sampled: bool) -> (Tracer, InMemoryReporter) {
        let reporter = InMemoryReporter::new();
        let tracer = Tracer::builder("test-service")
            .with_sampler(ConstSampler::new(sampled))
            .with_reporter(reporter.clone())
            .build()
            .unwrap();
        (tracer, reporter)
    }

    fn start(tracer: &Tracer) -> Span {
        tracer.start_span("op", StartSpanOptions::default()).unwrap()
    }

    #[test]
    fn finished_span_ignores_mutations() {
        let (tracer, reporter) = tracer(true);
        let span = start(&tracer);
        span.set_tag("before", 1);
        span.finish();
        let duration = span.duration();

        span.set_tag("after", 2);
        span.set_operation_name("renamed");
        span.log(vec![Tag::new("event", "late")]);
        span.finish();

        assert!(span.is_finished());
        assert!(duration > Duration::ZERO);
        assert_eq!(span.duration(), duration);
        assert_eq!(span.operation_name(), "op");
        assert!(span.tags().iter().all(|tag| tag.key != "after"));
        assert!(span.logs().is_empty());
        assert_eq!(reporter.get_finished_spans().len(), 1);
    }

    #[test]
    fn unsampled_span_drops_tags_and_logs() {
        let (tracer, reporter) = tracer(false);
        let span = start(&tracer);
        span.set_tag("key", "value");
        span.log(vec![Tag::new("event", "e")]);

        assert!(span.tags().is_empty());
        assert!(span.logs().is_empty());
        span.finish();
        assert!(reporter.get_finished_spans().is_empty());
    }

    #[test]
    fn sampling_priority_upgrades_unsampled_span() {
        let (tracer, reporter) = tracer(false);
        let span = start(&tracer);
        span.set_tag(SAMPLING_PRIORITY_TAG_KEY, 1);

        let context = span.context();
        assert!(context.is_sampled());
        assert!(context.is_debug());
        assert!(span.tags().is_empty());

        span.finish();
        assert_eq!(reporter.get_finished_spans().len(), 1);
    }

    #[test]
    fn zero_sampling_priority_downgrades_span() {
        let (tracer, _) = tracer(true);
        let span = start(&tracer);
        span.set_tag(SAMPLING_PRIORITY_TAG_KEY, "0");
        assert!(!span.context().is_sampled());
    }

    #[test]
    fn finish_enforces_minimum_duration() {
        let (tracer, reporter) = tracer(true);
        let start_instant = Instant::now();
        let span = tracer
            .start_span("op", StartSpanOptions::default().with_start_instant(start_instant))
            .unwrap();
        span.finish_with_options(FinishSpanOptions {
            finish_instant: Some(start_instant),
            log_records: vec![LogRecord::new(SystemTime::now(), vec![Tag::new("event", "done")])],
        });

        assert_eq!(span.duration(), Duration::from_nanos(1));
        let finished = reporter.get_finished_spans();
        assert_eq!(finished[0].duration, Duration::from_nanos(1));
        assert_eq!(finished[0].logs.len(), 1);
        assert_eq!(finished[0].process.service_name, "test-service");
    }

    #[test]
    fn drop_finishes_span() {
        let (tracer, reporter) = tracer(true);
        drop(start(&tracer));
        assert_eq!(reporter.get_finished_spans().len(), 1);
    }

    #[test]
    fn baggage_is_copied_on_write() {
        let (tracer, _) = tracer(true);
        let span = start(&tracer);
        let before = span.context();
        span.set_baggage_item("user", "alice");

        assert_eq!(before.baggage_item("user"), None);
        assert_eq!(span.baggage_item("user").as_deref(), Some("alice"));
        assert_eq!(span.logs().len(), 1);
        assert_eq!(span.context().trace_id(), before.trace_id());
    }

    #[test]
    fn concurrent_set_tag_keeps_every_tag() {
        let (tracer, reporter) = tracer(true);
        let span = Arc::new(start(&tracer));

        let handles = (0..8)
            .map(|thread_index| {
                let span = span.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        span.set_tag(format!("t{thread_index}-{i}"), i);
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        // root span tags also carry the sampler decision
        let recorded = span.tags().len();
        assert_eq!(recorded, 800 + 2);
        span.finish();
        assert_eq!(reporter.get_finished_spans()[0].tags.len(), recorded);
        assert_ne!(span.context().trace_id(), TraceId::INVALID);
    }
}
