//! # Tracer
//!
//! The [`Tracer`] starts spans. For every new span it resolves the parent
//! from the supplied references, decides whether a new trace is sampled and
//! derives the span's ids, flags and baggage. Finished spans come back to the
//! tracer, which counts them and hands the sampled ones to its reporter.
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use sysinfo::System;

use super::id::RandomIdGenerator;
use super::{
    ConstSampler, FinishedSpan, NullReporter, Process, Reference, ReferenceType, Reporter,
    Sampler, Span, SpanContext, Tag, TagValue, TraceFlags, JAEGER_CLIENT_VERSION_TAG_KEY,
    JAEGER_DEBUG_HEADER, TRACER_HOSTNAME_TAG_KEY, TRACER_IP_TAG_KEY,
};
use crate::baggage::{BaggageSetter, DefaultRestrictionManager, RestrictionManager};
use crate::error::{TraceError, TraceResult};
use crate::metrics::Metrics;
use crate::JAEGER_CLIENT_VERSION;

/// Creates spans and reports them once finished.
///
/// A `Tracer` is a cheap handle: clones share the same sampler, reporter and
/// metrics. Spans keep a handle to the tracer that started them, so the
/// tracer is closed when [`close`](Tracer::close) is called or when the last
/// handle, including those held by spans, is dropped.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

struct TracerInner {
    service_name: String,
    sampler: Box<dyn Sampler>,
    reporter: Box<dyn Reporter>,
    metrics: Arc<Metrics>,
    restriction_manager: Arc<dyn RestrictionManager>,
    baggage_setter: BaggageSetter,
    process: Arc<Process>,
    id_generator: RandomIdGenerator,
    debug_header: String,
    is_closed: AtomicBool,
}

impl TracerInner {
    fn close(&self) {
        if self.is_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.reporter.close();
        self.sampler.close();
        self.restriction_manager.close();
        jaeger_debug!(name: "Tracer.Closed", service_name = self.service_name.as_str());
    }
}

impl Drop for TracerInner {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Tracer {
    /// Omits the sampler and reporter, which may hold a lot of state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("service_name", &self.inner.service_name)
            .field("tags", &self.inner.process.tags)
            .finish()
    }
}

/// Options of [`Tracer::start_span`].
#[derive(Clone, Debug, Default)]
pub struct StartSpanOptions {
    /// References to other spans. The parent is the first `ChildOf`
    /// reference, else the first reference to a valid context.
    pub references: Vec<Reference>,
    /// Tags of the new span.
    pub tags: Vec<Tag>,
    /// Wall-clock start time. Derived from `start_instant`, or now, when
    /// missing.
    pub start_time: Option<SystemTime>,
    /// Monotonic start time. Derived from `start_time`, or now, when missing.
    pub start_instant: Option<Instant>,
}

impl StartSpanOptions {
    /// Add a `ChildOf` reference to `context`.
    pub fn child_of(self, context: SpanContext) -> Self {
        self.with_reference(Reference::child_of(context))
    }

    /// Add a `FollowsFrom` reference to `context`.
    pub fn follows_from(self, context: SpanContext) -> Self {
        self.with_reference(Reference::follows_from(context))
    }

    /// Start a root span with the trace and span ids of `context`. No other
    /// reference may be given.
    pub fn self_ref(self, context: SpanContext) -> Self {
        self.with_reference(Reference::self_ref(context))
    }

    /// Add a reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Set the wall-clock start time.
    pub fn with_start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Set the monotonic start time.
    pub fn with_start_instant(mut self, start_instant: Instant) -> Self {
        self.start_instant = Some(start_instant);
        self
    }
}

impl Tracer {
    /// Create a builder for a tracer of `service_name`.
    pub fn builder(service_name: impl Into<String>) -> TracerBuilder {
        TracerBuilder {
            service_name: service_name.into(),
            sampler: None,
            reporter: None,
            metrics: None,
            restriction_manager: None,
            tags: Vec::new(),
            gen_128_bit: false,
            debug_header: JAEGER_DEBUG_HEADER.to_string(),
        }
    }

    /// Start a span.
    ///
    /// Returns `None`, after logging the problem, when the span cannot be
    /// started, i.e. when a self reference is combined with other references.
    pub fn start_span(&self, operation_name: &str, options: StartSpanOptions) -> Option<Span> {
        match self.try_start_span(operation_name, options) {
            Ok(span) => Some(span),
            Err(err) => {
                jaeger_error!(
                    name: "Tracer.StartSpanFailed",
                    operation_name = operation_name,
                    error = err.to_string()
                );
                None
            }
        }
    }

    fn try_start_span(&self, operation_name: &str, options: StartSpanOptions) -> TraceResult<Span> {
        let StartSpanOptions {
            references,
            tags,
            start_time,
            start_instant,
        } = options;
        let (self_ref, references) = analyze_references(references)?;
        let parent = parent_of(&references);

        let mut sampler_tags = Vec::new();
        let (context, new_trace) = match parent {
            Some(parent) if parent.is_valid() => {
                let context = SpanContext::new(
                    parent.trace_id(),
                    self.inner.id_generator.new_span_id(),
                    parent.span_id(),
                    parent.flags(),
                    HashMap::new(),
                )
                .with_trace_state(parent.trace_state());
                (context, false)
            }
            _ => {
                let (trace_id, span_id) = match &self_ref {
                    Some(self_ref) if self_ref.is_valid() => (self_ref.trace_id(), self_ref.span_id()),
                    _ => {
                        let trace_id = self.inner.id_generator.new_trace_id();
                        (trace_id, trace_id.low())
                    }
                };
                let flags = match parent {
                    Some(parent) if parent.is_debug_id_container_only() => {
                        sampler_tags.push(Tag::new(self.inner.debug_header.clone(), parent.debug_id()));
                        TraceFlags::SAMPLED | TraceFlags::DEBUG
                    }
                    _ => {
                        let status = self.inner.sampler.is_sampled(trace_id, operation_name);
                        if status.sampled {
                            sampler_tags = status.tags;
                            TraceFlags::SAMPLED
                        } else {
                            TraceFlags::NOT_SAMPLED
                        }
                    }
                };
                (SpanContext::new(trace_id, span_id, 0, flags, HashMap::new()), true)
            }
        };
        let context = match parent {
            Some(parent) if !parent.baggage().is_empty() => context.with_baggage(parent.baggage().clone()),
            _ => context,
        };

        let (start_time, start_instant) = resolve_start_times(start_time, start_instant);
        let mut span_tags = tags;
        span_tags.extend(sampler_tags);

        let metrics = &self.inner.metrics;
        metrics.spans_started().inc(1);
        if context.is_sampled() {
            metrics.spans_sampled().inc(1);
            if new_trace {
                metrics.traces_started_sampled().inc(1);
            }
        } else {
            metrics.spans_not_sampled().inc(1);
            if new_trace {
                metrics.traces_started_not_sampled().inc(1);
            }
        }

        Ok(Span::new(
            self.clone(),
            context,
            operation_name.to_string(),
            start_time,
            start_instant,
            span_tags,
            references,
        ))
    }

    /// Count a finished span and hand it to the reporter if it is sampled.
    pub fn report_span(&self, span: FinishedSpan) {
        self.inner.metrics.spans_finished().inc(1);
        if span.context.is_sampled() {
            self.inner.reporter.report(span);
        }
    }

    /// Close the reporter, the sampler and the baggage restriction manager,
    /// in that order. Only the first call has any effect.
    ///
    /// Spans finished afterwards are still counted, but whether they are
    /// delivered depends on the reporter.
    pub fn close(&self) {
        self.inner.close();
    }

    /// The traced service.
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Process tags attached to every reported span.
    pub fn tags(&self) -> &[Tag] {
        &self.inner.process.tags
    }

    /// The tracer's metrics.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    pub(crate) fn process(&self) -> Arc<Process> {
        self.inner.process.clone()
    }

    pub(crate) fn baggage_setter(&self) -> &BaggageSetter {
        &self.inner.baggage_setter
    }
}

/// Splits off the self reference and drops references to contexts that
/// carry nothing: no valid ids, no debug id and no baggage.
fn analyze_references(references: Vec<Reference>) -> TraceResult<(Option<SpanContext>, Vec<Reference>)> {
    let mut self_ref = None;
    let mut kept = Vec::with_capacity(references.len());
    for reference in references {
        let context = &reference.context;
        if !context.is_valid() && !context.is_debug_id_container_only() && context.baggage().is_empty() {
            continue;
        }
        if reference.kind == ReferenceType::SelfRef {
            if self_ref.replace(reference.context).is_some() {
                return Err(TraceError::Config("only one self reference may be given".into()));
            }
            continue;
        }
        kept.push(reference);
    }
    if self_ref.is_some() && !kept.is_empty() {
        return Err(TraceError::Config(
            "a self reference excludes every other reference".into(),
        ));
    }
    Ok((self_ref, kept))
}

fn parent_of(references: &[Reference]) -> Option<&SpanContext> {
    references
        .iter()
        .find(|reference| reference.kind == ReferenceType::ChildOf)
        .or_else(|| references.iter().find(|reference| reference.context.is_valid()))
        .map(|reference| &reference.context)
}

fn resolve_start_times(
    start_time: Option<SystemTime>,
    start_instant: Option<Instant>,
) -> (SystemTime, Instant) {
    let now = SystemTime::now();
    let now_instant = Instant::now();
    match (start_time, start_instant) {
        (Some(start_time), Some(start_instant)) => (start_time, start_instant),
        (Some(start_time), None) => {
            let start_instant = match now.duration_since(start_time) {
                Ok(elapsed) => now_instant.checked_sub(elapsed),
                Err(err) => now_instant.checked_add(err.duration()),
            };
            (start_time, start_instant.unwrap_or(now_instant))
        }
        (None, Some(start_instant)) => {
            let start_time = if start_instant <= now_instant {
                now.checked_sub(now_instant - start_instant)
            } else {
                now.checked_add(start_instant - now_instant)
            };
            (start_time.unwrap_or(now), start_instant)
        }
        (None, None) => (now, now_instant),
    }
}

/// Builder for [`Tracer`].
#[derive(Debug)]
pub struct TracerBuilder {
    service_name: String,
    sampler: Option<Box<dyn Sampler>>,
    reporter: Option<Box<dyn Reporter>>,
    metrics: Option<Arc<Metrics>>,
    restriction_manager: Option<Arc<dyn RestrictionManager>>,
    tags: Vec<Tag>,
    gen_128_bit: bool,
    debug_header: String,
}

impl TracerBuilder {
    /// Sampler deciding whether new traces are sampled. Defaults to sampling
    /// every trace.
    pub fn with_sampler<S: Sampler + 'static>(mut self, sampler: S) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Reporter receiving finished sampled spans. Defaults to discarding
    /// them.
    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Metrics to update. Defaults to discarding metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Baggage restrictions. Defaults to allowing every key with values of
    /// up to 2048 bytes.
    pub fn with_restriction_manager<M: RestrictionManager + 'static>(mut self, manager: M) -> Self {
        self.restriction_manager = Some(Arc::new(manager));
        self
    }

    /// Additional process tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Generate 128-bit trace ids for new traces. Defaults to 64-bit ids.
    pub fn with_128bit_trace_ids(mut self, enabled: bool) -> Self {
        self.gen_128_bit = enabled;
        self
    }

    /// Key of the tag recording the debug id of a forced trace. Defaults to
    /// `jaeger-debug-id`.
    pub fn with_debug_header(mut self, header: impl Into<String>) -> Self {
        self.debug_header = header.into();
        self
    }

    /// Build the tracer.
    pub fn build(self) -> TraceResult<Tracer> {
        if self.service_name.is_empty() {
            return Err(TraceError::Config("no service name provided".into()));
        }
        let metrics = self.metrics.unwrap_or_default();
        let restriction_manager = self
            .restriction_manager
            .unwrap_or_else(|| Arc::new(DefaultRestrictionManager::default()));
        let baggage_setter = BaggageSetter::new(restriction_manager.clone(), metrics.clone());

        let mut tags = vec![Tag::new(JAEGER_CLIENT_VERSION_TAG_KEY, JAEGER_CLIENT_VERSION)];
        if let Some(hostname) = System::host_name() {
            tags.push(Tag::new(TRACER_HOSTNAME_TAG_KEY, hostname));
        }
        match local_ipv4() {
            Some(ip) => tags.push(Tag::new(TRACER_IP_TAG_KEY, ip.to_string())),
            None => {
                jaeger_warn!(name: "Tracer.UnknownHostIp");
            }
        }
        tags.extend(self.tags);

        let process = Arc::new(Process {
            service_name: self.service_name.clone(),
            tags,
        });

        Ok(Tracer {
            inner: Arc::new(TracerInner {
                service_name: self.service_name,
                sampler: self.sampler.unwrap_or_else(|| Box::new(ConstSampler::new(true))),
                reporter: self.reporter.unwrap_or_else(|| Box::new(NullReporter)),
                metrics,
                restriction_manager,
                baggage_setter,
                process,
                id_generator: RandomIdGenerator::new(self.gen_128_bit),
                debug_header: self.debug_header,
                is_closed: AtomicBool::new(false),
            }),
        })
    }
}

/// The address of the interface routing outbound traffic. Connecting a UDP
/// socket sends nothing.
fn local_ipv4() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(10, 254, 254, 254), 1)).ok()?;
    socket
        .local_addr()
        .ok()
        .map(|addr| addr.ip())
        .filter(|ip| !ip.is_unspecified())
}
