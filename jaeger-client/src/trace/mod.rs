//! # Tracing
//!
//! The tracing part of the client: spans and their contexts, the [`Tracer`]
//! that creates them, the samplers deciding which traces are kept and the
//! reporting pipeline delivering finished spans.
//!
//! ## Lifecycle of a span
//!
//! 1. [`Tracer::start_span`] resolves the parent from the
//!    [`StartSpanOptions`] references. Without a parent a new trace starts
//!    and the [`Sampler`] decides whether it is sampled.
//! 2. The returned [`Span`] records tags, logs and baggage. Setting the
//!    `sampling.priority` tag can promote a span to a debug trace.
//! 3. [`Span::finish`] fixes the duration and hands a [`FinishedSpan`] to
//!    the tracer. Sampled spans go to the [`Reporter`].
//! 4. A [`RemoteReporter`] queues the span; its thread appends it to a
//!    [`Sender`] which batches spans into packets sent by a [`Transport`].
//!
//! [`Config`] builds all of the above from code or from `JAEGER_*`
//! environment variables.
mod config;
mod id;
mod reference;
mod reporter;
mod sampler;
mod sender;
mod span;
mod span_context;
mod tag;
mod tracer;

pub use config::{
    BaggageRestrictionsConfig, Config, ConfigBuilder, HeadersConfig, ReporterConfig,
    SamplerConfig,
};
pub use id::TraceId;
pub use reference::{Reference, ReferenceType};
pub use reporter::{
    CompositeReporter, InMemoryReporter, LoggingReporter, NullReporter, RemoteReporter,
    RemoteReporterBuilder, Reporter,
};
pub use sampler::{
    AdaptiveSampler, ConstSampler, GuaranteedThroughputProbabilisticSampler, HttpSamplingManager,
    OperationSamplingStrategy, PerOperationSamplingStrategies, ProbabilisticSampler,
    ProbabilisticSamplingStrategy, RateLimitingSampler, RateLimitingSamplingStrategy,
    RemotelyControlledSampler, RemotelyControlledSamplerBuilder, Sampler, SamplerType,
    SamplingManager, SamplingStatus, SamplingStrategyResponse, SamplingStrategyType,
    SAMPLER_PARAM_TAG_KEY, SAMPLER_TYPE_CONST, SAMPLER_TYPE_LOWER_BOUND,
    SAMPLER_TYPE_PROBABILISTIC, SAMPLER_TYPE_RATE_LIMITING, SAMPLER_TYPE_REMOTE,
    SAMPLER_TYPE_TAG_KEY,
};
pub use sender::{
    BufferedSender, HttpTransport, JsonSpanEncoder, Sender, SpanEncoder, Transport, UdpTransport,
};
pub use span::{FinishSpanOptions, FinishedSpan, Process, Span};
pub use span_context::{ParseSpanContextError, SpanContext, TraceFlags};
pub use tag::{LogRecord, Tag, TagValue};
pub use tracer::{StartSpanOptions, Tracer, TracerBuilder};

/// Tag whose value sets or clears the debug flag of a span.
pub const SAMPLING_PRIORITY_TAG_KEY: &str = "sampling.priority";
/// Default header, and root span tag, carrying a debug correlation id.
pub const JAEGER_DEBUG_HEADER: &str = "jaeger-debug-id";
/// Process tag holding the client version.
pub const JAEGER_CLIENT_VERSION_TAG_KEY: &str = "jaeger.version";
/// Process tag holding the hostname.
pub const TRACER_HOSTNAME_TAG_KEY: &str = "hostname";
/// Process tag holding the IPv4 address of the host.
pub const TRACER_IP_TAG_KEY: &str = "ip";

#[cfg(test)]
pub(crate) fn finished_span(operation_name: &str) -> FinishedSpan {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    FinishedSpan {
        context: SpanContext::default(),
        operation_name: operation_name.to_string(),
        start_time: SystemTime::now(),
        duration: Duration::from_millis(1),
        tags: Vec::new(),
        logs: Vec::new(),
        references: Vec::new(),
        process: Arc::new(Process {
            service_name: "svc".to_string(),
            tags: Vec::new(),
        }),
    }
}
