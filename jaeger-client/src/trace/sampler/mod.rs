//! Sampling decisions.
//!
//! A sampler is consulted once per trace, when its root span starts. Child
//! spans inherit the decision through their parent's flags. Every positive
//! decision comes with tags naming the sampler that made it and its
//! parameter, which are attached to the root span.
use std::fmt;

use super::id::TraceId;
use super::tag::Tag;

mod adaptive;
mod const_sampler;
mod guaranteed_throughput;
mod probabilistic;
mod rate_limit;
mod rate_limiting;
mod remote;

pub use adaptive::AdaptiveSampler;
pub use const_sampler::ConstSampler;
pub use guaranteed_throughput::GuaranteedThroughputProbabilisticSampler;
pub use probabilistic::ProbabilisticSampler;
pub use rate_limiting::RateLimitingSampler;
pub use remote::{
    HttpSamplingManager, OperationSamplingStrategy, PerOperationSamplingStrategies,
    ProbabilisticSamplingStrategy, RateLimitingSamplingStrategy, RemotelyControlledSampler,
    RemotelyControlledSamplerBuilder, SamplingManager, SamplingStrategyResponse,
    SamplingStrategyType,
};

pub(crate) use remote::{
    DEFAULT_MAX_OPERATIONS, DEFAULT_SAMPLING_PROBABILITY, DEFAULT_SAMPLING_REFRESH_INTERVAL,
    DEFAULT_SAMPLING_SERVER_URL,
};

/// Tag key naming the sampler that made a decision.
pub const SAMPLER_TYPE_TAG_KEY: &str = "sampler.type";
/// Tag key holding the parameter of the sampler that made a decision.
pub const SAMPLER_PARAM_TAG_KEY: &str = "sampler.param";

/// `sampler.type` value of [`ConstSampler`].
pub const SAMPLER_TYPE_CONST: &str = "const";
/// `sampler.type` value of [`ProbabilisticSampler`].
pub const SAMPLER_TYPE_PROBABILISTIC: &str = "probabilistic";
/// `sampler.type` value of [`RateLimitingSampler`].
pub const SAMPLER_TYPE_RATE_LIMITING: &str = "ratelimiting";
/// `sampler.type` value of the rate limiting fallback of
/// [`GuaranteedThroughputProbabilisticSampler`].
pub const SAMPLER_TYPE_LOWER_BOUND: &str = "lowerbound";
/// Configuration name of the remotely controlled sampler.
pub const SAMPLER_TYPE_REMOTE: &str = "remote";

/// Outcome of a sampling decision.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SamplingStatus {
    /// Whether the trace is sampled.
    pub sampled: bool,
    /// Tags describing the sampler that made the decision.
    pub tags: Vec<Tag>,
}

impl SamplingStatus {
    /// Create a sampling status.
    pub fn new(sampled: bool, tags: Vec<Tag>) -> Self {
        SamplingStatus { sampled, tags }
    }
}

/// The kind of a [`Sampler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SamplerType {
    /// [`ConstSampler`]
    Const,
    /// [`ProbabilisticSampler`]
    Probabilistic,
    /// [`RateLimitingSampler`]
    RateLimiting,
    /// [`GuaranteedThroughputProbabilisticSampler`]
    GuaranteedThroughputProbabilistic,
    /// [`AdaptiveSampler`]
    Adaptive,
    /// [`RemotelyControlledSampler`]
    Remote,
}

/// Decides whether a new trace is sampled.
///
/// Implementations are shared by every thread starting spans, so decisions
/// must be safe to make concurrently.
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Decide whether the trace `trace_id`, whose root span is `operation`,
    /// is sampled.
    fn is_sampled(&self, trace_id: TraceId, operation: &str) -> SamplingStatus;

    /// Release resources such as background threads. Called once by the
    /// tracer on close.
    fn close(&self) {}

    /// The kind of sampler.
    fn sampler_type(&self) -> SamplerType;
}

impl<S: Sampler + ?Sized> Sampler for Box<S> {
    fn is_sampled(&self, trace_id: TraceId, operation: &str) -> SamplingStatus {
        (**self).is_sampled(trace_id, operation)
    }

    fn close(&self) {
        (**self).close()
    }

    fn sampler_type(&self) -> SamplerType {
        (**self).sampler_type()
    }
}

pub(crate) fn sampler_tags(sampler_type: &str, param: impl Into<super::tag::TagValue>) -> Vec<Tag> {
    vec![
        Tag::new(SAMPLER_TYPE_TAG_KEY, sampler_type),
        Tag::new(SAMPLER_PARAM_TAG_KEY, param),
    ]
}
