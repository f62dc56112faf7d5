//! Types of the JSON sampling strategy protocol served by the Jaeger agent.
use serde::{Deserialize, Serialize};

/// Which of the top-level strategies a response carries.
///
/// Consumers should rather look at which strategy field is present, starting
/// with `operationSampling`; per-operation responses set this to
/// `PROBABILISTIC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingStrategyType {
    /// A probabilistic strategy.
    Probabilistic,
    /// A rate limiting strategy.
    RateLimiting,
}

/// Samples traces with a fixed probability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilisticSamplingStrategy {
    /// The sampling probability in the range [0.0, 1.0].
    pub sampling_rate: f64,
}

/// Samples a fixed number of traces per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitingSamplingStrategy {
    /// Traces sampled per second.
    pub max_traces_per_second: f64,
}

/// Sampling strategy of one operation. Only probabilistic sampling is
/// supported at that level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSamplingStrategy {
    /// The operation name.
    pub operation: String,
    /// Its probabilistic strategy.
    pub probabilistic_sampling: ProbabilisticSamplingStrategy,
}

/// Per-operation strategies plus service-wide defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerOperationSamplingStrategies {
    /// Probability for operations without a strategy of their own.
    pub default_sampling_probability: f64,
    /// Lower-bound rate applied to every operation, local to this process.
    pub default_lower_bound_traces_per_second: f64,
    /// Strategies for individual operations.
    pub per_operation_strategies: Vec<OperationSamplingStrategy>,
    /// Upper-bound rate. Accepted but not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_upper_bound_traces_per_second: Option<f64>,
}

/// Sampling strategy of a service. Only one of the strategy fields is
/// expected to be present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingStrategyResponse {
    /// Legacy discriminant, see [`SamplingStrategyType`].
    pub strategy_type: SamplingStrategyType,
    /// Probabilistic strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilistic_sampling: Option<ProbabilisticSamplingStrategy>,
    /// Rate limiting strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limiting_sampling: Option<RateLimitingSamplingStrategy>,
    /// Per-operation strategies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_sampling: Option<PerOperationSamplingStrategies>,
}
