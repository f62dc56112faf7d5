use super::{sampler_tags, Sampler, SamplerType, SamplingStatus, SAMPLER_TYPE_PROBABILISTIC};
use crate::trace::{Tag, TraceId};

/// Samples a fixed fraction of traces.
///
/// The decision only depends on the low half of the trace id: a trace is
/// sampled when `trace_id.low() <= rate * u64::MAX`. Every process given the
/// same rate therefore agrees on the same trace, and raising the rate never
/// unsamples a trace that was sampled at a lower rate.
#[derive(Clone, Debug)]
pub struct ProbabilisticSampler {
    sampling_rate: f64,
    sampling_boundary: u64,
    tags: Vec<Tag>,
}

impl ProbabilisticSampler {
    /// Create a sampler; `sampling_rate` is clamped into `[0, 1]`.
    pub fn new(sampling_rate: f64) -> Self {
        let sampling_rate = clamp_rate(sampling_rate);
        ProbabilisticSampler {
            sampling_rate,
            sampling_boundary: boundary(sampling_rate),
            tags: sampler_tags(SAMPLER_TYPE_PROBABILISTIC, sampling_rate),
        }
    }

    /// The effective sampling rate.
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }
}

/// The rate a [`ProbabilisticSampler`] built from `sampling_rate` uses; NaN
/// becomes 0.
pub(crate) fn clamp_rate(sampling_rate: f64) -> f64 {
    if sampling_rate.is_nan() {
        0.0
    } else {
        sampling_rate.clamp(0.0, 1.0)
    }
}

// `as` saturates, so a rate of 1.0 maps to u64::MAX.
fn boundary(sampling_rate: f64) -> u64 {
    (sampling_rate * u64::MAX as f64) as u64
}

impl Sampler for ProbabilisticSampler {
    fn is_sampled(&self, trace_id: TraceId, _operation: &str) -> SamplingStatus {
        SamplingStatus::new(self.sampling_boundary >= trace_id.low(), self.tags.clone())
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::Probabilistic
    }
}
