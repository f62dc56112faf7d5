use super::probabilistic::clamp_rate;
use super::{
    sampler_tags, ProbabilisticSampler, RateLimitingSampler, Sampler, SamplerType, SamplingStatus,
    SAMPLER_TYPE_LOWER_BOUND,
};
use crate::trace::{Tag, TraceId};

/// A probabilistic sampler with a guaranteed minimum throughput.
///
/// Traces the probabilistic sampler accepts are sampled with its tags, and
/// still consume allowance of the lower bound rate limiter. Rejected traces
/// get a second chance from the rate limiter and are then tagged
/// `sampler.type=lowerbound`.
#[derive(Debug)]
pub struct GuaranteedThroughputProbabilisticSampler {
    probabilistic_sampler: ProbabilisticSampler,
    sampling_rate: f64,
    lower_bound_sampler: RateLimitingSampler,
    lower_bound: f64,
    tags: Vec<Tag>,
}

impl GuaranteedThroughputProbabilisticSampler {
    /// Create a sampler sampling `sampling_rate` of the traces and at least
    /// `lower_bound` traces per second.
    pub fn new(lower_bound: f64, sampling_rate: f64) -> Self {
        let probabilistic_sampler = ProbabilisticSampler::new(sampling_rate);
        let sampling_rate = probabilistic_sampler.sampling_rate();
        GuaranteedThroughputProbabilisticSampler {
            probabilistic_sampler,
            sampling_rate,
            lower_bound_sampler: RateLimitingSampler::new(lower_bound),
            lower_bound,
            tags: sampler_tags(SAMPLER_TYPE_LOWER_BOUND, sampling_rate),
        }
    }

    /// Replaces the samplers whose parameter changed. The rate limiter keeps
    /// its balance when `lower_bound` is unchanged.
    pub fn update(&mut self, lower_bound: f64, sampling_rate: f64) {
        let sampling_rate = clamp_rate(sampling_rate);
        if self.sampling_rate != sampling_rate {
            self.probabilistic_sampler = ProbabilisticSampler::new(sampling_rate);
            self.sampling_rate = sampling_rate;
            self.tags = sampler_tags(SAMPLER_TYPE_LOWER_BOUND, self.sampling_rate);
        }
        if self.lower_bound != lower_bound {
            self.lower_bound_sampler = RateLimitingSampler::new(lower_bound);
            self.lower_bound = lower_bound;
        }
    }

    /// The probabilistic sampling rate.
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// The guaranteed traces per second.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }
}

impl Sampler for GuaranteedThroughputProbabilisticSampler {
    fn is_sampled(&self, trace_id: TraceId, operation: &str) -> SamplingStatus {
        let status = self.probabilistic_sampler.is_sampled(trace_id, operation);
        if status.sampled {
            self.lower_bound_sampler.is_sampled(trace_id, operation);
            return status;
        }
        let sampled = self
            .lower_bound_sampler
            .is_sampled(trace_id, operation)
            .sampled;
        SamplingStatus::new(sampled, self.tags.clone())
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::GuaranteedThroughputProbabilistic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TagValue;

    fn sampler_type_tag(status: &SamplingStatus) -> &TagValue {
        &status.tags[0].value
    }

    #[test]
    fn falls_back_to_lower_bound() {
        let sampler = GuaranteedThroughputProbabilisticSampler::new(2.0, 0.0);
        let unlucky = TraceId::new(0, u64::MAX);

        let first = sampler.is_sampled(unlucky, "op");
        assert!(first.sampled);
        assert_eq!(sampler_type_tag(&first), &TagValue::String("lowerbound".into()));
        assert_eq!(first.tags[1].value, TagValue::F64(0.0));

        assert!(sampler.is_sampled(unlucky, "op").sampled);
        assert!(!sampler.is_sampled(unlucky, "op").sampled);
    }

    #[test]
    fn probabilistic_yes_debits_lower_bound() {
        let sampler = GuaranteedThroughputProbabilisticSampler::new(1.0, 1.0);
        let status = sampler.is_sampled(TraceId::new(0, 1), "op");
        assert!(status.sampled);
        assert_eq!(sampler_type_tag(&status), &TagValue::String("probabilistic".into()));

        // the single credit went to the sampled trace above
        let mut sampler = sampler;
        sampler.update(1.0, 0.0);
        assert!(!sampler.is_sampled(TraceId::new(0, u64::MAX), "op").sampled);
    }

    #[test]
    fn update_only_replaces_changed_parts() {
        let mut sampler = GuaranteedThroughputProbabilisticSampler::new(1.0, 0.0);
        assert!(sampler.is_sampled(TraceId::new(0, u64::MAX), "op").sampled);

        sampler.update(1.0, 0.5);
        assert_eq!(sampler.sampling_rate(), 0.5);
        assert_eq!(sampler.tags[1].value, TagValue::F64(0.5));
        // rate limiter kept: balance still spent
        assert!(!sampler.is_sampled(TraceId::new(0, u64::MAX), "op").sampled);

        sampler.update(3.0, 0.5);
        assert_eq!(sampler.lower_bound(), 3.0);
        assert!(sampler.is_sampled(TraceId::new(0, u64::MAX), "op").sampled);
    }

    #[test]
    fn out_of_range_rate_is_compared_after_clamping() {
        let mut sampler = GuaranteedThroughputProbabilisticSampler::new(1.0, 1.5);
        assert_eq!(sampler.sampling_rate(), 1.0);
        let tags = sampler.tags.as_ptr();

        sampler.update(1.0, 1.5);
        sampler.update(1.0, 1.0);
        assert_eq!(sampler.sampling_rate(), 1.0);
        assert_eq!(sampler.tags.as_ptr(), tags);

        sampler.update(1.0, -2.0);
        assert_eq!(sampler.sampling_rate(), 0.0);
        assert_eq!(sampler.tags[1].value, TagValue::F64(0.0));
    }
}
