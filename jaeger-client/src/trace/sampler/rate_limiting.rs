use std::sync::Mutex;

use super::rate_limit::RateLimiter;
use super::{sampler_tags, Sampler, SamplerType, SamplingStatus, SAMPLER_TYPE_RATE_LIMITING};
use crate::trace::{Tag, TraceId};

/// Samples at most `max_traces_per_second` traces per second.
///
/// Unused allowance accumulates up to one second worth of traces (at least
/// one trace), so short bursts after idle periods are sampled.
#[derive(Debug)]
pub struct RateLimitingSampler {
    max_traces_per_second: f64,
    rate_limiter: Mutex<RateLimiter>,
    tags: Vec<Tag>,
}

impl RateLimitingSampler {
    /// Create a sampler allowing `max_traces_per_second`.
    pub fn new(max_traces_per_second: f64) -> Self {
        let max_balance = f64::max(max_traces_per_second, 1.0);
        RateLimitingSampler {
            max_traces_per_second,
            rate_limiter: Mutex::new(RateLimiter::new(max_traces_per_second, max_balance)),
            tags: sampler_tags(SAMPLER_TYPE_RATE_LIMITING, max_traces_per_second),
        }
    }

    /// The configured rate.
    pub fn max_traces_per_second(&self) -> f64 {
        self.max_traces_per_second
    }
}

impl Sampler for RateLimitingSampler {
    fn is_sampled(&self, _trace_id: TraceId, _operation: &str) -> SamplingStatus {
        let sampled = self
            .rate_limiter
            .lock()
            .map(|mut limiter| limiter.check_credit(1.0))
            .unwrap_or(false);
        SamplingStatus::new(sampled, self.tags.clone())
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::RateLimiting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TagValue;

    #[test]
    fn limits_burst_to_balance() {
        let sampler = RateLimitingSampler::new(2.0);
        let sampled = (0..10)
            .filter(|_| sampler.is_sampled(TraceId::new(0, 1), "op").sampled)
            .count();
        assert_eq!(sampled, 2);
    }

    #[test]
    fn fractional_rate_allows_one() {
        let sampler = RateLimitingSampler::new(0.1);
        assert!(sampler.is_sampled(TraceId::new(0, 1), "op").sampled);
        assert!(!sampler.is_sampled(TraceId::new(0, 1), "op").sampled);
    }

    #[test]
    fn tags() {
        let status = RateLimitingSampler::new(3.0).is_sampled(TraceId::new(0, 1), "op");
        assert_eq!(status.tags[0].value, TagValue::String("ratelimiting".into()));
        assert_eq!(status.tags[1].value, TagValue::F64(3.0));
    }
}
