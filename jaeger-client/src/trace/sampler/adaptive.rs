use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    GuaranteedThroughputProbabilisticSampler, PerOperationSamplingStrategies, ProbabilisticSampler,
    Sampler, SamplerType, SamplingStatus,
};
use crate::trace::TraceId;

#[derive(Debug)]
struct Inner {
    samplers: HashMap<String, GuaranteedThroughputProbabilisticSampler>,
    default_sampler: ProbabilisticSampler,
    lower_bound: f64,
}

/// Samples each operation with its own
/// [`GuaranteedThroughputProbabilisticSampler`].
///
/// Operations without a strategy get one lazily, seeded with the default
/// rate and lower bound, until `max_operations` operations are tracked.
/// Past that limit unknown operations share the default probabilistic
/// sampler and are not remembered.
#[derive(Debug)]
pub struct AdaptiveSampler {
    inner: RwLock<Inner>,
    max_operations: usize,
}

impl AdaptiveSampler {
    /// Create a sampler from per-operation strategies.
    pub fn new(strategies: &PerOperationSamplingStrategies, max_operations: usize) -> Self {
        let lower_bound = strategies.default_lower_bound_traces_per_second;
        let samplers = strategies
            .per_operation_strategies
            .iter()
            .map(|strategy| {
                (
                    strategy.operation.clone(),
                    GuaranteedThroughputProbabilisticSampler::new(
                        lower_bound,
                        strategy.probabilistic_sampling.sampling_rate,
                    ),
                )
            })
            .collect();
        AdaptiveSampler {
            inner: RwLock::new(Inner {
                samplers,
                default_sampler: ProbabilisticSampler::new(
                    strategies.default_sampling_probability,
                ),
                lower_bound,
            }),
            max_operations,
        }
    }

    /// Merges new strategies: known operations are updated in place, new ones
    /// are added, and the defaults are replaced.
    pub fn update(&self, strategies: &PerOperationSamplingStrategies) {
        let Ok(mut inner) = self.inner.write() else {
            jaeger_error!(name: "AdaptiveSampler.LockPoisoned");
            return;
        };
        let lower_bound = strategies.default_lower_bound_traces_per_second;
        for strategy in &strategies.per_operation_strategies {
            let sampling_rate = strategy.probabilistic_sampling.sampling_rate;
            match inner.samplers.get_mut(&strategy.operation) {
                Some(sampler) => sampler.update(lower_bound, sampling_rate),
                None => {
                    inner.samplers.insert(
                        strategy.operation.clone(),
                        GuaranteedThroughputProbabilisticSampler::new(lower_bound, sampling_rate),
                    );
                }
            }
        }
        if inner.default_sampler.sampling_rate() != strategies.default_sampling_probability {
            inner.default_sampler =
                ProbabilisticSampler::new(strategies.default_sampling_probability);
        }
        inner.lower_bound = lower_bound;
    }

    /// Number of operations with a dedicated sampler.
    pub fn operation_count(&self) -> usize {
        self.inner.read().map(|inner| inner.samplers.len()).unwrap_or(0)
    }

    /// The most operations that get a dedicated sampler.
    pub fn max_operations(&self) -> usize {
        self.max_operations
    }
}

impl Sampler for AdaptiveSampler {
    fn is_sampled(&self, trace_id: TraceId, operation: &str) -> SamplingStatus {
        {
            let Ok(inner) = self.inner.read() else {
                return SamplingStatus::default();
            };
            if let Some(sampler) = inner.samplers.get(operation) {
                return sampler.is_sampled(trace_id, operation);
            }
            if inner.samplers.len() >= self.max_operations {
                return inner.default_sampler.is_sampled(trace_id, operation);
            }
        }

        let Ok(mut inner) = self.inner.write() else {
            return SamplingStatus::default();
        };
        if !inner.samplers.contains_key(operation) && inner.samplers.len() >= self.max_operations {
            return inner.default_sampler.is_sampled(trace_id, operation);
        }
        let lower_bound = inner.lower_bound;
        let sampling_rate = inner.default_sampler.sampling_rate();
        inner
            .samplers
            .entry(operation.to_string())
            .or_insert_with(|| GuaranteedThroughputProbabilisticSampler::new(lower_bound, sampling_rate))
            .is_sampled(trace_id, operation)
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::Adaptive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::sampler::{OperationSamplingStrategy, ProbabilisticSamplingStrategy};
    use crate::trace::TagValue;

    fn strategies(default_rate: f64, operations: &[(&str, f64)]) -> PerOperationSamplingStrategies {
        PerOperationSamplingStrategies {
            default_sampling_probability: default_rate,
            default_lower_bound_traces_per_second: 1.0,
            per_operation_strategies: operations
                .iter()
                .map(|(operation, rate)| OperationSamplingStrategy {
                    operation: operation.to_string(),
                    probabilistic_sampling: ProbabilisticSamplingStrategy {
                        sampling_rate: *rate,
                    },
                })
                .collect(),
            default_upper_bound_traces_per_second: None,
        }
    }

    #[test]
    fn known_operation_uses_its_strategy() {
        let sampler = AdaptiveSampler::new(&strategies(0.0, &[("get", 1.0)]), 10);
        let status = sampler.is_sampled(TraceId::new(0, u64::MAX), "get");
        assert!(status.sampled);
        assert_eq!(status.tags[0].value, TagValue::String("probabilistic".into()));
    }

    #[test]
    fn unknown_operations_are_added_until_capacity() {
        let sampler = AdaptiveSampler::new(&strategies(0.0, &[("get", 1.0)]), 3);
        sampler.is_sampled(TraceId::new(0, 1), "put");
        sampler.is_sampled(TraceId::new(0, 1), "post");
        assert_eq!(sampler.operation_count(), 3);

        // map full: falls back to the shared default sampler without growing
        for operation in ["delete", "patch", "head"] {
            let status = sampler.is_sampled(TraceId::new(0, u64::MAX), operation);
            assert!(!status.sampled);
            assert_eq!(status.tags[0].value, TagValue::String("probabilistic".into()));
        }
        assert_eq!(sampler.operation_count(), 3);
    }

    #[test]
    fn lazily_created_sampler_has_lower_bound() {
        let sampler = AdaptiveSampler::new(&strategies(0.0, &[]), 10);
        let status = sampler.is_sampled(TraceId::new(0, u64::MAX), "new-op");
        assert!(status.sampled);
        assert_eq!(status.tags[0].value, TagValue::String("lowerbound".into()));
        assert_eq!(sampler.operation_count(), 1);
    }

    #[test]
    fn update_merges_strategies() {
        let sampler = AdaptiveSampler::new(&strategies(0.0, &[("get", 0.0)]), 10);
        sampler.update(&strategies(1.0, &[("get", 1.0), ("put", 1.0)]));
        assert_eq!(sampler.operation_count(), 2);

        let status = sampler.is_sampled(TraceId::new(0, u64::MAX), "get");
        assert!(status.sampled);
        assert_eq!(status.tags[0].value, TagValue::String("probabilistic".into()));
        assert!(sampler.is_sampled(TraceId::new(0, u64::MAX), "put").sampled);
    }
}
