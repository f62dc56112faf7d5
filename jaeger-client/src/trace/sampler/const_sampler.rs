use super::{sampler_tags, Sampler, SamplerType, SamplingStatus, SAMPLER_TYPE_CONST};
use crate::trace::{Tag, TraceId};

/// Makes the same decision for every trace.
#[derive(Clone, Debug)]
pub struct ConstSampler {
    decision: bool,
    tags: Vec<Tag>,
}

impl ConstSampler {
    /// Create a sampler always answering `decision`.
    pub fn new(decision: bool) -> Self {
        ConstSampler {
            decision,
            tags: sampler_tags(SAMPLER_TYPE_CONST, decision),
        }
    }

    /// The constant decision.
    pub fn decision(&self) -> bool {
        self.decision
    }
}

impl Sampler for ConstSampler {
    fn is_sampled(&self, _trace_id: TraceId, _operation: &str) -> SamplingStatus {
        SamplingStatus::new(self.decision, self.tags.clone())
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::Const
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TagValue;

    #[test]
    fn always_same_decision() {
        for decision in [true, false] {
            let sampler = ConstSampler::new(decision);
            for low in [1, 42, u64::MAX] {
                let status = sampler.is_sampled(TraceId::new(0, low), "op");
                assert_eq!(status.sampled, decision);
                assert_eq!(status.tags[0].value, TagValue::String("const".into()));
                assert_eq!(status.tags[1].value, TagValue::Bool(decision));
            }
        }
    }
}
