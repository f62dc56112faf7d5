use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod manager;
mod strategy;

pub use manager::{HttpSamplingManager, SamplingManager};
pub use strategy::{
    OperationSamplingStrategy, PerOperationSamplingStrategies, ProbabilisticSamplingStrategy,
    RateLimitingSamplingStrategy, SamplingStrategyResponse, SamplingStrategyType,
};

use super::{
    AdaptiveSampler, ProbabilisticSampler, RateLimitingSampler, Sampler, SamplerType,
    SamplingStatus,
};
use crate::error::{TraceError, TraceResult};
use crate::metrics::Metrics;
use crate::trace::TraceId;
use crate::worker::PeriodicWorker;

/// Default sampling endpoint of the local Jaeger agent.
pub(crate) const DEFAULT_SAMPLING_SERVER_URL: &str = "http://127.0.0.1:5778/sampling";
/// Default sampling probability used until a strategy is fetched.
pub(crate) const DEFAULT_SAMPLING_PROBABILITY: f64 = 0.001;
/// Default limit of operations tracked by the adaptive sampler.
pub(crate) const DEFAULT_MAX_OPERATIONS: usize = 2000;
/// Default interval between two strategy fetches.
pub(crate) const DEFAULT_SAMPLING_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

enum Delegate {
    Adaptive(AdaptiveSampler),
    Fixed(Box<dyn Sampler>),
}

impl Delegate {
    fn sampler(&self) -> &dyn Sampler {
        match self {
            Delegate::Adaptive(sampler) => sampler,
            Delegate::Fixed(sampler) => sampler.as_ref(),
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.sampler(), f)
    }
}

#[derive(Debug)]
struct Inner {
    service_name: String,
    manager: Box<dyn SamplingManager>,
    max_operations: usize,
    metrics: Arc<Metrics>,
    sampler: Mutex<Delegate>,
}

impl Inner {
    fn update_sampler(&self) {
        let response = match self.manager.get_sampling_strategy(&self.service_name) {
            Ok(response) => response,
            Err(TraceError::MalformedResponse(err)) => {
                self.metrics.sampler_parsing_failure().inc(1);
                jaeger_warn!(
                    name: "RemotelyControlledSampler.MalformedStrategy",
                    service_name = self.service_name.as_str(),
                    error = err.to_string()
                );
                return;
            }
            Err(err) => {
                self.metrics.sampler_query_failure().inc(1);
                jaeger_warn!(
                    name: "RemotelyControlledSampler.QueryFailed",
                    service_name = self.service_name.as_str(),
                    error = err.to_string()
                );
                return;
            }
        };

        let Ok(mut current) = self.sampler.lock() else {
            self.metrics.sampler_update_failure().inc(1);
            return;
        };
        self.metrics.sampler_retrieved().inc(1);

        if let Some(strategies) = &response.operation_sampling {
            let updated_in_place = match &*current {
                Delegate::Adaptive(adaptive) => {
                    adaptive.update(strategies);
                    true
                }
                Delegate::Fixed(_) => false,
            };
            if !updated_in_place {
                let previous = std::mem::replace(
                    &mut *current,
                    Delegate::Adaptive(AdaptiveSampler::new(strategies, self.max_operations)),
                );
                previous.sampler().close();
            }
        } else {
            let sampler: Box<dyn Sampler> = if let Some(probabilistic) = &response.probabilistic_sampling {
                Box::new(ProbabilisticSampler::new(probabilistic.sampling_rate))
            } else if let Some(rate_limiting) = &response.rate_limiting_sampling {
                Box::new(RateLimitingSampler::new(rate_limiting.max_traces_per_second))
            } else {
                self.metrics.sampler_update_failure().inc(1);
                jaeger_warn!(
                    name: "RemotelyControlledSampler.UnsupportedStrategy",
                    service_name = self.service_name.as_str(),
                    strategy_type = format!("{:?}", response.strategy_type)
                );
                return;
            };
            let previous = std::mem::replace(&mut *current, Delegate::Fixed(sampler));
            previous.sampler().close();
        }

        self.metrics.sampler_updated().inc(1);
        jaeger_debug!(
            name: "RemotelyControlledSampler.Updated",
            service_name = self.service_name.as_str(),
            sampler = format!("{:?}", current.sampler().sampler_type())
        );
    }
}

/// Sampler whose strategy is periodically fetched from the control plane.
///
/// Until the first successful fetch, decisions come from the initial sampler.
/// Per-operation strategies switch the delegate to an [`AdaptiveSampler`],
/// which later fetches update in place; probabilistic and rate limiting
/// strategies replace the delegate. Failed or malformed fetches keep the
/// current delegate and are only counted in [`Metrics`].
///
/// The strategy is fetched on a background thread immediately after
/// construction and then every refresh interval, until [`Sampler::close`].
#[derive(Debug)]
pub struct RemotelyControlledSampler {
    inner: Arc<Inner>,
    worker: PeriodicWorker,
}

impl RemotelyControlledSampler {
    /// Create a builder for the sampler of `service_name`.
    pub fn builder(service_name: impl Into<String>) -> RemotelyControlledSamplerBuilder {
        RemotelyControlledSamplerBuilder {
            service_name: service_name.into(),
            sampling_server_url: DEFAULT_SAMPLING_SERVER_URL.to_string(),
            manager: None,
            initial_sampler: None,
            max_operations: DEFAULT_MAX_OPERATIONS,
            sampling_refresh_interval: DEFAULT_SAMPLING_REFRESH_INTERVAL,
            metrics: None,
        }
    }
}

impl Sampler for RemotelyControlledSampler {
    fn is_sampled(&self, trace_id: TraceId, operation: &str) -> SamplingStatus {
        match self.inner.sampler.lock() {
            Ok(current) => current.sampler().is_sampled(trace_id, operation),
            Err(_) => SamplingStatus::default(),
        }
    }

    fn close(&self) {
        self.worker.stop();
    }

    fn sampler_type(&self) -> SamplerType {
        SamplerType::Remote
    }
}

/// Builder for [`RemotelyControlledSampler`].
#[derive(Debug)]
pub struct RemotelyControlledSamplerBuilder {
    service_name: String,
    sampling_server_url: String,
    manager: Option<Box<dyn SamplingManager>>,
    initial_sampler: Option<Box<dyn Sampler>>,
    max_operations: usize,
    sampling_refresh_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl RemotelyControlledSamplerBuilder {
    /// Sampling endpoint queried by the default [`HttpSamplingManager`].
    /// Defaults to `http://127.0.0.1:5778/sampling`.
    pub fn with_sampling_server_url(mut self, url: impl Into<String>) -> Self {
        self.sampling_server_url = url.into();
        self
    }

    /// Use a custom strategy source instead of the HTTP endpoint.
    pub fn with_sampling_manager<M: SamplingManager + 'static>(mut self, manager: M) -> Self {
        self.manager = Some(Box::new(manager));
        self
    }

    /// Sampler used until a strategy is fetched. Defaults to a
    /// [`ProbabilisticSampler`] with a rate of 0.001.
    pub fn with_initial_sampler<S: Sampler + 'static>(mut self, sampler: S) -> Self {
        self.initial_sampler = Some(Box::new(sampler));
        self
    }

    /// Limit of operations given a dedicated sampler. Defaults to 2000.
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Interval between two fetches. Defaults to 60 seconds.
    pub fn with_sampling_refresh_interval(mut self, interval: Duration) -> Self {
        self.sampling_refresh_interval = interval;
        self
    }

    /// Metrics to update. Defaults to discarding metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the sampler and start its polling thread.
    pub fn build(self) -> TraceResult<RemotelyControlledSampler> {
        if self.service_name.is_empty() {
            return Err(TraceError::Config("no service name provided".into()));
        }
        let manager = match self.manager {
            Some(manager) => manager,
            None => Box::new(HttpSamplingManager::new(self.sampling_server_url)?),
        };
        let initial_sampler = self
            .initial_sampler
            .unwrap_or_else(|| Box::new(ProbabilisticSampler::new(DEFAULT_SAMPLING_PROBABILITY)));

        let inner = Arc::new(Inner {
            service_name: self.service_name,
            manager,
            max_operations: self.max_operations,
            metrics: self.metrics.unwrap_or_default(),
            sampler: Mutex::new(Delegate::Fixed(initial_sampler)),
        });
        let poller = inner.clone();
        let worker = PeriodicWorker::spawn(
            "JaegerRemoteSamplerPoller",
            self.sampling_refresh_interval,
            move || poller.update_sampler(),
        )?;

        Ok(RemotelyControlledSampler { inner, worker })
    }
}
