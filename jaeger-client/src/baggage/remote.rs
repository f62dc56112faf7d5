use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{Restriction, RestrictionManager, DEFAULT_MAX_VALUE_LENGTH};
use crate::error::{TraceError, TraceResult};
use crate::http;
use crate::metrics::Metrics;
use crate::worker::PeriodicWorker;

/// Default `host:port` of the agent serving baggage restrictions.
pub(crate) const DEFAULT_RESTRICTIONS_HOST_PORT: &str = "127.0.0.1:5778";
/// Default interval between two restriction fetches.
pub(crate) const DEFAULT_RESTRICTIONS_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// One entry of the baggage restrictions served by the agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaggageRestriction {
    /// The allowed baggage key.
    pub baggage_key: String,
    /// Maximum length of its value.
    pub max_value_length: usize,
}

/// Fetches the baggage restrictions of a service.
pub trait RestrictionClient: Send + Sync + fmt::Debug {
    /// Returns every key `service_name` may set.
    fn get_baggage_restrictions(&self, service_name: &str) -> TraceResult<Vec<BaggageRestriction>>;
}

/// [`RestrictionClient`] querying
/// `GET http://<host_port>/baggageRestrictions?service=<name>`.
#[derive(Debug, Clone)]
pub struct HttpRestrictionClient {
    endpoint: String,
    client: Client,
}

impl HttpRestrictionClient {
    /// Create a client for the agent at `host_port`, e.g. `127.0.0.1:5778`.
    pub fn new(host_port: &str) -> TraceResult<Self> {
        Ok(HttpRestrictionClient {
            endpoint: format!("http://{host_port}/baggageRestrictions"),
            client: http::build_client(http::DEFAULT_REQUEST_TIMEOUT)?,
        })
    }
}

impl RestrictionClient for HttpRestrictionClient {
    fn get_baggage_restrictions(&self, service_name: &str) -> TraceResult<Vec<BaggageRestriction>> {
        let url = http::service_endpoint(&self.endpoint, service_name)?;
        http::get_json(&self.client, &url)
    }
}

#[derive(Debug)]
struct Inner {
    service_name: String,
    client: Box<dyn RestrictionClient>,
    deny_on_init_failure: bool,
    metrics: Arc<Metrics>,
    // `None` until the first successful fetch.
    restrictions: RwLock<Option<HashMap<String, Restriction>>>,
}

impl Inner {
    fn update_restrictions(&self) {
        let restrictions = match self.client.get_baggage_restrictions(&self.service_name) {
            Ok(restrictions) => restrictions,
            Err(err) => {
                self.metrics.baggage_restrictions_update_failure().inc(1);
                jaeger_warn!(
                    name: "RemoteRestrictionManager.UpdateFailed",
                    service_name = self.service_name.as_str(),
                    error = err.to_string()
                );
                return;
            }
        };

        let restrictions = restrictions
            .into_iter()
            .map(|restriction| {
                (
                    restriction.baggage_key,
                    Restriction::new(true, restriction.max_value_length),
                )
            })
            .collect::<HashMap<_, _>>();
        match self.restrictions.write() {
            Ok(mut current) => {
                jaeger_debug!(
                    name: "RemoteRestrictionManager.Updated",
                    service_name = self.service_name.as_str(),
                    keys = restrictions.len()
                );
                *current = Some(restrictions);
                self.metrics.baggage_restrictions_update_success().inc(1);
            }
            Err(_) => self.metrics.baggage_restrictions_update_failure().inc(1),
        }
    }

    fn get_restriction(&self, key: &str) -> Restriction {
        let uninitialized = if self.deny_on_init_failure {
            Restriction::denied()
        } else {
            Restriction::new(true, DEFAULT_MAX_VALUE_LENGTH)
        };
        match self.restrictions.read() {
            Ok(current) => match current.as_ref() {
                Some(restrictions) => restrictions
                    .get(key)
                    .copied()
                    .unwrap_or_else(Restriction::denied),
                None => uninitialized,
            },
            Err(_) => uninitialized,
        }
    }
}

/// [`RestrictionManager`] whose restrictions are periodically fetched from
/// the agent.
///
/// Until the first successful fetch every key is either denied or allowed
/// with [`DEFAULT_MAX_VALUE_LENGTH`], depending on
/// [`with_deny_baggage_on_initialization_failure`]. Afterwards keys missing
/// from the last fetched list are denied. Failed fetches keep the previous
/// list.
///
/// [`with_deny_baggage_on_initialization_failure`]: RemoteRestrictionManagerBuilder::with_deny_baggage_on_initialization_failure
#[derive(Debug)]
pub struct RemoteRestrictionManager {
    inner: Arc<Inner>,
    worker: PeriodicWorker,
}

impl RemoteRestrictionManager {
    /// Create a builder for the restrictions of `service_name`.
    pub fn builder(service_name: impl Into<String>) -> RemoteRestrictionManagerBuilder {
        RemoteRestrictionManagerBuilder {
            service_name: service_name.into(),
            host_port: DEFAULT_RESTRICTIONS_HOST_PORT.to_string(),
            client: None,
            deny_on_init_failure: false,
            refresh_interval: DEFAULT_RESTRICTIONS_REFRESH_INTERVAL,
            metrics: None,
        }
    }
}

impl RestrictionManager for RemoteRestrictionManager {
    fn get_restriction(&self, _service: &str, key: &str) -> Restriction {
        self.inner.get_restriction(key)
    }

    fn close(&self) {
        self.worker.stop();
    }
}

/// Builder for [`RemoteRestrictionManager`].
#[derive(Debug)]
pub struct RemoteRestrictionManagerBuilder {
    service_name: String,
    host_port: String,
    client: Option<Box<dyn RestrictionClient>>,
    deny_on_init_failure: bool,
    refresh_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl RemoteRestrictionManagerBuilder {
    /// `host:port` queried by the default [`HttpRestrictionClient`].
    /// Defaults to `127.0.0.1:5778`. An empty string keeps the default.
    pub fn with_host_port(mut self, host_port: impl Into<String>) -> Self {
        let host_port = host_port.into();
        if !host_port.is_empty() {
            self.host_port = host_port;
        }
        self
    }

    /// Use a custom restriction source instead of the HTTP endpoint.
    pub fn with_restriction_client<C: RestrictionClient + 'static>(mut self, client: C) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    /// Deny every key until restrictions were fetched once. Defaults to
    /// `false`.
    pub fn with_deny_baggage_on_initialization_failure(mut self, deny: bool) -> Self {
        self.deny_on_init_failure = deny;
        self
    }

    /// Interval between two fetches. Defaults to 60 seconds; zero keeps the
    /// default.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.refresh_interval = interval;
        }
        self
    }

    /// Metrics to update. Defaults to discarding metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the manager and start its polling thread.
    pub fn build(self) -> TraceResult<RemoteRestrictionManager> {
        if self.service_name.is_empty() {
            return Err(TraceError::Config("no service name provided".into()));
        }
        let client = match self.client {
            Some(client) => client,
            None => Box::new(HttpRestrictionClient::new(&self.host_port)?),
        };
        let inner = Arc::new(Inner {
            service_name: self.service_name,
            client,
            deny_on_init_failure: self.deny_on_init_failure,
            metrics: self.metrics.unwrap_or_default(),
            restrictions: RwLock::new(None),
        });
        let poller = inner.clone();
        let worker = PeriodicWorker::spawn(
            "JaegerBaggageRestrictionsPoller",
            self.refresh_interval,
            move || poller.update_restrictions(),
        )?;

        Ok(RemoteRestrictionManager { inner, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{InMemoryStatsReporter, StatsFactoryImpl};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Debug)]
    struct ScriptedClient(Mutex<VecDeque<TraceResult<Vec<BaggageRestriction>>>>);

    impl ScriptedClient {
        fn new(responses: Vec<TraceResult<Vec<BaggageRestriction>>>) -> Self {
            ScriptedClient(Mutex::new(responses.into()))
        }
    }

    impl RestrictionClient for ScriptedClient {
        fn get_baggage_restrictions(&self, _service_name: &str) -> TraceResult<Vec<BaggageRestriction>> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no more responses".into()))
        }
    }

    fn restriction(key: &str, max_value_length: usize) -> BaggageRestriction {
        BaggageRestriction {
            baggage_key: key.to_string(),
            max_value_length,
        }
    }

    fn inner(
        deny_on_init_failure: bool,
        responses: Vec<TraceResult<Vec<BaggageRestriction>>>,
    ) -> (Inner, Arc<InMemoryStatsReporter>) {
        let reporter = Arc::new(InMemoryStatsReporter::new());
        let metrics = Arc::new(Metrics::new(&StatsFactoryImpl::new(reporter.clone())));
        let inner = Inner {
            service_name: "svc".to_string(),
            client: Box::new(ScriptedClient::new(responses)),
            deny_on_init_failure,
            metrics,
            restrictions: RwLock::new(None),
        };
        (inner, reporter)
    }

    #[test]
    fn uninitialized_manager_follows_init_policy() {
        let (allowing, _) = inner(false, vec![]);
        assert_eq!(
            allowing.get_restriction("key"),
            Restriction::new(true, DEFAULT_MAX_VALUE_LENGTH)
        );

        let (denying, stats) = inner(true, vec![]);
        denying.update_restrictions();
        assert_eq!(denying.get_restriction("key"), Restriction::denied());
        assert_eq!(
            stats.counter_value("jaeger.baggage-restrictions-update.result=err"),
            1
        );
    }

    #[test]
    fn unknown_keys_are_denied_once_initialized() {
        let (inner, stats) = inner(
            false,
            vec![Ok(vec![restriction("user", 10)]), Err("connection refused".into())],
        );
        inner.update_restrictions();
        assert_eq!(inner.get_restriction("user"), Restriction::new(true, 10));
        assert_eq!(inner.get_restriction("other"), Restriction::denied());

        inner.update_restrictions();
        assert_eq!(inner.get_restriction("user"), Restriction::new(true, 10));
        assert_eq!(
            stats.counter_value("jaeger.baggage-restrictions-update.result=ok"),
            1
        );
        assert_eq!(
            stats.counter_value("jaeger.baggage-restrictions-update.result=err"),
            1
        );
    }

    #[test]
    fn parses_agent_response() {
        let parsed: Vec<BaggageRestriction> =
            serde_json::from_str(r#"[{"baggageKey":"user","maxValueLength":16}]"#).unwrap();
        assert_eq!(parsed, vec![restriction("user", 16)]);
    }

    #[test]
    fn polls_on_background_thread() {
        let manager = RemoteRestrictionManager::builder("svc")
            .with_restriction_client(ScriptedClient::new(vec![Ok(vec![restriction("user", 3)])]))
            .with_deny_baggage_on_initialization_failure(true)
            .with_refresh_interval(Duration::from_secs(3600))
            .build()
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while !manager.get_restriction("svc", "user").key_allowed() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(manager.get_restriction("svc", "user"), Restriction::new(true, 3));

        manager.close();
        manager.close();
    }
}
