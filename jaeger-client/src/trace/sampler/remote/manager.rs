use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;

use super::strategy::SamplingStrategyResponse;
use crate::error::TraceResult;
use crate::http;

/// Fetches the sampling strategy of a service from the control plane.
pub trait SamplingManager: Send + Sync + fmt::Debug {
    /// Returns the current strategy of `service_name`.
    ///
    /// Fails with [`TraceError::RemoteQuery`](crate::error::TraceError::RemoteQuery)
    /// when the endpoint cannot be reached and with
    /// [`TraceError::MalformedResponse`](crate::error::TraceError::MalformedResponse)
    /// when its answer cannot be decoded.
    fn get_sampling_strategy(&self, service_name: &str) -> TraceResult<SamplingStrategyResponse>;
}

/// [`SamplingManager`] querying `GET <server_url>?service=<name>` on the
/// Jaeger agent and decoding its JSON answer.
#[derive(Debug, Clone)]
pub struct HttpSamplingManager {
    server_url: String,
    client: Client,
}

impl HttpSamplingManager {
    /// Create a manager for the sampling endpoint at `server_url`.
    pub fn new(server_url: impl Into<String>) -> TraceResult<Self> {
        Self::with_timeout(server_url, http::DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a manager whose requests time out after `timeout`.
    pub fn with_timeout(server_url: impl Into<String>, timeout: Duration) -> TraceResult<Self> {
        Ok(HttpSamplingManager {
            server_url: server_url.into(),
            client: http::build_client(timeout)?,
        })
    }

    /// The sampling endpoint.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl SamplingManager for HttpSamplingManager {
    fn get_sampling_strategy(&self, service_name: &str) -> TraceResult<SamplingStrategyResponse> {
        let url = http::service_endpoint(&self.server_url, service_name)?;
        http::get_json(&self.client, &url)
    }
}
