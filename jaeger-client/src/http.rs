use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{TraceError, TraceResult};

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn build_client(timeout: Duration) -> TraceResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| TraceError::Config(format!("cannot build HTTP client: {err}")))
}

/// `base` with a `service=<name>` query parameter appended.
pub(crate) fn service_endpoint(base: &str, service_name: &str) -> TraceResult<Url> {
    if service_name.is_empty() {
        return Err(TraceError::Config("service name cannot be empty".into()));
    }
    let mut endpoint = Url::parse(base)
        .map_err(|err| TraceError::Config(format!("invalid endpoint {base}: {err}")))?;
    endpoint
        .query_pairs_mut()
        .append_pair("service", service_name);
    Ok(endpoint)
}

/// GETs `url` and decodes the JSON body. Transport errors and non-200
/// statuses are [`TraceError::RemoteQuery`], undecodable bodies
/// [`TraceError::MalformedResponse`].
pub(crate) fn get_json<T: DeserializeOwned>(client: &Client, url: &Url) -> TraceResult<T> {
    let query_error = |message: String| TraceError::RemoteQuery {
        endpoint: url.to_string(),
        message,
    };
    let response = client
        .get(url.clone())
        .send()
        .map_err(|err| query_error(err.to_string()))?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(query_error(format!("received HTTP status {status}")));
    }
    let body = response
        .text()
        .map_err(|err| query_error(err.to_string()))?;
    Ok(serde_json::from_str(&body)?)
}
