//! # Configuration
//!
//! [`Config`] gathers everything needed to assemble a [`Tracer`]: the
//! service name, process tags, and the settings of the sampler, reporter,
//! propagation headers and baggage restrictions. Defaults match the Jaeger
//! agent running on localhost.
//!
//! Environment variables are only read when asked for, through
//! [`Config::from_env`] or [`ConfigBuilder::with_env_overrides`]:
//!
//! * `JAEGER_SERVICE_NAME`
//! * `JAEGER_TAGS`, as `key=value,key2=value2`
//! * `JAEGER_DISABLED`
//! * `JAEGER_TRACEID_128BIT`
//! * `JAEGER_SAMPLER_TYPE`, `JAEGER_SAMPLER_PARAM`, `JAEGER_SAMPLING_ENDPOINT`
//! * `JAEGER_AGENT_HOST`, `JAEGER_AGENT_PORT`, `JAEGER_ENDPOINT`
//! * `JAEGER_REPORTER_LOG_SPANS`, `JAEGER_REPORTER_FLUSH_INTERVAL` (ms),
//!   `JAEGER_REPORTER_MAX_QUEUE_SIZE`
//!
//! Booleans are true when the value is `true`, in any case. Values that do
//! not parse are ignored.
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::reporter::{DEFAULT_BUFFER_FLUSH_INTERVAL, DEFAULT_QUEUE_SIZE};
use super::sampler::{
    DEFAULT_MAX_OPERATIONS, DEFAULT_SAMPLING_PROBABILITY, DEFAULT_SAMPLING_REFRESH_INTERVAL,
    DEFAULT_SAMPLING_SERVER_URL,
};
use super::{
    BufferedSender, CompositeReporter, ConstSampler, HttpTransport, JsonSpanEncoder,
    LoggingReporter, NullReporter, ProbabilisticSampler, RateLimitingSampler,
    RemoteReporter, RemotelyControlledSampler, Reporter, Sampler, Tag, Tracer, UdpTransport,
    JAEGER_DEBUG_HEADER, SAMPLER_TYPE_CONST, SAMPLER_TYPE_PROBABILISTIC,
    SAMPLER_TYPE_RATE_LIMITING, SAMPLER_TYPE_REMOTE,
};
use crate::baggage::{
    RemoteRestrictionManager, DEFAULT_RESTRICTIONS_HOST_PORT,
    DEFAULT_RESTRICTIONS_REFRESH_INTERVAL,
};
use crate::error::{TraceError, TraceResult};
use crate::metrics::Metrics;

pub(crate) const JAEGER_SERVICE_NAME: &str = "JAEGER_SERVICE_NAME";
pub(crate) const JAEGER_TAGS: &str = "JAEGER_TAGS";
pub(crate) const JAEGER_DISABLED: &str = "JAEGER_DISABLED";
pub(crate) const JAEGER_TRACEID_128BIT: &str = "JAEGER_TRACEID_128BIT";
pub(crate) const JAEGER_SAMPLER_TYPE: &str = "JAEGER_SAMPLER_TYPE";
pub(crate) const JAEGER_SAMPLER_PARAM: &str = "JAEGER_SAMPLER_PARAM";
pub(crate) const JAEGER_SAMPLING_ENDPOINT: &str = "JAEGER_SAMPLING_ENDPOINT";
pub(crate) const JAEGER_AGENT_HOST: &str = "JAEGER_AGENT_HOST";
pub(crate) const JAEGER_AGENT_PORT: &str = "JAEGER_AGENT_PORT";
pub(crate) const JAEGER_ENDPOINT: &str = "JAEGER_ENDPOINT";
pub(crate) const JAEGER_REPORTER_LOG_SPANS: &str = "JAEGER_REPORTER_LOG_SPANS";
pub(crate) const JAEGER_REPORTER_FLUSH_INTERVAL: &str = "JAEGER_REPORTER_FLUSH_INTERVAL";
pub(crate) const JAEGER_REPORTER_MAX_QUEUE_SIZE: &str = "JAEGER_REPORTER_MAX_QUEUE_SIZE";

/// Default `host:port` of the local agent receiving spans over UDP.
pub(crate) const DEFAULT_LOCAL_AGENT_HOST_PORT: &str = "127.0.0.1:6831";

const DEFAULT_BAGGAGE_HEADER: &str = "jaeger-baggage";
const DEFAULT_TRACE_CONTEXT_HEADER_NAME: &str = "uber-trace-id";
const DEFAULT_TRACE_BAGGAGE_HEADER_PREFIX: &str = "uberctx-";

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).map(|value| value.eq_ignore_ascii_case("true"))
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|value| T::from_str(value.trim()).ok())
}

/// Splits `host:port` or `[v6]:port`. An address with more than one colon
/// and no brackets is taken as a bare IPv6 host.
fn split_host_port(host_port: &str) -> (&str, &str) {
    if let Some((host, port)) = host_port
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("]:"))
    {
        return (host, port);
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, port),
        _ => (host_port.trim_start_matches('[').trim_end_matches(']'), ""),
    }
}

fn join_host_port(host: &str, port: &str) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Parses `key=value,key2=value2`. A pair with more than one `=` is skipped,
/// a key without `=` gets an empty value.
fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .filter_map(|pair| {
            let mut parts = pair.split('=');
            let key = parts.next()?.trim();
            let value = parts.next().unwrap_or_default().trim();
            if parts.next().is_some() {
                jaeger_warn!(name: "Config.InvalidTag", tag = pair);
                return None;
            }
            Some(Tag::new(key, value))
        })
        .collect()
}

/// How new traces are sampled.
///
/// The meaning of `param` depends on the sampler type: the decision of a
/// constant sampler (non-zero samples everything), the probability of a
/// probabilistic one, the traces per second of a rate limiting one, and the
/// initial probability of a remotely controlled one.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerConfig {
    sampler_type: String,
    param: f64,
    sampling_server_url: String,
    max_operations: usize,
    sampling_refresh_interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig::remote()
    }
}

impl SamplerConfig {
    /// A sampler of type `sampler_type` with parameter `param`.
    pub fn new(sampler_type: impl Into<String>, param: f64) -> Self {
        SamplerConfig {
            sampler_type: sampler_type.into(),
            param,
            sampling_server_url: DEFAULT_SAMPLING_SERVER_URL.to_string(),
            max_operations: DEFAULT_MAX_OPERATIONS,
            sampling_refresh_interval: DEFAULT_SAMPLING_REFRESH_INTERVAL,
        }
    }

    /// Sample every trace, or none.
    pub fn constant(decision: bool) -> Self {
        SamplerConfig::new(SAMPLER_TYPE_CONST, if decision { 1.0 } else { 0.0 })
    }

    /// Sample traces with probability `sampling_rate`.
    pub fn probabilistic(sampling_rate: f64) -> Self {
        SamplerConfig::new(SAMPLER_TYPE_PROBABILISTIC, sampling_rate)
    }

    /// Sample at most `max_traces_per_second` traces per second.
    pub fn rate_limiting(max_traces_per_second: f64) -> Self {
        SamplerConfig::new(SAMPLER_TYPE_RATE_LIMITING, max_traces_per_second)
    }

    /// Fetch the strategy from the agent, sampling with probability 0.001
    /// until then.
    pub fn remote() -> Self {
        SamplerConfig::new(SAMPLER_TYPE_REMOTE, DEFAULT_SAMPLING_PROBABILITY)
    }

    /// Endpoint of the remote sampler. An empty string keeps the default.
    pub fn with_sampling_server_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.is_empty() {
            self.sampling_server_url = url;
        }
        self
    }

    /// Limit of operations of the adaptive sampler. Zero keeps the default
    /// of 2000.
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        if max_operations > 0 {
            self.max_operations = max_operations;
        }
        self
    }

    /// Interval between strategy fetches. Zero keeps the default of 60
    /// seconds.
    pub fn with_sampling_refresh_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.sampling_refresh_interval = interval;
        }
        self
    }

    /// The sampler type.
    pub fn sampler_type(&self) -> &str {
        &self.sampler_type
    }

    /// The sampler parameter.
    pub fn param(&self) -> f64 {
        self.param
    }

    /// Endpoint of the remote sampler.
    pub fn sampling_server_url(&self) -> &str {
        &self.sampling_server_url
    }

    /// Limit of operations of the adaptive sampler.
    pub fn max_operations(&self) -> usize {
        self.max_operations
    }

    /// Interval between strategy fetches.
    pub fn sampling_refresh_interval(&self) -> Duration {
        self.sampling_refresh_interval
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(sampler_type) = env_string(JAEGER_SAMPLER_TYPE) {
            self.sampler_type = sampler_type;
        }
        if let Some(param) = env_parse::<f64>(JAEGER_SAMPLER_PARAM) {
            self.param = param;
        }
        if let Some(url) = env_string(JAEGER_SAMPLING_ENDPOINT) {
            self.sampling_server_url = url;
        }
        self
    }

    /// Create the configured sampler. Remote samplers start polling at once.
    pub fn make_sampler(&self, service_name: &str, metrics: Arc<Metrics>) -> TraceResult<Box<dyn Sampler>> {
        let sampler_type = self.sampler_type.to_ascii_lowercase();
        match sampler_type.as_str() {
            SAMPLER_TYPE_CONST => Ok(Box::new(ConstSampler::new(self.param != 0.0))),
            SAMPLER_TYPE_PROBABILISTIC => Ok(Box::new(self.probabilistic_sampler()?)),
            SAMPLER_TYPE_RATE_LIMITING => Ok(Box::new(RateLimitingSampler::new(self.param))),
            SAMPLER_TYPE_REMOTE | "" => {
                let sampler = RemotelyControlledSampler::builder(service_name)
                    .with_sampling_server_url(self.sampling_server_url.clone())
                    .with_initial_sampler(self.probabilistic_sampler()?)
                    .with_max_operations(self.max_operations)
                    .with_sampling_refresh_interval(self.sampling_refresh_interval)
                    .with_metrics(metrics)
                    .build()?;
                Ok(Box::new(sampler))
            }
            _ => Err(TraceError::Config(format!("unknown sampler type {}", self.sampler_type))),
        }
    }

    fn probabilistic_sampler(&self) -> TraceResult<ProbabilisticSampler> {
        if !(0.0..=1.0).contains(&self.param) {
            return Err(TraceError::Config(format!(
                "invalid parameter for probabilistic sampler: {}, expecting a value between 0 and 1",
                self.param
            )));
        }
        Ok(ProbabilisticSampler::new(self.param))
    }
}

/// Where and how finished spans are sent.
///
/// Spans go to the agent over UDP unless a collector endpoint is set, in
/// which case they are posted over HTTP.
#[derive(Clone, Debug, PartialEq)]
pub struct ReporterConfig {
    queue_size: usize,
    buffer_flush_interval: Duration,
    log_spans: bool,
    local_agent_host_port: String,
    endpoint: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            queue_size: DEFAULT_QUEUE_SIZE,
            buffer_flush_interval: DEFAULT_BUFFER_FLUSH_INTERVAL,
            log_spans: false,
            local_agent_host_port: DEFAULT_LOCAL_AGENT_HOST_PORT.to_string(),
            endpoint: String::new(),
        }
    }
}

impl ReporterConfig {
    /// Capacity of the span queue. Zero keeps the default of 100.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        if queue_size > 0 {
            self.queue_size = queue_size;
        }
        self
    }

    /// Interval between flushes of an idle sender. Zero keeps the default of
    /// 10 seconds.
    pub fn with_buffer_flush_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.buffer_flush_interval = interval;
        }
        self
    }

    /// Also log every reported span.
    pub fn with_log_spans(mut self, log_spans: bool) -> Self {
        self.log_spans = log_spans;
        self
    }

    /// `host:port` of the agent. An empty string keeps the default.
    pub fn with_local_agent_host_port(mut self, host_port: impl Into<String>) -> Self {
        let host_port = host_port.into();
        if !host_port.is_empty() {
            self.local_agent_host_port = host_port;
        }
        self
    }

    /// HTTP endpoint of the collector. When set, spans bypass the agent.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Capacity of the span queue.
    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    /// Interval between flushes of an idle sender.
    pub fn buffer_flush_interval(&self) -> Duration {
        self.buffer_flush_interval
    }

    /// Whether reported spans are also logged.
    pub fn log_spans(&self) -> bool {
        self.log_spans
    }

    /// `host:port` of the agent.
    pub fn local_agent_host_port(&self) -> &str {
        &self.local_agent_host_port
    }

    /// HTTP endpoint of the collector, empty when spans go to the agent.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(host) = env_string(JAEGER_AGENT_HOST) {
            let (_, port) = split_host_port(&self.local_agent_host_port);
            self.local_agent_host_port = join_host_port(&host, port);
        }
        if let Some(port) = env_parse::<u16>(JAEGER_AGENT_PORT) {
            let (host, _) = split_host_port(&self.local_agent_host_port);
            self.local_agent_host_port = join_host_port(host, &port.to_string());
        }
        if let Some(endpoint) = env_string(JAEGER_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(log_spans) = env_bool(JAEGER_REPORTER_LOG_SPANS) {
            self.log_spans = log_spans;
        }
        if let Some(interval) = env_parse::<u64>(JAEGER_REPORTER_FLUSH_INTERVAL).filter(|ms| *ms > 0) {
            self.buffer_flush_interval = Duration::from_millis(interval);
        }
        if let Some(queue_size) = env_parse::<usize>(JAEGER_REPORTER_MAX_QUEUE_SIZE).filter(|size| *size > 0) {
            self.queue_size = queue_size;
        }
        self
    }

    /// Create a [`RemoteReporter`] over the configured transport, combined
    /// with a [`LoggingReporter`] when span logging is enabled.
    pub fn make_reporter(&self, metrics: Arc<Metrics>) -> TraceResult<Box<dyn Reporter>> {
        let builder = if self.endpoint.is_empty() {
            let transport = UdpTransport::new(&self.local_agent_host_port)?;
            RemoteReporter::builder(BufferedSender::new(JsonSpanEncoder, transport))
        } else {
            let transport = HttpTransport::new(self.endpoint.clone())?;
            RemoteReporter::builder(BufferedSender::new(JsonSpanEncoder, transport))
        };
        let reporter = builder
            .with_queue_size(self.queue_size)
            .with_buffer_flush_interval(self.buffer_flush_interval)
            .with_metrics(metrics)
            .build()?;

        if self.log_spans {
            jaeger_info!(name: "ReporterConfig.LoggingReporterEnabled");
            return Ok(Box::new(CompositeReporter::new(vec![
                Box::new(reporter),
                Box::new(LoggingReporter),
            ])));
        }
        Ok(Box::new(reporter))
    }
}

/// Settings of the remote baggage restriction manager.
#[derive(Clone, Debug, PartialEq)]
pub struct BaggageRestrictionsConfig {
    deny_baggage_on_initialization_failure: bool,
    host_port: String,
    refresh_interval: Duration,
}

impl Default for BaggageRestrictionsConfig {
    fn default() -> Self {
        BaggageRestrictionsConfig {
            deny_baggage_on_initialization_failure: false,
            host_port: DEFAULT_RESTRICTIONS_HOST_PORT.to_string(),
            refresh_interval: DEFAULT_RESTRICTIONS_REFRESH_INTERVAL,
        }
    }
}

impl BaggageRestrictionsConfig {
    /// Deny every key until restrictions were fetched once.
    pub fn with_deny_baggage_on_initialization_failure(mut self, deny: bool) -> Self {
        self.deny_baggage_on_initialization_failure = deny;
        self
    }

    /// `host:port` of the agent serving restrictions. An empty string keeps
    /// the default.
    pub fn with_host_port(mut self, host_port: impl Into<String>) -> Self {
        let host_port = host_port.into();
        if !host_port.is_empty() {
            self.host_port = host_port;
        }
        self
    }

    /// Interval between fetches. Zero keeps the default of 60 seconds.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.refresh_interval = interval;
        }
        self
    }

    /// Whether every key is denied until restrictions were fetched once.
    pub fn deny_baggage_on_initialization_failure(&self) -> bool {
        self.deny_baggage_on_initialization_failure
    }

    /// `host:port` of the agent serving restrictions.
    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Interval between fetches.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Create the restriction manager. It starts polling at once.
    pub fn make_restriction_manager(
        &self,
        service_name: &str,
        metrics: Arc<Metrics>,
    ) -> TraceResult<RemoteRestrictionManager> {
        RemoteRestrictionManager::builder(service_name)
            .with_host_port(self.host_port.clone())
            .with_deny_baggage_on_initialization_failure(self.deny_baggage_on_initialization_failure)
            .with_refresh_interval(self.refresh_interval)
            .with_metrics(metrics)
            .build()
    }
}

/// Names of the headers used by propagation codecs. Only the debug header
/// is used by the tracer itself, as the key of the tag recording a debug id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeadersConfig {
    jaeger_debug_header: String,
    jaeger_baggage_header: String,
    trace_context_header_name: String,
    trace_baggage_header_prefix: String,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        HeadersConfig {
            jaeger_debug_header: JAEGER_DEBUG_HEADER.to_string(),
            jaeger_baggage_header: DEFAULT_BAGGAGE_HEADER.to_string(),
            trace_context_header_name: DEFAULT_TRACE_CONTEXT_HEADER_NAME.to_string(),
            trace_baggage_header_prefix: DEFAULT_TRACE_BAGGAGE_HEADER_PREFIX.to_string(),
        }
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

impl HeadersConfig {
    /// Header carrying a debug id. Defaults to `jaeger-debug-id`.
    pub fn with_jaeger_debug_header(mut self, header: impl Into<String>) -> Self {
        self.jaeger_debug_header = non_empty_or(header.into(), JAEGER_DEBUG_HEADER);
        self
    }

    /// Header carrying baggage without a trace. Defaults to `jaeger-baggage`.
    pub fn with_jaeger_baggage_header(mut self, header: impl Into<String>) -> Self {
        self.jaeger_baggage_header = non_empty_or(header.into(), DEFAULT_BAGGAGE_HEADER);
        self
    }

    /// Header carrying the span context. Defaults to `uber-trace-id`.
    pub fn with_trace_context_header_name(mut self, header: impl Into<String>) -> Self {
        self.trace_context_header_name = non_empty_or(header.into(), DEFAULT_TRACE_CONTEXT_HEADER_NAME);
        self
    }

    /// Prefix of the headers carrying baggage items. Defaults to `uberctx-`.
    pub fn with_trace_baggage_header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.trace_baggage_header_prefix = non_empty_or(prefix.into(), DEFAULT_TRACE_BAGGAGE_HEADER_PREFIX);
        self
    }

    /// Header carrying a debug id.
    pub fn jaeger_debug_header(&self) -> &str {
        &self.jaeger_debug_header
    }

    /// Header carrying baggage without a trace.
    pub fn jaeger_baggage_header(&self) -> &str {
        &self.jaeger_baggage_header
    }

    /// Header carrying the span context.
    pub fn trace_context_header_name(&self) -> &str {
        &self.trace_context_header_name
    }

    /// Prefix of the headers carrying baggage items.
    pub fn trace_baggage_header_prefix(&self) -> &str {
        &self.trace_baggage_header_prefix
    }
}

/// Complete configuration of a tracer.
///
/// # Example
///
/// ```no_run
/// use jaeger_client::trace::{Config, ReporterConfig, SamplerConfig};
///
/// # fn main() -> jaeger_client::error::TraceResult<()> {
/// let tracer = Config::builder("checkout")
///     .with_sampler(SamplerConfig::probabilistic(0.1))
///     .with_reporter(ReporterConfig::default().with_log_spans(true))
///     .build()?
///     .build_tracer()?;
/// # tracer.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    service_name: String,
    disabled: bool,
    trace_id_128bit: bool,
    tags: Vec<Tag>,
    sampler: SamplerConfig,
    reporter: ReporterConfig,
    headers: HeadersConfig,
    baggage_restrictions: Option<BaggageRestrictionsConfig>,
}

impl Config {
    /// Create a builder for the configuration of `service_name`.
    pub fn builder(service_name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            service_name: service_name.into(),
            disabled: false,
            trace_id_128bit: false,
            tags: Vec::new(),
            sampler: SamplerConfig::default(),
            reporter: ReporterConfig::default(),
            headers: HeadersConfig::default(),
            baggage_restrictions: None,
        }
    }

    /// Default configuration overridden by the `JAEGER_*` environment
    /// variables. `JAEGER_SERVICE_NAME` must be set.
    pub fn from_env() -> TraceResult<Config> {
        Config::builder(String::new()).with_env_overrides().build()
    }

    /// The service name.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Whether tracing is disabled.
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Whether new traces get 128-bit ids.
    pub fn trace_id_128bit(&self) -> bool {
        self.trace_id_128bit
    }

    /// Process tags added to the defaults.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Sampler settings.
    pub fn sampler(&self) -> &SamplerConfig {
        &self.sampler
    }

    /// Reporter settings.
    pub fn reporter(&self) -> &ReporterConfig {
        &self.reporter
    }

    /// Header names.
    pub fn headers(&self) -> &HeadersConfig {
        &self.headers
    }

    /// Remote baggage restriction settings, if enabled.
    pub fn baggage_restrictions(&self) -> Option<&BaggageRestrictionsConfig> {
        self.baggage_restrictions.as_ref()
    }

    /// Build a tracer discarding its metrics.
    pub fn build_tracer(&self) -> TraceResult<Tracer> {
        self.build_tracer_with_metrics(Arc::new(Metrics::null()))
    }

    /// Build a tracer updating `metrics`.
    ///
    /// A disabled configuration yields a tracer that samples nothing and
    /// reports nothing, with no background threads.
    pub fn build_tracer_with_metrics(&self, metrics: Arc<Metrics>) -> TraceResult<Tracer> {
        let builder = Tracer::builder(self.service_name.clone())
            .with_metrics(metrics.clone())
            .with_tags(self.tags.clone())
            .with_128bit_trace_ids(self.trace_id_128bit)
            .with_debug_header(self.headers.jaeger_debug_header());
        if self.disabled {
            return builder
                .with_sampler(ConstSampler::new(false))
                .with_reporter(NullReporter)
                .build();
        }

        let sampler = self.sampler.make_sampler(&self.service_name, metrics.clone())?;
        let reporter = self.reporter.make_reporter(metrics.clone())?;
        let builder = builder.with_sampler(sampler).with_reporter(reporter);
        match &self.baggage_restrictions {
            Some(restrictions) => builder
                .with_restriction_manager(restrictions.make_restriction_manager(&self.service_name, metrics)?)
                .build(),
            None => builder.build(),
        }
    }
}

/// Builder for [`Config`].
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    service_name: String,
    disabled: bool,
    trace_id_128bit: bool,
    tags: Vec<Tag>,
    sampler: SamplerConfig,
    reporter: ReporterConfig,
    headers: HeadersConfig,
    baggage_restrictions: Option<BaggageRestrictionsConfig>,
}

impl ConfigBuilder {
    /// Disable tracing altogether.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Generate 128-bit trace ids for new traces.
    pub fn with_trace_id_128bit(mut self, enabled: bool) -> Self {
        self.trace_id_128bit = enabled;
        self
    }

    /// Add process tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Sampler settings. Defaults to [`SamplerConfig::remote`].
    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    /// Reporter settings.
    pub fn with_reporter(mut self, reporter: ReporterConfig) -> Self {
        self.reporter = reporter;
        self
    }

    /// Header names.
    pub fn with_headers(mut self, headers: HeadersConfig) -> Self {
        self.headers = headers;
        self
    }

    /// Fetch baggage restrictions from the agent. Without this every key is
    /// allowed with values of up to 2048 bytes.
    pub fn with_baggage_restrictions(mut self, restrictions: BaggageRestrictionsConfig) -> Self {
        self.baggage_restrictions = Some(restrictions);
        self
    }

    /// Override the settings with the `JAEGER_*` environment variables that
    /// are set. Tags from `JAEGER_TAGS` are added to the configured ones.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(disabled) = env_bool(JAEGER_DISABLED) {
            self.disabled = disabled;
        }
        if let Some(trace_id_128bit) = env_bool(JAEGER_TRACEID_128BIT) {
            self.trace_id_128bit = trace_id_128bit;
        }
        if let Some(service_name) = env_string(JAEGER_SERVICE_NAME) {
            self.service_name = service_name;
        }
        if let Some(tags) = env_string(JAEGER_TAGS) {
            self.tags.extend(parse_tags(&tags));
        }
        self.sampler = self.sampler.init_from_env_vars();
        self.reporter = self.reporter.init_from_env_vars();
        self
    }

    /// Build the configuration. The service name must not be empty.
    pub fn build(self) -> TraceResult<Config> {
        if self.service_name.is_empty() {
            return Err(TraceError::Config("no service name provided".into()));
        }
        Ok(Config {
            service_name: self.service_name,
            disabled: self.disabled,
            trace_id_128bit: self.trace_id_128bit,
            tags: self.tags,
            sampler: self.sampler,
            reporter: self.reporter,
            headers: self.headers,
            baggage_restrictions: self.baggage_restrictions,
        })
    }
}
