//! Counters and gauges describing what the client is doing.
//!
//! Instruments are created by a [`StatsFactory`]. The [`NullStatsFactory`]
//! discards everything; [`StatsFactoryImpl`] forwards every update to a
//! [`StatsReporter`], such as the [`InMemoryStatsReporter`].
//!
//! Tagged metrics are flattened into a single name, `name.k1=v1.k2=v2`, with
//! tags sorted by key. See [`add_tags_to_metric_name`].
use std::fmt;
use std::sync::Arc;

mod in_memory;

pub use in_memory::InMemoryStatsReporter;

/// A monotonically increasing count.
pub trait Counter: Send + Sync + fmt::Debug {
    /// Adds `delta` to the counter.
    fn inc(&self, delta: i64);
}

/// A value that is set rather than accumulated.
pub trait Gauge: Send + Sync + fmt::Debug {
    /// Records the current value.
    fn update(&self, value: i64);
}

/// Creates the instruments used by [`Metrics`].
pub trait StatsFactory: fmt::Debug {
    /// Create a counter.
    fn create_counter(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Counter>;

    /// Create a gauge.
    fn create_gauge(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Gauge>;
}

/// Receives every counter and gauge update made through a [`StatsFactoryImpl`].
pub trait StatsReporter: Send + Sync + fmt::Debug {
    /// Adds `delta` to the counter `name`.
    fn inc_counter(&self, name: &str, delta: i64, tags: &[(String, String)]);

    /// Sets the gauge `name` to `value`.
    fn update_gauge(&self, name: &str, value: i64, tags: &[(String, String)]);
}

/// Appends the tags to a metric name as `.key=value`, sorted by key.
///
/// ```
/// use jaeger_client::metrics::add_tags_to_metric_name;
///
/// let name = add_tags_to_metric_name("jaeger.traces", &[("state", "started"), ("sampled", "y")]);
/// assert_eq!(name, "jaeger.traces.sampled=y.state=started");
/// ```
pub fn add_tags_to_metric_name(name: &str, tags: &[(&str, &str)]) -> String {
    let mut tags = tags.to_vec();
    tags.sort();
    let mut out = String::from(name);
    for (key, value) in tags {
        out.push('.');
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    out
}

#[derive(Debug)]
struct NoopInstrument;

impl Counter for NoopInstrument {
    fn inc(&self, _delta: i64) {}
}

impl Gauge for NoopInstrument {
    fn update(&self, _value: i64) {}
}

/// A [`StatsFactory`] whose instruments discard every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullStatsFactory;

impl StatsFactory for NullStatsFactory {
    fn create_counter(&self, _name: &str, _tags: &[(&str, &str)]) -> Box<dyn Counter> {
        Box::new(NoopInstrument)
    }

    fn create_gauge(&self, _name: &str, _tags: &[(&str, &str)]) -> Box<dyn Gauge> {
        Box::new(NoopInstrument)
    }
}

/// A [`StatsFactory`] forwarding every update to a [`StatsReporter`].
#[derive(Clone, Debug)]
pub struct StatsFactoryImpl {
    reporter: Arc<dyn StatsReporter>,
}

impl StatsFactoryImpl {
    /// Create a factory reporting to `reporter`.
    pub fn new(reporter: Arc<dyn StatsReporter>) -> Self {
        StatsFactoryImpl { reporter }
    }
}

#[derive(Debug)]
struct ReportedInstrument {
    name: String,
    tags: Vec<(String, String)>,
    reporter: Arc<dyn StatsReporter>,
}

impl ReportedInstrument {
    fn new(name: &str, tags: &[(&str, &str)], reporter: Arc<dyn StatsReporter>) -> Self {
        ReportedInstrument {
            name: name.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            reporter,
        }
    }
}

impl Counter for ReportedInstrument {
    fn inc(&self, delta: i64) {
        self.reporter.inc_counter(&self.name, delta, &self.tags);
    }
}

impl Gauge for ReportedInstrument {
    fn update(&self, value: i64) {
        self.reporter.update_gauge(&self.name, value, &self.tags);
    }
}

impl StatsFactory for StatsFactoryImpl {
    fn create_counter(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Counter> {
        Box::new(ReportedInstrument::new(name, tags, self.reporter.clone()))
    }

    fn create_gauge(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Gauge> {
        Box::new(ReportedInstrument::new(name, tags, self.reporter.clone()))
    }
}

macro_rules! metrics {
    (
        $(
            $(#[$doc:meta])*
            $field:ident: $kind:ident($name:expr $(, $k:expr => $v:expr)*);
        )+
    ) => {
        /// Every instrument the client updates.
        ///
        /// Shared by the tracer, samplers, reporters and baggage components
        /// through an [`Arc`].
        #[derive(Debug)]
        pub struct Metrics {
            $(
                $field: Box<dyn $kind>,
            )+
        }

        impl Metrics {
            /// Create all instruments with `factory`.
            pub fn new(factory: &dyn StatsFactory) -> Self {
                Metrics {
                    $(
                        $field: metrics!(@create factory, $kind, $name $(, $k => $v)*),
                    )+
                }
            }

            $(
                $(#[$doc])*
                pub fn $field(&self) -> &dyn $kind {
                    self.$field.as_ref()
                }
            )+
        }
    };
    (@create $factory:ident, Counter, $name:expr $(, $k:expr => $v:expr)*) => {
        $factory.create_counter($name, &[$(($k, $v)),*])
    };
    (@create $factory:ident, Gauge, $name:expr $(, $k:expr => $v:expr)*) => {
        $factory.create_gauge($name, &[$(($k, $v)),*])
    };
}

metrics! {
    /// New traces started with a positive sampling decision.
    traces_started_sampled: Counter("jaeger.traces", "state" => "started", "sampled" => "y");
    /// New traces started with a negative sampling decision.
    traces_started_not_sampled: Counter("jaeger.traces", "state" => "started", "sampled" => "n");
    /// Spans started.
    spans_started: Counter("jaeger.spans", "state" => "started", "group" => "lifecycle");
    /// Spans finished, sampled or not.
    spans_finished: Counter("jaeger.spans", "state" => "finished", "group" => "lifecycle");
    /// Spans started as part of a sampled trace.
    spans_sampled: Counter("jaeger.spans", "group" => "sampling", "sampled" => "y");
    /// Spans started as part of an unsampled trace.
    spans_not_sampled: Counter("jaeger.spans", "group" => "sampling", "sampled" => "n");
    /// Span contexts that could not be decoded from a carrier.
    decoding_errors: Counter("jaeger.decoding-errors");
    /// Spans delivered by the sender.
    reporter_success: Counter("jaeger.reporter-spans", "state" => "success");
    /// Spans the sender failed to deliver.
    reporter_failure: Counter("jaeger.reporter-spans", "state" => "failure");
    /// Spans dropped because the reporter queue was full.
    reporter_dropped: Counter("jaeger.reporter-spans", "state" => "dropped");
    /// Number of spans waiting in the reporter queue.
    reporter_queue_length: Gauge("jaeger.reporter-queue");
    /// Sampling strategies fetched from the remote endpoint.
    sampler_retrieved: Counter("jaeger.sampler", "state" => "retrieved");
    /// Sampler updates applied from a fetched strategy.
    sampler_updated: Counter("jaeger.sampler", "state" => "updated");
    /// Fetched strategies that could not be applied.
    sampler_update_failure: Counter("jaeger.sampler", "state" => "failure", "phase" => "updating");
    /// Failed queries to the sampling endpoint.
    sampler_query_failure: Counter("jaeger.sampler", "state" => "failure", "phase" => "query");
    /// Sampling endpoint responses that could not be decoded.
    sampler_parsing_failure: Counter("jaeger.sampler", "state" => "failure", "phase" => "parsing");
    /// Baggage items set.
    baggage_update_success: Counter("jaeger.baggage-update", "result" => "ok");
    /// Baggage items rejected by the restriction manager.
    baggage_update_failure: Counter("jaeger.baggage-update", "result" => "err");
    /// Baggage values truncated to their maximum length.
    baggage_truncate: Counter("jaeger.baggage-truncate");
    /// Baggage restrictions fetched from the remote endpoint.
    baggage_restrictions_update_success: Counter("jaeger.baggage-restrictions-update", "result" => "ok");
    /// Failed fetches of baggage restrictions.
    baggage_restrictions_update_failure: Counter("jaeger.baggage-restrictions-update", "result" => "err");
}

impl Metrics {
    /// Metrics whose instruments discard every update.
    pub fn null() -> Self {
        Metrics::new(&NullStatsFactory)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::null()
    }
}
