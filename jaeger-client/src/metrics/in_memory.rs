use std::collections::HashMap;
use std::sync::Mutex;

use super::StatsReporter;

/// A [`StatsReporter`] keeping every value in memory, keyed by the metric
/// name with its tags appended.
///
/// Useful in tests and for embedding applications that poll the values.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use jaeger_client::metrics::{InMemoryStatsReporter, Metrics, StatsFactoryImpl};
///
/// let reporter = Arc::new(InMemoryStatsReporter::new());
/// let metrics = Metrics::new(&StatsFactoryImpl::new(reporter.clone()));
/// metrics.spans_finished().inc(1);
/// assert_eq!(reporter.counter_value("jaeger.spans.group=lifecycle.state=finished"), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStatsReporter {
    counters: Mutex<HashMap<String, i64>>,
    gauges: Mutex<HashMap<String, i64>>,
}

impl InMemoryStatsReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, zero if it was never incremented.
    pub fn counter_value(&self, name: &str) -> i64 {
        self.counters
            .lock()
            .map(|counters| counters.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Last value of a gauge, zero if it was never updated.
    pub fn gauge_value(&self, name: &str) -> i64 {
        self.gauges
            .lock()
            .map(|gauges| gauges.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// A copy of every counter.
    pub fn counters(&self) -> HashMap<String, i64> {
        self.counters
            .lock()
            .map(|counters| counters.clone())
            .unwrap_or_default()
    }

    /// Clears every recorded value.
    pub fn reset(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.clear();
        }
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.clear();
        }
    }
}

fn metric_key(name: &str, tags: &[(String, String)]) -> String {
    let tags: Vec<(&str, &str)> = tags.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    super::add_tags_to_metric_name(name, &tags)
}

impl StatsReporter for InMemoryStatsReporter {
    fn inc_counter(&self, name: &str, delta: i64, tags: &[(String, String)]) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(metric_key(name, tags)).or_insert(0) += delta;
        }
    }

    fn update_gauge(&self, name: &str, value: i64, tags: &[(String, String)]) {
        if let Ok(mut gauges) = self.gauges.lock() {
            gauges.insert(metric_key(name, tags), value);
        }
    }
}
