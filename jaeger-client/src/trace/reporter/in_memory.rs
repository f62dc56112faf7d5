use std::sync::{Arc, Mutex};

use super::Reporter;
use crate::trace::FinishedSpan;

/// A [`Reporter`] that keeps finished spans in memory.
///
/// Clones share the same storage, so a clone can be handed to the tracer and
/// the original inspected in tests.
///
/// # Example
///
/// ```
/// use jaeger_client::trace::{InMemoryReporter, StartSpanOptions, Tracer};
///
/// let reporter = InMemoryReporter::new();
/// let tracer = Tracer::builder("my-service")
///     .with_reporter(reporter.clone())
///     .build()
///     .unwrap();
///
/// tracer.start_span("say hello", StartSpanOptions::default()).unwrap().finish();
///
/// let spans = reporter.get_finished_spans();
/// assert_eq!(spans[0].operation_name, "say hello");
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryReporter {
    spans: Arc<Mutex<Vec<FinishedSpan>>>,
}

impl InMemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// The spans reported so far.
    pub fn get_finished_spans(&self) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }

    /// Forget the spans reported so far.
    pub fn reset(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
    }
}

impl Reporter for InMemoryReporter {
    fn report(&self, span: FinishedSpan) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(span);
        }
    }
}
