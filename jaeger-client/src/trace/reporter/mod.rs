//! Reporters receive the sampled spans finished by a
//! [`Tracer`](crate::trace::Tracer).
//!
//! [`RemoteReporter`] is the one to use in production: it queues spans and
//! hands them to a [`Sender`](crate::trace::Sender) on a background thread.
//! The others are useful for debugging, testing and combining reporters.
use std::fmt;

use super::FinishedSpan;

mod in_memory;
mod remote;

pub use in_memory::InMemoryReporter;
pub use remote::{RemoteReporter, RemoteReporterBuilder};

pub(crate) use remote::{DEFAULT_BUFFER_FLUSH_INTERVAL, DEFAULT_QUEUE_SIZE};

/// Receives finished, sampled spans.
///
/// `report` is called on the thread finishing the span and must not block.
pub trait Reporter: Send + Sync + fmt::Debug {
    /// Accept a finished span.
    fn report(&self, span: FinishedSpan);

    /// Deliver pending spans and release resources. Called once by
    /// [`Tracer::close`](crate::trace::Tracer::close).
    fn close(&self) {}
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn report(&self, span: FinishedSpan) {
        self.as_ref().report(span)
    }

    fn close(&self) {
        self.as_ref().close()
    }
}

/// Discards every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _span: FinishedSpan) {}
}

/// Logs every span as an `info` event of the `tracing` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingReporter;

impl Reporter for LoggingReporter {
    fn report(&self, span: FinishedSpan) {
        jaeger_info!(
            name: "LoggingReporter.ReportingSpan",
            context = span.context.to_string(),
            operation_name = span.operation_name.as_str(),
            duration_us = span.duration.as_micros() as u64
        );
    }
}

/// Forwards every span to each of its reporters.
#[derive(Debug, Default)]
pub struct CompositeReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl CompositeReporter {
    /// Combine `reporters`.
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        CompositeReporter { reporters }
    }
}

impl Reporter for CompositeReporter {
    fn report(&self, span: FinishedSpan) {
        if let Some((last, rest)) = self.reporters.split_last() {
            for reporter in rest {
                reporter.report(span.clone());
            }
            last.report(span);
        }
    }

    fn close(&self) {
        for reporter in &self.reporters {
            reporter.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::finished_span;

    #[test]
    fn composite_reporter_fans_out() {
        let first = InMemoryReporter::new();
        let second = InMemoryReporter::new();
        let composite = CompositeReporter::new(vec![
            Box::new(first.clone()),
            Box::new(LoggingReporter),
            Box::new(second.clone()),
        ]);

        composite.report(finished_span("a"));
        composite.report(finished_span("b"));
        composite.close();

        assert_eq!(first.get_finished_spans().len(), 2);
        assert_eq!(second.get_finished_spans()[1].operation_name, "b");
    }

    #[test]
    fn null_reporter_discards() {
        let reporter: Box<dyn Reporter> = Box::new(NullReporter);
        reporter.report(finished_span("ignored"));
        reporter.close();
    }
}
