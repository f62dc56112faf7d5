use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::Reporter;
use crate::error::TraceResult;
use crate::metrics::Metrics;
use crate::trace::{FinishedSpan, Sender};

/// Default capacity of the span queue.
pub(crate) const DEFAULT_QUEUE_SIZE: usize = 100;
/// Default interval between two flushes of the sender.
pub(crate) const DEFAULT_BUFFER_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct QueueState {
    spans: VecDeque<FinishedSpan>,
    running: bool,
}

#[derive(Debug)]
struct Queue {
    state: Mutex<QueueState>,
    cvar: Condvar,
}

/// Reporter queueing spans for a [`Sender`] driven by a dedicated thread.
///
/// [`report`](Reporter::report) never blocks: when the queue already holds
/// `queue_size` spans the new span is dropped and counted. The background
/// thread hands queued spans to the sender one at a time and flushes the
/// sender when the queue stays empty for a whole flush interval.
///
/// [`close`](Reporter::close) stops accepting spans, lets the thread drain
/// the queue, flushes and closes the sender. Calling it more than once is
/// harmless.
#[derive(Debug)]
pub struct RemoteReporter {
    queue: Arc<Queue>,
    queue_size: usize,
    metrics: Arc<Metrics>,
    dropped_span_count: AtomicUsize,
    handle: Mutex<Option<thread::JoinHandle<Box<dyn Sender>>>>,
}

impl RemoteReporter {
    /// Create a builder for a reporter delivering through `sender`.
    pub fn builder<S: Sender + 'static>(sender: S) -> RemoteReporterBuilder {
        RemoteReporterBuilder {
            sender: Box::new(sender),
            queue_size: DEFAULT_QUEUE_SIZE,
            buffer_flush_interval: DEFAULT_BUFFER_FLUSH_INTERVAL,
            metrics: None,
        }
    }

    fn new(
        sender: Box<dyn Sender>,
        queue_size: usize,
        buffer_flush_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> TraceResult<Self> {
        let queue = Arc::new(Queue {
            state: Mutex::new(QueueState {
                spans: VecDeque::with_capacity(queue_size),
                running: true,
            }),
            cvar: Condvar::new(),
        });

        let thread_queue = queue.clone();
        let thread_metrics = metrics.clone();
        let handle = thread::Builder::new()
            .name("JaegerRemoteReporter".to_string())
            .spawn(move || {
                jaeger_debug!(name: "RemoteReporter.ThreadStarted");
                let sender = sweep_queue(&thread_queue, sender, buffer_flush_interval, &thread_metrics);
                jaeger_debug!(name: "RemoteReporter.ThreadStopped");
                sender
            })?;

        Ok(RemoteReporter {
            queue,
            queue_size,
            metrics,
            dropped_span_count: AtomicUsize::new(0),
            handle: Mutex::new(Some(handle)),
        })
    }

    fn drop_span(&self) {
        self.metrics.reporter_dropped().inc(1);
        // Warn on the first drop only, the total is logged on close.
        if self.dropped_span_count.fetch_add(1, Ordering::Relaxed) == 0 {
            jaeger_warn!(
                name: "RemoteReporter.SpanDroppingStarted",
                message = "RemoteReporter dropped a span because its queue is full or it is closed. No further warning is emitted until close."
            );
        }
    }
}

/// Runs on the reporter thread until the reporter is closed and its queue is
/// empty. Returns the sender for the final flush.
fn sweep_queue(
    queue: &Queue,
    mut sender: Box<dyn Sender>,
    buffer_flush_interval: Duration,
    metrics: &Metrics,
) -> Box<dyn Sender> {
    let mut last_flush = Instant::now();
    loop {
        let Ok(state) = queue.state.lock() else {
            break;
        };
        let timeout = buffer_flush_interval.saturating_sub(last_flush.elapsed());
        let Ok((mut state, _)) = queue
            .cvar
            .wait_timeout_while(state, timeout, |state| state.running && state.spans.is_empty())
        else {
            break;
        };
        if !state.running && state.spans.is_empty() {
            break;
        }

        match state.spans.pop_front() {
            Some(span) => {
                let queue_length = state.spans.len();
                drop(state);
                send_span(sender.as_mut(), &span, queue_length, metrics);
            }
            None => {
                drop(state);
                if last_flush.elapsed() >= buffer_flush_interval {
                    flush(sender.as_mut(), metrics);
                    last_flush = Instant::now();
                }
            }
        }
    }
    sender
}

fn send_span(sender: &mut dyn Sender, span: &FinishedSpan, queue_length: usize, metrics: &Metrics) {
    match sender.append(span) {
        Ok(flushed) => {
            if flushed > 0 {
                metrics.reporter_success().inc(flushed as i64);
                metrics.reporter_queue_length().update(queue_length as i64);
            }
        }
        Err(err) => {
            metrics.reporter_failure().inc(err.num_failed() as i64);
            jaeger_error!(
                name: "RemoteReporter.SendSpanFailed",
                operation_name = span.operation_name.as_str(),
                error = err.to_string()
            );
        }
    }
}

fn flush(sender: &mut dyn Sender, metrics: &Metrics) {
    match sender.flush() {
        Ok(flushed) => {
            if flushed > 0 {
                metrics.reporter_success().inc(flushed as i64);
            }
        }
        Err(err) => {
            metrics.reporter_failure().inc(err.num_failed() as i64);
            jaeger_error!(name: "RemoteReporter.FlushFailed", error = err.to_string());
        }
    }
}

impl Reporter for RemoteReporter {
    fn report(&self, span: FinishedSpan) {
        let pushed = match self.queue.state.lock() {
            Ok(mut state) if state.running && state.spans.len() < self.queue_size => {
                state.spans.push_back(span);
                true
            }
            _ => false,
        };
        if pushed {
            self.queue.cvar.notify_one();
        } else {
            self.drop_span();
        }
    }

    fn close(&self) {
        match self.queue.state.lock() {
            Ok(mut state) => {
                if !state.running {
                    return;
                }
                state.running = false;
            }
            Err(poisoned) => poisoned.into_inner().running = false,
        }
        self.queue.cvar.notify_all();

        let handle = match self.handle.lock() {
            Ok(mut handle) => handle.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };
        match handle.join() {
            Ok(mut sender) => {
                flush(sender.as_mut(), &self.metrics);
                if let Err(err) = sender.close() {
                    jaeger_error!(name: "RemoteReporter.CloseSenderFailed", error = err.to_string());
                }
            }
            Err(_) => {
                jaeger_error!(name: "RemoteReporter.JoinFailed");
            }
        }

        let dropped = self.dropped_span_count.load(Ordering::Relaxed);
        if dropped > 0 {
            jaeger_warn!(name: "RemoteReporter.SpansDropped", dropped_spans = dropped);
        }
    }
}

impl Drop for RemoteReporter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`RemoteReporter`].
#[derive(Debug)]
pub struct RemoteReporterBuilder {
    sender: Box<dyn Sender>,
    queue_size: usize,
    buffer_flush_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl RemoteReporterBuilder {
    /// Capacity of the span queue. Defaults to 100; zero keeps the default.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        if queue_size > 0 {
            self.queue_size = queue_size;
        }
        self
    }

    /// Interval between two flushes of an idle sender. Defaults to 10
    /// seconds; zero keeps the default.
    pub fn with_buffer_flush_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.buffer_flush_interval = interval;
        }
        self
    }

    /// Metrics to update. Defaults to discarding metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the reporter and start its thread.
    pub fn build(self) -> TraceResult<RemoteReporter> {
        RemoteReporter::new(
            self.sender,
            self.queue_size,
            self.buffer_flush_interval,
            self.metrics.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SenderError;
    use crate::metrics::{InMemoryStatsReporter, StatsFactoryImpl};
    use crate::trace::finished_span;

    /// Buffers appended spans and delivers them on flush.
    #[derive(Debug, Default, Clone)]
    struct BatchingSender {
        buffer: Arc<Mutex<Vec<String>>>,
        delivered: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
        fail_flush: bool,
    }

    impl Sender for BatchingSender {
        fn append(&mut self, span: &FinishedSpan) -> Result<usize, SenderError> {
            self.buffer.lock().unwrap().push(span.operation_name.clone());
            Ok(0)
        }

        fn flush(&mut self) -> Result<usize, SenderError> {
            let spans = std::mem::take(&mut *self.buffer.lock().unwrap());
            if self.fail_flush && !spans.is_empty() {
                return Err(SenderError::new("agent unreachable", spans.len()));
            }
            let count = spans.len();
            self.delivered.lock().unwrap().extend(spans);
            Ok(count)
        }

        fn close(&mut self) -> Result<(), SenderError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn metrics() -> (Arc<Metrics>, Arc<InMemoryStatsReporter>) {
        let stats = Arc::new(InMemoryStatsReporter::new());
        (Arc::new(Metrics::new(&StatsFactoryImpl::new(stats.clone()))), stats)
    }

    #[test]
    fn close_drains_queue_and_flushes() {
        let sender = BatchingSender::default();
        let (metrics, stats) = metrics();
        let reporter = RemoteReporter::builder(sender.clone())
            .with_buffer_flush_interval(Duration::from_secs(3600))
            .with_metrics(metrics)
            .build()
            .unwrap();

        for i in 0..10 {
            reporter.report(finished_span(&format!("span-{i}")));
        }
        reporter.close();
        reporter.close();

        let delivered = sender.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len(), 10);
        assert_eq!(delivered[0], "span-0");
        assert!(*sender.closed.lock().unwrap());
        assert_eq!(stats.counter_value("jaeger.reporter-spans.state=success"), 10);
    }

    #[test]
    fn flushes_periodically() {
        let sender = BatchingSender::default();
        let reporter = RemoteReporter::builder(sender.clone())
            .with_buffer_flush_interval(Duration::from_millis(10))
            .build()
            .unwrap();

        reporter.report(finished_span("op"));
        let deadline = Instant::now() + Duration::from_secs(10);
        while sender.delivered.lock().unwrap().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sender.delivered.lock().unwrap().len(), 1);
        reporter.close();
    }

    #[test]
    fn failed_flush_counts_failures() {
        let sender = BatchingSender {
            fail_flush: true,
            ..Default::default()
        };
        let (metrics, stats) = metrics();
        let reporter = RemoteReporter::builder(sender)
            .with_buffer_flush_interval(Duration::from_secs(3600))
            .with_metrics(metrics)
            .build()
            .unwrap();

        reporter.report(finished_span("a"));
        reporter.report(finished_span("b"));
        reporter.close();

        assert_eq!(stats.counter_value("jaeger.reporter-spans.state=failure"), 2);
        assert_eq!(stats.counter_value("jaeger.reporter-spans.state=success"), 0);
    }

    #[test]
    fn spans_reported_after_close_are_dropped() {
        let (metrics, stats) = metrics();
        let reporter = RemoteReporter::builder(BatchingSender::default())
            .with_metrics(metrics)
            .build()
            .unwrap();
        reporter.close();

        reporter.report(finished_span("late"));
        assert_eq!(stats.counter_value("jaeger.reporter-spans.state=dropped"), 1);
    }
}
