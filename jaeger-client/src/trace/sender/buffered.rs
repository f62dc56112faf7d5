use super::{Sender, SpanEncoder, Transport};
use crate::error::SenderError;
use crate::trace::FinishedSpan;

/// Bytes reserved for the framing of a batch around its process and spans.
const EMIT_BATCH_OVERHEAD: usize = 30;

/// [`Sender`] packing spans into batches that fit in one packet of its
/// [`Transport`].
///
/// The process description is encoded once, from the first appended span.
/// A span too large to fit in a batch on its own is rejected. A batch that
/// cannot be sent is discarded, and all of its spans are reported as failed.
#[derive(Debug)]
pub struct BufferedSender<E, T> {
    encoder: E,
    transport: T,
    process: Option<Vec<u8>>,
    max_span_bytes: usize,
    buffer: Vec<Vec<u8>>,
    buffer_bytes: usize,
}

impl<E: SpanEncoder, T: Transport> BufferedSender<E, T> {
    /// Create a sender encoding with `encoder` and sending over `transport`.
    pub fn new(encoder: E, transport: T) -> Self {
        BufferedSender {
            encoder,
            transport,
            process: None,
            max_span_bytes: 0,
            buffer: Vec::new(),
            buffer_bytes: 0,
        }
    }

    /// Number of buffered spans.
    pub fn buffered_spans(&self) -> usize {
        self.buffer.len()
    }
}

impl<E: SpanEncoder, T: Transport> Sender for BufferedSender<E, T> {
    fn append(&mut self, span: &FinishedSpan) -> Result<usize, SenderError> {
        if self.process.is_none() {
            let process = self
                .encoder
                .encode_process(&span.process)
                .map_err(|err| SenderError::new(format!("cannot encode process: {err}"), 1))?;
            self.max_span_bytes = self
                .transport
                .max_packet_size()
                .saturating_sub(process.len() + EMIT_BATCH_OVERHEAD);
            self.process = Some(process);
        }

        let encoded = self
            .encoder
            .encode_span(span)
            .map_err(|err| SenderError::new(format!("cannot encode span: {err}"), 1))?;
        // one separator byte per span
        let span_bytes = encoded.len() + 1;
        if span_bytes > self.max_span_bytes {
            return Err(SenderError::new(
                format!(
                    "span is too large: {span_bytes} bytes, at most {} allowed",
                    self.max_span_bytes
                ),
                1,
            ));
        }

        if self.buffer_bytes + span_bytes <= self.max_span_bytes {
            self.buffer.push(encoded);
            self.buffer_bytes += span_bytes;
            if self.buffer_bytes < self.max_span_bytes {
                return Ok(0);
            }
            return self.flush();
        }

        let flushed = self.flush();
        self.buffer.push(encoded);
        self.buffer_bytes = span_bytes;
        flushed
    }

    fn flush(&mut self) -> Result<usize, SenderError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let spans = std::mem::take(&mut self.buffer);
        self.buffer_bytes = 0;

        let process = self.process.as_deref().unwrap_or_default();
        let batch = self.encoder.encode_batch(process, &spans);
        match self.transport.emit_batch(&batch) {
            Ok(()) => Ok(spans.len()),
            Err(err) => Err(SenderError::new(
                format!("could not send spans: {err}"),
                spans.len(),
            )),
        }
    }

    fn close(&mut self) -> Result<(), SenderError> {
        self.transport
            .close()
            .map_err(|err| SenderError::new(format!("could not close transport: {err}"), 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TraceError, TraceResult};
    use crate::trace::sender::JsonSpanEncoder;
    use crate::trace::{finished_span, Tag};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    struct RecordingTransport {
        max_packet_size: usize,
        batches: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Transport for RecordingTransport {
        fn max_packet_size(&self) -> usize {
            self.max_packet_size
        }

        fn emit_batch(&mut self, batch: &[u8]) -> TraceResult<()> {
            if self.fail {
                return Err(TraceError::Other("connection refused".into()));
            }
            assert!(batch.len() <= self.max_packet_size);
            self.batches.lock().unwrap().push(batch.len());
            Ok(())
        }
    }

    fn span_size(encoder: &JsonSpanEncoder) -> usize {
        encoder.encode_span(&finished_span("op")).unwrap().len() + 1
    }

    fn process_size(encoder: &JsonSpanEncoder) -> usize {
        encoder
            .encode_process(&finished_span("op").process)
            .unwrap()
            .len()
    }

    fn sender_fitting(spans: usize, fail: bool) -> (BufferedSender<JsonSpanEncoder, RecordingTransport>, RecordingTransport) {
        let encoder = JsonSpanEncoder;
        let transport = RecordingTransport {
            max_packet_size: process_size(&encoder) + EMIT_BATCH_OVERHEAD + spans * span_size(&encoder),
            fail,
            ..Default::default()
        };
        (BufferedSender::new(encoder, transport.clone()), transport)
    }

    #[test]
    fn flushes_when_buffer_is_exactly_full() {
        let (mut sender, transport) = sender_fitting(3, false);
        let span = finished_span("op");

        assert_eq!(sender.append(&span), Ok(0));
        assert_eq!(sender.append(&span), Ok(0));
        assert_eq!(sender.append(&span), Ok(3));
        assert_eq!(sender.buffered_spans(), 0);
        assert_eq!(transport.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn flushes_before_overflowing() {
        let (mut sender, transport) = sender_fitting(2, false);
        let small = finished_span("op");
        let mut larger = finished_span("op");
        larger.operation_name = "opp".to_string();

        assert_eq!(sender.append(&small), Ok(0));
        assert_eq!(sender.append(&larger), Ok(1));
        assert_eq!(sender.buffered_spans(), 1);
        assert_eq!(sender.flush(), Ok(1));
        assert_eq!(sender.flush(), Ok(0));
        assert_eq!(transport.batches.lock().unwrap().len(), 2);
    }

    #[test]
    fn rejects_oversized_span() {
        let (mut sender, _) = sender_fitting(1, false);
        let mut span = finished_span("op");
        span.tags.push(Tag::new("payload", "x".repeat(1024)));

        let err = sender.append(&span).unwrap_err();
        assert_eq!(err.num_failed(), 1);
        assert_eq!(sender.buffered_spans(), 0);
    }

    #[test]
    fn failed_flush_reports_every_buffered_span() {
        let (mut sender, _) = sender_fitting(3, true);
        let span = finished_span("op");
        sender.append(&span).unwrap();
        sender.append(&span).unwrap();

        let err = sender.flush().unwrap_err();
        assert_eq!(err.num_failed(), 2);
        assert_eq!(sender.buffered_spans(), 0);
        assert!(sender.close().is_ok());
    }
}
