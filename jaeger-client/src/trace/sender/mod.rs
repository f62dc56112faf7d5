//! Senders encode finished spans and deliver them to the agent or collector.
//!
//! A [`Sender`] is driven by a single thread, the
//! [`RemoteReporter`](crate::trace::RemoteReporter)'s, which hands it one span
//! at a time and asks it to flush periodically. [`BufferedSender`] batches
//! spans into packets of bounded size; it is parameterised by a
//! [`SpanEncoder`] producing the wire format and a [`Transport`] moving the
//! bytes.
use std::fmt;

use super::{FinishedSpan, Process};
use crate::error::{SenderError, TraceResult};

mod buffered;
mod json;
mod transport;

pub use buffered::BufferedSender;
pub use json::JsonSpanEncoder;
pub use transport::{HttpTransport, UdpTransport};

/// Delivers finished spans.
pub trait Sender: Send + fmt::Debug {
    /// Buffer a span, sending buffered spans when the buffer is full.
    ///
    /// Returns the number of spans sent by this call, zero when the span was
    /// only buffered.
    fn append(&mut self, span: &FinishedSpan) -> Result<usize, SenderError>;

    /// Send every buffered span. Returns the number of spans sent.
    fn flush(&mut self) -> Result<usize, SenderError>;

    /// Release the underlying resources. Buffered spans are not flushed.
    fn close(&mut self) -> Result<(), SenderError> {
        Ok(())
    }
}

impl<S: Sender + ?Sized> Sender for Box<S> {
    fn append(&mut self, span: &FinishedSpan) -> Result<usize, SenderError> {
        self.as_mut().append(span)
    }

    fn flush(&mut self) -> Result<usize, SenderError> {
        self.as_mut().flush()
    }

    fn close(&mut self) -> Result<(), SenderError> {
        self.as_mut().close()
    }
}

/// Wire format of spans.
pub trait SpanEncoder: Send + fmt::Debug {
    /// Encode the process description shared by every span of a batch.
    fn encode_process(&self, process: &Process) -> TraceResult<Vec<u8>>;

    /// Encode one span.
    fn encode_span(&self, span: &FinishedSpan) -> TraceResult<Vec<u8>>;

    /// Frame an encoded process and encoded spans into one batch.
    fn encode_batch(&self, process: &[u8], spans: &[Vec<u8>]) -> Vec<u8>;
}

/// Moves encoded batches to their destination.
pub trait Transport: Send + fmt::Debug {
    /// Size in bytes of the largest batch this transport accepts.
    fn max_packet_size(&self) -> usize;

    /// Send one encoded batch.
    fn emit_batch(&mut self, batch: &[u8]) -> TraceResult<()>;

    /// Release the underlying connection.
    fn close(&mut self) -> TraceResult<()> {
        Ok(())
    }
}
