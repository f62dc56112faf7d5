//! Errors surfaced by the client.
//!
//! Only construction and configuration return errors to the caller. Span
//! creation and finishing never do: failures there are logged and counted.
use std::sync::PoisonError;

use thiserror::Error;

/// Describes the errors that can happen while configuring the client or while
/// talking to the remote control plane and collector.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// Invalid configuration, such as an empty service name or a sampler
    /// parameter out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The remote sampling or baggage restriction endpoint could not be queried.
    #[error("remote query to {endpoint} failed: {message}")]
    RemoteQuery {
        /// Endpoint that was queried.
        endpoint: String,
        /// What went wrong.
        message: String,
    },

    /// The remote endpoint answered with a body that could not be decoded.
    #[error("malformed response from remote endpoint: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// A span could not be encoded or transmitted.
    #[error(transparent)]
    Sender(#[from] SenderError),

    /// The component has already been closed.
    #[error("{0} is already closed")]
    AlreadyClosed(&'static str),

    /// Other errors not covered above.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<String> for TraceError {
    fn from(err_msg: String) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl From<&'static str> for TraceError {
    fn from(err_msg: &'static str) -> Self {
        TraceError::Other(err_msg.into())
    }
}

impl From<std::io::Error> for TraceError {
    fn from(err: std::io::Error) -> Self {
        TraceError::Other(Box::new(err))
    }
}

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::Other(err.to_string().into())
    }
}

/// Describe the result of operations in the client.
pub type TraceResult<T> = Result<T, TraceError>;

/// Failure of a [`Sender`](crate::trace::Sender) operation.
///
/// `num_failed` is the number of spans lost with this failure. A failed flush
/// loses the whole buffered batch, an oversized span only itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({num_failed} spans failed)")]
pub struct SenderError {
    message: String,
    num_failed: usize,
}

impl SenderError {
    /// Create a new sender error.
    pub fn new(message: impl Into<String>, num_failed: usize) -> Self {
        SenderError {
            message: message.into(),
            num_failed,
        }
    }

    /// Number of spans that could not be delivered.
    pub fn num_failed(&self) -> usize {
        self.num_failed
    }

    /// Description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sender_error_reports_failed_count() {
        let err = SenderError::new("could not send batch", 7);
        assert_eq!(err.num_failed(), 7);
        assert_eq!(err.to_string(), "could not send batch (7 spans failed)");

        let trace_err: TraceError = err.into();
        assert!(matches!(trace_err, TraceError::Sender(ref e) if e.num_failed() == 7));
    }

    #[test]
    fn poisoned_lock_converts() {
        let lock = std::sync::Arc::new(Mutex::new(0));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();

        let err: TraceError = lock.lock().unwrap_err().into();
        assert!(matches!(err, TraceError::Other(_)));
    }
}
