//! Stream bridge error type.

use std::time::Duration;

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// No data arrived within the inactivity window. Distinct from `Cancelled`.
    #[error("no data received for {0:?}")]
    Timeout(Duration),

    #[error("stream cancelled")]
    Cancelled,

    /// The transport reported a failure.
    #[error("transport failed: {0}")]
    Transport(String),

    /// Producer wrote after the stream reached a terminal state.
    #[error("stream is closed")]
    Closed,

    /// The consumer read again after end of stream was already reported.
    #[error("read past end of stream")]
    ReadPastEnd,
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Timeout(_) => ErrorKind::Timeout,
            StreamError::Cancelled => ErrorKind::Cancelled,
            StreamError::Transport(_) => ErrorKind::TransportFailure,
            StreamError::Closed | StreamError::ReadPastEnd => ErrorKind::InvalidState,
        }
    }
}
