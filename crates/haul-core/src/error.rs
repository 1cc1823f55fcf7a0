//! Error taxonomy shared by the transfer components.
//!
//! Each component has its own error enum; all of them map into [`ErrorKind`]
//! so callers can decide on retry/resume without matching every variant.

/// High-level classification of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or remote-side failure; the caller may retry or resume.
    TransportFailure,
    /// The server refused the session or part; a new session is needed.
    ServerRejection,
    /// Inactivity timeout (stream bridge) or write-interval stall.
    Timeout,
    /// Explicit caller cancellation.
    Cancelled,
    /// Local disk or source I/O failure.
    Storage,
    /// Operation invalid for the current state (caller misuse).
    InvalidState,
}

impl ErrorKind {
    /// Whether retrying (or resuming) the same session can succeed.
    ///
    /// Advisory only: none of the core components retries on its own.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::TransportFailure | ErrorKind::Timeout)
    }
}

/// Error reported by a consumed transport (upload, listing, completion).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection reset, 5xx, throttling and similar transient failures.
    #[error("transport failure: {0}")]
    Failure(String),
    /// The server rejected the request (unknown or expired session, bad range).
    #[error("rejected by server: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Failure(_) => ErrorKind::TransportFailure,
            TransportError::Rejected(_) => ErrorKind::ServerRejection,
        }
    }
}
