//! Throttled write errors. Both variants report how much was committed.

use std::io;

use crate::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum ThrottleError {
    #[error("write cancelled after {written} bytes")]
    Cancelled { written: u64 },

    #[error("write failed at offset {offset} after {written} bytes: {source}")]
    Io {
        offset: u64,
        written: u64,
        #[source]
        source: io::Error,
    },
}

impl ThrottleError {
    /// Bytes committed to the target before the write stopped.
    pub fn bytes_written(&self) -> u64 {
        match self {
            ThrottleError::Cancelled { written } | ThrottleError::Io { written, .. } => *written,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ThrottleError::Cancelled { .. } => ErrorKind::Cancelled,
            ThrottleError::Io { .. } => ErrorKind::Storage,
        }
    }
}
