//! Upload coordinator error type.

use crate::error::{ErrorKind, TransportError};

use super::plan::ContentRange;
use super::session::SessionId;

/// Failure of a coordinator operation. Variants raised while parts are being
/// sent carry `committed`, the number of parts the server has accepted so far,
/// which is where a later resume continues.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Sending part `ordinal` failed.
    #[error("part {ordinal} ({range}) failed after {committed} committed part(s): {source}")]
    Part {
        ordinal: u64,
        range: ContentRange,
        committed: u64,
        #[source]
        source: TransportError,
    },

    /// Reading part `ordinal` from the local source failed.
    #[error("reading part {ordinal} at byte {offset} failed after {committed} committed part(s): {source}")]
    Source {
        ordinal: u64,
        offset: u64,
        committed: u64,
        #[source]
        source: std::io::Error,
    },

    /// Negotiation, listing or completion failed.
    #[error("session {session}: {source}")]
    Session {
        session: String,
        #[source]
        source: TransportError,
    },

    #[error("upload cancelled after {committed} committed part(s)")]
    Cancelled { committed: u64 },

    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl UploadError {
    pub(crate) fn session(id: &SessionId, source: TransportError) -> Self {
        UploadError::Session {
            session: id.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Part { source, .. } | UploadError::Session { source, .. } => source.kind(),
            UploadError::Source { .. } => ErrorKind::Storage,
            UploadError::Cancelled { .. } => ErrorKind::Cancelled,
            UploadError::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Parts accepted before the failure, when the failure happened mid-upload.
    pub fn committed_parts(&self) -> Option<u64> {
        match self {
            UploadError::Part { committed, .. }
            | UploadError::Source { committed, .. }
            | UploadError::Cancelled { committed } => Some(*committed),
            UploadError::Session { .. } | UploadError::InvalidState(_) => None,
        }
    }
}
