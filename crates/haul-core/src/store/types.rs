//! Row types for the session store.

use std::path::PathBuf;

use crate::upload::{SessionId, SessionStatus, TransferSession};

/// A persisted upload session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub source_path: PathBuf,
    pub session_id: SessionId,
    pub total_size: u64,
    pub nonce: String,
    pub max_part_size: u64,
    pub parts_committed: u64,
    pub status: SessionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SessionRecord {
    /// Rebuild the in-memory session. The caller should still reconcile it
    /// with the server before uploading more parts.
    pub fn to_session(&self) -> TransferSession {
        let mut session =
            TransferSession::new(self.session_id.clone(), self.total_size, self.max_part_size);
        session.parts_committed = self.parts_committed;
        session.status = self.status;
        session
    }
}

/// Fields supplied when a session is first recorded.
#[derive(Debug, Clone)]
pub struct NewSessionRecord<'a> {
    pub source_path: &'a std::path::Path,
    pub nonce: &'a str,
    pub session: &'a TransferSession,
}
