//! In-process upload service holding parts in memory.
//!
//! Shared through an `Arc` so a test can drop one coordinator ("process exit")
//! and build another against the same server state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use haul_core::error::TransportError;
use haul_core::upload::{ContentRange, PartAck, PartPage, SessionGrant, SessionId, UploadTransport};

#[derive(Default)]
struct ServerSession {
    total_size: u64,
    nonce: String,
    parts: Vec<Vec<u8>>,
    completed: bool,
}

#[derive(Default)]
struct ServerState {
    sessions: HashMap<String, ServerSession>,
    next_id: u64,
    /// Transient failure on the next upload of this ordinal.
    fail_at: Option<u64>,
    uploads: u64,
    list_calls: u64,
}

#[derive(Default)]
pub struct MemoryUploadServer {
    state: Mutex<ServerState>,
}

impl MemoryUploadServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_upload_of(&self, ordinal: u64) {
        self.state.lock().unwrap().fail_at = Some(ordinal);
    }

    pub fn assembled(&self, id: &SessionId) -> Vec<u8> {
        let st = self.state.lock().unwrap();
        st.sessions[id.as_str()].parts.concat()
    }

    pub fn is_completed(&self, id: &SessionId) -> bool {
        self.state.lock().unwrap().sessions[id.as_str()].completed
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn upload_calls(&self) -> u64 {
        self.state.lock().unwrap().uploads
    }

    pub fn list_calls(&self) -> u64 {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl UploadTransport for MemoryUploadServer {
    async fn begin_session(
        &self,
        total_size: u64,
        nonce: &str,
    ) -> Result<SessionGrant, TransportError> {
        let mut st = self.state.lock().unwrap();
        let existing = st
            .sessions
            .iter()
            .find(|(_, s)| !s.completed && s.total_size == total_size && s.nonce == nonce)
            .map(|(id, _)| id.clone());
        let id = match existing {
            Some(id) => id,
            None => {
                st.next_id += 1;
                let id = format!("mem-{}", st.next_id);
                st.sessions.insert(
                    id.clone(),
                    ServerSession {
                        total_size,
                        nonce: nonce.to_string(),
                        ..ServerSession::default()
                    },
                );
                id
            }
        };
        Ok(SessionGrant {
            session_id: SessionId::new(id),
            max_part_size: None,
        })
    }

    async fn upload_part(
        &self,
        session: &SessionId,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Result<PartAck, TransportError> {
        let mut st = self.state.lock().unwrap();
        st.uploads += 1;
        let fail_at = st.fail_at;
        let s = st
            .sessions
            .get_mut(session.as_str())
            .ok_or_else(|| TransportError::Rejected("unknown session".into()))?;
        let ordinal = s.parts.len() as u64;
        let expected_start: u64 = s.parts.iter().map(|p| p.len() as u64).sum();
        if range.start != expected_start || range.total != s.total_size {
            return Err(TransportError::Rejected(format!(
                "out of order range {}, expected start {}",
                range, expected_start
            )));
        }
        if body.len() as u64 != range.last - range.start + 1 {
            return Err(TransportError::Rejected("body does not match range".into()));
        }
        if fail_at == Some(ordinal) {
            st.fail_at = None;
            return Err(TransportError::Failure("connection reset by peer".into()));
        }
        s.parts.push(body);
        Ok(PartAck {
            ordinal,
            etag: Some(format!("etag-{}", ordinal)),
        })
    }

    async fn list_parts(
        &self,
        session: &SessionId,
        page_index: u32,
        page_size: u32,
    ) -> Result<PartPage, TransportError> {
        let mut st = self.state.lock().unwrap();
        st.list_calls += 1;
        let s = st
            .sessions
            .get(session.as_str())
            .ok_or_else(|| TransportError::Rejected("unknown session".into()))?;
        let from = page_index as usize * page_size as usize;
        let to = (from + page_size as usize).min(s.parts.len());
        let parts = (from.min(to)..to)
            .map(|i| PartAck {
                ordinal: i as u64,
                etag: Some(format!("etag-{}", i)),
            })
            .collect();
        Ok(PartPage {
            parts,
            has_more: Some(to < s.parts.len()),
        })
    }

    async fn complete_session(&self, session: &SessionId) -> Result<(), TransportError> {
        let mut st = self.state.lock().unwrap();
        let s = st
            .sessions
            .get_mut(session.as_str())
            .ok_or_else(|| TransportError::Rejected("unknown session".into()))?;
        let have: u64 = s.parts.iter().map(|p| p.len() as u64).sum();
        if have != s.total_size {
            return Err(TransportError::Rejected(format!(
                "incomplete: {} of {} bytes",
                have, s.total_size
            )));
        }
        s.completed = true;
        Ok(())
    }
}
