//! Remote side of an upload session, as consumed by the coordinator.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TransportError;

use super::plan::ContentRange;
use super::session::SessionId;

/// Result of negotiating a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub session_id: SessionId,
    /// Part bound dictated by the server, if any; overrides the local setting.
    pub max_part_size: Option<u64>,
}

/// Server acknowledgment of one accepted part.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PartAck {
    pub ordinal: u64,
    #[serde(default)]
    pub etag: Option<String>,
}

/// One page of the server's accepted-part listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartPage {
    pub parts: Vec<PartAck>,
    /// Server hint that more pages follow. When absent the coordinator stops at
    /// the first short page.
    pub has_more: Option<bool>,
}

/// Transport for a server-tracked multipart upload.
///
/// Implementations must not retry internally; failures are reported as
/// [`TransportError::Failure`] (transient) or [`TransportError::Rejected`]
/// (session unusable).
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Negotiate (or re-find) a session keyed by `(total_size, nonce)`.
    async fn begin_session(
        &self,
        total_size: u64,
        nonce: &str,
    ) -> Result<SessionGrant, TransportError>;

    /// Send one part tagged with its byte-range descriptor and wait for the ack.
    async fn upload_part(
        &self,
        session: &SessionId,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Result<PartAck, TransportError>;

    /// Page `page_index` (zero-based) of the accepted parts, at most `page_size` entries.
    async fn list_parts(
        &self,
        session: &SessionId,
        page_index: u32,
        page_size: u32,
    ) -> Result<PartPage, TransportError>;

    /// Finalize the session once every part is accepted.
    async fn complete_session(&self, session: &SessionId) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: UploadTransport + ?Sized> UploadTransport for std::sync::Arc<T> {
    async fn begin_session(
        &self,
        total_size: u64,
        nonce: &str,
    ) -> Result<SessionGrant, TransportError> {
        (**self).begin_session(total_size, nonce).await
    }

    async fn upload_part(
        &self,
        session: &SessionId,
        range: ContentRange,
        body: Vec<u8>,
    ) -> Result<PartAck, TransportError> {
        (**self).upload_part(session, range, body).await
    }

    async fn list_parts(
        &self,
        session: &SessionId,
        page_index: u32,
        page_size: u32,
    ) -> Result<PartPage, TransportError> {
        (**self).list_parts(session, page_index, page_size).await
    }

    async fn complete_session(&self, session: &SessionId) -> Result<(), TransportError> {
        (**self).complete_session(session).await
    }
}
