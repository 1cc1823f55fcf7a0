//! Sequential multipart upload driver.

use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::progress::{self, TransferProgress};

use super::error::UploadError;
use super::plan;
use super::session::{SessionStatus, TransferSession};
use super::source::PartSource;
use super::transport::UploadTransport;

/// Default upper bound on a single part: 50 MiB.
pub const DEFAULT_MAX_PART_SIZE: u64 = 50 * 1024 * 1024;

/// Default number of entries requested per listing page.
pub const DEFAULT_LIST_PAGE_SIZE: u32 = 100;

/// Coordinator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Local part bound, used unless the server dictates one.
    pub max_part_size: u64,
    /// Entries per page when listing accepted parts on resume.
    pub list_page_size: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_part_size: DEFAULT_MAX_PART_SIZE,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

/// Drives one or more upload sessions over `T`, one part at a time.
///
/// Parts go out strictly in ordinal order and each one is acknowledged before
/// the next is read. Nothing is retried here: a failed part aborts the call and
/// the error carries the committed count for a later [`resume_session`].
///
/// [`resume_session`]: UploadCoordinator::resume_session
pub struct UploadCoordinator<T> {
    transport: T,
    settings: UploadSettings,
    progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl<T: UploadTransport> UploadCoordinator<T> {
    pub fn new(transport: T, settings: UploadSettings) -> Self {
        Self {
            transport,
            settings,
            progress_tx: None,
        }
    }

    /// Publish a [`TransferProgress`] after every accepted part.
    pub fn with_progress(mut self, tx: mpsc::Sender<TransferProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn settings(&self) -> UploadSettings {
        self.settings
    }

    /// Negotiate a session for `total_size` bytes. Idempotent on the server side
    /// for the same `(total_size, nonce)`.
    pub async fn begin_session(
        &self,
        total_size: u64,
        nonce: &str,
    ) -> Result<TransferSession, UploadError> {
        if self.settings.max_part_size == 0 {
            return Err(UploadError::InvalidState("max part size must be > 0".into()));
        }
        let grant = self
            .transport
            .begin_session(total_size, nonce)
            .await
            .map_err(|source| UploadError::Session {
                session: format!("(new, nonce {nonce})"),
                source,
            })?;
        let max_part_size = grant
            .max_part_size
            .filter(|&n| n > 0)
            .unwrap_or(self.settings.max_part_size);
        let session = TransferSession::new(grant.session_id, total_size, max_part_size);
        tracing::info!(
            session = %session.id,
            total_size,
            max_part_size,
            parts = session.part_count(),
            "upload session negotiated"
        );
        Ok(session)
    }

    /// Upload every part from `start_ordinal` to the end of the file.
    ///
    /// `start_ordinal` must equal `session.parts_committed`; anything else would
    /// re-send or skip data. Returns the number of committed parts, which equals
    /// the part count on success.
    pub async fn upload_next_parts<S>(
        &self,
        session: &mut TransferSession,
        start_ordinal: u64,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<u64, UploadError>
    where
        S: PartSource + ?Sized,
    {
        if session.status.is_terminal() {
            return Err(UploadError::InvalidState(format!(
                "session {} is already completed",
                session.id
            )));
        }
        if start_ordinal != session.parts_committed {
            return Err(UploadError::InvalidState(format!(
                "start ordinal {} does not match {} committed part(s) of session {}",
                start_ordinal, session.parts_committed, session.id
            )));
        }

        session.status = SessionStatus::Uploading;
        let part_count = session.part_count();
        let started = Instant::now();

        for ordinal in start_ordinal..part_count {
            let committed = session.parts_committed;
            if cancel.is_cancelled() {
                return Err(cancelled(session));
            }
            let Some(part) = plan::part_at(ordinal, session.total_size, session.max_part_size)
            else {
                break;
            };
            let len = usize::try_from(part.len()).map_err(|_| {
                UploadError::InvalidState(format!("part of {} bytes does not fit in memory", part.len()))
            })?;

            let mut body = vec![0u8; len];
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = source.read_part(part.start, &mut body) => Some(r),
            };
            match read {
                None => return Err(cancelled(session)),
                Some(Err(source)) => {
                    session.status = SessionStatus::Failed;
                    tracing::warn!(session = %session.id, ordinal, offset = part.start, "reading part failed: {}", source);
                    return Err(UploadError::Source {
                        ordinal,
                        offset: part.start,
                        committed,
                        source,
                    });
                }
                Some(Ok(())) => {}
            }

            let range = part.content_range(session.total_size);
            tracing::debug!(session = %session.id, ordinal, %range, "uploading part");
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = self.transport.upload_part(&session.id, range, body) => Some(r),
            };
            let source = match sent {
                None => return Err(cancelled(session)),
                Some(Ok(ack)) if ack.ordinal == ordinal => None,
                Some(Ok(ack)) => Some(TransportError::Rejected(format!(
                    "server acknowledged part {} while part {} was sent",
                    ack.ordinal, ordinal
                ))),
                Some(Err(e)) => Some(e),
            };
            if let Some(source) = source {
                session.status = SessionStatus::Failed;
                tracing::warn!(
                    session = %session.id,
                    ordinal,
                    committed,
                    "part upload failed: {}",
                    source
                );
                return Err(UploadError::Part {
                    ordinal,
                    range,
                    committed,
                    source,
                });
            }

            session.parts_committed = ordinal + 1;
            progress::publish(
                self.progress_tx.as_ref(),
                TransferProgress {
                    bytes_done: part.end,
                    total_bytes: session.total_size,
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    parts_done: session.parts_committed,
                    part_count,
                },
            );
        }

        tracing::debug!(session = %session.id, parts = session.parts_committed, "all parts sent");
        Ok(session.parts_committed)
    }

    /// Ask the server how many parts it holds and set the session up to continue
    /// from exactly that ordinal. Pages through the whole listing.
    pub async fn resume_session(&self, session: &mut TransferSession) -> Result<u64, UploadError> {
        let page_size = self.settings.list_page_size;
        if page_size == 0 {
            return Err(UploadError::InvalidState("list page size must be > 0".into()));
        }
        let part_count = session.part_count();
        let mut accepted = 0u64;
        let mut page_index = 0u32;
        loop {
            let page = self
                .transport
                .list_parts(&session.id, page_index, page_size)
                .await
                .map_err(|e| UploadError::session(&session.id, e))?;
            let n = page.parts.len() as u64;
            accepted += n;
            tracing::trace!(session = %session.id, page_index, entries = n, "listed parts page");

            let more = page.has_more.unwrap_or(n >= u64::from(page_size));
            if !more || n == 0 || accepted > part_count {
                break;
            }
            page_index = page_index.checked_add(1).ok_or_else(|| {
                UploadError::InvalidState("part listing exceeds page index range".into())
            })?;
        }

        if accepted > part_count {
            session.status = SessionStatus::Failed;
            return Err(UploadError::InvalidState(format!(
                "server reports {} accepted part(s) but session {} has {}",
                accepted, session.id, part_count
            )));
        }

        session.parts_committed = accepted;
        if !session.status.is_terminal() {
            session.status = SessionStatus::Uploading;
        }
        tracing::info!(
            session = %session.id,
            resume_ordinal = accepted,
            part_count,
            "session resumed"
        );
        Ok(accepted)
    }

    /// Finalize the session. Only valid once every part is accepted.
    pub async fn complete_session(&self, session: &mut TransferSession) -> Result<(), UploadError> {
        if session.status == SessionStatus::Completed {
            return Ok(());
        }
        if !session.all_parts_committed() {
            return Err(UploadError::InvalidState(format!(
                "session {} has {} of {} part(s) committed",
                session.id,
                session.parts_committed,
                session.part_count()
            )));
        }
        if let Err(e) = self.transport.complete_session(&session.id).await {
            if matches!(e, TransportError::Rejected(_)) {
                session.status = SessionStatus::Failed;
            }
            return Err(UploadError::session(&session.id, e));
        }
        session.status = SessionStatus::Completed;
        tracing::info!(session = %session.id, total_size = session.total_size, "upload completed");
        Ok(())
    }
}

fn cancelled(session: &mut TransferSession) -> UploadError {
    session.status = SessionStatus::Cancelled;
    tracing::info!(session = %session.id, committed = session.parts_committed, "upload cancelled");
    UploadError::Cancelled {
        committed: session.parts_committed,
    }
}
