//! `haul upload <path>` – begin or resume a multipart upload.

use anyhow::{anyhow, Context, Result};
use haul_core::checksum;
use haul_core::config::HaulConfig;
use haul_core::error::ErrorKind;
use haul_core::store::{NewSessionRecord, SessionStore};
use haul_core::upload::{
    HttpUploadTransport, SeekableSource, TransferSession, UploadCoordinator, UploadTransport,
};
use std::path::Path;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::progress;

pub async fn run_upload(
    cfg: &HaulConfig,
    store: &SessionStore,
    path: &Path,
    endpoint: Option<&str>,
    nonce: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let endpoint = endpoint
        .or(cfg.upload_endpoint.as_deref())
        .context("no upload endpoint: pass --endpoint or set upload_endpoint in config")?;
    let transport = HttpUploadTransport::new(endpoint)
        .with_context(|| format!("invalid upload endpoint {}", endpoint))?;

    let source_path = path
        .canonicalize()
        .with_context(|| format!("open {}", path.display()))?;
    let digest = checksum::file_digest_blocking(&source_path).await?;
    let nonce = nonce.map(str::to_string).unwrap_or(digest.sha256);

    let (progress_tx, progress_rx) = mpsc::channel(16);
    let printer = progress::spawn_printer(progress_rx);
    let coordinator =
        UploadCoordinator::new(transport, cfg.upload_settings()).with_progress(progress_tx);

    let result = upload(&coordinator, store, &source_path, digest.size, &nonce, cancel).await;
    drop(coordinator);
    progress::finish_printer(printer, "upload").await;
    let session = result?;
    println!(
        "Uploaded {} ({} bytes, {} part(s)) as session {}",
        path.display(),
        session.total_size,
        session.part_count(),
        session.id
    );
    Ok(())
}

async fn upload<T: UploadTransport>(
    coordinator: &UploadCoordinator<T>,
    store: &SessionStore,
    source_path: &Path,
    size: u64,
    nonce: &str,
    cancel: &CancellationToken,
) -> Result<TransferSession> {
    let mut session = open_session(coordinator, store, source_path, size, nonce).await?;

    let start = session.parts_committed;
    let mut source = SeekableSource::open(source_path)
        .await
        .with_context(|| format!("open {}", source_path.display()))?;
    let sent = coordinator
        .upload_next_parts(&mut session, start, &mut source, cancel)
        .await;
    store.update_progress(&session).await?;
    if let Err(e) = sent {
        let hint = if e.kind() == ErrorKind::ServerRejection {
            "the server rejected the session; `haul forget` it to start over"
        } else {
            "run the same command again to resume"
        };
        return Err(anyhow!(e).context(format!(
            "upload stopped after {} of {} part(s); {}",
            session.parts_committed,
            session.part_count(),
            hint
        )));
    }

    if let Err(e) = coordinator.complete_session(&mut session).await {
        store.update_progress(&session).await?;
        return Err(e.into());
    }
    store.remove(&session.id).await?;
    Ok(session)
}

/// Reuse the stored session for this content when the server still knows it.
async fn open_session<T: UploadTransport>(
    coordinator: &UploadCoordinator<T>,
    store: &SessionStore,
    source_path: &Path,
    size: u64,
    nonce: &str,
) -> Result<TransferSession> {
    if let Some(record) = store.find_resumable(source_path, size, nonce).await? {
        let mut session = record.to_session();
        match coordinator.resume_session(&mut session).await {
            Ok(ordinal) => {
                if ordinal > 0 {
                    println!(
                        "Resuming session {} at part {}/{}",
                        session.id,
                        ordinal,
                        session.part_count()
                    );
                }
                store.update_progress(&session).await?;
                return Ok(session);
            }
            Err(e) if e.kind() == ErrorKind::ServerRejection => {
                tracing::warn!(session = %session.id, "stored session rejected, starting over: {}", e);
                store.remove(&session.id).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let session = coordinator.begin_session(size, nonce).await?;
    store
        .insert(&NewSessionRecord {
            source_path,
            nonce,
            session: &session,
        })
        .await?;
    Ok(session)
}
