//! Download pipeline: curl → stream bridge → throttled writer → `.part` file.
//!
//! The curl transfer runs on a blocking worker and pushes each received slice
//! into a [`StreamProducer`](crate::stream::StreamProducer). This task pulls
//! from the matching reader and commits through the [`ThrottledWriter`] at
//! increasing offsets. The temp file is synced and renamed onto the
//! destination only after the stream completes.

mod curl_push;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{HaulConfig, DEFAULT_READ_BUFFER_BYTES};
use crate::progress::{self, TransferProgress};
use crate::storage::{temp_path, StorageWriter, StorageWriterBuilder};
use crate::stream::{stream_bridge, StreamReader, DEFAULT_INACTIVITY_TIMEOUT};
use crate::throttle::{ThrottledWriter, WritePriority};

use curl_push::PushRequest;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Continue from an existing `.part` file with a range request.
    pub resume: bool,
    pub priority: WritePriority,
    pub read_buffer_bytes: usize,
    pub inactivity_timeout: Duration,
    pub connect_timeout: Duration,
    pub progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            resume: false,
            priority: WritePriority::Normal,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            connect_timeout: Duration::from_secs(30),
            progress_tx: None,
        }
    }
}

impl FetchOptions {
    pub fn from_config(cfg: &HaulConfig) -> Self {
        Self {
            read_buffer_bytes: cfg.read_buffer_bytes,
            inactivity_timeout: cfg.stream_timeout(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub path: PathBuf,
    /// Bytes written by this call (excludes bytes already in the `.part` file).
    pub bytes_written: u64,
    /// Offset the transfer started from; 0 unless resumed.
    pub resumed_from: u64,
}

impl FetchOutcome {
    pub fn total_bytes(&self) -> u64 {
        self.resumed_from + self.bytes_written
    }
}

/// Open the temp file and work out where writing starts.
fn open_temp(dest: &Path, resume: bool) -> Result<(StorageWriter, u64)> {
    let tp = temp_path(dest);
    if resume && tp.exists() {
        let storage = StorageWriter::open_existing(&tp)?;
        let start = storage.len()?;
        return Ok((storage, start));
    }
    let storage = StorageWriterBuilder::create(&tp)?.build();
    Ok((storage, 0))
}

/// Download `url` to `dest`. On failure or cancellation the `.part` file keeps
/// what was committed so a later call with `resume` can continue.
pub async fn fetch_to_path(
    url: &str,
    dest: &Path,
    options: &FetchOptions,
    writer: &ThrottledWriter,
    cancel: &CancellationToken,
) -> Result<FetchOutcome> {
    let (storage, start) = open_temp(dest, options.resume)?;
    if start > 0 {
        tracing::info!(url, offset = start, "resuming fetch");
    }

    let (producer, mut reader) = stream_bridge(options.inactivity_timeout);
    let total_hint = Arc::new(AtomicU64::new(0));
    let req = PushRequest {
        url: url.to_string(),
        resume_from: start,
        connect_timeout: options.connect_timeout,
    };
    let hint = Arc::clone(&total_hint);
    let transfer = tokio::task::spawn_blocking(move || curl_push::run(req, producer, hint));

    let pumped = pump(
        &mut reader,
        &storage,
        start,
        options,
        writer,
        &total_hint,
        cancel,
    )
    .await;
    if pumped.is_err() {
        // Makes the curl write callback see a closed stream and abort.
        reader.cancel();
    }
    transfer.await.context("fetch transfer task panicked")?;

    let written = match pumped {
        Ok(n) => n,
        Err(e) => {
            if let Err(sync_err) = storage.sync() {
                tracing::warn!(error = %sync_err, "sync after failed fetch");
            }
            return Err(e.context(format!("fetch {}", url)));
        }
    };

    storage.sync()?;
    storage.finalize(dest)?;
    tracing::info!(url, path = %dest.display(), bytes = written, resumed_from = start, "fetch complete");
    Ok(FetchOutcome {
        path: dest.to_path_buf(),
        bytes_written: written,
        resumed_from: start,
    })
}

async fn pump(
    reader: &mut StreamReader,
    storage: &StorageWriter,
    start: u64,
    options: &FetchOptions,
    writer: &ThrottledWriter,
    total_hint: &AtomicU64,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut buf = vec![0u8; options.read_buffer_bytes.max(1)];
    let mut offset = start;
    let started = Instant::now();
    loop {
        let n = reader.read(&mut buf, cancel).await?;
        if n == 0 {
            break;
        }
        writer
            .write_to_file(storage, &buf[..n], offset, cancel, options.priority)
            .await
            .with_context(|| format!("write at offset {}", offset))?;
        offset += n as u64;
        progress::publish(
            options.progress_tx.as_ref(),
            TransferProgress {
                bytes_done: offset,
                total_bytes: total_hint.load(Ordering::Relaxed),
                elapsed_secs: started.elapsed().as_secs_f64(),
                parts_done: 0,
                part_count: 0,
            },
        );
    }
    Ok(offset - start)
}
