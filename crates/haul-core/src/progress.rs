//! Progress snapshots for uploads and fetches (bytes done, ETA, rate).
//!
//! Publishers use `try_send` on a bounded channel so a slow consumer never
//! stalls the transfer; dropped snapshots are superseded by the next one.

use tokio::sync::mpsc;

/// Snapshot of transfer progress (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Bytes committed so far (accepted parts or bytes written to disk).
    pub bytes_done: u64,
    /// Total size in bytes, 0 when unknown.
    pub total_bytes: u64,
    /// Elapsed time since the transfer started (seconds).
    pub elapsed_secs: f64,
    /// Parts accepted (uploads only).
    pub parts_done: u64,
    /// Parts in the session (uploads only).
    pub part_count: u64,
}

impl TransferProgress {
    /// Average rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if rate is 0 or size unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Best-effort publish: never blocks, drops the snapshot when the channel is full.
pub(crate) fn publish(tx: Option<&mpsc::Sender<TransferProgress>>, progress: TransferProgress) {
    if let Some(tx) = tx {
        let _ = tx.try_send(progress);
    }
}
