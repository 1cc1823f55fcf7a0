//! The throttled write loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::arbiter::{BudgetStatus, WriteArbiter};
use super::error::ThrottleError;
use super::gate::WritePriority;
use super::pace;
use super::target::WriteTarget;

pub const DEFAULT_SPEED_REDUCTION_THRESHOLD: f64 = 0.8;

/// Floor for budget waits so a zero "time left in interval" cannot spin.
const MIN_BUDGET_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleSettings {
    /// Sustained ceiling in bytes/sec; 0 for none.
    pub target_bytes_per_sec: u64,
    /// Sub-chunk size; 0 writes each call as one chunk.
    pub chunk_bytes: u64,
    /// Budget usage fraction at which the rate starts ramping down.
    pub speed_reduction_threshold: f64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            target_bytes_per_sec: 0,
            chunk_bytes: 0,
            speed_reduction_threshold: DEFAULT_SPEED_REDUCTION_THRESHOLD,
        }
    }
}

/// Commits bytes to a [`WriteTarget`] no faster than the configured rate and
/// never beyond the platform budget of the current interval.
///
/// Writers created from the same [`WriteArbiter`] share one physical-write
/// slot and one set of budget counters.
#[derive(Clone)]
pub struct ThrottledWriter {
    settings: ThrottleSettings,
    arbiter: Arc<WriteArbiter>,
}

impl ThrottledWriter {
    pub fn new(settings: ThrottleSettings, arbiter: Arc<WriteArbiter>) -> Self {
        Self { settings, arbiter }
    }

    /// Rate-only writer with its own arbiter.
    pub fn unmetered(settings: ThrottleSettings) -> Self {
        Self::new(settings, Arc::new(WriteArbiter::unmetered()))
    }

    pub fn settings(&self) -> &ThrottleSettings {
        &self.settings
    }

    pub fn arbiter(&self) -> &Arc<WriteArbiter> {
        &self.arbiter
    }

    fn chunk_len(&self, total: usize) -> usize {
        match self.settings.chunk_bytes {
            0 => total,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        }
    }

    /// Write all of `data` at `offset`, sub-chunk by sub-chunk.
    ///
    /// Each sub-chunk is admitted through the shared gate, waits for budget if
    /// it would overrun the current interval, is written, and is then paced.
    /// Returns bytes written (always `data.len()` on success). On cancellation
    /// or I/O failure the error carries the bytes already committed.
    pub async fn write_to_file<W>(
        &self,
        target: &W,
        data: &[u8],
        offset: u64,
        cancel: &CancellationToken,
        priority: WritePriority,
    ) -> Result<u64, ThrottleError>
    where
        W: WriteTarget + ?Sized,
    {
        let total = data.len();
        let chunk = self.chunk_len(total).max(1);
        let mut written = 0usize;

        while written < total {
            if cancel.is_cancelled() {
                return Err(cancelled(written));
            }
            let Some(permit) = self.arbiter.gate().acquire(priority, cancel).await else {
                return Err(cancelled(written));
            };

            let mut piece = chunk.min(total - written);
            loop {
                let Some(status) = self.arbiter.budget_status() else {
                    break;
                };
                let want = piece as u64;
                if want <= status.remaining {
                    break;
                }
                if want > status.allowance && status.remaining > 0 {
                    // Could never fit in one interval; take what is left now.
                    piece = status.remaining as usize;
                    break;
                }
                let wait = status.interval_remaining.max(MIN_BUDGET_WAIT);
                tracing::debug!(
                    bytes = want,
                    remaining = status.remaining,
                    wait_ms = wait.as_millis() as u64,
                    "write budget exhausted, waiting for next interval"
                );
                if !sleep_or_cancel(wait, cancel).await {
                    return Err(cancelled(written));
                }
            }

            let at = offset + written as u64;
            let started = Instant::now();
            target
                .write_at(at, &data[written..written + piece])
                .map_err(|source| ThrottleError::Io {
                    offset: at,
                    written: written as u64,
                    source,
                })?;
            let took = started.elapsed();
            written += piece;
            self.arbiter.record_write(piece as u64);

            let delay = self.pacing_delay(piece as u64, took);
            if !delay.is_zero() {
                if cancel.is_cancelled() {
                    return Err(cancelled(written));
                }
                tracing::trace!(
                    offset = at,
                    bytes = piece,
                    delay_ms = delay.as_millis() as u64,
                    "pacing write"
                );
                if !sleep_or_cancel(delay, cancel).await {
                    return Err(cancelled(written));
                }
            }
            drop(permit);
        }
        Ok(written as u64)
    }

    fn pacing_delay(&self, bytes: u64, took: Duration) -> Duration {
        let status: Option<BudgetStatus> = self.arbiter.budget_status();
        let rate = pace::effective_rate(
            self.settings.target_bytes_per_sec,
            status.as_ref(),
            self.settings.speed_reduction_threshold,
        );
        pace::pacing_delay(bytes, took, rate, status.map(|s| s.interval_remaining))
    }
}

fn cancelled(written: usize) -> ThrottleError {
    ThrottleError::Cancelled {
        written: written as u64,
    }
}

/// Sleep for `dur`; false if `cancel` fired first.
async fn sleep_or_cancel(dur: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(dur) => true,
    }
}
