//! Process-wide write coordination: the physical-write gate and the budget
//! counters shared by every [`ThrottledWriter`](super::ThrottledWriter).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::budget::{BudgetSnapshot, WriteBudgetSource};
use super::gate::PriorityGate;

/// Budget state as seen by a writer about to commit bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetStatus {
    pub allowance: u64,
    /// Larger of what the platform reports and what this process committed.
    pub used: u64,
    pub remaining: u64,
    pub interval: Duration,
    pub interval_remaining: Duration,
    /// `used / allowance`, clamped to `[0, 1]`.
    pub usage_fraction: f64,
}

struct LocalCount {
    bytes: u64,
    last_elapsed: Duration,
    last_poll: Instant,
}

struct Metering {
    source: Arc<dyn WriteBudgetSource>,
    local: Mutex<LocalCount>,
}

impl Metering {
    fn lock(&self) -> MutexGuard<'_, LocalCount> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the local count when the platform interval has rolled over since
    /// the previous poll.
    fn observe(&self, local: &mut LocalCount, snap: &BudgetSnapshot) {
        let now = Instant::now();
        let since_poll = now.saturating_duration_since(local.last_poll);
        let rolled =
            snap.elapsed < local.last_elapsed || local.last_elapsed + since_poll >= snap.interval;
        if rolled && local.bytes > 0 {
            tracing::trace!(previous = local.bytes, "write budget interval rolled over");
            local.bytes = 0;
        }
        local.last_elapsed = snap.elapsed;
        local.last_poll = now;
    }
}

/// Shared by all writers in the process; clone the `Arc`, not the arbiter.
pub struct WriteArbiter {
    gate: PriorityGate,
    metering: Option<Metering>,
}

impl WriteArbiter {
    /// Arbiter metered by `source`, or rate-only when `None`.
    pub fn new(source: Option<Arc<dyn WriteBudgetSource>>) -> Self {
        Self {
            gate: PriorityGate::new(),
            metering: source.map(|source| Metering {
                source,
                local: Mutex::new(LocalCount {
                    bytes: 0,
                    last_elapsed: Duration::ZERO,
                    last_poll: Instant::now(),
                }),
            }),
        }
    }

    pub fn unmetered() -> Self {
        Self::new(None)
    }

    pub fn shared(source: Option<Arc<dyn WriteBudgetSource>>) -> Arc<Self> {
        Arc::new(Self::new(source))
    }

    pub fn gate(&self) -> &PriorityGate {
        &self.gate
    }

    pub fn is_metered(&self) -> bool {
        self.metering.is_some()
    }

    /// Current budget position, or `None` when unmetered (no source, or the
    /// source reports no budget right now).
    pub fn budget_status(&self) -> Option<BudgetStatus> {
        let metering = self.metering.as_ref()?;
        let snap = metering.source.query()?;
        if snap.budget == 0 || snap.interval.is_zero() {
            return None;
        }
        let mut local = metering.lock();
        metering.observe(&mut local, &snap);
        let used = snap.bytes_written.max(local.bytes);
        Some(BudgetStatus {
            allowance: snap.budget,
            used,
            remaining: snap.budget.saturating_sub(used),
            interval: snap.interval,
            interval_remaining: snap.interval_remaining(),
            usage_fraction: (used as f64 / snap.budget as f64).clamp(0.0, 1.0),
        })
    }

    /// Account `bytes` just committed against the current interval.
    pub fn record_write(&self, bytes: u64) {
        let Some(metering) = self.metering.as_ref() else {
            return;
        };
        let snap = metering.source.query();
        let mut local = metering.lock();
        if let Some(snap) = snap {
            metering.observe(&mut local, &snap);
        }
        local.bytes = local.bytes.saturating_add(bytes);
    }
}

impl Default for WriteArbiter {
    fn default() -> Self {
        Self::unmetered()
    }
}
