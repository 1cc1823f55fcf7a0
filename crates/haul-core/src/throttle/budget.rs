//! Platform write-budget capability.
//!
//! Some hosts cap how many bytes a process may write per rolling interval and
//! report their own accounting. [`WriteBudgetSource`] is that report; a host
//! without one simply has no source and writes are paced by rate alone.

use std::time::Duration;

use tokio::time::Instant;

/// One reading of the platform budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    /// Bytes the platform has counted in the current interval.
    pub bytes_written: u64,
    /// Allowance per interval.
    pub budget: u64,
    /// Time since the current interval began.
    pub elapsed: Duration,
    pub interval: Duration,
}

impl BudgetSnapshot {
    pub fn interval_remaining(&self) -> Duration {
        self.interval.saturating_sub(self.elapsed)
    }
}

pub trait WriteBudgetSource: Send + Sync {
    /// Current budget state, or `None` when the platform is not metering writes.
    fn query(&self) -> Option<BudgetSnapshot>;
}

/// Fixed allowance per fixed interval, intervals anchored at construction.
///
/// The platform side of the count is always zero; the arbiter supplies the
/// bytes this process committed.
#[derive(Debug, Clone)]
pub struct ClockBudget {
    budget: u64,
    interval: Duration,
    epoch: Instant,
}

impl ClockBudget {
    pub fn new(budget: u64, interval: Duration) -> Self {
        Self {
            budget,
            interval,
            epoch: Instant::now(),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl WriteBudgetSource for ClockBudget {
    fn query(&self) -> Option<BudgetSnapshot> {
        if self.budget == 0 || self.interval.is_zero() {
            return None;
        }
        let since = self.epoch.elapsed().as_nanos();
        let into = since % self.interval.as_nanos();
        Some(BudgetSnapshot {
            bytes_written: 0,
            budget: self.budget,
            elapsed: Duration::from_nanos(into as u64),
            interval: self.interval,
        })
    }
}
