//! Rate- and budget-limited disk writes.
//!
//! [`ThrottledWriter`] splits a write into sub-chunks and commits them one at
//! a time through a process-wide gate. Each sub-chunk waits if it would
//! overrun the platform's per-interval write budget, then the writer sleeps
//! long enough to hold the configured byte rate. As budget usage climbs past a
//! threshold the rate ramps down toward zero instead of stopping abruptly.

mod arbiter;
mod budget;
mod error;
mod gate;
mod pace;
mod target;
mod writer;

pub use arbiter::{BudgetStatus, WriteArbiter};
pub use budget::{BudgetSnapshot, ClockBudget, WriteBudgetSource};
pub use error::ThrottleError;
pub use gate::{GatePermit, PriorityGate, WritePriority};
pub use target::WriteTarget;
pub use writer::{ThrottleSettings, ThrottledWriter, DEFAULT_SPEED_REDUCTION_THRESHOLD};
