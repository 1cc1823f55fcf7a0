//! Single-slot gate serializing physical writes, with priority admission.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Admission priority for a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum WritePriority {
    #[default]
    Normal,
    High,
}

struct Waiter {
    ticket: u64,
    priority: WritePriority,
    tx: oneshot::Sender<()>,
}

#[derive(Default)]
struct GateState {
    held: bool,
    next_ticket: u64,
    waiters: Vec<Waiter>,
}

/// One holder at a time. On release the slot goes to the highest-priority
/// waiter, oldest first within a priority, so a high-priority write queued
/// behind normal ones is admitted next.
#[derive(Default)]
pub struct PriorityGate {
    state: Mutex<GateState>,
}

/// Holding this means holding the gate; dropping it hands the slot on.
pub struct GatePermit<'a> {
    gate: &'a PriorityGate,
}

/// A queued acquire. Dropping it unqueues the ticket, or passes the slot on if
/// it was granted but never claimed (cancelled or dropped future).
struct QueuedWait<'a> {
    gate: &'a PriorityGate,
    ticket: u64,
    rx: oneshot::Receiver<()>,
    claimed: bool,
}

impl Drop for QueuedWait<'_> {
    fn drop(&mut self) {
        if self.claimed {
            return;
        }
        let still_queued = {
            let mut state = self.gate.lock();
            let before = state.waiters.len();
            state.waiters.retain(|w| w.ticket != self.ticket);
            state.waiters.len() != before
        };
        if !still_queued && self.rx.try_recv().is_ok() {
            self.gate.release();
        }
    }
}

impl PriorityGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of writers waiting for the slot.
    pub fn queued(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_held(&self) -> bool {
        self.lock().held
    }

    /// Wait for the slot. `None` if `cancel` fired first.
    pub async fn acquire(
        &self,
        priority: WritePriority,
        cancel: &CancellationToken,
    ) -> Option<GatePermit<'_>> {
        let mut wait = {
            let mut state = self.lock();
            if !state.held {
                state.held = true;
                return Some(GatePermit { gate: self });
            }
            let (tx, rx) = oneshot::channel();
            let ticket = state.next_ticket;
            state.next_ticket += 1;
            state.waiters.push(Waiter {
                ticket,
                priority,
                tx,
            });
            QueuedWait {
                gate: self,
                ticket,
                rx,
                claimed: false,
            }
        };

        let granted = tokio::select! {
            biased;
            res = &mut wait.rx => res.is_ok(),
            _ = cancel.cancelled() => false,
        };
        if !granted {
            return None;
        }
        wait.claimed = true;
        Some(GatePermit { gate: self })
    }

    fn release(&self) {
        let mut state = self.lock();
        loop {
            let next = state
                .waiters
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.priority
                        .cmp(&b.priority)
                        .then_with(|| b.ticket.cmp(&a.ticket))
                })
                .map(|(i, _)| i);
            let Some(idx) = next else {
                state.held = false;
                return;
            };
            let waiter = state.waiters.swap_remove(idx);
            // A waiter whose future was dropped has a closed receiver; skip it.
            if waiter.tx.send(()).is_ok() {
                return;
            }
        }
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
