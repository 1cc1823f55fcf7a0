//! Producer/consumer halves of the bridge and their shared state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::chunk::Chunk;
use super::error::StreamError;

/// Default time a read waits for the next delivery before failing with
/// [`StreamError::Timeout`].
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of a bridge.
///
/// `Idle → Receiving` on the first delivery, `Receiving → Completed | Faulted`
/// on the transport's terminal signal, any state `→ Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Receiving,
    Completed,
    Faulted,
    Cancelled,
}

struct Inner {
    state: BridgeState,
    queue: VecDeque<Chunk>,
    next_seq: u64,
    expected_seq: u64,
    fault: Option<String>,
    bytes_written: u64,
    bytes_read: u64,
    /// The terminal 0-byte read has been handed out.
    eof_reported: bool,
}

impl Inner {
    fn release_queue(&mut self) -> u64 {
        let dropped: u64 = self.queue.iter().map(|c| c.remaining() as u64).sum();
        self.queue.clear();
        dropped
    }
}

struct Shared {
    inner: Mutex<Inner>,
    /// Single-waiter signal: stores one permit when no reader is parked.
    data_ready: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail(&self, reason: String) -> bool {
        let mut inner = self.lock();
        let applies = match inner.state {
            BridgeState::Idle | BridgeState::Receiving => true,
            // A failure outranks a completion the consumer has not observed yet.
            BridgeState::Completed => !inner.eof_reported,
            BridgeState::Faulted | BridgeState::Cancelled => false,
        };
        if !applies {
            return false;
        }
        let dropped = inner.release_queue();
        inner.state = BridgeState::Faulted;
        tracing::debug!(reason = %reason, dropped_bytes = dropped, "stream faulted");
        inner.fault = Some(reason);
        drop(inner);
        self.data_ready.notify_one();
        true
    }
}

/// Creates a connected producer/consumer pair.
pub fn stream_bridge(inactivity_timeout: Duration) -> (StreamProducer, StreamReader) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            state: BridgeState::Idle,
            queue: VecDeque::new(),
            next_seq: 0,
            expected_seq: 0,
            fault: None,
            bytes_written: 0,
            bytes_read: 0,
            eof_reported: false,
        }),
        data_ready: Notify::new(),
    });
    let producer = StreamProducer {
        handle: Arc::new(ProducerHandle {
            shared: Arc::clone(&shared),
        }),
    };
    let reader = StreamReader {
        shared,
        inactivity_timeout,
    };
    (producer, reader)
}

struct ProducerHandle {
    shared: Arc<Shared>,
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        // Last producer gone without a terminal signal: the reader would otherwise
        // sit until its inactivity timeout.
        let open = matches!(
            self.shared.lock().state,
            BridgeState::Idle | BridgeState::Receiving
        );
        if open {
            self.shared
                .fail("producer dropped without completing".to_string());
        }
    }
}

/// Push side, driven from the transport's callback context.
///
/// Cloneable so several contexts can hold it, but calls to [`write`] must be
/// serialized by the caller to keep byte order.
///
/// [`write`]: StreamProducer::write
#[derive(Clone)]
pub struct StreamProducer {
    handle: Arc<ProducerHandle>,
}

impl StreamProducer {
    fn shared(&self) -> &Shared {
        &self.handle.shared
    }

    /// Copy `data` into the bridge and wake a waiting reader. Never blocks on
    /// the consumer; buffering is unbounded. Fails with [`StreamError::Closed`]
    /// once the stream is terminal, which the transport should treat as "stop".
    pub fn write(&self, data: &[u8]) -> Result<(), StreamError> {
        let owned = if data.is_empty() {
            None
        } else {
            Some(data.to_vec())
        };
        let mut inner = self.shared().lock();
        match inner.state {
            BridgeState::Completed | BridgeState::Faulted | BridgeState::Cancelled => {
                return Err(StreamError::Closed)
            }
            BridgeState::Idle => inner.state = BridgeState::Receiving,
            BridgeState::Receiving => {}
        }
        let Some(owned) = owned else {
            return Ok(());
        };
        inner.bytes_written += owned.len() as u64;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.push_back(Chunk::new(seq, owned));
        drop(inner);
        self.shared().data_ready.notify_one();
        Ok(())
    }

    /// Graceful end of stream. Returns false if the stream was already terminal.
    pub fn complete(&self) -> bool {
        let mut inner = self.shared().lock();
        match inner.state {
            BridgeState::Idle | BridgeState::Receiving => {
                inner.state = BridgeState::Completed;
                tracing::debug!(bytes = inner.bytes_written, "stream completed by producer");
                drop(inner);
                self.shared().data_ready.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Transport failure; surfaced on the next (or pending) read. Returns false
    /// if the signal was ignored because the stream was already terminal.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.shared().fail(reason.into())
    }

    /// True once the consumer side will no longer accept data.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.shared().lock().state,
            BridgeState::Completed | BridgeState::Faulted | BridgeState::Cancelled
        )
    }
}

/// Pull side, read from async code.
pub struct StreamReader {
    shared: Arc<Shared>,
    inactivity_timeout: Duration,
}

impl StreamReader {
    /// Read into `buf`, waiting for data if none is buffered.
    ///
    /// Returns as soon as at least one byte is available (short reads are
    /// normal). Returns `Ok(0)` exactly once, after the producer completed and
    /// the queue drained; reading again afterwards is [`StreamError::ReadPastEnd`].
    /// An empty `buf` returns `Ok(0)` immediately without consuming anything.
    pub async fn read(
        &mut self,
        buf: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + self.inactivity_timeout;
        loop {
            if cancel.is_cancelled() {
                self.cancel();
                return Err(StreamError::Cancelled);
            }
            if let Some(result) = self.try_read(buf) {
                return result;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.cancel();
                    return Err(StreamError::Cancelled);
                }
                _ = self.shared.data_ready.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(timeout = ?self.inactivity_timeout, "stream inactivity timeout");
                    return Err(StreamError::Timeout(self.inactivity_timeout));
                }
            }
        }
    }

    fn try_read(&self, buf: &mut [u8]) -> Option<Result<usize, StreamError>> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;
        match inner.state {
            BridgeState::Cancelled => return Some(Err(StreamError::Cancelled)),
            BridgeState::Faulted => {
                let reason = inner.fault.clone().unwrap_or_default();
                return Some(Err(StreamError::Transport(reason)));
            }
            _ => {}
        }

        let mut n = 0;
        while n < buf.len() {
            let Some(front) = inner.queue.front_mut() else {
                break;
            };
            debug_assert_eq!(front.seq(), inner.expected_seq, "chunks dequeued out of order");
            n += front.read_into(&mut buf[n..]);
            if front.is_consumed() {
                inner.queue.pop_front();
                inner.expected_seq += 1;
            }
        }
        if n > 0 {
            inner.bytes_read += n as u64;
            return Some(Ok(n));
        }

        if inner.state == BridgeState::Completed {
            if inner.eof_reported {
                return Some(Err(StreamError::ReadPastEnd));
            }
            inner.eof_reported = true;
            tracing::debug!(bytes = inner.bytes_read, "stream drained");
            return Some(Ok(0));
        }
        None
    }

    /// Drop every buffered-but-unread chunk. Returns the bytes discarded.
    pub fn release(&mut self) -> u64 {
        self.shared.lock().release_queue()
    }

    /// Move to `Cancelled` and release buffers; later producer writes fail.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if inner.state != BridgeState::Cancelled {
            let dropped = inner.release_queue();
            tracing::debug!(dropped_bytes = dropped, "stream cancelled");
            inner.state = BridgeState::Cancelled;
        }
    }

    pub fn state(&self) -> BridgeState {
        self.shared.lock().state
    }

    pub fn bytes_read(&self) -> u64 {
        self.shared.lock().bytes_read
    }

    pub fn bytes_written(&self) -> u64 {
        self.shared.lock().bytes_written
    }

    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.release_queue();
        if !matches!(inner.state, BridgeState::Completed | BridgeState::Faulted) {
            inner.state = BridgeState::Cancelled;
        }
    }
}
