//! Thread-safe paging message queue.
//!
//! Connection handlers push messages from many tasks at once; the scheduler
//! drains the whole queue on every tick.  The queue is a `VecDeque` behind a
//! `std::sync::Mutex`: every critical section is a single push or a single
//! `drain(..)`, so producers are never held up for longer than one of those
//! operations and the consumer always sees complete entries.
//!
//! A `std` mutex (rather than `tokio::sync::Mutex`) is the right tool here
//! because the lock is never held across an `.await`.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// One paging call received from a master.
///
/// The payload is kept opaque: encoding it for the transmitter is the job of
/// the transmission pipeline, not of the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingMessage {
    /// Address of the master that submitted the message.
    pub source: IpAddr,
    /// Raw message line as received.
    pub payload: String,
    /// Wall-clock time the message was accepted.
    pub received_at: SystemTime,
}

impl PagingMessage {
    /// Creates a message stamped with the current time.
    pub fn new(source: IpAddr, payload: impl Into<String>) -> Self {
        Self {
            source,
            payload: payload.into(),
            received_at: SystemTime::now(),
        }
    }
}

/// FIFO queue shared between the network server and the scheduler.
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: Mutex<VecDeque<PagingMessage>>,
}

impl MessageQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the back of the queue.
    pub fn push(&self, message: PagingMessage) {
        self.lock().push_back(message);
    }

    /// Removes and returns every queued message, oldest first.
    pub fn drain(&self) -> Vec<PagingMessage> {
        self.lock().drain(..).collect()
    }

    /// Number of messages currently waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no message is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic in another holder cannot leave a VecDeque half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<PagingMessage>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
