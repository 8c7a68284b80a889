//! Periodic scheduler that moves queued paging calls to the transmitter.
//!
//! The [`Timer`] owns a Tokio interval task; every period it calls
//! [`Scheduler::tick`], which drains the shared [`MessageQueue`] and hands each
//! message to the [`TransmissionSink`].  Re-arming the timer replaces the
//! running task, so there is never more than one tick loop per timer.

pub mod transmitter;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pager_core::MessageQueue;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, trace};
use uuid::Uuid;

pub use transmitter::{LoggingTransmitter, TransmissionSink, TransmitError};

/// Delay before the first tick after the timer is armed.
pub const INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Time between ticks.
pub const POLL_PERIOD: Duration = Duration::from_millis(100);

/// Drains the message queue into the transmission sink.
pub struct Scheduler {
    id: Uuid,
    queue: Arc<MessageQueue>,
    sink: Arc<dyn TransmissionSink>,
    cancelled: AtomicBool,
    ticks: AtomicU64,
}

impl Scheduler {
    pub fn new(queue: Arc<MessageQueue>, sink: Arc<dyn TransmissionSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue,
            sink,
            cancelled: AtomicBool::new(false),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Runs one scheduling round.  Returns the number of messages sent.
    ///
    /// Does nothing once the scheduler has been cancelled.
    pub fn tick(&self) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);

        let batch = self.queue.drain();
        trace!(scheduler = %self.id, pending = batch.len(), "tick");

        let mut sent = 0;
        for message in &batch {
            match self.sink.transmit(message) {
                Ok(()) => sent += 1,
                Err(e) => error!("{e}"),
            }
        }
        sent
    }

    /// Stops future ticks.  A tick already in progress runs to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Drives a [`Scheduler`] at a fixed period.
pub struct Timer {
    id: Uuid,
    task: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            task: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Arms the timer, replacing any previous schedule.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&mut self, scheduler: Arc<Scheduler>, delay: Duration, period: Duration) {
        if let Some(old) = self.task.take() {
            debug!(timer = %self.id, "re-arming timer");
            old.abort();
        }

        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if scheduler.is_cancelled() {
                    break;
                }
                scheduler.tick();
            }
        }));
    }

    /// Stops the timer.  Safe to call when it is not armed.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
