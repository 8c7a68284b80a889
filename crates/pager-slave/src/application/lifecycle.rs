//! LifecycleController: starts and stops the slave's moving parts.
//!
//! The controller owns the three runtime components and keeps them
//! consistent with a single `running` flag:
//!
//! ```text
//!            start_server(join)
//!   Stopped ───────────────────────► Running
//!      ▲                                │
//!      │  stop_server(graceful)         │
//!      ├────────────────────────────────┤
//!      │  report_server_error(msg)      │
//!      └────────────────────────────────┘
//! ```
//!
//! - the **message queue** is created on first start and cleared on stop.  The
//!   error path keeps it, so nothing already queued is lost before the
//!   operator decides what to do;
//! - the **network server** is created on first start with the port from the
//!   configuration store and cleared on every stop;
//! - the **timer and scheduler** are created together on first start and
//!   re-armed (never duplicated) on later starts.
//!
//! # Concurrency (for beginners)
//!
//! Every operation takes `&mut self`, so the borrow checker guarantees that
//! only one caller drives the controller at a time.  The only thing another
//! task may do is ask the running server to halt, through the cloneable
//! [`HaltHandle`] returned by [`LifecycleController::halt_handle`].  A
//! Ctrl-C handler uses exactly that: it halts the server, the joined
//! `start_server` call returns, and the controller shuts down on its own task.

use std::net::SocketAddr;
use std::sync::{Arc, PoisonError};

use pager_core::{LogSink, MessageQueue, SharedConfig};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::infrastructure::network::{HaltHandle, NetworkServer};
use crate::infrastructure::observer::StatusObserver;
use crate::infrastructure::scheduler::{
    Scheduler, Timer, TransmissionSink, INITIAL_DELAY, POLL_PERIOD,
};

/// Title of the observer dialog raised by a server runtime error.
pub const SERVER_ERROR_TITLE: &str = "Server Error";

/// Everything the controller needs from the outside world.
///
/// Built once in `main` and passed in; there is no process-wide state.
#[derive(Clone)]
pub struct AppContext {
    /// Shared configuration store; the server reads the port and allow-list.
    pub config: SharedConfig,
    /// Log output control.  Closed on shutdown when running headless.
    pub log: Option<Arc<dyn LogSink>>,
    /// Front end, if any.  `None` means headless.
    pub observer: Option<Arc<dyn StatusObserver>>,
    /// Where the scheduler sends drained messages.
    pub transmitter: Arc<dyn TransmissionSink>,
}

/// Owns the server, queue, timer and scheduler and drives their lifecycle.
pub struct LifecycleController {
    ctx: AppContext,
    running: bool,
    server: Option<NetworkServer>,
    message_queue: Option<Arc<MessageQueue>>,
    timer: Option<Timer>,
    scheduler: Option<Arc<Scheduler>>,
    halt: HaltHandle,
}

impl LifecycleController {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            ctx,
            running: false,
            server: None,
            message_queue: None,
            timer: None,
            scheduler: None,
            halt: HaltHandle::new(),
        }
    }

    // ── Scheduler ─────────────────────────────────────────────────────────────

    /// Creates the timer and scheduler if needed and (re)arms the timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_scheduler(&mut self) {
        let queue = self.ensure_queue();

        if self.timer.is_none() {
            self.timer = Some(Timer::new());
            self.scheduler = Some(Arc::new(Scheduler::new(
                queue,
                Arc::clone(&self.ctx.transmitter),
            )));
        }

        if let (Some(timer), Some(scheduler)) = (self.timer.as_mut(), self.scheduler.as_ref()) {
            timer.schedule(Arc::clone(scheduler), INITIAL_DELAY, POLL_PERIOD);
            debug!(timer = %timer.id(), scheduler = %scheduler.id(), "scheduler armed");
        }
    }

    /// Cancels and releases the timer and scheduler.  Safe when stopped.
    pub fn stop_scheduler(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.cancel();
        }
    }

    // ── Server ────────────────────────────────────────────────────────────────

    /// Starts the server and scheduler.
    ///
    /// With `join == true` this waits, without a timeout, until the accept
    /// loop ends and then shuts everything down.  A runtime error from the
    /// server goes through [`report_server_error`](Self::report_server_error)
    /// first.  Either way the observer ends on a disconnected status: the
    /// joined path gets it from [`stop_server`](Self::stop_server), the
    /// non-joined path right after the start.
    pub async fn start_server(&mut self, join: bool) {
        let queue = self.ensure_queue();

        if self.server.is_none() {
            let port = self
                .ctx
                .config
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .port();
            let server = NetworkServer::new(port, queue, Arc::clone(&self.ctx.config));
            self.halt.attach(server.halt_signal());
            self.server = Some(server);
        }

        self.start_scheduler();

        if let Some(server) = self.server.as_mut() {
            server.start();
        }

        self.running = true;
        if let Some(observer) = &self.ctx.observer {
            observer.set_status(true);
        }
        info!("server is running");

        if !join {
            if let Some(observer) = &self.ctx.observer {
                observer.set_status(false);
            }
            return;
        }

        let outcome = match self.server.as_mut() {
            Some(server) => Some(server.join().await),
            None => None,
        };

        match outcome {
            Some(Ok(Err(e))) => self.report_server_error(&e.to_string()),
            Some(Err(e)) => info!("wait for server interrupted: {e}"),
            Some(Ok(Ok(()))) | None => {}
        }

        self.stop_server(true);
    }

    /// Halts the server, stops the scheduler and discards the queue.
    ///
    /// Headless runs close the log sink afterwards; with an observer attached
    /// the observer is told the server stopped and its controls are reset.
    pub fn stop_server(&mut self, graceful: bool) {
        info!("server is going to shut down");
        if !graceful {
            debug!("shutdown requested after a failure");
        }

        if let Some(server) = self.server.take() {
            server.halt();
        }
        self.halt.detach();

        self.running = false;
        self.stop_scheduler();
        self.message_queue = None;

        info!("server halted");

        match &self.ctx.observer {
            None => {
                if let Some(log) = &self.ctx.log {
                    log.close();
                }
            }
            Some(observer) => {
                observer.set_status(false);
                observer.reset_controls();
            }
        }
    }

    /// Error path for a server that failed at runtime.
    ///
    /// Stops the scheduler and drops the server but keeps the queue and the
    /// log open.  The observer, if any, is shown `message`.
    pub fn report_server_error(&mut self, message: &str) {
        error!("server error: {message}");

        self.running = false;
        self.stop_scheduler();
        if let Some(server) = self.server.take() {
            server.halt();
        }
        self.halt.detach();

        if let Some(observer) = &self.ctx.observer {
            observer.show_error(SERVER_ERROR_TITLE, message);
            observer.set_status(false);
            observer.reset_controls();
        }
    }

    /// Reaps a server whose accept loop has ended on its own.
    ///
    /// For callers that started the server without joining.  Returns `true`
    /// if the server was reaped.
    pub async fn poll_server(&mut self) -> bool {
        let finished = self.server.as_ref().is_some_and(NetworkServer::is_finished);
        if !finished {
            return false;
        }

        let outcome = match self.server.as_mut() {
            Some(server) => server.join().await,
            None => return false,
        };

        match outcome {
            Ok(Err(e)) => self.report_server_error(&e.to_string()),
            Ok(Ok(())) => {
                warn!("server stopped without a halt request");
                self.stop_server(true);
            }
            Err(e) => {
                info!("wait for server interrupted: {e}");
                self.stop_server(false);
            }
        }
        true
    }

    /// A handle other tasks can use to halt the running server.
    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Asks the observer, if any, to repaint.
    pub fn redraw(&self) {
        if let Some(observer) = &self.ctx.observer {
            observer.redraw();
        }
    }

    /// Flushes and closes the log sink regardless of mode.
    pub fn close_log(&self) {
        if let Some(log) = &self.ctx.log {
            log.close();
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_server(&self) -> bool {
        self.server.is_some()
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn has_scheduler(&self) -> bool {
        self.scheduler.is_some()
    }

    /// The live message queue, if one exists.
    pub fn message_queue(&self) -> Option<&Arc<MessageQueue>> {
        self.message_queue.as_ref()
    }

    pub fn server_id(&self) -> Option<Uuid> {
        self.server.as_ref().map(NetworkServer::id)
    }

    pub fn timer_id(&self) -> Option<Uuid> {
        self.timer.as_ref().map(Timer::id)
    }

    pub fn scheduler_id(&self) -> Option<Uuid> {
        self.scheduler.as_ref().map(|s| s.id())
    }

    /// Address the server is bound to, once it is listening.
    pub async fn server_addr(&self) -> Option<SocketAddr> {
        match &self.server {
            Some(server) => server.bound_addr().await,
            None => None,
        }
    }

    fn ensure_queue(&mut self) -> Arc<MessageQueue> {
        Arc::clone(
            self.message_queue
                .get_or_insert_with(|| Arc::new(MessageQueue::new())),
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
