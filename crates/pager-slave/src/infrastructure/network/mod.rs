//! Network server: accepts master connections and queues their paging calls.
//!
//! Architecture:
//! - `NetworkServer::start` spawns one accept-loop task bound to
//!   `0.0.0.0:<port>`.
//! - Every accepted peer is checked against the master allow-list before any
//!   byte is read.  Unauthorised peers are logged and dropped.
//! - Each authorised connection gets its own task that reads
//!   newline-delimited text and pushes every non-empty line onto the shared
//!   [`MessageQueue`].
//! - `halt` flips a `watch` channel that the accept loop and every connection
//!   task select on, so shutdown is cooperative and prompt.
//!
//! The paging wire format is not interpreted here; one line is one message.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pager_core::config::resolver::canonical_ip;
use pager_core::{MessageQueue, PagingMessage, SharedConfig};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How often [`NetworkServer::bound_addr`] re-checks a pending accept loop.
const BIND_POLL: Duration = Duration::from_millis(50);

/// Runtime errors that end the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen socket could not be bound.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of waiting for the accept loop.
///
/// The outer `Err` means the wait itself was interrupted (the task panicked
/// or was cancelled); the inner `Err` is a runtime error of the server.
pub type JoinOutcome = Result<Result<(), ServerError>, JoinError>;

/// The slave's TCP listener for master connections.
pub struct NetworkServer {
    id: Uuid,
    port: u16,
    queue: Arc<MessageQueue>,
    config: SharedConfig,
    halt_tx: Arc<watch::Sender<bool>>,
    bound_tx: Arc<watch::Sender<Option<SocketAddr>>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl NetworkServer {
    /// Creates a server for `port`; nothing is bound until [`start`](Self::start).
    ///
    /// Port `0` lets the OS pick a free port; see [`bound_addr`](Self::bound_addr).
    pub fn new(port: u16, queue: Arc<MessageQueue>, config: SharedConfig) -> Self {
        let (halt_tx, _) = watch::channel(false);
        let (bound_tx, _) = watch::channel(None);
        Self {
            id: Uuid::new_v4(),
            port,
            queue,
            config,
            halt_tx: Arc::new(halt_tx),
            bound_tx: Arc::new(bound_tx),
            task: None,
        }
    }

    /// Unique identifier of this server instance.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Spawns the accept loop.  Calling it again is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.task.is_some() {
            debug!(server = %self.id, "accept loop already started");
            return;
        }

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port));
        let queue = Arc::clone(&self.queue);
        let config = Arc::clone(&self.config);
        let halt_rx = self.halt_tx.subscribe();
        let bound_tx = Arc::clone(&self.bound_tx);

        self.task = Some(tokio::spawn(async move {
            accept_loop(addr, queue, config, halt_rx, bound_tx).await
        }));
    }

    /// Returns `true` once [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Returns `true` if the accept loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Requests the accept loop and all connection tasks to stop.
    pub fn halt(&self) {
        self.halt_tx.send_replace(true);
    }

    /// Returns a handle that can halt this server from another task.
    pub fn halt_signal(&self) -> Arc<watch::Sender<bool>> {
        Arc::clone(&self.halt_tx)
    }

    /// Waits, without a timeout, until the accept loop exits.
    ///
    /// Returns `Ok(Ok(()))` immediately if the server was never started or
    /// has already been joined.
    pub async fn join(&mut self) -> JoinOutcome {
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(Ok(())),
        }
    }

    /// Waits until the listener is bound and returns its address.
    ///
    /// Returns `None` if the accept loop ends without ever binding.
    pub async fn bound_addr(&self) -> Option<SocketAddr> {
        let mut rx = self.bound_tx.subscribe();
        loop {
            if let Some(addr) = *rx.borrow_and_update() {
                return Some(addr);
            }
            if self.task.is_none() || self.is_finished() {
                return None;
            }
            // The sender outlives a failed accept loop, so re-check its state.
            let _ = tokio::time::timeout(BIND_POLL, rx.changed()).await;
        }
    }
}

impl Drop for NetworkServer {
    fn drop(&mut self) {
        self.halt();
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

async fn accept_loop(
    addr: SocketAddr,
    queue: Arc<MessageQueue>,
    config: SharedConfig,
    mut halt_rx: watch::Receiver<bool>,
    bound_tx: Arc<watch::Sender<Option<SocketAddr>>>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    let local = listener.local_addr().unwrap_or(addr);
    bound_tx.send_replace(Some(local));
    info!("listening for masters on {local}");

    loop {
        if *halt_rx.borrow_and_update() {
            break;
        }

        tokio::select! {
            changed = halt_rx.changed() => {
                if changed.is_err() {
                    // Every sender is gone; nobody can restart us.
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let authorized = config
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .is_authorized(peer.ip());
                    if !authorized {
                        warn!("rejected connection from unauthorised master {peer}");
                        continue;
                    }

                    info!("master connected: {peer}");
                    let queue = Arc::clone(&queue);
                    let halt_rx = halt_rx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, queue, halt_rx).await;
                    });
                }
                Err(e) => {
                    // Transient (e.g. too many open files); keep serving.
                    error!("accept error: {e}");
                }
            },
        }
    }

    info!("accept loop on {local} stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    queue: Arc<MessageQueue>,
    mut halt_rx: watch::Receiver<bool>,
) {
    let source = canonical_ip(peer.ip());
    let mut lines = BufReader::new(stream).lines();

    loop {
        if *halt_rx.borrow_and_update() {
            break;
        }

        tokio::select! {
            changed = halt_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let payload = line.trim();
                    if payload.is_empty() {
                        continue;
                    }
                    debug!("queued message from {peer}: {payload}");
                    queue.push(PagingMessage::new(source, payload));
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("read error from {peer}: {e}");
                    break;
                }
            },
        }
    }

    info!("master disconnected: {peer}");
}

/// Shared slot through which another task can halt whichever server is
/// currently running.
///
/// The lifecycle controller attaches each new server's halt signal and
/// detaches it on shutdown; a Ctrl-C handler only ever touches this handle.
#[derive(Clone, Default)]
pub struct HaltHandle {
    slot: Arc<Mutex<Option<Arc<watch::Sender<bool>>>>>,
}

impl HaltHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Points the handle at a server's halt signal.
    pub fn attach(&self, signal: Arc<watch::Sender<bool>>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(signal);
    }

    /// Disconnects the handle from any server.
    pub fn detach(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Halts the attached server.  Returns `false` if none is attached.
    pub fn halt(&self) -> bool {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(signal) => {
                signal.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Halts the attached server on every signal from `next_signal`.
    ///
    /// A signal that arrives while no server is attached is logged and the
    /// wait starts over, so an early Ctrl-C is never the last one honoured.
    /// Returns after the first successful halt, or when the signal source
    /// fails.
    pub async fn halt_on_signals<F, Fut>(&self, mut next_signal: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<()>>,
    {
        loop {
            if let Err(e) = next_signal().await {
                error!("cannot listen for shutdown signal: {e}");
                return;
            }
            info!("shutdown signal received");
            if self.halt() {
                return;
            }
            warn!("no server is running yet; waiting for the next signal");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
