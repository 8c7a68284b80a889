//! # pager-slave
//!
//! Runtime of the pager slave relay node.  The configuration rules live in
//! `pager-core`; this crate adds everything that touches the outside world:
//!
//! ```text
//! main()
//!  └─ cli::Cli                       -- flags
//!  └─ infrastructure::logging::init  -- tracing subscriber + LogSink
//!  └─ ConfigStore::load              -- port, masters, log level
//!  └─ LifecycleController::start_server(join = true)
//!       ├─ NetworkServer   -- accept loop, allow-list check, line reader
//!       ├─ MessageQueue    -- shared between readers and the scheduler
//!       └─ Timer/Scheduler -- drains the queue into the transmitter
//! ```

pub mod application;
pub mod cli;
pub mod infrastructure;

/// Version string printed by `-version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
