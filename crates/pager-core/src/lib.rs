//! # pager-core
//!
//! Shared library for the pager slave relay node.  It contains the parts of
//! the node that decide *what* is allowed to happen, independent of sockets,
//! timers, or any user interface:
//!
//! - **`config`** – The slave configuration file: parsing, validation,
//!   defaults, persistence, and the master allow-list that decides which
//!   upstream masters may submit paging traffic.
//!
//! - **`logging`** – The [`LogLevel`] scale used by the configuration file and
//!   the [`LogSink`] control surface the configuration pushes level changes to.
//!
//! - **`queue`** – The [`MessageQueue`] shared between the network server
//!   (many producers) and the scheduler (single consumer).
//!
//! # What is a "slave"? (for beginners)
//!
//! A paging network is a tree of transmitters.  Upstream nodes, called
//! *masters*, hand paging calls to downstream relay nodes, called *slaves*,
//! which queue them and key the radio at the right time slot.  A slave must
//! only accept traffic from masters it trusts, which is what the allow-list
//! in [`config::AllowList`] is for.

pub mod config;
pub mod logging;
pub mod queue;

pub use config::{
    AllowList, Config, ConfigError, ConfigStore, HostResolver, ResolveError, SharedConfig,
    SystemResolver,
};
pub use logging::{LogLevel, LogSink};
pub use queue::{MessageQueue, PagingMessage};
