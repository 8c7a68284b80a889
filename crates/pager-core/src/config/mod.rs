//! Slave configuration: file format, validation, and the master allow-list.
//!
//! The configuration file is a small line-oriented text format:
//!
//! ```text
//! #[slave config]
//! # Port
//! port=1337
//! # Allowed masters separated by spaces
//! master=10.0.0.1 master.example.org
//! # LogLevel
//! loglevel=0
//! ```
//!
//! The first line is a mandatory header.  Every other line is a comment
//! (`#...`), a `key=value` pair, or ignored.  See [`ConfigStore::load`] for
//! the exact rules and the fallbacks applied to invalid values.
//!
//! # Sub-modules
//!
//! - **`store`** – [`ConfigStore`], the single owner of the mutable
//!   [`Config`], with load/save and validated setters.
//! - **`allow_list`** – [`AllowList`], the resolved and deduplicated set of
//!   master addresses, and the authorization check.
//! - **`resolver`** – [`HostResolver`], the seam used to turn master host
//!   names into IP addresses.

use std::sync::{Arc, RwLock};

pub mod allow_list;
pub mod resolver;
pub mod store;

pub use allow_list::AllowList;
pub use resolver::{HostResolver, ResolveError, SystemResolver};
pub use store::{Config, ConfigError, ConfigStore};

/// Configuration store shared between the lifecycle controller (writer) and
/// the network server (reader of the allow-list).
pub type SharedConfig = Arc<RwLock<ConfigStore>>;
