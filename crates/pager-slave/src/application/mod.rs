//! Application layer for the slave.
//!
//! - **`lifecycle`** – The [`LifecycleController`](lifecycle::LifecycleController)
//!   that starts and stops the network server, the message queue and the
//!   transmit scheduler as one unit, and the [`AppContext`](lifecycle::AppContext)
//!   it is built from.
//! - **`configure`** – Loads the configuration store on the blocking pool.

pub mod configure;
pub mod lifecycle;

pub use configure::load_config;
pub use lifecycle::{AppContext, LifecycleController};
