//! Infrastructure layer: sockets, timers, logging output and front ends.
//!
//! - `network`   – TCP accept loop for master connections
//! - `scheduler` – periodic queue drain into the transmitter
//! - `observer`  – optional status front end
//! - `logging`   – `tracing` subscriber and runtime level control

pub mod logging;
pub mod network;
pub mod observer;
pub mod scheduler;
