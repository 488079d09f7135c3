//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! (hostname, preferred port)
//!     → listener.rs (bind; on AddrInUse try port + 1, forever)
//!     → bound TcpListener + actual port
//!     → module server publishes the port and starts serving
//! ```
//!
//! # Design Decisions
//! - Only "address in use" is retried; every other bind error is fatal
//! - Retries are sequential with no backoff

pub mod listener;

pub use listener::{bind_with_retry, ListenerError};
