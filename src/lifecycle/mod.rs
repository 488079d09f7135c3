//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl-C / SIGTERM → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → every subscriber (module server, dev watcher) stops
//! ```
//!
//! # Design Decisions
//! - The module server stops accepting immediately; in-flight requests
//!   are not drained
//! - A trigger before anyone subscribes is remembered

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
