//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → whatever recorder the embedding binary installs
//! ```
//!
//! # Design Decisions
//! - Request IDs are attached by the module server's tower layers
//! - Metric updates are no-ops until a recorder is installed
//! - Logging is initialized once, by the binary, never by the library

pub mod logging;
pub mod metrics;
