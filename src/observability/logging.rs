//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Honor `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Human-readable fmt output; this is a developer tool
//! - A second init is ignored rather than treated as an error

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    format!("routekit={},tower_http=warn", level)
}

/// Initialize logging with `level` applied to this crate.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}
