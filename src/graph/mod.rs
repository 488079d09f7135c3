//! Dependency graph subsystem.
//!
//! # Data Flow
//! ```text
//! transform pipeline
//!     → store.rs (mark: deps + inline CSS, version bump)
//!     → module.rs (ModuleRecord, Version tokens)
//!
//! build pipeline
//!     → store.rs (read deps for the client closure)
//!     → snapshot.rs (serialize for the production server)
//!
//! dev watcher
//!     → store.rs (update + dependent lookup for reload blast radius)
//! ```
//!
//! # Design Decisions
//! - Grow-only for the life of the process; records are never pruned
//! - Every mark advances the version, even when content is unchanged
//! - One graph-wide clock keeps versions strictly increasing per record
//! - Per-key locking (DashMap): a transform only writes its own record

pub mod module;
pub mod snapshot;
pub mod store;

pub use module::{MarkProps, ModuleRecord, Version};
pub use snapshot::{GraphSnapshot, SNAPSHOT_FILE};
pub use store::DependencyGraph;
