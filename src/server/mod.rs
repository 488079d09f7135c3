//! Module server subsystem.
//!
//! # Data Flow
//! ```text
//! GET /routes/index.tsx?v=18c4f2   GET /-/esm.sh/react@18   GET /app.css?module
//!     → server.rs (request id, trace, CORS header)
//!     → hook.rs (custom handler may answer first)
//!     → transform pipeline (compile + mark graph)
//!     → static file fallback (mime_guess)
//!
//! Dev mode:
//!     notify events → watcher.rs
//!         route file added/removed → context.rs refresh_routes
//!         module modified          → graph.update + affected dependents
//!         routekit.toml modified   → reload config + refresh routes
//! ```
//!
//! # Design Decisions
//! - All shared state lives in one `ServerContext` owned by the server
//! - The bound port is published to the context; companions get it in their environment
//! - Shutdown stops accepting immediately

pub mod context;
pub mod hook;
pub mod resolver;
pub mod server;
pub mod watcher;

pub use context::{ServerContext, MODULES_PORT_ENV};
pub use hook::{FetchHandler, ServerHook};
pub use resolver::{HttpModuleResolver, ModuleResolver};
pub use server::ModuleServer;
pub use watcher::{ChangeKind, DevWatcher, ModuleChange};
