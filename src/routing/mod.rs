//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (startup, config change, route file added/removed):
//!     RoutesConfig (glob | {dir, exts, host})
//!     → regexp.rs (prefix, test, exec → RoutePattern)
//!     → router.rs (enumerate files, order, nesting, magic slots)
//!     → Routes (immutable, swapped into the server context)
//!
//! Incoming Request (host, pathname)
//!     → router.rs (ordered lookup)
//!     → matcher.rs (segment match, params)
//! ```
//!
//! # Design Decisions
//! - Ordering is a heuristic, not a longest-match solver
//! - First match wins
//! - Deterministic: same file set always yields the same table

pub mod matcher;
pub mod regexp;
pub mod router;

pub use matcher::{PatternMatch, UrlPattern};
pub use regexp::{RouteDirConfig, RouteError, RoutePattern, RouteRegExp, RoutesConfig};
pub use router::{init_routes, scan_routes, Route, RouteMeta, Routes};
