//! Remote content cache.
//!
//! # Data Flow
//! ```text
//! transform pipeline (remote module source)   bundler onLoad (inlined URL)
//!                    \                         /
//!                     → content.rs (memory hit? else fetch)
//!                     → reqwest GET → CachedContent { text, headers }
//! ```
//!
//! # Design Decisions
//! - Keyed by the full URL, kept for the life of the process
//! - Responses from the local module server are never cached: they carry
//!   per-build versions
//! - Failures propagate; there is no retry at this layer

pub mod content;

pub use content::{CacheError, CachedContent, ContentCache, HttpContentCache};
