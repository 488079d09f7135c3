//! Production build subsystem.
//!
//! # Data Flow
//! ```text
//! routekit.toml (platform, output dir, jsx)
//!     → pipeline.rs: reset output dir
//!     → route table → exports.rs (export names per route file)
//!     → entry.rs (synthesized server entry + optional JSX shim)
//!     → bundler.rs FrameworkPlugin + a Bundler (vendor.rs by default)
//!           → <out>/server.js
//!     → graph snapshot → <out>/server_dependency_graph.js
//!     → closure.rs: route files + index.html links (html.rs) + style runtime
//!           → module server, level by level → <out>/...
//! ```
//!
//! # Design Decisions
//! - The bundler is a trait; the bundled one vendors modules verbatim
//! - Client modules are emitted through the module server router in
//!   process, so build output matches what dev serves
//! - Cleanup (shim removal, bundler stop) runs on success and failure

pub mod bundler;
pub mod closure;
pub mod entry;
pub mod exports;
pub mod html;
pub mod pipeline;
pub mod vendor;

pub use bundler::{BundlePlugin, BundleRequest, Bundler, FrameworkPlugin};
pub use closure::collect_client_modules;
pub use entry::{synthesize_server_entry, RouteFile, ServerEntry};
pub use exports::{ExportParser, TextExportParser};
pub use pipeline::{BuildError, BuildOutput, BuildPipeline};
pub use vendor::VendorBundler;
