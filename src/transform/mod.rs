//! Module transform subsystem.
//!
//! # Data Flow
//! ```text
//! ModuleRequest { specifier, as_module }
//!     → pipeline.rs (classify by extension / loader chain)
//!         .css            → style bundler      → CSS or `export default {scoped}`
//!         .js/.ts/...     → source transform   → rewritten script
//!         custom (.vue)   → loader.rs → source transform
//!         anything else   → None (caller serves the file as is)
//!     → DependencyGraph::mark(specifier, deps, inline CSS)
//! ```
//!
//! # Design Decisions
//! - Collaborators are traits; imports.rs and style.rs are the defaults
//! - The pipeline owns no graph; callers pass the shared instance in
//! - Atomic CSS is appended to loader-provided style, never replacing it

pub mod collaborators;
pub mod imports;
pub mod loader;
pub mod pipeline;
pub mod style;

pub use collaborators::{
    AtomicOptions, AtomicStyleGenerator, BrowserTargets, ScriptOptions, ScriptOutput, SourceTransform, StyleBundler,
    StyleOptions, StyleOutput, TransformError,
};
pub use imports::ImportRewriter;
pub use loader::{LoaderChain, LoaderEnv, LoaderOutput, ModuleLoader};
pub use pipeline::{ModuleKind, ModuleRequest, TransformOutput, TransformPipeline, CSS_CONTENT_TYPE, JS_CONTENT_TYPE};
pub use style::PlainStyleBundler;
