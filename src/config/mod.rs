//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! routekit.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, normalized)
//!     → held by the server context behind an ArcSwap
//!
//! import_map.json
//!     → import_map.rs (imports + scopes)
//!     → transform pipeline and bundler resolve hooks
//!
//! On change (dev):
//!     dev watcher sees routekit.toml modified
//!     → loader.rs loads new config
//!     → atomic swap in the server context, route table rebuilt
//! ```
//!
//! # Design Decisions
//! - Invalid configuration is fatal at startup; no partial output
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod import_map;
pub mod loader;
pub mod schema;
pub mod validation;

pub use import_map::{load_import_map, ImportMap};
pub use loader::{load_config, load_project_config, ConfigError, CONFIG_FILE};
pub use schema::{
    AppConfig, AtomicCssConfig, BuildConfig, BuildTarget, JsxConfig, JsxRuntime, ModuleServerConfig,
    ObservabilityConfig, Platform, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
