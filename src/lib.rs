//! routekit: file-system routed module server and production builder.

// Core model
pub mod graph;
pub mod routing;
pub mod specifier;

// Serving
pub mod cache;
pub mod net;
pub mod server;
pub mod transform;

// Build
pub mod build;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use build::BuildPipeline;
pub use config::AppConfig;
pub use graph::DependencyGraph;
pub use lifecycle::Shutdown;
pub use server::ModuleServer;
