//! Contracts of the external compilers the pipeline drives.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::cache::CacheError;
use crate::config::{AtomicCssConfig, ImportMap};
use crate::graph::Version;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] CacheError),

    #[error("failed to transform {specifier}: {message}")]
    Script { specifier: String, message: String },

    #[error("failed to bundle style {specifier}: {message}")]
    Style { specifier: String, message: String },

    #[error("atomic CSS generation failed for {specifier}: {message}")]
    AtomicCss { specifier: String, message: String },

    #[error("loader failed for {path}: {message}")]
    Loader { path: String, message: String },
}

impl TransformError {
    pub fn is_not_found(&self) -> bool {
        match self {
            TransformError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            TransformError::Fetch(CacheError::Status { status, .. }) => *status == 404,
            _ => false,
        }
    }
}

/// Inputs handed to the source transform besides the code itself.
#[derive(Debug, Clone, Copy)]
pub struct ScriptOptions<'a> {
    pub is_dev: bool,
    pub import_map: &'a ImportMap,
    /// Version for modules the graph has not marked yet.
    pub baseline_version: Version,
    /// Current version of every other local module.
    pub versions: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub code: String,
    /// Canonical specifiers of every import, in source order.
    pub deps: Vec<String>,
}

/// Source-to-source compiler: strips types, rewrites imports to
/// cache-busted URLs and reports dependencies.
#[async_trait]
pub trait SourceTransform: Send + Sync {
    async fn transform(
        &self,
        specifier: &str,
        source: &str,
        options: ScriptOptions<'_>,
    ) -> Result<ScriptOutput, TransformError>;
}

/// Browser matrix styles are lowered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserTargets {
    pub android: u32,
    pub chrome: u32,
    pub edge: u32,
    pub firefox: u32,
    pub safari: u32,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            android: 95,
            chrome: 95,
            edge: 95,
            firefox: 90,
            safari: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StyleOptions {
    pub targets: BrowserTargets,
    pub minify: bool,
    /// Rename class selectors and export the mapping (`*.module.css`).
    pub scoped_class_names: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOutput {
    pub code: String,
    /// Original class name → scoped class name.
    pub scoped_exports: BTreeMap<String, String>,
    pub deps: Vec<String>,
}

#[async_trait]
pub trait StyleBundler: Send + Sync {
    async fn bundle(
        &self,
        specifier: &str,
        source: &str,
        options: &StyleOptions,
    ) -> Result<StyleOutput, TransformError>;
}

#[derive(Debug, Clone, Copy)]
pub struct AtomicOptions<'a> {
    pub id: &'a str,
    pub minify: bool,
}

/// Utility-class CSS generator scanning source text for class usage.
#[async_trait]
pub trait AtomicStyleGenerator: Send + Sync {
    /// Returns the generated CSS; empty when nothing matched.
    async fn generate(
        &self,
        config: &AtomicCssConfig,
        source: &str,
        options: AtomicOptions<'_>,
    ) -> Result<String, TransformError>;
}
