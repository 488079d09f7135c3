//! Module records and version tokens.

use serde::{Deserialize, Serialize};

/// Opaque cache-busting token. Rendered as lowercase hex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// The form appended to URLs as `?v=<token>`.
    pub fn token(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A single compiled module known to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    /// Canonical path (`./a/b.ts`) or absolute URL.
    pub specifier: String,
    pub version: Version,
    /// Dependency specifiers in import order.
    #[serde(default)]
    pub deps: Vec<String>,
    /// Style text extracted while compiling the module.
    #[serde(default, rename = "inlineCSS", skip_serializing_if = "Option::is_none")]
    pub inline_css: Option<String>,
}

impl ModuleRecord {
    pub(crate) fn new(specifier: &str, version: Version) -> Self {
        Self {
            specifier: specifier.to_string(),
            version,
            deps: Vec::new(),
            inline_css: None,
        }
    }

    pub fn depends_on(&self, specifier: &str) -> bool {
        self.deps.iter().any(|d| d == specifier)
    }
}

/// Fields written by [`crate::graph::DependencyGraph::mark`].
///
/// Both fields overwrite the previous record: an empty `deps` or a `None`
/// style clears what was there before.
#[derive(Debug, Clone, Default)]
pub struct MarkProps {
    pub deps: Vec<String>,
    pub inline_css: Option<String>,
}

impl MarkProps {
    pub fn deps(deps: Vec<String>) -> Self {
        Self { deps, inline_css: None }
    }

    pub fn with_inline_css(mut self, css: Option<String>) -> Self {
        self.inline_css = css;
        self
    }
}
