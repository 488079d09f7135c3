//! Graph snapshot written at the end of a build.
//!
//! The production server imports the snapshot instead of re-running the
//! transform pipeline, so the file is an ES module with a default export.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::graph::module::ModuleRecord;
use crate::graph::store::DependencyGraph;

pub const SNAPSHOT_FILE: &str = "server_dependency_graph.js";

const EXPORT_PREFIX: &str = "export default ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub modules: Vec<ModuleRecord>,
}

impl GraphSnapshot {
    pub fn of(graph: &DependencyGraph) -> Self {
        Self {
            modules: graph.modules(),
        }
    }

    /// Render as `export default {"modules":[...]};`.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        Ok(format!("{EXPORT_PREFIX}{};", serde_json::to_string(self)?))
    }

    pub fn parse(source: &str) -> Result<Self, serde_json::Error> {
        let body = source.trim();
        let body = body.strip_prefix(EXPORT_PREFIX).unwrap_or(body);
        let body = body.strip_suffix(';').unwrap_or(body);
        serde_json::from_str(body)
    }

    pub fn into_graph(self) -> DependencyGraph {
        DependencyGraph::from_modules(self.modules)
    }
}

/// Write the snapshot of `graph` into `dir`.
pub async fn write_snapshot(graph: &DependencyGraph, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(SNAPSHOT_FILE);
    let text = GraphSnapshot::of(graph).render()?;
    tokio::fs::write(&path, text).await?;
    tracing::info!(path = ?path, modules = graph.len(), "Dependency graph snapshot written");
    Ok(path)
}

pub async fn read_snapshot(path: &Path) -> std::io::Result<GraphSnapshot> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(GraphSnapshot::parse(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MarkProps;

    #[tokio::test]
    async fn test_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let graph = DependencyGraph::new();
        graph.mark("./b.ts", MarkProps::default());
        graph.mark(
            "./a.tsx",
            MarkProps::deps(vec!["./b.ts".into()]).with_inline_css(Some(".a{}".into())),
        );

        let path = write_snapshot(&graph, dir.path()).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("export default {\"modules\":["));

        let snapshot = read_snapshot(&path).await.unwrap();
        let specifiers: Vec<_> = snapshot.modules.iter().map(|m| m.specifier.as_str()).collect();
        assert_eq!(specifiers, vec!["./a.tsx", "./b.ts"]);

        let restored = snapshot.into_graph();
        assert_eq!(restored.get("./a.tsx").unwrap().deps, vec!["./b.ts".to_string()]);
    }
}
