//! Dev-mode file watcher.
//!
//! # Responsibilities
//! - Watch the app root recursively
//! - Refresh the route table when route files come and go
//! - Bump versions of changed modules and report who is affected
//! - Reload `routekit.toml` when it changes
//!
//! # Design Decisions
//! - Hidden paths and the build output directory are ignored
//! - Reload failures keep the current configuration

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::config::{load_project_config, CONFIG_FILE};
use crate::server::context::ServerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn from_event(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Removed),
            _ => None,
        }
    }
}

/// What the watcher did in response to a file event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleChange {
    /// Route table rebuilt; holds the new route count.
    Routes(usize),
    /// A known module changed; `affected` lists its transitive dependents.
    Modified { specifier: String, affected: Vec<String> },
    /// Configuration reloaded.
    Config,
}

pub struct DevWatcher {
    ctx: Arc<ServerContext>,
    events: broadcast::Sender<ModuleChange>,
}

impl DevWatcher {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { ctx, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ModuleChange> {
        self.events.subscribe()
    }

    /// Watch until `shutdown` fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(kind) = ChangeKind::from_event(&event.kind) {
                        for path in event.paths {
                            let _ = tx.send((kind, path));
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default(),
        )?;
        watcher.watch(self.ctx.root(), RecursiveMode::Recursive)?;
        tracing::info!(root = ?self.ctx.root(), "Dev watcher started");

        loop {
            tokio::select! {
                Some((kind, path)) = rx.recv() => {
                    self.handle(kind, &path).await;
                }
                _ = shutdown.recv() => break,
            }
        }
        tracing::info!("Dev watcher stopped");
        Ok(())
    }

    /// React to one change; returns what was done, if anything.
    pub async fn handle(&self, kind: ChangeKind, path: &Path) -> Option<ModuleChange> {
        let filename = self.specifier_for(path)?;
        let change = if filename == format!("./{}", CONFIG_FILE) {
            self.reload_config().await?
        } else {
            self.handle_module(kind, &filename).await?
        };
        tracing::debug!(filename = %filename, change = ?change, "File change handled");
        let _ = self.events.send(change.clone());
        Some(change)
    }

    async fn handle_module(&self, kind: ChangeKind, filename: &str) -> Option<ModuleChange> {
        if kind != ChangeKind::Modified && self.ctx.is_route_file(filename) {
            return match self.ctx.refresh_routes().await {
                Ok(count) => Some(ModuleChange::Routes(count)),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to refresh routes");
                    None
                }
            };
        }
        if kind != ChangeKind::Modified {
            return None;
        }
        let graph = self.ctx.graph();
        graph.update(filename)?;
        Some(ModuleChange::Modified {
            specifier: filename.to_string(),
            affected: graph.affected(filename),
        })
    }

    async fn reload_config(&self) -> Option<ModuleChange> {
        match load_project_config(self.ctx.root()) {
            Ok(config) => {
                self.ctx.set_config(config);
                if let Err(e) = self.ctx.refresh_routes().await {
                    tracing::error!(error = %e, "Failed to refresh routes");
                }
                tracing::info!("Configuration reloaded");
                Some(ModuleChange::Config)
            }
            Err(e) => {
                tracing::error!("Failed to reload config: {}. Keeping current configuration.", e);
                None
            }
        }
    }

    /// `./rel/path` for a watched path, or `None` if it should be ignored.
    fn specifier_for(&self, path: &Path) -> Option<String> {
        let rel = self.relative_to_root(path)?;
        let output_dir = self.ctx.config().build.output_dir.clone();
        let mut parts = Vec::new();
        for component in rel.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            let part = part.to_string_lossy();
            if part.starts_with('.') || part == "node_modules" {
                return None;
            }
            parts.push(part.into_owned());
        }
        if parts.is_empty() || parts[0] == output_dir.trim_start_matches("./") {
            return None;
        }
        Some(format!("./{}", parts.join("/")))
    }

    /// `path` relative to the canonical root. Removed files cannot be
    /// canonicalized, so the nearest existing ancestor is resolved instead.
    fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        let root = self.ctx.root();
        if let Ok(rel) = path.strip_prefix(root) {
            return Some(rel.to_path_buf());
        }
        let mut base = path;
        let mut tail = Vec::new();
        loop {
            if let Ok(canonical) = std::fs::canonicalize(base) {
                let mut rel = canonical.strip_prefix(root).ok()?.to_path_buf();
                rel.extend(tail.into_iter().rev());
                return Some(rel);
            }
            tail.push(base.file_name()?);
            base = base.parent()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::HttpContentCache;
    use crate::config::AppConfig;
    use crate::graph::MarkProps;
    use crate::routing::{RouteDirConfig, RoutesConfig};
    use crate::transform::TransformPipeline;

    fn watcher(root: &Path) -> DevWatcher {
        let config = AppConfig {
            routes: Some(RoutesConfig::Dir(RouteDirConfig {
                dir: "./routes".into(),
                exts: vec!["tsx".into()],
                host: false,
            })),
            ..Default::default()
        };
        let pipeline = TransformPipeline::new(root, Arc::default(), Arc::new(HttpContentCache::default()));
        DevWatcher::new(Arc::new(ServerContext::new(root, config, pipeline).unwrap()))
    }

    #[tokio::test]
    async fn test_new_route_file_refreshes_routes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("routes")).unwrap();
        let watcher = watcher(&root);
        let mut events = watcher.subscribe();

        std::fs::write(root.join("routes/index.tsx"), "").unwrap();
        let change = watcher.handle(ChangeKind::Created, &root.join("routes/index.tsx")).await;
        assert_eq!(change, Some(ModuleChange::Routes(1)));
        assert_eq!(events.recv().await.unwrap(), ModuleChange::Routes(1));
    }

    #[tokio::test]
    async fn test_modified_module_reports_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let watcher = watcher(&root);
        let graph = watcher.ctx.graph();
        graph.mark("./lib/a.ts", MarkProps::default());
        graph.mark("./lib/b.ts", MarkProps::deps(vec!["./lib/a.ts".into()]));
        graph.mark("./routes/index.tsx", MarkProps::deps(vec!["./lib/b.ts".into()]));
        let before = graph.version_of("./lib/a.ts");

        let change = watcher.handle(ChangeKind::Modified, &root.join("lib/a.ts")).await;
        assert_eq!(
            change,
            Some(ModuleChange::Modified {
                specifier: "./lib/a.ts".into(),
                affected: vec!["./lib/b.ts".into(), "./routes/index.tsx".into()],
            })
        );
        assert!(graph.version_of("./lib/a.ts") > before);

        assert_eq!(watcher.handle(ChangeKind::Modified, &root.join("lib/unknown.ts")).await, None);
    }

    #[tokio::test]
    async fn test_ignored_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let watcher = watcher(&root);
        assert_eq!(watcher.specifier_for(&root.join(".git/HEAD")), None);
        assert_eq!(watcher.specifier_for(&root.join("dist/a.js")), None);
        assert_eq!(watcher.specifier_for(&root.join("lib/a.ts")).as_deref(), Some("./lib/a.ts"));
    }

    #[tokio::test]
    async fn test_event_paths_match_non_canonical_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/a.ts"), "").unwrap();
        let canonical = dir.path().canonicalize().unwrap();

        let watcher = watcher(&dir.path().join("lib").join(".."));
        assert_eq!(watcher.ctx.root(), canonical.as_path());
        assert_eq!(
            watcher.specifier_for(&canonical.join("lib/a.ts")).as_deref(),
            Some("./lib/a.ts")
        );
        assert_eq!(
            watcher.specifier_for(&dir.path().join("lib/a.ts")).as_deref(),
            Some("./lib/a.ts")
        );
        assert_eq!(
            watcher.specifier_for(&dir.path().join("lib/removed.ts")).as_deref(),
            Some("./lib/removed.ts")
        );
        assert_eq!(watcher.specifier_for(Path::new("/elsewhere/a.ts")), None);
    }

    #[tokio::test]
    async fn test_config_change_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let watcher = watcher(&root);
        std::fs::write(root.join(CONFIG_FILE), "[module_server]\nport = 7070\n").unwrap();
        let change = watcher.handle(ChangeKind::Modified, &root.join(CONFIG_FILE)).await;
        assert_eq!(change, Some(ModuleChange::Config));
        assert_eq!(watcher.ctx.config().module_server.port, 7070);
        assert!(watcher.ctx.config().routes.is_none());
    }
}
