//! Shared state of one module server instance.
//!
//! # Responsibilities
//! - Own the dependency graph, route table, active config and pipeline
//! - Publish the bound module-server port
//! - Register and load route modules
//!
//! # Design Decisions
//! - One context per server, passed by `Arc`; nothing is looked up globally
//! - Config and routes are swapped atomically; readers never block
//! - The graph is created on first use unless a snapshot is installed

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};

use crate::cache::CacheError;
use crate::config::AppConfig;
use crate::graph::{DependencyGraph, MarkProps};
use crate::routing::{init_routes, RouteError, RouteRegExp, Routes};
use crate::server::resolver::{HttpModuleResolver, ModuleResolver};
use crate::transform::TransformPipeline;

/// Environment variable carrying the bound module-server port to companion
/// processes. It is set on each spawned command, never on this process.
pub const MODULES_PORT_ENV: &str = "ROUTEKIT_MODULES_PORT";

pub struct ServerContext {
    root: PathBuf,
    config: ArcSwap<AppConfig>,
    graph: OnceLock<Arc<DependencyGraph>>,
    routes: ArcSwap<Routes>,
    pipeline: TransformPipeline,
    modules_port: Arc<AtomicU16>,
    route_modules: DashMap<String, String>,
    resolver: Arc<dyn ModuleResolver>,
}

impl ServerContext {
    /// Create a context and compile the initial route table.
    ///
    /// The root is canonicalized so watcher events with absolute paths
    /// line up with it.
    pub fn new(root: impl Into<PathBuf>, config: AppConfig, pipeline: TransformPipeline) -> Result<Self, RouteError> {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        let routes = match &config.routes {
            Some(routes) => init_routes(routes, &root)?,
            None => Routes::default(),
        };
        let modules_port = Arc::new(AtomicU16::new(config.module_server.port));
        let resolver = Arc::new(HttpModuleResolver::new(reqwest::Client::new(), modules_port.clone()));
        Ok(Self {
            root,
            config: ArcSwap::from_pointee(config),
            graph: OnceLock::new(),
            routes: ArcSwap::from_pointee(routes),
            pipeline,
            modules_port,
            route_modules: DashMap::new(),
            resolver,
        })
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    pub fn set_config(&self, config: AppConfig) {
        self.config.store(Arc::new(config));
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }

    /// The shared graph, created on first call.
    pub fn graph(&self) -> Arc<DependencyGraph> {
        self.graph.get_or_init(|| Arc::new(DependencyGraph::new())).clone()
    }

    /// Install a graph (e.g. restored from a snapshot). Fails if one exists.
    pub fn install_graph(&self, graph: Arc<DependencyGraph>) -> bool {
        self.graph.set(graph).is_ok()
    }

    pub fn routes(&self) -> Arc<Routes> {
        self.routes.load_full()
    }

    /// Re-enumerate route files under the current routing config.
    pub async fn refresh_routes(&self) -> Result<usize, RouteError> {
        let config = self.config();
        let routes = match config.routes.clone() {
            Some(routes_config) => {
                let root = self.root.clone();
                tokio::task::spawn_blocking(move || init_routes(&routes_config, &root)).await??
            }
            None => Routes::default(),
        };
        let count = routes.len();
        self.routes.store(Arc::new(routes));
        tracing::info!(routes = count, "Route table refreshed");
        Ok(count)
    }

    /// True if `filename` is a registered route or would become one.
    pub fn is_route_file(&self, filename: &str) -> bool {
        if self.routes.load().contains_file(filename) {
            return true;
        }
        let config = self.config();
        let Some(routes_config) = &config.routes else {
            return false;
        };
        match RouteRegExp::compile(routes_config) {
            Ok(reg) => reg.test(filename),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid routes config");
                false
            }
        }
    }

    /// Record the bound port. Companions learn it through
    /// [`ServerContext::companion_command`].
    pub fn publish_port(&self, port: u16) {
        self.modules_port.store(port, Ordering::SeqCst);
        tracing::debug!(port, "Module server port published");
    }

    /// A command run from the app root with the module-server port in its
    /// environment. The child is killed when the handle is dropped.
    pub fn companion_command(&self, program: &str, args: &[String]) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .current_dir(&self.root)
            .env(MODULES_PORT_ENV, self.modules_port().to_string())
            .kill_on_drop(true);
        command
    }

    pub fn modules_port(&self) -> u16 {
        self.modules_port.load(Ordering::SeqCst)
    }

    /// Origin the module server answers on, for allow-listing in bundles.
    pub fn modules_origin(&self) -> String {
        format!("http://localhost:{}", self.modules_port())
    }

    /// Register bundled code for a route file.
    pub fn register_route_module(&self, filename: &str, code: impl Into<String>) {
        self.route_modules.insert(filename.to_string(), code.into());
    }

    /// Code of a route module: the registered bundle, or the compiled module
    /// at its current graph version.
    pub async fn load_route_module(&self, filename: &str) -> Result<String, CacheError> {
        if let Some(code) = self.route_modules.get(filename) {
            return Ok(code.value().clone());
        }
        let graph = self.graph();
        let version = match graph.get(filename) {
            Some(record) => record.version,
            None => graph.mark(filename, MarkProps::default()).version,
        };
        self.resolver.resolve(filename, version).await
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("root", &self.root)
            .field("modules_port", &self.modules_port())
            .field("routes", &self.routes.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::HttpContentCache;
    use crate::graph::Version;
    use crate::routing::{RouteDirConfig, RoutesConfig};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, Version)>>);

    #[async_trait]
    impl ModuleResolver for Recording {
        async fn resolve(&self, specifier: &str, version: Version) -> Result<String, CacheError> {
            self.0.lock().unwrap().push((specifier.to_string(), version));
            Ok(format!("// {}", specifier))
        }
    }

    fn context(root: &Path) -> ServerContext {
        let config = AppConfig {
            routes: Some(RoutesConfig::Dir(RouteDirConfig {
                dir: "./routes".into(),
                exts: vec!["tsx".into()],
                host: false,
            })),
            ..Default::default()
        };
        let pipeline = TransformPipeline::new(root, Arc::default(), Arc::new(HttpContentCache::default()));
        ServerContext::new(root, config, pipeline).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_port_reaches_companions_only() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.publish_port(38690);
        assert_eq!(ctx.modules_port(), 38690);
        assert_eq!(ctx.modules_origin(), "http://localhost:38690");
        assert!(std::env::var(MODULES_PORT_ENV).is_err());

        let script = format!("printf '%s %s' \"${}\" \"$(pwd -P)\"", MODULES_PORT_ENV);
        let output = ctx
            .companion_command("sh", &["-c".to_string(), script])
            .output()
            .await
            .unwrap();
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert_eq!(stdout, format!("38690 {}", dir.path().canonicalize().unwrap().display()));
    }

    #[tokio::test]
    async fn test_refresh_and_route_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("routes")).unwrap();
        std::fs::write(dir.path().join("routes/index.tsx"), "").unwrap();
        let ctx = context(dir.path());
        assert_eq!(ctx.routes().len(), 1);

        assert!(ctx.is_route_file("./routes/index.tsx"));
        assert!(ctx.is_route_file("./routes/new.tsx"));
        assert!(!ctx.is_route_file("./lib/util.ts"));

        std::fs::write(dir.path().join("routes/about.tsx"), "").unwrap();
        assert_eq!(ctx.refresh_routes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_route_module() {
        let dir = tempfile::tempdir().unwrap();
        let recording = Arc::new(Recording::default());
        let ctx = context(dir.path()).with_resolver(recording.clone());

        ctx.register_route_module("./routes/a.tsx", "bundled");
        assert_eq!(ctx.load_route_module("./routes/a.tsx").await.unwrap(), "bundled");

        let code = ctx.load_route_module("./routes/b.tsx").await.unwrap();
        assert_eq!(code, "// ./routes/b.tsx");
        let calls = recording.0.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, ctx.graph().version_of("./routes/b.tsx"));
    }

    #[test]
    fn test_graph_is_lazy_singleton() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let installed = Arc::new(DependencyGraph::new());
        assert!(ctx.install_graph(installed.clone()));
        assert!(Arc::ptr_eq(&ctx.graph(), &installed));
        assert!(!ctx.install_graph(Arc::new(DependencyGraph::new())));
    }
}
