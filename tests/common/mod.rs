//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use routekit::build::{BundlePlugin, BundleRequest, Bundler, BuildError};
use routekit::cache::{CacheError, CachedContent, ContentCache};
use routekit::config::{load_import_map, load_project_config};
use routekit::server::{ModuleServer, ServerContext, ServerHook};
use routekit::transform::TransformPipeline;

pub const FRAMEWORK_URL: &str = "https://fw.test/routekit";

/// Write `files` (relative path, contents) under `root`.
pub fn write_fixture(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

/// A `routekit.toml` with file-system routes under `./routes`.
pub fn project_config(port: u16) -> String {
    format!(
        "framework_url = \"{FRAMEWORK_URL}\"\n\n\
         [routes]\ndir = \"./routes\"\nexts = [\"tsx\", \"ts\"]\n\n\
         [module_server]\nport = {port}\n\n\
         [build]\noutput_dir = \"dist\"\n"
    )
}

/// Framework runtime modules the build pulls in.
pub fn framework_modules() -> HashMap<String, String> {
    HashMap::from([
        (
            format!("{FRAMEWORK_URL}/framework/core/style.ts"),
            "export function applyCSS(id: string, css: string) {}\n".to_string(),
        ),
        (
            format!("{FRAMEWORK_URL}/server/mod.ts"),
            "export function serve() {}\n".to_string(),
        ),
    ])
}

/// In-memory content cache; localhost URLs are fetched for real.
pub struct TestCache {
    entries: HashMap<String, String>,
    client: reqwest::Client,
    pub fetched: Mutex<Vec<String>>,
}

impl TestCache {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            client: reqwest::Client::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContentCache for TestCache {
    async fn get(&self, url: &str) -> Result<CachedContent, CacheError> {
        self.fetched.lock().unwrap().push(url.to_string());
        if let Some(text) = self.entries.get(url) {
            return Ok(CachedContent::new(url, text.clone()).with_header("content-type", "application/typescript"));
        }
        if url.starts_with("http://localhost:") || url.starts_with("http://127.0.0.1:") {
            let res = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| CacheError::Request { url: url.to_string(), source })?;
            let status = res.status().as_u16();
            if status != 200 {
                return Err(CacheError::Status { url: url.to_string(), status });
            }
            let text = res
                .text()
                .await
                .map_err(|source| CacheError::Request { url: url.to_string(), source })?;
            return Ok(CachedContent::new(url, text).with_header("content-type", "application/javascript"));
        }
        Err(CacheError::Status { url: url.to_string(), status: 404 })
    }
}

/// Bundler that records what it was asked to do.
#[derive(Default)]
pub struct RecordingBundler {
    pub requests: Mutex<Vec<BundleRequest>>,
    pub stops: AtomicUsize,
    pub fail: bool,
}

impl RecordingBundler {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn entry(&self) -> String {
        self.requests.lock().unwrap().last().map(|r| r.contents.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Bundler for RecordingBundler {
    async fn bundle(&self, request: BundleRequest, _plugin: &dyn BundlePlugin) -> Result<(), BuildError> {
        for inject in &request.inject {
            assert!(inject.exists(), "injected file missing during bundling");
        }
        self.requests.lock().unwrap().push(request);
        if self.fail {
            return Err(BuildError::Bundle("bundler exploded".to_string()));
        }
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Load the project at `root` into a server context backed by `cache`.
pub fn context(root: &Path, cache: Arc<dyn ContentCache>) -> Arc<ServerContext> {
    let config = load_project_config(root).unwrap();
    let import_map = load_import_map(root, config.import_map.as_deref()).unwrap();
    let pipeline = TransformPipeline::new(root, Arc::new(import_map), cache);
    Arc::new(ServerContext::new(root, config, pipeline).unwrap())
}

pub fn server(ctx: &Arc<ServerContext>) -> ModuleServer {
    ModuleServer::new(ctx.clone(), ServerHook::Default)
}
