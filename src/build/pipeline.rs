//! Production build orchestration.
//!
//! # Responsibilities
//! - Reject unsupported deploy platforms before touching the disk
//! - Reset the output directory
//! - Parse route exports, synthesize and bundle the server entry
//! - Write the graph snapshot and emit the client module closure
//! - Clean up the JSX shim and stop the bundler whatever the outcome

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::build::bundler::{BundleRequest, Bundler, FrameworkPlugin};
use crate::build::closure::collect_client_modules;
use crate::build::entry::{jsx_shim, synthesize_server_entry, RouteFile, ServerEntry, JSX_SHIM_FILE};
use crate::build::exports::ExportParser;
use crate::build::html::parse_html_links;
use crate::cache::CacheError;
use crate::config::{AppConfig, Platform};
use crate::graph::snapshot::write_snapshot;
use crate::observability::metrics;
use crate::routing::RouteError;
use crate::server::ModuleServer;
use crate::specifier::{clean_path, extension, is_remote, is_script};
use crate::transform::TransformError;

/// Name of the bundled server program inside the output directory.
pub const SERVER_BUNDLE_FILE: &str = "server.js";

/// Framework module that aggregates route styles on the client.
pub const STYLE_MODULE_PATH: &str = "framework/core/style.ts";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Deploy to {0} is not supported yet")]
    UnsupportedPlatform(Platform),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Fetch(#[from] CacheError),

    #[error("failed to parse exports of {filename}: {message}")]
    ExportParse { filename: String, message: String },

    #[error("module server answered {status} for {specifier}")]
    Module { specifier: String, status: u16 },

    #[error("bundling failed: {0}")]
    Bundle(String),
}

/// Result of one build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub client_modules: BTreeSet<String>,
    pub route_files: Vec<RouteFile>,
}

pub struct BuildPipeline {
    server: ModuleServer,
    parser: Arc<dyn ExportParser>,
    bundler: Arc<dyn Bundler>,
}

impl BuildPipeline {
    /// `server` must share the context whose graph the build snapshots. It
    /// is driven in process; it only needs to be listening if the bundler
    /// fetches from its origin.
    pub fn new(server: ModuleServer, parser: Arc<dyn ExportParser>, bundler: Arc<dyn Bundler>) -> Self {
        Self { server, parser, bundler }
    }

    pub async fn build(&self, entry: ServerEntry) -> Result<BuildOutput, BuildError> {
        let ctx = self.server.context();
        let config = ctx.config();
        if !config.build.platform.is_supported() {
            return Err(BuildError::UnsupportedPlatform(config.build.platform));
        }

        let out_dir = ctx.root().join(config.build.output_dir.trim_start_matches("./"));
        reset_dir(&out_dir).await?;

        let route_files = self.route_files(&config).await?;

        let mut inject = Vec::new();
        if let (true, Some(source)) = (entry.is_jsx(), &config.jsx.import_source) {
            let shim = out_dir.join(JSX_SHIM_FILE);
            tokio::fs::write(&shim, jsx_shim(config.jsx.runtime, source))
                .await
                .map_err(|source| BuildError::Io { path: shim.clone(), source })?;
            inject.push(shim);
        }

        let result = self.bundle_and_emit(&config, &entry, &route_files, &out_dir, &inject).await;

        for shim in &inject {
            if let Err(e) = tokio::fs::remove_file(shim).await {
                tracing::warn!(path = ?shim, error = %e, "Failed to remove JSX shim");
            }
        }
        self.bundler.stop().await;

        let client_modules = result?;
        metrics::record_client_modules(client_modules.len());
        tracing::info!(
            out_dir = ?out_dir,
            routes = route_files.len(),
            client_modules = client_modules.len(),
            "Build complete"
        );
        Ok(BuildOutput {
            client_modules,
            route_files,
        })
    }

    async fn route_files(&self, config: &AppConfig) -> Result<Vec<RouteFile>, BuildError> {
        let ctx = self.server.context();
        if config.routes.is_none() {
            return Ok(Vec::new());
        }
        ctx.refresh_routes().await?;

        let mut files = Vec::new();
        for route in &ctx.routes().routes {
            let filename = route.meta.filename.clone();
            let path = ctx.root().join(filename.trim_start_matches("./"));
            let code = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| BuildError::Io { path, source })?;
            let export_names = match self.parser.parse_export_names(&filename, &code) {
                Ok(names) => names,
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "Export parsing failed, registering without exports");
                    Vec::new()
                }
            };
            files.push(RouteFile {
                filename,
                export_names,
            });
        }
        Ok(files)
    }

    async fn bundle_and_emit(
        &self,
        config: &AppConfig,
        entry: &ServerEntry,
        route_files: &[RouteFile],
        out_dir: &Path,
        inject: &[PathBuf],
    ) -> Result<BTreeSet<String>, BuildError> {
        let ctx = self.server.context();
        let pipeline = ctx.pipeline();
        let modules_origin = ctx.modules_origin();

        let contents = synthesize_server_entry(route_files, entry, &config.framework_url, &modules_origin);
        let plugin = FrameworkPlugin::new(
            config.framework_url.clone(),
            config.ui_binding_url(),
            modules_origin,
            pipeline.import_map().clone(),
            pipeline.cache().clone(),
        );
        let request = BundleRequest {
            contents,
            source_file: "server.tsx".to_string(),
            outfile: out_dir.join(SERVER_BUNDLE_FILE),
            target: config.build.target,
            minify: !pipeline.is_dev(),
            jsx_factory: config.jsx.runtime.factory(),
            jsx_fragment: config.jsx.runtime.fragment(),
            inject: inject.to_vec(),
        };
        self.bundler.bundle(request, &plugin).await?;

        let graph = ctx.graph();
        write_snapshot(&graph, out_dir)
            .await
            .map_err(|source| BuildError::Io { path: out_dir.to_path_buf(), source })?;

        let mut seeds: Vec<String> = route_files.iter().map(|r| r.filename.clone()).collect();
        seeds.extend(self.html_entries().await?);
        seeds.push(format!("{}/{}", config.framework_url, STYLE_MODULE_PATH));

        collect_client_modules(self.server.router(), &graph, out_dir, seeds).await
    }

    /// Local script and style links of `index.html`, if there is one.
    async fn html_entries(&self) -> Result<Vec<String>, BuildError> {
        let path = self.server.context().root().join("index.html");
        let html = match tokio::fs::read_to_string(&path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(BuildError::Io { path, source }),
        };
        Ok(parse_html_links(&html)
            .into_iter()
            .filter(|link| !is_remote(link))
            .filter(|link| extension(link) == Some("css") || is_script(link))
            .map(|link| format!(".{}", clean_path(&link)))
            .collect())
    }
}

/// Empty `dir`, creating it if needed.
async fn reset_dir(dir: &Path) -> Result<(), BuildError> {
    let io = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => {
            while let Some(entry) = entries.next_entry().await.map_err(io)? {
                let path = entry.path();
                let result = if entry.file_type().await.map_err(io)?.is_dir() {
                    tokio::fs::remove_dir_all(&path).await
                } else {
                    tokio::fs::remove_file(&path).await
                };
                result.map_err(|source| BuildError::Io { path, source })?;
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => tokio::fs::create_dir_all(dir).await.map_err(io),
        Err(e) => Err(io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dist");
        reset_dir(&out).await.unwrap();
        assert!(out.is_dir());

        std::fs::create_dir_all(out.join("nested")).unwrap();
        std::fs::write(out.join("nested/a.js"), "").unwrap();
        std::fs::write(out.join("b.js"), "").unwrap();
        reset_dir(&out).await.unwrap();
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }
}
