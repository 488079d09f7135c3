//! Bundler contract and the framework's resolve/load policy.
//!
//! # Responsibilities
//! - Describe what a bundler is asked to do (`BundleRequest`)
//! - Decide per import whether to keep it external or inline it
//! - Load inlined remote modules through the content cache and pick a loader
//!
//! # Design Decisions
//! - Dynamic imports always stay external
//! - Remote imports stay external unless they are framework runtime, the
//!   active UI binding or served by the in-process module server
//! - Extension wins over content type when choosing a loader

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::build::BuildError;
use crate::cache::ContentCache;
use crate::config::{BuildTarget, ImportMap};
use crate::graph::SNAPSHOT_FILE;
use crate::specifier::{extension, is_remote, SCRIPT_EXTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Entry,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    File,
    Http,
}

#[derive(Debug, Clone)]
pub struct ResolveArgs {
    pub path: String,
    /// Resolved path of the importing module.
    pub importer: Option<String>,
    /// Namespace of the importing module.
    pub namespace: Namespace,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    External(String),
    Resolved { path: String, namespace: Namespace },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Js,
    Ts,
    Jsx,
    Tsx,
}

impl Loader {
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            "js" => Some(Loader::Js),
            "ts" => Some(Loader::Ts),
            "jsx" => Some(Loader::Jsx),
            "tsx" => Some(Loader::Tsx),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("application/javascript") {
            Some(Loader::Js)
        } else if content_type.starts_with("application/typescript") {
            Some(Loader::Ts)
        } else if content_type.starts_with("text/jsx") {
            Some(Loader::Jsx)
        } else if content_type.starts_with("text/tsx") {
            Some(Loader::Tsx)
        } else {
            None
        }
    }
}

/// Pick the loader for a fetched module.
pub fn sniff_loader(path: &str, content_type: Option<&str>) -> Loader {
    let ext = match extension(path) {
        Some("mjs") => Some("js"),
        Some("mts") => Some("ts"),
        other => other,
    };
    ext.filter(|e| SCRIPT_EXTS.contains(e))
        .and_then(Loader::from_ext)
        .or_else(|| content_type.and_then(Loader::from_content_type))
        .unwrap_or(Loader::Js)
}

#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub contents: String,
    pub loader: Loader,
}

/// Hooks a bundler calls for every import it meets.
#[async_trait]
pub trait BundlePlugin: Send + Sync {
    fn on_resolve(&self, args: &ResolveArgs) -> ResolveResult;

    /// `None` leaves loading to the bundler.
    async fn on_load(&self, args: &LoadArgs) -> Result<Option<LoadResult>, BuildError>;
}

/// What to bundle and where.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// In-memory entry program.
    pub contents: String,
    /// Name the entry is reported under.
    pub source_file: String,
    pub outfile: PathBuf,
    pub target: BuildTarget,
    pub minify: bool,
    pub jsx_factory: &'static str,
    pub jsx_fragment: &'static str,
    /// Files whose exports are made available to every module.
    pub inject: Vec<PathBuf>,
}

#[async_trait]
pub trait Bundler: Send + Sync {
    async fn bundle(&self, request: BundleRequest, plugin: &dyn BundlePlugin) -> Result<(), BuildError>;

    /// Release worker resources. Called once per build, on success or failure.
    async fn stop(&self);
}

/// Resolve/load policy of the framework's server bundle.
pub struct FrameworkPlugin {
    framework_url: String,
    ui_binding_url: String,
    modules_origin: String,
    import_map: Arc<ImportMap>,
    cache: Arc<dyn ContentCache>,
}

impl FrameworkPlugin {
    pub fn new(
        framework_url: impl Into<String>,
        ui_binding_url: impl Into<String>,
        modules_origin: impl Into<String>,
        import_map: Arc<ImportMap>,
        cache: Arc<dyn ContentCache>,
    ) -> Self {
        Self {
            framework_url: framework_url.into(),
            ui_binding_url: ui_binding_url.into(),
            modules_origin: modules_origin.into(),
            import_map,
            cache,
        }
    }

    /// Remote URLs that are inlined rather than left external.
    pub fn must_inline(&self, url: &str) -> bool {
        url == format!("{}/server/mod.ts", self.framework_url)
            || url == format!("{}/server/transformer.ts", self.framework_url)
            || url.starts_with(&self.ui_binding_url)
            || url.starts_with(&format!("{}/", self.modules_origin))
    }

    /// The transformer is swapped for the dist server in production bundles.
    fn load_url(&self, url: &str) -> String {
        let transformer = format!("{}/server/transformer.ts", self.framework_url);
        if url == transformer {
            format!("{}/server/serve_dist.ts", self.framework_url)
        } else {
            url.to_string()
        }
    }
}

#[async_trait]
impl BundlePlugin for FrameworkPlugin {
    fn on_resolve(&self, args: &ResolveArgs) -> ResolveResult {
        let mapped = self
            .import_map
            .resolve(&args.path, args.importer.as_deref())
            .unwrap_or_else(|| args.path.clone());
        let remote = is_remote(&mapped);
        let mapped = if remote {
            mapped
        } else {
            mapped.trim_start_matches("file://").to_string()
        };
        let path = mapped.split('#').next().unwrap_or_default().to_string();

        if args.kind == ImportKind::Dynamic {
            return ResolveResult::External(path);
        }

        if args.namespace == Namespace::Http {
            let href = args
                .importer
                .as_deref()
                .and_then(|importer| Url::parse(importer).ok())
                .and_then(|base| base.join(&path).ok())
                .map(String::from)
                .unwrap_or(path);
            if !self.must_inline(&href) {
                return ResolveResult::External(href);
            }
            return ResolveResult::Resolved {
                path: href,
                namespace: Namespace::Http,
            };
        }

        if remote && self.must_inline(&path) {
            return ResolveResult::Resolved {
                path,
                namespace: Namespace::Http,
            };
        }
        if remote || path == format!("./{}", SNAPSHOT_FILE) {
            return ResolveResult::External(path);
        }
        ResolveResult::Resolved {
            path,
            namespace: Namespace::File,
        }
    }

    async fn on_load(&self, args: &LoadArgs) -> Result<Option<LoadResult>, BuildError> {
        if args.namespace != Namespace::Http {
            return Ok(None);
        }
        let url = self.load_url(&args.path);
        let content = self.cache.get(&url).await?;
        let path = Url::parse(&url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.clone());
        Ok(Some(LoadResult {
            contents: content.text().to_string(),
            loader: sniff_loader(&path, content.content_type()),
        }))
    }
}
