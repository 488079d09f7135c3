//! Per-request module compilation.
//!
//! # Responsibilities
//! - Classify a request as style, script, custom-loader or static
//! - Read local source from disk and remote source through the content cache
//! - Drive the collaborators and write the result into the dependency graph
//!
//! # Design Decisions
//! - Every successful transform marks the graph entry, bumping its version
//! - Loader output goes through the same script path as native scripts
//! - Remote modules without a style extension are treated as scripts

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ContentCache;
use crate::config::{AtomicCssConfig, ImportMap};
use crate::graph::{DependencyGraph, MarkProps};
use crate::observability::metrics;
use crate::specifier::{
    extension, from_request_path, graph_key, is_remote, is_script, strip_query, to_local_path, url_path, SCRIPT_EXTS,
};
use crate::transform::collaborators::{
    AtomicOptions, AtomicStyleGenerator, ScriptOptions, SourceTransform, StyleBundler, StyleOptions, TransformError,
};
use crate::transform::imports::ImportRewriter;
use crate::transform::loader::{LoaderChain, LoaderEnv, ModuleLoader};
use crate::transform::style::PlainStyleBundler;

pub const JS_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
pub const CSS_CONTENT_TYPE: &str = "text/css; charset=utf-8";

/// Content type for loader output written in `lang`.
///
/// Script languages are served as JavaScript once transformed.
pub fn content_type_for_lang(lang: &str) -> &'static str {
    match lang {
        _ if SCRIPT_EXTS.contains(&lang) => JS_CONTENT_TYPE,
        "css" => CSS_CONTENT_TYPE,
        _ => mime_guess::from_ext(lang).first_raw().unwrap_or(JS_CONTENT_TYPE),
    }
}

/// A module request after URL decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Canonical specifier; remote ones keep their upstream query.
    pub specifier: String,
    /// `?module` was present: styles are wanted as a JS module.
    pub as_module: bool,
}

impl ModuleRequest {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            as_module: false,
        }
    }

    pub fn as_module(mut self) -> Self {
        self.as_module = true;
        self
    }

    /// Build a request from a server path and its raw query string.
    ///
    /// `module` and `v` are consumed here; any other query parameters of a
    /// remote module are forwarded upstream.
    pub fn parse(path: &str, query: Option<&str>) -> Self {
        let mut specifier = from_request_path(path);
        let mut as_module = false;
        let mut upstream: Vec<&str> = Vec::new();
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let key = pair.split_once('=').map(|(k, _)| k).unwrap_or(pair);
            match key {
                "module" => as_module = true,
                "v" => {}
                _ => upstream.push(pair),
            }
        }
        if is_remote(&specifier) && !upstream.is_empty() {
            specifier = format!("{}?{}", specifier, upstream.join("&"));
        }
        Self { specifier, as_module }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub content: String,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Style,
    Script,
    Custom,
    /// Not handled by the pipeline; served from disk as is.
    Static,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Style => "style",
            ModuleKind::Script => "script",
            ModuleKind::Custom => "custom",
            ModuleKind::Static => "static",
        }
    }
}

/// Compiles modules on demand and records them in the dependency graph.
pub struct TransformPipeline {
    root: PathBuf,
    is_dev: bool,
    import_map: Arc<ImportMap>,
    cache: Arc<dyn ContentCache>,
    source: Arc<dyn SourceTransform>,
    style: Arc<dyn StyleBundler>,
    atomic_css: Option<(AtomicCssConfig, Arc<dyn AtomicStyleGenerator>)>,
    loaders: LoaderChain,
}

impl TransformPipeline {
    /// Pipeline with the built-in collaborators.
    pub fn new(root: impl Into<PathBuf>, import_map: Arc<ImportMap>, cache: Arc<dyn ContentCache>) -> Self {
        let root = root.into();
        Self {
            style: Arc::new(PlainStyleBundler::new(root.clone())),
            root,
            is_dev: false,
            import_map,
            cache,
            source: Arc::new(ImportRewriter),
            atomic_css: None,
            loaders: LoaderChain::new(),
        }
    }

    pub fn dev(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    pub fn with_source_transform(mut self, source: Arc<dyn SourceTransform>) -> Self {
        self.source = source;
        self
    }

    pub fn with_style_bundler(mut self, style: Arc<dyn StyleBundler>) -> Self {
        self.style = style;
        self
    }

    pub fn with_atomic_css(mut self, config: AtomicCssConfig, generator: Arc<dyn AtomicStyleGenerator>) -> Self {
        self.atomic_css = Some((config, generator));
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub fn is_dev(&self) -> bool {
        self.is_dev
    }

    pub fn import_map(&self) -> &Arc<ImportMap> {
        &self.import_map
    }

    pub fn cache(&self) -> &Arc<dyn ContentCache> {
        &self.cache
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn classify(&self, specifier: &str) -> ModuleKind {
        let path = strip_query(specifier);
        if extension(path) == Some("css") {
            ModuleKind::Style
        } else if is_script(path) {
            ModuleKind::Script
        } else if self.loaders.find(&loader_pathname(specifier)).is_some() {
            ModuleKind::Custom
        } else if is_remote(specifier) {
            ModuleKind::Script
        } else {
            ModuleKind::Static
        }
    }

    /// Compile `request`, or `None` when it is a static file.
    pub async fn transform(
        &self,
        graph: &DependencyGraph,
        request: &ModuleRequest,
    ) -> Result<Option<TransformOutput>, TransformError> {
        let kind = self.classify(&request.specifier);
        let start = Instant::now();
        let result = match kind {
            ModuleKind::Static => return Ok(None),
            ModuleKind::Style => self.transform_style(graph, request).await,
            ModuleKind::Script => match self.read_source(&request.specifier).await {
                Ok(source) => self.transform_script(graph, &request.specifier, source, None, None).await,
                Err(e) => Err(e),
            },
            ModuleKind::Custom => self.transform_custom(graph, &request.specifier).await,
        };
        metrics::record_transform(kind.as_str(), result.is_ok(), start);
        if let Err(e) = &result {
            tracing::debug!(specifier = %request.specifier, kind = kind.as_str(), error = %e, "Transform failed");
        }
        result.map(Some)
    }

    async fn read_source(&self, specifier: &str) -> Result<String, TransformError> {
        if is_remote(specifier) {
            let content = self.cache.get(specifier).await?;
            return Ok(content.text().to_string());
        }
        let path = self.root.join(strip_query(specifier).trim_start_matches("./"));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| TransformError::Io {
                path: specifier.to_string(),
                source,
            })
    }

    async fn transform_style(
        &self,
        graph: &DependencyGraph,
        request: &ModuleRequest,
    ) -> Result<TransformOutput, TransformError> {
        let specifier = graph_key(&request.specifier);
        let source = self.read_source(specifier).await?;
        let options = StyleOptions {
            minify: !self.is_dev,
            scoped_class_names: strip_query(specifier).ends_with(".module.css"),
            ..Default::default()
        };
        let out = self.style.bundle(specifier, &source, &options).await?;
        graph.mark(specifier, MarkProps::deps(out.deps).with_inline_css(Some(out.code.clone())));

        if !request.as_module {
            return Ok(TransformOutput {
                content: out.code,
                content_type: CSS_CONTENT_TYPE,
            });
        }
        let exports = serde_json::to_string(&out.scoped_exports).map_err(|e| TransformError::Style {
            specifier: specifier.to_string(),
            message: e.to_string(),
        })?;
        Ok(TransformOutput {
            content: format!("export default {};", exports),
            content_type: JS_CONTENT_TYPE,
        })
    }

    async fn transform_custom(&self, graph: &DependencyGraph, specifier: &str) -> Result<TransformOutput, TransformError> {
        let pathname = loader_pathname(specifier);
        let Some(loader) = self.loaders.find(&pathname) else {
            return Err(TransformError::Loader {
                path: pathname,
                message: "no loader matches".to_string(),
            });
        };
        let env = LoaderEnv {
            is_dev: self.is_dev,
            import_map: self.import_map.clone(),
        };
        let out = loader.load(&pathname, &env).await?;
        self.transform_script(graph, specifier, out.code, out.lang.as_deref(), out.inline_css)
            .await
    }

    async fn transform_script(
        &self,
        graph: &DependencyGraph,
        specifier: &str,
        source: String,
        lang: Option<&str>,
        inline_css: Option<String>,
    ) -> Result<TransformOutput, TransformError> {
        let specifier = graph_key(specifier);
        let versions = graph.versions_except(specifier);
        let out = self
            .source
            .transform(
                specifier,
                &source,
                ScriptOptions {
                    is_dev: self.is_dev,
                    import_map: &self.import_map,
                    baseline_version: graph.initial_version(),
                    versions: &versions,
                },
            )
            .await?;

        let mut inline_css = inline_css;
        let is_jsx = matches!(lang.or(extension(specifier)), Some("jsx" | "tsx"));
        if let Some((config, generator)) = &self.atomic_css {
            if config.is_active() && is_jsx {
                let options = AtomicOptions {
                    id: specifier,
                    minify: !self.is_dev,
                };
                let css = generator.generate(config, &source, options).await?;
                if !css.is_empty() {
                    inline_css = Some(match inline_css {
                        Some(prev) => format!("{}\n{}", prev, css),
                        None => css,
                    });
                }
            }
        }

        graph.mark(specifier, MarkProps::deps(out.deps).with_inline_css(inline_css));
        Ok(TransformOutput {
            content: out.code,
            content_type: lang.map(content_type_for_lang).unwrap_or(JS_CONTENT_TYPE),
        })
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("root", &self.root)
            .field("is_dev", &self.is_dev)
            .field("loaders", &self.loaders)
            .field("atomic_css", &self.atomic_css.is_some())
            .finish()
    }
}

/// Pathname handed to loaders: the URL path the browser requested.
fn loader_pathname(specifier: &str) -> String {
    if is_remote(specifier) {
        to_local_path(specifier)
    } else {
        url_path(strip_query(specifier))
    }
}
