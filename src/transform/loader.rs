//! Custom module loaders.
//!
//! A loader turns a file the built-in paths do not recognize (`.vue`,
//! `.svelte`, `.md`, ...) into script source. Its output is fed back through
//! the script transform, so imports are rewritten and tracked as usual.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ImportMap;
use crate::transform::collaborators::TransformError;

/// Environment handed to every loader call.
#[derive(Debug, Clone)]
pub struct LoaderEnv {
    pub is_dev: bool,
    pub import_map: Arc<ImportMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderOutput {
    pub code: String,
    /// Source language of `code` (`js`, `ts`, `jsx`, `tsx`).
    pub lang: Option<String>,
    /// Style extracted by the loader; atomic CSS is appended to it.
    pub inline_css: Option<String>,
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    /// Whether this loader handles the request pathname.
    fn test(&self, pathname: &str) -> bool;

    async fn load(&self, pathname: &str, env: &LoaderEnv) -> Result<LoaderOutput, TransformError>;
}

/// Ordered loaders; the first whose predicate matches wins.
#[derive(Clone, Default)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn ModuleLoader>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loader: Arc<dyn ModuleLoader>) {
        self.loaders.push(loader);
    }

    pub fn find(&self, pathname: &str) -> Option<&Arc<dyn ModuleLoader>> {
        self.loaders.iter().find(|l| l.test(pathname))
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl std::fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderChain").field("loaders", &self.loaders.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Suffix(&'static str, &'static str);

    #[async_trait]
    impl ModuleLoader for Suffix {
        fn test(&self, pathname: &str) -> bool {
            pathname.ends_with(self.0)
        }

        async fn load(&self, _pathname: &str, _env: &LoaderEnv) -> Result<LoaderOutput, TransformError> {
            Ok(LoaderOutput {
                code: self.1.to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let mut chain = LoaderChain::new();
        chain.push(Arc::new(Suffix(".vue", "first")));
        chain.push(Arc::new(Suffix(".vue", "second")));
        chain.push(Arc::new(Suffix(".md", "markdown")));

        let env = LoaderEnv {
            is_dev: true,
            import_map: Arc::default(),
        };
        let loader = chain.find("/app.vue").unwrap();
        assert_eq!(loader.load("/app.vue", &env).await.unwrap().code, "first");
        assert!(chain.find("/a.svelte").is_none());
        assert_eq!(chain.len(), 3);
    }
}
