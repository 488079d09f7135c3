//! Loading compiled modules by version.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use crate::cache::CacheError;
use crate::graph::Version;
use crate::specifier::{encode_path, is_remote, to_local_path, url_path};

/// Produces the compiled code of a module at a given version.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(&self, specifier: &str, version: Version) -> Result<String, CacheError>;
}

/// Fetches modules from the running module server, cache-busted by version.
#[derive(Debug, Clone)]
pub struct HttpModuleResolver {
    client: reqwest::Client,
    port: Arc<AtomicU16>,
}

impl HttpModuleResolver {
    /// `port` is shared with the server context and read per call, so a
    /// retried port is picked up once published.
    pub fn new(client: reqwest::Client, port: Arc<AtomicU16>) -> Self {
        Self { client, port }
    }

    pub fn url_for(&self, specifier: &str, version: Version) -> String {
        let port = self.port.load(Ordering::SeqCst);
        let path = if is_remote(specifier) {
            to_local_path(specifier)
        } else {
            encode_path(&url_path(specifier))
        };
        let sep = if path.contains('?') { '&' } else { '?' };
        format!("http://127.0.0.1:{}{}{}v={}", port, path, sep, version.token())
    }
}

#[async_trait]
impl ModuleResolver for HttpModuleResolver {
    async fn resolve(&self, specifier: &str, version: Version) -> Result<String, CacheError> {
        let url = self.url_for(specifier, version);
        let request_error = |source| CacheError::Request {
            url: url.clone(),
            source,
        };
        let res = self.client.get(&url).send().await.map_err(request_error)?;
        if !res.status().is_success() {
            return Err(CacheError::Status {
                url: url.clone(),
                status: res.status().as_u16(),
            });
        }
        let code = res.text().await.map_err(request_error)?;
        tracing::debug!(specifier, remote = is_remote(specifier), bytes = code.len(), "Module resolved");
        Ok(code)
    }
}
