//! Fetching and caching network content.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// A fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub url: String,
    text: String,
    /// Lower-cased header names.
    headers: BTreeMap<String, String>,
}

impl CachedContent {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// Source of remote module text.
#[async_trait]
pub trait ContentCache: Send + Sync {
    async fn get(&self, url: &str) -> Result<CachedContent, CacheError>;
}

/// In-memory cache in front of a `reqwest` client.
#[derive(Clone, Default)]
pub struct HttpContentCache {
    client: reqwest::Client,
    entries: Arc<DashMap<String, CachedContent>>,
}

fn is_local_origin(url: &Url) -> bool {
    matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"))
}

impl HttpContentCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn fetch(&self, url: &Url) -> Result<CachedContent, CacheError> {
        let request_error = |source| CacheError::Request {
            url: url.to_string(),
            source,
        };
        let res = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(request_error)?;
        let status = res.status();
        if !status.is_success() {
            return Err(CacheError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let mut content = CachedContent::new(url.as_str(), "");
        for (name, value) in res.headers() {
            if let Ok(value) = value.to_str() {
                content = content.with_header(name.as_str(), value);
            }
        }
        content.text = res.text().await.map_err(request_error)?;
        Ok(content)
    }
}

#[async_trait]
impl ContentCache for HttpContentCache {
    async fn get(&self, url: &str) -> Result<CachedContent, CacheError> {
        if let Some(hit) = self.entries.get(url) {
            return Ok(hit.value().clone());
        }
        let parsed = Url::parse(url).map_err(|source| CacheError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let content = self.fetch(&parsed).await?;
        tracing::debug!(url = %url, bytes = content.text.len(), "Fetched remote content");
        if !is_local_origin(&parsed) {
            self.entries.insert(url.to_string(), content.clone());
        }
        Ok(content)
    }
}
