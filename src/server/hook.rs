//! Optional request hook consulted before the module pipeline.

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::Response;
use std::sync::Arc;

use crate::server::context::ServerContext;

/// A user-supplied handler. Returning `None` passes the request on.
#[async_trait]
pub trait FetchHandler: Send + Sync {
    async fn fetch(&self, parts: &Parts, ctx: &ServerContext) -> Option<Response>;
}

#[derive(Clone, Default)]
pub enum ServerHook {
    Custom(Arc<dyn FetchHandler>),
    #[default]
    Default,
}

impl ServerHook {
    pub fn custom(handler: impl FetchHandler + 'static) -> Self {
        ServerHook::Custom(Arc::new(handler))
    }

    pub(crate) async fn fetch(&self, parts: &Parts, ctx: &ServerContext) -> Option<Response> {
        match self {
            ServerHook::Custom(handler) => handler.fetch(parts, ctx).await,
            ServerHook::Default => None,
        }
    }
}

impl std::fmt::Debug for ServerHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerHook::Custom(_) => f.write_str("ServerHook::Custom"),
            ServerHook::Default => f.write_str("ServerHook::Default"),
        }
    }
}
