//! HTTP front of the transform pipeline.
//!
//! # Responsibilities
//! - Build the axum router with tracing and request-id layers
//! - Bind with port retry and publish the bound port
//! - Dispatch requests: hook, then pipeline, then static files
//! - Stop promptly when shutdown is signalled

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::net::{bind_with_retry, ListenerError};
use crate::server::context::ServerContext;
use crate::server::hook::ServerHook;
use crate::specifier::{is_remote, strip_query};
use crate::transform::ModuleRequest;

#[derive(Clone)]
struct AppState {
    ctx: Arc<ServerContext>,
    hook: ServerHook,
}

/// Serves compiled app modules over HTTP.
pub struct ModuleServer {
    ctx: Arc<ServerContext>,
    hook: ServerHook,
}

impl ModuleServer {
    pub fn new(ctx: Arc<ServerContext>, hook: ServerHook) -> Self {
        Self { ctx, hook }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// The request handler as a router, usable in process via `oneshot`.
    pub fn router(&self) -> Router {
        let state = AppState {
            ctx: self.ctx.clone(),
            hook: self.hook.clone(),
        };
        Router::new()
            .fallback(serve_module)
            .with_state(state)
            .layer(SetResponseHeaderLayer::if_not_present(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Bind the configured address, moving up while ports are taken.
    pub async fn listen(&self) -> Result<(TcpListener, u16), ListenerError> {
        let config = self.ctx.config();
        let (listener, port) =
            bind_with_retry(&config.module_server.hostname, config.module_server.port).await?;
        self.ctx.publish_port(port);
        Ok((listener, port))
    }

    /// Serve until the listener fails or `shutdown` fires.
    ///
    /// In-flight requests are dropped on shutdown.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        let graph = self.ctx.graph();
        tracing::info!(address = %addr, modules = graph.len(), "Module server listening");

        let serve = axum::serve(listener, self.router()).into_future();
        tokio::select! {
            res = serve => res?,
            _ = shutdown.recv() => {}
        }
        tracing::info!(address = %addr, "Module server stopped");
        Ok(())
    }
}

async fn serve_module(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, _body) = request.into_parts();
    if let Some(response) = state.hook.fetch(&parts, &state.ctx).await {
        return response;
    }

    let path = parts.uri.path();
    if path.split('/').any(|seg| seg == "..") {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    }
    let module = ModuleRequest::parse(path, parts.uri.query());
    let graph = state.ctx.graph();

    match state.ctx.pipeline().transform(&graph, &module).await {
        Ok(Some(out)) => ([(header::CONTENT_TYPE, out.content_type)], out.content).into_response(),
        Ok(None) => serve_static(&state.ctx, &module.specifier).await,
        Err(e) if e.is_not_found() => (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(e) => {
            tracing::error!(specifier = %module.specifier, error = %e, "Failed to serve module");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn serve_static(ctx: &ServerContext, specifier: &str) -> Response {
    if is_remote(specifier) {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }
    let rel = strip_query(specifier).trim_start_matches("./");
    let path = ctx.root().join(rel);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.essence_str().to_string())], bytes).into_response()
        }
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to read static file");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
