//! Client module closure walk.
//!
//! Breadth-first over the module server: every specifier of a level is
//! requested concurrently, written under the output directory, and its
//! recorded deps form the next level. Levels never overlap.

use axum::{
    body::Body,
    http::Request,
    Router,
};
use futures_util::future::try_join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tower::ServiceExt;

use crate::build::BuildError;
use crate::graph::DependencyGraph;
use crate::specifier::{encode_path, extension, graph_key, is_remote, strip_query, to_local_path, url_path};

/// Unencoded server path of a specifier, query included.
fn server_path(specifier: &str) -> String {
    if is_remote(specifier) {
        to_local_path(specifier)
    } else {
        url_path(specifier)
    }
}

/// Request URI of a specifier on the module server.
///
/// Local paths are percent-encoded; remote ones already are.
pub fn request_path(specifier: &str) -> String {
    if is_remote(specifier) {
        return to_local_path(specifier);
    }
    let path = url_path(specifier);
    match path.split_once('?') {
        Some((path, query)) => format!("{}?{}", encode_path(path), query),
        None => encode_path(&path),
    }
}

/// Where the compiled module is written, relative to the output directory.
///
/// Remote modules without a `.js` name and CSS requested as a module get a
/// `.js` suffix so the file type matches the content.
pub fn save_path(specifier: &str) -> PathBuf {
    let request = server_path(specifier);
    let (path, query) = request.split_once('?').unwrap_or((request.as_str(), ""));
    let mut rel = path.trim_start_matches('/').to_string();
    let as_module = query.split('&').any(|p| p == "module" || p.starts_with("module="));
    if is_remote(specifier) && !rel.ends_with(".js") {
        rel.push_str(".js");
    } else if extension(path) == Some("css") && as_module {
        rel.push_str(".js");
    }
    PathBuf::from(rel)
}

/// Deps of a compiled module as next-level specifiers.
fn next_specifiers(graph: &DependencyGraph, specifier: &str) -> Vec<String> {
    if extension(strip_query(specifier)) == Some("css") {
        return Vec::new();
    }
    let Some(record) = graph.get(graph_key(specifier)) else {
        return Vec::new();
    };
    record
        .deps
        .into_iter()
        .map(|dep| {
            if extension(&dep) == Some("css") {
                format!("{}?module", dep)
            } else {
                dep
            }
        })
        .collect()
}

async fn emit(
    router: Router,
    graph: &DependencyGraph,
    out_dir: &Path,
    specifier: &str,
) -> Result<Vec<String>, BuildError> {
    let uri = request_path(specifier);
    let request = Request::get(uri.as_str())
        .body(Body::empty())
        .map_err(|e| BuildError::Bundle(format!("invalid request for {}: {}", specifier, e)))?;
    let response = match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();
    if !status.is_success() {
        return Err(BuildError::Module {
            specifier: specifier.to_string(),
            status: status.as_u16(),
        });
    }
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| BuildError::Bundle(format!("failed to read {}: {}", specifier, e)))?;

    let path = out_dir.join(save_path(specifier));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BuildError::Io { path: parent.to_path_buf(), source })?;
    }
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|source| BuildError::Io { path: path.clone(), source })?;

    Ok(next_specifiers(graph, specifier))
}

/// Walk and emit every module reachable from `seeds`.
pub async fn collect_client_modules(
    router: Router,
    graph: &DependencyGraph,
    out_dir: &Path,
    seeds: Vec<String>,
) -> Result<BTreeSet<String>, BuildError> {
    let mut done: BTreeSet<String> = BTreeSet::new();
    let mut level: BTreeSet<String> = seeds.into_iter().collect();
    let mut depth = 0usize;

    while !level.is_empty() {
        let results = try_join_all(
            level
                .iter()
                .map(|specifier| emit(router.clone(), graph, out_dir, specifier)),
        )
        .await?;
        done.extend(level.iter().cloned());

        level = results
            .into_iter()
            .flatten()
            .filter(|s| !done.contains(s))
            .collect();
        depth += 1;
        tracing::debug!(depth, emitted = done.len(), next = level.len(), "Closure level done");
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_path() {
        assert_eq!(save_path("./routes/index.tsx"), PathBuf::from("routes/index.tsx"));
        assert_eq!(save_path("./style/app.css?module"), PathBuf::from("style/app.css.js"));
        assert_eq!(save_path("./style/app.css"), PathBuf::from("style/app.css"));
        assert_eq!(save_path("https://esm.sh/react@18"), PathBuf::from("-/esm.sh/react@18.js"));
        assert_eq!(
            save_path("https://deno.land/x/routekit@0.1.0/framework/core/style.ts"),
            PathBuf::from("-/deno.land/x/routekit@0.1.0/framework/core/style.ts.js")
        );
        assert_eq!(save_path("https://esm.sh/a.js"), PathBuf::from("-/esm.sh/a.js"));
    }

    #[test]
    fn test_request_path_encodes_local_names() {
        assert_eq!(request_path("./routes/about us.tsx"), "/routes/about%20us.tsx");
        assert_eq!(request_path("./style/café.css?module"), "/style/caf%C3%A9.css?module");
        assert_eq!(request_path("https://esm.sh/react@18?dev"), "/-/esm.sh/react@18?dev");
        assert_eq!(save_path("./routes/about us.tsx"), PathBuf::from("routes/about us.tsx"));
        assert_eq!(save_path("./style/café.css?module"), PathBuf::from("style/café.css.js"));
    }

    #[test]
    fn test_next_specifiers() {
        let graph = DependencyGraph::new();
        graph.mark(
            "./a.tsx",
            crate::graph::MarkProps::deps(vec!["./b.ts".into(), "./c.css".into()]),
        );
        graph.mark("./c.css", crate::graph::MarkProps::deps(vec!["./d.css".into()]));
        assert_eq!(next_specifiers(&graph, "./a.tsx"), vec!["./b.ts", "./c.css?module"]);
        assert!(next_specifiers(&graph, "./c.css?module").is_empty());
        assert!(next_specifiers(&graph, "./unknown.ts").is_empty());
    }
}
