//! Route table construction and lookup.
//!
//! # Responsibilities
//! - Enumerate files under the routing prefix and compile each match
//! - Identify the magic routes (`/_app`, `/_404`, `/_error`)
//! - Order routes by a specificity heuristic
//! - Flag nesting (layout) routes
//! - Look up the first matching route for a request
//!
//! # Design Decisions
//! - Ordering key: magic routes 0, otherwise filename segment count plus
//!   0.01 per parameter segment; ties keep enumeration order
//! - Nesting is recomputed from the whole set every time it is built
//! - Immutable once built; the server context swaps whole tables

use serde::Serialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::routing::matcher::{PatternMatch, UrlPattern};
use crate::routing::regexp::{RouteError, RoutePattern, RouteRegExp, RoutesConfig};

pub const APP_PATHNAME: &str = "/_app";
pub const NOT_FOUND_PATHNAME: &str = "/_404";
pub const ERROR_PATHNAME: &str = "/_error";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMeta {
    pub filename: String,
    pub pattern: RoutePattern,
    /// Renders as a layout around child routes.
    pub nesting: bool,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: UrlPattern,
    pub meta: RouteMeta,
}

impl Route {
    pub fn new(filename: String, pattern: RoutePattern) -> Self {
        Self {
            pattern: UrlPattern::new(&pattern),
            meta: RouteMeta {
                filename,
                pattern,
                nesting: false,
            },
        }
    }

    pub fn pathname(&self) -> &str {
        &self.meta.pattern.pathname
    }

    pub fn is_magic(&self) -> bool {
        matches!(self.pathname(), APP_PATHNAME | NOT_FOUND_PATHNAME | ERROR_PATHNAME)
    }

    /// Sort key; lower sorts first.
    pub fn order(&self) -> f64 {
        if self.is_magic() {
            return 0.0;
        }
        let depth = self.meta.filename.split('/').count() as f64;
        let params = self.pathname().matches("/:").count() as f64;
        depth + params * 0.01
    }
}

/// The ordered route table plus the magic route slots.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    pub routes: Vec<Route>,
    pub app: Option<Route>,
    pub not_found: Option<Route>,
    pub error: Option<Route>,
}

impl Routes {
    /// Build a table from candidate filenames (`./routes/...`).
    pub fn from_files<I>(reg: &RouteRegExp, files: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut routes: Vec<Route> = files
            .into_iter()
            .filter_map(|filename| {
                let pattern = reg.exec(&filename)?;
                Some(Route::new(filename, pattern))
            })
            .collect();

        routes.sort_by(|a, b| a.order().total_cmp(&b.order()));
        mark_nesting(&mut routes);

        let slot = |pathname: &str| routes.iter().find(|r| r.pathname() == pathname).cloned();
        Self {
            app: slot(APP_PATHNAME),
            not_found: slot(NOT_FOUND_PATHNAME),
            error: slot(ERROR_PATHNAME),
            routes,
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn contains_file(&self, filename: &str) -> bool {
        self.routes.iter().any(|r| r.meta.filename == filename)
    }

    /// First non-magic route matching the request.
    pub fn match_route(&self, host: Option<&str>, pathname: &str) -> Option<(&Route, PatternMatch)> {
        self.routes
            .iter()
            .filter(|r| !r.is_magic())
            .find_map(|r| r.pattern.exec(host, pathname).map(|m| (r, m)))
    }
}

fn mark_nesting(routes: &mut [Route]) {
    let pathnames: Vec<String> = routes.iter().map(|r| r.pathname().to_string()).collect();
    for route in routes.iter_mut() {
        let pathname = route.meta.pattern.pathname.as_str();
        let child_prefix = format!("{pathname}/");
        route.meta.nesting = pathname == APP_PATHNAME
            || (pathname != "/"
                && !pathname.ends_with("/index")
                && pathnames.iter().any(|p| p != pathname && p.starts_with(&child_prefix)));
    }
}

/// Enumerate route files under `root` and build the table.
pub fn init_routes(config: &RoutesConfig, root: &Path) -> Result<Routes, RouteError> {
    let reg = RouteRegExp::compile(config)?;
    scan_routes(&reg, root)
}

pub fn scan_routes(reg: &RouteRegExp, root: &Path) -> Result<Routes, RouteError> {
    let dir = root.join(reg.prefix().trim_start_matches("./"));
    if !dir.is_dir() {
        tracing::warn!(dir = ?dir, "Route directory does not exist");
        return Ok(Routes::default());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(format!("./{}", rel.join("/")));
    }

    let routes = Routes::from_files(reg, files);
    tracing::debug!(prefix = %reg.prefix(), count = routes.len(), "Routes initialized");
    Ok(routes)
}
