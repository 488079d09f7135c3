//! Compiling a routing configuration into a file matcher.
//!
//! # Responsibilities
//! - Accept either a structured `{dir, exts, host}` descriptor or a glob
//! - Compute the wildcard-free prefix used to scope file enumeration
//! - Test filenames and turn them into `{host?, pathname}` patterns
//!
//! # Design Decisions
//! - Both config shapes compile to the same `RouteRegExp`
//! - `exec` is pure: same filename and config always give the same pattern
//! - Filename conventions: `[...name]` catch-all, `[name]` and `$name`
//!   parameters, `@host` first segment when host-aware

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::specifier::{clean_path, trim_extension};

/// Where route files live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RoutesConfig {
    /// Glob such as `./routes/**/*.tsx`.
    Glob(String),
    Dir(RouteDirConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDirConfig {
    pub dir: String,
    /// Accepted extensions, with or without the leading dot.
    pub exts: Vec<String>,
    /// Treat a leading `@name` directory as the host.
    #[serde(default)]
    pub host: bool,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to enumerate route files: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("route enumeration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The URL pattern a route file compiles to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub pathname: String,
}

#[derive(Debug, Clone)]
enum FileRule {
    Extensions(Vec<String>),
    Glob(GlobMatcher),
}

/// Matcher and extractor compiled from a [`RoutesConfig`].
#[derive(Debug, Clone)]
pub struct RouteRegExp {
    prefix: String,
    rule: FileRule,
    host: bool,
}

impl RouteRegExp {
    pub fn compile(config: &RoutesConfig) -> Result<Self, RouteError> {
        match config {
            RoutesConfig::Dir(dir) => Ok(Self {
                prefix: format!(".{}", clean_path(&dir.dir)),
                rule: FileRule::Extensions(dir.exts.clone()),
                host: dir.host,
            }),
            RoutesConfig::Glob(glob) => {
                let head = glob.split('*').next().unwrap_or_default();
                let pattern = format!(
                    "./{}",
                    glob.trim_start_matches('/').trim_start_matches("./")
                );
                let matcher = GlobBuilder::new(&pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| RouteError::Glob {
                        pattern: pattern.clone(),
                        source,
                    })?
                    .compile_matcher();
                Ok(Self {
                    prefix: format!(".{}", clean_path(head)),
                    rule: FileRule::Glob(matcher),
                    host: false,
                })
            }
        }
    }

    /// Longest wildcard-free leading path, e.g. `./routes`.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn within_prefix(&self, filename: &str) -> bool {
        match filename.strip_prefix(self.prefix.as_str()) {
            Some(rest) => self.prefix.ends_with('/') || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn test(&self, filename: &str) -> bool {
        match &self.rule {
            FileRule::Extensions(exts) => {
                self.within_prefix(filename)
                    && exts.iter().any(|ext| {
                        if ext.starts_with('.') {
                            filename.ends_with(ext.as_str())
                        } else {
                            filename.ends_with(&format!(".{ext}"))
                        }
                    })
            }
            FileRule::Glob(matcher) => matcher.is_match(filename),
        }
    }

    /// Compile a filename into its route pattern; `None` if `test` fails.
    pub fn exec(&self, filename: &str) -> Option<RoutePattern> {
        if !self.test(filename) {
            return None;
        }
        let rest = filename.strip_prefix(self.prefix.as_str()).unwrap_or(filename);
        let mut parts: Vec<String> = rest
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .map(segment_to_pattern)
            .collect();

        let mut host = None;
        if self.host && parts.len() > 1 && parts[0].starts_with('@') {
            host = Some(parts.remove(0)[1..].to_string());
        }

        let basename = parts.pop()?;
        parts.push(trim_extension(&basename).to_string());
        if parts.last().is_some_and(|p| p == "index") {
            parts.pop();
        }

        Some(RoutePattern {
            host,
            pathname: format!("/{}", parts.join("/")),
        })
    }
}

fn segment_to_pattern(part: &str) -> String {
    // `[...path]` → `:path+`
    if part.starts_with("[...") && part.contains(']') && part.len() > 5 {
        return format!(":{}", part[4..].replacen(']', "+", 1));
    }
    // `[id]` → `:id`
    if part.starts_with('[') && part.contains(']') && part.len() > 2 {
        return format!(":{}", part[1..].replacen(']', "", 1));
    }
    // `$id` → `:id`
    if part.starts_with('$') && part.len() > 1 {
        return format!(":{}", &part[1..]);
    }
    part.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(exts: &[&str], host: bool) -> RouteRegExp {
        RouteRegExp::compile(&RoutesConfig::Dir(RouteDirConfig {
            dir: "./routes".into(),
            exts: exts.iter().map(|s| s.to_string()).collect(),
            host,
        }))
        .unwrap()
    }

    fn pathname(reg: &RouteRegExp, filename: &str) -> String {
        reg.exec(filename).unwrap().pathname
    }

    #[test]
    fn test_dir_config() {
        let reg = dir(&["tsx"], false);
        assert_eq!(reg.prefix(), "./routes");
        assert!(reg.test("./routes/index.tsx"));
        assert!(!reg.test("./routes/index.ts"));
        assert!(!reg.test("./lib/index.tsx"));
        assert!(!reg.test("./routesx/index.tsx"));
        assert!(reg.exec("./lib/a.tsx").is_none());

        let dotted = dir(&[".tsx", "jsx"], false);
        assert!(dotted.test("./routes/a.tsx"));
        assert!(dotted.test("./routes/a.jsx"));
    }

    #[test]
    fn test_exec_patterns() {
        let reg = dir(&["tsx"], false);
        assert_eq!(pathname(&reg, "./routes/blog/[id].tsx"), "/blog/:id");
        assert_eq!(pathname(&reg, "./routes/docs/[...path].tsx"), "/docs/:path+");
        assert_eq!(pathname(&reg, "./routes/users/$name.tsx"), "/users/:name");
        assert_eq!(pathname(&reg, "./routes/index.tsx"), "/");
        assert_eq!(pathname(&reg, "./routes/foo/index.tsx"), "/foo");
        assert_eq!(pathname(&reg, "./routes/_app.tsx"), "/_app");
        assert_eq!(reg.exec("./routes/@admin/users.tsx").unwrap().host, None);
    }

    #[test]
    fn test_exec_host() {
        let reg = dir(&["tsx"], true);
        let pattern = reg.exec("./routes/@admin/users.tsx").unwrap();
        assert_eq!(pattern.host.as_deref(), Some("admin"));
        assert_eq!(pattern.pathname, "/users");

        // A lone `@name` file is a path, not a host.
        let pattern = reg.exec("./routes/@about.tsx").unwrap();
        assert_eq!(pattern.host, None);
        assert_eq!(pattern.pathname, "/@about");
    }

    #[test]
    fn test_glob_config() {
        let reg = RouteRegExp::compile(&RoutesConfig::Glob("./routes/**/*.tsx".into())).unwrap();
        assert_eq!(reg.prefix(), "./routes");
        assert!(reg.test("./routes/index.tsx"));
        assert!(reg.test("./routes/blog/[id].tsx"));
        assert!(!reg.test("./routes/blog/[id].ts"));
        assert!(!reg.test("./lib/index.tsx"));
        assert_eq!(pathname(&reg, "./routes/blog/[id].tsx"), "/blog/:id");

        let stripped = RouteRegExp::compile(&RoutesConfig::Glob("/routes/*.tsx".into())).unwrap();
        assert!(stripped.test("./routes/about.tsx"));
        assert!(!stripped.test("./routes/blog/about.tsx"));
    }

    #[test]
    fn test_exec_is_deterministic() {
        let reg = dir(&["tsx"], true);
        let a = reg.exec("./routes/@a/x/[id].tsx");
        let b = reg.exec("./routes/@a/x/[id].tsx");
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_shapes_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            routes: RoutesConfig,
        }
        let glob: Wrapper = toml::from_str(r#"routes = "./routes/**/*.tsx""#).unwrap();
        assert!(matches!(glob.routes, RoutesConfig::Glob(_)));
        let structured: Wrapper =
            toml::from_str("[routes]\ndir = \"./routes\"\nexts = [\"tsx\"]\nhost = true\n").unwrap();
        assert!(matches!(structured.routes, RoutesConfig::Dir(RouteDirConfig { host: true, .. })));
    }
}
