//! Default style bundler.
//!
//! # Responsibilities
//! - Inline local `@import` rules, recording each imported file as a dep
//! - Rename class selectors in scoped mode and export the mapping
//! - Strip comments and collapse whitespace when minifying
//!
//! # Design Decisions
//! - Remote `@import`s stay in place and are left to the browser
//! - Only selector preludes are rewritten; declarations are never touched
//! - Browser targets are accepted but no syntax lowering is done

use async_trait::async_trait;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::specifier::{clean_path, is_remote, strip_query, url_path};
use crate::transform::collaborators::{StyleBundler, StyleOptions, StyleOutput, TransformError};

fn import_rule_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"@import\s+(?:url\(\s*)?["']?(?P<href>[^"')\s;]+)["']?\s*\)?[^;]*;"#)
            .expect("import rule pattern is valid")
    })
}

fn class_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(?P<name>-?[_a-zA-Z][_a-zA-Z0-9-]*)").expect("class pattern is valid"))
}

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment pattern is valid"))
}

/// Prefix used for scoped class names: `./ui/button.module.css` → `button`.
pub fn scope_name(specifier: &str) -> String {
    let path = strip_query(specifier);
    let base = path.rsplit('/').next().unwrap_or(path);
    let stem = base
        .strip_suffix(".module.css")
        .or_else(|| base.strip_suffix(".css"))
        .unwrap_or(base);
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// Style bundler reading `@import`ed files from the app root.
#[derive(Debug, Clone)]
pub struct PlainStyleBundler {
    root: PathBuf,
}

impl PlainStyleBundler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn inline_imports(
        &self,
        specifier: &str,
        source: &str,
        seen: &mut HashSet<String>,
        deps: &mut Vec<String>,
    ) -> Result<String, TransformError> {
        let mut failure = None;
        let out = import_rule_regex().replace_all(source, |caps: &Captures<'_>| {
            let href = &caps["href"];
            if failure.is_some() || is_remote(href) || is_remote(specifier) {
                return caps[0].to_string();
            }
            let dep = resolve_style_import(specifier, href);
            if !deps.contains(&dep) {
                deps.push(dep.clone());
            }
            if !seen.insert(dep.clone()) {
                return String::new();
            }
            let path = self.root.join(dep.trim_start_matches("./"));
            let nested = std::fs::read_to_string(&path)
                .map_err(|source| TransformError::Io { path: dep.clone(), source })
                .and_then(|text| self.inline_imports(&dep, &text, seen, deps));
            match nested {
                Ok(text) => text,
                Err(e) => {
                    failure = Some(e);
                    String::new()
                }
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(out.into_owned()),
        }
    }

    fn bundle_blocking(&self, specifier: &str, source: &str, options: &StyleOptions) -> Result<StyleOutput, TransformError> {
        let mut seen = HashSet::from([strip_query(specifier).to_string()]);
        let mut deps = Vec::new();
        let mut code = self.inline_imports(specifier, source, &mut seen, &mut deps)?;

        let mut scoped_exports = BTreeMap::new();
        if options.scoped_class_names {
            code = scope_classes(&code, &scope_name(specifier), &mut scoped_exports);
        }
        if options.minify {
            code = minify(&code);
        }
        Ok(StyleOutput {
            code,
            scoped_exports,
            deps,
        })
    }
}

#[async_trait]
impl StyleBundler for PlainStyleBundler {
    async fn bundle(
        &self,
        specifier: &str,
        source: &str,
        options: &StyleOptions,
    ) -> Result<StyleOutput, TransformError> {
        let this = self.clone();
        let (specifier, source, options) = (specifier.to_string(), source.to_string(), *options);
        let spec = specifier.clone();
        tokio::task::spawn_blocking(move || this.bundle_blocking(&specifier, &source, &options))
            .await
            .map_err(|e| TransformError::Style {
                specifier: spec,
                message: e.to_string(),
            })?
    }
}

fn resolve_style_import(importer: &str, href: &str) -> String {
    if href.starts_with('/') {
        return format!(".{}", clean_path(href));
    }
    let dir = url_path(strip_query(importer));
    let dir = dir.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    format!(".{}", clean_path(&format!("{}/{}", dir, href)))
}

/// Rewrite `.class` selectors outside declaration blocks.
fn scope_classes(css: &str, scope: &str, exports: &mut BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(css.len());
    let mut segment = String::new();
    for c in css.chars() {
        match c {
            '{' => {
                if segment.trim_start().starts_with('@') {
                    out.push_str(&segment);
                } else {
                    let renamed = class_regex().replace_all(&segment, |caps: &Captures<'_>| {
                        let name = &caps["name"];
                        let scoped = format!("{}_{}", scope, name);
                        exports.insert(name.to_string(), scoped.clone());
                        format!(".{}", scoped)
                    });
                    out.push_str(&renamed);
                }
                out.push(c);
                segment.clear();
            }
            '}' | ';' => {
                out.push_str(&segment);
                out.push(c);
                segment.clear();
            }
            _ => segment.push(c),
        }
    }
    out.push_str(&segment);
    out
}

fn minify(css: &str) -> String {
    let stripped = comment_regex().replace_all(css, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ' ' {
            let prev = out.chars().last();
            let next = chars.peek().copied();
            let tight = |ch: Option<char>| matches!(ch, Some('{' | '}' | ';' | ',' | '>'));
            if tight(prev) || tight(next) {
                continue;
            }
        }
        out.push(c);
    }
    out.replace(";}", "}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_name() {
        assert_eq!(scope_name("./ui/button.module.css"), "button");
        assert_eq!(scope_name("./app.css?module"), "app");
    }

    #[test]
    fn test_scope_classes() {
        let mut exports = BTreeMap::new();
        let css = ".title, .sub > a { width: 1.5em; }\n@media (min-width: 2.5em) { .title { color: red; } }";
        let out = scope_classes(css, "card", &mut exports);
        assert!(out.contains(".card_title, .card_sub > a"));
        assert!(out.contains("width: 1.5em"));
        assert!(out.contains("@media (min-width: 2.5em)"));
        assert_eq!(exports["title"], "card_title");
        assert_eq!(exports.len(), 2);
    }

    #[test]
    fn test_minify() {
        assert_eq!(minify("/* x */\n.a ,\n.b {\n  color: red;\n}\n"), ".a,.b{color: red}");
    }

    #[tokio::test]
    async fn test_bundle_inlines_imports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("styles")).unwrap();
        std::fs::write(dir.path().join("styles/base.css"), "@import \"./reset.css\";\nbody{margin:0}").unwrap();
        std::fs::write(dir.path().join("styles/reset.css"), "@import \"./base.css\";\n*{box-sizing:border-box}").unwrap();

        let bundler = PlainStyleBundler::new(dir.path());
        let out = bundler
            .bundle(
                "./styles/app.module.css",
                "@import \"./base.css\";\n@import url(https://fonts.dev/a.css);\n.btn{color:red}",
                &StyleOptions {
                    scoped_class_names: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(out.deps, vec!["./styles/base.css", "./styles/reset.css"]);
        assert!(out.code.contains("box-sizing:border-box"));
        assert!(out.code.contains("body{margin:0}"));
        assert!(out.code.contains("https://fonts.dev/a.css"));
        assert!(out.code.contains(".app_btn{color:red}"));
        assert_eq!(out.scoped_exports["btn"], "app_btn");
    }

    #[tokio::test]
    async fn test_missing_import_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlainStyleBundler::new(dir.path())
            .bundle("./a.css", "@import \"./gone.css\";", &StyleOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
