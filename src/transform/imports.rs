//! Text-level import rewriting.
//!
//! # Responsibilities
//! - Find static, re-export and dynamic import specifiers in module text
//! - Resolve them through the import map, the importer's location or its URL
//! - Rewrite local imports to absolute URLs carrying the graph version
//! - Report the canonical dependency list
//!
//! # Design Decisions
//! - Regex scanning, not parsing: strings and comments that look like
//!   imports are rewritten too
//! - Bare specifiers the import map does not know are left untouched
//! - Dynamic imports are recorded but keep their original text

use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use url::Url;

use crate::specifier::{clean_path, encode_path, extension, is_remote, to_local_path, url_path};
use crate::transform::collaborators::{ScriptOptions, ScriptOutput, SourceTransform, TransformError};

pub(crate) fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?P<pre>\b(?:import|export)\b[^'";()]*?\bfrom\s*|\bimport\s*\(\s*|\bimport\s*)(?P<q>["'])(?P<spec>[^"'\r\n]+)["']"#,
        )
        .expect("import pattern is valid")
    })
}

fn type_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*(?:import|export)\s+type\s+[^;]*?\bfrom\s*["'][^"'\r\n]+["']\s*;?[ \t]*\r?\n?"#)
            .expect("type import pattern is valid")
    })
}

/// Resolve `specifier` as written inside `importer` to a canonical
/// specifier, or `None` for an unmapped bare specifier.
pub fn resolve_import(specifier: &str, importer: &str, options: &ScriptOptions<'_>) -> Option<String> {
    let mapped = options
        .import_map
        .resolve(specifier, Some(importer))
        .unwrap_or_else(|| specifier.to_string());

    if is_remote(&mapped) {
        return Some(mapped);
    }
    let relative = mapped.starts_with("./") || mapped.starts_with("../");
    if !relative && !mapped.starts_with('/') {
        return None;
    }
    if is_remote(importer) {
        let base = Url::parse(importer).ok()?;
        return base.join(&mapped).ok().map(String::from);
    }
    let joined = if relative {
        let dir = url_path(importer);
        let dir = dir.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        clean_path(&format!("{}/{}", dir, mapped))
    } else {
        clean_path(&mapped)
    };
    Some(format!(".{}", joined))
}

/// URL the browser should fetch for a resolved dependency.
fn served_url(dep: &str, options: &ScriptOptions<'_>) -> String {
    if is_remote(dep) {
        return to_local_path(dep);
    }
    let version = options
        .versions
        .get(dep)
        .cloned()
        .unwrap_or_else(|| options.baseline_version.token());
    let path = encode_path(&url_path(dep));
    if extension(dep) == Some("css") {
        format!("{}?module&v={}", path, version)
    } else {
        format!("{}?v={}", path, version)
    }
}

/// Default source transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportRewriter;

impl ImportRewriter {
    pub fn rewrite(&self, specifier: &str, source: &str, options: &ScriptOptions<'_>) -> ScriptOutput {
        let source = type_import_regex().replace_all(source, "");
        let mut deps: Vec<String> = Vec::new();

        let code = import_regex().replace_all(&source, |caps: &Captures<'_>| {
            let raw = &caps["spec"];
            let Some(dep) = resolve_import(raw, specifier, options) else {
                return caps[0].to_string();
            };
            let dynamic = caps["pre"].trim_end().ends_with('(');
            let rewritten = if dynamic {
                caps[0].to_string()
            } else {
                format!("{}{}{}{}", &caps["pre"], &caps["q"], served_url(&dep, options), &caps["q"])
            };
            if !deps.contains(&dep) {
                deps.push(dep);
            }
            rewritten
        });

        ScriptOutput {
            code: code.into_owned(),
            deps,
        }
    }
}

#[async_trait]
impl SourceTransform for ImportRewriter {
    async fn transform(
        &self,
        specifier: &str,
        source: &str,
        options: ScriptOptions<'_>,
    ) -> Result<ScriptOutput, TransformError> {
        Ok(self.rewrite(specifier, source, &options))
    }
}
