//! Top-level export name extraction.

use regex::Regex;
use std::sync::OnceLock;

use crate::build::BuildError;

/// Lists the top-level export identifiers of a module.
pub trait ExportParser: Send + Sync {
    fn parse_export_names(&self, filename: &str, code: &str) -> Result<Vec<String>, BuildError>;
}

fn declaration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?m)^\s*export\s+(?:(?P<default>default)\b|(?:declare\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|enum)\s+(?P<name>[A-Za-z_$][\w$]*)|\*\s+as\s+(?P<ns>[A-Za-z_$][\w$]*)|(?P<list>\{))",
        )
        .expect("export pattern is valid")
    })
}

/// Regex-based parser good enough to detect `default` and `data` exports.
///
/// Type-only exports (`export type`, `export interface`) are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExportParser;

impl ExportParser for TextExportParser {
    fn parse_export_names(&self, filename: &str, code: &str) -> Result<Vec<String>, BuildError> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for caps in declaration_regex().captures_iter(code) {
            if caps.name("default").is_some() {
                push("default");
            } else if let Some(name) = caps.name("name").or_else(|| caps.name("ns")) {
                push(name.as_str());
            } else if let Some(open) = caps.name("list") {
                let rest = &code[open.end()..];
                let close = rest.find('}').ok_or_else(|| BuildError::ExportParse {
                    filename: filename.to_string(),
                    message: "unterminated export list".to_string(),
                })?;
                for item in rest[..close].split(',') {
                    let item = item.trim();
                    if item.is_empty() || item.starts_with("type ") {
                        continue;
                    }
                    let exported = match item.split_once(" as ") {
                        Some((_, alias)) => alias.trim(),
                        None => item,
                    };
                    push(exported);
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_names() {
        let code = r#"
import { x } from "./x.ts";
export const data = { get: () => x };
export type Props = { a: string };
export default function Page() {}
export async function helper() {}
export { x as y, z, w as default };
export * as utils from "./utils.ts";
"#;
        let names = TextExportParser.parse_export_names("./routes/a.tsx", code).unwrap();
        assert_eq!(names, vec!["data", "default", "helper", "y", "z", "utils"]);
    }

    #[test]
    fn test_unterminated_list_fails() {
        let err = TextExportParser
            .parse_export_names("./routes/a.tsx", "export { a, b")
            .unwrap_err();
        assert!(matches!(err, BuildError::ExportParse { .. }));
    }
}
