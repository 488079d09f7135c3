//! Import map loading and bare-specifier resolution.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::loader::ConfigError;

/// Candidate file names tried when no import map is configured.
pub const IMPORT_MAP_FILES: &[&str] = &[
    "import_map.json",
    "import-map.json",
    "importmap.json",
    "importMap.json",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
    #[serde(default)]
    pub scopes: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImportMap {
    /// Resolve `specifier` as imported from `importer`.
    ///
    /// Scopes whose key prefixes the importer win over top-level imports;
    /// within a table an exact key wins over the longest `/`-suffixed prefix.
    pub fn resolve(&self, specifier: &str, importer: Option<&str>) -> Option<String> {
        if let Some(importer) = importer {
            let mut scopes: Vec<(&String, &BTreeMap<String, String>)> = self
                .scopes
                .iter()
                .filter(|(scope, _)| importer.starts_with(scope.as_str()))
                .collect();
            scopes.sort_by_key(|(scope, _)| std::cmp::Reverse(scope.len()));
            for (_, table) in scopes {
                if let Some(hit) = resolve_in(table, specifier) {
                    return Some(hit);
                }
            }
        }
        resolve_in(&self.imports, specifier)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

fn resolve_in(table: &BTreeMap<String, String>, specifier: &str) -> Option<String> {
    if let Some(target) = table.get(specifier) {
        return Some(target.clone());
    }
    table
        .iter()
        .filter(|(key, _)| key.ends_with('/') && specifier.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(key, target)| format!("{}{}", target, &specifier[key.len()..]))
}

/// Load the import map for an app root.
///
/// An explicit path must exist; otherwise the usual names are tried and a
/// missing map yields an empty one.
pub fn load_import_map(root: &Path, explicit: Option<&str>) -> Result<ImportMap, ConfigError> {
    let path = match explicit {
        Some(name) => Some(root.join(name)),
        None => IMPORT_MAP_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file()),
    };
    let Some(path) = path else {
        return Ok(ImportMap::default());
    };
    let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(path.clone(), e))?;
    let map: ImportMap = serde_json::from_str(&text).map_err(|e| ConfigError::ImportMap(path.clone(), e))?;
    tracing::debug!(path = ?path, imports = map.imports.len(), "Import map loaded");
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ImportMap {
        serde_json::from_str(
            r#"{
                "imports": {
                    "react": "https://esm.sh/react@18",
                    "~/": "./",
                    "std/": "https://deno.land/std/"
                },
                "scopes": {
                    "./vendor/": { "react": "https://esm.sh/react@17" }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve() {
        let map = map();
        assert_eq!(map.resolve("react", None).as_deref(), Some("https://esm.sh/react@18"));
        assert_eq!(map.resolve("~/lib/a.ts", None).as_deref(), Some("./lib/a.ts"));
        assert_eq!(
            map.resolve("std/path/mod.ts", Some("./a.ts")).as_deref(),
            Some("https://deno.land/std/path/mod.ts")
        );
        assert_eq!(
            map.resolve("react", Some("./vendor/x.ts")).as_deref(),
            Some("https://esm.sh/react@17")
        );
        assert_eq!(map.resolve("vue", None), None);
    }

    #[test]
    fn test_load_import_map() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_import_map(dir.path(), None).unwrap(), ImportMap::default());
        assert!(load_import_map(dir.path(), Some("custom.json")).is_err());

        std::fs::write(dir.path().join("import-map.json"), r#"{"imports":{"a":"./a.ts"}}"#).unwrap();
        let map = load_import_map(dir.path(), None).unwrap();
        assert_eq!(map.imports["a"], "./a.ts");
    }
}
