//! Default bundler: vendors inlined modules next to the entry.
//!
//! # Responsibilities
//! - Resolve every import of the entry and of vendored modules through the
//!   plugin hooks
//! - Write each inlined remote module to `<out>/_vendor/<host>/<path>.js`
//! - Rewrite imports to relative paths of the vendored files
//!
//! # Design Decisions
//! - No tree shaking, minification or type stripping: modules are copied
//! - Injected files are prepended to the entry without their exports
//! - Each vendored URL is fetched once per build; the `v` cache-busting
//!   parameter is ignored, so import cycles between served modules end

use async_trait::async_trait;
use regex::Captures;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use url::Url;

use crate::build::bundler::{
    BundlePlugin, BundleRequest, Bundler, ImportKind, LoadArgs, Namespace, ResolveArgs, ResolveResult,
};
use crate::build::BuildError;
use crate::transform::imports::import_regex;

pub const VENDOR_DIR: &str = "_vendor";

/// Output path of a vendored URL, relative to the output directory.
pub fn vendor_path(url: &str) -> String {
    let (host, path, query) = match Url::parse(url) {
        Ok(u) => (
            match u.port() {
                Some(port) => format!("{}_{}", u.host_str().unwrap_or_default(), port),
                None => u.host_str().unwrap_or_default().to_string(),
            },
            u.path().to_string(),
            u.query().map(String::from),
        ),
        Err(_) => ("unknown".to_string(), url.to_string(), None),
    };
    let mut out = format!("{}/{}{}", VENDOR_DIR, host, path);
    if let Some(query) = query {
        out.push('_');
        out.push_str(&query);
    }
    let mut out: String = out
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '/' | '.' | '-' | '_' | '@' => c,
            _ => '_',
        })
        .collect();
    if !out.ends_with(".js") {
        out.push_str(".js");
    }
    out
}

/// A vendored URL without its `v` cache-busting parameter.
fn vendor_key(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "v")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parsed.into()
}

/// Relative import from one output file to another (both relative to the
/// output directory).
fn relative_import(from: &str, to: &str) -> String {
    let depth = from.matches('/').count();
    if depth == 0 {
        format!("./{}", to)
    } else {
        format!("{}{}", "../".repeat(depth), to)
    }
}

struct Pending {
    /// Output file, relative to the output directory.
    out: String,
    contents: String,
    importer: Option<String>,
    namespace: Namespace,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VendorBundler;

impl VendorBundler {
    async fn rewrite(
        &self,
        module: &Pending,
        plugin: &dyn BundlePlugin,
        seen: &mut HashSet<String>,
        queue: &mut VecDeque<Pending>,
    ) -> Result<String, BuildError> {
        let imports: Vec<(String, ImportKind)> = import_regex()
            .captures_iter(&module.contents)
            .map(|caps| {
                let kind = if caps["pre"].trim_end().ends_with('(') {
                    ImportKind::Dynamic
                } else {
                    ImportKind::Static
                };
                (caps["spec"].to_string(), kind)
            })
            .collect();

        let mut replacements: HashMap<String, String> = HashMap::new();
        for (spec, kind) in imports {
            if replacements.contains_key(&spec) {
                continue;
            }
            let resolved = plugin.on_resolve(&ResolveArgs {
                path: spec.clone(),
                importer: module.importer.clone(),
                namespace: module.namespace,
                kind,
            });
            let target = match resolved {
                ResolveResult::External(path) => path,
                ResolveResult::Resolved {
                    path,
                    namespace: Namespace::File,
                } => path,
                ResolveResult::Resolved {
                    path,
                    namespace: Namespace::Http,
                } => {
                    let key = vendor_key(&path);
                    let out = vendor_path(&key);
                    if seen.insert(key) {
                        let loaded = plugin
                            .on_load(&LoadArgs {
                                path: path.clone(),
                                namespace: Namespace::Http,
                            })
                            .await?
                            .ok_or_else(|| BuildError::Bundle(format!("no loader for {}", path)))?;
                        queue.push_back(Pending {
                            out: out.clone(),
                            contents: loaded.contents,
                            importer: Some(path),
                            namespace: Namespace::Http,
                        });
                    }
                    relative_import(&module.out, &out)
                }
            };
            replacements.insert(spec, target);
        }

        let code = import_regex().replace_all(&module.contents, |caps: &Captures<'_>| {
            match replacements.get(&caps["spec"]) {
                Some(target) => format!("{}{}{}{}", &caps["pre"], &caps["q"], target, &caps["q"]),
                None => caps[0].to_string(),
            }
        });
        Ok(code.into_owned())
    }
}

async fn write_file(dir: &Path, rel: &str, contents: &str) -> Result<(), BuildError> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BuildError::Io { path: parent.to_path_buf(), source })?;
    }
    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| BuildError::Io { path, source })
}

#[async_trait]
impl Bundler for VendorBundler {
    async fn bundle(&self, request: BundleRequest, plugin: &dyn BundlePlugin) -> Result<(), BuildError> {
        let out_dir = request
            .outfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let entry_name = request
            .outfile
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "server.js".to_string());

        let mut contents = String::new();
        for inject in &request.inject {
            let text = tokio::fs::read_to_string(inject)
                .await
                .map_err(|source| BuildError::Io { path: inject.clone(), source })?;
            for line in text.lines().filter(|l| !l.trim_start().starts_with("export ")) {
                contents.push_str(line);
                contents.push('\n');
            }
        }
        contents.push_str(&request.contents);

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([Pending {
            out: entry_name,
            contents,
            importer: None,
            namespace: Namespace::File,
        }]);
        let mut written = 0usize;
        while let Some(module) = queue.pop_front() {
            let code = self.rewrite(&module, plugin, &mut seen, &mut queue).await?;
            write_file(&out_dir, &module.out, &code).await?;
            written += 1;
        }
        tracing::info!(
            outfile = ?request.outfile,
            source = %request.source_file,
            files = written,
            "Server bundle written"
        );
        Ok(())
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::bundler::{LoadResult, Loader};
    use crate::config::BuildTarget;

    struct MapPlugin;

    #[async_trait]
    impl BundlePlugin for MapPlugin {
        fn on_resolve(&self, args: &ResolveArgs) -> ResolveResult {
            if args.kind == ImportKind::Dynamic || args.path.starts_with("https://esm.sh") {
                return ResolveResult::External(args.path.clone());
            }
            let path = match &args.importer {
                Some(importer) => Url::parse(importer).unwrap().join(&args.path).unwrap().to_string(),
                None => args.path.clone(),
            };
            ResolveResult::Resolved {
                path,
                namespace: Namespace::Http,
            }
        }

        async fn on_load(&self, args: &LoadArgs) -> Result<Option<LoadResult>, BuildError> {
            let contents = match args.path.as_str() {
                "http://localhost:6060/routes/a.tsx" => "import { b } from \"/lib/b.ts?v=1\";\nexport default b;",
                "http://localhost:6060/lib/b.ts?v=1" => {
                    "import \"/routes/a.tsx?v=2\";\nimport React from \"https://esm.sh/react\";\nexport const b = 1;"
                }
                _ => "",
            };
            Ok(Some(LoadResult {
                contents: contents.to_string(),
                loader: Loader::Ts,
            }))
        }
    }

    #[test]
    fn test_vendor_path() {
        assert_eq!(
            vendor_path("http://localhost:6060/lib/b.ts?v=1"),
            "_vendor/localhost_6060/lib/b.ts_v_1.js"
        );
        assert_eq!(vendor_path("https://esm.sh/react@18"), "_vendor/esm.sh/react@18.js");
        assert_eq!(vendor_key("http://localhost:6060/lib/b.ts?v=18c4f2"), "http://localhost:6060/lib/b.ts");
        assert_eq!(
            vendor_key("http://localhost:6060/app.css?module&v=1"),
            "http://localhost:6060/app.css?module="
        );
        assert_eq!(relative_import("server.js", "_vendor/a.js"), "./_vendor/a.js");
        assert_eq!(relative_import("_vendor/x/y.js", "_vendor/a.js"), "../../_vendor/a.js");
    }

    #[tokio::test]
    async fn test_bundle_vendors_inlined_modules() {
        let dir = tempfile::tempdir().unwrap();
        let shim = dir.path().join("jsx-shim.js");
        std::fs::write(&shim, "import React from \"https://esm.sh/react\";\nexport { React }").unwrap();

        let request = BundleRequest {
            contents: "import _0 from \"http://localhost:6060/routes/a.tsx\";\nconst m = import(\"./lazy.ts\");".into(),
            source_file: "server.tsx".into(),
            outfile: dir.path().join("server.js"),
            target: BuildTarget::Es2020,
            minify: false,
            jsx_factory: "React.createElement",
            jsx_fragment: "React.Fragment",
            inject: vec![shim],
        };
        VendorBundler.bundle(request, &MapPlugin).await.unwrap();

        let entry = std::fs::read_to_string(dir.path().join("server.js")).unwrap();
        assert!(entry.starts_with("import React from \"https://esm.sh/react\";\n"));
        assert!(!entry.contains("export { React }"));
        assert!(entry.contains("import _0 from \"./_vendor/localhost_6060/routes/a.tsx.js\";"));
        assert!(entry.contains("import(\"./lazy.ts\")"));

        let a = std::fs::read_to_string(dir.path().join("_vendor/localhost_6060/routes/a.tsx.js")).unwrap();
        assert!(a.contains("from \"../../../_vendor/localhost_6060/lib/b.ts.js\""));
        let b = std::fs::read_to_string(dir.path().join("_vendor/localhost_6060/lib/b.ts.js")).unwrap();
        assert!(b.contains("import \"../../../_vendor/localhost_6060/routes/a.tsx.js\";"));
    }
}
