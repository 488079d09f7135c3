//! Server entry synthesis.
//!
//! The generated program restores the dependency graph from the snapshot,
//! registers every route module and then either imports the app's own
//! server entry or starts the framework's default server.

use std::path::Path;

use crate::config::JsxRuntime;
use crate::graph::SNAPSHOT_FILE;
use crate::specifier::{encode_path, url_path};

/// Name of the temporary JSX shim written next to the bundle.
pub const JSX_SHIM_FILE: &str = "jsx-shim.js";

/// App server entries, in lookup order.
pub const SERVER_ENTRY_FILES: &[&str] = &["server.tsx", "server.ts", "server.jsx", "server.js"];

/// Which server program the bundle starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEntry {
    /// App-provided entry, as a specifier relative to the root (`./server.tsx`).
    Custom(String),
    /// The framework's default, middleware-free server.
    Default,
}

impl ServerEntry {
    /// The first server entry file present in `root`, else the default.
    pub fn detect(root: &Path) -> Self {
        SERVER_ENTRY_FILES
            .iter()
            .find(|name| root.join(name).is_file())
            .map(|name| ServerEntry::Custom(format!("./{}", name)))
            .unwrap_or(ServerEntry::Default)
    }

    pub fn is_jsx(&self) -> bool {
        match self {
            ServerEntry::Custom(path) => path.ends_with(".jsx") || path.ends_with(".tsx"),
            ServerEntry::Default => false,
        }
    }
}

/// A route file and the names it exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFile {
    pub filename: String,
    pub export_names: Vec<String>,
}

impl RouteFile {
    pub fn has_export(&self, name: &str) -> bool {
        self.export_names.iter().any(|n| n == name)
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Build the server entry program.
///
/// `modules_origin` is where the module server answers; route modules and
/// the custom entry are imported from it so the bundler inlines them.
pub fn synthesize_server_entry(
    routes: &[RouteFile],
    entry: &ServerEntry,
    framework_url: &str,
    modules_origin: &str,
) -> String {
    let mut lines = vec![
        format!("import {{ DependencyGraph }} from {};", quote(&format!("{framework_url}/server/graph.ts"))),
        format!("import graph from {};", quote(&format!("./{SNAPSHOT_FILE}"))),
        "globalThis.serverDependencyGraph = new DependencyGraph(graph.modules);".to_string(),
    ];

    if !routes.is_empty() {
        lines.push(format!(
            "import {{ register }} from {};",
            quote(&format!("{framework_url}/server/routing.ts"))
        ));
    }
    for (idx, route) in routes.iter().enumerate() {
        let url = quote(&format!("{}{}", modules_origin, encode_path(&url_path(&route.filename))));
        if route.has_export("default") {
            lines.push(format!("import _{idx} from {url};"));
        } else {
            lines.push(format!("const _{idx} = undefined;"));
        }
        if route.has_export("data") {
            lines.push(format!("import {{ data as ${idx} }} from {url};"));
        } else {
            lines.push(format!("const ${idx} = undefined;"));
        }
        lines.push(format!(
            "register({}, {{ default: _{idx}, data: ${idx} }});",
            quote(&route.filename)
        ));
    }

    match entry {
        ServerEntry::Custom(path) => {
            lines.push(format!("import {};", quote(&format!("{}{}", modules_origin, encode_path(&url_path(path))))));
        }
        ServerEntry::Default => {
            lines.push(format!("import {{ serve }} from {};", quote(&format!("{framework_url}/server/mod.ts"))));
            lines.push("serve();".to_string());
        }
    }
    lines.join("\n")
}

/// Module injected into JSX server entries so the classic runtime finds
/// its factory.
pub fn jsx_shim(runtime: JsxRuntime, import_source: &str) -> String {
    match runtime {
        JsxRuntime::Preact => format!("import {{ h, Fragment }} from {};\nexport {{ h, Fragment }}", quote(import_source)),
        JsxRuntime::React => format!("import React from {};\nexport {{ React }}", quote(import_source)),
    }
}
