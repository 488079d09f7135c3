//! Configuration schema definitions.
//!
//! This module defines the complete `routekit.toml` structure.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::routing::RoutesConfig;

/// Root configuration for an app.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Route file location; no routes when absent.
    pub routes: Option<RoutesConfig>,

    /// Production build settings.
    pub build: BuildConfig,

    /// Internal module server (transform endpoint).
    pub module_server: ModuleServerConfig,

    /// Public app server settings, validated here and consumed by the host.
    pub server: ServerConfig,

    /// JSX runtime used by the server bundle.
    pub jsx: JsxConfig,

    /// Atomic CSS generation; inactive without presets.
    pub atomic_css: Option<AtomicCssConfig>,

    /// Base URL of the framework runtime modules.
    pub framework_url: String,

    /// Explicit import map path, relative to the app root.
    pub import_map: Option<String>,

    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Subpackage of the framework that binds the active UI library.
    pub fn ui_binding_url(&self) -> String {
        format!("{}/framework/{}/", self.framework_url, self.jsx.runtime.as_str())
    }
}

/// Build configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    pub target: BuildTarget,
    pub platform: Platform,
    /// Output directory, relative to the app root.
    pub output_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target: BuildTarget::Es2020,
            platform: Platform::Deno,
            output_dir: "dist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    Es2015,
    Es2016,
    Es2017,
    Es2018,
    Es2019,
    Es2020,
    Es2021,
    Es2022,
}

/// Deploy platform of the server bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Deno,
    Cloudflare,
    Vercel,
}

impl Platform {
    pub fn is_supported(&self) -> bool {
        matches!(self, Platform::Deno)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Deno => "Deno",
            Platform::Cloudflare => "Cloudflare",
            Platform::Vercel => "Vercel",
        };
        f.write_str(name)
    }
}

/// Module server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleServerConfig {
    pub hostname: String,

    /// First port tried; taken ports are skipped upwards.
    pub port: u16,
}

impl Default for ModuleServerConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 6060,
        }
    }
}

/// App server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub hostname: Option<String>,
    pub port: u16,
    /// Certificate file (PEM); requires `tls_key`.
    pub tls_cert: Option<String>,
    /// Private key file (PEM); requires `tls_cert`.
    pub tls_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: 8080,
            tls_cert: None,
            tls_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JsxConfig {
    pub runtime: JsxRuntime,
    /// Module providing the JSX factory, e.g. `https://esm.sh/react@18`.
    pub import_source: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    #[default]
    React,
    Preact,
}

impl JsxRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsxRuntime::React => "react",
            JsxRuntime::Preact => "preact",
        }
    }

    pub fn factory(&self) -> &'static str {
        match self {
            JsxRuntime::React => "React.createElement",
            JsxRuntime::Preact => "h",
        }
    }

    pub fn fragment(&self) -> &'static str {
        match self {
            JsxRuntime::React => "React.Fragment",
            JsxRuntime::Preact => "Fragment",
        }
    }
}

/// Options handed verbatim to the atomic CSS generator.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AtomicCssConfig {
    #[serde(default)]
    pub presets: Vec<String>,

    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl AtomicCssConfig {
    pub fn is_active(&self) -> bool {
        !self.presets.is_empty()
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

pub const DEFAULT_FRAMEWORK_URL: &str = "https://deno.land/x/routekit@0.1.0";

impl AppConfig {
    /// Framework URL with the default applied and no trailing slash.
    pub fn normalized(mut self) -> Self {
        if self.framework_url.is_empty() {
            self.framework_url = DEFAULT_FRAMEWORK_URL.to_string();
        }
        let trimmed = self.framework_url.trim_end_matches('/').len();
        self.framework_url.truncate(trimmed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        let config = config.normalized();
        assert!(config.routes.is_none());
        assert_eq!(config.module_server.port, 6060);
        assert_eq!(config.build.output_dir, "dist");
        assert_eq!(config.framework_url, DEFAULT_FRAMEWORK_URL);
        assert_eq!(config.ui_binding_url(), format!("{DEFAULT_FRAMEWORK_URL}/framework/react/"));
    }

    #[test]
    fn test_full_config() {
        let config: AppConfig = toml::from_str(
            r#"
            framework_url = "http://localhost:2020/"
            routes = "./routes/**/*.tsx"

            [build]
            target = "es2022"
            platform = "vercel"

            [jsx]
            runtime = "preact"
            import_source = "https://esm.sh/preact"

            [atomic_css]
            presets = ["uno"]
            shortcuts = { btn = "px-2" }
            "#,
        )
        .unwrap();
        let config = config.normalized();
        assert_eq!(config.framework_url, "http://localhost:2020");
        assert_eq!(config.build.target, BuildTarget::Es2022);
        assert!(!config.build.platform.is_supported());
        assert_eq!(config.jsx.runtime.factory(), "h");
        let atomic = config.atomic_css.unwrap();
        assert!(atomic.is_active());
        assert!(atomic.options.contains_key("shortcuts"));
    }
}
