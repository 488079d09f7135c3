//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

pub const CONFIG_FILE: &str = "routekit.toml";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(toml::de::Error),
    ImportMap(PathBuf, serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "IO error reading {}: {}", path.display(), e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::ImportMap(path, e) => {
                write!(f, "Invalid import map {}: {}", path.display(), e)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config: AppConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config.normalized())
}

/// Load `routekit.toml` from the app root, or validated defaults if absent.
pub fn load_project_config(root: &Path) -> Result<AppConfig, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if path.is_file() {
        return load_config(&path);
    }
    tracing::debug!(root = ?root, "No config file found, using defaults");
    let config = AppConfig::default();
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_project_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_project_config(dir.path()).unwrap();
        assert!(config.routes.is_none());

        fs::write(
            dir.path().join(CONFIG_FILE),
            "[routes]\ndir = \"./routes\"\nexts = [\"tsx\"]\n",
        )
        .unwrap();
        let config = load_project_config(dir.path()).unwrap();
        assert!(config.routes.is_some());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[build]\nplatform = \"vercel\"\n[server]\ntls_cert = \"c.pem\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Vercel is not supported yet"), "{message}");
        assert!(message.contains("tls_key"), "{message}");

        fs::write(&path, "[build\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}
