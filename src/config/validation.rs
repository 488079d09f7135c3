//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject deploy platforms the build cannot target yet
//! - Check paired options (TLS certificate and key)
//! - Check the routing configuration compiles
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{AppConfig, Platform};
use crate::routing::{RouteRegExp, RoutesConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("deploy to {0} is not supported yet")]
    UnsupportedPlatform(Platform),

    #[error("missing `tls_cert` option (required with `tls_key`)")]
    MissingTlsCert,

    #[error("missing `tls_key` option (required with `tls_cert`)")]
    MissingTlsKey,

    #[error("routes.exts must list at least one extension")]
    EmptyRouteExts,

    #[error("{0}")]
    InvalidRoutes(String),
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.build.platform.is_supported() {
        errors.push(ValidationError::UnsupportedPlatform(config.build.platform));
    }

    match (&config.server.tls_cert, &config.server.tls_key) {
        (None, Some(_)) => errors.push(ValidationError::MissingTlsCert),
        (Some(_), None) => errors.push(ValidationError::MissingTlsKey),
        _ => {}
    }

    if let Some(routes) = &config.routes {
        if let RoutesConfig::Dir(dir) = routes {
            if dir.exts.is_empty() {
                errors.push(ValidationError::EmptyRouteExts);
            }
        }
        if let Err(e) = RouteRegExp::compile(routes) {
            errors.push(ValidationError::InvalidRoutes(e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
