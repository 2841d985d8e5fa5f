//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for remote driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Problems with app descriptors or the assets they reference.
///
/// All of these are fatal and surface before any device session is opened.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing folder: {}", .0.display())]
    MissingDir(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Config {} missing \"{field}\" (e.g. \"{example}\")", .path.display())]
    MissingField {
        path: PathBuf,
        field: &'static str,
        example: &'static str,
    },

    #[error("{kind} not found for {app}: {}", .path.display())]
    AssetNotFound {
        app: String,
        kind: &'static str,
        path: PathBuf,
    },

    #[error("Config {} {message}", .path.display())]
    InvalidField { path: PathBuf, message: String },

    #[error("APP={app} not found. Expected config file: {}", .expected.display())]
    AppNotFound { app: String, expected: PathBuf },
}

/// Errors from the remote automation endpoint.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A W3C error payload (`{"value": {"error": .., "message": ..}}`)
    #[error("{error} ({status}): {message}")]
    WebDriver {
        status: u16,
        error: String,
        message: String,
    },

    #[error("Session not created: {0}")]
    SessionNotCreated(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriverError {
    /// True for the W3C "no such element" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::WebDriver { error, .. } if error == "no such element")
    }
}

/// Errors resolving a template image.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("PNG not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
