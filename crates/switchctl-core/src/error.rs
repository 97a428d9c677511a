//! Error types for config loading and request parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {} (expected .yml, .yaml or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("entry {entry}: invalid regexp {pattern:?}: {message}")]
    InvalidRegex {
        entry: usize,
        pattern: String,
        message: String,
    },

    #[error("invalid template {template:?}: {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("invalid application request {0:?}: expected <application>:<version> using letters, digits and ._-:+")]
    InvalidRequest(String),
}
