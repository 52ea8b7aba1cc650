//! Error types for configuration, secrets, and row handling.

use thiserror::Error;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error that can occur while loading configuration or shaping rows.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Run configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No secrets file was found at any probed location.
    #[error("secrets not found: {0}")]
    SecretsNotFound(String),

    /// Filesystem error while reading config or secrets.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file failed to parse.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Secrets file failed to parse.
    #[error("secrets parse error: {0}")]
    Json(#[from] serde_json::Error),
}
