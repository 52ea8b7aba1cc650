//! Error types for the feature-service client, with retry classification.

use skidway_core::retry::Retryable;
use thiserror::Error;

/// Result alias for feature-service operations.
pub type FeatureServiceResult<T> = Result<T, FeatureServiceError>;

/// Error from the feature service or its portal token endpoint.
#[derive(Debug, Error)]
pub enum FeatureServiceError {
    /// Token generation or an invalid-token response.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (DNS, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service throttled the caller.
    #[error("rate limited by the feature service")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Error envelope tunneled inside an HTTP 200 body.
    #[error("service error (code {code}): {message}")]
    Service { code: i64, message: String },

    /// Non-success HTTP status.
    #[error("feature service HTTP error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// One or more per-feature edit results failed.
    #[error("edit rejected for key '{key}': {message}")]
    EditRejected { key: String, message: String },

    /// Response body did not parse as the expected shape.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl Retryable for FeatureServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            FeatureServiceError::Http(_) | FeatureServiceError::RateLimited { .. } => true,
            FeatureServiceError::Api { status, .. } => *status >= 500,
            // 5xx-style codes in the tunneled envelope are transient.
            FeatureServiceError::Service { code, .. } => (500..600).contains(code),
            _ => false,
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            FeatureServiceError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}
