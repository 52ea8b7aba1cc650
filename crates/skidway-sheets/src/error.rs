//! Error types for the Sheets client, with retry classification.

use skidway_core::retry::Retryable;
use thiserror::Error;

/// Result alias for Sheets operations.
pub type SheetsResult<T> = Result<T, SheetsError>;

/// Error from the Sheets API or the service-account token exchange.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// Token exchange or credential signing failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (DNS, TLS, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API throttled the caller (HTTP 429).
    #[error("rate limited by the Sheets API")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Spreadsheet, tab, or range does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the API.
    #[error("sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not parse as the expected shape.
    #[error("response parse error: {0}")]
    Parse(String),
}

impl SheetsError {
    /// HTTP 5xx from the API.
    pub fn is_server_error(&self) -> bool {
        matches!(self, SheetsError::Api { status, .. } if *status >= 500)
    }
}

impl Retryable for SheetsError {
    fn is_retryable(&self) -> bool {
        match self {
            SheetsError::Http(_) | SheetsError::RateLimited { .. } => true,
            SheetsError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            SheetsError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        let err = SheetsError::Api {
            status: 503,
            message: "backend unavailable".into(),
        };
        assert!(err.is_server_error());
        assert!(err.is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = SheetsError::Api {
            status: 400,
            message: "bad range".into(),
        };
        assert!(!err.is_retryable());
        assert!(!SheetsError::NotFound("tab".into()).is_retryable());
        assert!(!SheetsError::Auth("bad key".into()).is_retryable());
    }

    #[test]
    fn rate_limit_carries_retry_after() {
        let err = SheetsError::RateLimited {
            retry_after_secs: Some(12),
        };
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_secs(), Some(12));
    }
}
