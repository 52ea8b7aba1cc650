//! Portal token authentication for the feature service.
//!
//! The portal issues short-lived tokens from `generateToken` against a
//! username/password pair. Tokens are cached until shortly before the
//! portal-reported expiry and dropped when the service reports an
//! invalid-token code so the next request re-authenticates.

use crate::error::{FeatureServiceError, FeatureServiceResult};
use serde::Deserialize;
use skidway_core::secrets::PortalCredentials;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Token lifetime requested from the portal, in minutes.
const TOKEN_LIFETIME_MINUTES: u32 = 60;

/// Referer sent with the token request; the portal binds tokens to it.
const TOKEN_REFERER: &str = "https://www.arcgis.com";

/// Service error codes that mean the current token is no longer valid.
pub(crate) const INVALID_TOKEN_CODES: [i64; 2] = [498, 499];

/// Credentials for the feature service.
///
/// The `Debug` impl redacts the password and token.
#[derive(Clone)]
pub enum PortalToken {
    /// Pre-issued token. Used by tests and local tinkering.
    Static { token: String },

    /// Username/password exchanged at the portal's `generateToken`.
    Portal { credentials: PortalCredentials },
}

impl std::fmt::Debug for PortalToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { .. } => f
                .debug_struct("Static")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Portal { credentials } => f
                .debug_struct("Portal")
                .field("username", &credentials.username)
                .field("password", &"[REDACTED]")
                .field("portal_url", &credentials.portal_url)
                .finish(),
        }
    }
}

/// `generateToken` response; errors come back tunneled in HTTP 200.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateTokenResponse {
    Token {
        token: String,
        /// Expiry as epoch milliseconds.
        expires: i64,
    },
    Error {
        error: PortalErrorBody,
    },
}

#[derive(Debug, Deserialize)]
struct PortalErrorBody {
    code: i64,
    message: String,
}

/// Cached portal token with expiry.
#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Authentication handler for the feature-service client.
#[derive(Debug, Clone)]
pub struct PortalAuth {
    credentials: PortalToken,
    /// Cached token (shared across clones).
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests.
    http_client: reqwest::Client,
}

impl PortalAuth {
    /// Create an auth handler from credentials.
    #[must_use]
    pub fn new(credentials: PortalToken, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Get the token to send with requests, generating a fresh one when
    /// the cache is empty or expired.
    pub async fn get_token(&self) -> FeatureServiceResult<String> {
        let credentials = match &self.credentials {
            PortalToken::Static { token } => return Ok(token.clone()),
            PortalToken::Portal { credentials } => credentials,
        };

        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_expired() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let url = format!(
            "{}/sharing/rest/generateToken",
            credentials.portal_url.trim_end_matches('/')
        );
        debug!(portal_url = %credentials.portal_url, "requesting portal token");

        let expiration = TOKEN_LIFETIME_MINUTES.to_string();
        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("referer", TOKEN_REFERER),
                ("expiration", expiration.as_str()),
                ("f", "json"),
            ])
            .send()
            .await
            .map_err(|e| FeatureServiceError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(FeatureServiceError::Auth(format!(
                "generateToken returned {status}: {body}"
            )));
        }

        let parsed: GenerateTokenResponse = response
            .json()
            .await
            .map_err(|e| FeatureServiceError::Auth(format!("failed to parse token response: {e}")))?;

        let (token, expires) = match parsed {
            GenerateTokenResponse::Token { token, expires } => (token, expires),
            GenerateTokenResponse::Error { error } => {
                return Err(FeatureServiceError::Auth(format!(
                    "generateToken rejected credentials (code {}): {}",
                    error.code, error.message
                )));
            }
        };

        let expires_at = expires_at_from_epoch_millis(expires);
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        Ok(token)
    }

    /// Invalidate the cached token (e.g. on an invalid-token code).
    pub async fn invalidate_cache(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

/// Convert the portal's epoch-millisecond expiry to a local deadline,
/// 30 seconds early to avoid using a token at the edge of its life.
fn expires_at_from_epoch_millis(expires: i64) -> Instant {
    let now_millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let remaining_millis = (expires - now_millis).max(0) as u64;
    Instant::now() + Duration::from_millis(remaining_millis.saturating_sub(30_000))
}
