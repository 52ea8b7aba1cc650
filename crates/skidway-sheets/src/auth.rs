//! Sheets authentication: service-account JWT-bearer grant with
//! access-token caching.
//!
//! The service account signs a short-lived RS256 assertion and exchanges
//! it at the Google token endpoint for an access token, which is cached
//! until shortly before expiry and dropped on a 401.

use crate::error::{SheetsError, SheetsResult};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use skidway_core::secrets::ServiceAccountKey;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;

/// OAuth scope for full spreadsheet access.
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// JWT-bearer grant type (RFC 7523).
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime requested from the token endpoint.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Credentials for the Sheets API.
///
/// The `Debug` impl redacts key material.
#[derive(Clone)]
pub enum SheetsCredentials {
    /// Pre-issued access token. Used by tests and local tinkering.
    Static { token: String },

    /// Service-account key for the JWT-bearer grant.
    ServiceAccount { key: ServiceAccountKey },
}

impl std::fmt::Debug for SheetsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { .. } => f
                .debug_struct("Static")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::ServiceAccount { key } => f
                .debug_struct("ServiceAccount")
                .field("client_email", &key.client_email)
                .field("private_key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Claims of the service-account assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Cached access token with expiry.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Instant::now() >= exp,
            None => false,
        }
    }
}

/// Authentication handler for the Sheets client.
#[derive(Debug, Clone)]
pub struct SheetsAuth {
    credentials: SheetsCredentials,
    /// Cached access token (shared across clones).
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests.
    http_client: reqwest::Client,
}

impl SheetsAuth {
    /// Create an auth handler from credentials.
    #[must_use]
    pub fn new(credentials: SheetsCredentials, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Get the bearer token to use for requests, exchanging a fresh
    /// assertion when the cache is empty or expired.
    pub async fn get_bearer_token(&self) -> SheetsResult<String> {
        let key = match &self.credentials {
            SheetsCredentials::Static { token } => return Ok(token.clone()),
            SheetsCredentials::ServiceAccount { key } => key,
        };

        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                if !cached.is_expired() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        debug!(token_uri = %key.token_uri, "exchanging service-account assertion");
        let assertion = sign_assertion(key)?;

        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SheetsError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(SheetsError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SheetsError::Auth(format!("failed to parse token response: {e}")))?;

        let expires_at = token_response.expires_in.map(|secs| {
            // Expire 30 seconds early to avoid using a stale token.
            Instant::now() + Duration::from_secs(secs.saturating_sub(30))
        });

        let access_token = token_response.access_token.clone();
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                access_token: token_response.access_token,
                expires_at,
            });
        }

        Ok(access_token)
    }

    /// Apply authentication to a request builder.
    pub async fn apply(&self, builder: RequestBuilder) -> SheetsResult<RequestBuilder> {
        let token = self.get_bearer_token().await?;
        Ok(builder.bearer_auth(token))
    }

    /// Invalidate the cached token (e.g. on a 401 response).
    pub async fn invalidate_cache(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}

/// Sign a JWT-bearer assertion for the service account.
fn sign_assertion(key: &ServiceAccountKey) -> SheetsResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| SheetsError::Auth(format!("system clock is before the epoch: {e}")))?
        .as_secs();

    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetsError::Auth(format!("invalid service-account private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SheetsError::Auth(format!("failed to sign assertion: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_skips_exchange() {
        let auth = SheetsAuth::new(
            SheetsCredentials::Static {
                token: "test-token".to_string(),
            },
            reqwest::Client::new(),
        );
        assert_eq!(auth.get_bearer_token().await.unwrap(), "test-token");
    }

    #[test]
    fn debug_redacts_credentials() {
        let auth = SheetsCredentials::Static {
            token: "super-secret".to_string(),
        };
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn sign_assertion_rejects_garbage_key() {
        let key = ServiceAccountKey {
            client_email: "skid@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };
        let err = sign_assertion(&key).unwrap_err();
        assert!(matches!(err, SheetsError::Auth(_)));
    }

    #[test]
    fn cached_token_without_expiry_never_expires() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: None,
        };
        assert!(!token.is_expired());
    }
}
