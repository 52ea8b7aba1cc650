//! Feature-service HTTP client (reqwest-based).
//!
//! Talks to hosted layers by URL: offset-paginated `query`, layer
//! metadata, and `applyEdits` for adds and updates. The service tunnels
//! errors inside HTTP 200 bodies, so every response is checked for the
//! error envelope before being parsed as the expected shape.

use crate::auth::{PortalAuth, INVALID_TOKEN_CODES};
use crate::error::{FeatureServiceError, FeatureServiceResult};
use crate::geometry::PointGeometry;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Page size requested from `query`.
const QUERY_PAGE_SIZE: usize = 1000;

/// Maximum features sent per `applyEdits` call.
const APPLY_EDITS_CHUNK: usize = 100;

/// A feature as stored in a hosted layer: attribute map plus optional
/// point geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<PointGeometry>,
}

impl Feature {
    /// A feature with attributes only (tables, or updates that keep the
    /// stored geometry).
    #[must_use]
    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            geometry: None,
        }
    }
}

/// One field of a layer's schema.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerField {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

/// Counts of applied edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub added: usize,
    pub updated: usize,
}

/// `query` response page.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(rename = "exceededTransferLimit", default)]
    exceeded_transfer_limit: bool,
}

/// Layer metadata, trimmed to the field list.
#[derive(Debug, Deserialize)]
struct LayerInfo {
    #[serde(default)]
    fields: Vec<LayerField>,
}

/// `applyEdits` response.
#[derive(Debug, Deserialize)]
struct ApplyEditsResponse {
    #[serde(rename = "addResults", default)]
    add_results: Vec<EditResult>,
    #[serde(rename = "updateResults", default)]
    update_results: Vec<EditResult>,
}

#[derive(Debug, Deserialize)]
struct EditResult {
    #[serde(rename = "objectId", default)]
    object_id: Option<i64>,
    success: bool,
    #[serde(default)]
    error: Option<EditErrorBody>,
}

#[derive(Debug, Deserialize)]
struct EditErrorBody {
    #[serde(default)]
    description: String,
}

/// Feature-service client. Layer URLs are passed per call, so one
/// client serves every layer behind the same portal.
#[derive(Debug, Clone)]
pub struct FeatureServiceClient {
    auth: PortalAuth,
    http_client: Client,
}

impl FeatureServiceClient {
    /// Create a client backed by the given portal auth.
    #[must_use]
    pub fn new(auth: PortalAuth, http_client: Client) -> Self {
        Self { auth, http_client }
    }

    // ── Query ─────────────────────────────────────────────────────────

    /// Query a layer, following `exceededTransferLimit` pagination until
    /// every matching feature has been fetched.
    pub async fn query(
        &self,
        layer_url: &str,
        where_clause: &str,
    ) -> FeatureServiceResult<Vec<Feature>> {
        let url = format!("{}/query", layer_url.trim_end_matches('/'));
        let mut features = Vec::new();
        let mut offset = 0usize;

        loop {
            let token = self.auth.get_token().await?;
            let offset_str = offset.to_string();
            let page_size_str = QUERY_PAGE_SIZE.to_string();
            debug!(url = %url, offset, "querying layer");
            let response = self
                .http_client
                .get(&url)
                .query(&[
                    ("f", "json"),
                    ("where", where_clause),
                    ("outFields", "*"),
                    ("resultOffset", offset_str.as_str()),
                    ("resultRecordCount", page_size_str.as_str()),
                    ("token", token.as_str()),
                ])
                .send()
                .await?;

            let page: QueryResponse = self.handle_response(response).await?;
            let fetched = page.features.len();
            offset += fetched;
            features.extend(page.features);

            if !page.exceeded_transfer_limit || fetched == 0 {
                break;
            }
        }

        debug!(url = %url, count = features.len(), "query complete");
        Ok(features)
    }

    /// Fetch a layer's field schema.
    pub async fn layer_fields(&self, layer_url: &str) -> FeatureServiceResult<Vec<LayerField>> {
        let token = self.auth.get_token().await?;
        let url = layer_url.trim_end_matches('/');
        let response = self
            .http_client
            .get(url)
            .query(&[("f", "json"), ("token", token.as_str())])
            .send()
            .await?;
        let info: LayerInfo = self.handle_response(response).await?;
        Ok(info.fields)
    }

    // ── Edits ─────────────────────────────────────────────────────────

    /// Add features to a layer, in chunks. Fails on the first rejected
    /// edit.
    pub async fn add_features(
        &self,
        layer_url: &str,
        features: &[Feature],
    ) -> FeatureServiceResult<EditOutcome> {
        self.apply_edits(layer_url, features, EditKind::Add).await
    }

    /// Update existing features (attributes must carry the object id).
    /// Fails on the first rejected edit.
    pub async fn update_features(
        &self,
        layer_url: &str,
        features: &[Feature],
    ) -> FeatureServiceResult<EditOutcome> {
        self.apply_edits(layer_url, features, EditKind::Update).await
    }

    async fn apply_edits(
        &self,
        layer_url: &str,
        features: &[Feature],
        kind: EditKind,
    ) -> FeatureServiceResult<EditOutcome> {
        let mut outcome = EditOutcome::default();
        if features.is_empty() {
            return Ok(outcome);
        }

        let url = format!("{}/applyEdits", layer_url.trim_end_matches('/'));
        for chunk in features.chunks(APPLY_EDITS_CHUNK) {
            let payload = serde_json::to_string(chunk)
                .map_err(|e| FeatureServiceError::Parse(format!("failed to encode edits: {e}")))?;
            let token = self.auth.get_token().await?;

            debug!(url = %url, count = chunk.len(), kind = kind.param(), "applying edits");
            let response = self
                .http_client
                .post(&url)
                .form(&[
                    ("f", "json"),
                    (kind.param(), payload.as_str()),
                    ("token", token.as_str()),
                ])
                .send()
                .await?;

            let parsed: ApplyEditsResponse = self.handle_response(response).await?;
            let results = match kind {
                EditKind::Add => parsed.add_results,
                EditKind::Update => parsed.update_results,
            };
            check_edit_results(&results, chunk)?;
            match kind {
                EditKind::Add => outcome.added += results.len(),
                EditKind::Update => outcome.updated += results.len(),
            }
        }

        Ok(outcome)
    }

    // ── Response handling ─────────────────────────────────────────────

    /// Map HTTP status, then the tunneled error envelope, then parse the
    /// expected body shape.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> FeatureServiceResult<T> {
        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return match status {
                StatusCode::TOO_MANY_REQUESTS => Err(FeatureServiceError::RateLimited {
                    retry_after_secs: retry_after,
                }),
                _ => Err(FeatureServiceError::Api {
                    status: status.as_u16(),
                    message: if body.is_empty() {
                        format!("HTTP {status}")
                    } else {
                        body
                    },
                }),
            };
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| FeatureServiceError::Parse(format!("failed to parse response: {e}")))?;

        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("<no message>")
                .to_string();
            if INVALID_TOKEN_CODES.contains(&code) {
                // Stale token; drop it so the next attempt regenerates.
                warn!(code, "token rejected by the feature service");
                self.auth.invalidate_cache().await;
                return Err(FeatureServiceError::Auth(format!(
                    "invalid token (code {code}): {message}"
                )));
            }
            return Err(FeatureServiceError::Service { code, message });
        }

        serde_json::from_value(value)
            .map_err(|e| FeatureServiceError::Parse(format!("unexpected response shape: {e}")))
    }
}

#[derive(Debug, Clone, Copy)]
enum EditKind {
    Add,
    Update,
}

impl EditKind {
    fn param(self) -> &'static str {
        match self {
            EditKind::Add => "adds",
            EditKind::Update => "updates",
        }
    }
}

/// Fail on the first unsuccessful per-edit result, naming the feature
/// by its object id when the service reports one.
fn check_edit_results(results: &[EditResult], chunk: &[Feature]) -> FeatureServiceResult<()> {
    for (i, result) in results.iter().enumerate() {
        if result.success {
            continue;
        }
        let key = result
            .object_id
            .map(|id| id.to_string())
            .or_else(|| {
                chunk.get(i).and_then(|f| {
                    f.attributes
                        .get("OBJECTID")
                        .or_else(|| f.attributes.get("objectid"))
                        .map(Value::to_string)
                })
            })
            .unwrap_or_else(|| format!("#{i}"));
        let message = result
            .error
            .as_ref()
            .map(|e| e.description.clone())
            .unwrap_or_else(|| "edit failed without detail".to_string());
        return Err(FeatureServiceError::EditRejected { key, message });
    }
    Ok(())
}
