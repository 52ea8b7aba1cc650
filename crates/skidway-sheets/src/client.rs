//! Sheets v4 HTTP client (reqwest-based).
//!
//! Thin typed wrappers over the handful of spreadsheet endpoints the
//! jobs use. Ranges are addressed by quoted tab title so tab names with
//! spaces round-trip correctly.

use crate::auth::SheetsAuth;
use crate::error::{SheetsError, SheetsResult};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skidway_core::record::RowSet;
use tracing::debug;

/// Production API endpoint.
const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

/// `values.get` response.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Body for `values.append` and `values.update`.
#[derive(Debug, Serialize)]
struct WriteValues<'a> {
    values: &'a [Vec<Value>],
}

/// `spreadsheets.get` response, trimmed to tab titles.
#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Sheets API client for one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    base_url: String,
    spreadsheet_id: String,
    auth: SheetsAuth,
    http_client: Client,
}

impl SheetsClient {
    /// Create a client for the given spreadsheet.
    #[must_use]
    pub fn new(spreadsheet_id: String, auth: SheetsAuth, http_client: Client) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            spreadsheet_id,
            auth,
            http_client,
        }
    }

    /// Create a client pointed at a non-default endpoint (for testing).
    #[must_use]
    pub fn with_base_url(
        base_url: String,
        spreadsheet_id: String,
        auth: SheetsAuth,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            spreadsheet_id,
            auth,
            http_client,
        }
    }

    /// The spreadsheet this client addresses.
    #[must_use]
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    // ── Read ──────────────────────────────────────────────────────────

    /// Read a whole tab into a [`RowSet`] (first row is the header).
    pub async fn read_tab(&self, tab: &str) -> SheetsResult<RowSet> {
        let values = self.read_range(&quote_tab(tab)).await?;
        Ok(RowSet::from_values(values))
    }

    /// Read an arbitrary A1 range as raw values.
    pub async fn read_range(&self, range: &str) -> SheetsResult<Vec<Vec<Value>>> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        );
        let response: ValueRange = self.get(&url).await?;
        Ok(response.values)
    }

    // ── Write ─────────────────────────────────────────────────────────

    /// Append rows after the last data row of a tab (`values.append`,
    /// RAW input).
    pub async fn append_rows(&self, tab: &str, rows: &[Vec<Value>]) -> SheetsResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:append?valueInputOption=RAW",
            self.base_url,
            self.spreadsheet_id,
            quote_tab(tab)
        );
        let _ignored: Value = self.post(&url, &WriteValues { values: rows }).await?;
        Ok(())
    }

    /// Overwrite a range with the given values (`values.update`, RAW).
    pub async fn overwrite_range(&self, range: &str, rows: &[Vec<Value>]) -> SheetsResult<()> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}?valueInputOption=RAW",
            self.base_url, self.spreadsheet_id, range
        );
        let _ignored: Value = self.put(&url, &WriteValues { values: rows }).await?;
        Ok(())
    }

    /// Clear a range (`values.clear`).
    pub async fn clear_range(&self, range: &str) -> SheetsResult<()> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}:clear",
            self.base_url, self.spreadsheet_id, range
        );
        let _ignored: Value = self.post(&url, &serde_json::json!({})).await?;
        Ok(())
    }

    // ── Tabs ──────────────────────────────────────────────────────────

    /// Titles of all tabs in the spreadsheet.
    pub async fn list_tabs(&self) -> SheetsResult<Vec<String>> {
        let url = format!(
            "{}/v4/spreadsheets/{}?fields=sheets.properties.title",
            self.base_url, self.spreadsheet_id
        );
        let meta: SpreadsheetMeta = self.get(&url).await?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    /// Create a tab with the given title if it does not already exist.
    ///
    /// Returns `true` when a new tab was created.
    pub async fn ensure_tab(&self, title: &str) -> SheetsResult<bool> {
        let existing = self.list_tabs().await?;
        if existing.iter().any(|t| t == title) {
            return Ok(false);
        }
        debug!(tab = title, "creating missing tab");
        let url = format!(
            "{}/v4/spreadsheets/{}:batchUpdate",
            self.base_url, self.spreadsheet_id
        );
        let body = serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        let _ignored: Value = self.post(&url, &body).await?;
        Ok(true)
    }

    // ── Internal HTTP methods ─────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: &str) -> SheetsResult<T> {
        debug!("sheets GET {}", url);
        let builder = self.http_client.get(url);
        let builder = self.auth.apply(builder).await?;
        let response = builder.send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> SheetsResult<T> {
        debug!("sheets POST {}", url);
        let builder = self.http_client.post(url);
        let builder = self.auth.apply(builder).await?;
        let response = builder.json(body).send().await?;
        self.handle_response(response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> SheetsResult<T> {
        debug!("sheets PUT {}", url);
        let builder = self.http_client.put(url);
        let builder = self.auth.apply(builder).await?;
        let response = builder.json(body).send().await?;
        self.handle_response(response).await
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> SheetsResult<T> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|e| SheetsError::Parse(format!("failed to parse response: {e}")));
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::NOT_FOUND => Err(SheetsError::NotFound(body)),
            StatusCode::TOO_MANY_REQUESTS => Err(SheetsError::RateLimited {
                retry_after_secs: retry_after,
            }),
            StatusCode::UNAUTHORIZED => {
                // Drop the cached token so the next attempt re-exchanges.
                self.auth.invalidate_cache().await;
                Err(SheetsError::Auth(format!(
                    "authentication failed (401): {body}"
                )))
            }
            _ => Err(SheetsError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            }),
        }
    }
}

/// Quote a tab title for use as an A1 range (`'Tab Name'`), doubling
/// embedded single quotes.
fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}
