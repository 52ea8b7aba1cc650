//! Response Exporter: survey responses → spreadsheet tabs.
//!
//! Queries every submitted response, appends the unseen ones to the
//! aggregate tab and to the tab named after the response's health
//! district (created on demand), then refreshes the contacts tab from
//! response content. Deduplication is by response id against the ids
//! already present in the aggregate tab.

use crate::error::JobResult;
use crate::summary::RunSummary;
use serde_json::Value;
use skidway_core::config::ExportConfig;
use skidway_core::record::cell_to_string;
use skidway_core::transform::{number_comment_aliases, sanitize_field_name};
use skidway_core::RetryPolicy;
use skidway_features::{Feature, FeatureServiceClient};
use skidway_sheets::SheetsClient;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

/// Per-run exporter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCounts {
    pub fetched: u64,
    pub appended: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub contacts_updated: u64,
}

/// Response columns in layer order with display headers.
struct ResponseLayout {
    /// Attribute names in column order.
    columns: Vec<String>,
    /// Display headers (numbered aliases) in the same order.
    header: Vec<Value>,
    /// Display header of the response-id column.
    id_header: String,
}

/// The Response Exporter job.
pub struct Exporter {
    sheets: SheetsClient,
    features: FeatureServiceClient,
    config: ExportConfig,
    retry: RetryPolicy,
}

impl Exporter {
    #[must_use]
    pub fn new(sheets: SheetsClient, features: FeatureServiceClient, config: ExportConfig) -> Self {
        Self {
            sheets,
            features,
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (tests use a zero-delay policy).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the export.
    pub async fn run(&self) -> JobResult<RunSummary> {
        let mut summary = RunSummary::start("export");
        let mut counts = ExportCounts::default();

        let layout = self.response_layout().await?;
        let responses = self
            .retry
            .execute("query survey responses", || {
                self.features.query(&self.config.responses_layer_url, "1=1")
            })
            .await?;
        counts.fetched = responses.len() as u64;
        info!(fetched = counts.fetched, "survey responses queried");

        let mut seen = self.seen_response_ids(&layout).await?;

        let mut aggregate_rows: Vec<Vec<Value>> = Vec::new();
        let mut per_lhd: BTreeMap<String, Vec<Vec<Value>>> = BTreeMap::new();
        for response in &responses {
            let Some(id) = attribute_text(response, &self.config.response_id_field) else {
                warn!("skipping response without an id");
                counts.skipped += 1;
                continue;
            };
            let Some(lhd) = attribute_text(response, &self.config.lhd_field) else {
                warn!(response_id = %id, "skipping response without a health district");
                counts.skipped += 1;
                continue;
            };
            if !seen.insert(id.clone()) {
                counts.duplicates += 1;
                continue;
            }

            let row: Vec<Value> = layout
                .columns
                .iter()
                .map(|name| cell_for_sheet(response.attributes.get(name)))
                .collect();
            aggregate_rows.push(row.clone());
            per_lhd.entry(lhd).or_default().push(row);
        }

        counts.appended = aggregate_rows.len() as u64;
        let aggregate_tab = self.config.aggregate_tab.clone();
        self.retry
            .execute("append aggregate rows", || {
                self.sheets.append_rows(&aggregate_tab, &aggregate_rows)
            })
            .await?;

        for (lhd, rows) in &per_lhd {
            let created = self
                .retry
                .execute("ensure district tab", || self.sheets.ensure_tab(lhd))
                .await?;
            if created {
                self.retry
                    .execute("write district header", || {
                        self.sheets
                            .append_rows(lhd, std::slice::from_ref(&layout.header))
                    })
                    .await?;
            }
            self.retry
                .execute("append district rows", || self.sheets.append_rows(lhd, rows))
                .await?;
        }

        counts.contacts_updated = self.update_contacts(&responses).await?;

        info!(
            fetched = counts.fetched,
            appended = counts.appended,
            duplicates = counts.duplicates,
            skipped = counts.skipped,
            contacts_updated = counts.contacts_updated,
            "export complete"
        );
        summary
            .counter("responses fetched", counts.fetched)
            .counter("appended", counts.appended)
            .counter("duplicates skipped", counts.duplicates)
            .counter("malformed skipped", counts.skipped)
            .counter("contacts updated", counts.contacts_updated);
        Ok(summary.finish())
    }

    /// Build the column order and display headers from the response
    /// layer's schema.
    async fn response_layout(&self) -> JobResult<ResponseLayout> {
        let fields = self
            .retry
            .execute("read response layer schema", || {
                self.features.layer_fields(&self.config.responses_layer_url)
            })
            .await?;

        let pairs: Vec<(String, String)> = fields
            .iter()
            .map(|f| {
                let alias = if f.alias.is_empty() {
                    f.name.clone()
                } else {
                    f.alias.clone()
                };
                (f.name.clone(), alias)
            })
            .collect();
        let numbered = number_comment_aliases(&pairs);

        let id_header = numbered
            .iter()
            .find(|(name, _)| name == &self.config.response_id_field)
            .map(|(_, alias)| alias.clone())
            .unwrap_or_else(|| self.config.response_id_field.clone());

        Ok(ResponseLayout {
            columns: numbered.iter().map(|(name, _)| name.clone()).collect(),
            header: numbered
                .into_iter()
                .map(|(_, alias)| Value::String(alias))
                .collect(),
            id_header,
        })
    }

    /// Response ids already present in the aggregate tab. Writes the
    /// header row when the tab is still blank.
    async fn seen_response_ids(&self, layout: &ResponseLayout) -> JobResult<HashSet<String>> {
        let aggregate_tab = self.config.aggregate_tab.clone();
        let existing = self
            .retry
            .execute("read aggregate tab", || {
                self.sheets.read_tab(&aggregate_tab)
            })
            .await?;

        let mut seen = HashSet::new();
        if existing.header().is_empty() {
            self.retry
                .execute("write aggregate header", || {
                    self.sheets
                        .append_rows(&aggregate_tab, std::slice::from_ref(&layout.header))
                })
                .await?;
            return Ok(seen);
        }

        for i in 0..existing.len() {
            if let Some(id) = existing.text(i, &layout.id_header) {
                seen.insert(id);
            }
        }
        Ok(seen)
    }

    /// Refresh the contacts tab from response content: rows matching an
    /// existing key are overwritten in place, new keys are appended.
    async fn update_contacts(&self, responses: &[Feature]) -> JobResult<u64> {
        let config = &self.config;
        if config.contact_fields.is_empty() {
            return Ok(0);
        }

        let contacts_tab = config.contacts_tab.clone();
        let tab = self
            .retry
            .execute("read contacts tab", || self.sheets.read_tab(&contacts_tab))
            .await?;
        if tab.header().is_empty() {
            warn!(tab = %contacts_tab, "contacts tab has no header; skipping contact updates");
            return Ok(0);
        }

        // Tab headers match response attributes through sanitization.
        let sanitized: Vec<String> = tab
            .header()
            .iter()
            .map(|h| sanitize_field_name(h))
            .collect();
        let Some(key_col) = sanitized.iter().position(|s| s == &config.contact_key_field)
        else {
            warn!(
                tab = %contacts_tab,
                key = %config.contact_key_field,
                "contacts tab has no key column; skipping contact updates"
            );
            return Ok(0);
        };

        let mut row_for_key: HashMap<String, usize> = HashMap::new();
        for i in 0..tab.len() {
            if let Some(key) = tab.rows()[i].get(key_col).and_then(cell_to_string) {
                row_for_key.insert(key, i);
            }
        }

        // Responses are ordered by submission; keeping only the last one
        // per key gives last-response-wins for both arms below.
        let mut latest: BTreeMap<String, &Feature> = BTreeMap::new();
        for response in responses {
            if let Some(key) = attribute_text(response, &config.contact_key_field) {
                latest.insert(key, response);
            }
        }

        let mut updated = 0u64;
        let mut appended: Vec<Vec<Value>> = Vec::new();
        for (key, response) in &latest {
            match row_for_key.get(key) {
                Some(&row_index) => {
                    // Replace only the contact columns; everything else in
                    // the row keeps its current value.
                    let mut row = tab.rows()[row_index].clone();
                    row.resize(sanitized.len(), Value::String(String::new()));
                    for (col, name) in sanitized.iter().enumerate() {
                        if config.contact_fields.iter().any(|f| f == name) {
                            row[col] = cell_for_sheet(response.attributes.get(name));
                        }
                    }
                    // Data rows start at sheet row 2.
                    let range = format!("'{}'!A{}", contacts_tab, row_index + 2);
                    self.retry
                        .execute("overwrite contact row", || {
                            self.sheets
                                .overwrite_range(&range, std::slice::from_ref(&row))
                        })
                        .await?;
                    updated += 1;
                }
                None => {
                    let row: Vec<Value> = sanitized
                        .iter()
                        .enumerate()
                        .map(|(col, name)| {
                            if col == key_col {
                                Value::String(key.clone())
                            } else if config.contact_fields.iter().any(|f| f == name) {
                                cell_for_sheet(response.attributes.get(name))
                            } else {
                                Value::String(String::new())
                            }
                        })
                        .collect();
                    appended.push(row);
                    updated += 1;
                }
            }
        }

        self.retry
            .execute("append new contact rows", || {
                self.sheets.append_rows(&contacts_tab, &appended)
            })
            .await?;
        Ok(updated)
    }
}

/// Non-blank string form of a response attribute.
fn attribute_text(feature: &Feature, name: &str) -> Option<String> {
    feature.attributes.get(name).and_then(cell_to_string)
}

/// Render an attribute for a sheet cell; absent and null become the
/// empty string so columns stay aligned.
fn cell_for_sheet(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Null) | None => Value::String(String::new()),
        Some(v) => v.clone(),
    }
}
