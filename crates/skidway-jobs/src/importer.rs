//! Sheet Importer: spreadsheet tabs → feature service, upsert by key.
//!
//! Reads the locations and contacts tabs, validates and transforms each
//! row, then mirrors the rows into the hosted layer and table. Existing
//! records (matched by key) are updated in place; new keys are added.
//! Malformed rows are logged and skipped, never written.

use crate::error::JobResult;
use crate::summary::RunSummary;
use serde_json::{Map, Value};
use skidway_core::config::ImportConfig;
use skidway_core::record::{cell_to_f64, cell_to_i64, cell_to_string, RowSet};
use skidway_core::transform::{lhd_for_county, map_headers, sanitize_field_name};
use skidway_core::RetryPolicy;
use skidway_features::geometry::PointGeometry;
use skidway_features::{Feature, FeatureServiceClient};
use skidway_sheets::SheetsClient;
use std::collections::HashMap;
use tracing::{info, warn};

/// Object-id field type in layer metadata.
const OID_FIELD_TYPE: &str = "esriFieldTypeOID";

/// Per-run importer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub rows_read: u64,
    pub skipped: u64,
    pub added: u64,
    pub updated: u64,
}

/// A validated row staged for upsert.
struct StagedRow {
    key: String,
    feature: Feature,
}

/// The Sheet Importer job.
pub struct Importer {
    sheets: SheetsClient,
    features: FeatureServiceClient,
    config: ImportConfig,
    retry: RetryPolicy,
}

impl Importer {
    #[must_use]
    pub fn new(sheets: SheetsClient, features: FeatureServiceClient, config: ImportConfig) -> Self {
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

    /// Run the import: locations tab into the feature layer, contacts
    /// tab into the hosted table.
    pub async fn run(&self) -> JobResult<RunSummary> {
        let mut summary = RunSummary::start("import");
        let mut counts = ImportCounts::default();

        let locations_tab = self.config.locations_tab.clone();
        let locations = self
            .retry
            .execute("read locations tab", || {
                self.sheets.read_tab(&locations_tab)
            })
            .await?;
        info!(tab = %locations_tab, rows = locations.len(), "locations tab read");
        self.upsert_tab(
            &locations,
            &self.config.locations_layer_url,
            true,
            &mut counts,
        )
        .await?;

        let contacts_tab = self.config.contacts_tab.clone();
        let contacts = self
            .retry
            .execute("read contacts tab", || self.sheets.read_tab(&contacts_tab))
            .await?;
        info!(tab = %contacts_tab, rows = contacts.len(), "contacts tab read");
        self.upsert_tab(
            &contacts,
            &self.config.contacts_table_url,
            false,
            &mut counts,
        )
        .await?;

        info!(
            rows_read = counts.rows_read,
            skipped = counts.skipped,
            added = counts.added,
            updated = counts.updated,
            "import complete"
        );
        summary
            .counter("rows read", counts.rows_read)
            .counter("skipped", counts.skipped)
            .counter("added", counts.added)
            .counter("updated", counts.updated);
        Ok(summary.finish())
    }

    /// Validate, transform, and upsert one tab into one layer or table.
    async fn upsert_tab(
        &self,
        rows: &RowSet,
        layer_url: &str,
        with_geometry: bool,
        counts: &mut ImportCounts,
    ) -> JobResult<()> {
        if rows.is_empty() {
            warn!(layer_url, "tab has no data rows; nothing to upsert");
            return Ok(());
        }

        let staged = self.stage_rows(rows, with_geometry, counts);
        let key_field = self.resolved_key_field();

        let (oid_field, existing) = self.existing_keys(layer_url, &key_field).await?;

        let mut adds = Vec::new();
        let mut updates = Vec::new();
        for row in staged {
            match existing.get(&row.key) {
                Some(oid) => {
                    let mut feature = row.feature;
                    feature
                        .attributes
                        .insert(oid_field.clone(), Value::from(*oid));
                    updates.push(feature);
                }
                None => adds.push(row.feature),
            }
        }

        let added = self
            .retry
            .execute("add features", || {
                self.features.add_features(layer_url, &adds)
            })
            .await?;
        let updated = self
            .retry
            .execute("update features", || {
                self.features.update_features(layer_url, &updates)
            })
            .await?;
        counts.added += added.added as u64;
        counts.updated += updated.updated as u64;
        Ok(())
    }

    /// Turn sheet rows into features, skipping and logging malformed
    /// ones.
    fn stage_rows(
        &self,
        rows: &RowSet,
        with_geometry: bool,
        counts: &mut ImportCounts,
    ) -> Vec<StagedRow> {
        let config = &self.config;
        let field_names = map_headers(rows.header(), &config.renames, &config.drop_fields);
        let key_field = self.resolved_key_field();
        let mut staged: Vec<StagedRow> = Vec::with_capacity(rows.len());
        let mut index_for_key: HashMap<String, usize> = HashMap::new();

        for i in 0..rows.len() {
            counts.rows_read += 1;
            // Sheet row numbers are 1-based and include the header.
            let sheet_row = i + 2;

            if let Some(missing) = config
                .required_fields
                .iter()
                .find(|field| rows.text(i, field).is_none())
            {
                warn!(
                    row = sheet_row,
                    field = %missing,
                    "skipping row with missing required field"
                );
                counts.skipped += 1;
                continue;
            }

            let geometry = if with_geometry {
                let lon = rows.cell(i, &config.longitude_field).and_then(cell_to_f64);
                let lat = rows.cell(i, &config.latitude_field).and_then(cell_to_f64);
                match (lon, lat) {
                    (Some(lon), Some(lat)) => Some(PointGeometry::from_lon_lat(lon, lat)),
                    _ => {
                        warn!(row = sheet_row, "skipping row with missing coordinates");
                        counts.skipped += 1;
                        continue;
                    }
                }
            } else {
                None
            };

            let mut attributes = Map::new();
            let cells = &rows.rows()[i];
            for (col, name) in field_names.iter().enumerate() {
                let Some(name) = name else { continue };
                let cell = cells.get(col).unwrap_or(&Value::Null);
                let value = if config.float_fields.iter().any(|f| f == name) {
                    cell_to_f64(cell).map(Value::from).unwrap_or(Value::Null)
                } else if config.int_fields.iter().any(|f| f == name) {
                    cell_to_i64(cell).map(Value::from).unwrap_or(Value::Null)
                } else {
                    cell_to_string(cell)
                        .map(Value::String)
                        .unwrap_or(Value::Null)
                };
                attributes.insert(name.clone(), value);
            }

            if let Some(county) = rows.text(i, &config.county_field) {
                let lhd = match lhd_for_county(&county) {
                    Some(lhd) => lhd.to_string(),
                    None => {
                        warn!(
                            row = sheet_row,
                            county = %county,
                            "county has no known health district; passing through"
                        );
                        county
                    }
                };
                attributes.insert(config.lhd_field.clone(), Value::String(lhd));
            }

            let Some(key) = attributes.get(&key_field).and_then(cell_to_string) else {
                warn!(row = sheet_row, "skipping row with blank key");
                counts.skipped += 1;
                continue;
            };

            let row = StagedRow {
                key,
                feature: Feature {
                    attributes,
                    geometry,
                },
            };
            // A key can only hold one record; the later sheet row wins.
            match index_for_key.get(&row.key) {
                Some(&existing) => {
                    warn!(
                        row = sheet_row,
                        key = %row.key,
                        "duplicate key in sheet; keeping the later row"
                    );
                    counts.skipped += 1;
                    staged[existing] = row;
                }
                None => {
                    index_for_key.insert(row.key.clone(), staged.len());
                    staged.push(row);
                }
            }
        }

        staged
    }

    /// Key field name after sanitization and renames, as stored in the
    /// feature service.
    fn resolved_key_field(&self) -> String {
        let sanitized = sanitize_field_name(&self.config.key_field);
        self.config
            .renames
            .get(&sanitized)
            .cloned()
            .unwrap_or(sanitized)
    }

    /// Map existing feature keys to object ids, resolving the layer's
    /// object-id field from its schema.
    async fn existing_keys(
        &self,
        layer_url: &str,
        key_field: &str,
    ) -> JobResult<(String, HashMap<String, i64>)> {
        let fields = self
            .retry
            .execute("read layer schema", || {
                self.features.layer_fields(layer_url)
            })
            .await?;
        let oid_field = fields
            .iter()
            .find(|f| f.field_type == OID_FIELD_TYPE)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "objectid".to_string());

        let features = self
            .retry
            .execute("query existing features", || {
                self.features.query(layer_url, "1=1")
            })
            .await?;

        let mut existing = HashMap::with_capacity(features.len());
        for feature in features {
            let key = feature.attributes.get(key_field).and_then(cell_to_string);
            let oid = feature.attributes.get(&oid_field).and_then(Value::as_i64);
            if let (Some(key), Some(oid)) = (key, oid) {
                existing.insert(key, oid);
            }
        }
        Ok((oid_field, existing))
    }
}
