//! Run configuration for the skidway jobs.
//!
//! A single TOML file describes both jobs: which tabs to read and write,
//! which feature layers to touch, which fields are required, and how
//! headers are renamed on the way into the feature service. Credentials
//! never live here; see [`crate::secrets`].

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Top-level run configuration, one section per job plus notification
/// settings shared by both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkidConfig {
    /// Human-readable name used in logs and summary emails.
    #[serde(default = "default_skid_name")]
    pub skid_name: String,

    /// Sheet Importer settings.
    pub import: ImportConfig,

    /// Response Exporter settings.
    pub export: ExportConfig,

    /// Summary email settings. Absent means no notification.
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

fn default_skid_name() -> String {
    "skidway".to_string()
}

/// Sheet Importer configuration (spreadsheet → feature service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Tab holding location rows.
    pub locations_tab: String,

    /// Tab holding contact rows.
    pub contacts_tab: String,

    /// Key column (post-rename field name) used for upserts.
    pub key_field: String,

    /// REST endpoint of the locations feature layer.
    pub locations_layer_url: String,

    /// REST endpoint of the contacts hosted table.
    pub contacts_table_url: String,

    /// Columns (pre-rename header names) that must be non-blank for a
    /// row to be imported.
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Header renames applied after sanitization, keyed by the sanitized
    /// name.
    #[serde(default)]
    pub renames: BTreeMap<String, String>,

    /// Columns (post-rename field names) excluded from the feature
    /// service.
    #[serde(default)]
    pub drop_fields: BTreeSet<String>,

    /// Field receiving the derived Local Health District value.
    #[serde(default = "default_lhd_field")]
    pub lhd_field: String,

    /// Source column holding the county name.
    #[serde(default = "default_county_field")]
    pub county_field: String,

    /// Source column holding the longitude in degrees.
    #[serde(default = "default_longitude_field")]
    pub longitude_field: String,

    /// Source column holding the latitude in degrees.
    #[serde(default = "default_latitude_field")]
    pub latitude_field: String,

    /// Fields coerced to floats on the way in.
    #[serde(default)]
    pub float_fields: Vec<String>,

    /// Fields coerced to nullable integers on the way in.
    #[serde(default)]
    pub int_fields: Vec<String>,
}

fn default_lhd_field() -> String {
    "lhd".to_string()
}

fn default_county_field() -> String {
    "County".to_string()
}

fn default_longitude_field() -> String {
    "Longitude".to_string()
}

fn default_latitude_field() -> String {
    "Latitude".to_string()
}

/// Response Exporter configuration (feature service → spreadsheet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// REST endpoint of the survey response layer.
    pub responses_layer_url: String,

    /// Tab receiving every response.
    pub aggregate_tab: String,

    /// Tab receiving contact updates extracted from responses.
    pub contacts_tab: String,

    /// Response attribute holding the stable response identifier.
    #[serde(default = "default_response_id_field")]
    pub response_id_field: String,

    /// Response attribute naming the responding organization (LHD).
    #[serde(default = "default_lhd_field")]
    pub lhd_field: String,

    /// Response attribute keying contact rows (site identifier).
    pub contact_key_field: String,

    /// Response attributes copied into the contacts tab, in column order.
    #[serde(default)]
    pub contact_fields: Vec<String>,
}

fn default_response_id_field() -> String {
    "globalid".to_string()
}

/// Summary email settings (SendGrid v3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Sender address.
    pub from_address: String,

    /// Recipient addresses.
    pub to_addresses: Vec<String>,

    /// Subject prefix, e.g. `"skidway on my-project: "`.
    #[serde(default)]
    pub subject_prefix: String,

    /// SendGrid API base URL; overridable for tests.
    #[serde(default = "default_sendgrid_url")]
    pub api_url: String,
}

fn default_sendgrid_url() -> String {
    "https://api.sendgrid.com".to_string()
}

impl SkidConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SkidConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints the type system can't express.
    pub fn validate(&self) -> CoreResult<()> {
        if self.import.locations_tab.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "import.locations_tab must not be empty".to_string(),
            ));
        }
        if self.import.contacts_tab.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "import.contacts_tab must not be empty".to_string(),
            ));
        }
        if self.import.key_field.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "import.key_field must not be empty".to_string(),
            ));
        }
        for (label, url) in [
            ("import.locations_layer_url", &self.import.locations_layer_url),
            ("import.contacts_table_url", &self.import.contacts_table_url),
            ("export.responses_layer_url", &self.export.responses_layer_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(CoreError::InvalidConfig(format!(
                    "{label} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if self.export.contact_key_field.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "export.contact_key_field must not be empty".to_string(),
            ));
        }
        if let Some(notify) = &self.notify {
            if notify.to_addresses.is_empty() {
                return Err(CoreError::InvalidConfig(
                    "notify.to_addresses must not be empty when [notify] is set".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
            skid_name = "uocc-skid"

            [import]
            locations_tab = "UOCCs"
            contacts_tab = "UOCC Contacts"
            key_field = "ID_"
            locations_layer_url = "https://services.example.com/arcgis/rest/services/uocc/FeatureServer/0"
            contacts_table_url = "https://services.example.com/arcgis/rest/services/uocc/FeatureServer/1"
            required_fields = ["ID", "Name"]
            float_fields = ["Latitude", "Longitude"]
            int_fields = ["Zip_Code"]

            [import.renames]
            Longitude_ = "Longitude"

            [export]
            responses_layer_url = "https://services.example.com/arcgis/rest/services/survey/FeatureServer/0"
            aggregate_tab = "All Responses"
            contacts_tab = "Contacts"
            contact_key_field = "site_id"
            contact_fields = ["site_id", "contact_name", "contact_email"]
        "#
        .to_string()
    }

    #[test]
    fn parses_minimal_config() {
        let config: SkidConfig = toml::from_str(&minimal_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.skid_name, "uocc-skid");
        assert_eq!(config.import.lhd_field, "lhd");
        assert_eq!(config.export.response_id_field, "globalid");
        assert_eq!(
            config.import.renames.get("Longitude_").map(String::as_str),
            Some("Longitude")
        );
        assert!(config.notify.is_none());
    }

    #[test]
    fn rejects_non_http_layer_url() {
        let raw = minimal_toml().replace(
            "https://services.example.com/arcgis/rest/services/uocc/FeatureServer/0",
            "ftp://example.com/layer",
        );
        let config: SkidConfig = toml::from_str(&raw).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_empty_notify_recipients() {
        let raw = format!(
            "{}\n[notify]\nfrom_address = \"noreply@example.com\"\nto_addresses = []\n",
            minimal_toml()
        );
        let config: SkidConfig = toml::from_str(&raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skidway.toml");
        std::fs::write(&path, minimal_toml()).unwrap();
        let config = SkidConfig::load(&path).unwrap();
        assert_eq!(config.import.locations_tab, "UOCCs");
    }
}
