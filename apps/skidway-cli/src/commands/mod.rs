//! Subcommand implementations and shared job plumbing.

pub mod export;
pub mod import;

use crate::error::CliResult;
use skidway_core::{Secrets, SkidConfig};
use skidway_features::{FeatureServiceClient, PortalAuth, PortalToken};
use skidway_jobs::{Notifier, RunSummary};
use skidway_sheets::{SheetsAuth, SheetsClient, SheetsCredentials};
use std::path::Path;
use tracing::{error, info};

/// Everything a job needs, built from config and secrets files.
pub struct JobContext {
    pub config: SkidConfig,
    pub sheets: SheetsClient,
    pub features: FeatureServiceClient,
    notifier: Option<Notifier>,
}

impl JobContext {
    /// Load configuration and secrets and construct the clients.
    pub fn build(config_path: &Path, secrets_path: &Path) -> CliResult<Self> {
        let config = SkidConfig::load(config_path)?;
        let secrets = Secrets::discover(secrets_path)?;

        let http_client = reqwest::Client::new();
        let sheets_auth = SheetsAuth::new(
            SheetsCredentials::ServiceAccount {
                key: secrets.service_account.clone(),
            },
            http_client.clone(),
        );
        let sheets = SheetsClient::new(
            secrets.spreadsheet_id.clone(),
            sheets_auth,
            http_client.clone(),
        );

        let portal_auth = PortalAuth::new(
            PortalToken::Portal {
                credentials: secrets.portal.clone(),
            },
            http_client.clone(),
        );
        let features = FeatureServiceClient::new(portal_auth, http_client.clone());

        let notifier = match (&config.notify, &secrets.sendgrid_api_key) {
            (Some(notify), Some(api_key)) => Some(Notifier::new(
                notify.clone(),
                api_key.clone(),
                http_client,
            )),
            _ => None,
        };

        Ok(Self {
            config,
            sheets,
            features,
            notifier,
        })
    }

    /// Log the run summary and email it when notification is configured.
    ///
    /// A failed notification is logged, never fatal.
    pub async fn report(&self, summary: &RunSummary) {
        info!(
            job = %summary.job,
            run_id = %summary.run_id,
            duration_secs = summary.duration().num_seconds(),
            "run finished"
        );
        for (name, value) in &summary.counters {
            info!("  {name}: {value}");
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(summary).await {
                error!(error = %e, "failed to send summary email");
            }
        }
    }
}
