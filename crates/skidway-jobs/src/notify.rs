//! Summary email via the SendGrid v3 API.

use crate::error::{JobError, JobResult};
use crate::summary::RunSummary;
use serde_json::json;
use skidway_core::config::NotifyConfig;
use tracing::info;

/// Sends run summaries by email.
pub struct Notifier {
    config: NotifyConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("config", &self.config)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Notifier {
    #[must_use]
    pub fn new(config: NotifyConfig, api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            config,
            api_key,
            http_client,
        }
    }

    /// Send the summary to every configured recipient.
    ///
    /// Callers treat a returned error as log-and-continue; a failed
    /// notification never fails the run it describes.
    pub async fn send(&self, summary: &RunSummary) -> JobResult<()> {
        let url = format!(
            "{}/v3/mail/send",
            self.config.api_url.trim_end_matches('/')
        );
        let to: Vec<_> = self
            .config
            .to_addresses
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();
        let subject = format!("{} {} run summary", self.config.subject_prefix, summary.job);
        let body = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.config.from_address },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": summary.render_text() }]
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Notify(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(JobError::Notify(format!(
                "mail endpoint returned {status}: {detail}"
            )));
        }

        info!(
            job = %summary.job,
            recipients = self.config.to_addresses.len(),
            "summary email sent"
        );
        Ok(())
    }
}
