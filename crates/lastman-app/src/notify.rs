// Submission notifications.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use lastman_core::gate::PredictionSummary;

use crate::config::Config;

pub const SUBJECT: &str = "Prediction Submitted";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_submission(&self, email: &str, summary: &PredictionSummary) -> Result<()>;
}

/// Writes the notification to the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_submission(&self, email: &str, summary: &PredictionSummary) -> Result<()> {
        info!(
            "Prediction notification for {}: round {}: {}",
            email,
            summary.round_number,
            summary.describe()
        );
        Ok(())
    }
}

/// Posts `{from, to, bcc, subject, html}` to an email API with a bearer key.
pub struct HttpNotifier {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    bcc: Vec<String>,
}

impl HttpNotifier {
    pub fn new(endpoint: String, api_key: String, from: String, bcc: Vec<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            from,
            bcc,
        })
    }
}

pub fn email_body(summary: &PredictionSummary) -> String {
    format!(
        "<p>Your round {} prediction has been received.</p><p><strong>{}</strong></p>",
        summary.round_number,
        summary.describe()
    )
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify_submission(&self, email: &str, summary: &PredictionSummary) -> Result<()> {
        let body = serde_json::json!({
            "from": self.from,
            "to": [email],
            "bcc": self.bcc,
            "subject": SUBJECT,
            "html": email_body(summary),
        });
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("notification request failed")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("notification endpoint returned {status}");
        }
        info!("Sent submission notification to {}", email);
        Ok(())
    }
}

/// Pick the notifier the config asks for. Enabled notifications without an
/// API key fall back to logging.
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    let n = &config.notifications;
    if !n.enabled {
        return Ok(Arc::new(LogNotifier));
    }
    let (Some(endpoint), Some(key)) = (n.endpoint.clone(), config.credentials.notification_api_key.clone())
    else {
        warn!("Notifications enabled but no endpoint or API key configured; logging only");
        return Ok(Arc::new(LogNotifier));
    };
    Ok(Arc::new(HttpNotifier::new(endpoint, key, n.from.clone(), n.bcc.clone())?))
}
