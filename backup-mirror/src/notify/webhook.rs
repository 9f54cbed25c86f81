//! Discord-compatible webhook notifier.

use super::{FailureReport, Notifier};
use crate::utils::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

/// Embed color for failures (red).
const FAILURE_COLOR: u32 = 15158332;

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub content: String,
    pub username: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub color: u32,
    pub title: String,
    pub description: String,
}

impl WebhookPayload {
    pub fn failure(report: &FailureReport, username: &str) -> Self {
        Self {
            content: format!("Backup failed for host: {}", report.host),
            username: username.to_string(),
            embeds: vec![Embed {
                color: FAILURE_COLOR,
                title: format!(
                    "Backup failed for host: {} \nTarget folder: {}",
                    report.host, report.folder
                ),
                description: format!("ERROR: {}", report.error),
            }],
        }
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, username: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            username: username.into(),
        })
    }

    async fn deliver(&self, payload: &WebhookPayload) -> Result<reqwest::StatusCode> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.status())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, report: &FailureReport) {
        let payload = WebhookPayload::failure(report, &self.username);
        match self.deliver(&payload).await {
            Ok(status) => info!(status = status.as_u16(), "Payload delivered successfully"),
            Err(e) => warn!(host = %report.host, error = %e, "Failed to deliver failure notification"),
        }
    }
}
