//! Failure reporting.
//!
//! Notifications are best effort: a report that cannot be delivered is logged
//! and dropped, never retried or propagated.

pub mod webhook;

pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use tracing::error;

/// A folder that could not be mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub host: String,
    pub folder: String,
    pub error: String,
}

impl FailureReport {
    pub fn new(host: impl Into<String>, folder: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            folder: folder.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, report: &FailureReport);
}

/// Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &FailureReport) {
        error!(
            host = %report.host,
            folder = %report.folder,
            error = %report.error,
            "Backup failed (no webhook configured)"
        );
    }
}
