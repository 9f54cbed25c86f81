//! Backup pass executor - mirrors every folder of every host once.
//!
//! For each host the executor prepares `<root>/<url>/<label>`, rotates old
//! backups in it and then pulls the remote folder. Hosts and folders are
//! handled strictly one at a time; a failing unit is reported and skipped so
//! the rest of the inventory is still processed.

use crate::fs::ensure_dir;
use crate::inventory::{HostConfig, Inventory};
use crate::notify::{FailureReport, Notifier};
use crate::retention::RetentionEngine;
use crate::transfer::{SyncRequest, Transport};
use crate::utils::Clock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

/// Outcome counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub hosts: usize,
    pub synced: usize,
    pub failed: usize,
    pub deleted: usize,
}

pub struct BackupExecutor {
    root: PathBuf,
    retention: RetentionEngine,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl BackupExecutor {
    pub fn new(
        root: impl Into<PathBuf>,
        retention: RetentionEngine,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            root: root.into(),
            retention,
            transport,
            notifier,
            clock,
        }
    }

    /// Run one pass over the whole inventory.
    pub async fn run(&self, inventory: &Inventory) -> PassSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("pass", %run_id);

        async {
            info!(hosts = inventory.len(), "Starting backup pass");
            let mut summary = PassSummary::default();

            for (id, host) in inventory.hosts() {
                summary.hosts += 1;
                self.run_host(id, host, &mut summary).await;
            }

            info!(
                hosts = summary.hosts,
                synced = summary.synced,
                failed = summary.failed,
                deleted = summary.deleted,
                "Backup pass finished"
            );
            summary
        }
        .instrument(span)
        .await
    }

    async fn run_host(&self, id: &str, host: &HostConfig, summary: &mut PassSummary) {
        let host_dir = self.root.join(&host.url);
        if let Err(e) = ensure_dir(&host_dir) {
            error!(host = id, error = %e, "Skipping host");
            summary.failed += host.folders.len();
            self.notifier
                .notify(&FailureReport::new(&host.url, host_dir.display().to_string(), e.to_string()))
                .await;
            return;
        }

        for (label, remote_path) in host.folders.iter() {
            let folder_dir = host_dir.join(label);
            if self.run_folder(host, remote_path, &folder_dir, summary).await {
                summary.synced += 1;
            } else {
                summary.failed += 1;
            }
        }
    }

    /// Returns whether the folder was mirrored.
    async fn run_folder(
        &self,
        host: &HostConfig,
        remote_path: &str,
        folder_dir: &Path,
        summary: &mut PassSummary,
    ) -> bool {
        if let Err(e) = ensure_dir(folder_dir) {
            error!(host = %host.url, folder = %folder_dir.display(), error = %e, "Skipping folder");
            self.notifier
                .notify(&FailureReport::new(&host.url, remote_path, e.to_string()))
                .await;
            return false;
        }

        info!(host = %host.url, folder = %folder_dir.display(), "Backup rotation");
        match self.retention.rotate(folder_dir, &host.prefix, self.clock.now()) {
            Ok(deletions) => summary.deleted += deletions.len(),
            Err(e) => {
                error!(host = %host.url, folder = %folder_dir.display(), error = %e, "Rotation failed");
                self.notifier
                    .notify(&FailureReport::new(
                        &host.url,
                        remote_path,
                        format!("rotation of {} failed: {}", folder_dir.display(), e),
                    ))
                    .await;
            }
        }

        let request = SyncRequest {
            host: &host.url,
            remote_path,
            local_path: folder_dir,
            port: host.ssh_port,
        };
        match self.transport.sync(&request).await {
            Ok(()) => true,
            Err(e) => {
                error!(host = %host.url, remote = remote_path, error = %e, "Transfer failed");
                self.notifier
                    .notify(&FailureReport::new(&host.url, remote_path, e.diagnostic()))
                    .await;
                false
            }
        }
    }
}
