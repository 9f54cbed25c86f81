//! rsync-over-ssh transport.

use super::{SyncRequest, TransferError, Transport};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Runs `rsync -av` over ssh for each request.
///
/// Host keys are not verified (`StrictHostKeyChecking=no`): hosts are added to
/// the inventory unattended and there is nobody to confirm a fingerprint.
#[derive(Debug, Clone)]
pub struct RsyncTransport {
    rsync_bin: String,
    ssh_user: String,
    ssh_key_file: PathBuf,
}

impl RsyncTransport {
    pub fn new(rsync_bin: impl Into<String>, ssh_user: impl Into<String>, ssh_key_file: impl Into<PathBuf>) -> Self {
        Self {
            rsync_bin: rsync_bin.into(),
            ssh_user: ssh_user.into(),
            ssh_key_file: ssh_key_file.into(),
        }
    }

    /// Arguments passed to rsync for `request`.
    pub fn build_args(&self, request: &SyncRequest<'_>) -> Vec<OsString> {
        let remote_shell = format!(
            "ssh -p {} -o StrictHostKeyChecking=no -i {}",
            request.port,
            self.ssh_key_file.display()
        );
        let source = format!("{}@{}:{}", self.ssh_user, request.host, request.remote_path);

        // Trailing slash: the remote content lands inside the folder itself.
        let mut destination = request.local_path.as_os_str().to_os_string();
        destination.push("/");

        vec![
            "-av".into(),
            "-e".into(),
            remote_shell.into(),
            source.into(),
            destination,
        ]
    }
}

#[async_trait]
impl Transport for RsyncTransport {
    async fn sync(&self, request: &SyncRequest<'_>) -> Result<(), TransferError> {
        info!(
            host = request.host,
            remote = request.remote_path,
            local = %request.local_path.display(),
            port = request.port,
            "Synchronizing"
        );

        let output = Command::new(&self.rsync_bin)
            .args(self.build_args(request))
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.is_empty()) {
            debug!(host = request.host, "{}", line);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            let status = output.status.to_string();
            let diagnostic = if stderr.is_empty() {
                format!("rsync {}", status)
            } else {
                stderr
            };
            return Err(TransferError::Failed { status, diagnostic });
        }

        if !stderr.is_empty() {
            warn!(host = request.host, remote = request.remote_path, stderr = %stderr, "rsync reported warnings");
        }
        info!(host = request.host, remote = request.remote_path, "Done");
        Ok(())
    }
}
