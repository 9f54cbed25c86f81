//! One-way mirroring of a remote folder into the local tree.

pub mod rsync;

pub use rsync::RsyncTransport;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// A single remote folder to mirror.
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub host: &'a str,
    pub remote_path: &'a str,
    pub local_path: &'a Path,
    pub port: u16,
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("failed to start transfer: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("transfer exited with {status}: {diagnostic}")]
    Failed { status: String, diagnostic: String },
}

impl TransferError {
    /// Text forwarded to the failure report.
    pub fn diagnostic(&self) -> String {
        match self {
            TransferError::Spawn(e) => e.to_string(),
            TransferError::Failed { diagnostic, .. } => diagnostic.clone(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Mirror `request.remote_path` on `request.host` into `request.local_path`.
    async fn sync(&self, request: &SyncRequest<'_>) -> Result<(), TransferError>;
}
