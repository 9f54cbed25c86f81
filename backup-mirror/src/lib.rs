//! Backup Mirror Library
//!
//! Pulls backup folders from remote hosts with rsync once a day and prunes
//! aged backup files per prefix before every transfer.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod inventory;
pub mod notify;
pub mod retention;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use executor::{BackupExecutor, PassSummary};
pub use inventory::{HostConfig, Inventory};
pub use retention::{RetentionEngine, RetentionPolicy, RetentionRule};
pub use utils::errors::MirrorError;
pub type Result<T> = std::result::Result<T, MirrorError>;
