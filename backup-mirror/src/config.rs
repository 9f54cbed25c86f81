//! Configuration management for the backup mirror.
//!
//! Every runtime parameter comes from the environment (optionally seeded from
//! a `.env` file). The resulting [`AppConfig`] is built once at startup and
//! passed by reference to the components that need it.

use crate::utils::{MirrorError, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_COOLDOWN_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Webhook endpoint for failure reports; log-only when unset
    pub webhook_url: Option<String>,

    /// Display name attached to webhook messages
    pub webhook_username: String,

    /// Login used for every remote host
    pub ssh_user: String,

    /// Private key handed to ssh via `-i`
    pub ssh_key_file: PathBuf,

    /// rsync executable
    pub rsync_bin: String,

    /// Host inventory file
    pub inventory_file: PathBuf,

    /// Root of the local mirror tree
    pub backup_root: PathBuf,

    /// Hour of day (UTC, 0-23) that triggers the daily pass
    pub start_hour_utc: u32,

    /// Global retention table; empty policy when unset
    pub retention_file: Option<PathBuf>,

    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub log_level: String,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                MirrorError::Config(format!("environment variable {} is not set", key))
            })
        };

        let start_hour_utc = parse_var::<u32>("BACKUP_START_HOUR_UTC", &required("BACKUP_START_HOUR_UTC")?)?;
        if start_hour_utc > 23 {
            return Err(MirrorError::Config(format!(
                "BACKUP_START_HOUR_UTC must be between 0 and 23, got {}",
                start_hour_utc
            )));
        }

        let poll_secs = match get("POLL_INTERVAL_SECS") {
            Some(v) => parse_var::<u64>("POLL_INTERVAL_SECS", &v)?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };
        if poll_secs == 0 {
            return Err(MirrorError::Config("POLL_INTERVAL_SECS must be positive".into()));
        }
        let cooldown_secs = match get("COOLDOWN_SECS") {
            Some(v) => parse_var::<u64>("COOLDOWN_SECS", &v)?,
            None => DEFAULT_COOLDOWN_SECS,
        };

        Ok(Self {
            webhook_url: get("DISCORD_WEBHOOK"),
            webhook_username: get("WEBHOOK_USERNAME").unwrap_or_else(|| "Backup Server".into()),
            ssh_user: required("SSH_USER")?,
            ssh_key_file: PathBuf::from(get("SSH_KEY_FILE").unwrap_or_else(|| "./id_rsa".into())),
            rsync_bin: get("RSYNC_BIN").unwrap_or_else(|| "rsync".into()),
            inventory_file: PathBuf::from(required("INVENTORY_FILE")?),
            backup_root: PathBuf::from(required("LOCAL_BACKUP_FOLDER")?),
            start_hour_utc,
            retention_file: get("BASIC_RETENTION").map(PathBuf::from),
            poll_interval: Duration::from_secs(poll_secs),
            cooldown: Duration::from_secs(cooldown_secs),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| MirrorError::Config(format!("{} has an invalid value: {:?}", key, value)))
}

/// Serialization format of a structured config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Toml,
    Json,
}

impl FileFormat {
    /// Pick a format from the file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        let value: T = match self {
            FileFormat::Yaml => serde_yaml::from_str(content)?,
            FileFormat::Toml => toml::from_str(content)?,
            FileFormat::Json => serde_json::from_str(content)?,
        };
        Ok(value)
    }
}

/// Load a structured config file, choosing the parser from its extension.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MirrorError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    FileFormat::from_path(path).parse(&content)
}
