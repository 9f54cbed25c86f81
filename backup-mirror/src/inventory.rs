//! Host inventory: which remote folders are mirrored from which hosts.
//!
//! ```yaml
//! web01:
//!   url: web01.example.com
//!   ssh-port: 2222        # optional, defaults to 22
//!   prefix: weekly        # optional, empty means "use the global retention table"
//!   folders:
//!     db: /var/backups/db/
//!     uploads: /srv/uploads/
//! ```

use crate::config::{load_file, FileFormat};
use crate::utils::{MirrorError, OrderedMap, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;

pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

// An explicit null (`ssh-port: ~`) means the same as leaving the key out.
fn port_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    Ok(Option::<u16>::deserialize(deserializer)?.unwrap_or(DEFAULT_SSH_PORT))
}

fn string_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One remote host and the folders mirrored from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Address used for ssh and as the local directory name
    pub url: String,

    #[serde(rename = "ssh-port", default = "default_ssh_port", deserialize_with = "port_or_default")]
    pub ssh_port: u16,

    /// Retention override; empty selects the global policy table
    #[serde(default, deserialize_with = "string_or_empty")]
    pub prefix: String,

    /// Local folder label -> remote path
    pub folders: OrderedMap<String>,
}

/// Validated, ordered set of hosts. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    hosts: OrderedMap<HostConfig>,
}

impl Inventory {
    pub fn from_file(path: &Path) -> Result<Self> {
        let inventory: Inventory = load_file(path)?;
        inventory.validate()?;
        Ok(inventory)
    }

    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        let inventory: Inventory = format.parse(content)?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Hosts in document order, keyed by their inventory id.
    pub fn hosts(&self) -> impl Iterator<Item = (&str, &HostConfig)> {
        self.hosts.iter()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn validate(&self) -> Result<()> {
        for (id, host) in self.hosts.iter() {
            check_component(&host.url).map_err(|reason| {
                MirrorError::Inventory(format!("host `{}`: url {}", id, reason))
            })?;
            for (label, remote) in host.folders.iter() {
                check_component(label).map_err(|reason| {
                    MirrorError::Inventory(format!("host `{}`: folder label {}", id, reason))
                })?;
                if remote.trim().is_empty() {
                    return Err(MirrorError::Inventory(format!(
                        "host `{}`: folder `{}` has an empty remote path",
                        id, label
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Values joined onto the backup root must stay a single path component.
fn check_component(value: &str) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err("must not be empty".into());
    }
    if value == "." || value == ".." || value.contains('/') || value.contains('\\') {
        return Err(format!("`{}` must be a single path component", value));
    }
    Ok(())
}
