//! Backup file metadata read live from the mirror tree.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// A regular file inside a mirrored folder.
#[derive(Debug, Clone)]
pub struct BackupFile {
    /// File name (no directory part)
    pub name: String,

    /// Full path to the file
    pub path: PathBuf,

    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl BackupFile {
    /// Read the metadata of one file.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            name: display_name(path),
            path: path.to_path_buf(),
            modified: DateTime::<Utc>::from(metadata.modified()?),
        })
    }

    /// Whole days elapsed since the last modification, truncated.
    ///
    /// Negative when the modification time lies in the future.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.modified).num_days()
    }
}

/// Regular files directly inside `dir`, sorted by path.
///
/// Symlinks are followed; entries whose target cannot be read are skipped.
pub fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => files.push(path),
            _ => {}
        }
    }
    files.sort();
    Ok(files)
}

/// File name used for prefix matching and logs. Lossy for non UTF-8 names.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
