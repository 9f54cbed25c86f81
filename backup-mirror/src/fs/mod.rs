//! Local mirror tree helpers.

pub mod metadata;

pub use metadata::{display_name, list_files, BackupFile};

use crate::utils::{MirrorError, Result};
use std::path::Path;

/// Create `path` and any missing parents. Succeeds if it already exists.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|source| MirrorError::CreateDir {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_is_idempotent() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let nested = temp_dir.path().join("host").join("db");

        ensure_dir(&nested)?;
        ensure_dir(&nested)?;
        assert!(nested.is_dir());

        Ok(())
    }

    #[test]
    fn test_ensure_dir_fails_on_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("host");
        std::fs::write(&blocker, b"not a dir")?;

        let err = ensure_dir(&blocker.join("db")).unwrap_err();
        assert!(matches!(err, MirrorError::CreateDir { .. }));

        Ok(())
    }
}
