//! Per-prefix retention of backup files.
//!
//! Files are grouped by prefix (a substring of the file name). A group is only
//! considered for deletion when it holds more files than the rule's minimum
//! count; in that case every file in the group older than the rule's maximum
//! age is removed. The count is taken once per group before deleting, so a
//! pass can leave fewer files than the minimum.

use crate::config::{load_file, FileFormat};
use crate::fs::{display_name, list_files, BackupFile};
use crate::utils::{OrderedMap, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rule applied to hosts that carry an explicit prefix override.
pub const OVERRIDE_RULE: RetentionRule = RetentionRule {
    min_count: 7,
    max_age_days: 7,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetentionRule {
    /// Files kept unconditionally while the group is at or below this size
    #[serde(rename = "qtty")]
    pub min_count: usize,

    /// Whole days a file may age before it becomes eligible for deletion
    #[serde(rename = "age")]
    pub max_age_days: u32,
}

/// Global prefix -> rule table, applied in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RetentionPolicy {
    rules: OrderedMap<RetentionRule>,
}

impl RetentionPolicy {
    pub fn from_file(path: &Path) -> Result<Self> {
        load_file(path)
    }

    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        format.parse(content)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, &RetentionRule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RetentionRule)> for RetentionPolicy {
    fn from_iter<I: IntoIterator<Item = (K, RetentionRule)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

/// A file removed by a rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub path: PathBuf,
    pub prefix: String,
    pub age_days: i64,
}

pub struct RetentionEngine {
    policy: RetentionPolicy,
}

impl RetentionEngine {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self { policy }
    }

    /// Rotate one folder.
    ///
    /// A non-empty `prefix_override` selects [`OVERRIDE_RULE`] for that prefix
    /// alone; an empty one applies every rule of the global table in order.
    /// Returns an error only when the folder cannot be listed.
    pub fn rotate(
        &self,
        folder: &Path,
        prefix_override: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Deletion>> {
        let mut deletions = Vec::new();

        if !prefix_override.is_empty() {
            rotate_prefix(folder, prefix_override, &OVERRIDE_RULE, now, &mut deletions)?;
        } else {
            for (prefix, rule) in self.policy.rules() {
                rotate_prefix(folder, prefix, rule, now, &mut deletions)?;
            }
        }

        Ok(deletions)
    }
}

fn rotate_prefix(
    folder: &Path,
    prefix: &str,
    rule: &RetentionRule,
    now: DateTime<Utc>,
    deletions: &mut Vec<Deletion>,
) -> Result<()> {
    let matched: Vec<PathBuf> = list_files(folder)?
        .into_iter()
        .filter(|path| display_name(path).contains(prefix))
        .collect();

    info!(
        folder = %folder.display(),
        prefix,
        files = matched.len(),
        min_count = rule.min_count,
        "Retention check"
    );

    if matched.len() <= rule.min_count {
        debug!(folder = %folder.display(), prefix, "Nothing to delete");
        return Ok(());
    }

    for path in matched {
        let file = match BackupFile::from_path(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read file metadata, skipping");
                continue;
            }
        };

        let age_days = file.age_days(now);
        if age_days <= i64::from(rule.max_age_days) {
            continue;
        }

        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                info!(path = %file.path.display(), prefix, age_days, "Deleted expired backup");
                deletions.push(Deletion {
                    path: file.path,
                    prefix: prefix.to_string(),
                    age_days,
                });
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to delete expired backup");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Create `name` with an mtime `days` (plus one hour) before `now()`.
    fn backup(dir: &Path, name: &str, days: i64) {
        let path = dir.join(name);
        fs::write(&path, name.as_bytes()).unwrap();
        let mtime: SystemTime = (now() - Duration::days(days) - Duration::hours(1)).into();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn count_matching(dir: &Path, prefix: &str) -> usize {
        list_files(dir)
            .unwrap()
            .iter()
            .filter(|p| display_name(p).contains(prefix))
            .count()
    }

    fn daily_policy(min_count: usize, max_age_days: u32) -> RetentionPolicy {
        [("daily", RetentionRule { min_count, max_age_days })]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_deletes_only_aged_files_above_minimum() {
        let dir = TempDir::new().unwrap();
        for age in [1, 2, 3, 4, 5, 8, 9, 10, 11] {
            backup(dir.path(), &format!("daily-{:02}.tar.gz", age), age);
        }

        let engine = RetentionEngine::new(daily_policy(7, 7));
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        let mut ages: Vec<i64> = deletions.iter().map(|d| d.age_days).collect();
        ages.sort();
        assert_eq!(ages, vec![8, 9, 10, 11]);
        assert_eq!(count_matching(dir.path(), "daily"), 5);
        assert!(dir.path().join("daily-05.tar.gz").exists());
        assert!(!dir.path().join("daily-08.tar.gz").exists());
    }

    #[test]
    fn test_prefix_override_at_or_below_minimum_keeps_everything() {
        let dir = TempDir::new().unwrap();
        for age in [10, 20, 30, 40, 50] {
            backup(dir.path(), &format!("weekly-{}.tar", age), age);
        }

        let engine = RetentionEngine::new(RetentionPolicy::default());
        let deletions = engine.rotate(dir.path(), "weekly", now()).unwrap();

        assert!(deletions.is_empty());
        assert_eq!(count_matching(dir.path(), "weekly"), 5);
    }

    #[test]
    fn test_prefix_override_ignores_global_table() {
        let dir = TempDir::new().unwrap();
        for age in 1..=9 {
            backup(dir.path(), &format!("daily-{}.tar", age), age * 3);
        }

        // The global table would delete everything older than one day.
        let engine = RetentionEngine::new(daily_policy(0, 1));
        let deletions = engine.rotate(dir.path(), "daily", now()).unwrap();

        // Override rule: 9 files > 7, delete ages 9..=27 (> 7 days).
        assert_eq!(deletions.len(), 7);
        assert_eq!(count_matching(dir.path(), "daily"), 2);
    }

    #[test]
    fn test_count_gate_is_evaluated_once() {
        let dir = TempDir::new().unwrap();
        for i in 0..9 {
            backup(dir.path(), &format!("daily-{}.tar", i), 10 + i);
        }

        let engine = RetentionEngine::new(daily_policy(7, 7));
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        // Every file is aged out, so all of them go even though that drops
        // the group below its minimum.
        assert_eq!(deletions.len(), 9);
        assert_eq!(count_matching(dir.path(), "daily"), 0);
    }

    #[test]
    fn test_low_count_is_idempotent() {
        let dir = TempDir::new().unwrap();
        for age in [30, 60, 90] {
            backup(dir.path(), &format!("daily-{}.tar", age), age);
        }

        let engine = RetentionEngine::new(daily_policy(3, 1));
        assert!(engine.rotate(dir.path(), "", now()).unwrap().is_empty());
        assert!(engine.rotate(dir.path(), "", now()).unwrap().is_empty());
        assert_eq!(count_matching(dir.path(), "daily"), 3);
    }

    #[test]
    fn test_young_files_are_never_deleted() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            backup(dir.path(), &format!("daily-{}.tar", i), i % 5);
        }
        // Exactly at the limit: 5 whole days is not older than 5.
        backup(dir.path(), "daily-edge.tar", 5);

        let engine = RetentionEngine::new(daily_policy(1, 5));
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        assert!(deletions.is_empty());
        assert_eq!(count_matching(dir.path(), "daily"), 21);
    }

    #[test]
    fn test_rules_apply_in_table_order_to_their_own_prefix() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            backup(dir.path(), &format!("weekly-{}.tar", i), 40 + i);
            backup(dir.path(), &format!("monthly-{}.tar", i), 400 + i);
        }
        backup(dir.path(), "unrelated.log", 1000);

        let policy: RetentionPolicy = [
            ("weekly", RetentionRule { min_count: 2, max_age_days: 30 }),
            ("monthly", RetentionRule { min_count: 12, max_age_days: 365 }),
        ]
        .into_iter()
        .collect();
        let engine = RetentionEngine::new(policy);
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        assert_eq!(deletions.len(), 4);
        assert!(deletions.iter().all(|d| d.prefix == "weekly"));
        assert_eq!(count_matching(dir.path(), "monthly"), 4);
        assert!(dir.path().join("unrelated.log").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_non_utf8_names_are_rotated() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let dir = TempDir::new().unwrap();
        for i in 0..9u8 {
            let name = OsString::from_vec(vec![b'd', b'a', b'i', b'l', b'y', b'-', b'0' + i, b'-', 0xff]);
            let path = dir.path().join(name);
            fs::write(&path, b"x").unwrap();
            let mtime: SystemTime = (now() - Duration::days(30)).into();
            fs::File::options().write(true).open(&path).unwrap().set_modified(mtime).unwrap();
        }

        let engine = RetentionEngine::new(daily_policy(7, 7));
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        assert_eq!(deletions.len(), 9);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinked_backups_are_counted_and_rotated() {
        let dir = TempDir::new().unwrap();
        let store = TempDir::new().unwrap();
        for age in [1, 2, 20, 21] {
            let name = format!("daily-{}.tar", age);
            backup(store.path(), &name, age);
            std::os::unix::fs::symlink(store.path().join(&name), dir.path().join(&name)).unwrap();
        }

        let engine = RetentionEngine::new(daily_policy(3, 7));
        let deletions = engine.rotate(dir.path(), "", now()).unwrap();

        // The links go, the files they point at stay.
        assert_eq!(deletions.len(), 2);
        assert_eq!(count_matching(dir.path(), "daily"), 2);
        assert!(store.path().join("daily-20.tar").exists());
    }

    #[test]
    fn test_empty_policy_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        backup(dir.path(), "daily-1.tar", 500);

        let engine = RetentionEngine::new(RetentionPolicy::default());
        assert!(engine.rotate(dir.path(), "", now()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let dir = TempDir::new().unwrap();
        let engine = RetentionEngine::new(daily_policy(7, 7));
        assert!(engine.rotate(&dir.path().join("nope"), "", now()).is_err());
    }

    #[test]
    fn test_parse_policy_file_format() {
        let yaml = "daily:\n  qtty: 7\n  age: 7\nweekly:\n  qtty: 4\n  age: 31\n";
        let policy = RetentionPolicy::parse(yaml, FileFormat::Yaml).unwrap();

        let rules: Vec<(&str, &RetentionRule)> = policy.rules().collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].0, "daily");
        assert_eq!(rules[1].1, &RetentionRule { min_count: 4, max_age_days: 31 });

        assert!(RetentionPolicy::parse("daily:\n  qtty: -1\n  age: 7\n", FileFormat::Yaml).is_err());
    }
}
