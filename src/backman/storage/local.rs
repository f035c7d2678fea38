//! Local backup removal.
//!
//! The backup engine writes one directory per segment and one for the
//! coordinator, each shaped `.../backups/<YYYYMMDD>/<timestamp>`. Given the
//! backup root, every such directory is removed:
//!
//! ```text
//! <root>/backups/<date>/<ts>          single-directory layout
//! <root>/<segment>/backups/<date>/<ts> per-segment layout
//! ```

use super::BackupStorage;
use crate::error::{BackmanError, Result};
use crate::model::BackupRecord;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    /// Overrides the backup directory stored in the record.
    backup_dir: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new(backup_dir: Option<PathBuf>) -> Self {
        Self { backup_dir }
    }

    fn root_for(&self, record: &BackupRecord) -> Result<PathBuf> {
        match &self.backup_dir {
            Some(dir) => Ok(dir.clone()),
            None if !record.backup_dir.is_empty() => Ok(PathBuf::from(&record.backup_dir)),
            None => Err(BackmanError::LocalDelete {
                timestamp: record.timestamp.clone(),
                reason: "no backup directory recorded; pass one explicitly".into(),
            }),
        }
    }
}

/// Existing backup directories for `record` under `root`.
pub fn backup_dirs(root: &Path, record: &BackupRecord) -> Result<Vec<PathBuf>> {
    let tail = Path::new("backups")
        .join(record.date())
        .join(&record.timestamp);

    let mut found = Vec::new();
    let direct = root.join(&tail);
    if direct.is_dir() {
        found.push(direct);
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let candidate = entry.path().join(&tail);
        if candidate.is_dir() {
            found.push(candidate);
        }
    }
    found.sort();
    Ok(found)
}

impl BackupStorage for LocalStorage {
    fn delete_backup(&self, record: &BackupRecord) -> Result<()> {
        let local_error = |reason: String| BackmanError::LocalDelete {
            timestamp: record.timestamp.clone(),
            reason,
        };

        let root = self.root_for(record)?;
        if !root.is_dir() {
            return Err(local_error(format!(
                "backup directory {} does not exist",
                root.display()
            )));
        }

        let dirs = backup_dirs(&root, record).map_err(|e| local_error(e.to_string()))?;
        if dirs.is_empty() {
            return Err(local_error(format!(
                "no backup directories found under {}",
                root.display()
            )));
        }

        for dir in dirs {
            fs::remove_dir_all(&dir)
                .map_err(|e| local_error(format!("{}: {}", dir.display(), e)))?;
            tracing::debug!(timestamp = %record.timestamp, dir = %dir.display(), "removed backup directory");
        }
        Ok(())
    }

    fn fetch_report(&self, record: &BackupRecord) -> Result<String> {
        Err(BackmanError::Ineligible {
            timestamp: record.timestamp.clone(),
            reason: "reports are only available through a storage plugin".into(),
        })
    }
}
