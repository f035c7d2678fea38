//! Structured-file backup history catalog (`gpbackup_history.yaml`).
//!
//! The whole document is held in memory, newest backup first. Mutations are
//! applied in memory immediately and queued; [`Catalog::flush`] takes the
//! advisory lock, re-reads the file so concurrent writers are not clobbered,
//! replays the queue on top, and writes the result atomically.
//!
//! ```text
//! backupconfigs:
//! - timestamp: "20220401102430"
//!   datedeleted: ""
//!   restoreplan:
//!   - timestamp: "20220401102430"
//!     tablefqn: [public.t1]
//!   ...
//! ```

use super::lock::{FileLock, LockPolicy};
use super::{Catalog, ListFilter};
use crate::error::{BackmanError, Result};
use crate::model::{BackupRecord, BackupStatus, DeletionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(rename = "backupconfigs", default)]
    pub backup_configs: Vec<BackupRecord>,
}

impl HistoryDocument {
    fn sort_newest_first(&mut self) {
        self.backup_configs
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}

/// Reads a history document, keeping records in file order.
pub fn read_document(path: &Path) -> Result<HistoryDocument> {
    let unavailable = |reason: String| BackmanError::StoreUnavailable {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
    if content.trim().is_empty() {
        return Ok(HistoryDocument::default());
    }
    serde_yaml::from_str(&content).map_err(|e| unavailable(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingChange {
    Status(String, DeletionStatus),
    Purge(HashSet<String>),
}

pub struct YamlCatalog {
    path: PathBuf,
    records: Vec<BackupRecord>,
    pending: Vec<PendingChange>,
    lock_policy: LockPolicy,
}

impl YamlCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        let mut document = read_document(path)?;
        document.sort_newest_first();
        tracing::debug!(
            path = %path.display(),
            records = document.backup_configs.len(),
            "opened yaml history catalog"
        );
        Ok(Self {
            path: path.to_path_buf(),
            records: document.backup_configs,
            pending: Vec::new(),
            lock_policy: LockPolicy::default(),
        })
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Position of a record eligible for mutation. Failed backups are never found.
    fn find(&self, timestamp: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.timestamp == timestamp && r.status != BackupStatus::Failure)
    }

    fn filtered<F>(&self, keep: F) -> Vec<String>
    where
        F: Fn(&BackupRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|r| keep(r))
            .map(|r| r.timestamp.clone())
            .collect()
    }
}

impl Catalog for YamlCatalog {
    fn list_names(&self, filter: ListFilter) -> Result<Vec<String>> {
        Ok(self.filtered(|r| filter.admits(r.status, &r.date_deleted)))
    }

    fn list_records(&self, filter: ListFilter) -> Result<Vec<BackupRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| filter.admits(r.status, &r.date_deleted))
            .cloned()
            .collect())
    }

    fn get(&self, timestamp: &str) -> Result<BackupRecord> {
        self.find(timestamp)
            .map(|idx| self.records[idx].clone())
            .ok_or_else(|| BackmanError::NotFound(timestamp.to_string()))
    }

    fn list_before(&self, cutoff: &str) -> Result<Vec<String>> {
        Ok(self.filtered(|r| {
            r.timestamp.as_str() < cutoff
                && r.status != BackupStatus::Failure
                && r.date_deleted != DeletionStatus::InProgress
        }))
    }

    fn list_purgeable_before(&self, cutoff: &str, include_failed: bool) -> Result<Vec<String>> {
        Ok(self.filtered(|r| {
            r.timestamp.as_str() < cutoff
                && ((include_failed && r.status == BackupStatus::Failure)
                    || (r.status == BackupStatus::Success && r.date_deleted.is_deleted()))
        }))
    }

    /// Dependents are always newer, so only records ahead of the target in the
    /// newest-first list are scanned.
    fn find_dependents(&self, timestamp: &str) -> Result<Vec<String>> {
        let Some(position) = self.records.iter().position(|r| r.timestamp == timestamp) else {
            return Ok(Vec::new());
        };
        Ok(self.records[..position]
            .iter()
            .filter(|r| r.timestamp != timestamp && r.references(timestamp))
            .map(|r| r.timestamp.clone())
            .collect())
    }

    fn update_deletion_status(&mut self, timestamp: &str, status: &DeletionStatus) -> Result<()> {
        let idx = self
            .find(timestamp)
            .ok_or_else(|| BackmanError::NotFound(timestamp.to_string()))?;
        self.records[idx].date_deleted = status.clone();
        self.pending
            .push(PendingChange::Status(timestamp.to_string(), status.clone()));
        Ok(())
    }

    /// The file is rewritten as a whole on flush, so `batch_size` does not apply.
    fn batch_purge(&mut self, timestamps: &[String], _batch_size: usize) -> Result<()> {
        let purge: HashSet<String> = timestamps.iter().cloned().collect();
        self.records.retain(|r| !purge.contains(&r.timestamp));
        self.pending.push(PendingChange::Purge(purge));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let _lock = FileLock::acquire(&self.path, &self.lock_policy)?;

        let mut document = match fs::metadata(&self.path) {
            Ok(_) => read_document(&self.path)?,
            Err(err) if err.kind() == ErrorKind::NotFound => HistoryDocument::default(),
            Err(err) => return Err(BackmanError::Io(err)),
        };

        for change in &self.pending {
            match change {
                PendingChange::Status(timestamp, status) => {
                    match document
                        .backup_configs
                        .iter_mut()
                        .find(|r| &r.timestamp == timestamp)
                    {
                        Some(record) => record.date_deleted = status.clone(),
                        None => tracing::warn!(
                            timestamp = %timestamp,
                            "backup vanished from history file before flush"
                        ),
                    }
                }
                PendingChange::Purge(purge) => {
                    document
                        .backup_configs
                        .retain(|r| !purge.contains(&r.timestamp));
                }
            }
        }
        document.sort_newest_first();

        write_document(&self.path, &document)?;
        tracing::debug!(
            path = %self.path.display(),
            changes = self.pending.len(),
            "flushed history file"
        );

        self.records = document.backup_configs;
        self.pending.clear();
        Ok(())
    }
}

/// Atomic write (temp file + rename) that leaves the file read-only.
pub fn write_document(path: &Path, document: &HistoryDocument) -> Result<()> {
    let content = serde_yaml::to_string(document)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if path.exists() {
        set_read_only(path, false)?;
    }

    let tmp_path = dir.join(format!(".history-{}.tmp", Uuid::new_v4()));
    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(BackmanError::Io(err));
    }

    set_read_only(path, true)
}

#[cfg(unix)]
fn set_read_only(path: &Path, read_only: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if read_only { 0o444 } else { 0o644 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_read_only(path: &Path, read_only: bool) -> Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(read_only);
    fs::set_permissions(path, permissions)?;
    Ok(())
}
