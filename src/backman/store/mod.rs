//! # Storage Layer
//!
//! The backup history catalog lives in one of two formats. The [`Catalog`]
//! trait hides which one is in use so that commands, the cascade resolver and
//! the lifecycle state machine never branch on the format.
//!
//! ## Implementations
//!
//! - [`sqlite::SqliteCatalog`]: relational catalog (`gpbackup_history.db`).
//!   - One `backups` table keyed by timestamp plus one-to-many tables for
//!     include/exclude lists and restore plans.
//!   - Every mutation runs in its own short transaction.
//!
//! - [`yaml::YamlCatalog`]: structured-file catalog (`gpbackup_history.yaml`).
//!   - Whole document loaded into memory, newest backup first.
//!   - Mutations are queued and written by [`Catalog::flush`] under an
//!     advisory lock ([`lock::FileLock`]), atomically, leaving the file `0444`.
//!
//! ## Selecting a Backend
//!
//! The backend is a configuration value ([`CatalogKind`]) handed to
//! [`open_catalog`]; there is no process-wide switch.
//!
//! ## Failed Backups
//!
//! The YAML backend's [`Catalog::get`] does not find records whose backup
//! failed, while the SQLite backend returns them. Callers that mutate records
//! check eligibility through [`crate::lifecycle`] either way.

use crate::error::Result;
use crate::model::{BackupRecord, BackupStatus, DeletionStatus};
use std::path::PathBuf;

pub mod lock;
pub mod migrate;
pub mod sqlite;
pub mod yaml;

pub use lock::LockPolicy;

/// Default number of timestamps removed per transaction by `batch_purge`.
pub const DEFAULT_PURGE_BATCH_SIZE: usize = 100;

/// Which deleted/failed records a listing admits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub show_deleted: bool,
    pub show_failed: bool,
}

impl ListFilter {
    pub fn admits(&self, status: BackupStatus, date_deleted: &DeletionStatus) -> bool {
        let failed = status == BackupStatus::Failure;
        let live = date_deleted.is_active() || *date_deleted == DeletionStatus::InProgress;
        match (self.show_deleted, self.show_failed) {
            (true, true) => true,
            (true, false) => !failed,
            (false, true) => failed || live,
            (false, false) => !failed && live,
        }
    }
}

/// Abstract interface over the backup history catalog.
///
/// Every listing returns timestamps newest first.
pub trait Catalog {
    /// Timestamps admitted by `filter`.
    fn list_names(&self, filter: ListFilter) -> Result<Vec<String>>;

    /// Full records admitted by `filter`.
    fn list_records(&self, filter: ListFilter) -> Result<Vec<BackupRecord>>;

    /// A single record by timestamp.
    fn get(&self, timestamp: &str) -> Result<BackupRecord>;

    /// Timestamps older than `cutoff` that are neither failed nor mid-deletion.
    fn list_before(&self, cutoff: &str) -> Result<Vec<String>>;

    /// Timestamps older than `cutoff` whose backups are deleted, plus failed
    /// backups when `include_failed` is set.
    fn list_purgeable_before(&self, cutoff: &str, include_failed: bool) -> Result<Vec<String>>;

    /// Backups whose restore plan references `timestamp`, excluding itself.
    fn find_dependents(&self, timestamp: &str) -> Result<Vec<String>>;

    /// Replace the deletion status of one record.
    fn update_deletion_status(&mut self, timestamp: &str, status: &DeletionStatus) -> Result<()>;

    /// Remove records from the catalog in batches.
    fn batch_purge(&mut self, timestamps: &[String], batch_size: usize) -> Result<()>;

    /// Persist queued changes. Backends that write through do nothing.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: Catalog + ?Sized> Catalog for Box<C> {
    fn list_names(&self, filter: ListFilter) -> Result<Vec<String>> {
        (**self).list_names(filter)
    }

    fn list_records(&self, filter: ListFilter) -> Result<Vec<BackupRecord>> {
        (**self).list_records(filter)
    }

    fn get(&self, timestamp: &str) -> Result<BackupRecord> {
        (**self).get(timestamp)
    }

    fn list_before(&self, cutoff: &str) -> Result<Vec<String>> {
        (**self).list_before(cutoff)
    }

    fn list_purgeable_before(&self, cutoff: &str, include_failed: bool) -> Result<Vec<String>> {
        (**self).list_purgeable_before(cutoff, include_failed)
    }

    fn find_dependents(&self, timestamp: &str) -> Result<Vec<String>> {
        (**self).find_dependents(timestamp)
    }

    fn update_deletion_status(&mut self, timestamp: &str, status: &DeletionStatus) -> Result<()> {
        (**self).update_deletion_status(timestamp, status)
    }

    fn batch_purge(&mut self, timestamps: &[String], batch_size: usize) -> Result<()> {
        (**self).batch_purge(timestamps, batch_size)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// The configured catalog location and format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogKind {
    Sqlite(PathBuf),
    Yaml(PathBuf),
}

impl CatalogKind {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Sqlite(path) | Self::Yaml(path) => path,
        }
    }
}

pub fn open_catalog(kind: &CatalogKind, lock: LockPolicy) -> Result<Box<dyn Catalog>> {
    match kind {
        CatalogKind::Sqlite(path) => Ok(Box::new(sqlite::SqliteCatalog::open(path)?)),
        CatalogKind::Yaml(path) => {
            Ok(Box::new(yaml::YamlCatalog::open(path)?.with_lock_policy(lock)))
        }
    }
}
