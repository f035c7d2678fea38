//! # Lifecycle State Machine
//!
//! Governs the `date_deleted` state of a backup when a delete is attempted:
//!
//! ```text
//!   Active | PluginFailed | LocalFailed | Unparseable
//!        │  delete
//!        ▼
//!   InProgress ──storage ok──▶ DeletedAt(now)
//!        │
//!        └──storage err──▶ PluginFailed (plugin) / LocalFailed (local)
//! ```
//!
//! `InProgress` and `DeletedAt` only re-enter the machine with `force`.
//! Records whose backup itself failed never transition.
//!
//! Every state change is written back to the catalog (and flushed) before the
//! next step runs, so an interrupted run leaves an `In progress` marker and a
//! failed run leaves a retryable failure marker.

use crate::error::{BackmanError, Result};
use crate::model::{BackupRecord, BackupStatus, DeletionStatus};
use crate::storage::BackupStorage;
use crate::store::Catalog;

/// What a delete attempt should do given the record's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDecision {
    Proceed,
    AlreadyDeleted,
    InProgress,
    Ineligible,
}

/// Result of a delete attempt that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(String),
    AlreadyDeleted(String),
    /// Another run is deleting this backup; try again later or use force.
    InProgress(String),
}

impl DeleteOutcome {
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Deleted(ts) | Self::AlreadyDeleted(ts) | Self::InProgress(ts) => ts,
        }
    }
}

pub fn decide(record: &BackupRecord, force: bool) -> DeleteDecision {
    if record.status == BackupStatus::Failure {
        return DeleteDecision::Ineligible;
    }
    match &record.date_deleted {
        status if status.is_active() => DeleteDecision::Proceed,
        _ if force => DeleteDecision::Proceed,
        DeletionStatus::InProgress => DeleteDecision::InProgress,
        _ => DeleteDecision::AlreadyDeleted,
    }
}

pub fn can_be_deleted(record: &BackupRecord, force: bool) -> bool {
    record.status == BackupStatus::Success && (record.date_deleted.is_active() || force)
}

/// Reports are fetched through the plugin, so local and deleted backups have none.
pub fn can_be_reported(record: &BackupRecord) -> bool {
    record.status == BackupStatus::Success && !record.is_local() && record.date_deleted.is_active()
}

/// The marker persisted when physical deletion fails.
pub fn failure_state(record: &BackupRecord) -> DeletionStatus {
    if record.is_local() {
        DeletionStatus::LocalFailed
    } else {
        DeletionStatus::PluginFailed
    }
}

/// Runs one record through the state machine, without looking at dependents.
pub fn delete_backup<C, S>(
    catalog: &mut C,
    storage: &S,
    record: &BackupRecord,
    force: bool,
) -> Result<DeleteOutcome>
where
    C: Catalog + ?Sized,
    S: BackupStorage + ?Sized,
{
    let ts = record.timestamp.clone();
    match decide(record, force) {
        DeleteDecision::Ineligible => {
            return Err(BackmanError::Ineligible {
                timestamp: ts,
                reason: "backup status is Failure".into(),
            })
        }
        DeleteDecision::AlreadyDeleted => {
            tracing::info!(timestamp = %ts, date_deleted = %record.date_deleted, "backup already deleted");
            return Ok(DeleteOutcome::AlreadyDeleted(ts));
        }
        DeleteDecision::InProgress => {
            tracing::warn!(timestamp = %ts, "backup deletion already in progress, skipping");
            return Ok(DeleteOutcome::InProgress(ts));
        }
        DeleteDecision::Proceed => {}
    }

    if let DeletionStatus::Unparseable(raw) = &record.date_deleted {
        tracing::warn!(timestamp = %ts, date_deleted = %raw, "unparseable deletion status, attempting delete");
    }

    set_status(catalog, &ts, DeletionStatus::InProgress)?;

    match storage.delete_backup(record) {
        Ok(()) => {
            set_status(catalog, &ts, DeletionStatus::deleted_now())?;
            tracing::info!(timestamp = %ts, plugin = %record.plugin, "backup deleted");
            Ok(DeleteOutcome::Deleted(ts))
        }
        Err(err) => {
            tracing::error!(timestamp = %ts, plugin = %record.plugin, error = %err, "backup delete failed");
            set_status(catalog, &ts, failure_state(record))?;
            Err(err)
        }
    }
}

fn set_status<C: Catalog + ?Sized>(
    catalog: &mut C,
    timestamp: &str,
    status: DeletionStatus,
) -> Result<()> {
    catalog.update_deletion_status(timestamp, &status)?;
    catalog.flush()
}
