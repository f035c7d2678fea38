//! # Dependency & Cascade Resolver
//!
//! Incremental backups list every backup they restore from in their restore
//! plan, so the dependents of a backup are the newer backups whose plan names
//! it. Deleting a backup that still has dependents either fails or, with
//! `cascade`, deletes the dependents first, newest to oldest.
//!
//! Any dependent in the catalog blocks a plain delete, whatever its state.
//! During a cascade, dependents that are already deleted or whose backup
//! failed hold no data and are passed over. The target is only touched after
//! every dependent is gone. Dependents processed before a failure stay
//! deleted; the failing one carries its failure marker.

use crate::error::{BackmanError, Result};
use crate::lifecycle::{self, DeleteDecision, DeleteOutcome};
use crate::storage::BackupStorage;
use crate::store::Catalog;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeOptions {
    pub cascade: bool,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Dependents handled before the target, in processing order.
    pub dependents: Vec<DeleteOutcome>,
    pub target: DeleteOutcome,
}

/// Newer backups whose restore plan references `timestamp`, newest first.
pub fn find_dependents<C: Catalog + ?Sized>(catalog: &C, timestamp: &str) -> Result<Vec<String>> {
    catalog.find_dependents(timestamp)
}

pub fn delete_with_cascade<C, S>(
    catalog: &mut C,
    storage: &S,
    timestamp: &str,
    opts: CascadeOptions,
) -> Result<CascadeOutcome>
where
    C: Catalog + ?Sized,
    S: BackupStorage + ?Sized,
{
    let target = catalog.get(timestamp)?;
    if lifecycle::decide(&target, opts.force) == DeleteDecision::Ineligible {
        let outcome = lifecycle::delete_backup(catalog, storage, &target, opts.force)?;
        return Ok(CascadeOutcome {
            dependents: Vec::new(),
            target: outcome,
        });
    }

    let dependents = find_dependents(catalog, timestamp)?;
    if !dependents.is_empty() {
        if !opts.cascade {
            return Err(BackmanError::DependentsExist {
                timestamp: timestamp.to_string(),
                dependents,
            });
        }
        tracing::info!(
            timestamp,
            dependents = ?dependents,
            "deleting dependent backups first"
        );
    }

    let mut handled = Vec::with_capacity(dependents.len());
    for dependent in &dependents {
        let cascade_failed = |reason: String| BackmanError::CascadeFailed {
            timestamp: timestamp.to_string(),
            dependent: dependent.clone(),
            reason,
        };

        let record = match catalog.get(dependent) {
            Ok(record) => record,
            Err(BackmanError::NotFound(_)) => {
                tracing::warn!(timestamp = %dependent, "dependent backup not in catalog, skipping");
                continue;
            }
            Err(err) => return Err(err),
        };
        if record.is_failed() {
            tracing::debug!(timestamp = %dependent, "dependent backup failed, nothing to delete");
            continue;
        }
        if record.date_deleted.is_deleted() {
            tracing::debug!(timestamp = %dependent, "dependent backup already deleted");
            continue;
        }

        match lifecycle::delete_backup(catalog, storage, &record, opts.force) {
            Ok(DeleteOutcome::InProgress(_)) => {
                return Err(cascade_failed("deletion already in progress".into()));
            }
            Ok(outcome) => handled.push(outcome),
            Err(err) if err.is_catalog_failure() => return Err(err),
            Err(err) => return Err(cascade_failed(err.to_string())),
        }
    }

    let outcome = lifecycle::delete_backup(catalog, storage, &target, opts.force)?;
    Ok(CascadeOutcome {
        dependents: handled,
        target: outcome,
    })
}
