use crate::cascade::{self, CascadeOptions};
use crate::commands::helpers::record_outcome;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::{BackmanError, Result};
use crate::storage::BackupStorage;
use crate::store::Catalog;

/// Deletes every live backup older than `cutoff`, newest first.
///
/// Newest-first order means incrementals go before the backups they restore
/// from. A chain older than the cutoff still needs `cascade`, since deleted
/// incrementals keep blocking the backups they restore from.
pub fn run<C, S>(
    catalog: &mut C,
    storage: &S,
    cutoff: &str,
    cascade_deletes: bool,
) -> Result<CmdResult>
where
    C: Catalog + ?Sized,
    S: BackupStorage + ?Sized,
{
    let mut result = CmdResult::default();
    let candidates = catalog.list_before(cutoff)?;
    let opts = CascadeOptions {
        cascade: cascade_deletes,
        force: false,
    };

    let mut attempted = 0;
    for timestamp in &candidates {
        let record = match catalog.get(timestamp) {
            Ok(record) => record,
            Err(BackmanError::NotFound(_)) => {
                tracing::warn!(timestamp = %timestamp, "backup disappeared from history, skipping");
                continue;
            }
            Err(err) => return Err(err),
        };
        if !record.date_deleted.is_active() {
            continue;
        }
        attempted += 1;

        match cascade::delete_with_cascade(catalog, storage, timestamp, opts) {
            Ok(outcome) => {
                for dependent in &outcome.dependents {
                    record_outcome(&mut result, dependent);
                }
                record_outcome(&mut result, &outcome.target);
            }
            Err(err) if err.is_catalog_failure() => return Err(err),
            Err(err) => {
                tracing::error!(timestamp = %timestamp, error = %err, "backup clean failed");
                result.add_failure(err.to_string());
            }
        }
    }

    if attempted == 0 {
        result.add_message(CmdMessage::info(format!(
            "No backups older than {} to delete",
            cutoff
        )));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeletionStatus;
    use crate::test_utils::{
        failed_backup, full_backup, incremental_backup, sqlite_catalog, ScriptedStorage,
    };

    #[test]
    fn deletes_only_backups_before_cutoff() {
        let mut old_deleted = full_backup("20220301000000");
        old_deleted.date_deleted = DeletionStatus::from_legacy("20220302000000");
        let mut catalog = sqlite_catalog(vec![
            old_deleted,
            failed_backup("20220315000000"),
            full_backup("20220320000000"),
            full_backup("20220410000000"),
        ]);
        let storage = ScriptedStorage::default();

        let result = run(&mut catalog, &storage, "20220401000000", false).unwrap();
        assert!(!result.failed);
        assert_eq!(storage.deleted(), vec!["20220320000000"]);
        assert_eq!(
            catalog.get("20220410000000").unwrap().date_deleted,
            DeletionStatus::Active
        );
    }

    #[test]
    fn chain_older_than_cutoff_needs_cascade() {
        let full = full_backup("20220301000000");
        let inc1 = incremental_backup("20220302000000", &full, &[]);
        let inc2 = incremental_backup("20220303000000", &full, &[&inc1]);
        let mut catalog = sqlite_catalog(vec![full, inc1, inc2]);
        let storage = ScriptedStorage::default();

        // Already-deleted incrementals still count as dependents.
        let result = run(&mut catalog, &storage, "20220401000000", false).unwrap();
        assert!(result.failed);
        assert_eq!(storage.deleted(), vec!["20220303000000"]);
        assert_eq!(
            catalog.get("20220301000000").unwrap().date_deleted,
            DeletionStatus::Active
        );

        let result = run(&mut catalog, &storage, "20220401000000", true).unwrap();
        assert!(!result.failed);
        assert_eq!(
            storage.deleted(),
            vec!["20220303000000", "20220302000000", "20220301000000"]
        );
    }

    #[test]
    fn newer_dependent_blocks_without_cascade() {
        let full = full_backup("20220301000000");
        let inc = incremental_backup("20220405000000", &full, &[]);
        let mut catalog = sqlite_catalog(vec![full, inc]);
        let storage = ScriptedStorage::default();

        let result = run(&mut catalog, &storage, "20220401000000", false).unwrap();
        assert!(result.failed);
        assert!(storage.deleted().is_empty());

        let result = run(&mut catalog, &storage, "20220401000000", true).unwrap();
        assert!(!result.failed);
        assert_eq!(storage.deleted(), vec!["20220405000000", "20220301000000"]);
    }

    #[test]
    fn nothing_to_clean() {
        let mut catalog = sqlite_catalog(vec![full_backup("20220410000000")]);
        let storage = ScriptedStorage::default();
        let result = run(&mut catalog, &storage, "20220401000000", false).unwrap();
        assert!(!result.failed);
        assert!(result.affected.is_empty());
        assert_eq!(result.messages.len(), 1);
    }
}
