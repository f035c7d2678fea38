use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::Catalog;

/// Removes catalog entries of deleted backups (and failed ones when asked)
/// older than `cutoff`. Backup data is not touched.
pub fn run<C: Catalog + ?Sized>(
    catalog: &mut C,
    cutoff: &str,
    include_failed: bool,
    batch_size: usize,
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    let purgeable = catalog.list_purgeable_before(cutoff, include_failed)?;

    if purgeable.is_empty() {
        result.add_message(CmdMessage::info(format!(
            "No history entries older than {} to remove",
            cutoff
        )));
        return Ok(result);
    }

    catalog.batch_purge(&purgeable, batch_size)?;
    catalog.flush()?;
    tracing::info!(cutoff, removed = purgeable.len(), "history entries removed");

    result.add_message(CmdMessage::success(format!(
        "Removed {} history entries older than {}",
        purgeable.len(),
        cutoff
    )));
    result.affected = purgeable;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeletionStatus;
    use crate::store::ListFilter;
    use crate::test_utils::{failed_backup, full_backup, sqlite_catalog};

    fn deleted(ts: &str) -> crate::model::BackupRecord {
        let mut record = full_backup(ts);
        record.date_deleted = DeletionStatus::from_legacy("20220420000000");
        record
    }

    fn everything() -> ListFilter {
        ListFilter {
            show_deleted: true,
            show_failed: true,
        }
    }

    #[test]
    fn removes_deleted_entries_only() {
        let mut catalog = sqlite_catalog(vec![
            deleted("20220301000000"),
            full_backup("20220302000000"),
            failed_backup("20220303000000"),
            deleted("20220410000000"),
        ]);

        let result = run(&mut catalog, "20220401000000", false, 100).unwrap();
        assert_eq!(result.affected, vec!["20220301000000"]);
        assert_eq!(
            catalog.list_names(everything()).unwrap(),
            vec!["20220410000000", "20220303000000", "20220302000000"]
        );
    }

    #[test]
    fn failed_flag_includes_failed_entries() {
        let mut catalog = sqlite_catalog(vec![
            deleted("20220301000000"),
            failed_backup("20220303000000"),
        ]);

        let result = run(&mut catalog, "20220401000000", true, 1).unwrap();
        assert_eq!(result.affected.len(), 2);
        assert!(catalog.list_names(everything()).unwrap().is_empty());
    }

    #[test]
    fn nothing_to_remove_is_informational() {
        let mut catalog = sqlite_catalog(vec![full_backup("20220301000000")]);
        let result = run(&mut catalog, "20220401000000", true, 100).unwrap();
        assert!(result.affected.is_empty());
        assert!(!result.failed);
    }
}
