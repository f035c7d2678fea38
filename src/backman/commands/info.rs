use crate::commands::CmdResult;
use crate::error::Result;
use crate::model::FlagConflict;
use crate::store::{Catalog, ListFilter};

pub fn run<C: Catalog + ?Sized>(catalog: &C, filter: ListFilter) -> Result<CmdResult> {
    let records = catalog.list_records(filter)?;

    for record in &records {
        for conflict in record.flag_conflicts() {
            match conflict {
                FlagConflict::BackupType(types) => tracing::warn!(
                    timestamp = %record.timestamp,
                    flags = ?types,
                    shown = %record.backup_type(),
                    "backup has conflicting type flags"
                ),
                FlagConflict::ObjectFilter(filters) => tracing::warn!(
                    timestamp = %record.timestamp,
                    flags = ?filters,
                    shown = %record.object_filtering(),
                    "backup has conflicting object filter flags"
                ),
            }
        }
    }

    Ok(CmdResult::default().with_listed_backups(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeletionStatus;
    use crate::test_utils::{failed_backup, full_backup, sqlite_catalog};

    fn catalog() -> crate::store::sqlite::SqliteCatalog {
        let mut deleted = full_backup("20220402000000");
        deleted.date_deleted = DeletionStatus::from_legacy("20220405000000");
        sqlite_catalog(vec![
            full_backup("20220401000000"),
            deleted,
            failed_backup("20220403000000"),
            full_backup("20220404000000"),
        ])
    }

    fn listed(result: &CmdResult) -> Vec<&str> {
        result
            .listed_backups
            .iter()
            .map(|r| r.timestamp.as_str())
            .collect()
    }

    #[test]
    fn lists_live_backups_newest_first() {
        let result = run(&catalog(), ListFilter::default()).unwrap();
        assert_eq!(listed(&result), vec!["20220404000000", "20220401000000"]);
        assert!(!result.failed);
    }

    #[test]
    fn deleted_and_failed_flags_widen_listing() {
        let catalog = catalog();
        let deleted = run(
            &catalog,
            ListFilter {
                show_deleted: true,
                show_failed: false,
            },
        )
        .unwrap();
        assert_eq!(
            listed(&deleted),
            vec!["20220404000000", "20220402000000", "20220401000000"]
        );

        let everything = run(
            &catalog,
            ListFilter {
                show_deleted: true,
                show_failed: true,
            },
        )
        .unwrap();
        assert_eq!(everything.listed_backups.len(), 4);
    }

    #[test]
    fn conflicting_flags_still_listed() {
        let mut odd = full_backup("20220401000000");
        odd.incremental = true;
        odd.data_only = true;
        let result = run(&sqlite_catalog(vec![odd]), ListFilter::default()).unwrap();
        assert_eq!(result.listed_backups.len(), 1);
    }
}
