use crate::commands::CmdResult;
use crate::error::{BackmanError, Result};
use crate::lifecycle::can_be_reported;
use crate::storage::BackupStorage;
use crate::store::Catalog;

pub fn run<C, S>(catalog: &C, storage: &S, timestamp: &str) -> Result<CmdResult>
where
    C: Catalog + ?Sized,
    S: BackupStorage + ?Sized,
{
    let record = catalog.get(timestamp)?;
    if !can_be_reported(&record) {
        let reason = if record.is_failed() {
            "backup failed".to_string()
        } else if record.is_local() {
            "backup is on local storage; read the report from the backup directory".to_string()
        } else {
            format!("backup deletion status is '{}'", record.date_deleted)
        };
        return Err(BackmanError::Ineligible {
            timestamp: timestamp.to_string(),
            reason,
        });
    }

    let report = storage.fetch_report(&record)?;
    Ok(CmdResult::default().with_report(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeletionStatus;
    use crate::test_utils::{full_backup, sqlite_catalog, ScriptedStorage};

    #[test]
    fn fetches_report_through_storage() {
        let catalog = sqlite_catalog(vec![full_backup("20220401102430")]);
        let result = run(&catalog, &ScriptedStorage::default(), "20220401102430").unwrap();
        assert_eq!(
            result.report.as_deref(),
            Some("Backup Report for 20220401102430\n")
        );
    }

    #[test]
    fn deleted_and_local_backups_have_no_report() {
        let mut deleted = full_backup("20220401000000");
        deleted.date_deleted = DeletionStatus::from_legacy("20220402000000");
        let mut local = full_backup("20220403000000");
        local.plugin.clear();
        let catalog = sqlite_catalog(vec![deleted, local]);
        let storage = ScriptedStorage::default();

        for ts in ["20220401000000", "20220403000000"] {
            assert!(matches!(
                run(&catalog, &storage, ts),
                Err(BackmanError::Ineligible { .. })
            ));
        }
    }

    #[test]
    fn unknown_timestamp_is_not_found() {
        let catalog = sqlite_catalog(vec![]);
        assert!(matches!(
            run(&catalog, &ScriptedStorage::default(), "20220401000000"),
            Err(BackmanError::NotFound(_))
        ));
    }
}
