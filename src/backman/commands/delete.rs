use crate::cascade::{self, CascadeOptions};
use crate::commands::helpers::record_outcome;
use crate::commands::CmdResult;
use crate::error::{BackmanError, Result};
use crate::storage::BackupStorage;
use crate::store::Catalog;

/// Deletes each timestamp independently; a failure does not stop the others.
///
/// Only catalog-level failures abort the run.
pub fn run<C, S>(
    catalog: &mut C,
    storage: &S,
    timestamps: &[String],
    opts: CascadeOptions,
) -> Result<CmdResult>
where
    C: Catalog + ?Sized,
    S: BackupStorage + ?Sized,
{
    let mut result = CmdResult::default();

    for timestamp in timestamps {
        match cascade::delete_with_cascade(catalog, storage, timestamp, opts) {
            Ok(outcome) => {
                for dependent in &outcome.dependents {
                    record_outcome(&mut result, dependent);
                }
                record_outcome(&mut result, &outcome.target);
            }
            Err(err) if err.is_catalog_failure() => return Err(err),
            Err(err) => {
                tracing::error!(timestamp = %timestamp, error = %err, "backup delete failed");
                result.add_failure(failure_message(timestamp, &err));
            }
        }
    }

    Ok(result)
}

fn failure_message(timestamp: &str, err: &BackmanError) -> String {
    match err {
        BackmanError::NotFound(_) => format!("Backup {} not found in history", timestamp),
        other => other.to_string(),
    }
}
