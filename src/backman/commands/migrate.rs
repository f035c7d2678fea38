use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::migrate::migrate_file;
use crate::store::sqlite::SqliteCatalog;
use std::path::{Path, PathBuf};

/// Migrates each history file into the database at `db_path`, continuing
/// with the next file after a failure.
pub fn run(db_path: &Path, history_files: &[PathBuf]) -> Result<CmdResult> {
    let mut catalog = SqliteCatalog::open(db_path)?;
    let mut result = CmdResult::default();

    for file in history_files {
        match migrate_file(file, &mut catalog) {
            Ok(count) => {
                result.affected.push(file.display().to_string());
                result.add_message(CmdMessage::success(format!(
                    "Migrated {} backups from {} into {}",
                    count,
                    file.display(),
                    db_path.display()
                )));
            }
            Err(err) => {
                tracing::error!(file = %file.display(), error = %err, "history migration failed");
                result.add_failure(format!("Failed to migrate {}: {}", file.display(), err));
            }
        }
    }

    Ok(result)
}
