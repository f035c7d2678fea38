//! One-way conversion of a YAML history file into the SQLite catalog.

use super::sqlite::SqliteCatalog;
use super::yaml::read_document;
use crate::error::{BackmanError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const MIGRATED_SUFFIX: &str = ".migrated";

pub fn migrated_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(MIGRATED_SUFFIX);
    PathBuf::from(name)
}

/// Copies every record of `yaml_path` into `catalog` in a single transaction.
///
/// The source file is renamed to `<path>.migrated` only once the insert has
/// committed; on any error it is left untouched.
pub fn migrate_file(yaml_path: &Path, catalog: &mut SqliteCatalog) -> Result<usize> {
    let document = read_document(yaml_path)?;
    let records = document.backup_configs;

    catalog.insert_records(&records)?;

    let target = migrated_path_for(yaml_path);
    fs::rename(yaml_path, &target).map_err(|e| {
        BackmanError::Store(format!(
            "records migrated but {} could not be renamed to {}: {}",
            yaml_path.display(),
            target.display(),
            e
        ))
    })?;

    tracing::info!(
        source = %yaml_path.display(),
        catalog = %catalog.path().display(),
        records = records.len(),
        "history file migrated"
    );
    Ok(records.len())
}
