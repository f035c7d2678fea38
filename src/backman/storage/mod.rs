//! # Storage Boundary
//!
//! Physical backup data is never touched directly by the catalog code. The
//! lifecycle state machine and the report command go through
//! [`BackupStorage`], which is routed per record:
//!
//! - records with a plugin name go to [`plugin::PluginStorage`], which runs the
//!   plugin executable as a child process;
//! - records without one go to [`local::LocalStorage`], which removes the
//!   backup directories from disk.
//!
//! Tests substitute a scripted implementation to simulate failures.

use crate::error::{BackmanError, Result};
use crate::model::BackupRecord;
use std::path::{Path, PathBuf};

pub mod local;
pub mod plugin;

pub use local::LocalStorage;
pub use plugin::{PluginConfig, PluginStorage};

pub trait BackupStorage {
    /// Removes the backup's data. An error means nothing can be assumed
    /// about what is left behind.
    fn delete_backup(&self, record: &BackupRecord) -> Result<()>;

    /// Returns the text of the backup report.
    fn fetch_report(&self, record: &BackupRecord) -> Result<String>;
}

impl<S: BackupStorage + ?Sized> BackupStorage for &S {
    fn delete_backup(&self, record: &BackupRecord) -> Result<()> {
        (**self).delete_backup(record)
    }

    fn fetch_report(&self, record: &BackupRecord) -> Result<String> {
        (**self).fetch_report(record)
    }
}

/// Routes each record to the plugin or to local storage.
#[derive(Debug, Default)]
pub struct Storage {
    plugin: Option<PluginStorage>,
    local: LocalStorage,
}

impl Storage {
    pub fn new(plugin: Option<PluginStorage>, local: LocalStorage) -> Self {
        Self { plugin, local }
    }

    /// Builds the router from command-line style options.
    pub fn from_options(
        plugin_config: Option<&Path>,
        backup_dir: Option<PathBuf>,
        report_file: Option<PathBuf>,
    ) -> Result<Self> {
        let plugin = match plugin_config {
            Some(path) => Some(PluginStorage::load(path)?.with_report_file(report_file)),
            None => None,
        };
        Ok(Self::new(plugin, LocalStorage::new(backup_dir)))
    }

    fn plugin_for(&self, record: &BackupRecord) -> Result<&PluginStorage> {
        self.plugin.as_ref().ok_or_else(|| {
            BackmanError::InvalidArgument(format!(
                "backup {} was made with plugin {}; a plugin config file is required",
                record.timestamp, record.plugin
            ))
        })
    }
}

impl BackupStorage for Storage {
    fn delete_backup(&self, record: &BackupRecord) -> Result<()> {
        if record.is_local() {
            self.local.delete_backup(record)
        } else {
            self.plugin_for(record)?.delete_backup(record)
        }
    }

    fn fetch_report(&self, record: &BackupRecord) -> Result<String> {
        if record.is_local() {
            self.local.fetch_report(record)
        } else {
            self.plugin_for(record)?.fetch_report(record)
        }
    }
}
