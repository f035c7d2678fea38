//! # API Facade
//!
//! A thin facade over the command layer and the single entry point for every
//! backman operation, whatever the client.
//!
//! The facade:
//! - **Dispatches** to the matching `commands::*::run`
//! - **Normalizes inputs**: validates timestamps and turns the
//!   `--older-than-days` / `--before-timestamp` pair into one cutoff
//! - **Returns structured types** (`Result<CmdResult>`), never prints
//!
//! `BackmanApi<C: Catalog>` is generic over the catalog backend, so commands
//! can be exercised against an in-memory SQLite catalog, a temp YAML file, or
//! the boxed catalog chosen from configuration.
//!
//! Validation errors are returned before the catalog is touched.

use crate::cascade::CascadeOptions;
use crate::commands::{self, helpers::Cutoff};
use crate::error::Result;
use crate::storage::BackupStorage;
use crate::store::{Catalog, ListFilter, DEFAULT_PURGE_BATCH_SIZE};
use std::path::{Path, PathBuf};

pub struct BackmanApi<C: Catalog> {
    catalog: C,
    purge_batch_size: usize,
}

impl<C: Catalog> BackmanApi<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            purge_batch_size: DEFAULT_PURGE_BATCH_SIZE,
        }
    }

    pub fn with_purge_batch_size(mut self, batch_size: usize) -> Self {
        self.purge_batch_size = batch_size.max(1);
        self
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn backup_info(&self, show_deleted: bool, show_failed: bool) -> Result<commands::CmdResult> {
        commands::info::run(
            &self.catalog,
            ListFilter {
                show_deleted,
                show_failed,
            },
        )
    }

    pub fn backup_delete<S: BackupStorage + ?Sized>(
        &mut self,
        storage: &S,
        timestamps: &[String],
        opts: CascadeOptions,
    ) -> Result<commands::CmdResult> {
        commands::helpers::validate_timestamps(timestamps)?;
        commands::delete::run(&mut self.catalog, storage, timestamps, opts)
    }

    pub fn backup_clean<S: BackupStorage + ?Sized>(
        &mut self,
        storage: &S,
        cutoff: &Cutoff,
        cascade: bool,
    ) -> Result<commands::CmdResult> {
        let cutoff = cutoff.resolve()?;
        commands::clean::run(&mut self.catalog, storage, &cutoff, cascade)
    }

    pub fn history_clean(
        &mut self,
        cutoff: &Cutoff,
        include_failed: bool,
    ) -> Result<commands::CmdResult> {
        let cutoff = cutoff.resolve()?;
        commands::history_clean::run(
            &mut self.catalog,
            &cutoff,
            include_failed,
            self.purge_batch_size,
        )
    }

    pub fn report_info<S: BackupStorage + ?Sized>(
        &self,
        storage: &S,
        timestamp: &str,
    ) -> Result<commands::CmdResult> {
        crate::model::validate_timestamp(timestamp)?;
        commands::report::run(&self.catalog, storage, timestamp)
    }
}

/// Migration writes to its own SQLite target, so it does not need an open catalog.
pub fn history_migrate(db_path: &Path, history_files: &[PathBuf]) -> Result<commands::CmdResult> {
    if history_files.is_empty() {
        return Err(crate::error::BackmanError::InvalidArgument(
            "at least one history file is required".into(),
        ));
    }
    commands::migrate::run(db_path, history_files)
}
