use crate::error::{BackmanError, Result};
use crate::model::{
    format_timestamp, parse_timestamp, BackupRecord, BackupStatus, RestorePlanEntry,
};
use crate::storage::BackupStorage;
use crate::store::sqlite::SqliteCatalog;
use crate::store::yaml::{write_document, HistoryDocument};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const HISTORY_FILE: &str = "gpbackup_history.yaml";

/// A successful plugin backup that restores only from itself.
pub fn full_backup(ts: &str) -> BackupRecord {
    let end = parse_timestamp(ts).unwrap() + chrono::Duration::minutes(5);
    BackupRecord {
        timestamp: ts.to_string(),
        end_time: format_timestamp(&end),
        backup_dir: "/data/backups".into(),
        backup_version: "1.30.5".into(),
        database_name: "demo".into(),
        database_version: "6.25.3".into(),
        segment_count: 2,
        compressed: true,
        compression_type: "gzip".into(),
        plugin: "gpbackup_s3_plugin".into(),
        plugin_version: "1.10.1".into(),
        restore_plan: vec![RestorePlanEntry::new(ts, vec!["public.t1".into()])],
        status: BackupStatus::Success,
        ..Default::default()
    }
}

pub fn failed_backup(ts: &str) -> BackupRecord {
    BackupRecord {
        status: BackupStatus::Failure,
        ..full_backup(ts)
    }
}

/// An incremental on top of `full` and the `previous` incrementals.
pub fn incremental_backup(ts: &str, full: &BackupRecord, previous: &[&BackupRecord]) -> BackupRecord {
    let mut plan = vec![RestorePlanEntry::new(
        full.timestamp.clone(),
        vec!["public.t1".into()],
    )];
    for inc in previous {
        plan.push(RestorePlanEntry::new(
            inc.timestamp.clone(),
            vec!["public.t2".into()],
        ));
    }
    plan.push(RestorePlanEntry::new(ts, vec!["public.t2".into()]));

    BackupRecord {
        incremental: true,
        restore_plan: plan,
        ..full_backup(ts)
    }
}

pub fn sqlite_catalog(records: Vec<BackupRecord>) -> SqliteCatalog {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    catalog.insert_records(&records).unwrap();
    catalog
}

/// Writes `records` as a history file in `dir` and returns its path.
pub fn write_history(dir: &Path, records: Vec<BackupRecord>) -> PathBuf {
    let path = dir.join(HISTORY_FILE);
    write_document(
        &path,
        &HistoryDocument {
            backup_configs: records,
        },
    )
    .unwrap();
    path
}

/// Writes a shell-script plugin and its config into `dir`, returning the
/// config path. `body` runs with the plugin arguments as `$1..$3`.
pub fn write_plugin(dir: &Path, body: &str, folder: &str) -> PathBuf {
    let script = dir.join("plugin.sh");
    fs::write(&script, format!("#!/bin/sh\n{}", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let config = dir.join("plugin_config.yaml");
    fs::write(
        &config,
        format!(
            "executablepath: {}\noptions:\n  folder: {}\n",
            script.display(),
            folder
        ),
    )
    .unwrap();
    config
}

/// In-process storage that records deletions and fails on request.
#[derive(Default)]
pub struct ScriptedStorage {
    failing: HashSet<String>,
    deleted: RefCell<Vec<String>>,
}

impl ScriptedStorage {
    pub fn failing(timestamps: &[&str]) -> Self {
        Self {
            failing: timestamps.iter().map(|ts| ts.to_string()).collect(),
            deleted: RefCell::default(),
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }

    fn check(&self, record: &BackupRecord, command: &str) -> Result<()> {
        if self.failing.contains(&record.timestamp) {
            return Err(BackmanError::Plugin {
                executable: "scripted".into(),
                command: command.into(),
                reason: format!("scripted failure for {}", record.timestamp),
            });
        }
        Ok(())
    }
}

impl BackupStorage for ScriptedStorage {
    fn delete_backup(&self, record: &BackupRecord) -> Result<()> {
        self.check(record, "delete_backup")?;
        self.deleted.borrow_mut().push(record.timestamp.clone());
        Ok(())
    }

    fn fetch_report(&self, record: &BackupRecord) -> Result<String> {
        self.check(record, "restore_data")?;
        Ok(format!("Backup Report for {}\n", record.timestamp))
    }
}
