//! Relational backup history catalog backed by SQLite.
//!
//! Schema (compatible with the backup engine's own history database):
//!
//! ```text
//! backups(timestamp PK, backup_dir, ..., date_deleted, plugin, status)
//! include_schemas / exclude_schemas / include_relations / exclude_relations
//!     (timestamp -> backups, name)
//! restore_plans(timestamp -> backups, restore_plan_timestamp)
//! restore_plan_tables(timestamp -> backups, restore_plan_timestamp, table_fqn)
//! ```
//!
//! `restore_plan_timestamp` is deliberately not a foreign key: catalogs that
//! predate the relational format may reference backups that were purged.

use super::{Catalog, ListFilter};
use crate::error::{BackmanError, Result};
use crate::model::{BackupRecord, BackupStatus, DeletionStatus, RestorePlanEntry};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Each purged timestamp is one bound parameter; older SQLite builds cap a
/// statement at 999.
pub const MAX_PURGE_BATCH_SIZE: usize = 999;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS backups (
    timestamp TEXT NOT NULL PRIMARY KEY,
    backup_dir TEXT,
    backup_version TEXT,
    compressed INT CHECK (compressed IN (0, 1)),
    compression_type TEXT,
    database_name TEXT,
    database_version TEXT,
    segment_count INT,
    data_only INT CHECK (data_only IN (0, 1)),
    date_deleted TEXT,
    exclude_schema_filtered INT CHECK (exclude_schema_filtered IN (0, 1)),
    exclude_table_filtered INT CHECK (exclude_table_filtered IN (0, 1)),
    include_schema_filtered INT CHECK (include_schema_filtered IN (0, 1)),
    include_table_filtered INT CHECK (include_table_filtered IN (0, 1)),
    incremental INT CHECK (incremental IN (0, 1)),
    leaf_partition_data INT CHECK (leaf_partition_data IN (0, 1)),
    metadata_only INT CHECK (metadata_only IN (0, 1)),
    plugin TEXT,
    plugin_version TEXT,
    single_data_file INT CHECK (single_data_file IN (0, 1)),
    end_time TEXT,
    without_globals INT CHECK (without_globals IN (0, 1)),
    with_statistics INT CHECK (with_statistics IN (0, 1)),
    status TEXT
);
CREATE TABLE IF NOT EXISTS include_schemas (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS exclude_schemas (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS include_relations (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS exclude_relations (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS restore_plans (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    restore_plan_timestamp TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS restore_plan_tables (
    timestamp TEXT NOT NULL REFERENCES backups(timestamp),
    restore_plan_timestamp TEXT NOT NULL,
    table_fqn TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS restore_plans_referenced_idx
    ON restore_plans(restore_plan_timestamp);
";

/// Tables holding rows keyed by a backup timestamp, children before parent.
pub const CATALOG_TABLES: [&str; 7] = [
    "include_schemas",
    "exclude_schemas",
    "include_relations",
    "exclude_relations",
    "restore_plan_tables",
    "restore_plans",
    "backups",
];

/// Name lists stored one row per entry.
const NAME_TABLES: [&str; 4] = [
    "include_schemas",
    "exclude_schemas",
    "include_relations",
    "exclude_relations",
];

pub struct SqliteCatalog {
    conn: Connection,
    path: PathBuf,
}

impl SqliteCatalog {
    /// Opens (creating if needed) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| BackmanError::StoreUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        if path.is_dir() {
            return Err(unavailable("path is a directory".into()));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(unavailable(format!(
                    "directory {} does not exist",
                    parent.display()
                )));
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn =
            Connection::open_with_flags(path, flags).map_err(|e| unavailable(e.to_string()))?;
        Self::init(conn, path.to_path_buf()).map_err(|e| unavailable(e.to_string()))
    }

    /// Private in-memory catalog, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "opened sqlite history catalog");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Inserts records in one transaction; any failure rolls back all of them.
    pub fn insert_records(&mut self, records: &[BackupRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_in_tx(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_record(&mut self, record: &BackupRecord) -> Result<()> {
        self.insert_records(std::slice::from_ref(record))
    }

    /// Deletes `timestamps` from every table, one transaction per batch.
    /// Returns the number of transactions committed. `batch_size` is clamped
    /// to [`MAX_PURGE_BATCH_SIZE`].
    pub fn purge_batches(&mut self, timestamps: &[String], batch_size: usize) -> Result<usize> {
        let batch_size = batch_size.clamp(1, MAX_PURGE_BATCH_SIZE);
        let mut committed = 0;
        for batch in timestamps.chunks(batch_size) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let tx = self.conn.transaction()?;
            for table in CATALOG_TABLES {
                let sql = format!("DELETE FROM {table} WHERE timestamp IN ({placeholders})");
                tx.execute(&sql, params_from_iter(batch.iter()))?;
            }
            tx.commit()?;
            committed += 1;
            tracing::debug!(batch = committed, size = batch.len(), "purged catalog batch");
        }
        Ok(committed)
    }

    fn load_record(&self, timestamp: &str) -> Result<Option<BackupRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT timestamp, backup_dir, backup_version, compressed, compression_type,
                        database_name, database_version, segment_count, data_only, date_deleted,
                        exclude_schema_filtered, exclude_table_filtered, include_schema_filtered,
                        include_table_filtered, incremental, leaf_partition_data, metadata_only,
                        plugin, plugin_version, single_data_file, end_time, without_globals,
                        with_statistics, status
                 FROM backups WHERE timestamp = ?1",
                params![timestamp],
                |row| {
                    let text = |idx: usize| -> rusqlite::Result<String> {
                        Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
                    };
                    let flag = |idx: usize| -> rusqlite::Result<bool> {
                        Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0) == 1)
                    };
                    Ok(BackupRecord {
                        timestamp: text(0)?,
                        backup_dir: text(1)?,
                        backup_version: text(2)?,
                        compressed: flag(3)?,
                        compression_type: text(4)?,
                        database_name: text(5)?,
                        database_version: text(6)?,
                        segment_count: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
                        data_only: flag(8)?,
                        date_deleted: DeletionStatus::from_legacy(&text(9)?),
                        exclude_schema_filtered: flag(10)?,
                        exclude_table_filtered: flag(11)?,
                        include_schema_filtered: flag(12)?,
                        include_table_filtered: flag(13)?,
                        incremental: flag(14)?,
                        leaf_partition_data: flag(15)?,
                        metadata_only: flag(16)?,
                        plugin: text(17)?,
                        plugin_version: text(18)?,
                        single_data_file: flag(19)?,
                        end_time: text(20)?,
                        without_globals: flag(21)?,
                        with_statistics: flag(22)?,
                        status: decode_status(timestamp, &text(23)?),
                        ..Default::default()
                    })
                },
            )
            .optional()?;

        let Some(mut record) = record else {
            return Ok(None);
        };

        record.include_schemas = self.names("include_schemas", timestamp)?;
        record.exclude_schemas = self.names("exclude_schemas", timestamp)?;
        record.include_relations = self.names("include_relations", timestamp)?;
        record.exclude_relations = self.names("exclude_relations", timestamp)?;
        record.restore_plan = self.restore_plan(timestamp)?;
        Ok(Some(record))
    }

    fn names(&self, table: &str, timestamp: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT name FROM {table} WHERE timestamp = ?1 ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![timestamp], |row| row.get::<_, String>(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    fn restore_plan(&self, timestamp: &str) -> Result<Vec<RestorePlanEntry>> {
        let mut plan_stmt = self.conn.prepare(
            "SELECT restore_plan_timestamp FROM restore_plans WHERE timestamp = ?1 ORDER BY rowid",
        )?;
        let mut table_stmt = self.conn.prepare(
            "SELECT table_fqn FROM restore_plan_tables
             WHERE timestamp = ?1 AND restore_plan_timestamp = ?2 ORDER BY rowid",
        )?;

        let referenced: Vec<String> = plan_stmt
            .query_map(params![timestamp], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<_>>()?;

        let mut plan = Vec::with_capacity(referenced.len());
        for entry_ts in referenced {
            let table_fqns = table_stmt
                .query_map(params![timestamp, entry_ts], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            plan.push(RestorePlanEntry::new(entry_ts, table_fqns));
        }
        Ok(plan)
    }

    /// `(timestamp, status, date_deleted)` for every row, newest first.
    fn states(&self, before: Option<&str>) -> Result<Vec<(String, BackupStatus, DeletionStatus)>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, status, date_deleted FROM backups
             WHERE ?1 IS NULL OR timestamp < ?1
             ORDER BY timestamp DESC",
        )?;
        let rows = stmt.query_map(params![before], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            ))
        })?;

        let mut states = Vec::new();
        for row in rows {
            let (ts, status, date_deleted) = row?;
            let status = decode_status(&ts, &status);
            states.push((ts, status, DeletionStatus::from_legacy(&date_deleted)));
        }
        Ok(states)
    }
}

fn decode_status(timestamp: &str, raw: &str) -> BackupStatus {
    BackupStatus::parse(raw).unwrap_or_else(|| {
        tracing::warn!(timestamp, status = raw, "unknown backup status, treating as Failure");
        BackupStatus::Failure
    })
}

fn insert_in_tx(tx: &Transaction<'_>, record: &BackupRecord) -> Result<()> {
    tx.execute(
        "INSERT INTO backups (
            timestamp, backup_dir, backup_version, compressed, compression_type,
            database_name, database_version, segment_count, data_only, date_deleted,
            exclude_schema_filtered, exclude_table_filtered, include_schema_filtered,
            include_table_filtered, incremental, leaf_partition_data, metadata_only,
            plugin, plugin_version, single_data_file, end_time, without_globals,
            with_statistics, status
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                   ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
        params![
            record.timestamp,
            record.backup_dir,
            record.backup_version,
            record.compressed,
            record.compression_type,
            record.database_name,
            record.database_version,
            record.segment_count,
            record.data_only,
            record.date_deleted.as_legacy(),
            record.exclude_schema_filtered,
            record.exclude_table_filtered,
            record.include_schema_filtered,
            record.include_table_filtered,
            record.incremental,
            record.leaf_partition_data,
            record.metadata_only,
            record.plugin,
            record.plugin_version,
            record.single_data_file,
            record.end_time,
            record.without_globals,
            record.with_statistics,
            record.status.as_str(),
        ],
    )?;

    let lists = [
        &record.include_schemas,
        &record.exclude_schemas,
        &record.include_relations,
        &record.exclude_relations,
    ];
    for (table, names) in NAME_TABLES.iter().zip(lists) {
        let sql = format!("INSERT INTO {table} (timestamp, name) VALUES (?1, ?2)");
        for name in names {
            tx.execute(&sql, params![record.timestamp, name])?;
        }
    }

    for entry in &record.restore_plan {
        tx.execute(
            "INSERT INTO restore_plans (timestamp, restore_plan_timestamp) VALUES (?1, ?2)",
            params![record.timestamp, entry.timestamp],
        )?;
        for fqn in &entry.table_fqns {
            tx.execute(
                "INSERT INTO restore_plan_tables (timestamp, restore_plan_timestamp, table_fqn)
                 VALUES (?1, ?2, ?3)",
                params![record.timestamp, entry.timestamp, fqn],
            )?;
        }
    }
    Ok(())
}

impl Catalog for SqliteCatalog {
    fn list_names(&self, filter: ListFilter) -> Result<Vec<String>> {
        Ok(self
            .states(None)?
            .into_iter()
            .filter(|(_, status, deleted)| filter.admits(*status, deleted))
            .map(|(ts, _, _)| ts)
            .collect())
    }

    fn list_records(&self, filter: ListFilter) -> Result<Vec<BackupRecord>> {
        let mut records = Vec::new();
        for ts in self.list_names(filter)? {
            if let Some(record) = self.load_record(&ts)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn get(&self, timestamp: &str) -> Result<BackupRecord> {
        self.load_record(timestamp)?
            .ok_or_else(|| BackmanError::NotFound(timestamp.to_string()))
    }

    fn list_before(&self, cutoff: &str) -> Result<Vec<String>> {
        Ok(self
            .states(Some(cutoff))?
            .into_iter()
            .filter(|(_, status, deleted)| {
                *status != BackupStatus::Failure && *deleted != DeletionStatus::InProgress
            })
            .map(|(ts, _, _)| ts)
            .collect())
    }

    fn list_purgeable_before(&self, cutoff: &str, include_failed: bool) -> Result<Vec<String>> {
        Ok(self
            .states(Some(cutoff))?
            .into_iter()
            .filter(|(_, status, deleted)| {
                (include_failed && *status == BackupStatus::Failure)
                    || (*status == BackupStatus::Success && deleted.is_deleted())
            })
            .map(|(ts, _, _)| ts)
            .collect())
    }

    fn find_dependents(&self, timestamp: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT timestamp FROM restore_plans
             WHERE restore_plan_timestamp = ?1 AND timestamp != ?1
             ORDER BY timestamp DESC",
        )?;
        let dependents = stmt
            .query_map(params![timestamp], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(dependents)
    }

    fn update_deletion_status(&mut self, timestamp: &str, status: &DeletionStatus) -> Result<()> {
        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE backups SET date_deleted = ?1 WHERE timestamp = ?2",
            params![status.as_legacy(), timestamp],
        )?;
        if updated == 0 {
            // Dropping the transaction rolls it back.
            return Err(BackmanError::NotFound(timestamp.to_string()));
        }
        tx.commit()?;
        tracing::debug!(timestamp, date_deleted = %status, "updated deletion status");
        Ok(())
    }

    fn batch_purge(&mut self, timestamps: &[String], batch_size: usize) -> Result<()> {
        self.purge_batches(timestamps, batch_size).map(|_| ())
    }
}
