//! # Catalog Entity Model
//!
//! Pure data types for the backup history catalog. Nothing in this module
//! performs I/O; the stores in [`crate::store`] are responsible for turning
//! these types into rows and documents.
//!
//! ## Timestamps
//!
//! Backups are identified by a 14-digit local timestamp (`YYYYMMDDHHMMSS`).
//! Lexicographic order equals chronological order, so timestamps are kept as
//! strings and compared directly everywhere.
//!
//! ## Deletion Status
//!
//! The legacy catalog format overloads a single `date_deleted` string as both
//! a timestamp and a status flag. [`DeletionStatus`] models it as a sum type;
//! the string encoding only exists at the (de)serialization boundary.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::error::BackmanError;

/// chrono layout for backup timestamps.
pub const TIMESTAMP_LAYOUT: &str = "%Y%m%d%H%M%S";

pub const DATE_DELETED_IN_PROGRESS: &str = "In progress";
pub const DATE_DELETED_PLUGIN_FAILED: &str = "Plugin Backup Delete Failed";
pub const DATE_DELETED_LOCAL_FAILED: &str = "Local Delete Failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse timestamp {0:?}")]
pub struct TimestampParseError(pub String);

impl From<TimestampParseError> for BackmanError {
    fn from(err: TimestampParseError) -> Self {
        BackmanError::InvalidTimestamp(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable date_deleted value {0:?}")]
pub struct StatusParseError(pub String);

/// Parses a 14-digit backup timestamp.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TimestampParseError> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampParseError(value.to_string()));
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_LAYOUT)
        .map_err(|_| TimestampParseError(value.to_string()))
}

/// Validates user supplied timestamps before any catalog access.
pub fn validate_timestamp(value: &str) -> crate::error::Result<()> {
    parse_timestamp(value)?;
    Ok(())
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_LAYOUT).to_string()
}

/// Current local time in backup timestamp layout.
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_LAYOUT).to_string()
}

/// Seconds elapsed between two backup timestamps.
pub fn duration(start: &str, end: &str) -> Result<f64, TimestampParseError> {
    let start = parse_timestamp(start)?;
    let end = parse_timestamp(end)?;
    Ok((end - start).num_seconds() as f64)
}

/// Formats seconds as `HH:MM:SS`. Hours are not capped at 24.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Lifecycle state of a backup, decoded from the legacy `date_deleted` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionStatus {
    #[default]
    Active,
    InProgress,
    DeletedAt(NaiveDateTime),
    PluginFailed,
    LocalFailed,
    /// Any value the catalog holds that none of the above accept.
    Unparseable(String),
}

impl DeletionStatus {
    /// Strict parse of a legacy `date_deleted` value.
    pub fn parse(value: &str) -> Result<Self, StatusParseError> {
        match value {
            "" => Ok(Self::Active),
            DATE_DELETED_IN_PROGRESS => Ok(Self::InProgress),
            DATE_DELETED_PLUGIN_FAILED => Ok(Self::PluginFailed),
            DATE_DELETED_LOCAL_FAILED => Ok(Self::LocalFailed),
            other => parse_timestamp(other)
                .map(Self::DeletedAt)
                .map_err(|_| StatusParseError(other.to_string())),
        }
    }

    /// Lenient decode used at the storage boundary; never fails.
    pub fn from_legacy(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|_| Self::Unparseable(value.to_string()))
    }

    pub fn as_legacy(&self) -> String {
        match self {
            Self::Active => String::new(),
            Self::InProgress => DATE_DELETED_IN_PROGRESS.to_string(),
            Self::DeletedAt(at) => format_timestamp(at),
            Self::PluginFailed => DATE_DELETED_PLUGIN_FAILED.to_string(),
            Self::LocalFailed => DATE_DELETED_LOCAL_FAILED.to_string(),
            Self::Unparseable(raw) => raw.clone(),
        }
    }

    pub fn deleted_now() -> Self {
        Self::DeletedAt(Local::now().naive_local())
    }

    /// Failed deletions and unparseable values count as active so they can be retried.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Active | Self::PluginFailed | Self::LocalFailed | Self::Unparseable(_)
        )
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::DeletedAt(_))
    }
}

impl fmt::Display for DeletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_legacy())
    }
}

impl Serialize for DeletionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_legacy())
    }
}

impl<'de> Deserialize<'de> for DeletionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(Self::from_legacy(&raw))
    }
}

/// Checks a raw `date_deleted` string. Unparseable values are logged and
/// treated as active.
pub fn is_active(date_deleted: &str) -> bool {
    match DeletionStatus::parse(date_deleted) {
        Ok(status) => status.is_active(),
        Err(err) => {
            tracing::warn!(error = %err, "treating backup as active");
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackupStatus {
    #[default]
    Success,
    Failure,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failure => "Failure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Success" => Some(Self::Success),
            "Failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupType {
    Full,
    Incremental,
    DataOnly,
    MetadataOnly,
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::DataOnly => "data-only",
            Self::MetadataOnly => "metadata-only",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFilter {
    IncludeSchema,
    ExcludeSchema,
    IncludeTable,
    ExcludeTable,
    None,
}

impl fmt::Display for ObjectFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IncludeSchema => "include-schema",
            Self::ExcludeSchema => "exclude-schema",
            Self::IncludeTable => "include-table",
            Self::ExcludeTable => "exclude-table",
            Self::None => "",
        })
    }
}

/// Flag combinations the backup engine should never produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagConflict {
    BackupType(Vec<BackupType>),
    ObjectFilter(Vec<ObjectFilter>),
}

impl fmt::Display for FlagConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
        match self {
            Self::BackupType(types) => write!(f, "conflicting backup types: {}", join(types)),
            Self::ObjectFilter(filters) => {
                write!(f, "conflicting object filters: {}", join(filters))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestorePlanEntry {
    pub timestamp: String,
    #[serde(rename = "tablefqn", default)]
    pub table_fqns: Vec<String>,
}

impl RestorePlanEntry {
    pub fn new(timestamp: impl Into<String>, table_fqns: Vec<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            table_fqns,
        }
    }
}

/// One backup attempt as recorded by the backup engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupRecord {
    #[serde(rename = "backupdir")]
    pub backup_dir: String,
    #[serde(rename = "backupversion")]
    pub backup_version: String,
    pub compressed: bool,
    #[serde(rename = "compressiontype")]
    pub compression_type: String,
    #[serde(rename = "databasename")]
    pub database_name: String,
    #[serde(rename = "databaseversion")]
    pub database_version: String,
    #[serde(rename = "segmentcount")]
    pub segment_count: i64,
    #[serde(rename = "dataonly")]
    pub data_only: bool,
    #[serde(rename = "datedeleted")]
    pub date_deleted: DeletionStatus,
    #[serde(rename = "excluderelations")]
    pub exclude_relations: Vec<String>,
    #[serde(rename = "excludeschemafiltered")]
    pub exclude_schema_filtered: bool,
    #[serde(rename = "excludeschemas")]
    pub exclude_schemas: Vec<String>,
    #[serde(rename = "excludetablefiltered")]
    pub exclude_table_filtered: bool,
    #[serde(rename = "includerelations")]
    pub include_relations: Vec<String>,
    #[serde(rename = "includeschemafiltered")]
    pub include_schema_filtered: bool,
    #[serde(rename = "includeschemas")]
    pub include_schemas: Vec<String>,
    #[serde(rename = "includetablefiltered")]
    pub include_table_filtered: bool,
    pub incremental: bool,
    #[serde(rename = "leafpartitiondata")]
    pub leaf_partition_data: bool,
    #[serde(rename = "metadataonly")]
    pub metadata_only: bool,
    pub plugin: String,
    #[serde(rename = "pluginversion")]
    pub plugin_version: String,
    #[serde(rename = "restoreplan")]
    pub restore_plan: Vec<RestorePlanEntry>,
    #[serde(rename = "singledatafile")]
    pub single_data_file: bool,
    pub timestamp: String,
    #[serde(rename = "endtime")]
    pub end_time: String,
    #[serde(rename = "withoutglobals")]
    pub without_globals: bool,
    #[serde(rename = "withstatistics")]
    pub with_statistics: bool,
    pub status: BackupStatus,
}

impl BackupRecord {
    /// Incremental wins over data-only, which wins over metadata-only.
    pub fn backup_type(&self) -> BackupType {
        if self.incremental {
            BackupType::Incremental
        } else if self.data_only {
            BackupType::DataOnly
        } else if self.metadata_only {
            BackupType::MetadataOnly
        } else {
            BackupType::Full
        }
    }

    pub fn object_filtering(&self) -> ObjectFilter {
        if self.include_schema_filtered {
            ObjectFilter::IncludeSchema
        } else if self.exclude_schema_filtered {
            ObjectFilter::ExcludeSchema
        } else if self.include_table_filtered {
            ObjectFilter::IncludeTable
        } else if self.exclude_table_filtered {
            ObjectFilter::ExcludeTable
        } else {
            ObjectFilter::None
        }
    }

    pub fn flag_conflicts(&self) -> Vec<FlagConflict> {
        let mut conflicts = Vec::new();

        let types: Vec<BackupType> = [
            (self.incremental, BackupType::Incremental),
            (self.data_only, BackupType::DataOnly),
            (self.metadata_only, BackupType::MetadataOnly),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
        .collect();
        if types.len() > 1 {
            conflicts.push(FlagConflict::BackupType(types));
        }

        let filters: Vec<ObjectFilter> = [
            (self.include_schema_filtered, ObjectFilter::IncludeSchema),
            (self.exclude_schema_filtered, ObjectFilter::ExcludeSchema),
            (self.include_table_filtered, ObjectFilter::IncludeTable),
            (self.exclude_table_filtered, ObjectFilter::ExcludeTable),
        ]
        .into_iter()
        .filter_map(|(set, kind)| set.then_some(kind))
        .collect();
        if filters.len() > 1 {
            conflicts.push(FlagConflict::ObjectFilter(filters));
        }

        conflicts
    }

    /// An empty plugin name means the backup lives on local storage.
    pub fn is_local(&self) -> bool {
        self.plugin.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.status == BackupStatus::Failure
    }

    /// `YYYYMMDD` part of the timestamp, used in storage paths.
    pub fn date(&self) -> &str {
        self.timestamp.get(..8).unwrap_or(&self.timestamp)
    }

    pub fn duration(&self) -> Result<f64, TimestampParseError> {
        duration(&self.timestamp, &self.end_time)
    }

    pub fn references(&self, timestamp: &str) -> bool {
        self.restore_plan.iter().any(|e| e.timestamp == timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> BackupRecord {
        BackupRecord {
            timestamp: "20220401102430".into(),
            end_time: "20220401103445".into(),
            ..Default::default()
        }
    }

    #[test]
    fn backup_type_priority() {
        let mut r = record();
        assert_eq!(r.backup_type(), BackupType::Full);

        r.metadata_only = true;
        assert_eq!(r.backup_type(), BackupType::MetadataOnly);

        r.data_only = true;
        assert_eq!(r.backup_type(), BackupType::DataOnly);

        r.incremental = true;
        assert_eq!(r.backup_type(), BackupType::Incremental);
    }

    #[test]
    fn object_filter_priority() {
        let mut r = record();
        assert_eq!(r.object_filtering(), ObjectFilter::None);
        assert_eq!(r.object_filtering().to_string(), "");

        r.exclude_table_filtered = true;
        assert_eq!(r.object_filtering(), ObjectFilter::ExcludeTable);
        r.include_table_filtered = true;
        assert_eq!(r.object_filtering(), ObjectFilter::IncludeTable);
        r.exclude_schema_filtered = true;
        assert_eq!(r.object_filtering(), ObjectFilter::ExcludeSchema);
        r.include_schema_filtered = true;
        assert_eq!(r.object_filtering().to_string(), "include-schema");
    }

    #[test]
    fn classification_is_total_over_all_flag_combinations() {
        for bits in 0u8..8 {
            let mut r = record();
            r.incremental = bits & 1 != 0;
            r.data_only = bits & 2 != 0;
            r.metadata_only = bits & 4 != 0;
            let expected = if r.incremental {
                BackupType::Incremental
            } else if r.data_only {
                BackupType::DataOnly
            } else if r.metadata_only {
                BackupType::MetadataOnly
            } else {
                BackupType::Full
            };
            assert_eq!(r.backup_type(), expected);
        }
    }

    #[test]
    fn flag_conflicts_reported() {
        let mut r = record();
        assert!(r.flag_conflicts().is_empty());

        r.data_only = true;
        r.metadata_only = true;
        r.include_table_filtered = true;
        r.exclude_table_filtered = true;
        let conflicts = r.flag_conflicts();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(
            conflicts[0],
            FlagConflict::BackupType(vec![BackupType::DataOnly, BackupType::MetadataOnly])
        );
        assert!(conflicts[1].to_string().contains("include-table"));
    }

    #[test]
    fn parses_deletion_status() {
        assert_eq!(DeletionStatus::parse("").unwrap(), DeletionStatus::Active);
        assert_eq!(
            DeletionStatus::parse("In progress").unwrap(),
            DeletionStatus::InProgress
        );
        assert_eq!(
            DeletionStatus::parse("Plugin Backup Delete Failed").unwrap(),
            DeletionStatus::PluginFailed
        );
        assert_eq!(
            DeletionStatus::parse("Local Delete Failed").unwrap(),
            DeletionStatus::LocalFailed
        );
        let deleted = DeletionStatus::parse("20220401102430").unwrap();
        assert!(deleted.is_deleted());
        assert_eq!(deleted.as_legacy(), "20220401102430");

        assert!(DeletionStatus::parse("garbage").is_err());
        assert!(DeletionStatus::parse("2022040110243").is_err());
        assert!(DeletionStatus::parse("20221301102430").is_err());
        assert_eq!(
            DeletionStatus::from_legacy("garbage"),
            DeletionStatus::Unparseable("garbage".into())
        );
    }

    #[test]
    fn active_states() {
        assert!(is_active(""));
        assert!(!is_active("In progress"));
        assert!(!is_active("20220401102430"));
        assert!(is_active("Plugin Backup Delete Failed"));
        assert!(is_active("Local Delete Failed"));
        assert!(is_active("garbage"));
    }

    #[test]
    fn legacy_encoding_roundtrips_unparseable() {
        let status = DeletionStatus::from_legacy("deleted yesterday");
        assert_eq!(status.as_legacy(), "deleted yesterday");
        assert!(status.is_active());
    }

    #[test]
    fn durations() {
        assert_eq!(duration("20220401102430", "20220401103445").unwrap(), 615.0);
        assert!(duration("20220401102430", "bad").is_err());
        assert_eq!(record().duration().unwrap(), 615.0);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(3661.0), "01:01:01");
        assert_eq!(format_duration(0.0), "00:00:00");
        assert_eq!(format_duration(59.9), "00:00:59");
        assert_eq!(format_duration(100.0 * 3600.0), "100:00:00");
        assert_eq!(format_duration(-5.0), "00:00:00");
    }

    #[test]
    fn validates_timestamps() {
        assert!(validate_timestamp("20220401102430").is_ok());
        assert!(validate_timestamp("2022040110243a").is_err());
        assert!(validate_timestamp("202204011024300").is_err());
        assert!(validate_timestamp("").is_err());
    }

    #[test]
    fn yaml_keys_are_lowercase() {
        let mut r = record();
        r.restore_plan = vec![RestorePlanEntry::new("20220401102430", vec!["public.t1".into()])];
        r.date_deleted = DeletionStatus::InProgress;
        let yaml = serde_yaml::to_string(&r).unwrap();
        assert!(yaml.contains("datedeleted: In progress"));
        assert!(yaml.contains("restoreplan:"));
        assert!(yaml.contains("tablefqn:"));
        let back: BackupRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn local_and_date_helpers() {
        let mut r = record();
        assert!(r.is_local());
        assert_eq!(r.date(), "20220401");
        r.plugin = "gpbackup_s3_plugin".into();
        assert!(!r.is_local());
    }
}
