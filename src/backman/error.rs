use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackmanError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("History catalog unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("Backup {timestamp} has dependent backups {dependents:?}; use --cascade to delete them")]
    DependentsExist {
        timestamp: String,
        dependents: Vec<String>,
    },

    #[error("Cascade delete of {timestamp} aborted: dependent {dependent} failed: {reason}")]
    CascadeFailed {
        timestamp: String,
        dependent: String,
        reason: String,
    },

    #[error("Backup {timestamp} is not eligible: {reason}")]
    Ineligible { timestamp: String, reason: String },

    #[error("Plugin {executable} {command} failed: {reason}")]
    Plugin {
        executable: String,
        command: String,
        reason: String,
    },

    #[error("Local delete of {timestamp} failed: {reason}")]
    LocalDelete { timestamp: String, reason: String },

    #[error("Could not acquire lock {path} after {attempts} attempts")]
    LockTimeout { path: PathBuf, attempts: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, BackmanError>;

impl BackmanError {
    /// Errors that make the whole catalog unusable, as opposed to a single record.
    pub fn is_catalog_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::LockTimeout { .. }
                | Self::Io(_)
                | Self::Sqlite(_)
                | Self::Yaml(_)
                | Self::Store(_)
        )
    }
}
