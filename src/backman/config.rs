//! # Configuration
//!
//! Settings are loaded with [`confique`] from, in priority order:
//! 1. **Command-line flags**: applied on top by the CLI layer.
//! 2. **Environment variables**: `BACKMAN_HISTORY_DB`, `BACKMAN_LOG_LEVEL`, ...
//! 3. **Config file**: `--config <path>`, else `backman.toml` in the
//!    OS-appropriate config directory (via `directories`).
//! 4. **Compiled defaults**.
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `history_db` | `gpbackup_history.db` | SQLite history catalog |
//! | `history_file` | unset | YAML history catalog (selects the YAML backend) |
//! | `log_level` | `info` | tracing filter directive |
//! | `log_file` | unset | additional log destination |
//! | `lock_retry_interval_ms` | `60` | wait between lock attempts |
//! | `lock_max_attempts` | unset | give up after this many attempts |
//! | `lock_warn_after` | `100` | warn every N failed attempts |
//! | `purge_batch_size` | `100` | timestamps removed per transaction (at most 999) |

use crate::error::{BackmanError, Result};
use crate::store::{CatalogKind, LockPolicy};
use confique::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "backman.toml";
pub const DEFAULT_HISTORY_DB: &str = "gpbackup_history.db";

#[derive(Config, Debug, Clone, PartialEq, Eq)]
pub struct BackmanConfig {
    /// SQLite history database.
    #[config(env = "BACKMAN_HISTORY_DB")]
    pub history_db: Option<PathBuf>,

    /// YAML history file. Mutually exclusive with `history_db`.
    #[config(env = "BACKMAN_HISTORY_FILE")]
    pub history_file: Option<PathBuf>,

    #[config(env = "BACKMAN_LOG_LEVEL", default = "info")]
    pub log_level: String,

    #[config(env = "BACKMAN_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[config(env = "BACKMAN_LOCK_RETRY_INTERVAL_MS", default = 60)]
    pub lock_retry_interval_ms: u64,

    /// Unset waits for the history file lock forever.
    #[config(env = "BACKMAN_LOCK_MAX_ATTEMPTS")]
    pub lock_max_attempts: Option<u64>,

    #[config(env = "BACKMAN_LOCK_WARN_AFTER", default = 100)]
    pub lock_warn_after: u64,

    #[config(env = "BACKMAN_PURGE_BATCH_SIZE", default = 100)]
    pub purge_batch_size: usize,
}

/// `backman.toml` in the user's config directory, if one can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "backman").map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

impl BackmanConfig {
    /// Compiled defaults only, with no file or environment layered on.
    pub fn defaults() -> Result<Self> {
        Ok(Self::builder().load()?)
    }

    /// Loads environment and file layers. An explicit file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(BackmanError::InvalidArgument(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
                builder = builder.file(path);
            }
            None => {
                if let Some(path) = default_config_path() {
                    builder = builder.file(path);
                }
            }
        }
        Ok(builder.load()?)
    }

    /// The configured catalog backend.
    pub fn catalog_kind(&self) -> Result<CatalogKind> {
        match (&self.history_db, &self.history_file) {
            (Some(_), Some(_)) => Err(BackmanError::InvalidArgument(
                "history_db and history_file are mutually exclusive".into(),
            )),
            (None, Some(file)) => Ok(CatalogKind::Yaml(file.clone())),
            (Some(db), None) => Ok(CatalogKind::Sqlite(db.clone())),
            (None, None) => Ok(CatalogKind::Sqlite(PathBuf::from(DEFAULT_HISTORY_DB))),
        }
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy::from_millis(
            self.lock_retry_interval_ms,
            self.lock_max_attempts,
            self.lock_warn_after,
        )
    }
}
