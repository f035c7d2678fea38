use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backman", bin_name = "backman", version)]
#[command(
    about = "Manage the history catalog of gpbackup-style backups",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: backman.toml in the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "backman=trace"
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Which history catalog to use.
#[derive(Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// SQLite history database (default: gpbackup_history.db)
    #[arg(long, value_name = "PATH", conflicts_with = "history_file")]
    pub history_db: Option<PathBuf>,

    /// YAML history file
    #[arg(long, value_name = "PATH")]
    pub history_file: Option<PathBuf>,
}

/// Where physical backup data lives.
#[derive(Args, Debug, Clone, Default)]
pub struct StorageArgs {
    /// Storage plugin config file, required for plugin backups
    #[arg(long, value_name = "PATH")]
    pub plugin_config: Option<PathBuf>,

    /// Backup directory for local backups (default: the recorded one)
    #[arg(long, value_name = "PATH")]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct CutoffArgs {
    /// Select backups older than this many days
    #[arg(long, value_name = "DAYS")]
    pub older_than_days: Option<u32>,

    /// Select backups taken before this timestamp (YYYYMMDDHHMMSS)
    #[arg(long, value_name = "TIMESTAMP")]
    pub before_timestamp: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List backups in the history catalog
    BackupInfo {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Include deleted backups
        #[arg(long)]
        deleted: bool,

        /// Include failed backups
        #[arg(long)]
        failed: bool,
    },

    /// Delete backups and mark them deleted in the catalog
    BackupDelete {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Backup timestamp; repeat for several backups
        #[arg(long = "timestamp", value_name = "TIMESTAMP", required = true)]
        timestamps: Vec<String>,

        /// Delete dependent incremental backups first
        #[arg(long)]
        cascade: bool,

        /// Retry backups that are deleted or mid-deletion
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Delete all backups older than a cutoff
    BackupClean {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        cutoff: CutoffArgs,

        /// Delete dependent incremental backups first
        #[arg(long)]
        cascade: bool,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Remove catalog entries of deleted backups older than a cutoff
    HistoryClean {
        #[command(flatten)]
        catalog: CatalogArgs,

        #[command(flatten)]
        cutoff: CutoffArgs,

        /// Also remove entries of failed backups
        #[arg(long)]
        failed: bool,
    },

    /// Print the report of a backup
    ReportInfo {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Backup timestamp
        #[arg(long, value_name = "TIMESTAMP")]
        timestamp: String,

        /// Storage plugin config file
        #[arg(long, value_name = "PATH")]
        plugin_config: Option<PathBuf>,

        /// Report location inside the plugin storage
        #[arg(long, value_name = "PATH")]
        plugin_report_file_path: Option<PathBuf>,
    },

    /// Move YAML history files into the SQLite database
    HistoryMigrate {
        /// YAML history file; repeat for several files
        #[arg(long = "history-file", value_name = "PATH", required = true)]
        history_files: Vec<PathBuf>,

        /// Target SQLite database (default: gpbackup_history.db)
        #[arg(long, value_name = "PATH")]
        history_db: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("backman").chain(args.iter().copied()))
    }

    #[test]
    fn delete_takes_repeated_timestamps() {
        let cli = parse(&[
            "backup-delete",
            "--timestamp",
            "20220401000000",
            "--timestamp",
            "20220402000000",
            "--cascade",
            "--plugin-config",
            "/etc/s3.yaml",
        ])
        .unwrap();
        match cli.command {
            Commands::BackupDelete {
                timestamps,
                cascade,
                force,
                storage,
                ..
            } => {
                assert_eq!(timestamps, vec!["20220401000000", "20220402000000"]);
                assert!(cascade);
                assert!(!force);
                assert_eq!(storage.plugin_config, Some(PathBuf::from("/etc/s3.yaml")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn catalog_flags_conflict() {
        let err = parse(&[
            "backup-info",
            "--history-db",
            "a.db",
            "--history-file",
            "a.yaml",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn cutoff_flags_conflict_and_are_required() {
        let err = parse(&[
            "backup-clean",
            "--older-than-days",
            "3",
            "--before-timestamp",
            "20220401000000",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);

        assert!(parse(&["history-clean"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["backup-info", "--deleted", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn migrate_takes_multiple_files() {
        let cli = parse(&[
            "history-migrate",
            "--history-file",
            "a.yaml",
            "--history-file",
            "b.yaml",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::HistoryMigrate { ref history_files, .. } if history_files.len() == 2
        ));
    }
}
