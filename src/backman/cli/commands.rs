//! # CLI Layer
//!
//! One possible client of the backman library. This is the only place that:
//! - parses arguments (clap) and exits the process
//! - installs the tracing subscriber
//! - writes tables and messages to the terminal
//!
//! `run()` loads configuration, applies flag overrides, opens the configured
//! catalog, dispatches to [`BackmanApi`] and renders the `CmdResult`.
//! Conflicting flags are rejected by clap before any of that happens; bad
//! timestamps and relative paths are rejected before the catalog is opened.

use super::render::{print_backups, print_messages, print_report};
use super::setup::{CatalogArgs, Cli, Commands, CutoffArgs, StorageArgs};
use backman::api::{self, BackmanApi};
use backman::cascade::CascadeOptions;
use backman::commands::helpers::{validate_absolute_path, validate_timestamps, Cutoff};
use backman::commands::CmdResult;
use backman::config::{BackmanConfig, DEFAULT_HISTORY_DB};
use backman::error::{BackmanError, Result};
use backman::model::validate_timestamp;
use backman::storage::Storage;
use backman::store::{open_catalog, Catalog};
use clap::error::ErrorKind;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

/// Whether every item of the command succeeded.
pub type Succeeded = bool;

pub fn run() -> Result<Succeeded> {
    let cli = parse_args();
    let config = load_config(&cli)?;
    init_logging(&config)?;

    match cli.command {
        Commands::BackupInfo {
            catalog,
            deleted,
            failed,
        } => {
            validate_catalog_args(&catalog)?;
            let api = open_api(&config, &catalog)?;
            let result = api.backup_info(deleted, failed)?;
            print_backups(&result.listed_backups);
            Ok(finish(result))
        }
        Commands::BackupDelete {
            catalog,
            timestamps,
            cascade,
            force,
            storage,
        } => {
            validate_timestamps(&timestamps)?;
            validate_catalog_args(&catalog)?;
            validate_storage_args(&storage)?;
            let mut api = open_api(&config, &catalog)?;
            let storage = open_storage(&storage)?;
            let opts = CascadeOptions { cascade, force };
            let result = api.backup_delete(&storage, &timestamps, opts)?;
            Ok(finish(result))
        }
        Commands::BackupClean {
            catalog,
            cutoff,
            cascade,
            storage,
        } => {
            let cutoff = to_cutoff(cutoff)?;
            validate_catalog_args(&catalog)?;
            validate_storage_args(&storage)?;
            let mut api = open_api(&config, &catalog)?;
            let storage = open_storage(&storage)?;
            let result = api.backup_clean(&storage, &cutoff, cascade)?;
            Ok(finish(result))
        }
        Commands::HistoryClean {
            catalog,
            cutoff,
            failed,
        } => {
            let cutoff = to_cutoff(cutoff)?;
            validate_catalog_args(&catalog)?;
            let mut api = open_api(&config, &catalog)?;
            let result = api.history_clean(&cutoff, failed)?;
            Ok(finish(result))
        }
        Commands::ReportInfo {
            catalog,
            timestamp,
            plugin_config,
            plugin_report_file_path,
        } => {
            validate_timestamp(&timestamp)?;
            validate_catalog_args(&catalog)?;
            validate_absolute_path("--plugin-config", plugin_config.as_deref())?;
            validate_absolute_path(
                "--plugin-report-file-path",
                plugin_report_file_path.as_deref(),
            )?;
            let api = open_api(&config, &catalog)?;
            let storage = Storage::from_options(
                plugin_config.as_deref(),
                None,
                plugin_report_file_path,
            )?;
            let mut result = api.report_info(&storage, &timestamp)?;
            if let Some(report) = result.report.take() {
                print_report(&report);
            }
            Ok(finish(result))
        }
        Commands::HistoryMigrate {
            history_files,
            history_db,
        } => {
            validate_absolute_path("--history-db", history_db.as_deref())?;
            for file in &history_files {
                validate_absolute_path("--history-file", Some(file.as_path()))?;
            }
            let db = history_db
                .or_else(|| config.history_db.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DB));
            let result = api::history_migrate(&db, &history_files)?;
            Ok(finish(result))
        }
    }
}

/// Argument errors exit with status 1; help and version exit cleanly.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
                _ => 1,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    }
}

fn load_config(cli: &Cli) -> Result<BackmanConfig> {
    let mut config = BackmanConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(file) = &cli.log_file {
        config.log_file = Some(file.clone());
    }
    Ok(config)
}

/// Logs go to stderr, and additionally to the log file when one is set.
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(config: &BackmanConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| {
            BackmanError::InvalidArgument(format!(
                "invalid log level '{}': {}",
                config.log_level, e
            ))
        })?;

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}

fn open_api(
    config: &BackmanConfig,
    args: &CatalogArgs,
) -> Result<BackmanApi<Box<dyn Catalog>>> {
    let mut config = config.clone();
    if args.history_db.is_some() || args.history_file.is_some() {
        config.history_db = args.history_db.clone();
        config.history_file = args.history_file.clone();
    }
    let kind = config.catalog_kind()?;
    tracing::debug!(catalog = %kind.path().display(), "opening history catalog");
    let catalog = open_catalog(&kind, config.lock_policy())?;
    Ok(BackmanApi::new(catalog).with_purge_batch_size(config.purge_batch_size))
}

fn validate_catalog_args(args: &CatalogArgs) -> Result<()> {
    validate_absolute_path("--history-db", args.history_db.as_deref())?;
    validate_absolute_path("--history-file", args.history_file.as_deref())
}

fn validate_storage_args(args: &StorageArgs) -> Result<()> {
    validate_absolute_path("--plugin-config", args.plugin_config.as_deref())?;
    validate_absolute_path("--backup-dir", args.backup_dir.as_deref())
}

fn open_storage(args: &StorageArgs) -> Result<Storage> {
    Storage::from_options(args.plugin_config.as_deref(), args.backup_dir.clone(), None)
}

/// Validated up front so a bad cutoff never opens the catalog.
fn to_cutoff(args: CutoffArgs) -> Result<Cutoff> {
    let cutoff = Cutoff::from_options(args.older_than_days, args.before_timestamp)?;
    cutoff.resolve()?;
    Ok(cutoff)
}

fn finish(result: CmdResult) -> Succeeded {
    print_messages(&result.messages);
    !result.failed
}
