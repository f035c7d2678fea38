//! # Backman Architecture
//!
//! Backman manages the history catalog of database backups made by a
//! gpbackup-style engine: listing backups, deleting them (locally or through a
//! storage plugin) with dependency-aware cascades, cleaning old backups and
//! history entries, and fetching backup reports. It is a library that happens
//! to have a CLI client.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, sets up logging, renders tables        │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands                                │
//! │  - Validates timestamps, resolves clean cutoffs             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - One module per command, returns CmdResult                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │  cascade.rs / lifecycle.rs   │  storage/                    │
//! │  - dependents, cascade chain │  - plugin child processes    │
//! │  - date_deleted transitions  │  - local directory removal   │
//! └──────────────────────────────┴──────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Catalog Layer (store/)                                     │
//! │  - Catalog trait                                            │
//! │  - SqliteCatalog, YamlCatalog, one-shot YAML → SQLite move  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code takes Rust arguments and returns
//! `Result<CmdResult>`. It never prints and never exits; diagnostics go
//! through `tracing`.
//!
//! ## Testing Strategy
//!
//! 1. **Model, lifecycle, cascade, commands**: unit tests next to the code,
//!    run against in-memory SQLite catalogs and a scripted storage double.
//! 2. **Catalog backends**: unit tests on temp files, plus `tests/` checks
//!    that both backends answer the same queries the same way.
//! 3. **CLI**: `tests/cli.rs` drives the binary with `assert_cmd`.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: Business logic for each command
//! - [`cascade`]: Dependent lookup and cascade deletes
//! - [`lifecycle`]: Deletion state machine and eligibility predicates
//! - [`storage`]: Plugin and local storage boundary
//! - [`store`]: Catalog abstraction and backends
//! - [`model`]: Backup records, deletion status, timestamps
//! - [`config`]: Layered configuration
//! - [`error`]: Error types

pub mod api;
pub mod cascade;
pub mod commands;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod storage;
pub mod store;

#[cfg(test)]
mod test_utils;
