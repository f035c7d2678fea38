//! Storage plugin invocation.
//!
//! Plugins are external executables with a fixed command contract:
//!
//! ```text
//! <executable> delete_backup <plugin_config> <timestamp>
//! <executable> restore_data  <plugin_config> <report_path>
//! ```
//!
//! A non-zero exit is a failure. Output on stderr with a zero exit is logged
//! but does not fail the call.

use super::BackupStorage;
use crate::error::{BackmanError, Result};
use crate::model::BackupRecord;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const DELETE_BACKUP: &str = "delete_backup";
pub const RESTORE_DATA: &str = "restore_data";

/// The plugin config file shared with the backup engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginConfig {
    #[serde(rename = "executablepath")]
    pub executable_path: PathBuf,
    #[serde(default)]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl PluginConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Scalar option rendered as a string.
    pub fn option(&self, key: &str) -> Option<String> {
        match self.options.get(key)? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PluginStorage {
    config_path: PathBuf,
    config: PluginConfig,
    report_file: Option<PathBuf>,
}

impl PluginStorage {
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            BackmanError::InvalidArgument(format!(
                "cannot read plugin config {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let config = PluginConfig::parse(&content)?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
            report_file: None,
        })
    }

    /// Overrides the derived report location.
    pub fn with_report_file(mut self, report_file: Option<PathBuf>) -> Self {
        self.report_file = report_file;
        self
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// `<folder>/backups/<YYYYMMDD>/<timestamp>/gpbackup_<timestamp>_report`
    pub fn report_path(&self, record: &BackupRecord) -> Result<PathBuf> {
        if let Some(path) = &self.report_file {
            return Ok(path.clone());
        }
        let folder = self.config.option("folder").ok_or_else(|| {
            BackmanError::InvalidArgument(format!(
                "plugin config {} has no 'folder' option; pass the report file path explicitly",
                self.config_path.display()
            ))
        })?;
        Ok(Path::new(&folder)
            .join("backups")
            .join(record.date())
            .join(&record.timestamp)
            .join(format!("gpbackup_{}_report", record.timestamp)))
    }

    fn run(&self, command: &str, argument: &str) -> Result<String> {
        let executable = &self.config.executable_path;
        let plugin_error = |reason: String| BackmanError::Plugin {
            executable: executable.display().to_string(),
            command: command.to_string(),
            reason,
        };

        tracing::debug!(
            executable = %executable.display(),
            command,
            argument,
            "invoking storage plugin"
        );
        let output = Command::new(executable)
            .arg(command)
            .arg(&self.config_path)
            .arg(argument)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| plugin_error(format!("failed to launch: {}", e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            let mut reason = format!("exited with {}", output.status);
            if !stderr.is_empty() {
                reason.push_str(": ");
                reason.push_str(&stderr);
            }
            return Err(plugin_error(reason));
        }
        if !stderr.is_empty() {
            tracing::error!(
                executable = %executable.display(),
                command,
                stderr = %stderr,
                "storage plugin wrote to stderr"
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl BackupStorage for PluginStorage {
    fn delete_backup(&self, record: &BackupRecord) -> Result<()> {
        self.run(DELETE_BACKUP, &record.timestamp).map(|_| ())
    }

    fn fetch_report(&self, record: &BackupRecord) -> Result<String> {
        let report_path = self.report_path(record)?;
        self.run(RESTORE_DATA, &report_path.to_string_lossy())
    }
}
