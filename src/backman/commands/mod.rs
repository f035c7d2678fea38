use crate::model::BackupRecord;

pub mod clean;
pub mod delete;
pub mod helpers;
pub mod history_clean;
pub mod info;
pub mod migrate;
pub mod report;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    /// Records listed by `backup-info`.
    pub listed_backups: Vec<BackupRecord>,
    /// Timestamps deleted or purged by this run.
    pub affected: Vec<String>,
    pub report: Option<String>,
    pub messages: Vec<CmdMessage>,
    /// At least one independent item failed; the run still completed.
    pub failed: bool,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    /// Records a per-item failure.
    pub fn add_failure(&mut self, message: impl Into<String>) {
        self.failed = true;
        self.messages.push(CmdMessage::error(message));
    }

    pub fn with_listed_backups(mut self, backups: Vec<BackupRecord>) -> Self {
        self.listed_backups = backups;
        self
    }

    pub fn with_report(mut self, report: String) -> Self {
        self.report = Some(report);
        self
    }
}
