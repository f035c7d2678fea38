use crate::commands::{CmdMessage, CmdResult};
use crate::error::{BackmanError, Result};
use crate::lifecycle::DeleteOutcome;
use crate::model::{format_timestamp, validate_timestamp};
use chrono::{Duration, Local, NaiveDateTime};
use std::path::Path;

/// Age threshold for the clean commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cutoff {
    OlderThanDays(u32),
    BeforeTimestamp(String),
}

impl Cutoff {
    /// Builds a cutoff from the two mutually exclusive options.
    pub fn from_options(older_than_days: Option<u32>, before_timestamp: Option<String>) -> Result<Self> {
        match (older_than_days, before_timestamp) {
            (Some(_), Some(_)) => Err(BackmanError::InvalidArgument(
                "--older-than-days and --before-timestamp are mutually exclusive".into(),
            )),
            (Some(days), None) => Ok(Self::OlderThanDays(days)),
            (None, Some(ts)) => Ok(Self::BeforeTimestamp(ts)),
            (None, None) => Err(BackmanError::InvalidArgument(
                "one of --older-than-days or --before-timestamp is required".into(),
            )),
        }
    }

    /// The cutoff as a 14-digit timestamp relative to `now`.
    pub fn resolve_at(&self, now: NaiveDateTime) -> Result<String> {
        match self {
            Self::OlderThanDays(days) => {
                let cutoff = now
                    .checked_sub_signed(Duration::days(i64::from(*days)))
                    .ok_or_else(|| {
                        BackmanError::InvalidArgument(format!("{} days is out of range", days))
                    })?;
                Ok(format_timestamp(&cutoff))
            }
            Self::BeforeTimestamp(ts) => {
                validate_timestamp(ts)?;
                Ok(ts.clone())
            }
        }
    }

    pub fn resolve(&self) -> Result<String> {
        self.resolve_at(Local::now().naive_local())
    }
}

pub fn validate_timestamps<I: AsRef<str>>(timestamps: &[I]) -> Result<()> {
    if timestamps.is_empty() {
        return Err(BackmanError::InvalidArgument(
            "at least one timestamp is required".into(),
        ));
    }
    timestamps
        .iter()
        .try_for_each(|ts| validate_timestamp(ts.as_ref()))
}

/// Paths given on the command line must be absolute; `flag` names the option
/// in the error.
pub fn validate_absolute_path(flag: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) if !path.is_absolute() => Err(BackmanError::InvalidArgument(format!(
            "{} must be an absolute path, got '{}'",
            flag,
            path.display()
        ))),
        _ => Ok(()),
    }
}

/// Adds the user-facing message for a delete outcome.
pub fn record_outcome(result: &mut CmdResult, outcome: &DeleteOutcome) {
    match outcome {
        DeleteOutcome::Deleted(ts) => {
            result.affected.push(ts.clone());
            result.add_message(CmdMessage::success(format!("Deleted backup {}", ts)));
        }
        DeleteOutcome::AlreadyDeleted(ts) => {
            result.add_message(CmdMessage::info(format!("Backup {} is already deleted", ts)));
        }
        DeleteOutcome::InProgress(ts) => {
            result.add_message(CmdMessage::warning(format!(
                "Backup {} is being deleted by another run; use --force to retry",
                ts
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_timestamp;

    #[test]
    fn cutoff_options_are_exclusive() {
        assert!(Cutoff::from_options(Some(1), Some("20220401000000".into())).is_err());
        assert!(Cutoff::from_options(None, None).is_err());
        assert_eq!(
            Cutoff::from_options(Some(7), None).unwrap(),
            Cutoff::OlderThanDays(7)
        );
    }

    #[test]
    fn older_than_days_counts_back_from_now() {
        let now = parse_timestamp("20220410120000").unwrap();
        assert_eq!(
            Cutoff::OlderThanDays(9).resolve_at(now).unwrap(),
            "20220401120000"
        );
        assert_eq!(
            Cutoff::OlderThanDays(0).resolve_at(now).unwrap(),
            "20220410120000"
        );
    }

    #[test]
    fn before_timestamp_is_validated() {
        let now = parse_timestamp("20220410120000").unwrap();
        assert!(matches!(
            Cutoff::BeforeTimestamp("2022-04-01".into()).resolve_at(now),
            Err(BackmanError::InvalidTimestamp(_))
        ));
        assert_eq!(
            Cutoff::BeforeTimestamp("20220401000000".into())
                .resolve_at(now)
                .unwrap(),
            "20220401000000"
        );
    }

    #[test]
    fn empty_timestamp_list_is_rejected() {
        let none: [&str; 0] = [];
        assert!(validate_timestamps(&none).is_err());
        assert!(validate_timestamps(&["20220401000000"]).is_ok());
        assert!(validate_timestamps(&["20220401000000", "bad"]).is_err());
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(validate_absolute_path("--backup-dir", None).is_ok());
        assert!(validate_absolute_path("--backup-dir", Some(Path::new("/data/backups"))).is_ok());

        let err = validate_absolute_path("--plugin-config", Some(Path::new("s3.yaml")))
            .unwrap_err();
        assert!(matches!(err, BackmanError::InvalidArgument(_)));
        assert!(err.to_string().contains("--plugin-config"));
    }
}
