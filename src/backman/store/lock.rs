//! Advisory lock file guarding writes to the YAML catalog.
//!
//! The lock is a sibling file (`<catalog>.lck`) created with `O_EXCL`. Any
//! process that fails to create it sleeps for the retry interval and tries
//! again. By default there is no upper bound on attempts: giving up would
//! mean dropping a status change on the floor.

use crate::error::{BackmanError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(60);
pub const DEFAULT_WARN_AFTER: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub retry_interval: Duration,
    /// `None` waits forever.
    pub max_attempts: Option<u64>,
    /// Log a contention warning every this many failed attempts.
    pub warn_after: u64,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
            warn_after: DEFAULT_WARN_AFTER,
        }
    }
}

impl LockPolicy {
    pub fn from_millis(retry_interval_ms: u64, max_attempts: Option<u64>, warn_after: u64) -> Self {
        Self {
            retry_interval: Duration::from_millis(retry_interval_ms),
            max_attempts,
            warn_after,
        }
    }
}

/// Held lock; the lock file is removed on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn lock_path_for(target: &Path) -> PathBuf {
        let mut name = target.as_os_str().to_owned();
        name.push(".lck");
        PathBuf::from(name)
    }

    /// Blocks until the lock for `target` is held.
    pub fn acquire(target: &Path, policy: &LockPolicy) -> Result<Self> {
        let path = Self::lock_path_for(target);
        let mut attempts: u64 = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // The pid is informational only.
                    let _ = writeln!(file, "{}", std::process::id());
                    tracing::debug!(lock = %path.display(), attempts, "lock acquired");
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    attempts += 1;
                    if let Some(max) = policy.max_attempts {
                        if attempts >= max {
                            return Err(BackmanError::LockTimeout { path, attempts });
                        }
                    }
                    if policy.warn_after > 0 && attempts % policy.warn_after == 0 {
                        tracing::warn!(
                            lock = %path.display(),
                            attempts,
                            "waiting for history file lock held by another process"
                        );
                    }
                    thread::sleep(policy.retry_interval);
                }
                Err(err) => return Err(BackmanError::Io(err)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::error!(lock = %self.path.display(), error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_created_and_released() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("history.yaml");

        let lock = FileLock::acquire(&target, &LockPolicy::default()).unwrap();
        assert_eq!(lock.path(), dir.path().join("history.yaml.lck"));
        assert!(lock.path().exists());

        drop(lock);
        assert!(!dir.path().join("history.yaml.lck").exists());
    }

    #[test]
    fn bounded_policy_times_out_under_contention() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("history.yaml");
        let _held = FileLock::acquire(&target, &LockPolicy::default()).unwrap();

        let policy = LockPolicy::from_millis(1, Some(3), 1);
        let err = FileLock::acquire(&target, &policy).unwrap_err();
        assert!(matches!(err, BackmanError::LockTimeout { attempts: 3, .. }));
    }

    #[test]
    fn waits_until_released() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("history.yaml");
        let held = FileLock::acquire(&target, &LockPolicy::default()).unwrap();

        let waiter_target = target.clone();
        let waiter = std::thread::spawn(move || {
            let policy = LockPolicy::from_millis(5, None, 0);
            FileLock::acquire(&waiter_target, &policy).map(|_| ())
        });

        std::thread::sleep(Duration::from_millis(30));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    }
}
