//! Advisory lock files.
//!
//! A lock is a file created with `create_new`. Holding the [`LockFile`] guard
//! means holding the lock; dropping it removes the file. Acquisition retries
//! until a timeout so concurrent LDB processes serialize on the same path.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Delay between acquisition attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Default time to wait for a contended lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Guard for an acquired lock file.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Acquire the lock at `path`, waiting up to `timeout`.
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Best effort; the pid only helps a human clear stale locks.
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(path = %path.display(), "lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        warn!(path = %path.display(), "lock acquisition timed out");
                        return Err(StoreError::LockTimeout(path));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        } else {
            debug!(path = %self.path.display(), "lock released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        {
            let lock = LockFile::acquire(&path, Duration::from_millis(50)).unwrap();
            assert!(lock.path().exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let _held = LockFile::acquire(&path, Duration::from_millis(50)).unwrap();
        let err = LockFile::acquire(&path, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(_)));
    }

    #[test]
    fn waiter_gets_lock_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.lock");
        let held = LockFile::acquire(&path, Duration::from_millis(50)).unwrap();
        let p2 = path.clone();
        let waiter = thread::spawn(move || LockFile::acquire(p2, Duration::from_secs(5)).is_ok());
        thread::sleep(Duration::from_millis(30));
        drop(held);
        assert!(waiter.join().unwrap());
    }
}
