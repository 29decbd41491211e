//! Single-instance process lock
//!
//! Only one updater may drain the queue at a time. The lock is an OS
//! advisory lock on a well-known file; the kernel drops it when the holder
//! exits, so a crashed run never leaves the next one locked out.
//!
//! ```rust,ignore
//! let lock = ProcessLock::new("/run/cdn-updater.lock");
//! let _guard = lock.try_acquire()?; // fails fast with LockContention
//! reconciler.run_pass().await?;
//! // guard dropped here, lock released
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Lock file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique id of this acquisition
    pub holder_id: Uuid,
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            holder_id: Uuid::new_v4(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid {} since {} ({})",
            self.pid,
            self.acquired_at.to_rfc3339(),
            self.holder_id
        )
    }
}

/// Advisory lock on a file path
#[derive(Debug, Clone)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the lock without waiting
    ///
    /// # Errors
    ///
    /// - [`SyncError::LockContention`] if another process holds the lock
    /// - [`SyncError::Lock`] if the lock file cannot be created or written
    pub fn try_acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                let holder = read_info(&mut file).map(|info| info.to_string());
                warn!(
                    path = %self.path.display(),
                    holder = holder.as_deref().unwrap_or("unknown"),
                    "Process lock is held by another updater"
                );
                return Err(SyncError::LockContention {
                    path: self.path.clone(),
                    holder,
                });
            }
            Err(TryLockError::Error(e)) => return Err(self.io_error(e)),
        }

        let info = LockInfo::current();
        write_info(&mut file, &info).map_err(|e| self.io_error(e))?;

        info!(
            path = %self.path.display(),
            holder_id = %info.holder_id,
            "Process lock acquired"
        );

        Ok(LockGuard {
            file,
            path: self.path.clone(),
            info,
        })
    }

    /// Holder recorded in the lock file, if readable
    ///
    /// The file keeps the last holder's details after release, so this does
    /// not tell whether the lock is currently held.
    pub fn last_holder(&self) -> Option<LockInfo> {
        let mut file = File::open(&self.path).ok()?;
        read_info(&mut file)
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Lock {
            path: self.path.clone(),
            source,
        }
    }
}

fn read_info(file: &mut File) -> Option<LockInfo> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}

fn write_info(file: &mut File, info: &LockInfo) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    serde_json::to_writer(&mut *file, info)?;
    file.flush()
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
    info: LockInfo,
}

impl LockGuard {
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Never unlink: every run must lock the same inode
        match self.file.unlock() {
            Ok(()) => debug!(path = %self.path.display(), "Process lock released"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to release process lock explicitly"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProcessLock::new(dir.path().join("updater.lock"));

        let guard = lock.try_acquire().unwrap();
        assert_eq!(guard.info().pid, std::process::id());
        drop(guard);

        // Reacquirable after release
        let again = lock.try_acquire().unwrap();
        assert_eq!(again.path(), lock.path());
    }

    #[test]
    fn test_contention_reports_holder() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProcessLock::new(dir.path().join("updater.lock"));

        let guard = lock.try_acquire().unwrap();
        let second = ProcessLock::new(lock.path()).try_acquire();

        match second {
            Err(SyncError::LockContention { path, holder }) => {
                assert_eq!(path, lock.path());
                let holder = holder.expect("holder should be recorded");
                assert!(holder.contains(&guard.info().holder_id.to_string()));
            }
            other => panic!("expected LockContention, got {:?}", other),
        }
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProcessLock::new(dir.path().join("run/cdn/updater.lock"));

        let _guard = lock.try_acquire().unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn test_last_holder_survives_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ProcessLock::new(dir.path().join("updater.lock"));

        let holder_id = {
            let guard = lock.try_acquire().unwrap();
            guard.info().holder_id
        };

        assert!(lock.path().exists());
        assert_eq!(lock.last_holder().unwrap().holder_id, holder_id);
    }

    #[test]
    fn test_unusable_lock_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for writing as a lock file
        let lock = ProcessLock::new(dir.path());

        assert!(matches!(lock.try_acquire(), Err(SyncError::Lock { .. })));
    }
}
