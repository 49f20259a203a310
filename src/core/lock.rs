//! Per-stage exclusive locks.
//!
//! Each stage takes a non-blocking exclusive lock on `<lock_dir>/<stage>.lock`.
//! A second invocation of the same stage sees the lock held and returns
//! immediately. The lock is released when the guard is dropped.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::domain::ItemType;

/// Batch stages that run under a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Discover,
    Process(ItemType),
    Summarize,
    Export,
    DigestDaily,
    DigestWeekly,
    /// Manual retry, skip and rating sync
    Admin,
}

impl Stage {
    /// File stem of the stage's lock file
    pub fn lock_name(&self) -> String {
        match self {
            Stage::Discover => "discover".to_string(),
            Stage::Process(item_type) => format!("process-{}", item_type),
            Stage::Summarize => "summarize".to_string(),
            Stage::Export => "export".to_string(),
            Stage::DigestDaily => "digest-daily".to_string(),
            Stage::DigestWeekly => "digest-weekly".to_string(),
            Stage::Admin => "admin".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock_name())
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to prepare lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held stage lock; released on drop
#[derive(Debug)]
pub struct StageLock {
    stage: Stage,
    path: PathBuf,
    // Keeps the OS lock alive
    _file: File,
}

impl StageLock {
    /// Try to take the lock for `stage` without blocking.
    ///
    /// Returns `Ok(None)` when another invocation holds it.
    pub fn try_acquire(lock_dir: &Path, stage: Stage) -> Result<Option<StageLock>, LockError> {
        fs::create_dir_all(lock_dir).map_err(|source| LockError::Io {
            path: lock_dir.to_path_buf(),
            source,
        })?;

        let path = lock_dir.join(format!("{}.lock", stage.lock_name()));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(%stage, path = %path.display(), "Acquired stage lock");
                Ok(Some(StageLock {
                    stage,
                    path,
                    _file: file,
                }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StageLock {
    fn drop(&mut self) {
        debug!(stage = %self.stage, "Released stage lock");
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_refused_until_drop() {
        let dir = TempDir::new().unwrap();

        let first = StageLock::try_acquire(dir.path(), Stage::Export).unwrap();
        assert!(first.is_some());

        let second = StageLock::try_acquire(dir.path(), Stage::Export).unwrap();
        assert!(second.is_none());

        drop(first);
        let third = StageLock::try_acquire(dir.path(), Stage::Export).unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn test_stages_lock_independently() {
        let dir = TempDir::new().unwrap();

        let _export = StageLock::try_acquire(dir.path(), Stage::Export).unwrap().unwrap();
        let episodes = StageLock::try_acquire(dir.path(), Stage::Process(ItemType::Episode)).unwrap();
        let newsletters =
            StageLock::try_acquire(dir.path(), Stage::Process(ItemType::Newsletter)).unwrap();

        assert!(episodes.is_some());
        assert!(newsletters.is_some());
        assert!(dir.path().join("process-episode.lock").exists());
    }
}
