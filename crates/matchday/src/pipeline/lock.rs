//! Single-runner lock over a data root.
//!
//! Uses `fs2` advisory locks. The guard releases the lock on drop; a JSON
//! sidecar next to the lock file names the holder for operators.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Run lock is held by another process: {0}")]
    Locked(PathBuf),

    #[error("Failed to create lock file: {0}")]
    CreateFailed(#[source] io::Error),

    #[error("Failed to acquire lock: {0}")]
    AcquireFailed(#[source] io::Error),
}

pub struct RunLockGuard {
    _file: File,
    lock_path: PathBuf,
    sidecar_path: Option<PathBuf>,
}

impl RunLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl std::fmt::Debug for RunLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLockGuard")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

#[derive(Serialize)]
struct LockSidecar {
    pid: u32,
    acquired_at: String,
}

fn sidecar_path_for(lock_path: &Path) -> PathBuf {
    lock_path.with_extension("lock.json")
}

fn write_sidecar(lock_path: &Path) -> Option<PathBuf> {
    let sidecar = LockSidecar {
        pid: std::process::id(),
        acquired_at: Utc::now().to_rfc3339(),
    };
    let path = sidecar_path_for(lock_path);
    match serde_json::to_vec_pretty(&sidecar)
        .map_err(io::Error::other)
        .and_then(|payload| fs::write(&path, payload))
    {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Failed to write lock sidecar {}: {}", path.display(), e);
            None
        }
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        debug!("Releasing run lock: {}", self.lock_path.display());
        if let Some(path) = &self.sidecar_path {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove lock sidecar {}: {}", path.display(), e);
            }
        }
    }
}

/// Non-blocking exclusive lock. Fails with [`LockError::Locked`] when held elsewhere.
pub fn try_lock_exclusive(lock_path: &Path) -> Result<RunLockGuard, LockError> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(LockError::CreateFailed)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(LockError::CreateFailed)?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            info!("Acquired run lock: {}", lock_path.display());
            let sidecar_path = write_sidecar(lock_path);
            Ok(RunLockGuard {
                _file: file,
                lock_path: lock_path.to_path_buf(),
                sidecar_path,
            })
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            Err(LockError::Locked(lock_path.to_path_buf()))
        }
        Err(e) => Err(LockError::AcquireFailed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_is_refused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index/.pipeline.lock");

        let guard = try_lock_exclusive(&path).unwrap();
        assert!(sidecar_path_for(&path).exists());
        assert!(matches!(
            try_lock_exclusive(&path),
            Err(LockError::Locked(_))
        ));

        drop(guard);
        assert!(!sidecar_path_for(&path).exists());
        assert!(try_lock_exclusive(&path).is_ok());
    }
}
