//! Advisory file locking for the file-backed store.
//!
//! The lock lives on a sidecar `<store>.lock` file rather than the store
//! itself, so readers can open the store freely.  `flock(2)` locks belong to
//! the open file description: two guards acquired in the same process
//! through separate `open` calls exclude each other just as two processes
//! do.

use std::path::{Path, PathBuf};

use sealtrail_contracts::error::{SealError, SealResult};

/// Compute the lockfile path: `<store_path>.lock`.
pub(crate) fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut p = store_path.as_os_str().to_owned();
    p.push(".lock");
    PathBuf::from(p)
}

fn open_lock_file(lock_path: &Path) -> SealResult<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| SealError::LockError {
            reason: format!("failed to open lock file '{}': {}", lock_path.display(), e),
        })
}

/// RAII guard that holds an exclusive `flock` on the lock file.  The lock is
/// released when the guard is dropped (the file descriptor is closed).
#[cfg(unix)]
pub(crate) struct FileLockGuard {
    _file: std::fs::File,
}

#[cfg(unix)]
impl FileLockGuard {
    /// Block until the exclusive lock is held.
    pub(crate) fn exclusive(lock_path: &Path) -> SealResult<Self> {
        use std::os::unix::io::AsRawFd;

        let file = open_lock_file(lock_path)?;
        loop {
            // SAFETY: `file` is a valid open File whose fd stays valid for the
            // lifetime of the guard; flock(2) has no memory-safety
            // preconditions and the lock is released when the fd is closed.
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if ret == 0 {
                return Ok(Self { _file: file });
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(SealError::LockError {
                    reason: format!("flock on '{}' failed: {}", lock_path.display(), err),
                });
            }
        }
    }
}

/// Fallback guard for platforms without `flock`.
///
/// Serializes writers within this process only; concurrent writers in other
/// processes are not excluded.
#[cfg(not(unix))]
pub(crate) struct FileLockGuard {
    _file: std::fs::File,
    _guard: std::sync::MutexGuard<'static, ()>,
}

#[cfg(not(unix))]
impl FileLockGuard {
    pub(crate) fn exclusive(lock_path: &Path) -> SealResult<Self> {
        static PROCESS_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

        let guard = PROCESS_LOCK.lock().map_err(|e| SealError::LockError {
            reason: format!("process-local store lock poisoned: {}", e),
        })?;
        let file = open_lock_file(lock_path)?;
        Ok(Self { _file: file, _guard: guard })
    }
}
