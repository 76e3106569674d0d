//! Advisory lock on `<dir>/LOCK` so two processes cannot open the same
//! database directory at once.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use horizon_core::EngineError;

/// Holds the `LOCK` file open and advisory-locked for as long as the
/// database is open. Dropping it releases the lock.
pub struct DirectoryLock {
    _file: File,
    path: PathBuf,
}

impl DirectoryLock {
    /// Acquire the lock on `<dir>/LOCK`, creating the file if needed.
    /// Returns `EngineError::AlreadyLocked` if another handle (in this or
    /// another process) holds it.
    pub fn acquire(dir: &Path) -> Result<DirectoryLock, EngineError> {
        let path = dir.join("LOCK");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|_| EngineError::AlreadyLocked {
            path: path.clone(),
        })?;

        Ok(DirectoryLock { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        FileExt::unlock(&self._file).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquires_lock_on_fresh_directory() {
        let dir = tempdir().unwrap();
        let lock = DirectoryLock::acquire(dir.path()).unwrap();
        assert_eq!(lock.path(), dir.path().join("LOCK"));
    }

    #[test]
    fn second_acquire_in_same_process_fails_while_first_held() {
        let dir = tempdir().unwrap();
        let _first = DirectoryLock::acquire(dir.path()).unwrap();
        let second = DirectoryLock::acquire(dir.path());
        assert!(matches!(second, Err(EngineError::AlreadyLocked { .. })));
    }

    #[test]
    fn lock_can_be_reacquired_after_drop() {
        let dir = tempdir().unwrap();
        {
            let _lock = DirectoryLock::acquire(dir.path()).unwrap();
        }
        let reacquired = DirectoryLock::acquire(dir.path());
        assert!(reacquired.is_ok());
    }
}
