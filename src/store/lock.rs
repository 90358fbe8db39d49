//! Inter-process file locks.

use super::StoreError;
use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

/// Exclusive advisory lock on a file, released on drop.
///
/// - **Unix**: `flock(2)`, so two handles in the same process also exclude
///   each other
/// - **Windows**: `LockFileEx`
///
/// Unlike a scratch lock, the file is left in place after unlocking so that
/// every process locks the same inode.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the lock on `path` is acquired, creating the file if needed.
    pub fn exclusive(path: &Path) -> Result<Self, StoreError> {
        let io_err = |err| StoreError::Io(path.to_path_buf(), err);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;
        file.lock_exclusive().map_err(io_err)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Acquire the lock only if it is free right now.
    pub fn try_exclusive(path: &Path) -> Result<Option<Self>, StoreError> {
        let io_err = |err| StoreError::Io(path.to_path_buf(), err);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(err) => Err(io_err(err)),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
