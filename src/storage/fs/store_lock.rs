use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

use fs2::FileExt;

use crate::error::{DatasetError, DatasetResult};
use crate::facade::DatasetMode;

pub const LOCK_FILE_NAME: &str = "dataset.lock";

/// Advisory lock on a dataset root, held for the lifetime of an open
/// read-write (exclusive) or read-only (shared) [`LmdbDataset`](crate::LmdbDataset).
#[derive(Debug)]
pub struct DatasetLockGuard {
    file: File,
}

impl DatasetLockGuard {
    /// Takes the lock matching `mode`.
    ///
    /// Read-only opens of a root that has never been opened read-write (no
    /// lock file) proceed without a lock and return `Ok(None)`.
    pub fn acquire(root: &Path, mode: DatasetMode) -> DatasetResult<Option<Self>> {
        if mode.is_read_write() {
            fs::create_dir_all(root)?;
        }

        let lock_path = root.join(LOCK_FILE_NAME);
        let file = match OpenOptions::new()
            .create(mode.is_read_write())
            .read(true)
            .write(mode.is_read_write())
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(err) if mode.is_read_only() && err.kind() == ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let requested = match mode {
            DatasetMode::ReadWrite => "exclusive",
            DatasetMode::ReadOnly => "shared",
        };

        let lock_result = match mode {
            DatasetMode::ReadWrite => FileExt::try_lock_exclusive(&file),
            DatasetMode::ReadOnly => FileExt::try_lock_shared(&file),
        };

        if lock_result.is_err() {
            return Err(DatasetError::DataDirLocked {
                path: lock_path,
                requested,
            });
        }

        Ok(Some(Self { file }))
    }
}

impl Drop for DatasetLockGuard {
    fn drop(&mut self) {
        // The OS releases the lock with the descriptor anyway.
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn exclusive_lock_rejects_second_holder_until_dropped() {
        let dir = tempdir().unwrap();
        let first = DatasetLockGuard::acquire(dir.path(), DatasetMode::ReadWrite)
            .unwrap()
            .expect("read-write always locks");

        match DatasetLockGuard::acquire(dir.path(), DatasetMode::ReadWrite) {
            Err(DatasetError::DataDirLocked { requested, .. }) => assert_eq!(requested, "exclusive"),
            other => panic!("unexpected result: {other:?}"),
        }

        drop(first);
        DatasetLockGuard::acquire(dir.path(), DatasetMode::ReadWrite)
            .unwrap()
            .expect("lock is free again");
    }

    #[test]
    fn read_only_without_lock_file_skips_locking() {
        let dir = tempdir().unwrap();
        let guard = DatasetLockGuard::acquire(dir.path(), DatasetMode::ReadOnly).unwrap();
        assert!(guard.is_none());
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
    }
}
