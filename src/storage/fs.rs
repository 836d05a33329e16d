//! Filesystem helpers shared by persistence components.

pub mod store_lock;

pub use store_lock::DatasetLockGuard;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::DatasetResult;

/// Sync directory entries to disk to guarantee metadata durability.
pub fn sync_directory(path: &Path) -> DatasetResult<()> {
    // Opening directories is platform-dependent. `std::fs::File::open` works on Linux
    // and macOS as long as the path exists.
    let dir = std::fs::File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

/// Replaces `path` with `contents` so readers observe either the old or the
/// new file, never a truncated one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> DatasetResult<()> {
    let tmp_path = path.with_extension("tmp");

    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            sync_directory(parent)?;
        }
    }

    Ok(())
}
