//! On-disk naming of shard directories under a dataset root.
//!
//! Shard `n` lives in `lmdb_dataset_` followed by `n` zero-padded to twelve
//! decimal digits, e.g. `lmdb_dataset_000000000007`.

use std::path::{Path, PathBuf};

use crate::error::DatasetResult;
use crate::types::ShardId;

pub const SHARD_DIR_PREFIX: &str = "lmdb_dataset_";
pub const SHARD_ID_DIGITS: usize = 12;
pub const SHARD_DIR_NAME_LEN: usize = SHARD_DIR_PREFIX.len() + SHARD_ID_DIGITS;

/// Largest id representable with [`SHARD_ID_DIGITS`] digits.
pub const MAX_SHARD_ID: ShardId = 999_999_999_999;

pub fn shard_dir_name(id: ShardId) -> String {
    format!("{SHARD_DIR_PREFIX}{id:012}")
}

pub fn shard_dir(root: &Path, id: ShardId) -> PathBuf {
    root.join(shard_dir_name(id))
}

/// Parses a directory name produced by [`shard_dir_name`].
///
/// Anything other than the exact prefix followed by exactly twelve ASCII
/// digits is rejected.
pub fn parse_shard_dir_name(name: &str) -> Option<ShardId> {
    if name.len() != SHARD_DIR_NAME_LEN {
        return None;
    }
    let digits = name.strip_prefix(SHARD_DIR_PREFIX)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Shard ids encoded in `names`, sorted ascending. Non-matching names are
/// ignored and gaps are preserved.
pub fn discover_names<I, S>(names: I) -> Vec<ShardId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<ShardId> = names
        .into_iter()
        .filter_map(|name| parse_shard_dir_name(name.as_ref()))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Scans `root` for shard directories and returns their ids sorted ascending.
pub fn discover(root: &Path) -> DatasetResult<Vec<ShardId>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    Ok(discover_names(names))
}
