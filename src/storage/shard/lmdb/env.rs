use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, Error as HeedError};

use crate::error::{DatasetError, DatasetResult};
use crate::storage::shard::ShardAccess;

pub(super) type RecordsDb = Database<Bytes, Bytes>;

const PAGE_SIZE: usize = 4096;

pub(super) struct EnvHandles {
    pub(super) env: Env,
    pub(super) records_db: RecordsDb,
}

/// Rounds a capacity in bytes up to whole pages.
pub(super) fn page_aligned(map_size: usize) -> usize {
    map_size
        .checked_next_multiple_of(PAGE_SIZE)
        .unwrap_or(usize::MAX / PAGE_SIZE * PAGE_SIZE)
}

pub(super) fn open(path: &Path, map_size: usize, access: ShardAccess) -> DatasetResult<EnvHandles> {
    match access {
        ShardAccess::ReadWrite => {
            std::fs::create_dir_all(path)?;
        }
        ShardAccess::ReadOnly | ShardAccess::ReadOnlyUnlocked => {
            if !path.is_dir() {
                return Err(DatasetError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "shard directory does not exist",
                });
            }
        }
    }

    let mut options = EnvOpenOptions::new();
    options.map_size(page_aligned(map_size));

    let env = unsafe {
        match access {
            ShardAccess::ReadWrite => {}
            ShardAccess::ReadOnly => {
                options.flags(EnvFlags::READ_ONLY);
            }
            ShardAccess::ReadOnlyUnlocked => {
                options.flags(EnvFlags::READ_ONLY | EnvFlags::NO_LOCK);
            }
        }

        match options.open(path) {
            Ok(env) => env,
            Err(HeedError::BadOpenOptions { env, .. }) => env,
            Err(err) => {
                tracing::error!(
                    path = ?path,
                    map_size,
                    ?access,
                    ?err,
                    "Failed to open shard environment"
                );
                return Err(err.into());
            }
        }
    };

    let existing_db = {
        let txn = env.read_txn()?;
        let db = env.open_database::<Bytes, Bytes>(&txn, None)?;
        txn.commit()?;
        db
    };

    let records_db = match existing_db {
        Some(db) => db,
        None if access.is_writable() => {
            let mut txn = env.write_txn()?;
            let db = env.create_database::<Bytes, Bytes>(&mut txn, None)?;
            txn.commit()?;
            db
        }
        None => {
            return Err(DatasetError::InvalidPath {
                path: path.to_path_buf(),
                reason: "shard environment has no record database",
            })
        }
    };

    Ok(EnvHandles { env, records_db })
}
