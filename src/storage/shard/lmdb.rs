use std::path::{Path, PathBuf};

use heed::types::DecodeIgnore;
use heed::{Env, Error as HeedError, MdbError};

use crate::codec::decode_key;
use crate::error::{DatasetError, DatasetResult};
use crate::storage::shard::{PutOutcome, ShardAccess, ShardStore};
use crate::types::ShardId;

mod env;

use env::RecordsDb;

/// A shard backed by one LMDB environment.
///
/// The environment's map size is the shard's capacity: a write that would
/// grow the data file past it reports [`PutOutcome::CapacityExceeded`].
pub struct LmdbShard {
    id: ShardId,
    path: PathBuf,
    access: ShardAccess,
    capacity: usize,
    env: Env,
    records_db: RecordsDb,
}

impl LmdbShard {
    /// Opens (creating it for [`ShardAccess::ReadWrite`]) the environment at `path`.
    ///
    /// `capacity` is rounded up to whole 4 KiB pages.
    pub fn open(
        path: impl AsRef<Path>,
        id: ShardId,
        capacity: usize,
        access: ShardAccess,
    ) -> DatasetResult<Self> {
        let path = path.as_ref();
        let handles = env::open(path, capacity, access)?;
        tracing::debug!(shard = id, path = ?path, capacity, ?access, "Opened shard");

        Ok(Self {
            id,
            path: path.to_path_buf(),
            access,
            capacity: env::page_aligned(capacity),
            env: handles.env,
            records_db: handles.records_db,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn access(&self) -> ShardAccess {
        self.access
    }

    /// Configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Map size actually in effect, which for read-only opens may be the
    /// larger size recorded by the writer.
    pub fn effective_map_size(&self) -> usize {
        self.env.info().map_size
    }

    fn ensure_writable(&self, operation: &'static str) -> DatasetResult<()> {
        if self.access.is_writable() {
            Ok(())
        } else {
            Err(DatasetError::ReadOnlyOperation { operation })
        }
    }
}

fn is_map_full(err: &HeedError) -> bool {
    matches!(err, HeedError::Mdb(MdbError::MapFull))
}

impl ShardStore for LmdbShard {
    fn id(&self) -> ShardId {
        self.id
    }

    fn put(&self, key: &[u8], value: &[u8]) -> DatasetResult<PutOutcome> {
        self.ensure_writable("put")?;

        let mut txn = self.env.write_txn()?;
        match self.records_db.put(&mut txn, key, value) {
            Ok(()) => {}
            // Dropping the transaction aborts it.
            Err(err) if is_map_full(&err) => return Ok(PutOutcome::CapacityExceeded),
            Err(err) => return Err(err.into()),
        }
        match txn.commit() {
            Ok(()) => Ok(PutOutcome::Stored),
            Err(err) if is_map_full(&err) => Ok(PutOutcome::CapacityExceeded),
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, key: &[u8]) -> DatasetResult<Option<Vec<u8>>> {
        let txn = self.env.read_txn()?;
        let value = self.records_db.get(&txn, key)?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn delete(&self, key: &[u8]) -> DatasetResult<bool> {
        self.ensure_writable("delete")?;

        let mut txn = self.env.write_txn()?;
        let found = self.records_db.delete(&mut txn, key)?;
        txn.commit()?;
        Ok(found)
    }

    fn keys(&self) -> DatasetResult<Vec<String>> {
        let txn = self.env.read_txn()?;
        let keys_only = self.records_db.remap_data_type::<DecodeIgnore>();
        let mut keys = Vec::new();
        for entry in keys_only.iter(&txn)? {
            let (key, ()) = entry?;
            keys.push(decode_key(key));
        }
        Ok(keys)
    }

    fn len(&self) -> DatasetResult<u64> {
        let txn = self.env.read_txn()?;
        Ok(self.records_db.len(&txn)?)
    }

    fn close(self) -> DatasetResult<()> {
        if self.access.is_writable() {
            self.env.force_sync()?;
        }
        tracing::debug!(shard = self.id, path = ?self.path, "Closed shard");
        Ok(())
    }
}
