use crate::error::DatasetResult;
use crate::types::ShardId;

pub mod lmdb;

pub use lmdb::LmdbShard;

/// Result of writing one record into a capacity-bounded shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    /// Committing the record would exceed the shard's capacity. Nothing was
    /// written.
    CapacityExceeded,
}

/// How a shard environment is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardAccess {
    ReadWrite,
    /// Read-only, registered in the engine's reader table.
    ReadOnly,
    /// Read-only without touching the engine's lock file, so readers can
    /// coexist with a writer in another process.
    ReadOnlyUnlocked,
}

impl ShardAccess {
    pub fn is_writable(&self) -> bool {
        matches!(self, ShardAccess::ReadWrite)
    }
}

/// One independently opened key-value store holding part of a dataset.
///
/// Keys are the single-byte encoding of dataset keys.
pub trait ShardStore: Send + Sync {
    fn id(&self) -> ShardId;
    fn put(&self, key: &[u8], value: &[u8]) -> DatasetResult<PutOutcome>;
    fn get(&self, key: &[u8]) -> DatasetResult<Option<Vec<u8>>>;
    /// Removes `key`, reporting whether it was present.
    fn delete(&self, key: &[u8]) -> DatasetResult<bool>;
    /// Every key in the shard, in the engine's ordering.
    fn keys(&self) -> DatasetResult<Vec<String>>;
    fn len(&self) -> DatasetResult<u64>;
    /// Flushes pending writes and releases the shard.
    fn close(self) -> DatasetResult<()>
    where
        Self: Sized;

    fn is_empty(&self) -> DatasetResult<bool> {
        Ok(self.len()? == 0)
    }
}
