use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};
use crate::storage::key_index;

/// 1 GiB per shard.
pub const DEFAULT_SHARD_CAPACITY: usize = 1 << 30;

/// 100 TiB: the unsharded store relies on the file system to grow lazily.
#[cfg(target_pointer_width = "64")]
pub const DEFAULT_SINGLE_STORE_CAPACITY: usize = 100 << 40;

/// The whole address space on targets that cannot map 100 TiB.
#[cfg(not(target_pointer_width = "64"))]
pub const DEFAULT_SINGLE_STORE_CAPACITY: usize = usize::MAX;

/// Smallest accepted shard capacity (64 KiB).
pub const MIN_SHARD_CAPACITY: usize = 64 << 10;

/// Operating mode for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl DatasetMode {
    pub fn is_read_only(&self) -> bool {
        matches!(self, DatasetMode::ReadOnly)
    }

    pub fn is_read_write(&self) -> bool {
        matches!(self, DatasetMode::ReadWrite)
    }
}

/// How the key index is obtained when a dataset opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexRecovery {
    /// Trust `keys.json` (an absent file is an empty index).
    #[default]
    Persisted,
    /// Rebuild from the shards when `keys.json` is missing but shards exist,
    /// or when it references shards that are not on disk.
    RebuildIfStale,
    /// Always rebuild from the shards.
    Rebuild,
}

/// Configuration for opening an [`LmdbDataset`](crate::LmdbDataset) or a
/// [`SingleStoreDataset`](crate::SingleStoreDataset).
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Dataset root (sharded) or environment directory (single store).
    pub root: PathBuf,
    /// Capacity bound of every shard, in bytes.
    pub shard_capacity: usize,
    pub mode: DatasetMode,
    pub index_recovery: IndexRecovery,
}

impl DatasetConfig {
    /// Sharded dataset with 1 GiB shards.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use shardset::DatasetConfig;
    ///
    /// let config = DatasetConfig::new("./frames").with_shard_capacity(256 << 20);
    /// ```
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            shard_capacity: DEFAULT_SHARD_CAPACITY,
            mode: DatasetMode::default(),
            index_recovery: IndexRecovery::default(),
        }
    }

    /// Configuration for one unsharded environment at `path`.
    pub fn single_store(path: impl AsRef<Path>) -> Self {
        Self::new(path).with_shard_capacity(DEFAULT_SINGLE_STORE_CAPACITY)
    }

    pub fn with_shard_capacity(mut self, capacity: usize) -> Self {
        self.shard_capacity = capacity;
        self
    }

    pub fn with_mode(mut self, mode: DatasetMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn read_only(self) -> Self {
        self.with_mode(DatasetMode::ReadOnly)
    }

    pub fn with_index_recovery(mut self, recovery: IndexRecovery) -> Self {
        self.index_recovery = recovery;
        self
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if self.shard_capacity < MIN_SHARD_CAPACITY {
            return Err(DatasetError::InvalidConfiguration {
                field: "shard_capacity",
                min: MIN_SHARD_CAPACITY,
                value: self.shard_capacity,
            });
        }
        Ok(())
    }

    /// Returns the path of the key index file.
    pub fn index_path(&self) -> PathBuf {
        key_index::index_path(&self.root)
    }
}
