use std::path::Path;

use parking_lot::Mutex;

use crate::codec::{encode_key, ImageCodec, Payload, PixelFrameCodec};
use crate::error::{DatasetError, DatasetResult};
use crate::storage::shard::{LmdbShard, PutOutcome, ShardAccess, ShardStore};

use super::config::{DatasetConfig, DatasetMode};
use super::{RecordReader, RecordWriter};

/// A dataset kept in a single LMDB environment at the configured path.
///
/// Unlike [`LmdbDataset`](crate::LmdbDataset) there is no key index and no
/// rollover: storing an existing key replaces its record, and a record that
/// does not fit fails with [`DatasetError::CapacityExceeded`].
pub struct SingleStoreDataset {
    config: DatasetConfig,
    images: Box<dyn ImageCodec>,
    store: Mutex<Option<LmdbShard>>,
}

impl SingleStoreDataset {
    /// Opens the environment. Use [`DatasetConfig::single_store`] for the
    /// large default capacity.
    pub fn open(config: DatasetConfig) -> DatasetResult<Self> {
        Self::open_with_codec(config, Box::new(PixelFrameCodec))
    }

    pub fn open_with_codec(
        config: DatasetConfig,
        images: Box<dyn ImageCodec>,
    ) -> DatasetResult<Self> {
        config.validate()?;
        let access = match config.mode {
            DatasetMode::ReadWrite => ShardAccess::ReadWrite,
            DatasetMode::ReadOnly => ShardAccess::ReadOnly,
        };
        let store = LmdbShard::open(&config.root, 0, config.shard_capacity, access)?;
        tracing::info!(path = ?config.root, mode = ?config.mode, "Opened single-store dataset");

        Ok(Self {
            config,
            images,
            store: Mutex::new(Some(store)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.store.lock().is_some()
    }

    fn with_store<T>(&self, f: impl FnOnce(&LmdbShard) -> DatasetResult<T>) -> DatasetResult<T> {
        let guard = self.store.lock();
        let store = guard.as_ref().ok_or(DatasetError::NotOpen)?;
        f(store)
    }

    /// Every key in the environment, in byte order.
    pub fn keys(&self) -> DatasetResult<Vec<String>> {
        self.with_store(|store| store.keys())
    }

    pub fn len(&self) -> DatasetResult<u64> {
        self.with_store(|store| store.len())
    }

    pub fn is_empty(&self) -> DatasetResult<bool> {
        self.with_store(|store| store.is_empty())
    }

    pub fn close(&self) -> DatasetResult<()> {
        let Some(store) = self.store.lock().take() else {
            return Ok(());
        };
        store.close()?;
        tracing::info!(path = ?self.config.root, "Closed single-store dataset");
        Ok(())
    }
}

impl RecordReader<str> for SingleStoreDataset {
    fn read_with<T, F>(&self, key: &str, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>,
    {
        let encoded_key = encode_key(key)?;
        self.with_store(|store| match store.get(&encoded_key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        })
    }

    fn image_codec(&self) -> &dyn ImageCodec {
        self.images.as_ref()
    }
}

impl RecordWriter for SingleStoreDataset {
    fn store(&self, key: &str, payload: Payload<'_>) -> DatasetResult<()> {
        let encoded_key = encode_key(key)?;
        payload.validate()?;
        if self.config.mode.is_read_only() {
            return Err(DatasetError::ReadOnlyOperation { operation: "store" });
        }

        self.with_store(|store| {
            let record = payload.encode(self.images.as_ref())?;
            match store.put(&encoded_key, &record)? {
                PutOutcome::Stored => Ok(()),
                PutOutcome::CapacityExceeded => Err(DatasetError::CapacityExceeded {
                    path: store.path().to_path_buf(),
                    record_len: record.len(),
                    capacity: store.capacity(),
                }),
            }
        })
    }

    fn delete(&self, key: &str) -> DatasetResult<bool> {
        let encoded_key = encode_key(key)?;
        if self.config.mode.is_read_only() {
            return Err(DatasetError::ReadOnlyOperation {
                operation: "delete",
            });
        }
        self.with_store(|store| store.delete(&encoded_key))
    }
}

impl Drop for SingleStoreDataset {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(
                path = ?self.config.root,
                error = ?err,
                "Failed to close single-store dataset during drop"
            );
        }
    }
}
