use std::path::Path;

use parking_lot::Mutex;

use crate::codec::{encode_key, ImageCodec, Payload, PixelFrameCodec};
use crate::error::{DatasetError, DatasetResult};
use crate::storage::fs::DatasetLockGuard;
use crate::storage::key_index::KeyIndex;
use crate::storage::shard::{LmdbShard, PutOutcome, ShardAccess, ShardStore};
use crate::storage::shards::ShardSet;
use crate::types::{KeyOrder, ShardId};

use super::config::{DatasetConfig, DatasetMode};
use super::key_cycle::KeyCycle;
use super::recovery::recover_key_index;
use super::{RecordReader, RecordWriter};

/// Everything released by [`LmdbDataset::close`].
pub(super) struct OpenState<S = LmdbShard> {
    pub(super) shards: ShardSet<S>,
    pub(super) index: KeyIndex,
    pub(super) lock: Option<DatasetLockGuard>,
}

impl<S: ShardStore> OpenState<S> {
    /// Closes every shard, then persists the index when `persist_index` is
    /// set and releases the data-dir lock, whatever the shards reported.
    /// Returns the first error.
    pub(super) fn release(&mut self, root: &Path, persist_index: bool) -> DatasetResult<()> {
        let mut first_err = self.shards.close_all().err();
        if persist_index {
            if let Err(err) = self.index.save(root) {
                tracing::error!(?root, ?err, "Failed to persist key index");
                first_err.get_or_insert(err);
            }
        }
        drop(self.lock.take());

        tracing::info!(?root, keys = self.index.len(), "Closed dataset");
        first_err.map_or(Ok(()), Err)
    }
}

impl OpenState {
    fn head_or_first(&mut self) -> DatasetResult<ShardId> {
        match self.shards.head().map(|(id, _)| id) {
            Some(id) => Ok(id),
            None => self.shards.open_next(),
        }
    }

    /// Writes `record` to the head shard, rolling over to a fresh shard once
    /// when the head is full. Returns the id of the shard that took it.
    fn put_with_rollover(&mut self, key: &[u8], record: &[u8]) -> DatasetResult<ShardId> {
        let head = self.head_or_first()?;
        if self.shards.require(head)?.put(key, record)? == PutOutcome::Stored {
            return Ok(head);
        }

        tracing::info!(
            shard = head,
            record_len = record.len(),
            "Head shard is full; rolling over"
        );
        let next = self.shards.open_next()?;
        let shard = self.shards.require(next)?;
        match shard.put(key, record)? {
            PutOutcome::Stored => Ok(next),
            PutOutcome::CapacityExceeded => {
                tracing::error!(
                    shard = next,
                    record_len = record.len(),
                    capacity = shard.capacity(),
                    "Record does not fit in an empty shard"
                );
                Err(DatasetError::CapacityExceeded {
                    path: shard.path().to_path_buf(),
                    record_len: record.len(),
                    capacity: shard.capacity(),
                })
            }
        }
    }
}

/// A sharded, capacity-bounded dataset rooted at one directory.
///
/// Records go to the head shard until it is full, then to a newly created
/// shard. Every key lives in exactly one shard and the key index (`keys.json`)
/// records which. All operations are serialized by one mutex, so the dataset
/// can be shared between threads by reference.
pub struct LmdbDataset {
    config: DatasetConfig,
    images: Box<dyn ImageCodec>,
    state: Mutex<Option<OpenState>>,
}

impl LmdbDataset {
    /// Opens the dataset described by `config` with the default
    /// [`PixelFrameCodec`] for images.
    ///
    /// A read-write open creates the root if needed and takes an exclusive
    /// lock on it; a second read-write open of the same root fails with
    /// [`DatasetError::DataDirLocked`]. No shard is created until the first
    /// store.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use shardset::{DatasetConfig, LmdbDataset};
    ///
    /// let dataset = LmdbDataset::open(DatasetConfig::new("./frames"))?;
    /// ```
    pub fn open(config: DatasetConfig) -> DatasetResult<Self> {
        Self::open_with_codec(config, Box::new(PixelFrameCodec))
    }

    pub fn open_with_codec(
        config: DatasetConfig,
        images: Box<dyn ImageCodec>,
    ) -> DatasetResult<Self> {
        config.validate()?;
        let mode = config.mode;
        if mode.is_read_only() && !config.root.is_dir() {
            return Err(DatasetError::InvalidPath {
                path: config.root.clone(),
                reason: "dataset root is not a directory",
            });
        }

        let lock = DatasetLockGuard::acquire(&config.root, mode)?;
        let access = match mode {
            DatasetMode::ReadWrite => ShardAccess::ReadWrite,
            DatasetMode::ReadOnly => ShardAccess::ReadOnly,
        };
        let shards = ShardSet::open_discovered(&config.root, config.shard_capacity, access)?;

        let recovered = recover_key_index(&config.root, &shards, config.index_recovery)?;
        if recovered.rebuilt && mode.is_read_write() {
            recovered.index.save(&config.root)?;
        }

        tracing::info!(
            root = ?config.root,
            ?mode,
            shards = shards.len(),
            keys = recovered.index.len(),
            "Opened dataset"
        );

        Ok(Self {
            state: Mutex::new(Some(OpenState {
                shards,
                index: recovered.index,
                lock,
            })),
            config,
            images,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    fn with_state<T>(&self, f: impl FnOnce(&OpenState) -> DatasetResult<T>) -> DatasetResult<T> {
        let guard = self.state.lock();
        let state = guard.as_ref().ok_or(DatasetError::NotOpen)?;
        f(state)
    }

    fn with_state_mut<T>(
        &self,
        f: impl FnOnce(&mut OpenState) -> DatasetResult<T>,
    ) -> DatasetResult<T> {
        let mut guard = self.state.lock();
        let state = guard.as_mut().ok_or(DatasetError::NotOpen)?;
        f(state)
    }

    fn ensure_writable(&self, operation: &'static str) -> DatasetResult<()> {
        if self.config.mode.is_read_only() {
            return Err(DatasetError::ReadOnlyOperation { operation });
        }
        Ok(())
    }

    /// All indexed keys, sorted.
    pub fn keys(&self) -> DatasetResult<Vec<String>> {
        self.with_state(|state| Ok(state.index.keys()))
    }

    pub fn contains(&self, key: &str) -> DatasetResult<bool> {
        self.with_state(|state| Ok(state.index.contains(key)))
    }

    pub fn len(&self) -> DatasetResult<usize> {
        self.with_state(|state| Ok(state.index.len()))
    }

    pub fn is_empty(&self) -> DatasetResult<bool> {
        self.with_state(|state| Ok(state.index.is_empty()))
    }

    /// Shard that holds `key`, according to the index.
    pub fn shard_of(&self, key: &str) -> DatasetResult<Option<ShardId>> {
        self.with_state(|state| Ok(state.index.get(key)))
    }

    /// Ids of the shards currently open, ascending.
    pub fn shard_ids(&self) -> DatasetResult<Vec<ShardId>> {
        self.with_state(|state| Ok(state.shards.ids()))
    }

    /// Iterates over a snapshot of the keys taken now.
    pub fn iter_keys(&self, order: KeyOrder, forever: bool) -> DatasetResult<KeyCycle> {
        Ok(KeyCycle::new(self.keys()?, order, forever))
    }

    /// Replaces the key index with one rebuilt from the shards' contents and
    /// returns the number of keys found.
    ///
    /// The rebuilt index is persisted unless the dataset is read-only.
    pub fn rebuild_index(&self) -> DatasetResult<usize> {
        let writable = self.config.mode.is_read_write();
        self.with_state_mut(|state| {
            let index = KeyIndex::rebuild(state.shards.stores())?;
            if writable {
                index.save(&self.config.root)?;
            }
            state.index = index;
            Ok(state.index.len())
        })
    }

    /// Writes `keys.json` without closing the dataset.
    pub fn persist_index(&self) -> DatasetResult<()> {
        self.ensure_writable("persist_index")?;
        self.with_state(|state| state.index.save(&self.config.root))
    }

    /// Closes every shard, persists the key index and releases the data-dir
    /// lock.
    ///
    /// Every shard is closed even when an earlier one fails; the first error
    /// is returned. Closing a closed dataset does nothing.
    pub fn close(&self) -> DatasetResult<()> {
        // Held until the shards are closed and the index is saved.
        let mut guard = self.state.lock();
        let Some(mut state) = guard.take() else {
            return Ok(());
        };
        state.release(&self.config.root, self.config.mode.is_read_write())
    }
}

impl RecordReader<str> for LmdbDataset {
    fn read_with<T, F>(&self, key: &str, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>,
    {
        let encoded_key = encode_key(key)?;
        self.with_state(|state| {
            let Some(shard_id) = state.index.get(key) else {
                return Ok(None);
            };
            match state.shards.require(shard_id)?.get(&encoded_key)? {
                Some(bytes) => decode(&bytes).map(Some),
                None => {
                    tracing::warn!(key, shard = shard_id, "Indexed key missing from its shard");
                    Ok(None)
                }
            }
        })
    }

    fn image_codec(&self) -> &dyn ImageCodec {
        self.images.as_ref()
    }
}

impl RecordWriter for LmdbDataset {
    fn store(&self, key: &str, payload: Payload<'_>) -> DatasetResult<()> {
        let encoded_key = encode_key(key)?;
        payload.validate()?;
        self.ensure_writable("store")?;

        self.with_state_mut(|state| {
            if state.index.contains(key) {
                return Err(DatasetError::KeyExists {
                    key: key.to_owned(),
                });
            }
            let record = payload.encode(self.images.as_ref())?;
            let shard_id = state.put_with_rollover(&encoded_key, &record)?;
            state.index.insert(key, shard_id);
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> DatasetResult<bool> {
        let encoded_key = encode_key(key)?;
        self.ensure_writable("delete")?;

        self.with_state_mut(|state| {
            let Some(shard_id) = state.index.get(key) else {
                return Ok(false);
            };
            let found = state.shards.require(shard_id)?.delete(&encoded_key)?;
            state.index.remove(key);
            if !found {
                tracing::warn!(key, shard = shard_id, "Dropped stale index entry");
            }
            Ok(found)
        })
    }
}

impl Drop for LmdbDataset {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(
                root = ?self.config.root,
                error = ?err,
                "Failed to close dataset during drop"
            );
        }
    }
}
