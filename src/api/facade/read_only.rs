use std::path::{Path, PathBuf};

use crate::codec::{encode_key, ImageCodec, PixelFrameCodec};
use crate::error::{DatasetError, DatasetResult};
use crate::storage::key_index::KeyIndex;
use crate::storage::shard::{ShardAccess, ShardStore};
use crate::storage::shards::ShardSet;
use crate::types::{KeyOrder, ShardId};

use super::config::DEFAULT_SHARD_CAPACITY;
use super::key_cycle::KeyCycle;
use super::RecordReader;

/// Immutable view of one dataset root: its shards opened without locking and
/// an in-memory index rebuilt from their contents.
pub(super) struct RootView {
    root: PathBuf,
    shards: ShardSet,
    index: KeyIndex,
}

impl RootView {
    pub(super) fn open(root: &Path) -> DatasetResult<Self> {
        if !root.is_dir() {
            return Err(DatasetError::InvalidPath {
                path: root.to_path_buf(),
                reason: "dataset root is not a directory",
            });
        }

        // The capacity only bounds writes; LMDB grows a read-only map to the
        // size recorded in the environment when that is larger.
        let shards =
            ShardSet::open_discovered(root, DEFAULT_SHARD_CAPACITY, ShardAccess::ReadOnlyUnlocked)?;
        let index = KeyIndex::rebuild(shards.stores())?;
        tracing::info!(
            root = ?root,
            shards = shards.len(),
            keys = index.len(),
            "Opened read-only dataset view"
        );

        Ok(Self {
            root: root.to_path_buf(),
            shards,
            index,
        })
    }

    pub(super) fn root(&self) -> &Path {
        &self.root
    }

    pub(super) fn index(&self) -> &KeyIndex {
        &self.index
    }

    pub(super) fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub(super) fn shard_ids(&self) -> Vec<ShardId> {
        self.shards.ids()
    }

    pub(super) fn read_with<T, F>(&self, key: &str, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>,
    {
        let encoded_key = encode_key(key)?;
        let Some(shard_id) = self.index.get(key) else {
            return Ok(None);
        };
        match self.shards.require(shard_id)?.get(&encoded_key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => {
                // A concurrent writer may have deleted it since the index was built.
                tracing::warn!(key, shard = shard_id, root = ?self.root, "Indexed key missing from its shard");
                Ok(None)
            }
        }
    }
}

/// Read-only access to every shard under one root, safe to use while another
/// process is writing the same dataset.
///
/// The key index is rebuilt once from the shards at open time and never
/// written back; records stored afterwards by a writer are not visible.
pub struct ReadOnlyDataset {
    view: RootView,
    images: Box<dyn ImageCodec>,
}

impl ReadOnlyDataset {
    pub fn open(root: impl AsRef<Path>) -> DatasetResult<Self> {
        Self::open_with_codec(root, Box::new(PixelFrameCodec))
    }

    pub fn open_with_codec(
        root: impl AsRef<Path>,
        images: Box<dyn ImageCodec>,
    ) -> DatasetResult<Self> {
        let root = root.as_ref();
        let view = RootView::open(root)?;
        if view.shard_count() == 0 {
            return Err(DatasetError::NoShardsFound {
                roots: vec![root.to_path_buf()],
            });
        }
        Ok(Self { view, images })
    }

    pub fn path(&self) -> &Path {
        self.view.root()
    }

    pub fn keys(&self) -> Vec<String> {
        self.view.index().keys()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.view.index().contains(key)
    }

    pub fn len(&self) -> usize {
        self.view.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.index().is_empty()
    }

    pub fn shard_of(&self, key: &str) -> Option<ShardId> {
        self.view.index().get(key)
    }

    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.view.shard_ids()
    }

    pub fn iter_keys(&self, order: KeyOrder, forever: bool) -> KeyCycle {
        KeyCycle::new(self.keys(), order, forever)
    }
}

impl RecordReader<str> for ReadOnlyDataset {
    fn read_with<T, F>(&self, key: &str, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>,
    {
        self.view.read_with(key, decode)
    }

    fn image_codec(&self) -> &dyn ImageCodec {
        self.images.as_ref()
    }
}
