use std::path::{Path, PathBuf};

use crate::codec::{ImageCodec, PixelFrameCodec};
use crate::error::{DatasetError, DatasetResult};
use crate::types::{KeyOrder, RootKey, ShardId};

use super::key_cycle::KeyCycle;
use super::read_only::RootView;
use super::RecordReader;

/// Read-only union of several dataset roots.
///
/// The same key may exist under more than one root, so records are addressed
/// by [`RootKey`]: the position of the root in the list given to
/// [`MultiRootDataset::open`] plus the key inside it.
pub struct MultiRootDataset {
    views: Vec<RootView>,
    images: Box<dyn ImageCodec>,
}

impl MultiRootDataset {
    /// Opens every root. Each must be a directory; roots without shards are
    /// accepted as long as at least one root has some.
    pub fn open<I, P>(roots: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::open_with_codec(roots, Box::new(PixelFrameCodec))
    }

    pub fn open_with_codec<I, P>(roots: I, images: Box<dyn ImageCodec>) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let views = roots
            .into_iter()
            .map(|root| RootView::open(root.as_ref()))
            .collect::<DatasetResult<Vec<_>>>()?;

        if views.iter().all(|view| view.shard_count() == 0) {
            return Err(DatasetError::NoShardsFound {
                roots: views.iter().map(|view| view.root().to_path_buf()).collect(),
            });
        }
        Ok(Self { views, images })
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.views
            .iter()
            .map(|view| view.root().to_path_buf())
            .collect()
    }

    /// Every `(root, key)` pair, ordered by root then key.
    pub fn keys(&self) -> Vec<RootKey> {
        self.views
            .iter()
            .enumerate()
            .flat_map(|(root, view)| {
                view.index()
                    .keys()
                    .into_iter()
                    .map(move |key| RootKey::new(root, key))
            })
            .collect()
    }

    pub fn contains(&self, key: &RootKey) -> bool {
        self.shard_of(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.views.iter().map(|view| view.index().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shard_of(&self, key: &RootKey) -> Option<ShardId> {
        self.views
            .get(key.root)
            .and_then(|view| view.index().get(&key.key))
    }

    /// Shard ids of the root at position `root`.
    pub fn shard_ids(&self, root: usize) -> Option<Vec<ShardId>> {
        self.views.get(root).map(RootView::shard_ids)
    }

    pub fn iter_keys(&self, order: KeyOrder, forever: bool) -> KeyCycle<RootKey> {
        KeyCycle::new(self.keys(), order, forever)
    }
}

impl RecordReader<RootKey> for MultiRootDataset {
    fn read_with<T, F>(&self, key: &RootKey, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>,
    {
        match self.views.get(key.root) {
            Some(view) => view.read_with(&key.key, decode),
            None => Ok(None),
        }
    }

    fn image_codec(&self) -> &dyn ImageCodec {
        self.images.as_ref()
    }
}
