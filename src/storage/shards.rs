//! The ordered collection of shards under one dataset root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};
use crate::storage::layout::{self, MAX_SHARD_ID};
use crate::storage::shard::{LmdbShard, ShardAccess, ShardStore};
use crate::types::ShardId;

/// Open shards of one root, keyed by id. The highest id is the head.
pub struct ShardSet<S = LmdbShard> {
    root: PathBuf,
    capacity: usize,
    access: ShardAccess,
    shards: BTreeMap<ShardId, S>,
}

impl ShardSet {
    /// Opens one shard per id in `ids`.
    pub fn open(
        root: impl AsRef<Path>,
        ids: &[ShardId],
        capacity: usize,
        access: ShardAccess,
    ) -> DatasetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let mut shards = BTreeMap::new();
        for &id in ids {
            let shard = LmdbShard::open(layout::shard_dir(&root, id), id, capacity, access)?;
            shards.insert(id, shard);
        }

        Ok(Self {
            root,
            capacity,
            access,
            shards,
        })
    }

    /// Discovers the shard directories under `root` and opens all of them.
    pub fn open_discovered(
        root: impl AsRef<Path>,
        capacity: usize,
        access: ShardAccess,
    ) -> DatasetResult<Self> {
        let root = root.as_ref();
        let ids = layout::discover(root)?;
        Self::open(root, &ids, capacity, access)
    }

    /// Creates the shard after the current head and makes it the new head.
    pub fn open_next(&mut self) -> DatasetResult<ShardId> {
        if !self.access.is_writable() {
            return Err(DatasetError::ReadOnlyOperation {
                operation: "open_next_shard",
            });
        }

        let next = match self.head() {
            None => 0,
            Some((last, _)) if last >= MAX_SHARD_ID => {
                return Err(DatasetError::ShardIdExhausted { last });
            }
            Some((last, _)) => last + 1,
        };

        let shard = LmdbShard::open(
            layout::shard_dir(&self.root, next),
            next,
            self.capacity,
            self.access,
        )?;
        tracing::info!(shard = next, path = ?shard.path(), capacity = self.capacity, "Opened new head shard");
        self.shards.insert(next, shard);
        Ok(next)
    }
}

impl<S: ShardStore> ShardSet<S> {
    /// Assembles a set from shards that are already open, keyed by their ids.
    pub fn from_shards(
        root: impl AsRef<Path>,
        capacity: usize,
        access: ShardAccess,
        shards: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            capacity,
            access,
            shards: shards.into_iter().map(|shard| (shard.id(), shard)).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn head(&self) -> Option<(ShardId, &S)> {
        self.shards.last_key_value().map(|(id, shard)| (*id, shard))
    }

    pub fn get(&self, id: ShardId) -> Option<&S> {
        self.shards.get(&id)
    }

    /// Like [`ShardSet::get`], treating an unknown id as an index/shard mismatch.
    pub fn require(&self, id: ShardId) -> DatasetResult<&S> {
        self.get(id).ok_or(DatasetError::ShardMissing { shard: id })
    }

    /// Shards in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &S)> + '_ {
        self.shards.iter().map(|(id, shard)| (*id, shard))
    }

    /// Shards in ascending id order, as trait objects.
    pub fn stores(&self) -> impl Iterator<Item = &dyn ShardStore> + '_ {
        self.shards.values().map(|shard| shard as &dyn ShardStore)
    }

    pub fn ids(&self) -> Vec<ShardId> {
        self.shards.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Closes every shard, attempting all of them even when some fail.
    ///
    /// Returns the first failure. The set is empty afterwards.
    pub fn close_all(&mut self) -> DatasetResult<()> {
        let mut first_err = None;
        for (id, shard) in std::mem::take(&mut self.shards) {
            if let Err(err) = shard.close() {
                tracing::error!(shard = id, root = ?self.root, ?err, "Failed to close shard");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::tempdir_in;

    use crate::storage::shard::PutOutcome;

    fn scratch_dir() -> tempfile::TempDir {
        let workspace_tmp = std::env::current_dir().unwrap().join("target/testdata");
        fs::create_dir_all(&workspace_tmp).unwrap();
        tempdir_in(&workspace_tmp).unwrap()
    }

    #[test]
    fn open_next_starts_at_zero_and_follows_the_head() {
        let tmp = scratch_dir();
        let mut set = ShardSet::open_discovered(tmp.path(), 1 << 20, ShardAccess::ReadWrite)
            .unwrap();
        assert!(set.head().is_none());

        assert_eq!(set.open_next().unwrap(), 0);
        assert_eq!(set.open_next().unwrap(), 1);
        assert_eq!(set.head().map(|(id, _)| id), Some(1));
        assert!(tmp.path().join("lmdb_dataset_000000000001").is_dir());
        set.close_all().unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn discovery_tolerates_gaps_and_next_id_follows_maximum() {
        let tmp = scratch_dir();
        {
            let mut set = ShardSet::open(tmp.path(), &[0, 4], 1 << 20, ShardAccess::ReadWrite)
                .unwrap();
            set.require(4).unwrap().put(b"k", b"v").unwrap();
            set.close_all().unwrap();
        }

        let mut set = ShardSet::open_discovered(tmp.path(), 1 << 20, ShardAccess::ReadWrite)
            .unwrap();
        assert_eq!(set.ids(), vec![0, 4]);
        assert_eq!(set.head().unwrap().1.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
        assert_eq!(set.open_next().unwrap(), 5);
        assert!(matches!(
            set.require(2),
            Err(DatasetError::ShardMissing { shard: 2 })
        ));
    }

    #[test]
    fn read_only_sets_never_grow() {
        let tmp = scratch_dir();
        {
            let mut set = ShardSet::open(tmp.path(), &[0], 1 << 20, ShardAccess::ReadWrite)
                .unwrap();
            assert_eq!(
                set.require(0).unwrap().put(b"k", b"v").unwrap(),
                PutOutcome::Stored
            );
            set.close_all().unwrap();
        }

        let mut set =
            ShardSet::open_discovered(tmp.path(), 1 << 20, ShardAccess::ReadOnlyUnlocked).unwrap();
        assert!(matches!(
            set.open_next(),
            Err(DatasetError::ReadOnlyOperation { .. })
        ));
        assert_eq!(set.stores().map(|s| s.id()).collect::<Vec<_>>(), vec![0]);
    }

    /// Empty shard whose close fails for odd ids.
    struct OddFailing {
        id: ShardId,
        closed: std::sync::Arc<parking_lot::Mutex<Vec<ShardId>>>,
    }

    impl ShardStore for OddFailing {
        fn id(&self) -> ShardId {
            self.id
        }

        fn put(&self, _key: &[u8], _value: &[u8]) -> DatasetResult<PutOutcome> {
            Ok(PutOutcome::Stored)
        }

        fn get(&self, _key: &[u8]) -> DatasetResult<Option<Vec<u8>>> {
            Ok(None)
        }

        fn delete(&self, _key: &[u8]) -> DatasetResult<bool> {
            Ok(false)
        }

        fn keys(&self) -> DatasetResult<Vec<String>> {
            Ok(Vec::new())
        }

        fn len(&self) -> DatasetResult<u64> {
            Ok(0)
        }

        fn close(self) -> DatasetResult<()> {
            self.closed.lock().push(self.id);
            if self.id % 2 == 1 {
                return Err(DatasetError::ShardMissing { shard: self.id });
            }
            Ok(())
        }
    }

    #[test]
    fn close_all_attempts_every_shard_and_reports_the_first_failure() {
        let closed = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let shards = [3, 0, 1, 2].map(|id| OddFailing {
            id,
            closed: std::sync::Arc::clone(&closed),
        });
        let mut set = ShardSet::from_shards("/unused", 1 << 20, ShardAccess::ReadWrite, shards);
        assert_eq!(set.ids(), vec![0, 1, 2, 3]);
        assert_eq!(set.head().map(|(id, _)| id), Some(3));

        assert!(matches!(
            set.close_all(),
            Err(DatasetError::ShardMissing { shard: 1 })
        ));
        assert_eq!(*closed.lock(), vec![0, 1, 2, 3]);
        assert!(set.is_empty());
        assert!(set.close_all().is_ok());
    }
}
