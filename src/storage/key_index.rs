//! Persisted mapping from dataset keys to the shard holding them.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::{decode_text, to_ascii_json};
use crate::error::DatasetResult;
use crate::storage::fs::write_atomic;
use crate::storage::shard::ShardStore;
use crate::types::ShardId;

pub const KEY_INDEX_FILE: &str = "keys.json";

pub fn index_path(root: &Path) -> PathBuf {
    root.join(KEY_INDEX_FILE)
}

/// Key to shard id map, stored as a flat JSON object in `keys.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIndex {
    entries: HashMap<String, ShardId>,
}

impl KeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `<root>/keys.json`, or an empty index when the file is absent.
    pub fn load(root: &Path) -> DatasetResult<Self> {
        let path = index_path(root);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(err) => return Err(err.into()),
        };
        let index: Self = serde_json::from_str(&decode_text(&raw))?;
        tracing::debug!(path = ?path, keys = index.len(), "Loaded key index");
        Ok(index)
    }

    /// Overwrites `<root>/keys.json` atomically.
    pub fn save(&self, root: &Path) -> DatasetResult<()> {
        let path = index_path(root);
        write_atomic(&path, &to_ascii_json(self)?)?;
        tracing::debug!(path = ?path, keys = self.len(), "Persisted key index");
        Ok(())
    }

    /// Builds an index by listing every shard, in the order given.
    ///
    /// Callers pass shards in ascending id order. A key present in more than
    /// one shard maps to the last one listed.
    pub fn rebuild<'a, I>(shards: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = &'a dyn ShardStore>,
    {
        let mut index = Self::new();
        for shard in shards {
            let id = shard.id();
            for key in shard.keys()? {
                if let Some(previous) = index.get(&key) {
                    tracing::warn!(
                        key = %key,
                        previous,
                        shard = id,
                        "Key present in several shards; keeping the later shard"
                    );
                }
                index.entries.insert(key, id);
            }
        }
        tracing::info!(keys = index.len(), "Rebuilt key index from shards");
        Ok(index)
    }

    pub fn get(&self, key: &str) -> Option<ShardId> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, shard: ShardId) -> Option<ShardId> {
        self.entries.insert(key.into(), shard)
    }

    pub fn remove(&mut self, key: &str) -> Option<ShardId> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Distinct shard ids referenced, ascending.
    pub fn shard_ids(&self) -> Vec<ShardId> {
        let ids: BTreeSet<ShardId> = self.entries.values().copied().collect();
        ids.into_iter().collect()
    }

    pub fn count_for(&self, shard: ShardId) -> usize {
        self.entries.values().filter(|&&id| id == shard).count()
    }

    /// Shard ids referenced by the index but absent from `known`.
    pub fn dangling_shards(&self, known: &[ShardId]) -> Vec<ShardId> {
        self.shard_ids()
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use tempfile::tempdir_in;

    use crate::storage::shard::PutOutcome;

    /// Fixed, in-memory shard contents.
    struct StubShard {
        id: ShardId,
        records: BTreeMap<Vec<u8>, Vec<u8>>,
    }

    impl StubShard {
        fn with_keys(id: ShardId, keys: &[&str]) -> Self {
            let records = keys
                .iter()
                .map(|key| (key.as_bytes().to_vec(), Vec::new()))
                .collect();
            Self { id, records }
        }
    }

    impl ShardStore for StubShard {
        fn id(&self) -> ShardId {
            self.id
        }

        fn put(&self, _key: &[u8], _value: &[u8]) -> DatasetResult<PutOutcome> {
            unimplemented!("stub shards are immutable")
        }

        fn get(&self, key: &[u8]) -> DatasetResult<Option<Vec<u8>>> {
            Ok(self.records.get(key).cloned())
        }

        fn delete(&self, _key: &[u8]) -> DatasetResult<bool> {
            unimplemented!("stub shards are immutable")
        }

        fn keys(&self) -> DatasetResult<Vec<String>> {
            Ok(self
                .records
                .keys()
                .map(|key| String::from_utf8(key.clone()).unwrap())
                .collect())
        }

        fn len(&self) -> DatasetResult<u64> {
            Ok(self.records.len() as u64)
        }

        fn close(self) -> DatasetResult<()> {
            Ok(())
        }
    }

    fn scratch_dir() -> tempfile::TempDir {
        let workspace_tmp = std::env::current_dir().unwrap().join("target/testdata");
        fs::create_dir_all(&workspace_tmp).unwrap();
        tempdir_in(&workspace_tmp).unwrap()
    }

    #[test]
    fn rebuild_prefers_the_later_shard() {
        let first = StubShard::with_keys(0, &["a", "b"]);
        let second = StubShard::with_keys(2, &["b", "c"]);
        let index =
            KeyIndex::rebuild([&first as &dyn ShardStore, &second as &dyn ShardStore]).unwrap();

        assert_eq!(index.keys(), vec!["a", "b", "c"]);
        assert_eq!(index.get("a"), Some(0));
        assert_eq!(index.get("b"), Some(2));
        assert_eq!(index.shard_ids(), vec![0, 2]);
        assert_eq!(index.count_for(2), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = scratch_dir();
        assert!(KeyIndex::load(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn save_writes_a_flat_ascii_object() {
        let tmp = scratch_dir();
        let mut index = KeyIndex::new();
        index.insert("caf\u{e9}", 1);
        index.save(tmp.path()).unwrap();

        let raw = fs::read(tmp.path().join(KEY_INDEX_FILE)).unwrap();
        assert_eq!(raw, br#"{"caf\u00e9":1}"#);
        assert!(!tmp.path().join("keys.tmp").exists());
        assert_eq!(KeyIndex::load(tmp.path()).unwrap(), index);
    }

    #[test]
    fn dangling_shards_lists_ids_missing_on_disk() {
        let mut index = KeyIndex::new();
        index.insert("x", 0);
        index.insert("y", 3);
        index.insert("z", 3);

        assert_eq!(index.dangling_shards(&[0, 1, 3]), Vec::<ShardId>::new());
        assert_eq!(index.dangling_shards(&[0]), vec![3]);
        assert_eq!(index.remove("y"), Some(3));
        assert_eq!(index.count_for(3), 1);
    }
}
