use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one shard within a dataset root.
///
/// Ids are assigned in increasing order starting at zero; the highest id is
/// the head shard that receives new writes.
pub type ShardId = u64;

/// Key of a record inside a [`MultiRootDataset`](crate::MultiRootDataset).
///
/// The same key string may exist under several roots, so the root position
/// is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RootKey {
    /// Position of the root in the list given at open time.
    pub root: usize,
    /// Key within that root.
    pub key: String,
}

impl RootKey {
    pub fn new(root: usize, key: impl Into<String>) -> Self {
        Self {
            root,
            key: key.into(),
        }
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root, self.key)
    }
}

/// Order in which [`KeyCycle`](crate::KeyCycle) yields keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyOrder {
    /// Lexicographic order, identical on every pass.
    #[default]
    Sorted,
    /// Random order, reshuffled at the start of every pass. A fixed seed
    /// makes the sequence reproducible.
    Shuffled { seed: Option<u64> },
}
