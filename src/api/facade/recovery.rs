use std::path::Path;

use crate::error::DatasetResult;
use crate::storage::key_index::{self, KeyIndex};
use crate::storage::shards::ShardSet;

use super::config::IndexRecovery;

/// Outcome of [`recover_key_index`].
pub(super) struct RecoveredIndex {
    pub(super) index: KeyIndex,
    /// The index was rebuilt from the shards rather than loaded.
    pub(super) rebuilt: bool,
}

/// Produces the key index for a freshly opened dataset according to `policy`.
pub(super) fn recover_key_index(
    root: &Path,
    shards: &ShardSet,
    policy: IndexRecovery,
) -> DatasetResult<RecoveredIndex> {
    let rebuild = |reason: &'static str| -> DatasetResult<RecoveredIndex> {
        tracing::warn!(root = ?root, reason, "Rebuilding key index from shards");
        Ok(RecoveredIndex {
            index: KeyIndex::rebuild(shards.stores())?,
            rebuilt: true,
        })
    };

    match policy {
        IndexRecovery::Persisted => Ok(RecoveredIndex {
            index: KeyIndex::load(root)?,
            rebuilt: false,
        }),
        IndexRecovery::Rebuild => rebuild("rebuild requested"),
        IndexRecovery::RebuildIfStale => {
            if !key_index::index_path(root).is_file() && !shards.is_empty() {
                return rebuild("key index file missing");
            }

            let index = KeyIndex::load(root)?;
            let dangling = index.dangling_shards(&shards.ids());
            if !dangling.is_empty() {
                tracing::warn!(?dangling, "Key index references shards missing on disk");
                return rebuild("key index references missing shards");
            }
            Ok(RecoveredIndex {
                index,
                rebuilt: false,
            })
        }
    }
}
