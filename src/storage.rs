//! Persistence backends: shard environments, their on-disk layout, the key
//! index file and filesystem helpers.

pub mod fs;
pub mod key_index;
pub mod layout;
pub mod shard;
pub mod shards;

pub mod prelude {
    pub use super::fs::store_lock::DatasetLockGuard;
    pub use super::key_index::{KeyIndex, KEY_INDEX_FILE};
    pub use super::shard::{LmdbShard, PutOutcome, ShardAccess, ShardStore};
    pub use super::shards::ShardSet;
}
