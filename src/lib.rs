//! # shardset
//!
//! A key-value dataset store for machine-learning samples, spread over a
//! sequence of capacity-bounded LMDB environments ("shards").
//!
//! ## Features
//!
//! - **Automatic sharding**: when the head shard is full, a new one is
//!   created and the write is retried there
//! - **Typed records**: raw bytes, Latin-1 text, JSON values, images and
//!   blob/JSON pairs through [`RecordReader`] and [`RecordWriter`]
//! - **Key index**: `keys.json` maps each key to its shard and can be rebuilt
//!   from the shards
//! - **Concurrent readers**: [`ReadOnlyDataset`] and [`MultiRootDataset`]
//!   open shards without LMDB locking, alongside a live writer
//!
//! ## Quick Start
//!
//! ```ignore
//! use serde_json::json;
//! use shardset::{DatasetConfig, LmdbDataset, RecordReader, RecordWriter};
//!
//! let dataset = LmdbDataset::open(DatasetConfig::new("./data").with_shard_capacity(64 << 20))?;
//!
//! dataset.store_text("caption/0001", "a dog on a beach")?;
//! dataset.store_json("meta/0001", &json!({ "width": 640, "height": 480 }))?;
//!
//! assert_eq!(
//!     dataset.read_text("caption/0001")?.as_deref(),
//!     Some("a dog on a beach")
//! );
//! dataset.close()?;
//! # Ok::<(), shardset::DatasetError>(())
//! ```

pub mod api;
pub mod codec;
pub mod storage;

pub use crate::api::{error, facade, types};
pub use crate::storage::fs::store_lock;
pub use crate::storage::layout;

pub use api::error::{DatasetError, DatasetResult};
pub use api::facade::{
    DatasetConfig, DatasetMode, IndexRecovery, KeyCycle, LmdbDataset, MultiRootDataset,
    ReadOnlyDataset, RecordReader, RecordWriter, SingleStoreDataset,
};
pub use api::types::*;
pub use codec::{ImageCodec, Payload, PixelBuffer, PixelFrameCodec, PixelLayout};
#[cfg(feature = "raster")]
pub use codec::{RasterCodec, RasterFormat};
pub use storage::fs::store_lock::DatasetLockGuard;
pub use storage::key_index::KeyIndex;
pub use storage::shard::{LmdbShard, PutOutcome, ShardAccess, ShardStore};
pub use storage::shards::ShardSet;
