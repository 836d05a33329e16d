//! Public API surface for dataset consumers.
//!
//! Groups the error type, shared value types and the dataset facades so
//! callers rarely need to reach into the storage modules.

pub mod error;
pub mod facade;
pub mod types;

pub mod prelude {
    pub use super::error::{DatasetError, DatasetResult};
    pub use super::facade::{
        DatasetConfig, DatasetMode, IndexRecovery, LmdbDataset, MultiRootDataset,
        ReadOnlyDataset, RecordReader, RecordWriter, SingleStoreDataset,
    };
    pub use super::types::*;
}
