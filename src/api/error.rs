use std::path::PathBuf;

use thiserror::Error;

use crate::types::ShardId;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("heed error: {0}")]
    Heed(#[from] heed::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid {expected} payload: {reason}")]
    ValueType {
        expected: &'static str,
        reason: String,
    },

    #[error("key {key:?} already exists")]
    KeyExists { key: String },

    #[error("dataset is not open")]
    NotOpen,

    #[error(
        "record of {record_len} bytes does not fit in an empty shard at {path:?} (capacity: {capacity} bytes)"
    )]
    CapacityExceeded {
        path: PathBuf,
        record_len: usize,
        capacity: usize,
    },

    #[error("image codec failure: {reason}")]
    ImageCodec { reason: String },

    #[error("malformed data/json envelope: {reason}")]
    MalformedEnvelope { reason: &'static str },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("no shard directories found under {roots:?}")]
    NoShardsFound { roots: Vec<PathBuf> },

    #[error("key index references shard {shard} which is not open")]
    ShardMissing { shard: ShardId },

    #[error("shard id space exhausted after shard {last}")]
    ShardIdExhausted { last: ShardId },

    #[error("operation '{operation}' is not permitted in read-only mode")]
    ReadOnlyOperation { operation: &'static str },

    #[error("data directory locked at {path:?} (requested: {requested})")]
    DataDirLocked {
        path: PathBuf,
        requested: &'static str,
    },

    #[error("invalid configuration: {field} must be at least {min}, got {value}")]
    InvalidConfiguration {
        field: &'static str,
        min: usize,
        value: usize,
    },
}

impl DatasetError {
    pub(crate) fn image_codec(reason: impl Into<String>) -> Self {
        DatasetError::ImageCodec {
            reason: reason.into(),
        }
    }

    /// Returns `true` when the error leaves the dataset untouched and the
    /// caller may retry with a different key or payload.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DatasetError::InvalidKey { .. }
                | DatasetError::ValueType { .. }
                | DatasetError::KeyExists { .. }
                | DatasetError::ReadOnlyOperation { .. }
        )
    }
}
