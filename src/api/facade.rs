//! High-level dataset facades and the typed record traits they implement.

mod config;
mod core;
mod key_cycle;
mod multi_root;
mod read_only;
mod recovery;
mod single;


use serde_json::Value;

use crate::codec::{self, ImageCodec, Payload, PixelBuffer};
use crate::error::DatasetResult;

pub use config::{
    DatasetConfig, DatasetMode, IndexRecovery, DEFAULT_SHARD_CAPACITY,
    DEFAULT_SINGLE_STORE_CAPACITY, MIN_SHARD_CAPACITY,
};
pub use core::LmdbDataset;
pub use key_cycle::KeyCycle;
pub use multi_root::MultiRootDataset;
pub use read_only::ReadOnlyDataset;
pub use single::SingleStoreDataset;

/// Typed read access to a dataset whose records are addressed by `K`.
///
/// Every `read_*` method returns `Ok(None)` for an absent key and decodes the
/// stored bytes as the requested variant. Reading a record as a different
/// variant than it was stored with is not detected unless decoding fails.
pub trait RecordReader<K: ?Sized> {
    /// Fetches the record for `key` and passes its bytes to `decode`.
    ///
    /// Implementations hold whatever guards protect the dataset for the whole
    /// call, so `decode` runs before any concurrent writer proceeds.
    fn read_with<T, F>(&self, key: &K, decode: F) -> DatasetResult<Option<T>>
    where
        F: FnOnce(&[u8]) -> DatasetResult<T>;

    /// Codec used for image records.
    fn image_codec(&self) -> &dyn ImageCodec;

    fn read_bytes(&self, key: &K) -> DatasetResult<Option<Vec<u8>>> {
        self.read_with(key, |bytes| Ok(bytes.to_vec()))
    }

    fn read_text(&self, key: &K) -> DatasetResult<Option<String>> {
        self.read_with(key, |bytes| Ok(codec::decode_text(bytes)))
    }

    fn read_json(&self, key: &K) -> DatasetResult<Option<Value>> {
        self.read_with(key, codec::decode_json)
    }

    fn read_image(&self, key: &K) -> DatasetResult<Option<PixelBuffer>> {
        let images = self.image_codec();
        self.read_with(key, |bytes| images.decode(bytes))
    }

    /// Reads a blob stored together with a structured value.
    fn read_pair(&self, key: &K) -> DatasetResult<Option<(Vec<u8>, Value)>> {
        self.read_with(key, codec::decode_envelope)
    }

    fn read_text_pair(&self, key: &K) -> DatasetResult<Option<(String, Value)>> {
        self.read_with(key, |bytes| {
            let (blob, value) = codec::decode_envelope(bytes)?;
            Ok((codec::decode_text(&blob), value))
        })
    }

    fn read_image_pair(&self, key: &K) -> DatasetResult<Option<(PixelBuffer, Value)>> {
        let images = self.image_codec();
        self.read_with(key, |bytes| {
            let (blob, value) = codec::decode_envelope(bytes)?;
            Ok((images.decode(&blob)?, value))
        })
    }
}

/// Typed write access to a dataset keyed by strings.
///
/// # Examples
///
/// ```ignore
/// use serde_json::json;
/// use shardset::{DatasetConfig, LmdbDataset, RecordReader, RecordWriter};
///
/// let dataset = LmdbDataset::open(DatasetConfig::new("./frames"))?;
/// dataset.store_text_pair("sample-0001", "a cat", &json!({ "label": 3 }))?;
/// let (caption, meta) = dataset.read_text_pair("sample-0001")?.unwrap();
/// dataset.close()?;
/// ```
pub trait RecordWriter: RecordReader<str> {
    /// Stores `payload` under `key`.
    fn store(&self, key: &str, payload: Payload<'_>) -> DatasetResult<()>;

    /// Removes `key`, reporting whether a record was deleted.
    fn delete(&self, key: &str) -> DatasetResult<bool>;

    fn store_bytes(&self, key: &str, data: &[u8]) -> DatasetResult<()> {
        self.store(key, Payload::Bytes(data))
    }

    fn store_text(&self, key: &str, text: &str) -> DatasetResult<()> {
        self.store(key, Payload::Text(text))
    }

    fn store_json(&self, key: &str, value: &Value) -> DatasetResult<()> {
        self.store(key, Payload::Json(value))
    }

    fn store_image(&self, key: &str, image: &PixelBuffer) -> DatasetResult<()> {
        self.store(key, Payload::Image(image))
    }

    fn store_pair(&self, key: &str, data: &[u8], value: &Value) -> DatasetResult<()> {
        self.store(key, Payload::Pair(data, value))
    }

    fn store_text_pair(&self, key: &str, text: &str, value: &Value) -> DatasetResult<()> {
        self.store(key, Payload::TextPair(text, value))
    }

    fn store_image_pair(&self, key: &str, image: &PixelBuffer, value: &Value) -> DatasetResult<()> {
        self.store(key, Payload::ImagePair(image, value))
    }
}
