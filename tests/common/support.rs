#![allow(dead_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Once;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use shardset::{DatasetConfig, LmdbDataset, PixelBuffer, PixelLayout};
use tempfile::{tempdir_in, TempDir};

static INIT_TESTDATA_ROOT: Once = Once::new();

/// Smallest shard capacity that still holds a handful of test records.
pub const SMALL_SHARD: usize = 128 << 10;

pub fn workspace_tmp() -> PathBuf {
    let path = env::current_dir().unwrap().join("target/testdata/datasets");
    INIT_TESTDATA_ROOT.call_once(|| {
        if env::var_os("SHARDSET_KEEP_TESTDATA").is_none() {
            let _ = std::fs::remove_dir_all(&path);
        }
    });
    path
}

pub fn tempdir() -> TempDir {
    let workspace_tmp = workspace_tmp();
    std::fs::create_dir_all(&workspace_tmp).unwrap();
    tempdir_in(&workspace_tmp).unwrap()
}

pub fn small_config(root: &Path) -> DatasetConfig {
    DatasetConfig::new(root).with_shard_capacity(SMALL_SHARD)
}

pub fn open_small(root: &Path) -> LmdbDataset {
    LmdbDataset::open(small_config(root)).expect("dataset should open")
}

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn random_bytes(rng: &mut ChaCha8Rng, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Random text drawn from the full single-byte range.
pub fn random_text(rng: &mut ChaCha8Rng, len: usize) -> String {
    (0..len).map(|_| char::from(rng.gen::<u8>())).collect()
}

pub fn random_json(rng: &mut ChaCha8Rng) -> Value {
    json!({
        "id": rng.gen::<u32>(),
        "score": rng.gen_range(0.0..1.0),
        "label": random_text(rng, 12),
        "tags": ["train", "caf\u{e9}", "\u{1F600}"],
        "nested": { "flag": rng.gen::<bool>(), "none": null },
    })
}

pub fn random_image(rng: &mut ChaCha8Rng, layout: PixelLayout) -> PixelBuffer {
    let width = rng.gen_range(1..48);
    let height = rng.gen_range(1..48);
    let len = PixelBuffer::expected_len(width, height, layout).unwrap();
    PixelBuffer::new(width, height, layout, random_bytes(rng, len)).unwrap()
}
