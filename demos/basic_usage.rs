//! Basic usage example demonstrating core operations
//!
//! Run with: cargo run --example basic_usage

use serde_json::json;
use shardset::{
    DatasetConfig, KeyOrder, LmdbDataset, PixelBuffer, PixelLayout, ReadOnlyDataset,
    RecordReader, RecordWriter,
};

const DATA_DIR: &str = "./data/basic_example";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 shardset Basic Usage Example\n");

    // Start from an empty root so the example can be re-run.
    let _ = std::fs::remove_dir_all(DATA_DIR);

    // Small shards so a few samples are enough to trigger a rollover.
    let config = DatasetConfig::new(DATA_DIR).with_shard_capacity(256 << 10);
    println!("📦 Opening dataset:");
    println!("   - Root: {DATA_DIR}");
    println!("   - Shard capacity: {} KiB\n", config.shard_capacity >> 10);

    let dataset = LmdbDataset::open(config)?;

    // Example 1: images with their labels
    println!("✏️  Storing 24 frames with labels");
    for i in 0..24u32 {
        let pixels = (0..64 * 64 * 3).map(|p| ((p as u32 * 31 + i * 7) % 256) as u8).collect();
        let frame = PixelBuffer::new(64, 64, PixelLayout::Rgb8, pixels)?;
        dataset.store_image_pair(
            &format!("frame/{i:04}"),
            &frame,
            &json!({ "label": i % 3, "split": if i % 5 == 0 { "val" } else { "train" } }),
        )?;
    }
    println!("   ✓ Shards in use: {:?}\n", dataset.shard_ids()?);

    // Example 2: read one back
    if let Some((frame, meta)) = dataset.read_image_pair("frame/0007")? {
        println!(
            "🔎 frame/0007: {}x{} {:?}, meta = {meta}",
            frame.width(),
            frame.height(),
            frame.layout()
        );
    }

    // Example 3: text and raw bytes
    dataset.store_text("caption/0007", "a caf\u{e9} on a rainy street")?;
    dataset.store_bytes("raw/blob", &[0xde, 0xad, 0xbe, 0xef])?;
    println!("   caption: {:?}", dataset.read_text("caption/0007")?);

    // Example 4: uniqueness and deletion
    match dataset.store_text("caption/0007", "again") {
        Err(err) => println!("   ✓ Duplicate rejected: {err}"),
        Ok(()) => println!("   ✗ Duplicate accepted"),
    }
    println!("   Deleted raw/blob: {}\n", dataset.delete("raw/blob")?);

    // Example 5: shuffled pass over the keys
    let first: Vec<String> = dataset
        .iter_keys(KeyOrder::Shuffled { seed: Some(42) }, false)?
        .take(5)
        .collect();
    println!("🔀 First keys of a shuffled pass: {first:?}");

    dataset.close()?;
    println!("✓ Dataset closed, keys.json written\n");

    // Example 6: a read-only view needs no key index file
    let view = ReadOnlyDataset::open(DATA_DIR)?;
    println!(
        "👀 Read-only view: {} keys over shards {:?}",
        view.len(),
        view.shard_ids()
    );

    Ok(())
}
