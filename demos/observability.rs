//! Observability example demonstrating structured tracing
//!
//! Run with: cargo run --example observability
//! For shard-level events: RUST_LOG=shardset=debug cargo run --example observability

use std::fs;

use serde_json::json;
use shardset::{
    DatasetConfig, IndexRecovery, LmdbDataset, MultiRootDataset, RecordReader, RecordWriter,
    RootKey,
};

const ROOT_A: &str = "./data/observability_example/a";
const ROOT_B: &str = "./data/observability_example/b";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    println!("🔍 shardset Observability Example\n");
    println!("Rollovers, index recovery and closes are logged at info/warn.");
    println!("Set RUST_LOG=debug for per-shard traces.\n");

    let _ = fs::remove_dir_all("./data/observability_example");

    // Rollover: each record is a quarter of a shard.
    let dataset = LmdbDataset::open(DatasetConfig::new(ROOT_A).with_shard_capacity(128 << 10))?;
    for i in 0..12 {
        dataset.store_bytes(&format!("blob/{i:02}"), &vec![i as u8; 28 << 10])?;
    }
    println!("✓ Stored 12 blobs across shards {:?}", dataset.shard_ids()?);

    // Capacity exhaustion: a record larger than an empty shard is fatal.
    if let Err(err) = dataset.store_bytes("too-big", &vec![0u8; 512 << 10]) {
        println!("✓ Oversized record rejected: {err}");
    }
    dataset.close()?;

    // Index recovery: losing keys.json triggers a rebuild with a warning.
    fs::remove_file(format!("{ROOT_A}/keys.json"))?;
    let recovered = LmdbDataset::open(
        DatasetConfig::new(ROOT_A)
            .with_shard_capacity(128 << 10)
            .with_index_recovery(IndexRecovery::RebuildIfStale),
    )?;
    println!("✓ Recovered {} keys from the shards", recovered.len()?);
    recovered.close()?;

    // Two roots holding the same key.
    let other = LmdbDataset::open(DatasetConfig::new(ROOT_B))?;
    other.store_json("blob/00", &json!({ "source": "b" }))?;
    other.close()?;

    let union = MultiRootDataset::open([ROOT_A, ROOT_B])?;
    println!("\n📊 Multi-root view: {} records", union.len());
    println!(
        "   0:blob/00 -> {:?} bytes",
        union.read_bytes(&RootKey::new(0, "blob/00"))?.map(|b| b.len())
    );
    println!(
        "   1:blob/00 -> {:?}",
        union.read_json(&RootKey::new(1, "blob/00"))?
    );

    Ok(())
}
