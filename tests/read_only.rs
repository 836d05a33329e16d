#[path = "common/support.rs"]
mod support;

use std::path::Path;

use serde_json::json;
use shardset::codec::{encode_json, encode_key};
use shardset::{
    DatasetError, MultiRootDataset, ReadOnlyDataset, RecordReader, RecordWriter, RootKey,
    ShardAccess, ShardSet, ShardStore,
};

use support::*;

/// Writes `records` as `(shard, key, value)` straight into shard environments.
fn write_shards(root: &Path, records: &[(u64, &str, &str)]) {
    let mut ids: Vec<u64> = records.iter().map(|(id, _, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut shards = ShardSet::open(root, &ids, SMALL_SHARD, ShardAccess::ReadWrite).unwrap();
    for (id, key, value) in records {
        shards
            .require(*id)
            .unwrap()
            .put(&encode_key(key).unwrap(), value.as_bytes())
            .unwrap();
    }
    shards.close_all().unwrap();
}

#[test]
fn aggregates_every_shard_under_a_root() {
    let tmp = tempdir();
    write_shards(
        tmp.path(),
        &[(0, "a", "zero"), (1, "b", "one"), (2, "c", "two"), (2, "d", "two")],
    );

    let dataset = ReadOnlyDataset::open(tmp.path()).unwrap();
    assert_eq!(dataset.shard_ids(), vec![0, 1, 2]);
    assert_eq!(dataset.keys(), vec!["a", "b", "c", "d"]);
    assert_eq!(dataset.len(), 4);
    assert_eq!(dataset.shard_of("b"), Some(1));
    assert_eq!(dataset.read_text("c").unwrap().as_deref(), Some("two"));
    assert_eq!(dataset.read_text("missing").unwrap(), None);
    // The index is never written by a reader.
    assert!(!tmp.path().join("keys.json").exists());
}

#[test]
fn later_shard_wins_on_duplicate_keys() {
    let tmp = tempdir();
    write_shards(tmp.path(), &[(0, "dup", "old"), (3, "dup", "new")]);

    let dataset = ReadOnlyDataset::open(tmp.path()).unwrap();
    assert_eq!(dataset.shard_of("dup"), Some(3));
    assert_eq!(dataset.read_text("dup").unwrap().as_deref(), Some("new"));
}

#[test]
fn reads_alongside_a_live_writer() {
    let tmp = tempdir();
    let writer = open_small(tmp.path());
    writer.store_json("meta", &json!({ "w": 4 })).unwrap();

    let reader = ReadOnlyDataset::open(tmp.path()).unwrap();
    assert_eq!(reader.read_json("meta").unwrap(), Some(json!({ "w": 4 })));

    // Records stored after the reader opened are not in its index.
    writer.store_text("later", "x").unwrap();
    assert!(!reader.contains("later"));
    writer.close().unwrap();
}

#[test]
fn root_checks() {
    let tmp = tempdir();
    match ReadOnlyDataset::open(tmp.path().join("absent")) {
        Err(DatasetError::InvalidPath { .. }) => {}
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("absent root should not open"),
    }

    std::fs::create_dir_all(tmp.path().join("lmdb_dataset_12")).unwrap();
    match ReadOnlyDataset::open(tmp.path()) {
        Err(DatasetError::NoShardsFound { roots }) => assert_eq!(roots, vec![tmp.path()]),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("root without shard directories should not open"),
    }
}

#[test]
fn multi_root_keeps_roots_apart() {
    let first = tempdir();
    let second = tempdir();
    let empty = tempdir();
    write_shards(first.path(), &[(0, "k", "first"), (0, "only-first", "1")]);
    write_shards(second.path(), &[(0, "k", "second")]);

    let dataset =
        MultiRootDataset::open([first.path(), second.path(), empty.path()]).unwrap();
    assert_eq!(
        dataset.keys(),
        vec![
            RootKey::new(0, "k"),
            RootKey::new(0, "only-first"),
            RootKey::new(1, "k"),
        ]
    );
    assert_eq!(dataset.len(), 3);
    assert_eq!(
        dataset.read_text(&RootKey::new(0, "k")).unwrap().as_deref(),
        Some("first")
    );
    assert_eq!(
        dataset.read_text(&RootKey::new(1, "k")).unwrap().as_deref(),
        Some("second")
    );
    assert_eq!(dataset.read_text(&RootKey::new(1, "only-first")).unwrap(), None);
    assert_eq!(dataset.read_text(&RootKey::new(9, "k")).unwrap(), None);
    assert_eq!(dataset.shard_ids(2), Some(Vec::new()));
    assert_eq!(RootKey::new(1, "k").to_string(), "1:k");
}

#[test]
fn multi_root_reads_structured_records() {
    let tmp = tempdir();
    {
        let mut shards =
            ShardSet::open(tmp.path(), &[0], SMALL_SHARD, ShardAccess::ReadWrite).unwrap();
        let value = encode_json(&json!({ "label": "caf\u{e9}" })).unwrap();
        shards.require(0).unwrap().put(b"j", &value).unwrap();
        shards.close_all().unwrap();
    }

    let dataset = MultiRootDataset::open([tmp.path()]).unwrap();
    assert_eq!(
        dataset.read_json(&RootKey::new(0, "j")).unwrap(),
        Some(json!({ "label": "caf\u{e9}" }))
    );
}

#[test]
fn multi_root_without_any_shard_fails() {
    let a = tempdir();
    let b = tempdir();
    match MultiRootDataset::open([a.path(), b.path()]) {
        Err(DatasetError::NoShardsFound { roots }) => assert_eq!(roots.len(), 2),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("roots without shards should not open"),
    }
}
