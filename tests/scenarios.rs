// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! End-to-end scenarios driving real on-disk tables through the full
//! reader/iterator stack rather than any single module in isolation.

use sorted_table::{
    iter::{BoxedIterator, ConcatIter, MergeIter, SnapshotIter, TableIter},
    table::{PointGetResult, Table, TableBuilder, TableWriterOptions},
    BlockCache, CompressionType, Config, DescriptorTable, InternalValue, ValueType,
};
use std::sync::Arc;
use test_log::test;

fn config() -> Config {
    Config::new()
        .block_cache(Arc::new(BlockCache::with_capacity_bytes(4 * 1024 * 1024)))
        .descriptor_table(Arc::new(DescriptorTable::new(64)))
}

fn build_table(
    id: u64,
    dir: &std::path::Path,
    entries: Vec<InternalValue>,
    global_ts: u64,
) -> sorted_table::Result<Table> {
    let path = dir.join(format!("{id}.sst"));
    let opts = TableWriterOptions {
        block_size: 256,
        compression: CompressionType::None,
        hash_index: true,
        surf_filter: true,
        global_ts,
    };
    let mut builder = TableBuilder::new(opts);
    for entry in entries {
        builder.push(entry)?;
    }
    std::fs::write(&path, builder.finish()?)?;
    Table::open(id, &path, &config())
}

fn value_entries(keys: &[&str], version: u64) -> Vec<InternalValue> {
    keys.iter()
        .map(|k| InternalValue::from_components(k.as_bytes(), b"v".as_slice(), version, ValueType::Value))
        .collect()
}

/// Scenario 1: build `key0000..key0099`, all version 0. `Seek("abc")` ->
/// `key0000`. `Seek("key0050b")` -> `key0051`. `Seek("z")` -> invalid.
#[test]
fn scenario_1_single_table_seek() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let keys: Vec<String> = (0..100).map(|i| format!("key{i:04}")).collect();
    let keys_ref: Vec<&str> = keys.iter().map(String::as_str).collect();
    let table = build_table(1, dir.path(), value_entries(&keys_ref, 0), 0)?;

    let mut iter = TableIter::new(table.clone());
    iter.seek(b"abc")?;
    assert_eq!(
        iter.next().expect("should have a row")?.key.user_key.as_ref(),
        b"key0000"
    );

    let mut iter = TableIter::new(table.clone());
    iter.seek(b"key0050b")?;
    assert_eq!(
        iter.next().expect("should have a row")?.key.user_key.as_ref(),
        b"key0051"
    );

    let mut iter = TableIter::new(table);
    iter.seek(b"z")?;
    assert!(iter.next().is_none());

    Ok(())
}

/// Scenario 2: `(key,9),(key,7),(key,5),(key,3),(key,1)`. `PointGet((key,
/// 10))` -> `(key,9)`; `PointGet((key,6))` -> `(key,5)`; `PointGet((key,2))`
/// -> `(key,1)`.
#[test]
fn scenario_2_point_get_mvcc() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let entries = vec![9u64, 7, 5, 3, 1]
        .into_iter()
        .map(|v| InternalValue::from_components(*b"key", b"v".as_slice(), v, ValueType::Value))
        .collect();
    let table = build_table(1, dir.path(), entries, 0)?;

    let point = table.point_get(b"key", 10)?;
    assert!(matches!(point, PointGetResult::Found(ref v) if v.key.seqno == 9));

    let point = table.point_get(b"key", 6)?;
    assert!(matches!(point, PointGetResult::Found(ref v) if v.key.seqno == 5));

    let point = table.point_get(b"key", 2)?;
    assert!(matches!(point, PointGetResult::Found(ref v) if v.key.seqno == 1));

    Ok(())
}

/// Scenario 3: concat `keya0000..keya9999`, `keyb0000..keyb9999`,
/// `keyc0000..keyc9999`. `Seek("keyb9999b")` -> `keyc0000`; reverse
/// `Seek("keyd")` -> `keyc9999`.
#[test]
fn scenario_3_concat_seek_both_directions() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = build_table(1, dir.path(), value_entries(&["keya0000", "keya9999"], 0), 0)?;
    let b = build_table(2, dir.path(), value_entries(&["keyb0000", "keyb9999"], 0), 0)?;
    let c = build_table(3, dir.path(), value_entries(&["keyc0000", "keyc9999"], 0), 0)?;

    let mut iter = ConcatIter::new(vec![a.clone(), b.clone(), c.clone()]);
    iter.seek(b"keyb9999b")?;
    assert_eq!(
        iter.next().expect("should have a row")?.key.user_key.as_ref(),
        b"keyc0000"
    );

    let mut iter = ConcatIter::new(vec![a, b, c]);
    iter.seek_for_prev(b"keyd")?;
    assert_eq!(
        iter.next_back().expect("should have a row")?.key.user_key.as_ref(),
        b"keyc9999"
    );

    Ok(())
}

/// Scenario 4: merge two tables `{(k1,a1),(k2,a2)}` and `{(k1,b1),
/// (k2,b2)}` in order. Forward iteration yields `(k1,a1),(k2,a2)` -- the
/// second table's duplicates are elided.
#[test]
fn scenario_4_merge_elides_duplicates_across_sources() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let a_entries = vec![
        InternalValue::from_components(*b"k1", b"a1".as_slice(), 5, ValueType::Value),
        InternalValue::from_components(*b"k2", b"a2".as_slice(), 5, ValueType::Value),
    ];
    let b_entries = vec![
        InternalValue::from_components(*b"k1", b"b1".as_slice(), 5, ValueType::Value),
        InternalValue::from_components(*b"k2", b"b2".as_slice(), 5, ValueType::Value),
    ];
    let a = build_table(1, dir.path(), a_entries, 0)?;
    let b = build_table(2, dir.path(), b_entries, 0)?;

    let a_iter: BoxedIterator = Box::new(TableIter::new(a));
    let b_iter: BoxedIterator = Box::new(TableIter::new(b));
    let merged = MergeIter::new(vec![a_iter, b_iter]).collect::<sorted_table::Result<Vec<_>>>()?;

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].key.user_key.as_ref(), b"k1");
    assert_eq!(merged[1].key.user_key.as_ref(), b"k2");

    Ok(())
}

/// Scenario 5: `SeekForPrev("k0100b")` on `k0000..k9999` -> `k0100`.
#[test]
fn scenario_5_seek_for_prev_single_table() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let keys: Vec<String> = (0..200).map(|i| format!("k{i:04}")).collect();
    let keys_ref: Vec<&str> = keys.iter().map(String::as_str).collect();
    let table = build_table(1, dir.path(), value_entries(&keys_ref, 0), 0)?;

    let mut iter = TableIter::new(table);
    iter.seek_for_prev(b"k0100b")?;
    assert_eq!(
        iter.next_back().expect("should have a row")?.key.user_key.as_ref(),
        b"k0100"
    );

    Ok(())
}

/// Scenario 6: external table built with `global_ts=10`. The footer carries
/// the table-wide timestamp (`Table::global_ts`); per-entry versions are
/// stored and read back unchanged.
#[test]
fn scenario_6_global_timestamp_is_carried_in_the_footer() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let entries = value_entries(&["a", "b", "c"], 0);
    let table = build_table(1, dir.path(), entries, 10)?;

    assert_eq!(table.global_ts(), 10);

    let rows = TableIter::new(table).collect::<sorted_table::Result<Vec<_>>>()?;
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert_eq!(row.key.seqno, 0);
    }

    Ok(())
}

/// Tombstoned keys are suppressed by the snapshot view unless
/// `all_versions` is requested, and the snapshot view never shows a
/// version written after `read_ts`.
#[test]
fn snapshot_hides_future_writes_and_suppresses_tombstones() -> sorted_table::Result<()> {
    let dir = tempfile::tempdir()?;
    let entries = vec![
        InternalValue::new_tombstone(*b"a", 2),
        InternalValue::from_components(*b"a", b"v1".as_slice(), 1, ValueType::Value),
        InternalValue::from_components(*b"b", b"v2".as_slice(), 5, ValueType::Value),
        InternalValue::from_components(*b"b", b"v1".as_slice(), 1, ValueType::Value),
    ];
    let table = build_table(1, dir.path(), entries, 0)?;

    // At read_ts = 1, "b"'s version 5 write hasn't happened yet.
    let concat = ConcatIter::new(vec![table.clone()]);
    let visible = SnapshotIter::new(concat, 1, false).collect::<sorted_table::Result<Vec<_>>>()?;
    assert_eq!(visible.len(), 2);
    assert_eq!(visible[0].key.user_key.as_ref(), b"a");
    assert_eq!(visible[0].value.value.as_ref(), b"v1");
    assert_eq!(visible[1].value.value.as_ref(), b"v1");

    // At read_ts = MAX, "a" is tombstoned (hidden) and "b" shows its
    // newest write.
    let concat = ConcatIter::new(vec![table.clone()]);
    let visible = SnapshotIter::new(concat, u64::MAX, false).collect::<sorted_table::Result<Vec<_>>>()?;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].key.user_key.as_ref(), b"b");
    assert_eq!(visible[0].value.value.as_ref(), b"v2");

    // `all_versions` surfaces the tombstone and every version.
    let concat = ConcatIter::new(vec![table]);
    let visible = SnapshotIter::new(concat, u64::MAX, true).collect::<sorted_table::Result<Vec<_>>>()?;
    assert_eq!(visible.len(), 4);

    Ok(())
}
