// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The table reader: opens an on-disk SST, parses its footer and indexes,
//! and answers block reads and point-gets. Uses a single-file format (no
//! value-log-backed blob segment).

pub mod block_index;
pub mod builder;
pub mod footer;
pub mod hash_index;

use crate::{
    block::Block,
    block_cache::BlockCache,
    checksum::Checksum,
    descriptor_table::DescriptorTable,
    file::read_exact_at,
    hash::hash64,
    surf::{Surf, SurfLookup},
    value::{InternalValue, ValueStruct},
    Config, Slice,
};
use block_index::BlockIndex;
use footer::{Footer, Region};
use hash_index::{HashIndex, Lookup as HashLookup};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use builder::{TableBuilder, TableWriterOptions};

/// Identifies a table file across the descriptor table and block cache.
pub type TableId = u64;

/// Outcome of [`Table::point_get`].
#[derive(Debug, Eq, PartialEq)]
pub enum PointGetResult {
    /// The hash index (or SuRF) definitively confirmed the key is absent.
    NotFound,
    /// The key was found and resolved to the requested version.
    Found(InternalValue),
    /// The hash index can't answer (collision, or disabled); caller must
    /// fall back to a block-index / SuRF seek.
    Unknown,
}

struct Inner {
    id: TableId,
    path: PathBuf,
    file: Arc<File>,
    footer: Footer,
    block_index: BlockIndex,
    hash_index: Option<HashIndex>,
    surf: Option<Surf>,
    old_blocks: Vec<u8>,
    blocks_region_end: u64,
    block_cache: Option<Arc<BlockCache>>,
}

/// A reference-counted handle to an open table file. Cloning is cheap
/// (`Arc` bump) and shares the same underlying file handle, block cache
/// slot, and parsed indexes -- concurrent readers of the same table never
/// re-parse the footer.
#[derive(Clone)]
pub struct Table(Arc<Inner>);

fn read_region(file: &File, region: Region) -> crate::Result<Vec<u8>> {
    if region.len == 0 {
        return Ok(Vec::new());
    }
    if region.len < 8 {
        return Err(crate::Error::Corruption("region shorter than its checksum trailer".into()));
    }

    let full = read_exact_at(file, region.offset, region.len as usize)?;
    let (body, trailer) = full.split_at(full.len() - 8);

    #[allow(clippy::expect_used)]
    let stored = Checksum::from_raw(u64::from_le_bytes(trailer.try_into().expect("8 bytes")));
    Checksum::from_bytes(body).check(stored)?;

    Ok(body.to_vec())
}

impl Table {
    /// Opens a table file, parsing its footer and indexes eagerly.
    pub fn open(id: TableId, path: impl AsRef<Path>, config: &Config) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < Footer::ENCODED_LEN as u64 {
            return Err(crate::Error::Corruption("table file shorter than its footer".into()));
        }

        let footer_offset = file_len - Footer::ENCODED_LEN as u64;
        let footer_bytes = read_exact_at(&file, footer_offset, Footer::ENCODED_LEN)?;
        let footer = Footer::decode_from(&mut std::io::Cursor::new(footer_bytes.as_ref()))?;

        let block_index = BlockIndex::decode_from(&read_region(&file, footer.block_index)?)?;

        let hash_index = if footer.hash_index.len > 0 {
            Some(HashIndex::decode_from(&read_region(&file, footer.hash_index)?)?)
        } else {
            None
        };

        let surf = if footer.surf.len > 0 {
            let bytes = read_region(&file, footer.surf)?;
            Some(Surf::decode_from(&mut std::io::Cursor::new(bytes)).map_err(crate::Error::Decode)?)
        } else {
            None
        };

        let old_blocks = if footer.old_blocks.len > 0 {
            read_exact_at(&file, footer.old_blocks.offset, footer.old_blocks.len as usize)?.to_vec()
        } else {
            Vec::new()
        };

        let blocks_region_end = if footer.old_blocks.len > 0 {
            footer.old_blocks.offset
        } else {
            footer.block_index.offset
        };

        let file = Arc::new(file);

        if let Some(descriptor_table) = &config.descriptor_table {
            descriptor_table.insert(id, file.clone());
        }

        Ok(Self(Arc::new(Inner {
            id,
            path,
            file,
            footer,
            block_index,
            hash_index,
            surf,
            old_blocks,
            blocks_region_end,
            block_cache: config.block_cache.clone(),
        })))
    }

    #[must_use]
    pub fn id(&self) -> TableId {
        self.0.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    #[must_use]
    pub fn global_ts(&self) -> u64 {
        self.0.footer.global_ts
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.0.block_index.len()
    }

    /// Reads, decompresses and caches block `i`.
    pub fn block(&self, i: usize) -> crate::Result<Arc<Block>> {
        if let Some(cache) = &self.0.block_cache {
            if let Some(block) = cache.get(self.0.id, idx_as_u32(i)) {
                return Ok(block);
            }
        }

        let (start, end) = self.0.block_index.block_range(i);
        if end < start + 8 || end > self.0.blocks_region_end {
            return Err(crate::Error::Corruption("block range out of bounds".into()));
        }

        let span = read_exact_at(&self.0.file, start, (end - start) as usize)?;
        let (compressed, trailer) = span.split_at(span.len() - 8);

        #[allow(clippy::expect_used)]
        let stored = Checksum::from_raw(u64::from_le_bytes(trailer.try_into().expect("8 bytes")));
        Checksum::from_bytes(compressed).check(stored)?;

        let decompressed = self.0.footer.compression.decompress(compressed)?;
        let block = Arc::new(Block::decode(&decompressed)?);

        if let Some(cache) = &self.0.block_cache {
            cache.insert(self.0.id, idx_as_u32(i), block.clone());
        }

        Ok(block)
    }

    /// Resolves the value visible at `target_version` for the entry at
    /// `entry_idx` in `block`, walking the old-version sidecar if the
    /// inline (newest) version is too new. Shared by `point_get` and the
    /// table iterator's intra-block seek.
    fn resolve_version(&self, block: &Block, entry_idx: usize, target_version: u64) -> crate::Result<Option<InternalValue>> {
        #[allow(clippy::indexing_slicing)]
        let entry = &block.entries()[entry_idx];
        let user_key = block.user_key(entry_idx);

        if entry.version <= target_version {
            return Ok(Some(InternalValue::new(
                crate::key::InternalKey::new(user_key, entry.version, value_type_of(&entry.value)),
                entry.value.clone(),
            )));
        }

        let Some(old_offset) = entry.old_offset else {
            return Ok(None);
        };

        for old in crate::block::old_block::read_group(&self.0.old_blocks, old_offset)? {
            if old.version <= target_version {
                return Ok(Some(InternalValue::new(
                    crate::key::InternalKey::new(user_key, old.version, value_type_of(&old.value)),
                    old.value,
                )));
            }
        }

        Ok(None)
    }

    /// Index of the block that may contain `user_key`. See
    /// [`block_index::BlockIndex::block_containing`].
    #[must_use]
    pub fn block_containing(&self, user_key: &[u8]) -> usize {
        self.0.block_index.block_containing(user_key)
    }

    /// Reads every older version stored in the old-version sidecar at
    /// `old_offset`, newest first. Used by the table iterator to surface
    /// all versions of a key, not just the one visible at a given target
    /// version.
    pub(crate) fn old_versions(&self, old_offset: u32) -> crate::Result<Vec<crate::block::OldVersion>> {
        crate::block::old_block::read_group(&self.0.old_blocks, old_offset)
    }

    /// O(1) point lookup for the newest version `<= target_version`.
    pub fn point_get(&self, key: &[u8], target_version: u64) -> crate::Result<PointGetResult> {
        let Some(hash_index) = &self.0.hash_index else {
            return Ok(PointGetResult::Unknown);
        };

        match hash_index.lookup(hash64(key)) {
            HashLookup::NotFound => Ok(PointGetResult::NotFound),
            HashLookup::Collision => Ok(PointGetResult::Unknown),
            HashLookup::Unique(block_idx, entry_offset) => {
                let block = self.block(block_idx as usize)?;
                let entry_idx = entry_offset as usize;

                if entry_idx >= block.len() || block.user_key(entry_idx).as_ref() != key {
                    // A unique slot must never produce a false negative, but
                    // a mismatched key here means the slot's claim doesn't
                    // hold (e.g. a caller-supplied bogus hash); treat it as
                    // "don't know" rather than panicking.
                    return Ok(PointGetResult::Unknown);
                }

                match self.resolve_version(&block, entry_idx, target_version)? {
                    Some(value) => Ok(PointGetResult::Found(value)),
                    None => Ok(PointGetResult::NotFound),
                }
            }
        }
    }

    /// Probes the SuRF filter, if present, translating a hit into the exact
    /// block/entry position to jump to.
    #[must_use]
    pub fn surf_seek(&self, key: &[u8]) -> Option<(u32, u32)> {
        match self.0.surf.as_ref()?.seek(key) {
            SurfLookup::Absent => None,
            SurfLookup::Maybe(pos) => Some((pos.block_idx, pos.offset_in_block)),
        }
    }

    /// Smallest user key in the table (the first block's base key).
    #[must_use]
    pub fn smallest(&self) -> Slice {
        self.0.block_index.base_key(0).clone()
    }

    /// Largest user key in the table; requires reading the last block.
    pub fn biggest(&self) -> crate::Result<Slice> {
        let last_block_idx = self.0.block_index.len().saturating_sub(1);
        let block = self.block(last_block_idx)?;
        let last_entry = block.len().saturating_sub(1);
        Ok(block.user_key(last_entry))
    }

    /// Whether `[start, end]` overlaps this table's key range.
    pub fn has_overlap(&self, start: &[u8], end: &[u8]) -> crate::Result<bool> {
        let smallest = self.smallest();
        let biggest = self.biggest()?;
        Ok(biggest.as_ref() >= start && smallest.as_ref() <= end)
    }
}

fn idx_as_u32(i: usize) -> u32 {
    #[allow(clippy::cast_possible_truncation)]
    {
        i as u32
    }
}

pub(crate) fn value_type_of(value: &ValueStruct) -> crate::ValueType {
    if value.discards_earlier_versions() {
        crate::ValueType::WeakTombstone
    } else if value.is_tombstone() {
        crate::ValueType::Tombstone
    } else {
        crate::ValueType::Value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{value::InternalValue, ValueType};
    use test_log::test;

    fn write_table(path: &Path, entries: Vec<InternalValue>) -> crate::Result<()> {
        let opts = TableWriterOptions {
            block_size: 48,
            compression: crate::compression::CompressionType::None,
            hash_index: true,
            surf_filter: true,
            global_ts: 0,
        };
        let mut builder = TableBuilder::new(opts);
        for entry in entries {
            builder.push(entry)?;
        }
        let bytes = builder.finish()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn config_without_shared_caches() -> Config {
        Config::new()
            .block_cache(Arc::new(BlockCache::with_capacity_bytes(1024 * 1024)))
            .descriptor_table(Arc::new(DescriptorTable::new(8)))
    }

    #[test]
    fn open_point_get_and_bounds() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("0.sst");

        let entries: Vec<_> = (0..40u64)
            .map(|i| {
                InternalValue::from_components(
                    format!("key-{i:05}"),
                    format!("value-{i}").into_bytes(),
                    i,
                    ValueType::Value,
                )
            })
            .collect();
        write_table(&path, entries)?;

        let table = Table::open(1, &path, &config_without_shared_caches())?;
        assert!(table.block_count() > 1);

        match table.point_get(b"key-00005", 39)? {
            PointGetResult::Found(value) => assert_eq!(value.value.value.as_ref(), b"value-5"),
            other => panic!("expected a hit, got {other:?}"),
        }

        assert_eq!(table.point_get(b"does-not-exist", 39)?, PointGetResult::NotFound);

        assert_eq!(table.smallest().as_ref(), b"key-00000");
        assert_eq!(table.biggest()?.as_ref(), b"key-00039");
        assert!(table.has_overlap(b"key-00010", b"key-00020")?);
        assert!(!table.has_overlap(b"zzz", b"zzzz")?);

        Ok(())
    }

    #[test]
    fn point_get_respects_version_ceiling() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("0.sst");

        write_table(
            &path,
            vec![
                InternalValue::from_components(*b"a", b"v3".as_slice(), 3, ValueType::Value),
                InternalValue::from_components(*b"a", b"v2".as_slice(), 2, ValueType::Value),
                InternalValue::from_components(*b"a", b"v1".as_slice(), 1, ValueType::Value),
            ],
        )?;

        let table = Table::open(1, &path, &config_without_shared_caches())?;

        match table.point_get(b"a", 3)? {
            PointGetResult::Found(v) => assert_eq!(v.value.value.as_ref(), b"v3"),
            other => panic!("{other:?}"),
        }
        match table.point_get(b"a", 2)? {
            PointGetResult::Found(v) => assert_eq!(v.value.value.as_ref(), b"v2"),
            other => panic!("{other:?}"),
        }
        match table.point_get(b"a", 1)? {
            PointGetResult::Found(v) => assert_eq!(v.value.value.as_ref(), b"v1"),
            other => panic!("{other:?}"),
        }

        Ok(())
    }

    #[test]
    fn surf_seek_lands_on_same_entry_as_hash_index() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("0.sst");

        write_table(
            &path,
            vec![
                InternalValue::from_components(*b"alpha", b"1".as_slice(), 1, ValueType::Value),
                InternalValue::from_components(*b"beta", b"2".as_slice(), 1, ValueType::Value),
            ],
        )?;

        let table = Table::open(1, &path, &config_without_shared_caches())?;

        let (block_idx, entry_idx) = table.surf_seek(b"alpha").expect("surf should find alpha");
        let block = table.block(block_idx as usize)?;
        assert_eq!(block.user_key(entry_idx as usize).as_ref(), b"alpha");

        Ok(())
    }
}
