// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{block_index::BlockIndex, footer::{Footer, Region}, hash_index::HashIndexBuilder};
use crate::{
    block::{BlockBuilder, OldBlockBuilder},
    checksum::Checksum,
    coding::Encode,
    compression::CompressionType,
    format_version::FormatVersion,
    hash::hash64,
    surf::{builder::SurfBuilder, EntryPosition},
    value::{InternalValue, ValueStruct},
    Config, Slice,
};
use byteorder::WriteBytesExt;

/// Writer-side knobs. Reader-side behaviour is entirely driven by what ends
/// up in the footer (compression, `global_ts`, presence of each region), so
/// there is no separate reader-facing config type.
#[derive(Clone)]
pub struct TableWriterOptions {
    pub block_size: u32,
    pub compression: CompressionType,
    pub hash_index: bool,
    pub surf_filter: bool,
    /// If non-zero, stamped into the footer as the table-wide version.
    /// NOTE: this crate does not (yet) omit the per-entry version field
    /// from blocks when `global_ts` is set -- see `DESIGN.md`.
    pub global_ts: u64,
}

impl From<&Config> for TableWriterOptions {
    fn from(config: &Config) -> Self {
        Self {
            block_size: config.block_size,
            compression: config.compression,
            hash_index: config.hash_index,
            surf_filter: config.surf_filter,
            global_ts: 0,
        }
    }
}

/// Assembles a complete sorted run of [`InternalValue`]s into a table file's
/// bytes: blocks, the old-version sidecar, the block index, the optional
/// hash index and SuRF filter, and the footer.
pub struct TableBuilder {
    opts: TableWriterOptions,

    block_builder: BlockBuilder,
    old_block_builder: OldBlockBuilder,

    blocks_buf: Vec<u8>,
    block_index: BlockIndex,

    hash_index_builder: HashIndexBuilder,
    surf_entries: Vec<(Slice, EntryPosition)>,

    /// Buffers the run of versions sharing the current user key, newest
    /// first, until the next distinct user key is seen.
    pending_run: Vec<InternalValue>,
}

impl TableBuilder {
    #[must_use]
    pub fn new(opts: TableWriterOptions) -> Self {
        Self {
            opts,
            block_builder: BlockBuilder::new(),
            old_block_builder: OldBlockBuilder::new(),
            blocks_buf: Vec::new(),
            block_index: BlockIndex::default(),
            hash_index_builder: HashIndexBuilder::new(),
            surf_entries: Vec::new(),
            pending_run: Vec::new(),
        }
    }

    /// Feeds one value. Values must arrive in ascending `(user_key, version
    /// desc)` order, i.e. the same order [`crate::key::InternalKey`]'s `Ord`
    /// impl defines.
    pub fn push(&mut self, value: InternalValue) -> crate::Result<()> {
        if let Some(last) = self.pending_run.last() {
            if last.key.user_key != value.key.user_key {
                self.flush_run()?;
            }
        }

        self.pending_run.push(value);
        Ok(())
    }

    fn flush_run(&mut self) -> crate::Result<()> {
        if self.pending_run.is_empty() {
            return Ok(());
        }

        let run = std::mem::take(&mut self.pending_run);
        #[allow(clippy::indexing_slicing)]
        let newest = run[0].clone();

        let old_offset = if run.len() > 1 {
            let older: Vec<(u64, ValueStruct)> = run[1..]
                .iter()
                .map(|v| (v.key.seqno, v.value.clone()))
                .collect();
            Some(self.old_block_builder.push_group(&older))
        } else {
            None
        };

        let entry_idx = self.block_builder.len();
        let block_idx = self.block_index.len();

        self.hash_index_builder.push(
            hash64(&newest.key.user_key),
            #[allow(clippy::cast_possible_truncation)]
            {
                block_idx as u32
            },
            entry_idx,
        );

        self.surf_entries.push((
            newest.key.user_key.clone(),
            EntryPosition {
                #[allow(clippy::cast_possible_truncation)]
                block_idx: block_idx as u32,
                #[allow(clippy::cast_possible_truncation)]
                offset_in_block: entry_idx as u32,
            },
        ));

        self.block_builder.push_with_old(
            &newest.key.user_key,
            newest.key.seqno,
            &newest.value,
            old_offset,
        );

        if self.block_builder.estimated_size() >= self.opts.block_size as usize {
            self.rotate_block()?;
        }

        Ok(())
    }

    fn rotate_block(&mut self) -> crate::Result<()> {
        if self.block_builder.is_empty() {
            return Ok(());
        }

        let builder = std::mem::take(&mut self.block_builder);
        let (block, raw) = builder.finish();

        let compressed = self.opts.compression.compress(&raw)?;
        let checksum = Checksum::from_bytes(&compressed);

        self.blocks_buf.extend_from_slice(&compressed);
        self.blocks_buf
            .write_u64::<byteorder::LittleEndian>(checksum.into_u64())
            .map_err(crate::Error::Io)?;

        #[allow(clippy::cast_possible_truncation)]
        self.block_index
            .push(block.base_key().clone(), self.blocks_buf.len() as u64);

        Ok(())
    }

    /// Finalizes the table, returning the complete file bytes ready to be
    /// written out.
    pub fn finish(mut self) -> crate::Result<Vec<u8>> {
        self.flush_run()?;
        self.rotate_block()?;

        let mut out = Vec::new();
        out.extend_from_slice(&self.blocks_buf);

        let old_blocks_bytes = self.old_block_builder.finish();
        let old_blocks_region = Region {
            #[allow(clippy::cast_possible_truncation)]
            offset: out.len() as u64,
            #[allow(clippy::cast_possible_truncation)]
            len: old_blocks_bytes.len() as u64,
        };
        out.extend_from_slice(&old_blocks_bytes);

        let block_index_region = self.write_region(&mut out, |buf| self.block_index.encode_into(buf))?;

        let hash_index_region = if self.opts.hash_index {
            let hash_index = self.hash_index_builder.finish();
            self.write_region(&mut out, |buf| hash_index.encode_into(buf))?
        } else {
            Region::default()
        };

        let surf_region = if self.opts.surf_filter {
            let surf = SurfBuilder::build(
                self.surf_entries
                    .iter()
                    .map(|(key, pos)| (key.as_ref(), *pos)),
            );
            self.write_region(&mut out, |buf| surf.encode_into(buf).map_err(crate::Error::Encode))?
        } else {
            Region::default()
        };

        let footer = Footer {
            block_index: block_index_region,
            hash_index: hash_index_region,
            surf: surf_region,
            old_blocks: old_blocks_region,
            global_ts: self.opts.global_ts,
            compression: self.opts.compression,
            format_version: FormatVersion::V3,
            checksum: Checksum::from_bytes(&out),
        };

        footer.encode_into(&mut out)?;

        Ok(out)
    }

    fn write_region(
        &self,
        out: &mut Vec<u8>,
        encode: impl FnOnce(&mut Vec<u8>) -> crate::Result<()>,
    ) -> crate::Result<Region> {
        let start = out.len();

        let mut region_buf = Vec::new();
        encode(&mut region_buf)?;

        let checksum = Checksum::from_bytes(&region_buf);
        out.extend_from_slice(&region_buf);
        out.write_u64::<byteorder::LittleEndian>(checksum.into_u64())
            .map_err(crate::Error::Io)?;

        Ok(Region {
            #[allow(clippy::cast_possible_truncation)]
            offset: start as u64,
            #[allow(clippy::cast_possible_truncation)]
            len: (out.len() - start) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{value::InternalValue, ValueType};
    use test_log::test;

    fn opts() -> TableWriterOptions {
        TableWriterOptions {
            block_size: 64,
            compression: CompressionType::None,
            hash_index: true,
            surf_filter: true,
            global_ts: 0,
        }
    }

    #[test]
    fn builds_nonempty_file_with_multiple_blocks() -> crate::Result<()> {
        let mut builder = TableBuilder::new(opts());

        for i in 0..50u64 {
            let key = format!("key-{i:05}");
            builder.push(InternalValue::from_components(
                key.as_str(),
                b"value".as_slice(),
                100 - i,
                ValueType::Value,
            ))?;
        }

        let bytes = builder.finish()?;
        assert!(bytes.len() > 64);

        Ok(())
    }

    #[test]
    fn multi_version_keys_split_into_sidecar() -> crate::Result<()> {
        let mut builder = TableBuilder::new(opts());

        builder.push(InternalValue::from_components(
            *b"a",
            b"v3".as_slice(),
            3,
            ValueType::Value,
        ))?;
        builder.push(InternalValue::from_components(
            *b"a",
            b"v2".as_slice(),
            2,
            ValueType::Value,
        ))?;
        builder.push(InternalValue::from_components(
            *b"a",
            b"v1".as_slice(),
            1,
            ValueType::Value,
        ))?;

        let bytes = builder.finish()?;
        assert!(!bytes.is_empty());

        Ok(())
    }
}
