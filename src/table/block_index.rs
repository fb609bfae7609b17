// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::Slice;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Per-block metadata: each block's `base_key` and the byte offset in the
/// file where its (compressed) bytes end.
///
/// Layout: `base_keys[..] (packed) | base_key_end_offsets: u32 * n |
/// block_end_offsets_in_file: u32 * n | num_blocks: u32`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockIndex {
    base_keys: Vec<Slice>,
    block_end_offsets: Vec<u64>,
}

impl BlockIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.base_keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_keys.is_empty()
    }

    #[must_use]
    pub fn base_key(&self, idx: usize) -> &Slice {
        #[allow(clippy::indexing_slicing)]
        &self.base_keys[idx]
    }

    /// `[start, end)` byte range of block `idx` in the blocks region.
    #[must_use]
    pub fn block_range(&self, idx: usize) -> (u64, u64) {
        let start = if idx == 0 {
            0
        } else {
            #[allow(clippy::indexing_slicing)]
            self.block_end_offsets[idx - 1]
        };
        #[allow(clippy::indexing_slicing)]
        (start, self.block_end_offsets[idx])
    }

    /// Index of the block that may contain `user_key`: the last block
    /// whose `base_key <= user_key`, i.e. `partition_point(> user_key) - 1`
    /// clamped to `0`.
    #[must_use]
    pub fn block_containing(&self, user_key: &[u8]) -> usize {
        let indices: Vec<usize> = (0..self.base_keys.len()).collect();
        #[allow(clippy::indexing_slicing)]
        let idx = crate::binary_search::partition_point(&indices, |&i| {
            self.base_keys[i].as_ref() <= user_key
        });
        idx.saturating_sub(1)
    }

    pub fn push(&mut self, base_key: Slice, block_end_offset: u64) {
        self.base_keys.push(base_key);
        self.block_end_offsets.push(block_end_offset);
    }

    pub fn encode_into(&self, writer: &mut Vec<u8>) -> crate::Result<()> {
        let mut packed = Vec::new();
        let mut key_end_offsets = Vec::with_capacity(self.base_keys.len());

        for key in &self.base_keys {
            packed.extend_from_slice(key);
            #[allow(clippy::cast_possible_truncation)]
            key_end_offsets.push(packed.len() as u32);
        }

        writer.extend_from_slice(&packed);

        for offset in &key_end_offsets {
            writer.write_u32::<LittleEndian>(*offset)?;
        }

        for offset in &self.block_end_offsets {
            writer.write_u64::<LittleEndian>(*offset)?;
        }

        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32::<LittleEndian>(self.base_keys.len() as u32)?;

        Ok(())
    }

    pub fn decode_from(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        if bytes.len() < 4 {
            return Err(crate::Error::Corruption("block index shorter than trailer".into()));
        }

        #[allow(clippy::indexing_slicing)]
        let num_blocks =
            u32::from_le_bytes(bytes[bytes.len() - 4..].try_into().unwrap()) as usize;

        let block_end_offsets_start = bytes
            .len()
            .checked_sub(4 + 8 * num_blocks)
            .ok_or_else(|| crate::Error::Corruption("block index end-offsets out of bounds".into()))?;
        let key_end_offsets_start = block_end_offsets_start
            .checked_sub(4 * num_blocks)
            .ok_or_else(|| crate::Error::Corruption("block index key-offsets out of bounds".into()))?;

        let mut block_end_offsets = Vec::with_capacity(num_blocks);
        {
            #[allow(clippy::indexing_slicing)]
            let mut reader =
                std::io::Cursor::new(&bytes[block_end_offsets_start..bytes.len() - 4]);
            for _ in 0..num_blocks {
                block_end_offsets.push(reader.read_u64::<LittleEndian>()?);
            }
        }

        let mut key_end_offsets = Vec::with_capacity(num_blocks);
        {
            #[allow(clippy::indexing_slicing)]
            let mut reader =
                std::io::Cursor::new(&bytes[key_end_offsets_start..block_end_offsets_start]);
            for _ in 0..num_blocks {
                key_end_offsets.push(reader.read_u32::<LittleEndian>()? as usize);
            }
        }

        let mut base_keys = Vec::with_capacity(num_blocks);
        let mut start = 0usize;
        for &end in &key_end_offsets {
            if end > key_end_offsets_start || end < start {
                return Err(crate::Error::Corruption("packed base key out of bounds".into()));
            }
            #[allow(clippy::indexing_slicing)]
            base_keys.push(Slice::new(&bytes[start..end]));
            start = end;
        }

        Ok(Self {
            base_keys,
            block_end_offsets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn roundtrip_and_containment() -> crate::Result<()> {
        let mut index = BlockIndex::default();
        index.push(Slice::new(b"a"), 100);
        index.push(Slice::new(b"m"), 200);
        index.push(Slice::new(b"z"), 300);

        let mut buf = Vec::new();
        index.encode_into(&mut buf)?;

        let decoded = BlockIndex::decode_from(&buf)?;
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.base_key(1).as_ref(), b"m");
        assert_eq!(decoded.block_range(1), (100, 200));

        assert_eq!(decoded.block_containing(b"a"), 0);
        assert_eq!(decoded.block_containing(b"b"), 0);
        assert_eq!(decoded.block_containing(b"n"), 1);
        assert_eq!(decoded.block_containing(b"zzz"), 2);

        Ok(())
    }
}
