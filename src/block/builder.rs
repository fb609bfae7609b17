// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{encode_entry, longest_shared_prefix_length, Block, BlockEntry};
use crate::{value::ValueStruct, InternalValue, Slice};
use byteorder::{LittleEndian, WriteBytesExt};

/// Builds a [`Block`] from a sorted sequence of entries.
///
/// Tracks the shared `base_key` (the first pushed key) and emits each
/// subsequent entry as the suffix after its longest common prefix with that
/// base key.
#[derive(Default)]
pub struct BlockBuilder {
    base_key: Option<Slice>,
    entries_buf: Vec<u8>,
    end_offsets: Vec<u32>,
    entries: Vec<BlockEntry>,
}

impl BlockBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Current estimated encoded size, used by the table builder to decide
    /// when to rotate to a new block.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        let base_key_len = self.base_key.as_ref().map_or(0, Slice::len);
        base_key_len + self.entries_buf.len() + 4 * self.end_offsets.len() + 6
    }

    /// Appends a single-version entry (no older-version sidecar).
    pub fn push(&mut self, value: &InternalValue) {
        self.push_with_old(&value.key.user_key, value.key.seqno, &value.value, None);
    }

    /// Appends an entry whose older versions live in the table's old-block
    /// sidecar region at `old_offset`.
    pub fn push_with_old(
        &mut self,
        user_key: &[u8],
        version: u64,
        value: &ValueStruct,
        old_offset: Option<u32>,
    ) {
        let base_key = self
            .base_key
            .get_or_insert_with(|| Slice::new(user_key))
            .clone();

        let shared_len = longest_shared_prefix_length(base_key.as_ref(), user_key);
        #[allow(clippy::indexing_slicing)]
        let diff_key = &user_key[shared_len..];

        assert!(shared_len <= u16::MAX.into(), "shared prefix too long");
        #[allow(clippy::cast_possible_truncation)]
        let shared_prefix_len = shared_len as u16;

        #[allow(clippy::expect_used)]
        encode_entry(
            shared_prefix_len,
            diff_key,
            old_offset,
            version,
            value,
            &mut self.entries_buf,
        )
        .expect("writing to an in-memory buffer cannot fail");

        #[allow(clippy::cast_possible_truncation)]
        self.end_offsets.push(self.entries_buf.len() as u32);

        self.entries.push(BlockEntry {
            shared_prefix_len,
            diff_key: diff_key.into(),
            version,
            old_offset,
            value: value.clone(),
        });
    }

    /// Finalizes the block, returning both the decoded in-memory [`Block`]
    /// (ready for immediate use / block-cache insertion) and its
    /// uncompressed wire bytes (for the table builder to compress,
    /// checksum and write out).
    #[must_use]
    pub fn finish(self) -> (Block, Vec<u8>) {
        let base_key = self.base_key.unwrap_or_else(|| Slice::new(&[]));

        let mut raw = Vec::with_capacity(self.estimated_size());
        raw.extend_from_slice(&base_key);
        raw.extend_from_slice(&self.entries_buf);

        for offset in &self.end_offsets {
            #[allow(clippy::expect_used)]
            raw.write_u32::<LittleEndian>(*offset)
                .expect("writing to an in-memory buffer cannot fail");
        }

        #[allow(clippy::cast_possible_truncation, clippy::expect_used)]
        raw.write_u32::<LittleEndian>(self.entries.len() as u32)
            .expect("writing to an in-memory buffer cannot fail");

        assert!(base_key.len() <= u16::MAX.into(), "base key too long");
        #[allow(clippy::cast_possible_truncation, clippy::expect_used)]
        raw.write_u16::<LittleEndian>(base_key.len() as u16)
            .expect("writing to an in-memory buffer cannot fail");

        let decoded_len = raw.len();

        (
            Block {
                base_key,
                entries: self.entries,
                decoded_len,
            },
            raw,
        )
    }
}
