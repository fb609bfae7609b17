// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The data block: the leaf unit of a sorted table, and its MVCC
//! old-version sidecar.
//!
//! A block stores a shared `base_key` prefix, an `end_offsets` trailer and a
//! sorted, binary-searchable sequence of entries. Only the newest version of
//! each key is inlined; older versions live in a per-table sidecar region
//! (see [`old_block`]).

pub mod builder;
pub mod cursor;
pub mod old_block;

use crate::{
    value::ValueStruct,
    Slice,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

pub use builder::BlockBuilder;
pub use cursor::BlockCursor;
pub use old_block::{OldBlockBuilder, OldVersion};

/// Length of the longest common prefix of `a` and `b`.
#[must_use]
pub(crate) fn longest_shared_prefix_length(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

/// One decoded entry in a [`Block`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockEntry {
    /// Length of the prefix this entry's user key shares with the block's
    /// `base_key` (may be shorter than all of `base_key`).
    pub shared_prefix_len: u16,

    /// User-key suffix after `shared_prefix_len` bytes of `base_key`.
    pub diff_key: Slice,

    /// Version of the newest (inline) value for this user-key.
    pub version: u64,

    /// Offset into the table's old-block region where this key's older
    /// versions are stored, if any.
    pub old_offset: Option<u32>,

    /// The newest value for this user-key.
    pub value: ValueStruct,
}

impl BlockEntry {
    #[must_use]
    pub fn has_old(&self) -> bool {
        self.old_offset.is_some()
    }
}

/// A decoded data block: a shared `base_key` prefix plus a sorted sequence
/// of entries, each storing only its suffix after that prefix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Block {
    base_key: Slice,
    entries: Vec<BlockEntry>,
    /// Length of the uncompressed wire encoding, used as the block cache's
    /// cost weight.
    decoded_len: usize,
}

impl Block {
    #[must_use]
    pub fn base_key(&self) -> &Slice {
        &self.base_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    #[must_use]
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }

    /// Reconstructs entry `idx`'s full user key:
    /// `base_key[..shared_prefix_len] || diff_key`.
    #[must_use]
    pub fn user_key(&self, idx: usize) -> Slice {
        #[allow(clippy::indexing_slicing)]
        let entry = &self.entries[idx];
        let shared_len = usize::from(entry.shared_prefix_len);

        if shared_len == 0 {
            entry.diff_key.clone()
        } else if entry.diff_key.is_empty() && shared_len == self.base_key.len() {
            self.base_key.clone()
        } else {
            #[allow(clippy::indexing_slicing)]
            let shared = &self.base_key.as_ref()[..shared_len];
            let mut buf = Vec::with_capacity(shared_len + entry.diff_key.len());
            buf.extend_from_slice(shared);
            buf.extend_from_slice(&entry.diff_key);
            buf.into()
        }
    }

    /// Binary searches for the first entry whose user key is `>= target`.
    /// Returns `entries().len()` if every entry's key is smaller.
    #[must_use]
    pub fn partition_point(&self, target: &[u8]) -> usize {
        let indices: Vec<usize> = (0..self.entries.len()).collect();
        crate::binary_search::partition_point(&indices, |&idx| self.user_key(idx).as_ref() < target)
    }

    /// Decodes a block from its uncompressed wire bytes.
    ///
    /// Layout: `base_key[..] | entries[..] | end_offsets: u32 * n | num_entries: u32 | base_key_len: u16`.
    pub fn decode(bytes: &[u8]) -> crate::Result<Self> {
        let decoded_len = bytes.len();

        if bytes.len() < 6 {
            return Err(crate::Error::Corruption(
                "block shorter than its fixed trailer".into(),
            ));
        }

        #[allow(clippy::indexing_slicing)]
        let base_key_len = u16::from_le_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]) as usize;

        let num_entries_offset = bytes
            .len()
            .checked_sub(6)
            .ok_or_else(|| crate::Error::Corruption("block trailer out of bounds".into()))?;
        #[allow(clippy::indexing_slicing)]
        let num_entries = u32::from_le_bytes(
            bytes[num_entries_offset..num_entries_offset + 4]
                .try_into()
                .map_err(|_| crate::Error::Corruption("malformed num_entries field".into()))?,
        ) as usize;

        let end_offsets_start = num_entries_offset
            .checked_sub(4 * num_entries)
            .ok_or_else(|| crate::Error::Corruption("end_offsets out of bounds".into()))?;

        if base_key_len > end_offsets_start {
            return Err(crate::Error::Corruption(
                "base_key longer than the entry region".into(),
            ));
        }

        #[allow(clippy::indexing_slicing)]
        let base_key: Slice = bytes[..base_key_len].to_vec().into();

        let mut end_offsets = Vec::with_capacity(num_entries);
        {
            #[allow(clippy::indexing_slicing)]
            let mut reader = Cursor::new(&bytes[end_offsets_start..num_entries_offset]);
            for _ in 0..num_entries {
                end_offsets.push(reader.read_u32::<LittleEndian>()? as usize);
            }
        }

        let mut entries = Vec::with_capacity(num_entries);
        let mut entry_start = base_key_len;

        for &entry_end in &end_offsets {
            if entry_end > end_offsets_start || entry_end < entry_start {
                return Err(crate::Error::Corruption(
                    "entry end offset out of bounds".into(),
                ));
            }

            #[allow(clippy::indexing_slicing)]
            let mut reader = Cursor::new(&bytes[entry_start..entry_end]);

            let shared_prefix_len = reader.read_u16::<LittleEndian>()?;
            if usize::from(shared_prefix_len) > base_key_len {
                return Err(crate::Error::Corruption(
                    "entry shared prefix longer than base key".into(),
                ));
            }

            let diff_key_len = reader.read_u16::<LittleEndian>()? as usize;
            let mut diff_key = vec![0u8; diff_key_len];
            reader.read_exact(&mut diff_key)?;

            let has_old = reader.read_u8()?;
            let old_offset = if has_old != 0 {
                Some(reader.read_u32::<LittleEndian>()?)
            } else {
                None
            };

            let version = reader.read_u64::<LittleEndian>()?;

            let remaining = (entry_end - entry_start)
                .checked_sub(2 + 2 + diff_key_len + 1 + if has_old != 0 { 4 } else { 0 } + 8)
                .ok_or_else(|| crate::Error::Corruption("entry shorter than its header".into()))?;
            let value = ValueStruct::decode_from(&mut reader, remaining)?;

            entries.push(BlockEntry {
                shared_prefix_len,
                diff_key: diff_key.into(),
                version,
                old_offset,
                value,
            });

            entry_start = entry_end;
        }

        Ok(Self {
            base_key,
            entries,
            decoded_len,
        })
    }
}

pub(crate) fn encode_entry<W: Write>(
    shared_prefix_len: u16,
    diff_key: &[u8],
    old_offset: Option<u32>,
    version: u64,
    value: &ValueStruct,
    writer: &mut W,
) -> crate::Result<()> {
    assert!(diff_key.len() <= u16::MAX.into(), "diff key too long");
    writer.write_u16::<LittleEndian>(shared_prefix_len)?;
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u16::<LittleEndian>(diff_key.len() as u16)?;
    writer.write_all(diff_key)?;

    match old_offset {
        Some(offset) => {
            writer.write_u8(1)?;
            writer.write_u32::<LittleEndian>(offset)?;
        }
        None => writer.write_u8(0)?,
    }

    writer.write_u64::<LittleEndian>(version)?;
    value.encode_into(writer).map_err(crate::Error::Encode)?;

    Ok(())
}

use crate::coding::Encode;
