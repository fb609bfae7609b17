// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The old-version sidecar: a per-table region holding the non-newest
//! versions of keys that have more than one. A block's entry only ever
//! inlines the newest version; `has_old`/`old_offset` point here.
//!
//! Layout at `old_offset`: `num_entries: u32 | end_offsets[num_entries]: u32
//! | entries[]`, where each entry is `version: u64 || value_bytes`, newest
//! (of the *older* versions) first.

use crate::value::ValueStruct;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// One older version of a key, as read back from the sidecar.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OldVersion {
    pub version: u64,
    pub value: ValueStruct,
}

/// Accumulates old-version groups into a single byte buffer, handing back
/// each group's offset for the owning block entry to reference.
#[derive(Default)]
pub struct OldBlockBuilder {
    buf: Vec<u8>,
}

impl OldBlockBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Appends a group of older versions (newest-of-the-rest first),
    /// returning the byte offset at which it was written.
    pub fn push_group(&mut self, versions: &[(u64, ValueStruct)]) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let group_offset = self.buf.len() as u32;

        let mut entries_buf = Vec::new();
        let mut end_offsets = Vec::with_capacity(versions.len());

        for (version, value) in versions {
            #[allow(clippy::expect_used)]
            {
                entries_buf
                    .write_u64::<LittleEndian>(*version)
                    .expect("in-memory write cannot fail");
                value
                    .encode_into(&mut entries_buf)
                    .expect("in-memory write cannot fail");
            }
            #[allow(clippy::cast_possible_truncation)]
            end_offsets.push(entries_buf.len() as u32);
        }

        #[allow(clippy::cast_possible_truncation, clippy::expect_used)]
        self.buf
            .write_u32::<LittleEndian>(versions.len() as u32)
            .expect("in-memory write cannot fail");
        for offset in &end_offsets {
            #[allow(clippy::expect_used)]
            self.buf
                .write_u32::<LittleEndian>(*offset)
                .expect("in-memory write cannot fail");
        }
        self.buf.extend_from_slice(&entries_buf);

        group_offset
    }

    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Reads back one old-version group from the sidecar region.
pub fn read_group(region: &[u8], offset: u32) -> crate::Result<Vec<OldVersion>> {
    let offset = offset as usize;
    if offset + 4 > region.len() {
        return Err(crate::Error::Corruption(
            "old-block group offset out of bounds".into(),
        ));
    }

    #[allow(clippy::indexing_slicing)]
    let num_entries = u32::from_le_bytes(region[offset..offset + 4].try_into().unwrap()) as usize;

    let end_offsets_start = offset + 4;
    let end_offsets_end = end_offsets_start + 4 * num_entries;
    if end_offsets_end > region.len() {
        return Err(crate::Error::Corruption(
            "old-block end_offsets out of bounds".into(),
        ));
    }

    let mut end_offsets = Vec::with_capacity(num_entries);
    #[allow(clippy::indexing_slicing)]
    for chunk in region[end_offsets_start..end_offsets_end].chunks_exact(4) {
        end_offsets.push(u32::from_le_bytes(chunk.try_into().unwrap()) as usize);
    }

    let mut versions = Vec::with_capacity(num_entries);
    let mut entry_start = 0usize;
    let entries_base = end_offsets_end;

    for &entry_end in &end_offsets {
        if entries_base + entry_end > region.len() || entry_end < entry_start {
            return Err(crate::Error::Corruption(
                "old-block entry out of bounds".into(),
            ));
        }

        #[allow(clippy::indexing_slicing)]
        let mut reader =
            std::io::Cursor::new(&region[entries_base + entry_start..entries_base + entry_end]);
        let version = reader.read_u64::<LittleEndian>()?;
        let remaining = (entry_end - entry_start)
            .checked_sub(8)
            .ok_or_else(|| crate::Error::Corruption("old-block entry shorter than its header".into()))?;
        let value = ValueStruct::decode_from(&mut reader, remaining)?;

        versions.push(OldVersion { version, value });
        entry_start = entry_end;
    }

    Ok(versions)
}

use crate::coding::Encode;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Slice;
    use test_log::test;

    #[test]
    fn roundtrip_single_group() -> crate::Result<()> {
        let mut builder = OldBlockBuilder::new();
        let versions = vec![
            (5u64, ValueStruct::new(Slice::new(b"v5"))),
            (3u64, ValueStruct::new(Slice::new(b"v3"))),
        ];
        let offset = builder.push_group(&versions);
        let region = builder.finish();

        let decoded = read_group(&region, offset)?;
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].version, 5);
        assert_eq!(decoded[0].value.value.as_ref(), b"v5");
        assert_eq!(decoded[1].version, 3);

        Ok(())
    }

    #[test]
    fn roundtrip_multiple_groups() -> crate::Result<()> {
        let mut builder = OldBlockBuilder::new();

        let group_a = vec![(2u64, ValueStruct::new(Slice::new(b"a2")))];
        let group_b = vec![
            (9u64, ValueStruct::new(Slice::new(b"b9"))),
            (7u64, ValueStruct::new(Slice::new(b"b7"))),
            (1u64, ValueStruct::new(Slice::new(b"b1"))),
        ];

        let off_a = builder.push_group(&group_a);
        let off_b = builder.push_group(&group_b);
        let region = builder.finish();

        let decoded_a = read_group(&region, off_a)?;
        let decoded_b = read_group(&region, off_b)?;

        assert_eq!(decoded_a.len(), 1);
        assert_eq!(decoded_b.len(), 3);
        assert_eq!(decoded_b[1].version, 7);

        Ok(())
    }
}
