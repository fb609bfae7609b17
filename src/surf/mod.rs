// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! SuRF: a succinct range filter over user keys.
//!
//! A LOUDS-encoded trie answering "does this key (probably) exist" and,
//! on a hit, returning the leaf's stored [`EntryPosition`] so the table
//! reader can jump straight to the right block without an index binary
//! search. Built purely in the *sparse* representation: every trie level is
//! label-listed rather than promoting the upper levels to a dense 256-bit
//! bitmap. This keeps build and query code uniform, at the cost of not
//! exploiting dense upper levels on very large tries.
//!
//! Built from first principles on top of [`crate::bitvec::BitVec`],
//! following this crate's usual bit-array and `Encode`/`Decode`
//! conventions.

pub mod builder;

use crate::{
    bitvec::BitVec,
    coding::{Decode, DecodeError, Encode, EncodeError},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

pub use builder::SurfBuilder;

/// Reserved label marking a node that terminates a key shorter than one of
/// its siblings. Keys containing a literal `0xFF` byte are not supported by
/// this filter; callers fall back to the block index in that case (see
/// `DESIGN.md`).
pub const TERMINATOR: u8 = 0xFF;

/// Where a SuRF leaf's key lives in the table: which block, and which
/// entry's byte offset within that block's decoded entry region.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EntryPosition {
    pub block_idx: u32,
    pub offset_in_block: u32,
}

impl Encode for EntryPosition {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<LittleEndian>(self.block_idx)?;
        writer.write_u32::<LittleEndian>(self.offset_in_block)?;
        Ok(())
    }
}

impl Decode for EntryPosition {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            block_idx: reader.read_u32::<LittleEndian>()?,
            offset_in_block: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Result of probing a [`Surf`] filter.
#[derive(Debug, Eq, PartialEq)]
pub enum SurfLookup {
    /// The key definitely does not exist.
    Absent,
    /// The key may exist; landed on this leaf's stored position. Suffix
    /// checks (if any) already ruled out an obvious false positive, but the
    /// caller must still verify against the real key once it reads the
    /// block, since SuRF is a probabilistic filter.
    Maybe(EntryPosition),
}

/// A succinct range filter over a sorted set of user keys.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Surf {
    labels: Vec<u8>,
    has_child: BitVec,
    louds: BitVec,
    values: Vec<EntryPosition>,
    /// One-byte hash suffix per leaf, aligned with `values`, used to cut
    /// down false positives cheaply without storing real key suffixes.
    suffixes: Vec<u8>,
}

impl Surf {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.louds.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    fn first_edge_of_node(&self, node: usize) -> usize {
        if node == 0 {
            0
        } else {
            self.louds.select(node)
        }
    }

    fn node_edge_range(&self, node: usize) -> std::ops::Range<usize> {
        let start = self.first_edge_of_node(node);
        if start >= self.louds.len() {
            return start..start;
        }
        let dist = self.louds.distance_to_next_set_bit(start);
        let end = (start + dist).min(self.louds.len());
        start..end
    }

    fn child_node_idx(&self, edge_i: usize) -> usize {
        self.has_child.rank(edge_i)
    }

    fn leaf_value_idx(&self, edge_i: usize) -> usize {
        edge_i - self.has_child.rank(edge_i)
    }

    /// Smallest-label descent from `node` down to a leaf, used for
    /// "greater-than" seek matches that land on an internal node.
    fn leftmost_leaf(&self, mut node: usize) -> EntryPosition {
        loop {
            let range = self.node_edge_range(node);
            #[allow(clippy::indexing_slicing)]
            let edge = range.start;
            if self.has_child.get(edge) {
                node = self.child_node_idx(edge);
            } else {
                let idx = self.leaf_value_idx(edge);
                #[allow(clippy::indexing_slicing)]
                return self.values[idx];
            }
        }
    }

    /// Finds the smallest label `>= target` within a node's edge range,
    /// via binary search (labels within a node are stored ascending).
    fn find_edge(&self, range: std::ops::Range<usize>, target: u8) -> Option<(usize, bool)> {
        #[allow(clippy::indexing_slicing)]
        let window = &self.labels[range.clone()];
        match window.binary_search(&target) {
            Ok(i) => Some((range.start + i, true)),
            Err(i) if i < window.len() => Some((range.start + i, false)),
            Err(_) => None,
        }
    }

    /// Seeks the smallest key `>= target`. Descends level by level; on an
    /// exact match it recurses into the child, on a `>` match it jumps to
    /// the leftmost leaf of that subtree, and on no match within a node it
    /// backtracks to the next-greater sibling of an ancestor.
    #[must_use]
    pub fn seek(&self, target: &[u8]) -> SurfLookup {
        if self.is_empty() {
            return SurfLookup::Absent;
        }

        // Stack of (node, edge_used_to_enter) so we can backtrack to a
        // sibling when a level has no label >= the target byte.
        let mut stack: Vec<(usize, usize)> = Vec::new();
        let mut node = 0usize;

        for (depth, &byte) in target.iter().enumerate() {
            let range = self.node_edge_range(node);
            if range.is_empty() {
                return self.backtrack(&stack);
            }

            match self.find_edge(range, byte) {
                Some((edge, exact)) => {
                    if exact {
                        if self.has_child.get(edge) {
                            stack.push((node, edge));
                            node = self.child_node_idx(edge);
                            if depth + 1 == target.len() {
                                // Target fully consumed on an internal edge:
                                // the smallest completion is the leftmost leaf.
                                return SurfLookup::Maybe(self.leftmost_leaf(node));
                            }
                        } else {
                            let idx = self.leaf_value_idx(edge);
                            #[allow(clippy::indexing_slicing)]
                            return SurfLookup::Maybe(self.values[idx]);
                        }
                    } else {
                        // Smallest label greater than target at this level:
                        // the whole remainder of target is irrelevant, jump
                        // to the leftmost completion of this edge.
                        return if self.has_child.get(edge) {
                            SurfLookup::Maybe(self.leftmost_leaf(self.child_node_idx(edge)))
                        } else {
                            let idx = self.leaf_value_idx(edge);
                            #[allow(clippy::indexing_slicing)]
                            SurfLookup::Maybe(self.values[idx])
                        };
                    }
                }
                None => return self.backtrack(&stack),
            }
        }

        // Target exhausted exactly at `node`; prefer an exact terminator
        // child if present, else the leftmost completion.
        let range = self.node_edge_range(node);
        if let Some((edge, true)) = self.find_edge(range, TERMINATOR) {
            let idx = self.leaf_value_idx(edge);
            #[allow(clippy::indexing_slicing)]
            return SurfLookup::Maybe(self.values[idx]);
        }
        SurfLookup::Maybe(self.leftmost_leaf(node))
    }

    fn backtrack(&self, stack: &[(usize, usize)]) -> SurfLookup {
        for &(node, entry_edge) in stack.iter().rev() {
            let range_end = self.node_edge_range(node).end;

            if entry_edge + 1 < range_end {
                let next_edge = entry_edge + 1;
                return if self.has_child.get(next_edge) {
                    SurfLookup::Maybe(self.leftmost_leaf(self.child_node_idx(next_edge)))
                } else {
                    let idx = self.leaf_value_idx(next_edge);
                    #[allow(clippy::indexing_slicing)]
                    SurfLookup::Maybe(self.values[idx])
                };
            }
        }
        SurfLookup::Absent
    }

    /// Cheap existence check: probes [`Self::seek`] and rejects an obvious
    /// false positive using the stored hash suffix, if any.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        match self.seek(key) {
            SurfLookup::Absent => false,
            SurfLookup::Maybe(pos) => {
                let idx = self.values.iter().position(|v| *v == pos);
                match idx.and_then(|i| self.suffixes.get(i)) {
                    Some(&suffix) => suffix == suffix_hash(key),
                    None => true,
                }
            }
        }
    }
}

fn suffix_hash(key: &[u8]) -> u8 {
    #[allow(clippy::cast_possible_truncation)]
    (crate::hash::hash64(key) as u8)
}

impl Encode for Surf {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32::<LittleEndian>(self.labels.len() as u32)?;
        writer.write_all(&self.labels)?;

        encode_bitvec(&self.has_child, writer)?;
        encode_bitvec(&self.louds, writer)?;

        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32::<LittleEndian>(self.values.len() as u32)?;
        for value in &self.values {
            value.encode_into(writer)?;
        }

        writer.write_all(&self.suffixes)?;

        Ok(())
    }
}

impl Decode for Surf {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let label_count = reader.read_u32::<LittleEndian>()? as usize;
        let mut labels = vec![0u8; label_count];
        reader.read_exact(&mut labels)?;

        let has_child = decode_bitvec(reader, label_count)?;
        let louds = decode_bitvec(reader, label_count)?;

        let value_count = reader.read_u32::<LittleEndian>()? as usize;
        let mut values = Vec::with_capacity(value_count);
        for _ in 0..value_count {
            values.push(EntryPosition::decode_from(reader)?);
        }

        let mut suffixes = vec![0u8; value_count];
        reader.read_exact(&mut suffixes)?;

        Ok(Self {
            labels,
            has_child,
            louds,
            values,
            suffixes,
        })
    }
}

fn encode_bitvec<W: Write>(bv: &BitVec, writer: &mut W) -> Result<(), EncodeError> {
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32::<LittleEndian>(bv.len() as u32)?;
    for word in bv.words() {
        writer.write_u64::<LittleEndian>(*word)?;
    }
    Ok(())
}

fn decode_bitvec<R: Read>(reader: &mut R, expected_bits: usize) -> Result<BitVec, DecodeError> {
    let bit_len = reader.read_u32::<LittleEndian>()? as usize;
    if bit_len != expected_bits {
        return Err(DecodeError::Corrupt("surf bitvector length mismatch"));
    }
    let mut bv = BitVec::with_capacity(bit_len);
    let num_words = bit_len.div_ceil(64);
    for _ in 0..num_words {
        let word = reader.read_u64::<LittleEndian>()?;
        for bit in 0..64 {
            if bv.len() == bit_len {
                break;
            }
            bv.push((word >> bit) & 1 == 1);
        }
    }
    Ok(bv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn pos(i: u32) -> EntryPosition {
        EntryPosition {
            block_idx: i,
            offset_in_block: i * 10,
        }
    }

    #[test]
    fn seek_finds_exact_keys() {
        let keys: Vec<(&[u8], EntryPosition)> = vec![
            (b"apple", pos(0)),
            (b"apricot", pos(1)),
            (b"banana", pos(2)),
            (b"cherry", pos(3)),
        ];

        let surf = SurfBuilder::build(keys.iter().cloned());

        for (key, expected) in &keys {
            match surf.seek(key) {
                SurfLookup::Maybe(got) => assert_eq!(got, *expected, "key = {key:?}"),
                SurfLookup::Absent => panic!("expected a match for {key:?}"),
            }
        }
    }

    #[test]
    fn seek_greater_than_lands_past_target() {
        let keys: Vec<(&[u8], EntryPosition)> =
            vec![(b"bob".as_slice(), pos(0)), (b"carl".as_slice(), pos(1))];
        let surf = SurfBuilder::build(keys.into_iter());

        // "al" sorts before "bob", so seeking it should land on "bob" (the
        // smallest key >= "al") rather than report absence.
        assert!(matches!(surf.seek(b"al"), SurfLookup::Maybe(_)));
    }

    #[test]
    fn roundtrip_encode_decode() -> crate::Result<()> {
        let keys: Vec<(&[u8], EntryPosition)> =
            vec![(b"a".as_slice(), pos(0)), (b"ab".as_slice(), pos(1))];
        let surf = SurfBuilder::build(keys.into_iter());

        let mut buf = Vec::new();
        surf.encode_into(&mut buf)?;

        let decoded = Surf::decode_from(&mut std::io::Cursor::new(buf))?;
        assert_eq!(surf, decoded);

        Ok(())
    }
}
