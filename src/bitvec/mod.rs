// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A packed bit vector with `rank`/`select` support, used by the SuRF trie
//! ([`crate::surf`]) to represent the `has_child` and `louds` structural
//! bitmaps.
//!
//! Backed by a packed `u64` word array with a sampled select index, since
//! SuRF needs `select` as well as plain membership tests.

mod rank;
mod select;

pub use rank::RankLut;
pub use select::SelectLut;

use std::sync::OnceLock;

const WORD_BITS: usize = 64;

/// An append-only, then frozen, bit vector with O(1) `rank` and `select`,
/// backed by [`RankLut`] and [`SelectLut`] built lazily on first query and
/// cached for the bit vector's lifetime.
#[derive(Default)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    rank_lut: OnceLock<RankLut>,
    select_lut: OnceLock<SelectLut>,
}

impl Clone for BitVec {
    fn clone(&self) -> Self {
        // Caches are rebuilt lazily on first query rather than cloned -- a
        // clone of a frozen BitVec shouldn't eagerly pay for someone else's
        // derived state.
        Self {
            words: self.words.clone(),
            len: self.len,
            rank_lut: OnceLock::new(),
            select_lut: OnceLock::new(),
        }
    }
}

impl std::fmt::Debug for BitVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitVec")
            .field("words", &self.words)
            .field("len", &self.len)
            .finish()
    }
}

impl PartialEq for BitVec {
    fn eq(&self, other: &Self) -> bool {
        self.words == other.words && self.len == other.len
    }
}

impl Eq for BitVec {}

impl BitVec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
            rank_lut: OnceLock::new(),
            select_lut: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: Vec::with_capacity(bits.div_ceil(WORD_BITS)),
            len: 0,
            rank_lut: OnceLock::new(),
            select_lut: OnceLock::new(),
        }
    }

    pub fn push(&mut self, bit: bool) {
        let word_idx = self.len / WORD_BITS;
        if word_idx >= self.words.len() {
            self.words.push(0);
        }
        if bit {
            let bit_idx = self.len % WORD_BITS;
            #[allow(clippy::indexing_slicing)]
            {
                self.words[word_idx] |= 1u64 << bit_idx;
            }
        }
        self.len += 1;

        // A further push invalidates any LUT built over the old word array.
        self.rank_lut = OnceLock::new();
        self.select_lut = OnceLock::new();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn get(&self, pos: usize) -> bool {
        assert!(pos < self.len, "bit index {pos} out of bounds ({})", self.len);
        let word_idx = pos / WORD_BITS;
        let bit_idx = pos % WORD_BITS;
        #[allow(clippy::indexing_slicing)]
        (self.words[word_idx] >> bit_idx) & 1 == 1
    }

    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    fn rank_lut(&self) -> &RankLut {
        self.rank_lut.get_or_init(|| RankLut::build(&self.words))
    }

    fn select_lut(&self) -> &SelectLut {
        self.select_lut.get_or_init(|| SelectLut::build(&self.words))
    }

    /// Number of 1-bits in `[0, pos]` (inclusive).
    #[must_use]
    pub fn rank(&self, pos: usize) -> usize {
        if self.len == 0 {
            return 0;
        }
        let pos = pos.min(self.len - 1);
        let word_idx = pos / WORD_BITS;
        let bit_idx = pos % WORD_BITS;

        let mut count = self.rank_lut().prefix_before_word(word_idx);

        #[allow(clippy::indexing_slicing)]
        let last_word = self.words[word_idx];
        let mask = if bit_idx == WORD_BITS - 1 {
            u64::MAX
        } else {
            (1u64 << (bit_idx + 1)) - 1
        };
        count += (last_word & mask).count_ones() as usize;

        count
    }

    /// Position of the `r`-th 1-bit (1-based). Panics if `r` is out of range.
    #[must_use]
    pub fn select(&self, r: usize) -> usize {
        assert!(r >= 1, "select is 1-based");

        let (start_word, mut seen) = self.select_lut().sample_for(r);
        let mut remaining = r - seen;

        for (word_idx, &word) in self.words.iter().enumerate().skip(start_word) {
            let ones = word.count_ones() as usize;
            if remaining <= ones {
                let bit_idx = select_in_word(word, remaining);
                return word_idx * WORD_BITS + bit_idx;
            }
            remaining -= ones;
            seen += ones;
        }

        panic!("select({r}) out of range: only {seen} set bits");
    }

    /// Total number of 1-bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Distance from `pos` (exclusive) to the next set bit, or `len - pos`
    /// if none exists.
    #[must_use]
    pub fn distance_to_next_set_bit(&self, pos: usize) -> usize {
        let mut cur = pos + 1;
        while cur < self.len {
            if self.get(cur) {
                return cur - pos;
            }
            cur += 1;
        }
        self.len - pos
    }

    /// Distance from `pos` (exclusive, going backwards) to the previous set
    /// bit, or `pos + 1` if none exists.
    #[must_use]
    pub fn distance_to_prev_set_bit(&self, pos: usize) -> usize {
        if pos == 0 {
            return 1;
        }
        let mut cur = pos;
        while cur > 0 {
            cur -= 1;
            if self.get(cur) {
                return pos - cur;
            }
        }
        pos + 1
    }
}

/// Position (0-based, within the word) of the `r`-th (1-based) set bit.
fn select_in_word(mut word: u64, mut r: usize) -> usize {
    let mut pos = 0;
    while r > 1 {
        word &= word - 1; // clear lowest set bit
        r -= 1;
    }
    let lowest = word & word.wrapping_neg();
    pos += lowest.trailing_zeros() as usize;
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn build(bits: &[bool]) -> BitVec {
        let mut bv = BitVec::new();
        for &b in bits {
            bv.push(b);
        }
        bv
    }

    #[test]
    fn rank_matches_naive() {
        let bits = [true, false, true, true, false, false, true, false, true];
        let bv = build(&bits);

        for pos in 0..bits.len() {
            let expected = bits[..=pos].iter().filter(|&&b| b).count();
            assert_eq!(bv.rank(pos), expected, "rank({pos})");
        }
    }

    #[test]
    fn select_matches_naive() {
        let bits = [true, false, true, true, false, false, true, false, true];
        let bv = build(&bits);

        let ones: Vec<usize> = bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(|(i, _)| i)
            .collect();

        for (r, &pos) in ones.iter().enumerate() {
            assert_eq!(bv.select(r + 1), pos, "select({})", r + 1);
        }
    }

    #[test]
    fn rank_select_round_trip_across_words() {
        let mut bv = BitVec::new();
        for i in 0..300 {
            bv.push(i % 7 == 0);
        }

        let num_ones = bv.count_ones();
        for r in 1..=num_ones {
            let pos = bv.select(r);
            assert_eq!(bv.rank(pos), r);
        }
    }

    #[test]
    fn distance_to_next_and_prev_set_bit() {
        let bv = build(&[false, false, true, false, false, true]);
        assert_eq!(bv.distance_to_next_set_bit(0), 2);
        assert_eq!(bv.distance_to_next_set_bit(2), 3);
        assert_eq!(bv.distance_to_next_set_bit(5), 1); // no further bit: len - pos
        assert_eq!(bv.distance_to_prev_set_bit(5), 3);
        assert_eq!(bv.distance_to_prev_set_bit(2), 3); // no earlier bit: pos + 1
    }
}
