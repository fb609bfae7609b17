// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Cumulative popcount lookup table for O(1) `rank` queries.

/// Precomputed cumulative 1-bit counts, one entry per 64-bit word: `lut[i]`
/// is the number of 1-bits in words `[0, i)`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RankLut {
    cumulative: Vec<u64>,
}

impl RankLut {
    #[must_use]
    pub fn build(words: &[u64]) -> Self {
        let mut cumulative = Vec::with_capacity(words.len() + 1);
        let mut running = 0u64;
        cumulative.push(0);
        for word in words {
            running += u64::from(word.count_ones());
            cumulative.push(running);
        }
        Self { cumulative }
    }

    /// Number of 1-bits in words `[0, word_idx)`, i.e. before `word_idx`.
    #[must_use]
    pub fn prefix_before_word(&self, word_idx: usize) -> usize {
        #[allow(clippy::indexing_slicing)]
        let value = self.cumulative[word_idx.min(self.cumulative.len() - 1)];
        value as usize
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.cumulative.last().copied().unwrap_or(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn matches_naive_popcount() {
        let words = [0b1011u64, 0, u64::MAX, 0b1];
        let lut = RankLut::build(&words);

        assert_eq!(lut.prefix_before_word(0), 0);
        assert_eq!(lut.prefix_before_word(1), 3);
        assert_eq!(lut.prefix_before_word(2), 3);
        assert_eq!(lut.prefix_before_word(3), 3 + 64);
        assert_eq!(lut.total(), 3 + 64 + 1);
    }
}
