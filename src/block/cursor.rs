// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Block;
use crate::{value::ValueStruct, Slice};
use std::sync::Arc;

/// A position within a [`Block`], plus a nested cursor over the current
/// entry's old-version sidecar (if any) for MVCC version-seeking.
pub struct BlockCursor {
    block: Arc<Block>,
    idx: usize,
}

impl BlockCursor {
    #[must_use]
    pub fn new(block: Arc<Block>) -> Self {
        Self { block, idx: 0 }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.idx < self.block.len()
    }

    pub fn seek_to_first(&mut self) {
        self.idx = 0;
    }

    pub fn seek_to_last(&mut self) {
        self.idx = self.block.len().saturating_sub(1);
    }

    /// Positions at the first entry whose user key is `>= target`.
    pub fn seek(&mut self, target: &[u8]) {
        self.idx = self.block.partition_point(target);
    }

    pub fn advance(&mut self) {
        if self.is_valid() {
            self.idx += 1;
        }
    }

    pub fn retreat(&mut self) {
        if self.idx == 0 {
            self.idx = self.block.len(); // becomes invalid, like `advance` past the end
        } else {
            self.idx -= 1;
        }
    }

    #[must_use]
    pub fn user_key(&self) -> Slice {
        self.block.user_key(self.idx)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        #[allow(clippy::indexing_slicing)]
        self.block.entries()[self.idx].version
    }

    #[must_use]
    pub fn value(&self) -> &ValueStruct {
        #[allow(clippy::indexing_slicing)]
        &self.block.entries()[self.idx].value
    }

    #[must_use]
    pub fn old_offset(&self) -> Option<u32> {
        #[allow(clippy::indexing_slicing)]
        self.block.entries()[self.idx].old_offset
    }

    #[must_use]
    pub fn idx(&self) -> usize {
        self.idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockBuilder;
    use crate::{InternalValue, ValueType};
    use test_log::test;

    fn sample() -> Arc<Block> {
        let mut builder = BlockBuilder::new();
        for key in [b"a".as_slice(), b"c".as_slice(), b"e".as_slice()] {
            builder.push(&InternalValue::from_components(
                key,
                b"v".as_slice(),
                0,
                ValueType::Value,
            ));
        }
        Arc::new(builder.finish().0)
    }

    #[test]
    fn forward_iteration() {
        let mut cursor = BlockCursor::new(sample());
        let mut keys = Vec::new();
        while cursor.is_valid() {
            keys.push(cursor.user_key().to_vec());
            cursor.advance();
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"c".to_vec(), b"e".to_vec()]);
    }

    #[test]
    fn seek_lands_on_first_ge() {
        let mut cursor = BlockCursor::new(sample());
        cursor.seek(b"b");
        assert_eq!(cursor.user_key().as_ref(), b"c");
    }

    #[test]
    fn reverse_iteration() {
        let mut cursor = BlockCursor::new(sample());
        cursor.seek_to_last();

        let mut keys = Vec::new();
        loop {
            keys.push(cursor.user_key().to_vec());
            if cursor.idx() == 0 {
                break;
            }
            cursor.retreat();
        }
        assert_eq!(keys, vec![b"e".to_vec(), b"c".to_vec(), b"a".to_vec()]);
    }
}
