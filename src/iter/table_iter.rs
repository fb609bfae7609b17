// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The single-table iterator: a two-level cursor (block, then
//! entry-within-block) that also flattens each entry's old-version sidecar
//! group into the stream, so every table iterator yields a complete
//! `(user_key asc, version desc)` sequence regardless of how many versions
//! of a key live inline vs. in the sidecar.

use crate::table::{value_type_of, Table};
use crate::{block::Block, key::InternalKey, InternalValue};

/// Expands one block's entries into the full row sequence an iterator must
/// produce: each entry's newest (inline) version, immediately followed by
/// its older versions (already newest-first) from the old-block sidecar.
fn expand_block(table: &Table, block: &Block) -> crate::Result<Vec<InternalValue>> {
    let mut rows = Vec::with_capacity(block.len());

    for idx in 0..block.len() {
        let user_key = block.user_key(idx);
        #[allow(clippy::indexing_slicing)]
        let entry = &block.entries()[idx];

        rows.push(InternalValue::new(
            InternalKey::new(user_key.clone(), entry.version, value_type_of(&entry.value)),
            entry.value.clone(),
        ));

        if let Some(old_offset) = entry.old_offset {
            for old in table.old_versions(old_offset)? {
                rows.push(InternalValue::new(
                    InternalKey::new(user_key.clone(), old.version, value_type_of(&old.value)),
                    old.value,
                ));
            }
        }
    }

    Ok(rows)
}

/// Iterates every `(user_key, version)` row in one table, in ascending
/// user-key / descending-version order, front and back simultaneously.
///
/// Holds at most two decoded blocks' worth of expanded rows in memory at
/// once (one for the forward cursor, one for the backward cursor), the
/// same memory profile as the table's own block cache.
pub struct TableIter {
    table: Table,

    /// Exclusive window `[next_block_lo, next_block_hi)` of blocks neither
    /// cursor has claimed yet.
    next_block_lo: usize,
    next_block_hi: usize,

    lo_buf: Option<std::vec::IntoIter<InternalValue>>,
    hi_buf: Option<std::vec::IntoIter<InternalValue>>,
}

impl TableIter {
    #[must_use]
    pub fn new(table: Table) -> Self {
        let block_count = table.block_count();
        Self {
            table,
            next_block_lo: 0,
            next_block_hi: block_count,
            lo_buf: None,
            hi_buf: None,
        }
    }

    /// Repositions the iterator at the first row whose user key is `>=
    /// key`, discarding prior cursor state. Uses the block index's binary
    /// search as a coarse seek; a SuRF-backed fast path belongs one layer
    /// up, where the caller can consult [`Table::surf_seek`] before falling
    /// back to this.
    pub fn seek(&mut self, key: &[u8]) -> crate::Result<()> {
        self.lo_buf = None;
        self.hi_buf = None;

        if self.table.block_count() == 0 {
            self.next_block_lo = 0;
            self.next_block_hi = 0;
            return Ok(());
        }

        let block_idx = self.table.block_containing(key);
        let block = self.table.block(block_idx)?;
        let rows = expand_block(&self.table, &block)?;

        let indices: Vec<usize> = (0..rows.len()).collect();
        #[allow(clippy::indexing_slicing)]
        let start = crate::binary_search::partition_point(&indices, |&i| {
            rows[i].key.user_key.as_ref() < key
        });

        self.lo_buf = Some(rows[start..].to_vec().into_iter());
        self.next_block_lo = block_idx + 1;
        self.next_block_hi = self.table.block_count();

        Ok(())
    }

    /// Repositions the iterator (from the back) at the last row whose user
    /// key is `<= key`, discarding prior cursor state. Shares the same
    /// `Bound`-driven seek shape as [`seek`](Self::seek), just
    /// binary-searching for the opposite edge of the qualifying run within
    /// the same candidate block.
    pub fn seek_for_prev(&mut self, key: &[u8]) -> crate::Result<()> {
        self.lo_buf = None;
        self.hi_buf = None;

        if self.table.block_count() == 0 {
            self.next_block_lo = 0;
            self.next_block_hi = 0;
            return Ok(());
        }

        let block_idx = self.table.block_containing(key);
        let block = self.table.block(block_idx)?;
        let rows = expand_block(&self.table, &block)?;

        let indices: Vec<usize> = (0..rows.len()).collect();
        #[allow(clippy::indexing_slicing)]
        let past_end = crate::binary_search::partition_point(&indices, |&i| {
            rows[i].key.user_key.as_ref() <= key
        });

        if past_end == 0 {
            // Even this block's base key (its smallest) is greater than
            // `key` -- nothing in the table qualifies.
            self.next_block_lo = 0;
            self.next_block_hi = 0;
            return Ok(());
        }

        #[allow(clippy::arithmetic_side_effects)]
        let last_qualifying = past_end - 1;
        self.hi_buf = Some(rows[..=last_qualifying].to_vec().into_iter());
        self.next_block_lo = 0;
        self.next_block_hi = block_idx;

        Ok(())
    }
}

impl Iterator for TableIter {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(buf) = &mut self.lo_buf {
                if let Some(row) = buf.next() {
                    return Some(Ok(row));
                }
                self.lo_buf = None;
            }

            if self.next_block_lo < self.next_block_hi {
                let block = fail_iter!(self.table.block(self.next_block_lo));
                let rows = fail_iter!(expand_block(&self.table, &block));
                self.next_block_lo += 1;
                self.lo_buf = Some(rows.into_iter());
                continue;
            }

            if let Some(buf) = &mut self.hi_buf {
                if let Some(row) = buf.next() {
                    return Some(Ok(row));
                }
                self.hi_buf = None;
            }

            return None;
        }
    }
}

impl DoubleEndedIterator for TableIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(buf) = &mut self.hi_buf {
                if let Some(row) = buf.next_back() {
                    return Some(Ok(row));
                }
                self.hi_buf = None;
            }

            if self.next_block_lo < self.next_block_hi {
                #[allow(clippy::arithmetic_side_effects)]
                let block_idx = self.next_block_hi - 1;
                let block = fail_iter!(self.table.block(block_idx));
                let rows = fail_iter!(expand_block(&self.table, &block));
                self.next_block_hi = block_idx;
                self.hi_buf = Some(rows.into_iter());
                continue;
            }

            if let Some(buf) = &mut self.lo_buf {
                if let Some(row) = buf.next_back() {
                    return Some(Ok(row));
                }
                self.lo_buf = None;
            }

            return None;
        }
    }
}
