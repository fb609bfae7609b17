// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Concatenates a set of non-overlapping tables (e.g. one LSM level) into a
//! single ordered stream.
//!
//! Chains per-table iterators across a level, using the same two-window
//! double-ended strategy as [`TableIter`] itself, one level up (tables
//! instead of blocks).

use super::table_iter::TableIter;
use crate::{table::Table, InternalValue};

/// Iterates every row across a set of tables known not to overlap (e.g. all
/// tables on one LSM level), in ascending table order.
pub struct ConcatIter {
    tables: Vec<Table>,

    next_table_lo: usize,
    next_table_hi: usize,

    lo_iter: Option<TableIter>,
    hi_iter: Option<TableIter>,
}

impl ConcatIter {
    #[must_use]
    pub fn new(tables: Vec<Table>) -> Self {
        let len = tables.len();
        Self {
            tables,
            next_table_lo: 0,
            next_table_hi: len,
            lo_iter: None,
            hi_iter: None,
        }
    }

    /// Binary searches for the first table whose `biggest() >= key`, then
    /// seeks into it. Tables entirely before `key` are skipped without
    /// ever materializing an iterator over them.
    pub fn seek(&mut self, key: &[u8]) -> crate::Result<()> {
        self.lo_iter = None;
        self.hi_iter = None;

        let mut biggest_keys = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            biggest_keys.push(table.biggest()?);
        }

        let indices: Vec<usize> = (0..self.tables.len()).collect();
        #[allow(clippy::indexing_slicing)]
        let idx = crate::binary_search::partition_point(&indices, |&i| {
            biggest_keys[i].as_ref() < key
        });

        if idx >= self.tables.len() {
            self.next_table_lo = self.tables.len();
            self.next_table_hi = self.tables.len();
            return Ok(());
        }

        #[allow(clippy::indexing_slicing)]
        let mut table_iter = TableIter::new(self.tables[idx].clone());
        table_iter.seek(key)?;

        self.lo_iter = Some(table_iter);
        self.next_table_lo = idx + 1;
        self.next_table_hi = self.tables.len();

        Ok(())
    }

    /// Binary searches for the last table whose `smallest() <= key`, then
    /// seeks (from the back) into it via
    /// [`TableIter::seek_for_prev`]. Tables entirely after `key` are
    /// skipped without ever materializing an iterator over them.
    pub fn seek_for_prev(&mut self, key: &[u8]) -> crate::Result<()> {
        self.lo_iter = None;
        self.hi_iter = None;

        let smallest_keys: Vec<_> = self.tables.iter().map(Table::smallest).collect();

        let indices: Vec<usize> = (0..self.tables.len()).collect();
        #[allow(clippy::indexing_slicing)]
        let past_end = crate::binary_search::partition_point(&indices, |&i| {
            smallest_keys[i].as_ref() <= key
        });

        if past_end == 0 {
            self.next_table_lo = 0;
            self.next_table_hi = 0;
            return Ok(());
        }

        #[allow(clippy::arithmetic_side_effects)]
        let idx = past_end - 1;

        #[allow(clippy::indexing_slicing)]
        let mut table_iter = TableIter::new(self.tables[idx].clone());
        table_iter.seek_for_prev(key)?;

        self.hi_iter = Some(table_iter);
        self.next_table_lo = 0;
        self.next_table_hi = idx;

        Ok(())
    }
}

impl Iterator for ConcatIter {
    type Item = crate::Result<InternalValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.lo_iter {
                if let Some(row) = iter.next() {
                    return Some(row);
                }
                self.lo_iter = None;
            }

            if self.next_table_lo < self.next_table_hi {
                #[allow(clippy::indexing_slicing)]
                let table = self.tables[self.next_table_lo].clone();
                self.next_table_lo += 1;
                self.lo_iter = Some(TableIter::new(table));
                continue;
            }

            if let Some(iter) = &mut self.hi_iter {
                if let Some(row) = iter.next() {
                    return Some(row);
                }
                self.hi_iter = None;
            }

            return None;
        }
    }
}

impl DoubleEndedIterator for ConcatIter {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(iter) = &mut self.hi_iter {
                if let Some(row) = iter.next_back() {
                    return Some(row);
                }
                self.hi_iter = None;
            }

            if self.next_table_lo < self.next_table_hi {
                #[allow(clippy::arithmetic_side_effects)]
                let idx = self.next_table_hi - 1;
                #[allow(clippy::indexing_slicing)]
                let table = self.tables[idx].clone();
                self.next_table_hi = idx;
                self.hi_iter = Some(TableIter::new(table));
                continue;
            }

            if let Some(iter) = &mut self.lo_iter {
                if let Some(row) = iter.next_back() {
                    return Some(row);
                }
                self.lo_iter = None;
            }

            return None;
        }
    }
}
