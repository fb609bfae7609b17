// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The iterator stack: single-table cursor, non-overlapping-table
//! concatenation, k-way merge, and the user-facing version-aware snapshot
//! view on top, plus the bounded value-prefetch pool.

pub mod clip;
pub mod concat_iter;
pub mod merge_iter;
pub mod prefetch;
pub mod snapshot;
pub mod table_iter;

pub use clip::ClippingIter;
pub use concat_iter::ConcatIter;
pub use merge_iter::{BoxedIterator, MergeIter};
pub use prefetch::{await_slot, PrefetchPool, PrefetchSlot, ValuePointer, ValueResolver};
pub use snapshot::SnapshotIter;
pub use table_iter::TableIter;
