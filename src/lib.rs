// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A K.I.S.S. implementation of the sorted table and iterator layer of a
//! log-structured merge tree (LSM-tree).
//!
//! ##### NOTE
//!
//! > This crate only provides the on-disk sorted table (SST) format and the
//! > read-side iterator stack built on top of it. It does not ship a
//! > memtable, a write-ahead log, or a compaction scheduler -- those are a
//! > full storage engine's job, layered on top of what's here.
//!
//! ##### About
//!
//! A [`Table`] is an immutable, sorted, versioned run of `(user_key,
//! version) -> value` entries, persisted as one file on disk: a sequence of
//! data blocks, a block index, optional hash index and SuRF filter, an
//! old-version sidecar region holding every non-newest version of a key,
//! and a trailing footer tying it all together with a checksum.
//!
//! Rows are ordered by ascending user key, then descending version, so the
//! newest version of any key always sorts first. Reading one table is
//! [`iter::TableIter`]; reading a set of non-overlapping tables (e.g. one
//! LSM level) in order is [`iter::ConcatIter`]; merging several of those
//! (e.g. one per level, oldest level last) into a single ordered stream is
//! [`iter::MergeIter`]; and resolving that merged stream down to what a
//! reader at a given sequence number should actually see -- hiding versions
//! written after it, collapsing multiple versions of a key down to the
//! newest, dropping tombstones -- is [`iter::SnapshotIter`].
//!
//! # Example usage
//!
//! ```
//! use sorted_table::{
//!     iter::{ConcatIter, SnapshotIter},
//!     table::{Table, TableBuilder, TableWriterOptions},
//!     CompressionType, InternalValue, ValueType,
//! };
//! # let dir = tempfile::tempdir()?;
//! # let path = dir.path().join("0.sst");
//!
//! // Build a table on disk.
//! let opts = TableWriterOptions {
//!     block_size: 4096,
//!     compression: CompressionType::None,
//!     hash_index: true,
//!     surf_filter: true,
//!     global_ts: 0,
//! };
//! let mut builder = TableBuilder::new(opts);
//! builder.push(InternalValue::from_components(*b"hello", b"world".as_slice(), 0, ValueType::Value))?;
//! std::fs::write(&path, builder.finish()?)?;
//!
//! // Open it back up and point-get a key.
//! let table = Table::open(0, &path, &sorted_table::Config::default())?;
//! let _point = table.point_get(b"hello", u64::MAX)?;
//!
//! // Or read the whole table (or a concatenation of several) through the
//! // snapshot view, which hides anything written after `read_ts`.
//! let read_ts = u64::MAX;
//! let concat = ConcatIter::new(vec![table]);
//! let visible = SnapshotIter::new(concat, read_ts, /* all_versions */ false);
//! for row in visible {
//!     let row = row?;
//!     // ...
//! }
//! #
//! # Ok::<(), sorted_table::Error>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![deny(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

macro_rules! fail_iter {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        }
    };
}

pub mod binary_search;
pub(crate) mod bitvec;
pub mod block;
mod block_cache;
pub mod coding;
mod checksum;
pub mod compression;
mod config;
pub(crate) mod descriptor_table;
mod double_ended_peekable;
mod error;
pub mod file;
mod format_version;
pub(crate) mod hash;
pub mod iter;
mod key;
mod slice;
pub mod surf;
pub mod table;
mod value;

pub use {
    block_cache::BlockCache,
    checksum::Checksum,
    compression::CompressionType,
    config::Config,
    descriptor_table::DescriptorTable,
    error::{Error, Result},
    format_version::FormatVersion,
    key::InternalKey,
    slice::Slice,
    table::{PointGetResult, Table, TableId},
    value::{InternalValue, SeqNo, UserKey, UserValue, ValueStruct, ValueType},
};
