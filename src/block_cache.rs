// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{block::Block, table::TableId};
use quick_cache::{sync::Cache, Weighter};
use std::sync::Arc;

#[derive(Eq, std::hash::Hash, PartialEq, Clone, Copy)]
struct CacheKey(TableId, u32);

#[derive(Clone)]
struct BlockWeighter;

impl Weighter<CacheKey, Arc<Block>> for BlockWeighter {
    fn weight(&self, _: &CacheKey, block: &Arc<Block>) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        (block.decoded_len() as u64).max(1)
    }
}

/// Block cache: caches decoded data blocks in memory after being retrieved
/// from disk, keyed by `(table_id, block_idx)`.
///
/// This speeds up consecutive queries to nearby data, improving read
/// performance for hot data. Capacity is bounded and cost-weighted by
/// decoded block size; eviction uses `quick_cache`'s sampled-LFU policy.
/// Entries are immutable once inserted, so concurrent readers can share a
/// reference without synchronization.
///
/// # Examples
///
/// Sharing a block cache between multiple tables:
///
/// ```
/// use sorted_table::BlockCache;
/// use std::sync::Arc;
///
/// // Provide 40 MB of cache capacity
/// let block_cache = Arc::new(BlockCache::with_capacity_bytes(40 * 1_000 * 1_000));
/// ```
pub struct BlockCache {
    // NOTE: rustc_hash performed best for this access pattern, see fjall's blog post on cache tuning
    data: Cache<CacheKey, Arc<Block>, BlockWeighter, rustc_hash::FxBuildHasher>,
    capacity: u64,
}

impl BlockCache {
    /// Creates a new block cache with roughly `n` bytes of capacity.
    #[must_use]
    pub fn with_capacity_bytes(bytes: u64) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        #[allow(clippy::default_trait_access)]
        let quick_cache = Cache::with(
            1_000_000,
            bytes,
            BlockWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );

        Self {
            data: quick_cache,
            capacity: bytes,
        }
    }

    /// Returns the amount of cached bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.weight()
    }

    /// Returns the cache capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of cached blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no cached blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[doc(hidden)]
    pub fn insert(&self, table_id: TableId, block_idx: u32, value: Arc<Block>) {
        if self.capacity > 0 {
            self.data.insert(CacheKey(table_id, block_idx), value);
        }
    }

    #[doc(hidden)]
    #[must_use]
    pub fn get(&self, table_id: TableId, block_idx: u32) -> Option<Arc<Block>> {
        self.data.get(&CacheKey(table_id, block_idx))
    }
}
