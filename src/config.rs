// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{block_cache::BlockCache, compression::CompressionType, descriptor_table::DescriptorTable};
use std::sync::Arc;

/// Target size, in bytes, of an uncompressed data block before the builder
/// rotates to a new one.
pub const DEFAULT_BLOCK_SIZE: u32 = 4 * 1_024;

/// Knobs shared by the table builder and table reader.
///
/// A builder-style struct narrowed to what a standalone SST reader/writer
/// needs: there is no memtable, WAL or compaction strategy selection here.
#[derive(Clone)]
pub struct Config {
    /// Target uncompressed block size.
    pub block_size: u32,

    /// Compression codec applied to data blocks and auxiliary regions.
    pub compression: CompressionType,

    /// Whether to build a hash index for O(1) point lookups.
    pub hash_index: bool,

    /// Whether to build a SuRF filter for false-positive-bounded seeks.
    pub surf_filter: bool,

    /// Shared block cache. `None` disables caching.
    pub block_cache: Option<Arc<BlockCache>>,

    /// Shared descriptor (open file handle) table.
    pub descriptor_table: Option<Arc<DescriptorTable>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression: CompressionType::None,
            hash_index: true,
            surf_filter: true,
            block_cache: Some(Arc::new(BlockCache::with_capacity_bytes(
                8 * 1_024 * 1_024,
            ))),
            descriptor_table: Some(Arc::new(DescriptorTable::new(512))),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        assert!(block_size >= 1_024, "block size should be at least 1 KiB");
        self.block_size = block_size;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn hash_index(mut self, enabled: bool) -> Self {
        self.hash_index = enabled;
        self
    }

    #[must_use]
    pub fn surf_filter(mut self, enabled: bool) -> Self {
        self.surf_filter = enabled;
        self
    }

    #[must_use]
    pub fn block_cache(mut self, block_cache: Arc<BlockCache>) -> Self {
        self.block_cache = Some(block_cache);
        self
    }

    #[must_use]
    pub fn descriptor_table(mut self, descriptor_table: Arc<DescriptorTable>) -> Self {
        self.descriptor_table = Some(descriptor_table);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn default_config_has_sane_block_size() {
        let config = Config::default();
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.hash_index);
        assert!(config.surf_filter);
    }

    #[test]
    fn builder_overrides_apply() {
        let config = Config::new().block_size(8 * 1_024).hash_index(false);
        assert_eq!(config.block_size, 8 * 1_024);
        assert!(!config.hash_index);
    }
}
