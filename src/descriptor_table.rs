// Copyright (c) 2025-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::table::TableId;
use quick_cache::{sync::Cache as QuickCache, UnitWeighter};
use std::{fs::File, sync::Arc};

type Item = Arc<File>;

/// Caches open file descriptors to table files, shared across every
/// [`crate::table::Table`] instance that references the same backing file.
pub struct DescriptorTable {
    inner: QuickCache<TableId, Item, UnitWeighter, rustc_hash::FxBuildHasher>,
}

impl DescriptorTable {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        #[allow(clippy::default_trait_access)]
        let quick_cache = QuickCache::with(
            1_000,
            capacity as u64,
            UnitWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );

        Self { inner: quick_cache }
    }

    #[doc(hidden)]
    pub fn clear(&self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn access(&self, id: TableId) -> Option<Arc<File>> {
        self.inner.get(&id)
    }

    pub fn insert(&self, id: TableId, item: Item) {
        self.inner.insert(id, item);
    }

    pub fn remove(&self, id: TableId) {
        self.inner.remove(&id);
    }
}
