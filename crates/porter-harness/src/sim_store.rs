//! In-memory archive store with failure injection.

use std::{cell::Cell, collections::HashMap};

use bytes::Bytes;
use porter_core::{ArchiveStore, StoreError, StoreStats};
use porter_proto::ArchiveKey;

/// Hash-map archive store.
///
/// Failure switches make every backend error path reachable from tests:
/// with `fail_lookups` set each read errors (which drivers must treat as a
/// miss), with `fail_stores` set each write errors (which drivers must
/// swallow).
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: HashMap<ArchiveKey, Bytes>,
    /// Error every lookup until cleared.
    pub fail_lookups: bool,
    /// Error every store until cleared.
    pub fail_stores: bool,
    lookups: Cell<usize>,
    stores: usize,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an archive without going through the wire.
    pub fn insert(&mut self, key: ArchiveKey, data: &[u8]) {
        self.map.insert(key, Bytes::copy_from_slice(data));
    }

    /// Whether `key` is currently cached.
    pub fn contains(&self, key: ArchiveKey) -> bool {
        self.map.contains_key(&key)
    }

    /// Number of lookups attempted (including failed ones).
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }

    /// Number of writes attempted (including failed ones).
    pub fn stores(&self) -> usize {
        self.stores
    }
}

impl ArchiveStore for MemoryStore {
    fn lookup(&self, key: ArchiveKey) -> Result<Option<Bytes>, StoreError> {
        self.lookups.set(self.lookups.get() + 1);
        if self.fail_lookups {
            return Err(StoreError::Lookup("injected lookup failure".into()));
        }
        Ok(self.map.get(&key).cloned())
    }

    fn store(&mut self, key: ArchiveKey, data: &[u8]) -> Result<(), StoreError> {
        self.stores += 1;
        if self.fail_stores {
            return Err(StoreError::Store("injected store failure".into()));
        }
        self.map.insert(key, Bytes::copy_from_slice(data));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.map.clear();
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for key in self.map.keys() {
            stats.archives += 1;
            *stats.per_table.entry(key.table_id).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
