//! Persistent archive store backed by `redb`.

use std::path::Path;

use bytes::Bytes;
use porter_core::{ArchiveStore, StoreError, StoreStats};
use porter_proto::ArchiveKey;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

/// Cached archives, keyed by `(table_id, archive_id)`.
const ARCHIVES: TableDefinition<(u8, u32), &[u8]> = TableDefinition::new("archives");

/// Archive cache on disk.
///
/// One `redb` table, last-write-wins per key, no eviction: the store grows
/// with the set of distinct archives fetched. [`clear`](ArchiveStore::clear)
/// is the only way space is reclaimed.
#[derive(Debug)]
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(|e| StoreError::Maintenance(e.to_string()))?;
        Ok(Self { db })
    }
}

impl ArchiveStore for RedbStore {
    fn lookup(&self, key: ArchiveKey) -> Result<Option<Bytes>, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Lookup(e.to_string()))?;
        let table = match txn.open_table(ARCHIVES) {
            Ok(table) => table,
            // First lookup before any write: the table does not exist yet.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StoreError::Lookup(e.to_string())),
        };
        let value = table
            .get((key.table_id, key.archive_id))
            .map_err(|e| StoreError::Lookup(e.to_string()))?;
        Ok(value.map(|guard| Bytes::copy_from_slice(guard.value())))
    }

    fn store(&mut self, key: ArchiveKey, data: &[u8]) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Store(e.to_string()))?;
        {
            let mut table =
                txn.open_table(ARCHIVES).map_err(|e| StoreError::Store(e.to_string()))?;
            table
                .insert((key.table_id, key.archive_id), data)
                .map_err(|e| StoreError::Store(e.to_string()))?;
        }
        txn.commit().map_err(|e| StoreError::Store(e.to_string()))?;
        debug!(%key, size = data.len(), "archive persisted");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Maintenance(e.to_string()))?;
        txn.delete_table(ARCHIVES).map_err(|e| StoreError::Maintenance(e.to_string()))?;
        txn.commit().map_err(|e| StoreError::Maintenance(e.to_string()))?;
        debug!("archive store cleared");
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Maintenance(e.to_string()))?;
        let table = match txn.open_table(ARCHIVES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(StoreStats::default()),
            Err(e) => return Err(StoreError::Maintenance(e.to_string())),
        };
        let mut stats = StoreStats::default();
        for entry in table.iter().map_err(|e| StoreError::Maintenance(e.to_string()))? {
            let (key, _) = entry.map_err(|e| StoreError::Maintenance(e.to_string()))?;
            let (table_id, _) = key.value();
            stats.archives += 1;
            *stats.per_table.entry(table_id).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
