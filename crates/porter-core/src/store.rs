//! Archive store contract.
//!
//! The persistent cache is an external collaborator: the core only ever asks
//! a driver to look a key up or persist a payload (via [`LoaderAction`]s) and
//! consumes the completions as events. This trait is the contract those
//! drivers implement — `redb` in production, a hash map in the harness.
//!
//! Semantics are last-write-wins per key. No eviction or expiry is performed
//! at this layer; the store grows with the set of distinct archives fetched.
//!
//! [`LoaderAction`]: crate::LoaderAction

use std::collections::BTreeMap;

use bytes::Bytes;
use porter_proto::ArchiveKey;
use thiserror::Error;

/// Errors surfaced by an archive store backend.
///
/// Store errors never fail a request: a lookup error is treated as a miss
/// and a write error after a successful fetch is logged and swallowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading from the backend failed.
    #[error("archive lookup failed: {0}")]
    Lookup(String),
    /// Writing to the backend failed.
    #[error("archive store failed: {0}")]
    Store(String),
    /// A maintenance operation (clear, stats) failed.
    #[error("store maintenance failed: {0}")]
    Maintenance(String),
}

/// Counts of cached archives, overall and per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total archives in the store.
    pub archives: u64,
    /// Archive count per table id.
    pub per_table: BTreeMap<u8, u64>,
}

/// Persistent key/value store for fetched archives.
pub trait ArchiveStore {
    /// Fetch the payload cached for `key`, if any.
    fn lookup(&self, key: ArchiveKey) -> Result<Option<Bytes>, StoreError>;

    /// Persist a payload under `key`, replacing any previous value.
    fn store(&mut self, key: ArchiveKey, data: &[u8]) -> Result<(), StoreError>;

    /// Drop every cached archive.
    fn clear(&mut self) -> Result<(), StoreError>;

    /// Count cached archives.
    fn stats(&self) -> Result<StoreStats, StoreError>;
}
