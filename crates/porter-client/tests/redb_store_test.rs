//! Persistent store behavior: roundtrips, overwrite semantics, maintenance.

use porter_client::RedbStore;
use porter_core::{ArchiveStore, StoreStats};
use porter_proto::ArchiveKey;

fn open_store(dir: &tempfile::TempDir) -> RedbStore {
    RedbStore::open(dir.path().join("archives.redb")).expect("store opens")
}

#[test]
fn lookup_before_any_write_is_a_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = open_store(&dir);
    assert_eq!(store.lookup(ArchiveKey::new(0, 1)).expect("lookup works"), None);
}

#[test]
fn store_then_lookup_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir);
    let key = ArchiveKey::new(255, 7);

    store.store(key, b"reference table").expect("store works");
    let cached = store.lookup(key).expect("lookup works").expect("hit");
    assert_eq!(cached.as_ref(), b"reference table");

    // Distinct key, same archive id in another table.
    assert_eq!(store.lookup(ArchiveKey::new(254, 7)).expect("lookup works"), None);
}

#[test]
fn last_write_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir);
    let key = ArchiveKey::new(1, 1);

    store.store(key, b"first").expect("store works");
    store.store(key, b"second").expect("store works");
    let cached = store.lookup(key).expect("lookup works").expect("hit");
    assert_eq!(cached.as_ref(), b"second");
}

#[test]
fn archives_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("archives.redb");
    let key = ArchiveKey::new(3, 12);

    {
        let mut store = RedbStore::open(&path).expect("store opens");
        store.store(key, b"persistent").expect("store works");
    }

    let store = RedbStore::open(&path).expect("store reopens");
    let cached = store.lookup(key).expect("lookup works").expect("hit");
    assert_eq!(cached.as_ref(), b"persistent");
}

#[test]
fn stats_count_per_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir);

    assert_eq!(store.stats().expect("stats work"), StoreStats::default());

    store.store(ArchiveKey::new(0, 1), b"a").expect("store works");
    store.store(ArchiveKey::new(0, 2), b"b").expect("store works");
    store.store(ArchiveKey::new(255, 1), b"c").expect("store works");

    let stats = store.stats().expect("stats work");
    assert_eq!(stats.archives, 3);
    assert_eq!(stats.per_table.get(&0), Some(&2));
    assert_eq!(stats.per_table.get(&255), Some(&1));
}

#[test]
fn clear_drops_everything() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = open_store(&dir);
    let key = ArchiveKey::new(9, 9);

    store.store(key, b"gone soon").expect("store works");
    store.clear().expect("clear works");

    assert_eq!(store.lookup(key).expect("lookup works"), None);
    assert_eq!(store.stats().expect("stats work").archives, 0);
}
