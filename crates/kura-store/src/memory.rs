//! In-memory store.
//!
//! Used for tests and scratch mounts. All data is lost when dropped.
//! Transactions hold the state lock for their whole lifetime and keep an undo
//! log, so an uncommitted transaction restores every record it touched.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::{Mutex, MutexGuard};

use crate::collection::{Collection, IndexKey, RecordKey};
use crate::error::{StoreError, StoreResult};
use crate::txn::{IndexEntry, NativeStore, StoreTxn, StoredRecord, TxMode};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    index: Vec<IndexEntry>,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<Collection, BTreeMap<RecordKey, Entry>>,
    index: HashMap<(Collection, &'static str), BTreeMap<IndexKey, BTreeSet<RecordKey>>>,
    next_key: HashMap<Collection, RecordKey>,
}

impl State {
    fn take(&mut self, collection: Collection, key: RecordKey) -> Option<Entry> {
        let entry = self.records.get_mut(&collection)?.remove(&key)?;
        for (name, index_key) in &entry.index {
            if let Some(by_key) = self.index.get_mut(&(collection, *name)) {
                if let Some(keys) = by_key.get_mut(index_key) {
                    keys.remove(&key);
                    if keys.is_empty() {
                        by_key.remove(index_key);
                    }
                }
            }
        }
        Some(entry)
    }

    fn insert(&mut self, collection: Collection, key: RecordKey, entry: Entry) {
        for (name, index_key) in &entry.index {
            self.index
                .entry((collection, *name))
                .or_default()
                .entry(index_key.clone())
                .or_default()
                .insert(key);
        }
        self.records.entry(collection).or_default().insert(key, entry);
    }
}

/// Undo record for one mutation.
#[derive(Debug)]
enum Undo {
    Record {
        collection: Collection,
        key: RecordKey,
        previous: Option<Entry>,
    },
    Sequence {
        collection: Collection,
        previous: RecordKey,
    },
}

/// In-memory store.
///
/// Thread-safe via an internal `Mutex`; transactions are fully serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NativeStore for MemoryStore {
    fn begin(&self, mode: TxMode) -> StoreResult<Box<dyn StoreTxn + '_>> {
        Ok(Box::new(MemoryTxn {
            state: self.state.lock(),
            mode,
            undo: Vec::new(),
            committed: false,
        }))
    }
}

struct MemoryTxn<'a> {
    state: MutexGuard<'a, State>,
    mode: TxMode,
    undo: Vec<Undo>,
    committed: bool,
}

impl MemoryTxn<'_> {
    fn ensure_writable(&self, collection: Collection) -> StoreResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::ReadOnly(collection, self.mode))
        }
    }
}

impl StoreTxn for MemoryTxn<'_> {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn get(&mut self, collection: Collection, key: RecordKey) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .state
            .records
            .get(&collection)
            .and_then(|records| records.get(&key))
            .map(|entry| entry.value.clone()))
    }

    fn get_by_index(
        &mut self,
        collection: Collection,
        index: &str,
        key: &IndexKey,
    ) -> StoreResult<Vec<StoredRecord>> {
        let index = collection
            .index(index)
            .ok_or_else(|| StoreError::unknown_index(collection, index))?;

        let Some(keys) = self
            .state
            .index
            .get(&(collection, index))
            .and_then(|by_key| by_key.get(key))
        else {
            return Ok(Vec::new());
        };

        let records = self.state.records.get(&collection);
        Ok(keys
            .iter()
            .filter_map(|k| {
                records
                    .and_then(|r| r.get(k))
                    .map(|entry| StoredRecord {
                        key: *k,
                        value: entry.value.clone(),
                    })
            })
            .collect())
    }

    fn allocate_key(&mut self, collection: Collection) -> StoreResult<RecordKey> {
        self.ensure_writable(collection)?;
        let next = self.state.next_key.entry(collection).or_insert(1);
        let key = *next;
        *next += 1;
        self.undo.push(Undo::Sequence {
            collection,
            previous: key,
        });
        Ok(key)
    }

    fn put(
        &mut self,
        collection: Collection,
        key: RecordKey,
        value: &[u8],
        index: &[IndexEntry],
    ) -> StoreResult<()> {
        self.ensure_writable(collection)?;
        if let Some((name, _)) = index.iter().find(|(name, _)| collection.index(name).is_none()) {
            return Err(StoreError::unknown_index(collection, *name));
        }

        let previous = self.state.take(collection, key);
        self.state.insert(
            collection,
            key,
            Entry {
                value: value.to_vec(),
                index: index.to_vec(),
            },
        );
        self.undo.push(Undo::Record {
            collection,
            key,
            previous,
        });
        Ok(())
    }

    fn delete(&mut self, collection: Collection, key: RecordKey) -> StoreResult<bool> {
        self.ensure_writable(collection)?;
        let previous = self.state.take(collection, key);
        let existed = previous.is_some();
        if existed {
            self.undo.push(Undo::Record {
                collection,
                key,
                previous,
            });
        }
        Ok(existed)
    }

    fn count(&mut self, collection: Collection) -> StoreResult<u64> {
        Ok(self
            .state
            .records
            .get(&collection)
            .map_or(0, |records| records.len() as u64))
    }

    fn value_bytes(&mut self, collection: Collection) -> StoreResult<u64> {
        Ok(self.state.records.get(&collection).map_or(0, |records| {
            records.values().map(|entry| entry.value.len() as u64).sum()
        }))
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.undo.clear();
        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::Record {
                    collection,
                    key,
                    previous,
                } => {
                    self.state.take(collection, key);
                    if let Some(entry) = previous {
                        self.state.insert(collection, key, entry);
                    }
                }
                Undo::Sequence {
                    collection,
                    previous,
                } => {
                    self.state.next_key.insert(collection, previous);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_entry(dir: i64, name: &str) -> Vec<IndexEntry> {
        vec![("directoryId", IndexKey::Int(dir)), ("name", IndexKey::from(name))]
    }

    #[test]
    fn test_index_scan_is_ordered_by_key() {
        let store = MemoryStore::new();
        let mut txn = store.begin(TxMode::ReadWrite).unwrap();
        for name in ["b", "a", "c"] {
            let key = txn.allocate_key(Collection::Files).unwrap();
            txn.put(Collection::Files, key, name.as_bytes(), &file_entry(7, name))
                .unwrap();
        }
        txn.commit().unwrap();

        let mut txn = store.begin(TxMode::ReadOnly).unwrap();
        let values: Vec<_> = txn
            .get_by_index(Collection::Files, "directoryId", &IndexKey::Int(7))
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![b"b".to_vec(), b"a".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_rollback_restores_overwritten_and_deleted_records() {
        let store = MemoryStore::new();
        let mut txn = store.begin(TxMode::ReadWrite).unwrap();
        let kept = txn.allocate_key(Collection::Files).unwrap();
        txn.put(Collection::Files, kept, b"v1", &file_entry(1, "kept"))
            .unwrap();
        let doomed = txn.allocate_key(Collection::Files).unwrap();
        txn.put(Collection::Files, doomed, b"x", &file_entry(1, "doomed"))
            .unwrap();
        txn.commit().unwrap();

        {
            let mut txn = store.begin(TxMode::ReadWrite).unwrap();
            txn.put(Collection::Files, kept, b"v2", &file_entry(2, "renamed"))
                .unwrap();
            txn.delete(Collection::Files, doomed).unwrap();
            txn.allocate_key(Collection::Files).unwrap();
        }

        let mut txn = store.begin(TxMode::ReadWrite).unwrap();
        assert_eq!(txn.get(Collection::Files, kept).unwrap(), Some(b"v1".to_vec()));
        assert_eq!(txn.get(Collection::Files, doomed).unwrap(), Some(b"x".to_vec()));
        assert_eq!(
            txn.get_by_index(Collection::Files, "name", &IndexKey::from("kept"))
                .unwrap()
                .len(),
            1
        );
        assert!(txn
            .get_by_index(Collection::Files, "name", &IndexKey::from("renamed"))
            .unwrap()
            .is_empty());
        assert_eq!(txn.allocate_key(Collection::Files).unwrap(), doomed + 1);
    }

    #[test]
    fn test_value_bytes_and_count() {
        let store = MemoryStore::new();
        let mut txn = store.begin(TxMode::ReadWrite).unwrap();
        for block in [&b"abc"[..], &b"de"[..]] {
            let key = txn.allocate_key(Collection::Blocks).unwrap();
            txn.put(Collection::Blocks, key, block, &[]).unwrap();
        }
        assert_eq!(txn.count(Collection::Blocks).unwrap(), 2);
        assert_eq!(txn.value_bytes(Collection::Blocks).unwrap(), 5);
        assert_eq!(txn.count(Collection::Directories).unwrap(), 0);
    }

    #[test]
    fn test_read_only_rejects_delete() {
        let store = MemoryStore::new();
        let mut txn = store.begin(TxMode::ReadOnly).unwrap();
        assert!(matches!(
            txn.delete(Collection::Blocks, 1),
            Err(StoreError::ReadOnly(Collection::Blocks, _))
        ));
    }
}
