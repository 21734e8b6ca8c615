//! Transaction contract shared by every store implementation.

use std::fmt;

use crate::collection::{Collection, IndexKey, RecordKey};
use crate::error::StoreResult;

/// Access mode requested when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

impl TxMode {
    pub fn is_writable(&self) -> bool {
        matches!(self, TxMode::ReadWrite)
    }
}

impl fmt::Display for TxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxMode::ReadOnly => f.write_str("read-only"),
            TxMode::ReadWrite => f.write_str("read-write"),
        }
    }
}

/// One secondary index entry attached to a record on write.
pub type IndexEntry = (&'static str, IndexKey);

/// A record returned from an index scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub value: Vec<u8>,
}

/// An open, atomic unit of work against a store.
///
/// Writes become visible to other transactions only after [`StoreTxn::commit`].
/// Dropping a transaction without committing rolls every write back.
pub trait StoreTxn {
    fn mode(&self) -> TxMode;

    /// Fetch a record by primary key.
    fn get(&mut self, collection: Collection, key: RecordKey) -> StoreResult<Option<Vec<u8>>>;

    /// All records whose `index` entry equals `key`, ordered by primary key.
    fn get_by_index(
        &mut self,
        collection: Collection,
        index: &str,
        key: &IndexKey,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Reserve the next primary key of a collection.
    ///
    /// Keys are monotonically increasing and never reused, even if the record
    /// is later deleted.
    fn allocate_key(&mut self, collection: Collection) -> StoreResult<RecordKey>;

    /// Insert or replace a record together with its full set of index entries.
    ///
    /// Index entries from a previous version of the record are dropped.
    fn put(
        &mut self,
        collection: Collection,
        key: RecordKey,
        value: &[u8],
        index: &[IndexEntry],
    ) -> StoreResult<()>;

    /// Delete a record and its index entries. Returns whether it existed.
    fn delete(&mut self, collection: Collection, key: RecordKey) -> StoreResult<bool>;

    /// Number of records in a collection.
    fn count(&mut self, collection: Collection) -> StoreResult<u64>;

    /// Total size in bytes of every value in a collection.
    fn value_bytes(&mut self, collection: Collection) -> StoreResult<u64>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A handle to an opened store.
///
/// Implementations serialize transactions: `begin` blocks while another
/// transaction is open on the same handle.
pub trait NativeStore: Send + Sync + fmt::Debug {
    fn begin(&self, mode: TxMode) -> StoreResult<Box<dyn StoreTxn + '_>>;
}
