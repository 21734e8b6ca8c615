//! SQLite-backed store.
//!
//! Every collection shares one `records` table keyed by `(collection, id)`.
//! Secondary index entries live in `record_index`, and per-collection key
//! sequences in `sequences` so that deleted keys are never handed out again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::ToSqlOutput;
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::collection::{Collection, IndexKey, RecordKey};
use crate::error::{StoreError, StoreResult};
use crate::txn::{IndexEntry, NativeStore, StoreTxn, StoredRecord, TxMode};

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
-- Record bodies for every collection
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id INTEGER NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);

-- Secondary index entries (index_key is untyped: integers and text never collide)
CREATE TABLE IF NOT EXISTS record_index (
    collection TEXT NOT NULL,
    index_name TEXT NOT NULL,
    index_key NOT NULL,
    id INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_record_index_lookup
    ON record_index(collection, index_name, index_key, id);
CREATE INDEX IF NOT EXISTS idx_record_index_owner
    ON record_index(collection, id);

-- Monotonic key allocation
CREATE TABLE IF NOT EXISTS sequences (
    collection TEXT PRIMARY KEY,
    next_id INTEGER NOT NULL
);
"#;

impl ToSql for IndexKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            IndexKey::Int(v) => ToSqlOutput::from(*v),
            IndexKey::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// A store persisted in a single SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> StoreResult<Self> {
        let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(SCHEMA)?;
        for collection in Collection::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO sequences (collection, next_id) VALUES (?1, 1)",
                params![collection.as_str()],
            )?;
        }
        if found < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            tracing::debug!(from = found, to = SCHEMA_VERSION, "initialized store schema");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Database file backing this store, `None` when in memory.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl NativeStore for SqliteStore {
    fn begin(&self, mode: TxMode) -> StoreResult<Box<dyn StoreTxn + '_>> {
        let conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front so two writers never deadlock
        // upgrading from a shared lock.
        let begin = match mode {
            TxMode::ReadOnly => "BEGIN DEFERRED",
            TxMode::ReadWrite => "BEGIN IMMEDIATE",
        };
        conn.execute_batch(begin)?;
        Ok(Box::new(SqliteTxn {
            conn,
            mode,
            finished: false,
        }))
    }
}

struct SqliteTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    mode: TxMode,
    finished: bool,
}

impl SqliteTxn<'_> {
    fn ensure_writable(&self, collection: Collection) -> StoreResult<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::ReadOnly(collection, self.mode))
        }
    }

    fn clear_index(&self, collection: Collection, key: RecordKey) -> StoreResult<()> {
        self.conn
            .prepare_cached("DELETE FROM record_index WHERE collection = ?1 AND id = ?2")?
            .execute(params![collection.as_str(), key])?;
        Ok(())
    }
}

impl StoreTxn for SqliteTxn<'_> {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn get(&mut self, collection: Collection, key: RecordKey) -> StoreResult<Option<Vec<u8>>> {
        let body = self
            .conn
            .prepare_cached("SELECT body FROM records WHERE collection = ?1 AND id = ?2")?
            .query_row(params![collection.as_str(), key], |row| row.get(0))
            .optional()?;
        Ok(body)
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

        let mut stmt = self.conn.prepare_cached(
            "SELECT r.id, r.body
             FROM record_index i
             JOIN records r ON r.collection = i.collection AND r.id = i.id
             WHERE i.collection = ?1 AND i.index_name = ?2 AND i.index_key = ?3
             ORDER BY r.id",
        )?;
        let rows = stmt.query_map(params![collection.as_str(), index, key], |row| {
            Ok(StoredRecord {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn allocate_key(&mut self, collection: Collection) -> StoreResult<RecordKey> {
        self.ensure_writable(collection)?;
        let next: i64 = self
            .conn
            .prepare_cached("SELECT next_id FROM sequences WHERE collection = ?1")?
            .query_row(params![collection.as_str()], |row| row.get(0))?;
        self.conn
            .prepare_cached("UPDATE sequences SET next_id = ?2 WHERE collection = ?1")?
            .execute(params![collection.as_str(), next + 1])?;
        Ok(next)
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

        self.conn
            .prepare_cached(
                "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body",
            )?
            .execute(params![collection.as_str(), key, value])?;

        self.clear_index(collection, key)?;
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO record_index (collection, index_name, index_key, id)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (name, index_key) in index {
            insert.execute(params![collection.as_str(), name, index_key, key])?;
        }
        Ok(())
    }

    fn delete(&mut self, collection: Collection, key: RecordKey) -> StoreResult<bool> {
        self.ensure_writable(collection)?;
        self.clear_index(collection, key)?;
        let removed = self
            .conn
            .prepare_cached("DELETE FROM records WHERE collection = ?1 AND id = ?2")?
            .execute(params![collection.as_str(), key])?;
        Ok(removed > 0)
    }

    fn count(&mut self, collection: Collection) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM records WHERE collection = ?1")?
            .query_row(params![collection.as_str()], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn value_bytes(&mut self, collection: Collection) -> StoreResult<u64> {
        let bytes: i64 = self
            .conn
            .prepare_cached(
                "SELECT COALESCE(SUM(LENGTH(body)), 0) FROM records WHERE collection = ?1",
            )?
            .query_row(params![collection.as_str()], |row| row.get(0))?;
        Ok(bytes as u64)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTxn<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "sqlite rollback failed");
        }
    }
}
