//! Store error types.

use thiserror::Error;

use crate::collection::Collection;
use crate::txn::TxMode;

/// Errors raised by a native store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure (I/O, locking, constraint).
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Index scan or write against an index the collection does not declare.
    #[error("collection {collection} has no index named {index:?}")]
    UnknownIndex {
        collection: Collection,
        index: String,
    },

    /// Write attempted inside a read-only transaction.
    #[error("write to {0} inside a {1} transaction")]
    ReadOnly(Collection, TxMode),

    /// The database was written by a newer schema than this build understands.
    #[error("unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchema { found: i64, supported: i64 },
}

impl StoreError {
    pub fn unknown_index(collection: Collection, index: impl Into<String>) -> Self {
        Self::UnknownIndex {
            collection,
            index: index.into(),
        }
    }
}

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;
