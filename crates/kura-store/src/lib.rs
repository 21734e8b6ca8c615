//! # kura-store
//!
//! The record store that kura's filesystem is layered on.
//!
//! A store holds three flat collections ([`Collection::Directories`],
//! [`Collection::Files`], [`Collection::Blocks`]) of opaque byte values keyed
//! by `i64`. Directories and files carry secondary indexes that can be scanned
//! by exact key. Every read and write happens inside a [`StoreTxn`]: either all
//! of a transaction's writes commit or none do.
//!
//! Two implementations ship with the crate:
//!
//! - [`SqliteStore`] - durable, backed by a single SQLite database file
//! - [`MemoryStore`] - ephemeral, for tests and scratch mounts
//!
//! The filesystem engine only sees the [`NativeStore`] trait, so either can be
//! injected.

mod collection;
mod error;
mod memory;
mod sqlite;
mod txn;

pub use collection::{Collection, IndexKey, RecordKey};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::{SCHEMA_VERSION, SqliteStore};
pub use txn::{IndexEntry, NativeStore, StoreTxn, StoredRecord, TxMode};
