//! Running catalog work on the blocking pool.
//!
//! Store transactions are synchronous. Every logical operation opens one
//! transaction inside `tokio::task::spawn_blocking`, hands a [`Catalog`] to the
//! operation, and commits if it returns `Ok`. An `Err` drops the transaction,
//! which rolls it back.

use std::sync::Arc;

use kura_store::{NativeStore, TxMode};

use crate::catalog::Catalog;
use crate::error::{FsError, FsResult};

/// Run `op` inside one store transaction on the blocking pool.
pub(crate) async fn run<T, F>(store: &Arc<dyn NativeStore>, mode: TxMode, op: F) -> FsResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Catalog<'_>) -> FsResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let mut catalog = Catalog::new(store.begin(mode)?);
        let out = op(&mut catalog)?;
        catalog.commit()?;
        Ok(out)
    })
    .await
    .map_err(|e| FsError::Task(format!("spawn_blocking: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DirectoryId;
    use kura_store::MemoryStore;

    fn store() -> Arc<dyn NativeStore> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_commit_on_ok() {
        let store = store();
        run(&store, TxMode::ReadWrite, |c| {
            c.insert_directory(DirectoryId::ROOT, "docs")
        })
        .await
        .unwrap();

        let dirs = run(&store, TxMode::ReadOnly, |c| {
            c.child_directories(DirectoryId::ROOT)
        })
        .await
        .unwrap();
        assert_eq!(dirs.len(), 1);
    }

    #[tokio::test]
    async fn test_rollback_on_err() {
        let store = store();
        let err = run(&store, TxMode::ReadWrite, |c| -> FsResult<()> {
            c.insert_directory(DirectoryId::ROOT, "docs")?;
            Err(FsError::fatal("abort"))
        })
        .await
        .unwrap_err();
        assert!(err.is_fatal());

        let dirs = run(&store, TxMode::ReadOnly, |c| {
            c.child_directories(DirectoryId::ROOT)
        })
        .await
        .unwrap();
        assert!(dirs.is_empty());
    }
}
