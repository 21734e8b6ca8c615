//! Typed access to the Directories, Files and Blocks collections.
//!
//! A [`Catalog`] wraps one open store transaction. Everything read or written
//! through it commits or rolls back together.

use kura_store::{Collection, IndexEntry, IndexKey, StoreTxn, StoredRecord, TxMode};

use crate::error::{FsError, FsResult};
use crate::records::{
    BlockId, BlockRecord, DirectoryId, DirectoryRecord, FileId, FileRecord, Usage, now_millis,
};

pub(crate) const DIR_PARENT_INDEX: &str = "parentId";
pub(crate) const DIR_NAME_INDEX: &str = "name";
pub(crate) const FILE_DIRECTORY_INDEX: &str = "directoryId";
pub(crate) const FILE_NAME_INDEX: &str = "name";

fn decode<T: serde::de::DeserializeOwned>(record: &StoredRecord) -> FsResult<T> {
    Ok(postcard::from_bytes(&record.value)?)
}

/// Catalog view over one store transaction.
pub struct Catalog<'t> {
    txn: Box<dyn StoreTxn + 't>,
}

impl<'t> Catalog<'t> {
    pub fn new(txn: Box<dyn StoreTxn + 't>) -> Self {
        Self { txn }
    }

    pub fn mode(&self) -> TxMode {
        self.txn.mode()
    }

    /// Commit every write made through this catalog.
    pub fn commit(self) -> FsResult<()> {
        Ok(self.txn.commit()?)
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// Fetch a directory by id. The root sentinel is always present.
    pub fn directory(&mut self, id: DirectoryId) -> FsResult<Option<DirectoryRecord>> {
        if id.is_root() {
            return Ok(Some(DirectoryRecord::root()));
        }
        match self.txn.get(Collection::Directories, id.key())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Direct child directories of `parent`, in creation order.
    pub fn child_directories(&mut self, parent: DirectoryId) -> FsResult<Vec<DirectoryRecord>> {
        self.txn
            .get_by_index(
                Collection::Directories,
                DIR_PARENT_INDEX,
                &IndexKey::Int(parent.key()),
            )?
            .iter()
            .map(decode)
            .collect()
    }

    /// Child directories of `parent` named `name`.
    ///
    /// Scans the parent index and filters in memory. More than one result
    /// means the catalog is corrupted; the caller decides how to report it.
    pub fn child_directories_named(
        &mut self,
        parent: DirectoryId,
        name: &str,
    ) -> FsResult<Vec<DirectoryRecord>> {
        Ok(self
            .child_directories(parent)?
            .into_iter()
            .filter(|dir| dir.name == name)
            .collect())
    }

    /// Insert a new directory under `parent`.
    pub fn insert_directory(
        &mut self,
        parent: DirectoryId,
        name: &str,
    ) -> FsResult<DirectoryRecord> {
        let key = self.txn.allocate_key(Collection::Directories)?;
        let now = now_millis();
        let record = DirectoryRecord {
            id: DirectoryId::from_key(key),
            name: name.to_string(),
            parent_id: parent,
            created_at: now,
            updated_at: now,
        };
        self.put_directory(&record)?;
        Ok(record)
    }

    fn put_directory(&mut self, record: &DirectoryRecord) -> FsResult<()> {
        if record.is_root() {
            return Err(FsError::fatal("attempted to persist the root directory"));
        }
        let index: [IndexEntry; 2] = [
            (DIR_PARENT_INDEX, IndexKey::Int(record.parent_id.key())),
            (DIR_NAME_INDEX, IndexKey::from(record.name.as_str())),
        ];
        let bytes = postcard::to_allocvec(record)?;
        self.txn
            .put(Collection::Directories, record.id.key(), &bytes, &index)?;
        Ok(())
    }

    pub fn delete_directory(&mut self, id: DirectoryId) -> FsResult<bool> {
        if id.is_root() {
            return Err(FsError::fatal("attempted to delete the root directory"));
        }
        Ok(self.txn.delete(Collection::Directories, id.key())?)
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub fn file(&mut self, id: FileId) -> FsResult<Option<FileRecord>> {
        match self.txn.get(Collection::Files, id.key())? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a file that must exist; `display` names it in the error.
    pub fn require_file(&mut self, id: FileId, display: &str) -> FsResult<FileRecord> {
        self.file(id)?.ok_or_else(|| FsError::not_found(display))
    }

    /// Files directly inside `directory`, in creation order.
    pub fn files_in(&mut self, directory: DirectoryId) -> FsResult<Vec<FileRecord>> {
        self.txn
            .get_by_index(
                Collection::Files,
                FILE_DIRECTORY_INDEX,
                &IndexKey::Int(directory.key()),
            )?
            .iter()
            .map(decode)
            .collect()
    }

    /// Every file named `name`, in any directory.
    pub fn files_named(&mut self, name: &str) -> FsResult<Vec<FileRecord>> {
        self.txn
            .get_by_index(Collection::Files, FILE_NAME_INDEX, &IndexKey::from(name))?
            .iter()
            .map(decode)
            .collect()
    }

    /// Insert an empty file under `directory`.
    pub fn insert_file(
        &mut self,
        directory: DirectoryId,
        name: &str,
        mime_type: &str,
    ) -> FsResult<FileRecord> {
        let key = self.txn.allocate_key(Collection::Files)?;
        let now = now_millis();
        let record = FileRecord {
            id: FileId::from_key(key),
            name: name.to_string(),
            directory_id: directory,
            block_ids: Vec::new(),
            size: 0,
            created_at: now,
            updated_at: now,
            mime_type: mime_type.to_string(),
        };
        self.put_file(&record)?;
        Ok(record)
    }

    /// Insert or replace a file record.
    pub fn put_file(&mut self, record: &FileRecord) -> FsResult<()> {
        let index: [IndexEntry; 2] = [
            (FILE_DIRECTORY_INDEX, IndexKey::Int(record.directory_id.key())),
            (FILE_NAME_INDEX, IndexKey::from(record.name.as_str())),
        ];
        let bytes = postcard::to_allocvec(record)?;
        self.txn.put(Collection::Files, record.id.key(), &bytes, &index)?;
        Ok(())
    }

    pub fn delete_file(&mut self, id: FileId) -> FsResult<bool> {
        Ok(self.txn.delete(Collection::Files, id.key())?)
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    pub fn block(&mut self, id: BlockId) -> FsResult<Option<BlockRecord>> {
        Ok(self
            .txn
            .get(Collection::Blocks, id.key())?
            .map(|bytes| BlockRecord { id, bytes }))
    }

    /// Fetch a block referenced by a file. A missing block is corruption.
    pub fn require_block(&mut self, id: BlockId) -> FsResult<Vec<u8>> {
        self.block(id)?
            .map(|block| block.bytes)
            .ok_or_else(|| FsError::fatal(format!("block {id} is referenced but missing")))
    }

    pub fn insert_block(&mut self, bytes: &[u8]) -> FsResult<BlockId> {
        let key = self.txn.allocate_key(Collection::Blocks)?;
        self.txn.put(Collection::Blocks, key, bytes, &[])?;
        Ok(BlockId::from_key(key))
    }

    /// Delete blocks, returning how many existed.
    pub fn delete_blocks(&mut self, ids: &[BlockId]) -> FsResult<usize> {
        let mut removed = 0;
        for id in ids {
            if self.txn.delete(Collection::Blocks, id.key())? {
                removed += 1;
            } else {
                tracing::warn!(block = %id, "block already gone while deleting");
            }
        }
        Ok(removed)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub fn usage(&mut self) -> FsResult<Usage> {
        Ok(Usage {
            directories: self.txn.count(Collection::Directories)?,
            files: self.txn.count(Collection::Files)?,
            blocks: self.txn.count(Collection::Blocks)?,
            stored_bytes: self.txn.value_bytes(Collection::Blocks)?,
        })
    }
}
