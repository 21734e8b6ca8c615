//! The filesystem facade.

use std::sync::Arc;

use futures::TryStreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use kura_store::{NativeStore, SqliteStore, TxMode};

use crate::config::FsConfig;
use crate::content::{FileRef, ReadStream, WriteStream, blocks};
use crate::error::{FsError, FsResult};
use crate::path::FsPath;
use crate::records::{DirListing, DirectoryRecord, FileDesc, FileId, FileRecord, Stat, Usage};
use crate::resolve::{ResolutionNode, resolve};
use crate::tree::{self, Removed};
use crate::txn;

/// A mounted filesystem.
///
/// Cloning is cheap; clones share the store handle. Each operation runs in its
/// own store transaction, except the streams, which commit per block (reader)
/// or per chunk (writer).
#[derive(Clone)]
pub struct KuraFs {
    store: Arc<dyn NativeStore>,
    config: Arc<FsConfig>,
}

impl std::fmt::Debug for KuraFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KuraFs")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

impl KuraFs {
    /// Open the store named by `config.database`, or a fresh in-memory
    /// database when it is unset.
    pub fn mount(config: FsConfig) -> FsResult<Self> {
        let store: Arc<dyn NativeStore> = match &config.database {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(SqliteStore::in_memory()?),
        };
        tracing::info!(database = ?config.database, "mounted filesystem");
        Self::with_store(store, config)
    }

    /// Mount over an already-open store.
    pub fn with_store(store: Arc<dyn NativeStore>, config: FsConfig) -> FsResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn NativeStore> {
        &self.store
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Whether `path` names an existing file or directory.
    #[tracing::instrument(skip(self), name = "fs.exists")]
    pub async fn exists(&self, path: &str) -> FsResult<bool> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadOnly, move |c| {
            resolve(c, &path)?.matches(&path)
        })
        .await
    }

    #[tracing::instrument(skip(self), name = "fs.stat")]
    pub async fn stat(&self, path: &str) -> FsResult<Stat> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadOnly, move |c| {
            Ok(match resolve(c, &path)?.into_match(&path)? {
                ResolutionNode::Directory(dir) => Stat::from(&dir),
                ResolutionNode::File(file) => Stat::from(&file),
            })
        })
        .await
    }

    /// Direct children of a directory, each list sorted by name.
    #[tracing::instrument(skip(self), name = "fs.readdir")]
    pub async fn readdir(&self, path: &str) -> FsResult<DirListing> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadOnly, move |c| {
            let dir = match resolve(c, &path)?.into_match(&path)? {
                ResolutionNode::Directory(dir) => dir,
                ResolutionNode::File(_) => {
                    return Err(FsError::not_found(format!("{path} is not a directory")));
                }
            };
            let mut dirs = c.child_directories(dir.id)?;
            let mut files = c.files_in(dir.id)?;
            dirs.sort_by(|a, b| a.name.cmp(&b.name));
            files.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(DirListing { dirs, files })
        })
        .await
    }

    /// The file record at `path`.
    #[tracing::instrument(skip(self), name = "fs.get_file")]
    pub async fn get_file(&self, path: &str) -> FsResult<FileRecord> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadOnly, move |c| blocks::open_file(c, &path)).await
    }

    /// Record counts and stored content bytes.
    #[tracing::instrument(skip(self), name = "fs.usage")]
    pub async fn usage(&self) -> FsResult<Usage> {
        txn::run(&self.store, TxMode::ReadOnly, |c| c.usage()).await
    }

    // ========================================================================
    // Tree mutation
    // ========================================================================

    /// Create one directory. The parent must already exist.
    #[tracing::instrument(skip(self), name = "fs.mkdir")]
    pub async fn mkdir(&self, path: &str) -> FsResult<DirectoryRecord> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadWrite, move |c| tree::mkdir(c, &path)).await
    }

    /// Create an empty file. The parent must already exist.
    #[tracing::instrument(skip(self, desc), name = "fs.create_file")]
    pub async fn create_file(&self, path: &str, desc: FileDesc) -> FsResult<FileRecord> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadWrite, move |c| {
            tree::create_file(c, &path, &desc)
        })
        .await
    }

    /// Remove a file, or a directory. A non-empty directory needs `recursive`.
    #[tracing::instrument(skip(self), name = "fs.remove")]
    pub async fn remove(&self, path: &str, recursive: bool) -> FsResult<Removed> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadWrite, move |c| {
            tree::remove(c, &path, recursive)
        })
        .await
    }

    // ========================================================================
    // Content
    // ========================================================================

    #[tracing::instrument(skip(self), name = "fs.read_file")]
    pub async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = FsPath::parse(path)?;
        txn::run(&self.store, TxMode::ReadOnly, move |c| {
            let file = blocks::open_file(c, &path)?;
            blocks::read_all(c, &file)
        })
        .await
    }

    /// Create or replace a file with `data`.
    #[tracing::instrument(skip(self, data, desc), fields(len = data.len()), name = "fs.write_file")]
    pub async fn write_file(&self, path: &str, data: &[u8], desc: FileDesc) -> FsResult<FileRecord> {
        let path = FsPath::parse(path)?;
        let data = data.to_vec();
        let config = Arc::clone(&self.config);
        txn::run(&self.store, TxMode::ReadWrite, move |c| {
            blocks::write_file(c, &config.chunking, &path, &data, &desc)
        })
        .await
    }

    /// Append `data` to an existing file, by path or by record.
    ///
    /// The stored record is re-read inside the transaction, so an outdated
    /// record in hand is safe to pass. Returns the updated record rather than
    /// a bare `true`; any `Ok` means the append committed.
    #[tracing::instrument(skip(self, target, data), fields(len = data.len()), name = "fs.append")]
    pub async fn append<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: &[u8],
    ) -> FsResult<FileRecord> {
        let target = match target.into() {
            FileRef::Path(raw) => Target::Path(FsPath::parse(raw)?),
            FileRef::Record(file) => Target::Record(file.id, file.name.clone()),
        };
        let data = data.to_vec();
        let config = Arc::clone(&self.config);
        txn::run(&self.store, TxMode::ReadWrite, move |c| {
            let id = match target {
                Target::Path(path) => blocks::open_file(c, &path)?.id,
                Target::Record(id, name) => c.require_file(id, &name)?.id,
            };
            blocks::append(c, &config.chunking, id, &data)
        })
        .await
    }

    /// Stream a file's content block by block.
    #[tracing::instrument(skip(self), name = "fs.open_read_stream")]
    pub async fn open_read_stream(&self, path: &str) -> FsResult<ReadStream> {
        let file = self.get_file(path).await?;
        Ok(ReadStream::new(
            Arc::clone(&self.store),
            file,
            self.config.prefetch_depth,
        ))
    }

    /// Open an appending writer on an existing file.
    pub fn open_write_stream(&self, file: &FileRecord) -> WriteStream {
        WriteStream::new(
            Arc::clone(&self.store),
            file.clone(),
            self.config.stream_block_size,
        )
    }

    /// Copy a file's content into `writer`. Returns the bytes written.
    #[tracing::instrument(skip(self, writer), name = "fs.export")]
    pub async fn export_to<W>(&self, path: &str, writer: &mut W) -> FsResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut stream = self.open_read_stream(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }

    /// Replace the file at `path` with everything `reader` yields.
    ///
    /// The file is created (or truncated) first, then filled through a write
    /// stream; a failure part way leaves the prefix that was committed.
    #[tracing::instrument(skip(self, reader, desc), name = "fs.import")]
    pub async fn import_from<R>(&self, path: &str, reader: &mut R, desc: FileDesc) -> FsResult<FileRecord>
    where
        R: AsyncRead + Unpin,
    {
        let file = self.write_file(path, &[], desc).await?;
        let block_size = self.config.stream_block_size;
        let mut writer = self.open_write_stream(&file);
        loop {
            let mut chunk = Vec::with_capacity(block_size);
            let n = (&mut *reader).take(block_size as u64).read_to_end(&mut chunk).await?;
            if n == 0 {
                break;
            }
            writer.write_owned(chunk).await?;
        }
        Ok(writer.close())
    }
}

/// Owned form of [`FileRef`] that can move onto the blocking pool.
enum Target {
    Path(FsPath),
    Record(FileId, String),
}
