//! Streaming reader and writer over a file's blocks.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream};
use futures::{Sink, Stream, StreamExt};
use kura_store::{NativeStore, TxMode};

use crate::content::blocks;
use crate::error::FsResult;
use crate::records::FileRecord;
use crate::txn;

/// Lazy stream of a file's content, one item per stored block.
///
/// Up to `prefetch` block fetches run ahead of the consumer. Dropping the
/// stream abandons whatever is still in flight. The block list is captured
/// when the stream is opened; blocks freed by a later rewrite or removal of
/// the file come back as `NotFound`.
pub struct ReadStream {
    file: FileRecord,
    inner: BoxStream<'static, FsResult<Vec<u8>>>,
}

impl ReadStream {
    pub(crate) fn new(store: Arc<dyn NativeStore>, file: FileRecord, prefetch: usize) -> Self {
        let (file_id, name) = (file.id, file.name.clone());
        let fetches = stream::iter(file.block_ids.clone()).map(move |id| {
            let store = Arc::clone(&store);
            let name = name.clone();
            async move {
                txn::run(&store, TxMode::ReadOnly, move |c| {
                    blocks::read_listed_block(c, file_id, &name, id)
                })
                .await
            }
        });
        Self {
            file,
            inner: fetches.buffered(prefetch.max(1)).boxed(),
        }
    }

    /// The file record as of opening.
    pub fn file(&self) -> &FileRecord {
        &self.file
    }
}

impl Stream for ReadStream {
    type Item = FsResult<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("file", &self.file.id)
            .field("blocks", &self.file.block_ids.len())
            .finish()
    }
}

/// Appending writer for an existing file.
///
/// Every non-empty chunk is split into `block_size` blocks and committed in
/// its own transaction, so a writer dropped mid-stream leaves the file
/// extended up to the last committed chunk.
pub struct WriteStream {
    store: Arc<dyn NativeStore>,
    file: FileRecord,
    block_size: usize,
}

impl WriteStream {
    pub(crate) fn new(store: Arc<dyn NativeStore>, file: FileRecord, block_size: usize) -> Self {
        Self {
            store,
            file,
            block_size: block_size.max(1),
        }
    }

    /// The file record after the last committed chunk.
    pub fn file(&self) -> &FileRecord {
        &self.file
    }

    pub async fn write(&mut self, chunk: &[u8]) -> FsResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.write_owned(chunk.to_vec()).await
    }

    /// Append an owned chunk without copying it.
    pub async fn write_owned(&mut self, chunk: Vec<u8>) -> FsResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let id = self.file.id;
        let block_size = self.block_size;
        self.file = txn::run(&self.store, TxMode::ReadWrite, move |c| {
            blocks::extend_file(c, id, chunk.chunks(block_size), chunk.len() as u64)
        })
        .await?;
        Ok(())
    }

    /// Finish writing and return the final record.
    pub fn close(self) -> FileRecord {
        tracing::debug!(
            file = %self.file.id,
            size = self.file.size,
            blocks = self.file.block_ids.len(),
            "closed write stream"
        );
        self.file
    }

    /// Adapt the writer into a `Sink` of owned chunks.
    pub fn into_sink(self) -> impl Sink<Vec<u8>, Error = crate::error::FsError> {
        futures::sink::unfold(self, |mut writer, chunk: Vec<u8>| async move {
            writer.write_owned(chunk).await?;
            Ok(writer)
        })
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream")
            .field("file", &self.file.id)
            .field("block_size", &self.block_size)
            .finish()
    }
}
