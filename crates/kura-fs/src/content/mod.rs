//! Chunked content engine.
//!
//! Whole-file writes and appends split content by [`ChunkPolicy`]; streaming
//! writers re-chunk to a fixed block size. Blocks are immutable once stored and
//! owned by exactly one file.

pub(crate) mod blocks;
mod policy;
mod stream;

pub use policy::{BlockTier, ChunkPolicy};
pub use stream::{ReadStream, WriteStream};

use crate::records::FileRecord;

/// Target of an append: a path, or a file record already in hand.
#[derive(Debug, Clone, Copy)]
pub enum FileRef<'a> {
    Path(&'a str),
    Record(&'a FileRecord),
}

impl<'a> From<&'a str> for FileRef<'a> {
    fn from(path: &'a str) -> Self {
        FileRef::Path(path)
    }
}

impl<'a> From<&'a String> for FileRef<'a> {
    fn from(path: &'a String) -> Self {
        FileRef::Path(path)
    }
}

impl<'a> From<&'a FileRecord> for FileRef<'a> {
    fn from(file: &'a FileRecord) -> Self {
        FileRef::Record(file)
    }
}
