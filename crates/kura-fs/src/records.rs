//! Catalog record types.
//!
//! Directory and file records are persisted as postcard-encoded structs; block
//! records are stored as their raw bytes. The root directory is a sentinel
//! that is never persisted.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use kura_store::RecordKey;

use crate::path::ROOT_NAME;

macro_rules! impl_record_id {
    ($T:ident) => {
        impl $T {
            pub(crate) fn from_key(key: RecordKey) -> Self {
                Self(key)
            }

            /// The store key behind this id.
            pub fn key(&self) -> RecordKey {
                self.0
            }
        }

        impl From<$T> for RecordKey {
            fn from(id: $T) -> RecordKey {
                id.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Identifier of a directory record.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryId(RecordKey);

/// Identifier of a file record.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(RecordKey);

/// Identifier of a content block.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(RecordKey);

impl_record_id!(DirectoryId);
impl_record_id!(FileId);
impl_record_id!(BlockId);

impl DirectoryId {
    /// The root sentinel. Store keys start at 1, so this never names a
    /// persisted record.
    pub const ROOT: DirectoryId = DirectoryId(-1);

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A directory in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub id: DirectoryId,
    pub name: String,
    /// Containing directory; [`DirectoryId::ROOT`] for top-level directories.
    /// The root sentinel is its own parent.
    pub parent_id: DirectoryId,
    pub created_at: u64,
    pub updated_at: u64,
}

impl DirectoryRecord {
    /// The implicit root directory.
    pub fn root() -> Self {
        Self {
            id: DirectoryId::ROOT,
            name: ROOT_NAME.to_string(),
            parent_id: DirectoryId::ROOT,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }
}

/// A file in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub directory_id: DirectoryId,
    /// Content blocks in order. Concatenated, they are the file's bytes.
    pub block_ids: Vec<BlockId>,
    /// Content length in bytes; always the sum of the block lengths.
    pub size: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub mime_type: String,
}

/// A stored content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    pub id: BlockId,
    pub bytes: Vec<u8>,
}

/// Caller-supplied attributes for a new or rewritten file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDesc {
    pub mime_type: String,
}

impl FileDesc {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }
}

impl Default for FileDesc {
    fn default() -> Self {
        Self::new("application/octet-stream")
    }
}

/// Metadata returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    pub is_directory: bool,
    /// Content length; zero for directories.
    pub size: u64,
    pub created_at: u64,
    pub updated_at: u64,
    /// MIME type; `None` for directories.
    pub mime_type: Option<String>,
}

impl From<&DirectoryRecord> for Stat {
    fn from(dir: &DirectoryRecord) -> Self {
        Self {
            name: dir.name.clone(),
            is_directory: true,
            size: 0,
            created_at: dir.created_at,
            updated_at: dir.updated_at,
            mime_type: None,
        }
    }
}

impl From<&FileRecord> for Stat {
    fn from(file: &FileRecord) -> Self {
        Self {
            name: file.name.clone(),
            is_directory: false,
            size: file.size,
            created_at: file.created_at,
            updated_at: file.updated_at,
            mime_type: Some(file.mime_type.clone()),
        }
    }
}

/// Direct children of a directory, each list sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    pub dirs: Vec<DirectoryRecord>,
    pub files: Vec<FileRecord>,
}

impl DirListing {
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }
}

/// Record counts and stored content size of a mounted filesystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub directories: u64,
    pub files: u64,
    pub blocks: u64,
    pub stored_bytes: u64,
}
