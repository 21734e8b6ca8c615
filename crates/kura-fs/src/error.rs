//! Filesystem error types.

use std::io;
use thiserror::Error;

use kura_store::StoreError;

/// Filesystem error type.
///
/// `NotFound`, `InvalidPath`, `AlreadyExists`, `NotExistsParent` and
/// `DirectoryNotEmpty` are ordinary outcomes a caller is expected to handle.
/// `Fatal` means the catalog violates its own invariants and must not be
/// retried.
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed path string.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Create target already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Parent directory of a create target is missing.
    #[error("parent directory does not exist: {0}")]
    NotExistsParent(String),

    /// Non-recursive remove of a directory that still has children.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Catalog invariant violated.
    #[error("catalog corrupted: {0}")]
    Fatal(String),

    /// Configuration rejected.
    #[error("invalid config: {0}")]
    Config(String),

    /// Native store failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Record could not be encoded or decoded.
    #[error("record codec: {0}")]
    Codec(#[from] postcard::Error),

    /// External source or sink failure during import/export.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotExistsParent error.
    pub fn not_exists_parent(path: impl Into<String>) -> Self {
        Self::NotExistsParent(path.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create a Fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// True for catalog corruption, which callers must not retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Fatal(_))
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            FsError::NotExistsParent(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            FsError::Config(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            FsError::Io(e) => e,
            other => io::Error::other(other.to_string()),
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
