//! # kura-fs
//!
//! A hierarchical filesystem stored as flat records.
//!
//! Paths like `/a/b/c` are resolved against a catalog of directory and file
//! records kept in a [`kura_store::NativeStore`]. File content is split into
//! immutable blocks, sized by a [`ChunkPolicy`] for whole writes or by a fixed
//! size for streaming writes.
//!
//! ```no_run
//! # async fn demo() -> kura_fs::FsResult<()> {
//! use kura_fs::{FileDesc, FsConfig, KuraFs};
//!
//! let fs = KuraFs::mount(FsConfig::with_database("kura.db"))?;
//! fs.mkdir("/docs").await?;
//! fs.write_file("/docs/hello.txt", b"hello", FileDesc::new("text/plain")).await?;
//! assert_eq!(fs.read_file("/docs/hello.txt").await?, b"hello");
//! # Ok(())
//! # }
//! ```
//!
//! Every operation runs in one store transaction on tokio's blocking pool.
//! Read and write streams are the exception: they commit per block and per
//! chunk respectively.

pub mod catalog;
pub mod config;
pub mod content;
pub mod error;
pub mod fs;
pub mod path;
pub mod records;
pub mod resolve;
pub mod tree;

mod txn;

pub use config::FsConfig;
pub use content::{BlockTier, ChunkPolicy, FileRef, ReadStream, WriteStream};
pub use error::{FsError, FsResult};
pub use fs::KuraFs;
pub use path::{FsPath, ROOT_NAME};
pub use records::{
    BlockId, DirListing, DirectoryId, DirectoryRecord, FileDesc, FileId, FileRecord, Stat, Usage,
};
pub use resolve::{Resolution, ResolutionNode, resolve};
pub use tree::Removed;
