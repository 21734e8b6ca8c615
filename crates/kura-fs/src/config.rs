//! Filesystem configuration, loadable from RON.
//!
//! Every field is optional; missing fields take their defaults.
//!
//! ```ron
//! (
//!     database: Some("/var/lib/kura/kura.db"),
//!     prefetch_depth: 3,
//!     stream_block_size: 1048576,
//!     chunking: (
//!         fallback: 2048,
//!         tiers: [
//!             (up_to: 262144),
//!             (up_to: 2097152, block_size: Some(262144)),
//!         ],
//!     ),
//! )
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::content::ChunkPolicy;
use crate::error::{FsError, FsResult};

/// Blocks fetched ahead of a read stream's consumer.
pub const DEFAULT_PREFETCH_DEPTH: usize = 3;

/// Block size used by streaming writers.
pub const DEFAULT_STREAM_BLOCK_SIZE: usize = 1024 * 1024;

/// Filesystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// SQLite database file. `None` mounts a private in-memory database.
    pub database: Option<PathBuf>,
    pub prefetch_depth: usize,
    pub stream_block_size: usize,
    pub chunking: ChunkPolicy,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            database: None,
            prefetch_depth: DEFAULT_PREFETCH_DEPTH,
            stream_block_size: DEFAULT_STREAM_BLOCK_SIZE,
            chunking: ChunkPolicy::default(),
        }
    }
}

impl FsConfig {
    /// Default configuration backed by a database file.
    pub fn with_database(path: impl Into<PathBuf>) -> Self {
        Self {
            database: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parse and validate a RON document.
    pub fn from_ron_str(source: &str) -> FsResult<Self> {
        let config: FsConfig = ron::from_str(source).map_err(|e| FsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file.
    pub fn load(path: &Path) -> FsResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source).map_err(|e| match e {
            FsError::Config(msg) => FsError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn validate(&self) -> FsResult<()> {
        if self.prefetch_depth == 0 {
            return Err(FsError::Config("prefetch_depth must be > 0".into()));
        }
        if self.stream_block_size == 0 {
            return Err(FsError::Config("stream_block_size must be > 0".into()));
        }
        self.chunking.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BlockTier;

    #[test]
    fn test_empty_struct_is_default() {
        assert_eq!(FsConfig::from_ron_str("()").unwrap(), FsConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = FsConfig::from_ron_str(
            r#"(
                database: Some("/tmp/kura.db"),
                prefetch_depth: 8,
                chunking: (
                    fallback: 4096,
                    tiers: [(up_to: 100), (up_to: 1000, block_size: Some(10))],
                ),
            )"#,
        )
        .unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/kura.db")));
        assert_eq!(config.prefetch_depth, 8);
        assert_eq!(config.stream_block_size, DEFAULT_STREAM_BLOCK_SIZE);
        assert_eq!(config.chunking.fallback, 4096);
        assert_eq!(
            config.chunking.tiers[1],
            BlockTier {
                up_to: 1000,
                block_size: Some(10)
            }
        );
    }

    #[test]
    fn test_partial_chunking_keeps_default_tiers() {
        let config = FsConfig::from_ron_str("(chunking: (fallback: 65536))").unwrap();
        assert_eq!(config.chunking.fallback, 65536);
        assert_eq!(config.chunking.tiers, ChunkPolicy::default().tiers);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            FsConfig::from_ron_str("(prefetch_depth: 0)"),
            Err(FsError::Config(_))
        ));
        assert!(matches!(
            FsConfig::from_ron_str("(prefetch_depth: \"lots\")"),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kura.ron");
        std::fs::write(&path, "(stream_block_size: 4096)\n").unwrap();
        let config = FsConfig::load(&path).unwrap();
        assert_eq!(config.stream_block_size, 4096);

        assert!(matches!(
            FsConfig::load(&dir.path().join("missing.ron")),
            Err(FsError::Io(_))
        ));
    }
}
