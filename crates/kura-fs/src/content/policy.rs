//! Block sizing for whole-file writes and appends.

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// One row of the block size table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTier {
    /// Inclusive upper bound on the total write size.
    pub up_to: u64,
    /// Block size for writes in this tier. `None` stores the write as a single
    /// block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_size: Option<u64>,
}

/// Size-tiered chunking policy, chosen once per write from its length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPolicy {
    /// Tiers in ascending `up_to` order.
    pub tiers: Vec<BlockTier>,
    /// Block size for writes larger than every tier.
    pub fallback: u64,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            tiers: vec![
                BlockTier {
                    up_to: 256 * KIB,
                    block_size: None,
                },
                BlockTier {
                    up_to: 2 * MIB,
                    block_size: Some(256 * KIB),
                },
                BlockTier {
                    up_to: 50 * MIB,
                    block_size: Some(512 * KIB),
                },
                BlockTier {
                    up_to: 100 * MIB,
                    block_size: Some(MIB),
                },
            ],
            // Writes above 100 MiB land in 2 KiB blocks unless overridden.
            fallback: 2 * KIB,
        }
    }
}

impl ChunkPolicy {
    pub fn validate(&self) -> FsResult<()> {
        if self.fallback == 0 {
            return Err(FsError::Config("chunking.fallback must be > 0".into()));
        }
        let mut previous = None;
        for tier in &self.tiers {
            if tier.block_size == Some(0) {
                return Err(FsError::Config(format!(
                    "chunking tier up_to={} has a zero block size",
                    tier.up_to
                )));
            }
            if previous.is_some_and(|p| tier.up_to <= p) {
                return Err(FsError::Config(
                    "chunking tiers must be in ascending up_to order".into(),
                ));
            }
            previous = Some(tier.up_to);
        }
        Ok(())
    }

    /// Block size for a write of `len` bytes. Zero only when `len` is zero.
    pub fn block_size(&self, len: u64) -> u64 {
        self.tiers
            .iter()
            .find(|tier| len <= tier.up_to)
            .map(|tier| tier.block_size.unwrap_or(len))
            .unwrap_or(self.fallback)
    }

    /// Number of blocks a write of `len` bytes produces.
    pub fn block_count(&self, len: u64) -> u64 {
        if len == 0 {
            return 0;
        }
        len.div_ceil(self.block_size(len))
    }

    /// Split `data` into blocks. Empty input yields no blocks.
    pub fn split<'a>(&self, data: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        let size = self.block_size(data.len() as u64).max(1);
        data.chunks(usize::try_from(size).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let policy = ChunkPolicy::default();
        let cases = [
            (0, 0),
            (1, 1),
            (256 * KIB, 1),
            (256 * KIB + 1, 2),
            (2 * MIB, 8),
            (2 * MIB + 1, 5),
            (50 * MIB, 100),
            (50 * MIB + 1, 51),
            (100 * MIB, 100),
            (100 * MIB + 1, 51_201),
        ];
        for (len, blocks) in cases {
            assert_eq!(policy.block_count(len), blocks, "len={len}");
        }
    }

    #[test]
    fn test_split() {
        let policy = ChunkPolicy::default();
        assert_eq!(policy.split(&[]).count(), 0);

        let small = vec![7u8; 1000];
        let blocks: Vec<_> = policy.split(&small).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 1000);

        let medium = vec![1u8; (256 * KIB + 10) as usize];
        let lens: Vec<_> = policy.split(&medium).map(<[u8]>::len).collect();
        assert_eq!(lens, vec![(256 * KIB) as usize, 10]);
    }

    #[test]
    fn test_custom_tiers() {
        let policy = ChunkPolicy {
            tiers: vec![BlockTier {
                up_to: 10,
                block_size: Some(4),
            }],
            fallback: 100,
        };
        policy.validate().unwrap();
        assert_eq!(policy.block_count(10), 3);
        assert_eq!(policy.block_count(11), 1);
        assert_eq!(policy.block_count(250), 3);
    }

    #[test]
    fn test_validate() {
        assert!(ChunkPolicy::default().validate().is_ok());

        let zero = ChunkPolicy {
            tiers: vec![],
            fallback: 0,
        };
        assert!(zero.validate().is_err());

        let unordered = ChunkPolicy {
            tiers: vec![
                BlockTier {
                    up_to: 10,
                    block_size: None,
                },
                BlockTier {
                    up_to: 5,
                    block_size: Some(1),
                },
            ],
            fallback: 1,
        };
        assert!(matches!(unordered.validate(), Err(FsError::Config(_))));
    }
}
