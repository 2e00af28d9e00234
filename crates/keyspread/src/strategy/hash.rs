use keyspread_common::{BucketId, SpreadResult};
use serde::{Deserialize, Serialize};

use super::DistributionStrategy;
use crate::prefix::check_layout;

pub const XXH_SEED: u32 = u32::from_le_bytes(*b"SPRD");

/// Hash function used by [`HashPrefix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyHasher {
    /// `h = 31 * h + b` over signed bytes, starting from 1.
    ///
    /// Bit-compatible with the one-byte simple hash used by existing
    /// prefixed datasets. Sequential keys spread almost perfectly evenly.
    #[default]
    Simple,
    /// xxHash32 with the given seed
    Xxh32 { seed: u32 },
}

impl KeyHasher {
    pub fn xxh32() -> Self {
        KeyHasher::Xxh32 { seed: XXH_SEED }
    }

    pub fn hash(&self, key: &[u8]) -> u32 {
        match self {
            KeyHasher::Simple => simple_hash(key),
            KeyHasher::Xxh32 { seed } => xxhash_rust::xxh32::xxh32(key, *seed),
        }
    }
}

fn simple_hash(key: &[u8]) -> u32 {
    key.iter()
        .fold(1i32, |h, &b| h.wrapping_mul(31).wrapping_add(i32::from(b as i8)))
        .unsigned_abs()
}

/// Deterministic hash-based bucket assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPrefix {
    bucket_count: u32,
    prefix_width: usize,
    hasher: KeyHasher,
}

impl HashPrefix {
    /// One-byte prefix, [`KeyHasher::Simple`]. Supports 1..=256 buckets.
    pub fn new(bucket_count: u32) -> SpreadResult<Self> {
        Self::with_layout(bucket_count, 1, KeyHasher::Simple)
    }

    pub fn with_layout(
        bucket_count: u32,
        prefix_width: usize,
        hasher: KeyHasher,
    ) -> SpreadResult<Self> {
        check_layout(bucket_count, prefix_width)?;
        Ok(Self {
            bucket_count,
            prefix_width,
            hasher,
        })
    }

    pub fn hasher(&self) -> KeyHasher {
        self.hasher
    }
}

impl DistributionStrategy for HashPrefix {
    fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    fn prefix_width(&self) -> usize {
        self.prefix_width
    }

    fn bucket_of(&self, original_key: &[u8]) -> BucketId {
        self.hasher.hash(original_key) % self.bucket_count
    }
}
