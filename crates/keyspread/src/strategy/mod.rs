//! Mapping original keys to buckets.
//!
//! Every strategy owns a fixed `bucket_count` and `prefix_width`, chosen at
//! construction. Writers and readers of a dataset must agree on both or rows
//! become unreachable.
mod hash;
mod round_robin;

use enum_dispatch::enum_dispatch;
use keyspread_common::BucketId;

pub use hash::{HashPrefix, KeyHasher, XXH_SEED};
pub use round_robin::RoundRobinPrefix;

use crate::prefix::{encode_prefix, Prefix};

#[enum_dispatch]
pub trait DistributionStrategy: Send + Sync {
    fn bucket_count(&self) -> u32;

    fn prefix_width(&self) -> usize;

    /// The bucket `original_key` is written to.
    fn bucket_of(&self, original_key: &[u8]) -> BucketId;

    /// Whether `bucket_of` depends only on the key. Point lookups against a
    /// non-deterministic strategy have to probe every bucket.
    fn is_deterministic(&self) -> bool {
        true
    }

    fn prefix_of(&self, bucket: BucketId) -> Prefix {
        encode_prefix(bucket, self.prefix_width())
    }

    /// Every prefix in ascending bucket order.
    fn all_prefixes(&self) -> Vec<Prefix> {
        (0..self.bucket_count()).map(|b| self.prefix_of(b)).collect()
    }
}

/// The built-in strategies.
#[enum_dispatch(DistributionStrategy)]
#[derive(Debug)]
pub enum Strategy {
    Hash(HashPrefix),
    RoundRobin(RoundRobinPrefix),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Hash(_) => "hash",
            Strategy::RoundRobin(_) => "round_robin",
        }
    }
}
