use std::sync::atomic::{AtomicU32, Ordering};

use keyspread_common::{BucketId, SpreadResult};

use super::DistributionStrategy;
use crate::prefix::check_layout;

/// Assigns buckets in turn, ignoring the key.
///
/// Gives the most even write spread, but a row can only be found again by
/// scanning (or probing every bucket), since its bucket is not derivable from
/// its key.
///
/// The counter belongs to this instance. Each call consumes exactly one step,
/// no matter how many threads share the strategy.
#[derive(Debug)]
pub struct RoundRobinPrefix {
    bucket_count: u32,
    prefix_width: usize,
    next: AtomicU32,
}

impl RoundRobinPrefix {
    /// One-byte prefix. Supports 1..=256 buckets.
    pub fn new(bucket_count: u32) -> SpreadResult<Self> {
        Self::with_width(bucket_count, 1)
    }

    pub fn with_width(bucket_count: u32, prefix_width: usize) -> SpreadResult<Self> {
        check_layout(bucket_count, prefix_width)?;
        Ok(Self {
            bucket_count,
            prefix_width,
            next: AtomicU32::new(0),
        })
    }
}

impl DistributionStrategy for RoundRobinPrefix {
    fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    fn prefix_width(&self) -> usize {
        self.prefix_width
    }

    fn bucket_of(&self, _original_key: &[u8]) -> BucketId {
        let n = self.bucket_count;
        let step = self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |curr| {
                Some(if curr + 1 >= n { 0 } else { curr + 1 })
            });
        // the closure never returns `None`
        match step {
            Ok(curr) | Err(curr) => curr,
        }
    }

    fn is_deterministic(&self) -> bool {
        false
    }
}
