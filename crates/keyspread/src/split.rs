//! One work unit per bucket, for consumers that don't need merged order.
//!
//! A batch job counting or aggregating rows can process every bucket of a
//! logical range independently. [`bucket_splits`] turns the range into one
//! [`BucketSplit`] per bucket; each covers exactly one physical prefix range.
use std::num::NonZeroUsize;

use bytes::{BufMut, Bytes, BytesMut};
use keyspread_common::{BucketId, KeyRange, SpreadError, SpreadResult};
use keyspread_kv_store::{SortedStore, StoreCursor};
use tracing::{debug, trace};

use crate::{
    distributor::RowKeyDistributor,
    prefix::{next_prefix, Prefix},
    strategy::DistributionStrategy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSplit {
    bucket: BucketId,
    prefix: Prefix,
    start: Bytes,
    stop: Option<Bytes>,
}

impl BucketSplit {
    /// The part of `range` stored under `prefix`.
    pub fn new(bucket: BucketId, prefix: Prefix, range: &KeyRange) -> Self {
        let start = concat(&prefix, range.start().unwrap_or_default());
        let stop = match range.stop() {
            Some(stop) => Some(concat(&prefix, stop)),
            // stay inside this bucket
            None => next_prefix(&prefix).map(|p| Bytes::copy_from_slice(&p)),
        };
        Self {
            bucket,
            prefix,
            start,
            stop,
        }
    }

    pub fn bucket(&self) -> BucketId {
        self.bucket
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Inclusive physical start key
    pub fn start(&self) -> &Bytes {
        &self.start
    }

    /// Exclusive physical stop key, `None` for the last bucket of the key space.
    pub fn stop(&self) -> Option<&Bytes> {
        self.stop.as_ref()
    }

    pub fn open<'a, T>(&self, store: &'a T) -> SpreadResult<Box<dyn StoreCursor + 'a>>
    where
        T: SortedStore + ?Sized,
    {
        store
            .scan(&self.start, self.stop.as_deref())
            .map_err(|e| SpreadError::store_in_bucket(self.bucket, e))
    }

    /// Count the rows of this split. The cursor is released on every path.
    pub fn count_rows<T>(&self, store: &T) -> SpreadResult<u64>
    where
        T: SortedStore + ?Sized,
    {
        let mut cursor = self.open(store)?;
        let mut count = 0;
        let ans = loop {
            match cursor.next_row() {
                Ok(Some(_)) => count += 1,
                Ok(None) => break Ok(count),
                Err(e) => break Err(SpreadError::store_in_bucket(self.bucket, e)),
            }
        };
        cursor.close();
        trace!(bucket = self.bucket, ?ans, "split counted");
        ans
    }
}

fn concat(prefix: &[u8], key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(prefix.len() + key.len());
    buf.put_slice(prefix);
    buf.put_slice(key);
    buf.freeze()
}

/// One split per bucket, in bucket order.
pub fn bucket_splits<S>(distributor: &RowKeyDistributor<S>, range: &KeyRange) -> Vec<BucketSplit>
where
    S: DistributionStrategy,
{
    distributor
        .all_prefixes()
        .into_iter()
        .zip(0..)
        .map(|(prefix, bucket)| BucketSplit::new(bucket, prefix, range))
        .collect()
}

/// Count the rows of all `splits` on scoped worker threads.
///
/// Order doesn't matter for a count, so buckets run independently. If any
/// split fails, the error of the lowest failing bucket is returned.
pub fn count_rows_parallel<T>(store: &T, splits: &[BucketSplit]) -> SpreadResult<u64>
where
    T: SortedStore + Sync + ?Sized,
{
    if splits.is_empty() {
        return Ok(0);
    }

    let workers = std::thread::available_parallelism()
        .map_or(4, NonZeroUsize::get)
        .min(splits.len());
    let chunk_size = splits.len().div_ceil(workers);
    debug!(splits = splits.len(), workers, "counting rows");
    let results: Vec<Vec<SpreadResult<u64>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = splits
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|split| split.count_rows(store))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(counts) => counts,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    results.into_iter().flatten().sum()
}
