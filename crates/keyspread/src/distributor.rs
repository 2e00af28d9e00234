use bytes::{BufMut, Bytes, BytesMut};
use keyspread_common::{BucketId, KeyRange, SpreadError, SpreadResult};
use keyspread_kv_store::SortedStore;
use tracing::trace;

use crate::{
    config::{JobConf, StrategyConfig},
    prefix::{decode_prefix, Prefix},
    scan::MergeScanner,
    strategy::{DistributionStrategy, HashPrefix, RoundRobinPrefix, Strategy},
};

/// Builds and decodes physical keys.
///
/// A physical key is `prefix(bucket) ++ original_key`. The prefix never
/// touches the original bytes, so the original key is always the physical key
/// minus its first `prefix_width` bytes.
#[derive(Debug)]
pub struct RowKeyDistributor<S = Strategy> {
    strategy: S,
}

impl<S: DistributionStrategy> RowKeyDistributor<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn bucket_count(&self) -> u32 {
        self.strategy.bucket_count()
    }

    pub fn prefix_width(&self) -> usize {
        self.strategy.prefix_width()
    }

    pub fn all_prefixes(&self) -> Vec<Prefix> {
        self.strategy.all_prefixes()
    }

    pub fn distributed_key(&self, original_key: &[u8]) -> Bytes {
        let bucket = self.strategy.bucket_of(original_key);
        self.key_in_bucket(bucket, original_key)
    }

    fn key_in_bucket(&self, bucket: BucketId, original_key: &[u8]) -> Bytes {
        let prefix = self.strategy.prefix_of(bucket);
        let mut buf = BytesMut::with_capacity(prefix.len() + original_key.len());
        buf.put_slice(&prefix);
        buf.put_slice(original_key);
        buf.freeze()
    }

    pub fn original_key<'k>(&self, physical_key: &'k [u8]) -> SpreadResult<&'k [u8]> {
        let width = self.prefix_width();
        physical_key
            .get(width..)
            .ok_or(SpreadError::MalformedKey {
                len: physical_key.len(),
                prefix_width: width,
            })
    }

    /// Like [`Self::original_key`], sharing the buffer instead of borrowing it.
    pub fn original_key_bytes(&self, physical_key: &Bytes) -> SpreadResult<Bytes> {
        self.original_key(physical_key)?;
        Ok(physical_key.slice(self.prefix_width()..))
    }

    /// The bucket a physical key was written to.
    pub fn bucket_of_physical(&self, physical_key: &[u8]) -> SpreadResult<BucketId> {
        let width = self.prefix_width();
        match physical_key.get(..width) {
            Some(prefix) => Ok(decode_prefix(prefix)),
            None => Err(SpreadError::MalformedKey {
                len: physical_key.len(),
                prefix_width: width,
            }),
        }
    }

    /// `boundary_key` under every bucket prefix, in bucket order.
    pub fn all_distributed_keys(&self, boundary_key: &[u8]) -> Vec<Bytes> {
        (0..self.bucket_count())
            .map(|bucket| self.key_in_bucket(bucket, boundary_key))
            .collect()
    }

    /// Write `value` under the distributed form of `original_key`, returning
    /// the physical key used.
    pub fn put<T>(&self, store: &mut T, original_key: &[u8], value: Bytes) -> SpreadResult<Bytes>
    where
        T: SortedStore + ?Sized,
    {
        let bucket = self.strategy.bucket_of(original_key);
        let key = self.key_in_bucket(bucket, original_key);
        store
            .put(&key, value)
            .map_err(|e| SpreadError::store_in_bucket(bucket, e))?;
        Ok(key)
    }

    /// Look up `original_key`.
    ///
    /// A deterministic strategy needs a single read. Otherwise every bucket is
    /// probed in order and the first hit wins.
    pub fn get<T>(&self, store: &T, original_key: &[u8]) -> SpreadResult<Option<Bytes>>
    where
        T: SortedStore + ?Sized,
    {
        if self.strategy.is_deterministic() {
            let bucket = self.strategy.bucket_of(original_key);
            let key = self.key_in_bucket(bucket, original_key);
            return store
                .get(&key)
                .map_err(|e| SpreadError::store_in_bucket(bucket, e));
        }

        for bucket in 0..self.bucket_count() {
            let key = self.key_in_bucket(bucket, original_key);
            let found = store
                .get(&key)
                .map_err(|e| SpreadError::store_in_bucket(bucket, e))?;
            if found.is_some() {
                trace!(bucket, "found key after probing");
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Merge-scan `range` in original key order.
    pub fn scan<'a, T>(&self, store: &'a T, range: &KeyRange) -> SpreadResult<MergeScanner<'a>>
    where
        T: SortedStore + ?Sized,
    {
        MergeScanner::open(store, range, self)
    }
}

impl RowKeyDistributor<Strategy> {
    /// Hash distributor with a one-byte prefix
    pub fn hash(bucket_count: u32) -> SpreadResult<Self> {
        Ok(Self::new(HashPrefix::new(bucket_count)?.into()))
    }

    /// Round-robin distributor with a one-byte prefix
    pub fn round_robin(bucket_count: u32) -> SpreadResult<Self> {
        Ok(Self::new(RoundRobinPrefix::new(bucket_count)?.into()))
    }

    pub fn from_config(config: &StrategyConfig) -> SpreadResult<Self> {
        Ok(Self::new(config.build()?))
    }

    pub fn config(&self) -> StrategyConfig {
        StrategyConfig::from(&self.strategy)
    }

    /// Record this distributor in a job configuration.
    pub fn add_info(&self, conf: &mut JobConf) {
        conf.add_strategy(&self.config());
    }

    pub fn from_job_conf(conf: &JobConf) -> SpreadResult<Self> {
        Self::from_config(&conf.strategy()?)
    }
}
