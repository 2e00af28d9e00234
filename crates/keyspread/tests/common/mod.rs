#![allow(dead_code)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use keyspread::{MemKvStore, RowKeyDistributor, SortedStore, StoreCursor, StoreError};

/// Records how often a cursor was closed.
#[derive(Debug)]
pub struct Probe {
    pub bucket: u8,
    closes: AtomicUsize,
}

impl Probe {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// A [`MemKvStore`] that tracks every cursor it hands out and can inject
/// failures into the sub-scan of one bucket (identified by the first byte of
/// the scan's start key).
#[derive(Debug, Default)]
pub struct TrackedStore {
    pub inner: MemKvStore,
    fail_open: Option<u8>,
    fail_after: Option<(u8, usize)>,
    probes: Mutex<Vec<Arc<Probe>>>,
}

impl TrackedStore {
    pub fn new(inner: MemKvStore) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    /// Opening the scan of `bucket` fails.
    pub fn fail_open(mut self, bucket: u8) -> Self {
        self.fail_open = Some(bucket);
        self
    }

    /// The cursor of `bucket` fails after yielding `rows` rows.
    pub fn fail_after(mut self, bucket: u8, rows: usize) -> Self {
        self.fail_after = Some((bucket, rows));
        self
    }

    pub fn probes(&self) -> Vec<Arc<Probe>> {
        self.probes.lock().unwrap().clone()
    }

    pub fn assert_all_closed_once(&self) {
        for probe in self.probes() {
            assert_eq!(probe.closes(), 1, "cursor of bucket {}", probe.bucket);
        }
    }
}

impl SortedStore for TrackedStore {
    fn scan(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
    ) -> Result<Box<dyn StoreCursor + '_>, StoreError> {
        let bucket = start.first().copied().unwrap_or_default();
        if self.fail_open == Some(bucket) {
            return Err(StoreError::ShardUnavailable(
                format!("region of bucket {}", bucket).into(),
            ));
        }
        let probe = Arc::new(Probe {
            bucket,
            closes: AtomicUsize::new(0),
        });
        self.probes.lock().unwrap().push(probe.clone());
        let fail_after = match self.fail_after {
            Some((b, rows)) if b == bucket => Some(rows),
            _ => None,
        };
        Ok(Box::new(TrackedCursor {
            inner: self.inner.scan(start, stop)?,
            probe,
            fail_after,
            served: 0,
        }))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        SortedStore::get(&self.inner, key)
    }

    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        self.inner.put(key, value)
    }
}

struct TrackedCursor<'a> {
    inner: Box<dyn StoreCursor + 'a>,
    probe: Arc<Probe>,
    fail_after: Option<usize>,
    served: usize,
}

impl StoreCursor for TrackedCursor<'_> {
    fn next_row(&mut self) -> Result<Option<(Bytes, Bytes)>, StoreError> {
        if self.fail_after.is_some_and(|rows| self.served >= rows) {
            return Err(StoreError::ConnectionLost("injected".into()));
        }
        let row = self.inner.next_row()?;
        if row.is_some() {
            self.served += 1;
        }
        Ok(row)
    }

    fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

pub const ORIG_KEY_PREFIX: u64 = 1_700_000_000_000;

/// `prefix + val` as an 8-byte big-endian key
pub fn key_of(val: u64) -> [u8; 8] {
    (ORIG_KEY_PREFIX + val).to_be_bytes()
}

/// Writes `num_rows` values around `seed`: seed, seed - 1, seed + 2, seed - 3, ...
/// Returns how many of them fall inside `[min, max]`.
pub fn write_test_data(
    store: &mut impl SortedStore,
    distributor: &RowKeyDistributor,
    num_rows: i64,
    seed: i64,
    min: i64,
    max: i64,
) -> usize {
    let mut in_interval = 0;
    for i in 0..num_rows {
        let val = seed + i - i * (i % 2) * 2;
        if (min..=max).contains(&val) {
            in_interval += 1;
        }
        distributor
            .put(
                store,
                &key_of(val as u64),
                Bytes::copy_from_slice(&(val as i32).to_be_bytes()),
            )
            .unwrap();
    }
    in_interval
}

pub fn value_of(value: &Bytes) -> i64 {
    i32::from_be_bytes(value[..4].try_into().unwrap()) as i64
}
