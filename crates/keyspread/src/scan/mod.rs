//! Merge scan: one logical range, read as `bucket_count` physical sub-scans and
//! merged back into original key order.
//!
//! Every bucket holds its rows sorted by physical key, and within one bucket
//! the prefix is constant, so each sub-scan is already sorted by original key.
//! A k-way merge over the sub-scans therefore yields exactly what a scan over
//! an unprefixed table would.
//!
//! ```text
//!                   ┌──────────────┐
//!  [p0 ++ start, p0 ++ stop) ───▶  │              │
//!  [p1 ++ start, p1 ++ stop) ───▶  │  min-heap by │ ───▶ rows in original key order
//!           ...                    │ original key │
//!  [pN ++ start, pN ++ stop) ───▶  │              │
//!                   └──────────────┘
//! ```
//!
//! States: `Initializing -> Active -> {Exhausted, Closed}`. The first call to
//! [`MergeScanner::next_row`] pulls one row from every bucket; after that only
//! the bucket whose row was handed out is advanced, lazily on the next call.
mod cursor;

use std::collections::BinaryHeap;
use std::fmt::Debug;

use keyspread_common::{KeyRange, SpreadError, SpreadResult};
use keyspread_kv_store::SortedStore;
use tracing::{debug, trace, warn};

pub use cursor::Row;
use cursor::MergeCursor;

use crate::{distributor::RowKeyDistributor, split::bucket_splits, strategy::DistributionStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Cursors are open but nothing has been read yet
    Initializing,
    Active,
    /// Every bucket ran dry. Further reads return `Ok(None)`.
    Exhausted,
    /// Closed by the caller or by a failure. Further reads fail with
    /// [`SpreadError::ScannerClosed`].
    Closed,
}

#[derive(Debug)]
struct HeapItem {
    row: Row,
    slot: usize,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    // `BinaryHeap` is a max-heap; the smallest key, then the lowest bucket,
    // must come out first
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.row
            .original_key()
            .cmp(other.row.original_key())
            .then(self.slot.cmp(&other.slot))
            .reverse()
    }
}

pub struct MergeScanner<'a> {
    /// One per bucket, in bucket order
    cursors: Vec<MergeCursor<'a>>,
    heap: BinaryHeap<HeapItem>,
    /// The cursor whose row was returned last and still has to be advanced
    refill: Option<usize>,
    state: ScanState,
}

impl<'a> MergeScanner<'a> {
    /// Open one sub-scan per bucket of `distributor`.
    ///
    /// If any bucket fails to open, the ones already opened are released
    /// before the error is returned.
    pub fn open<S, T>(
        store: &'a T,
        range: &KeyRange,
        distributor: &RowKeyDistributor<S>,
    ) -> SpreadResult<Self>
    where
        S: DistributionStrategy,
        T: SortedStore + ?Sized,
    {
        let splits = bucket_splits(distributor, range);
        let prefix_width = distributor.prefix_width();
        debug!(buckets = splits.len(), ?range, "open merge scan");
        let mut cursors = Vec::with_capacity(splits.len());
        for split in splits.iter() {
            match split.open(store) {
                Ok(inner) => {
                    trace!(bucket = split.bucket(), "opened sub-scan");
                    cursors.push(MergeCursor::new(split.bucket(), prefix_width, inner));
                }
                Err(e) => {
                    warn!(
                        bucket = split.bucket(),
                        opened = cursors.len(),
                        error = %e,
                        "failed to open sub-scan"
                    );
                    ensure_cov::notify_cov("keyspread::scan::MergeScanner::open::release_opened");
                    for cursor in cursors.iter_mut() {
                        cursor.release();
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            heap: BinaryHeap::with_capacity(cursors.len()),
            cursors,
            refill: None,
            state: ScanState::Initializing,
        })
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn bucket_count(&self) -> usize {
        self.cursors.len()
    }

    /// Number of sub-scans not yet released
    pub fn open_cursors(&self) -> usize {
        self.cursors.iter().filter(|c| !c.is_released()).count()
    }

    /// The next row in original key order.
    ///
    /// Returns `Ok(None)` once every bucket is exhausted, and keeps doing so.
    /// After [`Self::close`] or a failure it returns
    /// [`SpreadError::ScannerClosed`].
    pub fn next_row(&mut self) -> SpreadResult<Option<Row>> {
        match self.state {
            ScanState::Closed => return Err(SpreadError::ScannerClosed),
            ScanState::Exhausted => return Ok(None),
            ScanState::Initializing => {
                self.state = ScanState::Active;
                for slot in 0..self.cursors.len() {
                    self.fill(slot)?;
                }
            }
            ScanState::Active => {
                if let Some(slot) = self.refill.take() {
                    self.fill(slot)?;
                }
            }
        }

        match self.heap.pop() {
            Some(HeapItem { row, slot }) => {
                self.refill = Some(slot);
                Ok(Some(row))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Up to `n` rows. Fewer are returned only at the end of the scan.
    pub fn next_batch(&mut self, n: usize) -> SpreadResult<Vec<Row>> {
        let mut ans = Vec::with_capacity(n.min(1024));
        while ans.len() < n {
            match self.next_row()? {
                Some(row) => ans.push(row),
                None => break,
            }
        }
        Ok(ans)
    }

    /// Release every open sub-scan. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ScanState::Closed {
            return;
        }
        debug!(open = self.open_cursors(), "close merge scan");
        self.release_all();
        self.state = ScanState::Closed;
    }

    fn fill(&mut self, slot: usize) -> SpreadResult<()> {
        match self.cursors[slot].fetch() {
            Ok(Some(row)) => {
                self.heap.push(HeapItem { row, slot });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn abort(&mut self, e: SpreadError) -> SpreadError {
        warn!(bucket = ?e.bucket(), error = %e, "merge scan failed, releasing all cursors");
        ensure_cov::notify_cov("keyspread::scan::MergeScanner::abort");
        self.release_all();
        self.state = ScanState::Closed;
        e
    }

    fn finish(&mut self) {
        debug!(buckets = self.cursors.len(), "merge scan exhausted");
        self.release_all();
        self.state = ScanState::Exhausted;
    }

    fn release_all(&mut self) {
        self.heap.clear();
        self.refill = None;
        for cursor in self.cursors.iter_mut() {
            cursor.release();
        }
    }
}

impl Iterator for MergeScanner<'_> {
    type Item = SpreadResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ScanState::Closed {
            return None;
        }
        self.next_row().transpose()
    }
}

impl Debug for MergeScanner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeScanner")
            .field("state", &self.state)
            .field("cursors", &self.cursors)
            .field("pending", &self.heap.len())
            .finish()
    }
}
