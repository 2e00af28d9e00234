use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;
use keyspread_common::StoreError;
use tracing::trace;

use crate::{IterCursor, SortedStore, StoreCursor};

/// An in-memory sorted store.
///
/// Rows live in a single `BTreeMap`, so scans see a consistent view for as
/// long as the cursor borrows the store.
#[derive(Debug, Clone, Default)]
pub struct MemKvStore {
    table: BTreeMap<Bytes, Bytes>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.table.get(key).cloned()
    }

    pub fn set(&mut self, key: &[u8], value: Bytes) {
        self.table.insert(Bytes::copy_from_slice(key), value);
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.table.remove(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.table.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Total bytes of keys and values
    pub fn size(&self) -> usize {
        self.table.iter().fold(0, |acc, (k, v)| acc + k.len() + v.len())
    }

    pub fn range(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> impl DoubleEndedIterator<Item = (Bytes, Bytes)> + '_ {
        // `BTreeMap::range` panics on inverted bounds
        let inverted = match (start, end) {
            (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => {
                s > e
                    || (s == e
                        && matches!((start, end), (Bound::Excluded(_), Bound::Excluded(_))))
            }
            _ => false,
        };
        let iter = (!inverted).then(|| {
            self.table
                .range::<[u8], _>((start, end))
                .map(|(k, v)| (k.clone(), v.clone()))
        });
        iter.into_iter().flatten()
    }
}

impl SortedStore for MemKvStore {
    fn scan(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
    ) -> Result<Box<dyn StoreCursor + '_>, StoreError> {
        trace!(?start, ?stop, "open mem scan");
        let end = stop.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(Box::new(IterCursor::new(
            self.range(Bound::Included(start), end),
        )))
    }

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        Ok(MemKvStore::get(self, key))
    }

    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), StoreError> {
        self.set(key, value);
        Ok(())
    }
}
