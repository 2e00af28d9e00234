use std::fmt::Debug;

use bytes::Bytes;
use keyspread_common::{BucketId, SpreadError, SpreadResult};
use keyspread_kv_store::StoreCursor;
use tracing::trace;

/// One merged row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    bucket: BucketId,
    physical_key: Bytes,
    original_key: Bytes,
    value: Bytes,
}

impl Row {
    pub fn bucket(&self) -> BucketId {
        self.bucket
    }

    /// The key as stored, prefix included
    pub fn physical_key(&self) -> &Bytes {
        &self.physical_key
    }

    pub fn original_key(&self) -> &Bytes {
        &self.original_key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn into_kv(self) -> (Bytes, Bytes) {
        (self.original_key, self.value)
    }
}

/// The sub-scan of one bucket.
///
/// Its pending row, if any, lives in the scanner's heap. The store cursor is
/// released exactly once: when the sub-scan runs dry, when the scanner stops,
/// or on drop.
pub(super) struct MergeCursor<'a> {
    bucket: BucketId,
    prefix_width: usize,
    inner: Box<dyn StoreCursor + 'a>,
    exhausted: bool,
    released: bool,
}

impl<'a> MergeCursor<'a> {
    pub(super) fn new(
        bucket: BucketId,
        prefix_width: usize,
        inner: Box<dyn StoreCursor + 'a>,
    ) -> Self {
        Self {
            bucket,
            prefix_width,
            inner,
            exhausted: false,
            released: false,
        }
    }

    pub(super) fn is_released(&self) -> bool {
        self.released
    }

    /// Pull and decode the next row of this bucket.
    pub(super) fn fetch(&mut self) -> SpreadResult<Option<Row>> {
        if self.exhausted || self.released {
            return Ok(None);
        }

        match self.inner.next_row() {
            Ok(Some((key, value))) => {
                if key.len() < self.prefix_width {
                    return Err(SpreadError::MalformedKey {
                        len: key.len(),
                        prefix_width: self.prefix_width,
                    });
                }
                Ok(Some(Row {
                    bucket: self.bucket,
                    original_key: key.slice(self.prefix_width..),
                    physical_key: key,
                    value,
                }))
            }
            Ok(None) => {
                self.exhausted = true;
                self.release();
                Ok(None)
            }
            Err(e) => Err(SpreadError::store_in_bucket(self.bucket, e)),
        }
    }

    pub(super) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.inner.close();
        trace!(bucket = self.bucket, exhausted = self.exhausted, "released cursor");
    }
}

impl Drop for MergeCursor<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl Debug for MergeCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeCursor")
            .field("bucket", &self.bucket)
            .field("exhausted", &self.exhausted)
            .field("released", &self.released)
            .finish()
    }
}
