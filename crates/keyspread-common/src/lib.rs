use bytes::Bytes;

mod error;

pub use error::{SpreadError, SpreadResult, StoreError};

/// Index of a bucket in `[0, bucket_count)`.
pub type BucketId = u32;

/// A logical key range `[start, stop)`.
///
/// Both bounds are optional. An empty bound means the same thing as a missing
/// one, so `KeyRange::new(b"", b"")` scans everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    start: Option<Bytes>,
    stop: Option<Bytes>,
}

impl KeyRange {
    pub fn new(start: impl Into<Bytes>, stop: impl Into<Bytes>) -> Self {
        Self::default().with_start(start).with_stop(stop)
    }

    /// The whole key space.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_start(start: impl Into<Bytes>) -> Self {
        Self::default().with_start(start)
    }

    pub fn until(stop: impl Into<Bytes>) -> Self {
        Self::default().with_stop(stop)
    }

    pub fn with_start(mut self, start: impl Into<Bytes>) -> Self {
        let start = start.into();
        self.start = (!start.is_empty()).then_some(start);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<Bytes>) -> Self {
        let stop = stop.into();
        self.stop = (!stop.is_empty()).then_some(stop);
        self
    }

    /// Inclusive lower bound, `None` when unbounded.
    pub fn start(&self) -> Option<&[u8]> {
        self.start.as_deref()
    }

    /// Exclusive upper bound, `None` when unbounded.
    pub fn stop(&self) -> Option<&[u8]> {
        self.stop.as_deref()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.start().map_or(true, |s| key >= s) && self.stop().map_or(true, |s| key < s)
    }
}
