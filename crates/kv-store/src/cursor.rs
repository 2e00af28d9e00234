use std::fmt::Debug;

use bytes::Bytes;
use keyspread_common::StoreError;

/// A forward cursor over one range scan.
pub trait StoreCursor {
    /// The next row in ascending key order, or `None` once the range is done.
    ///
    /// A closed cursor yields `None`.
    fn next_row(&mut self) -> Result<Option<(Bytes, Bytes)>, StoreError>;

    /// Release the underlying scan. Calling it more than once is a no-op.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Adapts any ordered `(key, value)` iterator into a [`StoreCursor`].
///
/// Closing drops the iterator, so borrowed state is released right away.
pub struct IterCursor<I> {
    iter: Option<I>,
}

impl<I> IterCursor<I>
where
    I: Iterator<Item = (Bytes, Bytes)>,
{
    pub fn new(iter: I) -> Self {
        Self { iter: Some(iter) }
    }
}

impl<I> Debug for IterCursor<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterCursor")
            .field("closed", &self.iter.is_none())
            .finish()
    }
}

impl<I> StoreCursor for IterCursor<I>
where
    I: Iterator<Item = (Bytes, Bytes)>,
{
    fn next_row(&mut self) -> Result<Option<(Bytes, Bytes)>, StoreError> {
        Ok(self.iter.as_mut().and_then(|iter| iter.next()))
    }

    fn close(&mut self) {
        self.iter = None;
    }

    fn is_closed(&self) -> bool {
        self.iter.is_none()
    }
}
