//! # Sorted store interface
//!
//! keyspread never talks to a storage engine directly. Everything it needs from
//! the backing store is captured by [`SortedStore`]:
//!
//! - exact-key point reads and writes (`get` / `put`)
//! - half-open byte-range scans `[start, stop)` returning a [`StoreCursor`]
//!
//! Keys are compared as raw bytes, lexicographically. A store must return the
//! rows of a scan in ascending key order and must only return keys inside the
//! requested range.
//!
//! A cursor is a live resource on the store side (a region scanner, a socket,
//! a snapshot). It must be released with [`StoreCursor::close`], which has to be
//! idempotent: keyspread guarantees one close per cursor, but wrappers and
//! `Drop` impls may call it again.
//!
//! [`MemKvStore`] is an in-memory implementation backed by a `BTreeMap`.
pub mod cursor;
pub mod mem_store;

use bytes::Bytes;
use keyspread_common::StoreError;

pub use cursor::{IterCursor, StoreCursor};
pub use mem_store::MemKvStore;

pub trait SortedStore {
    /// Open a cursor over `[start, stop)`. `stop == None` scans to the end of
    /// the key space.
    fn scan(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
    ) -> Result<Box<dyn StoreCursor + '_>, StoreError>;

    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    fn put(&mut self, key: &[u8], value: Bytes) -> Result<(), StoreError>;
}
