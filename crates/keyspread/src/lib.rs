//! # keyspread
//!
//! Sorted key-value stores shard by key range, so monotonic keys (timestamps,
//! sequence numbers) pile every write onto the last shard. keyspread spreads
//! them by prepending a fixed-width bucket prefix to each key:
//!
//! ```text
//!  original key                     physical key
//!  ┌──────────────────┐            ┌────────┬──────────────────┐
//!  │ 1700000000000100 │  ───────▶  │ bucket │ 1700000000000100 │
//!  └──────────────────┘            │ prefix │                  │
//!                                  └────────┴──────────────────┘
//!                                   1..=4 bytes, big-endian
//! ```
//!
//! - Writers call [`RowKeyDistributor::distributed_key`] (or
//!   [`RowKeyDistributor::put`]) before writing.
//! - Point readers use the same mapping to find the one physical key.
//! - Range readers use [`MergeScanner`], which scans every bucket and merges
//!   the results back into original key order.
//! - Batch jobs that don't need order use [`split::bucket_splits`] to get one
//!   independent work unit per bucket.
//!
//! The bucket count and prefix width are fixed when the distributor is built
//! and must match between every writer and reader of a dataset.
//!
//! ```
//! use bytes::Bytes;
//! use keyspread::{KeyRange, MemKvStore, RowKeyDistributor};
//!
//! let mut store = MemKvStore::new();
//! let distributor = RowKeyDistributor::hash(16).unwrap();
//! for i in 0u32..100 {
//!     distributor
//!         .put(&mut store, &i.to_be_bytes(), Bytes::from_static(b"v"))
//!         .unwrap();
//! }
//!
//! let range = KeyRange::new(Bytes::copy_from_slice(&10u32.to_be_bytes()), Bytes::copy_from_slice(&20u32.to_be_bytes()));
//! let keys: Vec<_> = distributor
//!     .scan(&store, &range)
//!     .unwrap()
//!     .map(|row| row.unwrap().original_key().clone())
//!     .collect();
//! assert_eq!(keys.len(), 10);
//! assert!(keys.windows(2).all(|w| w[0] < w[1]));
//! ```
pub mod config;
pub mod distributor;
pub mod prefix;
pub mod scan;
pub mod split;
pub mod strategy;

pub use config::{JobConf, StrategyConfig};
pub use distributor::RowKeyDistributor;
pub use keyspread_common::{BucketId, KeyRange, SpreadError, SpreadResult, StoreError};
pub use keyspread_kv_store::{MemKvStore, SortedStore, StoreCursor};
pub use prefix::Prefix;
pub use scan::{MergeScanner, Row, ScanState};
pub use strategy::{DistributionStrategy, HashPrefix, KeyHasher, RoundRobinPrefix, Strategy};
