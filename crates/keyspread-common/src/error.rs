use thiserror::Error;

use crate::BucketId;

pub type SpreadResult<T> = Result<T, SpreadError>;

#[derive(Error, Debug)]
pub enum SpreadError {
    #[error("Invalid distributor configuration ({0})")]
    Config(Box<str>),
    #[error("Physical key of {len} bytes is shorter than the {prefix_width}-byte bucket prefix")]
    MalformedKey { len: usize, prefix_width: usize },
    #[error("Store failure{}: {source}", fmt_bucket(.bucket))]
    Store {
        bucket: Option<BucketId>,
        #[source]
        source: StoreError,
    },
    #[error("The scanner is closed")]
    ScannerClosed,
}

impl SpreadError {
    pub fn store_in_bucket(bucket: BucketId, source: StoreError) -> Self {
        SpreadError::Store {
            bucket: Some(bucket),
            source,
        }
    }

    /// The bucket whose sub-scan failed, if the failure is tied to one.
    pub fn bucket(&self) -> Option<BucketId> {
        match self {
            SpreadError::Store { bucket, .. } => *bucket,
            _ => None,
        }
    }
}

fn fmt_bucket(bucket: &Option<BucketId>) -> String {
    match bucket {
        Some(b) => format!(" in bucket {}", b),
        None => String::new(),
    }
}

/// Errors raised by the backing sorted store.
///
/// The store client owns retry policy; by the time one of these reaches
/// keyspread it is final.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection lost ({0})")]
    ConnectionLost(Box<str>),
    #[error("Timed out ({0})")]
    Timeout(Box<str>),
    #[error("Shard unavailable ({0})")]
    ShardUnavailable(Box<str>),
    #[error("Unknown store error ({0})")]
    Unknown(Box<str>),
}

impl From<StoreError> for SpreadError {
    fn from(source: StoreError) -> Self {
        SpreadError::Store {
            bucket: None,
            source,
        }
    }
}

impl From<serde_json::Error> for SpreadError {
    fn from(e: serde_json::Error) -> Self {
        SpreadError::Config(format!("Failed to decode distributor params: {}", e).into_boxed_str())
    }
}
