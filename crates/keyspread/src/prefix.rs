//! Fixed-width big-endian bucket prefixes.
use keyspread_common::{BucketId, SpreadError, SpreadResult};
use smallvec::SmallVec;

/// Widest supported prefix. A `BucketId` is a `u32`.
pub const MAX_PREFIX_WIDTH: usize = std::mem::size_of::<BucketId>();

pub type Prefix = SmallVec<[u8; MAX_PREFIX_WIDTH]>;

/// How many distinct buckets fit in `prefix_width` bytes
pub fn max_buckets(prefix_width: usize) -> u64 {
    1u64 << (8 * prefix_width.min(MAX_PREFIX_WIDTH))
}

pub(crate) fn check_layout(bucket_count: u32, prefix_width: usize) -> SpreadResult<()> {
    if prefix_width == 0 || prefix_width > MAX_PREFIX_WIDTH {
        return Err(SpreadError::Config(
            format!(
                "prefix width must be within 1..={}, got {}",
                MAX_PREFIX_WIDTH, prefix_width
            )
            .into_boxed_str(),
        ));
    }
    if bucket_count == 0 {
        return Err(SpreadError::Config("bucket count must be positive".into()));
    }
    if u64::from(bucket_count) > max_buckets(prefix_width) {
        return Err(SpreadError::Config(
            format!(
                "{} buckets do not fit in a {}-byte prefix (max {})",
                bucket_count,
                prefix_width,
                max_buckets(prefix_width)
            )
            .into_boxed_str(),
        ));
    }
    Ok(())
}

/// The low `prefix_width` bytes of `bucket`, big-endian.
pub fn encode_prefix(bucket: BucketId, prefix_width: usize) -> Prefix {
    debug_assert!(u64::from(bucket) < max_buckets(prefix_width));
    let be = bucket.to_be_bytes();
    SmallVec::from_slice(&be[MAX_PREFIX_WIDTH - prefix_width..])
}

pub fn decode_prefix(prefix: &[u8]) -> BucketId {
    prefix
        .iter()
        .fold(0, |acc: BucketId, &b| (acc << 8) | BucketId::from(b))
}

/// The smallest prefix of the same width that sorts after every key starting
/// with `prefix`. `None` if `prefix` is all `0xFF`.
pub fn next_prefix(prefix: &[u8]) -> Option<Prefix> {
    let mut ans = Prefix::from_slice(prefix);
    for byte in ans.iter_mut().rev() {
        if *byte == u8::MAX {
            *byte = 0;
        } else {
            *byte += 1;
            return Some(ans);
        }
    }
    None
}
