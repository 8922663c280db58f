//! Deterministic bucket assignment.
//!
//! A key is hashed with 64-bit FNV-1a over its UTF-8 bytes and reduced
//! modulo the shard count:
//!
//! ```text
//! h = 0xcbf29ce484222325
//! for byte in key: h = (h ^ byte) * 0x100000001b3   (wrapping, mod 2^64)
//! bucket = h mod shard_count                         (unsigned)
//! ```
//!
//! The result depends only on `(key, shard_count)`, so every thread and every
//! run (in any implementation following the formula above) agrees on it.

use crate::dataset::DatasetType;
use crate::error::ConfigError;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// FNV-1a 64-bit offset basis.
pub const FNV1A64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64-bit prime.
pub const FNV1A64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a of `bytes`.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = FNV1A64_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV1A64_PRIME);
    }
    hash
}

/// Bucket in `[0, shard_count)` for `key`.
///
/// # Panics
/// Panics if `shard_count` is zero. Shard counts are validated at startup,
/// so this only fires on a programming error.
#[must_use]
pub fn assign_bucket(key: &str, shard_count: usize) -> usize {
    assert!(shard_count > 0, "shard count must be non-zero");
    // The remainder is < shard_count, which fits in usize.
    (fnv1a_64(key.as_bytes()) % shard_count as u64) as usize
}

/// A validated shard count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partitioner {
    shards: NonZeroUsize,
}

impl Partitioner {
    /// # Errors
    /// [`ConfigError::ZeroShardCount`] if `shard_count` is zero.
    pub fn new(shard_count: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(shard_count)
            .map(|shards| Self { shards })
            .ok_or(ConfigError::ZeroShardCount)
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.get()
    }

    #[must_use]
    pub fn bucket(&self, key: &str) -> usize {
        assign_bucket(key, self.shards.get())
    }
}

/// `<output>/<bucket:05>`
#[must_use]
pub fn shard_dir(output_dir: &Path, bucket: usize) -> PathBuf {
    output_dir.join(format!("{bucket:05}"))
}

/// `<output>/<bucket:05>/<dataset name>`
#[must_use]
pub fn shard_path(output_dir: &Path, bucket: usize, dataset: DatasetType) -> PathBuf {
    shard_dir(output_dir, bucket).join(dataset.name())
}
