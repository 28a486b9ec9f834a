//! Stable, fast hashing used to derive random seeds.

use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};

/// Hashes a string, e.g. the name of an `RngId`.
pub fn hash_str(data: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_bytes());
    hasher.finish()
}

/// Hashes any `Hash` value with `FxHasher`.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}
