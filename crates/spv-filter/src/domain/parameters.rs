//! Bloom filter parameter math
//!
//! FPR = (1 - e^(-kn/m))^k
//!
//! Sizing follows BIP37 so peers accept the filter:
//! - bytes = floor(-n*ln(fpr) / (ln(2)^2) / 8), capped at 36,000
//! - k = floor(m/n * ln(2)), clamped to 1..=50

use std::f64::consts::LN_2;

/// Largest filter a BIP37 peer accepts, in bytes.
pub const MAX_FILTER_BYTES: usize = 36_000;

/// Largest hash function count a BIP37 peer accepts.
pub const MAX_HASH_FUNCS: u32 = 50;

/// Smallest hash function count.
pub const MIN_HASH_FUNCS: u32 = 1;

/// Floor applied to the element count for sizing and estimation, so
/// near-empty filters are neither tiny nor reported as optimistic.
pub const MIN_ESTIMATE_ELEMENTS: usize = 100;

/// Bloom filter parameters
#[derive(Clone, Debug, PartialEq)]
pub struct BloomFilterParams {
    /// Filter size in bytes
    pub size_bytes: usize,
    /// Number of hash functions
    pub hash_count: u32,
    /// Expected false positive rate at the sizing capacity
    pub expected_fpr: f64,
}

impl BloomFilterParams {
    /// Filter size in bits
    pub fn size_bits(&self) -> usize {
        self.size_bytes * 8
    }
}

/// Calculate BIP37 filter parameters for `num_elements` at `target_fpr`.
///
/// Rounds down like the reference client, so a filter built here has the
/// same geometry as one built by any other BIP37 implementation.
pub fn bip37_parameters(num_elements: usize, target_fpr: f64) -> BloomFilterParams {
    let n = num_elements.max(1) as f64;
    let ln2_squared = LN_2 * LN_2;

    let bits = -n * target_fpr.ln() / ln2_squared;
    let size_bytes = ((bits / 8.0).floor() as usize).clamp(1, MAX_FILTER_BYTES);

    let k = ((size_bytes * 8) as f64 / n * LN_2).floor() as u32;
    let hash_count = k.clamp(MIN_HASH_FUNCS, MAX_HASH_FUNCS);

    BloomFilterParams {
        size_bytes,
        hash_count,
        expected_fpr: calculate_fpr(size_bytes * 8, num_elements, hash_count),
    }
}

/// Calculate the false positive rate for given parameters
///
/// Formula: FPR = (1 - e^(-kn/m))^k
pub fn calculate_fpr(m: usize, n: usize, k: u32) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}

/// Estimated false positive rate of a live filter, with the element floor applied
pub fn estimated_fpr(m: usize, k: u32, inserted: usize) -> f64 {
    calculate_fpr(m, inserted.max(MIN_ESTIMATE_ELEMENTS), k)
}

/// Resize rule: the estimate has drifted at least `threshold * target` above target.
pub fn exceeds_threshold(estimate: f64, target: f64, threshold: f64) -> bool {
    estimate - target >= threshold * target
}
