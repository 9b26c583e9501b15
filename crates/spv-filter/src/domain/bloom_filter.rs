//! BIP37 Bloom filter
//!
//! INVARIANTS:
//! - No false negatives: once inserted, `contains()` returns true
//! - Geometry (size, hash count) never changes after construction;
//!   growing the filter means building a new one

use bitvec::prelude::*;
use peer_bus::{BloomFlags, FilterLoad};

use super::hash_functions::compute_hash_positions;
use super::parameters::{bip37_parameters, calculate_fpr, estimated_fpr};

/// Bloom filter in the BIP37 wire layout
///
/// Bits are stored LSB-first within each byte, so the raw byte slice is
/// exactly the `filterload` payload.
#[derive(Clone, Debug)]
pub struct BloomFilter {
    bits: BitVec<u8, Lsb0>,
    hash_funcs: u32,
    tweak: u32,
    flags: BloomFlags,
    inserted: usize,
}

impl BloomFilter {
    /// Create an empty filter with explicit geometry
    ///
    /// A zero size is raised to one byte.
    pub fn new(size_bytes: usize, hash_funcs: u32, tweak: u32, flags: BloomFlags) -> Self {
        Self {
            bits: bitvec![u8, Lsb0; 0; size_bytes.max(1) * 8],
            hash_funcs,
            tweak,
            flags,
            inserted: 0,
        }
    }

    /// Create an empty filter sized for `capacity` elements at `target_fpr`
    pub fn for_capacity(capacity: usize, target_fpr: f64, tweak: u32, flags: BloomFlags) -> Self {
        let params = bip37_parameters(capacity, target_fpr);
        Self::new(params.size_bytes, params.hash_count, tweak, flags)
    }

    /// Rebuild a filter from a received `filterload` payload
    ///
    /// The element count is unknown on the receiving side and starts at zero.
    pub fn from_payload(payload: &FilterLoad) -> Self {
        let mut filter = Self::new(payload.size(), payload.hash_funcs, payload.tweak, payload.flags);
        if !payload.data.is_empty() {
            filter.bits = BitVec::from_vec(payload.data.clone());
        }
        filter
    }

    /// Insert an element
    pub fn insert(&mut self, element: &[u8]) {
        for pos in compute_hash_positions(element, self.hash_funcs, self.bits.len(), self.tweak) {
            self.bits.set(pos, true);
        }
        self.inserted += 1;
    }

    /// Test if an element might be in the filter
    ///
    /// `false` is definite; `true` may be a false positive.
    pub fn contains(&self, element: &[u8]) -> bool {
        compute_hash_positions(element, self.hash_funcs, self.bits.len(), self.tweak)
            .iter()
            .all(|&pos| self.bits[pos])
    }

    /// False positive rate at the actual insertion count
    pub fn false_positive_rate(&self) -> f64 {
        calculate_fpr(self.size_bits(), self.inserted, self.hash_funcs)
    }

    /// False positive rate with the small-set floor applied
    pub fn estimated_false_positive_rate(&self) -> f64 {
        estimated_fpr(self.size_bits(), self.hash_funcs, self.inserted)
    }

    /// Serialize into a `filterload` payload
    pub fn to_payload(&self) -> FilterLoad {
        FilterLoad {
            data: self.bits.as_raw_slice().to_vec(),
            hash_funcs: self.hash_funcs,
            tweak: self.tweak,
            flags: self.flags,
        }
    }

    pub fn size_bits(&self) -> usize {
        self.bits.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.bits.len() / 8
    }

    pub fn hash_count(&self) -> u32 {
        self.hash_funcs
    }

    pub fn tweak(&self) -> u32 {
        self.tweak
    }

    pub fn flags(&self) -> BloomFlags {
        self.flags
    }

    /// Number of insertions since construction (duplicates included)
    pub fn elements_inserted(&self) -> usize {
        self.inserted
    }

    /// Get the number of bits set in the filter
    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }
}
