//! Hash functions for the BIP37 Bloom filter
//!
//! Hash function `i` is MurmurHash3 (x86, 32-bit) seeded with
//! `i * 0xFBA4C795 + tweak`, reduced modulo the filter size in bits.

use std::io::Cursor;

/// Seed multiplier from BIP37, chosen so successive hash functions are well separated.
const SEED_MULTIPLIER: u32 = 0xFBA4_C795;

/// MurmurHash3 x86_32 of `element` under `seed`
pub fn murmur_hash(element: &[u8], seed: u32) -> u32 {
    let mut cursor = Cursor::new(element);
    // Reading from an in-memory cursor cannot fail.
    murmur3::murmur3_32(&mut cursor, seed).unwrap_or(0)
}

/// Seed for hash function `index` under `tweak`
pub fn hash_seed(index: u32, tweak: u32) -> u32 {
    index.wrapping_mul(SEED_MULTIPLIER).wrapping_add(tweak)
}

/// Compute the k bit positions of an element in an `m`-bit filter
pub fn compute_hash_positions(element: &[u8], k: u32, m: usize, tweak: u32) -> Vec<usize> {
    if m == 0 {
        return Vec::new();
    }
    (0..k)
        .map(|i| murmur_hash(element, hash_seed(i, tweak)) as usize % m)
        .collect()
}
