//! Deterministic sub-seed derivation.
//!
//! Every replicate gets its own RNG seeded from
//! `(master seed, combination index, replicate index)`. The derivation never
//! depends on scheduling order, so a run is reproducible for any number of
//! workers.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// SplitMix64 finalizer.
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive the sub-seed for one replicate of one grid combination.
pub fn derive_replicate_seed(
    master_seed: u64,
    combination_index: usize,
    replicate_index: usize,
) -> u64 {
    let combination = mix(mix(master_seed) ^ combination_index as u64);
    mix(combination ^ (replicate_index as u64).rotate_left(32))
}

/// Seeded RNG for one replicate.
pub fn replicate_rng(master_seed: u64, combination_index: usize, replicate_index: usize) -> StdRng {
    StdRng::seed_from_u64(derive_replicate_seed(
        master_seed,
        combination_index,
        replicate_index,
    ))
}
