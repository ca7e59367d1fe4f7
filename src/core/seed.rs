//! World and chunk seeds
//!
//! A chunk seed is a pure function of the world seed and the chunk
//! coordinate, so any worker can reproduce any chunk's noise (and therefore
//! any neighbor's halo) without talking to other workers.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::coord::ChunkCoord;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Opaque world seed, fixed when the world is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldSeed(u64);

impl WorldSeed {
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Hashes a textual seed (FNV-1a). `"42"` and `WorldSeed::new(42)` are
    /// different worlds.
    pub fn from_text(text: &str) -> Self {
        let mut hash = FNV_OFFSET;
        for byte in text.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(hash)
    }

    /// A random 4-digit textual seed, returned together with its text so it
    /// can be reported back to the user.
    pub fn random() -> (String, Self) {
        let text = rand::thread_rng().gen_range(1000..10000).to_string();
        let seed = Self::from_text(&text);
        (text, seed)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for WorldSeed {
    fn from(seed: u64) -> Self {
        Self::new(seed)
    }
}

impl From<&str> for WorldSeed {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl fmt::Display for WorldSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Seed of a single chunk's noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSeed(u64);

impl ChunkSeed {
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// SplitMix64 finalizer: every input bit affects every output bit.
#[inline]
const fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Derives the seed of `coord` in the world `seed`.
///
/// Defined for every coordinate, negative ones included; whether negative
/// chunks are generated at all is decided by the caller.
pub fn derive_chunk_seed(seed: WorldSeed, coord: ChunkCoord) -> ChunkSeed {
    let packed = ((coord.x as u32 as u64) << 32) | coord.y as u32 as u64;
    ChunkSeed(mix64(mix64(seed.value()) ^ mix64(packed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = WorldSeed::from_text("42");
        let coord = ChunkCoord::new(3, -7);
        assert_eq!(derive_chunk_seed(seed, coord), derive_chunk_seed(seed, coord));
    }

    #[test]
    fn test_neighbouring_coords_are_uncorrelated() {
        let seed = WorldSeed::new(1);
        let a = derive_chunk_seed(seed, ChunkCoord::new(0, 0)).value();
        let b = derive_chunk_seed(seed, ChunkCoord::new(1, 0)).value();
        let c = derive_chunk_seed(seed, ChunkCoord::new(0, 1)).value();

        assert_ne!(a, b);
        assert_ne!(a, c);
        // Roughly half of the bits should flip between adjacent chunks
        let flipped = (a ^ b).count_ones();
        assert!((12..=52).contains(&flipped), "only {flipped} bits differ");
    }

    #[test]
    fn test_axes_are_not_interchangeable() {
        let seed = WorldSeed::new(7);
        assert_ne!(
            derive_chunk_seed(seed, ChunkCoord::new(2, 5)),
            derive_chunk_seed(seed, ChunkCoord::new(5, 2))
        );
    }

    #[test]
    fn test_negative_coords_have_seeds() {
        let seed = WorldSeed::new(7);
        assert_ne!(
            derive_chunk_seed(seed, ChunkCoord::new(-1, 0)),
            derive_chunk_seed(seed, ChunkCoord::new(0, 0))
        );
    }

    #[test]
    fn test_text_seeds() {
        assert_eq!(WorldSeed::from_text("42"), WorldSeed::from("42"));
        assert_ne!(WorldSeed::from_text("42"), WorldSeed::from_text("43"));
        assert_ne!(WorldSeed::from_text("42"), WorldSeed::new(42));

        let (text, seed) = WorldSeed::random();
        assert_eq!(text.len(), 4);
        assert_eq!(seed, WorldSeed::from_text(&text));
    }
}
