//! Seeded boolean noise for one room
//!
//! Each room's noise depends on nothing but its chunk seed, which is what
//! lets two workers agree on a shared border without talking to each other.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constants::FILL_PROBABILITY;
use crate::core::coord::ChunkDimensions;
use crate::core::seed::ChunkSeed;

/// One room's worth of noise, placed at `offset` rooms away from the target
/// room in the target's coordinate frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoiseGrid {
    origin: (i32, i32),
    dimensions: ChunkDimensions,
    // Column-major, matching the order the samples are drawn in
    cells: Vec<bool>,
}

impl NoiseGrid {
    pub fn origin(&self) -> (i32, i32) {
        self.origin
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dimensions
    }

    /// Noise at `(x, y)` in the shared frame, `None` outside this grid.
    pub fn get(&self, x: i32, y: i32) -> Option<bool> {
        let lx = x - self.origin.0;
        let ly = y - self.origin.1;
        if !self.dimensions.contains(lx, ly) {
            return None;
        }
        Some(self.cells[lx as usize * self.dimensions.height as usize + ly as usize])
    }

    pub fn iter(&self) -> impl Iterator<Item = ((i32, i32), bool)> + '_ {
        let (ox, oy) = self.origin;
        self.dimensions
            .cells()
            .zip(self.cells.iter())
            .map(move |(cell, &solid)| ((ox + cell.x as i32, oy + cell.y as i32), solid))
    }

    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Memoizing noise source, owned by a single worker.
pub struct NoiseGenerator {
    dimensions: ChunkDimensions,
    fill_probability: f64,
    cache: LruCache<(ChunkSeed, (i32, i32)), Arc<NoiseGrid>>,
    misses: u64,
}

impl NoiseGenerator {
    pub fn new(dimensions: ChunkDimensions, fill_probability: f64, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let fill_probability = if fill_probability.is_nan() {
            FILL_PROBABILITY
        } else {
            fill_probability.clamp(0.0, 1.0)
        };
        Self {
            dimensions,
            fill_probability,
            cache: LruCache::new(capacity),
            misses: 0,
        }
    }

    /// Noise of the room seeded by `seed`, shifted by `offset` whole rooms.
    pub fn generate(&mut self, seed: ChunkSeed, offset: (i32, i32)) -> Arc<NoiseGrid> {
        if let Some(grid) = self.cache.get(&(seed, offset)) {
            return Arc::clone(grid);
        }

        self.misses += 1;
        let grid = Arc::new(self.draw(seed, offset));
        self.cache.put((seed, offset), Arc::clone(&grid));
        grid
    }

    fn draw(&self, seed: ChunkSeed, offset: (i32, i32)) -> NoiseGrid {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.value());
        let cells = (0..self.dimensions.area())
            .map(|_| rng.gen_bool(self.fill_probability))
            .collect();

        NoiseGrid {
            origin: (
                offset.0 * self.dimensions.width as i32,
                offset.1 * self.dimensions.height as i32,
            ),
            dimensions: self.dimensions,
            cells,
        }
    }

    /// Drops every memoized grid.
    pub fn release(&mut self) {
        self.cache.clear();
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of grids actually drawn (cache misses).
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
