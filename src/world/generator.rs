//! Room generation pipeline
//!
//! seed derivation -> noise (target + sampled neighbours) -> halo ->
//! automaton -> crop -> shape classification.

use rustc_hash::FxHashMap;

use crate::core::chunk::GeneratedChunk;
use crate::core::coord::ChunkCoord;
use crate::core::seed::{WorldSeed, derive_chunk_seed};
use crate::core::tile::Tile;
use crate::utils::settings::GenSettings;
use crate::world::automaton::{AutomatonRules, HaloGrid, smooth};
use crate::world::neighbors::sample_neighbors;
use crate::world::noise::NoiseGenerator;
use crate::world::shape::classify;

/// Single-threaded room generator. Each worker owns one, together with its
/// noise cache.
pub struct RoomGenerator {
    seed: WorldSeed,
    settings: GenSettings,
    noise: NoiseGenerator,
}

impl RoomGenerator {
    pub fn new(seed: WorldSeed, settings: GenSettings) -> Self {
        let noise = NoiseGenerator::new(
            settings.dimensions,
            settings.fill_probability,
            settings.noise_cache_capacity,
        );
        RoomGenerator {
            seed,
            settings,
            noise,
        }
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn settings(&self) -> &GenSettings {
        &self.settings
    }

    pub fn noise(&self) -> &NoiseGenerator {
        &self.noise
    }

    /// Unsmoothed halo of `coord`: its own noise plus the noise of every
    /// sampled neighbour, each drawn from that neighbour's own seed.
    pub fn halo(&mut self, coord: ChunkCoord) -> HaloGrid {
        let mut grid = HaloGrid::new(self.settings.dimensions);
        let home = derive_chunk_seed(self.seed, coord);
        grid.insert(&self.noise.generate(home, (0, 0)));

        for neighbor in sample_neighbors(coord, self.settings.neighbors) {
            let seed = derive_chunk_seed(self.seed, neighbor.coord);
            grid.insert(&self.noise.generate(seed, neighbor.offset));
        }
        grid
    }

    pub fn generate(&mut self, coord: ChunkCoord) -> GeneratedChunk {
        let rules = self.settings.rules;
        self.generate_with(coord, &rules)
    }

    pub fn generate_with(&mut self, coord: ChunkCoord, rules: &AutomatonRules) -> GeneratedChunk {
        if !self.settings.in_bounds(coord) {
            return GeneratedChunk::empty(coord, self.settings.dimensions);
        }

        let grid = smooth(self.halo(coord), rules);
        let mut tiles = FxHashMap::default();
        tiles.reserve(self.settings.dimensions.area());
        for (cell, solid) in grid.crop() {
            let tile = if solid {
                Tile::wall(classify(&grid, cell.x as i32, cell.y as i32))
            } else {
                Tile::FLOOR
            };
            tiles.insert(cell, tile);
        }

        GeneratedChunk {
            coord,
            dimensions: self.settings.dimensions,
            tiles,
        }
    }

    /// Drops memoized noise.
    pub fn release_caches(&mut self) {
        self.noise.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::ChunkDimensions;
    use crate::core::tile::{Shape, TileKind};
    use crate::world::neighbors::NeighborPattern;

    fn settings(w: u32, h: u32) -> GenSettings {
        GenSettings {
            dimensions: ChunkDimensions::new(w, h),
            ..GenSettings::default()
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let seed = WorldSeed::from_text("42");
        let mut a = RoomGenerator::new(seed, settings(10, 10));
        let mut b = RoomGenerator::new(seed, settings(10, 10));

        // Warm one cache with unrelated rooms so cache state differs
        a.generate(ChunkCoord::new(5, 5));
        a.generate(ChunkCoord::new(1, 1));

        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(1, 0), ChunkCoord::new(7, 3)] {
            assert_eq!(a.generate(coord), b.generate(coord));
        }
    }

    #[test]
    fn test_room_has_every_cell() {
        let mut generator = RoomGenerator::new(WorldSeed::new(9), settings(12, 7));
        let room = generator.generate(ChunkCoord::new(2, 3));
        assert_eq!(room.len(), 84);
        for cell in room.dimensions.cells() {
            assert!(room.tiles.contains_key(&cell));
        }
    }

    #[test]
    fn test_negative_and_out_of_bounds_rooms_are_empty() {
        let mut s = settings(10, 10);
        s.world_bounds = Some((4, 4));
        let mut generator = RoomGenerator::new(WorldSeed::new(1), s);
        assert!(generator.generate(ChunkCoord::new(-1, 0)).is_empty());
        assert!(generator.generate(ChunkCoord::new(0, -3)).is_empty());
        assert!(generator.generate(ChunkCoord::new(4, 0)).is_empty());
        assert!(!generator.generate(ChunkCoord::new(3, 3)).is_empty());
    }

    #[test]
    fn test_halo_regions_agree_between_neighbours() {
        let seed = WorldSeed::from_text("seams");
        let mut left = RoomGenerator::new(seed, settings(10, 10));
        let mut right = RoomGenerator::new(seed, settings(10, 10));

        let a = left.halo(ChunkCoord::new(3, 3));
        let b = right.halo(ChunkCoord::new(4, 3));
        assert_eq!(a.room((1, 0)), b.room((0, 0)));
        assert_eq!(b.room((-1, 0)), a.room((0, 0)));
        assert!(a.room((1, 0)).iter().all(|c| c.is_some()));
    }

    #[test]
    fn test_sparse_halo_skips_corners() {
        let mut generator = RoomGenerator::new(WorldSeed::new(3), settings(6, 6));
        let halo = generator.halo(ChunkCoord::new(2, 2));
        assert_eq!(halo.sampled(), 36 * 5);
        assert!(halo.room((1, 1)).iter().all(|c| c.is_none()));

        let mut s = settings(6, 6);
        s.neighbors = NeighborPattern::Full;
        let mut dense = RoomGenerator::new(WorldSeed::new(3), s);
        assert_eq!(dense.halo(ChunkCoord::new(2, 2)).sampled(), 36 * 9);
    }

    #[test]
    fn test_floors_carry_fixed_metadata() {
        let mut generator = RoomGenerator::new(WorldSeed::new(11), settings(20, 20));
        let room = generator.generate(ChunkCoord::new(1, 1));
        for tile in room.tiles.values() {
            if tile.kind == TileKind::Floor {
                assert_eq!(tile.shape, Shape::FULL);
            }
        }
    }

    #[test]
    fn test_zero_passes_keep_raw_noise() {
        let seed = WorldSeed::new(5);
        let mut generator = RoomGenerator::new(seed, settings(8, 8));
        let coord = ChunkCoord::new(1, 2);
        let halo = generator.halo(coord);
        let rules = AutomatonRules {
            passes: 0,
            ..AutomatonRules::default()
        };
        let room = generator.generate_with(coord, &rules);
        for (cell, solid) in halo.crop() {
            assert_eq!(room.tiles[&cell].kind.is_solid(), solid);
        }
    }

    #[test]
    fn test_release_caches() {
        let mut generator = RoomGenerator::new(WorldSeed::new(5), settings(8, 8));
        generator.generate(ChunkCoord::new(1, 1));
        assert_eq!(generator.noise().cached(), 5);
        generator.release_caches();
        assert_eq!(generator.noise().cached(), 0);
    }
}
