//! Wall shape classification
//!
//! Purely cosmetic: picks the wall piece a renderer should draw from the
//! wall's N, E, S and W neighbours. Never feeds back into generation.

use crate::core::tile::{Shape, ShapeId};
use crate::world::automaton::HaloGrid;

/// Occupancy as `[north, east, south, west]`, with north at `y - 1`.
pub type Occupancy = [bool; 4];

const T: bool = true;
const F: bool = false;

pub const SHAPE_PATTERNS: [(Occupancy, Shape); 16] = [
    ([T, T, T, T], Shape::new(ShapeId::Full, 0)),
    // Wedge
    ([T, T, F, F], Shape::new(ShapeId::Wedge, 0)),
    ([T, F, F, T], Shape::new(ShapeId::Wedge, 1)),
    ([F, F, T, T], Shape::new(ShapeId::Wedge, 2)),
    ([F, T, T, F], Shape::new(ShapeId::Wedge, 3)),
    // Sided
    ([T, T, F, T], Shape::new(ShapeId::Sided, 0)),
    ([T, F, T, T], Shape::new(ShapeId::Sided, 1)),
    ([F, T, T, T], Shape::new(ShapeId::Sided, 2)),
    ([T, T, T, F], Shape::new(ShapeId::Sided, 3)),
    // Tube
    ([T, F, T, F], Shape::new(ShapeId::Tube, 0)),
    ([F, T, F, T], Shape::new(ShapeId::Tube, 1)),
    // Pointy
    ([T, F, F, F], Shape::new(ShapeId::Pointy, 0)),
    ([F, F, F, T], Shape::new(ShapeId::Pointy, 1)),
    ([F, F, T, F], Shape::new(ShapeId::Pointy, 2)),
    ([F, T, F, F], Shape::new(ShapeId::Pointy, 3)),
    // Pillar
    ([F, F, F, F], Shape::new(ShapeId::Pillar, 0)),
];

/// Looks up an occupancy pattern, falling back to an unrotated full wall.
pub fn shape_for(occupancy: Occupancy) -> Shape {
    SHAPE_PATTERNS
        .iter()
        .find(|(pattern, _)| *pattern == occupancy)
        .map_or(Shape::FULL, |(_, shape)| *shape)
}

pub fn occupancy(grid: &HaloGrid, x: i32, y: i32) -> Occupancy {
    [
        grid.is_solid(x, y - 1),
        grid.is_solid(x + 1, y),
        grid.is_solid(x, y + 1),
        grid.is_solid(x - 1, y),
    ]
}

pub fn classify(grid: &HaloGrid, x: i32, y: i32) -> Shape {
    shape_for(occupancy(grid, x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::{ChunkCoord, ChunkDimensions};
    use crate::core::seed::{WorldSeed, derive_chunk_seed};
    use crate::world::noise::NoiseGenerator;

    fn all_patterns() -> impl Iterator<Item = Occupancy> {
        (0u8..16).map(|bits| [bits & 8 != 0, bits & 4 != 0, bits & 2 != 0, bits & 1 != 0])
    }

    #[test]
    fn test_table_is_total_and_unique() {
        for pattern in all_patterns() {
            let hits = SHAPE_PATTERNS.iter().filter(|(p, _)| *p == pattern).count();
            assert_eq!(hits, 1, "pattern {pattern:?} listed {hits} times");
        }
    }

    #[test]
    fn test_every_pattern_has_a_valid_shape() {
        for pattern in all_patterns() {
            let shape = shape_for(pattern);
            assert!((1..=6).contains(&shape.id.id()));
            assert!(shape.rotation < 4);
        }
    }

    #[test]
    fn test_known_shapes() {
        assert_eq!(shape_for([T, T, T, T]), Shape::FULL);
        assert_eq!(shape_for([F, F, F, F]).id, ShapeId::Pillar);
        assert_eq!(shape_for([T, F, T, F]).id, ShapeId::Tube);
        assert_eq!(shape_for([F, T, F, T]), Shape::new(ShapeId::Tube, 1));
    }

    #[test]
    fn test_occupancy_reads_compass_directions() {
        let dims = ChunkDimensions::new(4, 4);
        let mut noise = NoiseGenerator::new(dims, 1.0, 1);
        let mut grid = HaloGrid::new(dims);
        let seed = derive_chunk_seed(WorldSeed::new(0), ChunkCoord::new(0, 0));
        grid.insert(&noise.generate(seed, (0, 0)));

        // Corner of a fully solid room with nothing sampled around it
        assert_eq!(occupancy(&grid, 0, 0), [F, T, T, F]);
        assert_eq!(classify(&grid, 0, 0), Shape::new(ShapeId::Wedge, 3));
        assert_eq!(classify(&grid, 1, 1), Shape::FULL);
    }
}
