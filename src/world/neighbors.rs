//! Neighbour sampling for halo stitching
//!
//! The default pattern samples only the four orthogonal neighbours of a
//! room. Dense sampling doubles the noise work per room and changes the
//! output near corners, so it has to be chosen explicitly.

use serde::{Deserialize, Serialize};

use crate::core::coord::ChunkCoord;

const ORTHOGONAL: [(i32, i32); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const DIAGONAL: [(i32, i32); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const FULL: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Which surrounding rooms contribute noise to a room's halo.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum NeighborPattern {
    /// W, N, S, E only.
    #[default]
    Orthogonal,
    /// The four corner rooms only.
    Diagonal,
    /// All eight surrounding rooms.
    Full,
}

impl NeighborPattern {
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            NeighborPattern::Orthogonal => &ORTHOGONAL,
            NeighborPattern::Diagonal => &DIAGONAL,
            NeighborPattern::Full => &FULL,
        }
    }
}

/// One sampled neighbour: where it sits relative to the target and which
/// room it is.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NeighborSample {
    pub index: usize,
    pub offset: (i32, i32),
    pub coord: ChunkCoord,
}

pub fn sample_neighbors(coord: ChunkCoord, pattern: NeighborPattern) -> Vec<NeighborSample> {
    pattern
        .offsets()
        .iter()
        .enumerate()
        .map(|(index, &(dx, dy))| NeighborSample {
            index,
            offset: (dx, dy),
            coord: coord.offset(dx, dy),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orthogonal_is_sparse() {
        let samples = sample_neighbors(ChunkCoord::new(4, 4), NeighborPattern::Orthogonal);
        assert_eq!(samples.len(), 4);
        for s in &samples {
            assert_eq!(s.offset.0.abs() + s.offset.1.abs(), 1);
            assert_eq!(s.coord, ChunkCoord::new(4 + s.offset.0, 4 + s.offset.1));
        }
    }

    #[test]
    fn test_patterns_partition_the_ring() {
        let mut union: Vec<_> = NeighborPattern::Orthogonal
            .offsets()
            .iter()
            .chain(NeighborPattern::Diagonal.offsets())
            .copied()
            .collect();
        union.sort();
        let mut full = NeighborPattern::Full.offsets().to_vec();
        full.sort();
        assert_eq!(union, full);
        assert!(!full.contains(&(0, 0)));
    }

    #[test]
    fn test_origin_neighbours_can_be_negative() {
        let samples = sample_neighbors(ChunkCoord::new(0, 0), NeighborPattern::Orthogonal);
        assert!(samples.iter().any(|s| s.coord == ChunkCoord::new(-1, 0)));
        assert!(samples.iter().any(|s| s.coord == ChunkCoord::new(0, -1)));
    }
}
