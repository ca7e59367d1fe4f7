//! Cave smoothing with a B678/S345678 cellular automaton
//!
//! The automaton runs over a halo grid: the target room plus the sampled
//! neighbour rooms, all in the target's coordinate frame. Cells of rooms
//! that were not sampled are absent and never count as neighbours.

use serde::{Deserialize, Serialize};

use crate::constants::{AUTOMATON_PASSES, BIRTH_THRESHOLD, SURVIVAL_THRESHOLD};
use crate::core::coord::{ChunkDimensions, LocalCoord};
use crate::world::noise::NoiseGrid;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct AutomatonRules {
    pub passes: u32,
    /// A solid cell with fewer solid neighbours than this becomes empty.
    pub survival_min: u8,
    /// Any cell with at least this many solid neighbours becomes solid.
    pub birth_min: u8,
}

impl AutomatonRules {
    #[inline]
    pub fn next_state(&self, solid: bool, neighbors: u8) -> bool {
        if solid && neighbors < self.survival_min {
            false
        } else if neighbors >= self.birth_min {
            true
        } else {
            solid
        }
    }
}

impl Default for AutomatonRules {
    fn default() -> Self {
        Self {
            passes: AUTOMATON_PASSES,
            survival_min: SURVIVAL_THRESHOLD,
            birth_min: BIRTH_THRESHOLD,
        }
    }
}

/// Target room plus its halo, spanning one room in every direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HaloGrid {
    dimensions: ChunkDimensions,
    cells: Vec<Option<bool>>,
}

impl HaloGrid {
    pub fn new(dimensions: ChunkDimensions) -> Self {
        Self {
            dimensions,
            cells: vec![None; dimensions.area() * 9],
        }
    }

    pub fn dimensions(&self) -> ChunkDimensions {
        self.dimensions
    }

    fn stride(&self) -> i32 {
        self.dimensions.width as i32 * 3
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let w = self.dimensions.width as i32;
        let h = self.dimensions.height as i32;
        if x < -w || x >= 2 * w || y < -h || y >= 2 * h {
            return None;
        }
        Some(((y + h) * self.stride() + (x + w)) as usize)
    }

    fn position(&self, index: usize) -> (i32, i32) {
        let stride = self.stride() as usize;
        (
            (index % stride) as i32 - self.dimensions.width as i32,
            (index / stride) as i32 - self.dimensions.height as i32,
        )
    }

    /// Copies a noise grid into the halo. Cells outside the halo frame are
    /// ignored.
    pub fn insert(&mut self, noise: &NoiseGrid) {
        for ((x, y), solid) in noise.iter() {
            if let Some(i) = self.index(x, y) {
                self.cells[i] = Some(solid);
            }
        }
    }

    /// `None` when `(x, y)` was never sampled or lies outside the frame.
    pub fn get(&self, x: i32, y: i32) -> Option<bool> {
        self.index(x, y).and_then(|i| self.cells[i])
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == Some(true)
    }

    pub fn solid_neighbors(&self, x: i32, y: i32) -> u8 {
        let mut count = 0;
        for dx in -1..=1 {
            for dy in -1..=1 {
                if (dx != 0 || dy != 0) && self.is_solid(x + dx, y + dy) {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn sampled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn solid(&self) -> usize {
        self.cells.iter().filter(|c| **c == Some(true)).count()
    }

    /// Cells of the room `offset` rooms away from the target, column-major.
    pub fn room(&self, offset: (i32, i32)) -> Vec<Option<bool>> {
        let ox = offset.0 * self.dimensions.width as i32;
        let oy = offset.1 * self.dimensions.height as i32;
        self.dimensions
            .cells()
            .map(|c| self.get(ox + c.x as i32, oy + c.y as i32))
            .collect()
    }

    /// The target room's own cells; the halo never leaves this grid.
    pub fn crop(&self) -> impl Iterator<Item = (LocalCoord, bool)> + '_ {
        self.dimensions
            .cells()
            .map(|c| (c, self.is_solid(c.x as i32, c.y as i32)))
    }
}

/// Runs `rules.passes` synchronous passes: every pass reads only the state
/// left by the previous one.
pub fn smooth(mut grid: HaloGrid, rules: &AutomatonRules) -> HaloGrid {
    let mut next = grid.cells.clone();
    for _ in 0..rules.passes {
        for (i, cell) in grid.cells.iter().enumerate() {
            let Some(solid) = *cell else { continue };
            let (x, y) = grid.position(i);
            next[i] = Some(rules.next_state(solid, grid.solid_neighbors(x, y)));
        }
        std::mem::swap(&mut grid.cells, &mut next);
    }
    grid
}
