use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::coord::{ChunkCoord, ChunkDimensions, LocalCoord};
use crate::core::tile::Tile;

/// A finished room, the unit pushed to the outbound result queue.
///
/// Immutable once produced; whoever drains it owns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedChunk {
    pub coord: ChunkCoord,
    pub dimensions: ChunkDimensions,
    pub tiles: FxHashMap<LocalCoord, Tile>,
}

impl GeneratedChunk {
    /// The terminal answer for coordinates outside the generation policy.
    pub fn empty(coord: ChunkCoord, dimensions: ChunkDimensions) -> Self {
        Self {
            coord,
            dimensions,
            tiles: FxHashMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        self.tiles.get(&LocalCoord::new(x, y))
    }

    pub fn wall_count(&self) -> usize {
        self.tiles.values().filter(|t| t.kind.is_solid()).count()
    }

    /// Row-major `#`/`.` picture of the room; missing cells are blank.
    pub fn render_ascii(&self) -> String {
        let width = self.dimensions.width as usize;
        let mut out = String::with_capacity((width + 1) * self.dimensions.height as usize);
        for y in 0..self.dimensions.height {
            for x in 0..self.dimensions.width {
                out.push(self.tile(x, y).map_or(' ', |t| t.kind.glyph()));
            }
            out.push('\n');
        }
        out
    }
}
