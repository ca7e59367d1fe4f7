use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{ROOM_HEIGHT, ROOM_WIDTH};

/// Position of a chunk (room) on the infinite room grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
        }
    }

    pub const fn is_negative(self) -> bool {
        self.x < 0 || self.y < 0
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cell position inside one chunk, `0..width` by `0..height`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalCoord {
    pub x: u32,
    pub y: u32,
}

impl LocalCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Number of tile cells along each side of a chunk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ChunkDimensions {
    pub width: u32,
    pub height: u32,
}

impl ChunkDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Every local cell, column by column.
    pub fn cells(self) -> impl Iterator<Item = LocalCoord> {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| LocalCoord::new(x, y)))
    }
}

impl Default for ChunkDimensions {
    fn default() -> Self {
        Self::new(ROOM_WIDTH, ROOM_HEIGHT)
    }
}
