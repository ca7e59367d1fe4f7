//! Core data structures for room generation
//! Contains coordinates, seeds, tiles and the generated chunk type.

pub mod chunk;
pub mod coord;
pub mod seed;
pub mod tile;

// Re-export commonly used types
pub use chunk::GeneratedChunk;
pub use coord::{ChunkCoord, ChunkDimensions, LocalCoord};
pub use seed::{ChunkSeed, WorldSeed, derive_chunk_seed};
pub use tile::{Shape, ShapeId, Tile, TileKind};
