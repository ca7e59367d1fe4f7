// Core module with fundamental types
pub mod core;

// World module with generation, workers and the handler
pub mod world;

// Settings persistence
pub mod utils;

// Other modules
pub mod constants;
pub mod error;

// Re-exports
pub use constants::*;
pub use core::{ChunkCoord, ChunkDimensions, GeneratedChunk, LocalCoord, Shape, ShapeId, Tile, TileKind, WorldSeed};
pub use error::{GenError, Result};
pub use utils::{GenSettings, PoolBackend};
pub use world::{GenerationRequest, HaltReport, HandlerState, RoomGenerator, WorldGenHandler};
