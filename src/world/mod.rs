//! World generation modules
//! Contains the room pipeline, the workers and the handler that drives them.

pub mod automaton;
pub mod distributor;
pub mod generator;
pub mod loader;
pub mod neighbors;
pub mod noise;
pub mod pool;
pub mod process;
pub mod shape;
pub mod worker;

// Re-export commonly used types
pub use automaton::{AutomatonRules, HaloGrid};
pub use distributor::RoundRobin;
pub use generator::RoomGenerator;
pub use loader::{HandlerState, WorldGenHandler};
pub use neighbors::{NeighborPattern, sample_neighbors};
pub use noise::{NoiseGenerator, NoiseGrid};
pub use pool::{HaltReport, WorkerPool};
pub use process::serve_worker;
pub use worker::{GenerationRequest, Worker};
