use std::time::Duration;

// Room constants
pub const ROOM_WIDTH: u32 = 45;
pub const ROOM_HEIGHT: u32 = 45;
pub const FILL_PROBABILITY: f64 = 0.5;

// Cellular automaton (B678/S345678)
pub const AUTOMATON_PASSES: u32 = 6;
pub const SURVIVAL_THRESHOLD: u8 = 3;
pub const BIRTH_THRESHOLD: u8 = 6;

// Cache constants
pub const NOISE_CACHE_CAPACITY: usize = 20;
pub const CACHE_RELEASE_INTERVAL: u32 = 60;

// Worker pool constants
pub const WORKER_THREADS: usize = 5;
pub const WORKER_PROCESSES: usize = 4;
pub const HALT_TIMEOUT: Duration = Duration::from_secs(2);
pub const WORKER_SUBCOMMAND: &str = "worker";
