use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::core::coord::{ChunkCoord, ChunkDimensions};
use crate::error::{GenError, Result};
use crate::world::automaton::AutomatonRules;
use crate::world::neighbors::NeighborPattern;

/// Which OS primitive backs the worker pool.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolBackend {
    #[default]
    Threads,
    Processes,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenSettings {
    pub dimensions: ChunkDimensions,
    pub rules: AutomatonRules,
    pub fill_probability: f64,
    pub neighbors: NeighborPattern,
    pub noise_cache_capacity: usize,
    /// Requests between two releases of a worker's noise cache.
    pub cache_release_interval: u32,
    pub worker_threads: usize,
    pub worker_processes: usize,
    pub backend: PoolBackend,
    /// Executable run by process workers; defaults to the current binary.
    #[serde(default)]
    pub worker_program: Option<PathBuf>,
    pub halt_timeout: Duration,
    /// Rooms at or past these bounds are generated empty.
    #[serde(default)]
    pub world_bounds: Option<(u32, u32)>,
}

impl Default for GenSettings {
    fn default() -> Self {
        Self {
            dimensions: ChunkDimensions::default(),
            rules: AutomatonRules::default(),
            fill_probability: FILL_PROBABILITY,
            neighbors: NeighborPattern::default(),
            noise_cache_capacity: NOISE_CACHE_CAPACITY,
            cache_release_interval: CACHE_RELEASE_INTERVAL,
            worker_threads: WORKER_THREADS,
            worker_processes: WORKER_PROCESSES,
            backend: PoolBackend::default(),
            worker_program: None,
            halt_timeout: HALT_TIMEOUT,
            world_bounds: None,
        }
    }
}

impl GenSettings {
    /// Worker count for the configured backend.
    pub fn worker_count(&self) -> usize {
        match self.backend {
            PoolBackend::Threads => self.worker_threads,
            PoolBackend::Processes => self.worker_processes,
        }
    }

    /// Whether `coord` is generated at all. Everything else yields an empty
    /// room.
    pub fn in_bounds(&self, coord: ChunkCoord) -> bool {
        if coord.is_negative() {
            return false;
        }
        match self.world_bounds {
            Some((w, h)) => (coord.x as u32) < w && (coord.y as u32) < h,
            None => true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.width == 0 || self.dimensions.height == 0 {
            return Err(GenError::InvalidSettings(
                "room dimensions must be non-zero".to_string(),
            ));
        }
        // The halo spans 3x3 rooms and is indexed with i32
        let halo_cells = self.dimensions.area().checked_mul(9);
        if halo_cells.is_none_or(|cells| cells > i32::MAX as usize) {
            return Err(GenError::InvalidSettings(format!(
                "room dimensions {}x{} too large",
                self.dimensions.width, self.dimensions.height
            )));
        }
        if !(0.0..=1.0).contains(&self.fill_probability) {
            return Err(GenError::InvalidSettings(format!(
                "fill probability {} outside [0, 1]",
                self.fill_probability
            )));
        }
        if self.noise_cache_capacity == 0 {
            return Err(GenError::InvalidSettings(
                "noise cache capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn save_settings(path: &Path, settings: &GenSettings) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, settings)?;
    writer.flush()?;
    Ok(())
}

pub fn load_settings(path: &Path) -> Result<GenSettings> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let settings: GenSettings = bincode::deserialize_from(&mut reader)?;
    settings.validate()?;
    Ok(settings)
}
