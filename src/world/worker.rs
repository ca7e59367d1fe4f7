//! A single generation worker
//!
//! Workers never talk to each other. Everything neighbouring rooms must
//! agree on comes from the pure seed and noise functions.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::chunk::GeneratedChunk;
use crate::core::coord::ChunkCoord;
use crate::core::seed::WorldSeed;
use crate::utils::settings::GenSettings;
use crate::world::automaton::AutomatonRules;
use crate::world::generator::RoomGenerator;

/// A room to generate, optionally with the automaton rules in effect.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub coord: ChunkCoord,
    pub rules: Option<AutomatonRules>,
}

impl GenerationRequest {
    pub fn new(coord: ChunkCoord) -> Self {
        Self { coord, rules: None }
    }

    pub fn with_rules(coord: ChunkCoord, rules: AutomatonRules) -> Self {
        Self {
            coord,
            rules: Some(rules),
        }
    }
}

impl From<ChunkCoord> for GenerationRequest {
    fn from(coord: ChunkCoord) -> Self {
        Self::new(coord)
    }
}

/// A request handed back by a worker that can no longer serve it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Returned {
    pub worker: usize,
    pub request: GenerationRequest,
}

/// Gives `request` back to the dispatcher. Fails silently once the
/// dispatcher is gone, which only happens while halting.
pub(crate) fn give_back(worker: usize, request: GenerationRequest, returned: &Sender<Returned>) {
    returned.send(Returned { worker, request }).ok();
}

/// Feeds the inbox through `handle` until the inbox is closed and drained.
///
/// A panic in `handle` retires the worker: the failed request and
/// everything queued after it go back on `returned`. Returns whether the
/// worker crashed.
pub(crate) fn serve_inbox<F>(
    id: usize,
    inbox: &Receiver<GenerationRequest>,
    outbox: &Sender<GeneratedChunk>,
    returned: &Sender<Returned>,
    mut handle: F,
) -> bool
where
    F: FnMut(GenerationRequest) -> Option<GeneratedChunk>,
{
    for request in inbox.iter() {
        match panic::catch_unwind(AssertUnwindSafe(|| handle(request))) {
            Ok(Some(chunk)) => {
                if outbox.send(chunk).is_err() {
                    tracing::debug!("worker {}: result queue closed", id);
                    return false;
                }
            }
            Ok(None) => {}
            Err(_) => {
                tracing::error!("worker {} crashed on room {}", id, request.coord);
                give_back(id, request, returned);
                for request in inbox.iter() {
                    give_back(id, request, returned);
                }
                return true;
            }
        }
    }
    false
}

pub struct Worker {
    id: usize,
    generator: RoomGenerator,
    generated: FxHashSet<GenerationRequest>,
    processed: u32,
    release_interval: u32,
}

impl Worker {
    pub fn new(id: usize, seed: WorldSeed, settings: GenSettings) -> Self {
        let release_interval = settings.cache_release_interval;
        Worker {
            id,
            generator: RoomGenerator::new(seed, settings),
            generated: FxHashSet::default(),
            processed: 0,
            release_interval,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Runs the pipeline for one request. Returns `None` when this worker
    /// already produced the same request.
    pub fn process(&mut self, request: GenerationRequest) -> Option<GeneratedChunk> {
        self.processed += 1;
        if self.release_interval > 0 && self.processed % self.release_interval == 0 {
            tracing::debug!(
                "worker {} releasing {} cached noise grids",
                self.id,
                self.generator.noise().cached()
            );
            self.generator.release_caches();
        }

        if !self.generated.insert(request) {
            tracing::trace!("worker {} skipping duplicate {}", self.id, request.coord);
            return None;
        }

        let chunk = match request.rules {
            Some(rules) => self.generator.generate_with(request.coord, &rules),
            None => self.generator.generate(request.coord),
        };
        tracing::trace!(
            "worker {} generated {} ({} walls)",
            self.id,
            chunk.coord,
            chunk.wall_count()
        );
        Some(chunk)
    }

    /// Pulls requests until the inbox is closed and drained, or the outbound
    /// queue is gone. Returns whether the worker crashed.
    pub fn run(
        mut self,
        inbox: Receiver<GenerationRequest>,
        outbox: Sender<GeneratedChunk>,
        returned: Sender<Returned>,
    ) -> bool {
        tracing::debug!("worker {} started", self.id);
        let id = self.id;
        let crashed = serve_inbox(id, &inbox, &outbox, &returned, |request| self.process(request));
        tracing::debug!(
            "worker {} stopped after {} requests",
            self.id,
            self.processed
        );
        crashed
    }
}
