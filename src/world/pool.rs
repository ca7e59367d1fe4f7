//! Worker pools
//!
//! A pool owns the lifecycle of its workers. Requests reach a worker
//! through its private unbounded inbox; dropping every inbox sender is the
//! shutdown signal, and a worker finishes whatever is already queued before
//! it stops.

use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

use crate::core::chunk::GeneratedChunk;
use crate::core::seed::WorldSeed;
use crate::error::{GenError, Result};
use crate::utils::settings::{GenSettings, PoolBackend};
use crate::world::process::ProcessPool;
use crate::world::worker::{GenerationRequest, Returned, Worker};

/// Outcome of shutting a pool down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HaltReport {
    /// Workers that exited cleanly within the grace period.
    pub stopped: usize,
    /// Workers that died on their own (panic, non-zero exit).
    pub crashed: usize,
    /// Workers still running at the deadline, killed or abandoned.
    pub terminated: usize,
}

pub trait WorkerPool: Send {
    fn backend(&self) -> PoolBackend;

    /// Workers spawned by this pool that have not been shut down yet.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Workers still running.
    fn alive(&mut self) -> usize;

    /// Waits for workers to exit until `deadline`, then force-terminates
    /// the rest. The inboxes must already be closed.
    fn shutdown(&mut self, deadline: Instant) -> HaltReport;
}

/// A spawned pool together with its workers' private inboxes.
pub struct SpawnedPool {
    pub pool: Box<dyn WorkerPool>,
    pub inboxes: Vec<Sender<GenerationRequest>>,
}

/// Spawns the pool selected by `settings.backend`. Worker `i` reads from
/// `inboxes[i]`; requests a dead worker could not serve come back on
/// `returned`.
pub fn spawn_pool(
    seed: WorldSeed,
    settings: &GenSettings,
    outbox: &Sender<GeneratedChunk>,
    returned: &Sender<Returned>,
) -> Result<SpawnedPool> {
    match settings.backend {
        PoolBackend::Threads => {
            let (pool, inboxes) = ThreadPool::spawn(seed, settings, outbox, returned)?;
            Ok(SpawnedPool {
                pool: Box::new(pool),
                inboxes,
            })
        }
        PoolBackend::Processes => {
            let (pool, inboxes) = ProcessPool::spawn(seed, settings, outbox, returned)?;
            Ok(SpawnedPool {
                pool: Box::new(pool),
                inboxes,
            })
        }
    }
}

struct ThreadWorker {
    id: usize,
    // Yields whether the worker crashed
    handle: JoinHandle<bool>,
    // Never sent on; disconnects when the worker thread ends, even by panic
    exited: Receiver<()>,
}

/// Workers on OS threads inside this process.
pub struct ThreadPool {
    workers: Vec<ThreadWorker>,
}

impl ThreadPool {
    pub fn spawn(
        seed: WorldSeed,
        settings: &GenSettings,
        outbox: &Sender<GeneratedChunk>,
        returned: &Sender<Returned>,
    ) -> Result<(Self, Vec<Sender<GenerationRequest>>)> {
        let mut workers = Vec::with_capacity(settings.worker_threads);
        let mut inboxes = Vec::with_capacity(settings.worker_threads);

        for id in 0..settings.worker_threads {
            let (inbox_tx, inbox_rx) = unbounded::<GenerationRequest>();
            let (exit_tx, exit_rx) = bounded::<()>(0);
            let worker = Worker::new(id, seed, settings.clone());
            let outbox = outbox.clone();
            let returned = returned.clone();

            let handle = thread::Builder::new()
                .name(format!("room-gen-{}", id))
                .spawn(move || {
                    let _exit = exit_tx;
                    worker.run(inbox_rx, outbox, returned)
                })
                .map_err(GenError::Spawn)?;

            workers.push(ThreadWorker {
                id,
                handle,
                exited: exit_rx,
            });
            inboxes.push(inbox_tx);
        }

        tracing::info!("Spawned {} generation threads", workers.len());
        Ok((ThreadPool { workers }, inboxes))
    }
}

impl WorkerPool for ThreadPool {
    fn backend(&self) -> PoolBackend {
        PoolBackend::Threads
    }

    fn len(&self) -> usize {
        self.workers.len()
    }

    fn alive(&mut self) -> usize {
        self.workers
            .iter()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    fn shutdown(&mut self, deadline: Instant) -> HaltReport {
        let mut report = HaltReport::default();
        for worker in self.workers.drain(..) {
            match worker.exited.recv_deadline(deadline) {
                Err(RecvTimeoutError::Timeout) => {
                    // OS threads cannot be killed; the thread is detached and
                    // exits once its current room is done.
                    tracing::warn!(
                        "Generation thread {} did not stop in time, abandoning it",
                        worker.id
                    );
                    report.terminated += 1;
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => match worker.handle.join() {
                    Ok(false) => report.stopped += 1,
                    Ok(true) | Err(_) => {
                        tracing::error!("Generation thread {} crashed", worker.id);
                        report.crashed += 1;
                    }
                },
            }
        }
        report
    }
}
