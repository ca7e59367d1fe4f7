//! Background room generation
//!
//! The handler owns one inbound request queue, one outbound result queue and
//! a pool of workers. A dispatcher thread drains the inbound queue and hands
//! each request to a worker round-robin; workers push finished rooms to the
//! shared result queue, which callers poll without blocking.
//!
//! Results come back in no particular order. Correlate them by coordinate.
//!
//! A worker that dies hands its unfinished requests back to the dispatcher,
//! which reassigns them to the remaining workers. With no worker left the
//! request is dropped and its coordinate leaves the pending set, so the
//! caller can request it again.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, never, select, unbounded};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::core::chunk::GeneratedChunk;
use crate::core::coord::ChunkCoord;
use crate::core::seed::WorldSeed;
use crate::error::{GenError, Result};
use crate::utils::settings::GenSettings;
use crate::world::distributor::RoundRobin;
use crate::world::pool::{HaltReport, SpawnedPool, WorkerPool, spawn_pool};
use crate::world::worker::{GenerationRequest, Returned};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    Unstarted,
    Running,
    Halting,
    Stopped,
}

struct Running {
    request_tx: Sender<GenerationRequest>,
    dispatcher: JoinHandle<()>,
    pool: Box<dyn WorkerPool>,
}

struct Control {
    state: HandlerState,
    running: Option<Running>,
    // Handed to the pool on start; the handler keeps no sender afterwards
    outbox: Option<Sender<GeneratedChunk>>,
}

#[derive(Default)]
struct Bookkeeping {
    pending: FxHashSet<ChunkCoord>,
    delivered: FxHashSet<ChunkCoord>,
}

/// Coordinates a pool of generation workers.
///
/// All methods take `&self`; the handler can be shared between threads.
pub struct WorldGenHandler {
    seed: WorldSeed,
    settings: GenSettings,
    control: Mutex<Control>,
    result_rx: Receiver<GeneratedChunk>,
    // Shared with the dispatcher, which drops requests nobody can serve
    bookkeeping: Arc<Mutex<Bookkeeping>>,
}

impl WorldGenHandler {
    pub fn new(seed: WorldSeed, settings: GenSettings) -> Self {
        let (result_tx, result_rx) = unbounded::<GeneratedChunk>();
        WorldGenHandler {
            seed,
            settings,
            control: Mutex::new(Control {
                state: HandlerState::Unstarted,
                running: None,
                outbox: Some(result_tx),
            }),
            result_rx,
            bookkeeping: Arc::new(Mutex::new(Bookkeeping::default())),
        }
    }

    pub fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub fn settings(&self) -> &GenSettings {
        &self.settings
    }

    pub fn state(&self) -> HandlerState {
        self.control.lock().state
    }

    /// Workers spawned by the running pool, 0 when not running.
    pub fn worker_count(&self) -> usize {
        self.control
            .lock()
            .running
            .as_ref()
            .map_or(0, |running| running.pool.len())
    }

    /// Workers of the running pool that are still alive, 0 when not running.
    pub fn alive_workers(&self) -> usize {
        self.control
            .lock()
            .running
            .as_mut()
            .map_or(0, |running| running.pool.alive())
    }

    /// Spawns the worker pool and the dispatcher.
    pub fn start(&self) -> Result<()> {
        let mut control = self.control.lock();
        match control.state {
            HandlerState::Unstarted => {}
            HandlerState::Running | HandlerState::Halting => return Err(GenError::AlreadyStarted),
            HandlerState::Stopped => return Err(GenError::AlreadyStopped),
        }
        self.settings.validate()?;
        if self.settings.worker_count() == 0 {
            tracing::warn!("No workers configured, every request will be dropped");
        }

        let Some(outbox) = control.outbox.as_ref() else {
            return Err(GenError::AlreadyStopped);
        };
        let (returned_tx, returned_rx) = unbounded::<Returned>();
        let SpawnedPool { mut pool, inboxes } =
            spawn_pool(self.seed, &self.settings, outbox, &returned_tx)?;
        drop(returned_tx);

        let (request_tx, request_rx) = unbounded::<GenerationRequest>();
        let bookkeeping = Arc::clone(&self.bookkeeping);
        let dispatcher = match thread::Builder::new()
            .name("room-gen-dispatch".to_string())
            .spawn(move || dispatch(request_rx, returned_rx, inboxes, &bookkeeping))
        {
            Ok(handle) => handle,
            Err(err) => {
                pool.shutdown(Instant::now() + self.settings.halt_timeout);
                return Err(GenError::Spawn(err));
            }
        };

        tracing::info!(
            "World generation started: seed {}, {} {:?} workers",
            self.seed,
            pool.len(),
            pool.backend()
        );
        control.outbox = None;
        control.running = Some(Running {
            request_tx,
            dispatcher,
            pool,
        });
        control.state = HandlerState::Running;
        Ok(())
    }

    /// Queues `coord` for generation. Returns `Ok(false)` when the room is
    /// already pending or was already delivered.
    pub fn request(&self, coord: ChunkCoord) -> Result<bool> {
        self.submit(GenerationRequest::new(coord))
    }

    /// Like [`request`](Self::request), for a request carrying its own
    /// automaton rules. Bookkeeping is still per coordinate.
    pub fn submit(&self, request: GenerationRequest) -> Result<bool> {
        let control = self.control.lock();
        let running = match (control.state, control.running.as_ref()) {
            (HandlerState::Running, Some(running)) => running,
            (HandlerState::Stopped, _) => return Err(GenError::AlreadyStopped),
            _ => return Err(GenError::NotRunning),
        };

        {
            let mut book = self.bookkeeping.lock();
            if book.pending.contains(&request.coord) || book.delivered.contains(&request.coord) {
                return Ok(false);
            }
            book.pending.insert(request.coord);
        }

        if running.request_tx.send(request).is_err() {
            self.bookkeeping.lock().pending.remove(&request.coord);
            return Err(GenError::NotRunning);
        }
        Ok(true)
    }

    /// Everything currently on the result queue. Never blocks.
    pub fn drain_results(&self) -> Vec<GeneratedChunk> {
        let results: Vec<GeneratedChunk> = self.result_rx.try_iter().collect();
        self.record(&results);
        results
    }

    /// Waits until `count` rooms have arrived or `timeout` passes, whichever
    /// is first, and returns what arrived.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<GeneratedChunk> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(count);
        while results.len() < count {
            match self.result_rx.recv_deadline(deadline) {
                Ok(chunk) => results.push(chunk),
                Err(_) => break,
            }
        }
        self.record(&results);
        results
    }

    fn record(&self, results: &[GeneratedChunk]) {
        if results.is_empty() {
            return;
        }
        let mut book = self.bookkeeping.lock();
        for chunk in results {
            book.pending.remove(&chunk.coord);
            book.delivered.insert(chunk.coord);
        }
    }

    pub fn is_pending(&self, coord: ChunkCoord) -> bool {
        self.bookkeeping.lock().pending.contains(&coord)
    }

    pub fn pending_count(&self) -> usize {
        self.bookkeeping.lock().pending.len()
    }

    /// Forgets `coord` so it can be requested again, e.g. after the caller
    /// evicted it from its own cache.
    pub fn forget(&self, coord: ChunkCoord) {
        let mut book = self.bookkeeping.lock();
        book.pending.remove(&coord);
        book.delivered.remove(&coord);
    }

    /// Closes the request queue and waits up to the halt timeout for the
    /// workers; stragglers are terminated. Requests still in flight may be
    /// lost. Calling it again is a no-op.
    pub fn halt(&self) -> HaltReport {
        let running = {
            let mut control = self.control.lock();
            match control.state {
                HandlerState::Running => {}
                HandlerState::Unstarted => {
                    control.state = HandlerState::Stopped;
                    control.outbox = None;
                    return HaltReport::default();
                }
                HandlerState::Halting | HandlerState::Stopped => return HaltReport::default(),
            }
            control.state = HandlerState::Halting;
            control.running.take()
        };

        let mut report = HaltReport::default();
        if let Some(Running {
            request_tx,
            dispatcher,
            mut pool,
        }) = running
        {
            let deadline = Instant::now() + self.settings.halt_timeout;
            drop(request_tx);
            if dispatcher.join().is_err() {
                tracing::error!("Dispatcher thread crashed");
            }
            report = pool.shutdown(deadline);
            tracing::info!(
                "World generation halted: {} stopped, {} crashed, {} terminated",
                report.stopped,
                report.crashed,
                report.terminated
            );
        }

        self.control.lock().state = HandlerState::Stopped;
        report
    }
}

impl Drop for WorldGenHandler {
    fn drop(&mut self) {
        if self.state() == HandlerState::Running {
            self.halt();
        }
    }
}

enum Event {
    Request(GenerationRequest),
    Returned(Returned),
    ReturnedClosed,
    Closed,
}

/// Drains the request queue into the workers' inboxes. Returning drops the
/// inboxes, which tells every worker to stop once its queue is empty.
fn dispatch(
    requests: Receiver<GenerationRequest>,
    mut returned: Receiver<Returned>,
    inboxes: Vec<Sender<GenerationRequest>>,
    bookkeeping: &Mutex<Bookkeeping>,
) {
    let mut live: Vec<(usize, Sender<GenerationRequest>)> = inboxes.into_iter().enumerate().collect();
    let mut distributor = RoundRobin::new();
    loop {
        let event = select! {
            recv(requests) -> msg => msg.map_or(Event::Closed, Event::Request),
            recv(returned) -> msg => msg.map_or(Event::ReturnedClosed, Event::Returned),
        };
        match event {
            Event::Request(request) => route(request, &mut live, &mut distributor, bookkeeping),
            Event::Returned(Returned { worker, request }) => {
                if live.iter().any(|(id, _)| *id == worker) {
                    tracing::warn!("Worker {} is gone, reassigning its requests", worker);
                    live.retain(|(id, _)| *id != worker);
                }
                route(request, &mut live, &mut distributor, bookkeeping);
            }
            // Every worker has exited; keep serving the request queue alone
            Event::ReturnedClosed => returned = never(),
            Event::Closed => break,
        }
    }
    tracing::debug!("Dispatcher stopped after {} assignments", distributor.assigned());
}

/// Hands `request` to the next live worker, retiring workers whose inbox is
/// closed on the way.
fn route(
    request: GenerationRequest,
    live: &mut Vec<(usize, Sender<GenerationRequest>)>,
    distributor: &mut RoundRobin,
    bookkeeping: &Mutex<Bookkeeping>,
) {
    loop {
        let Some((id, inbox)) = distributor.assign(live.as_slice()) else {
            tracing::warn!("No live workers, dropping request for room {}", request.coord);
            bookkeeping.lock().pending.remove(&request.coord);
            return;
        };
        if inbox.send(request).is_ok() {
            return;
        }
        let id = *id;
        tracing::warn!("Worker {} inbox closed, retrying room {}", id, request.coord);
        live.retain(|(worker, _)| *worker != id);
    }
}
