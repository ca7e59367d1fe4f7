//! Process-backed worker pool
//!
//! Every worker is a child process running `<program> worker`. The parent
//! writes a [`WorkerSetup`] followed by a stream of requests to the child's
//! stdin and reads generated rooms back from its stdout, all bincode
//! encoded. Closing stdin tells the child to finish its queue and exit.
//!
//! Requests written to a child stay outstanding until their room comes
//! back. When the child dies, its outstanding requests and everything
//! queued for it afterwards are handed back for reassignment.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::constants::WORKER_SUBCOMMAND;
use crate::core::chunk::GeneratedChunk;
use crate::core::coord::ChunkCoord;
use crate::core::seed::WorldSeed;
use crate::error::{GenError, Result};
use crate::utils::settings::{GenSettings, PoolBackend};
use crate::world::pool::{HaltReport, WorkerPool};
use crate::world::worker::{GenerationRequest, Returned, Worker, give_back};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// First message on a worker process's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSetup {
    pub id: usize,
    pub seed: WorldSeed,
    pub settings: GenSettings,
}

/// `Ok(None)` on a clean end of stream.
fn read_message<T, R>(reader: &mut R) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    match bincode::deserialize_from(reader) {
        Ok(message) => Ok(Some(message)),
        Err(err) => {
            if let bincode::ErrorKind::Io(io) = &*err {
                if io.kind() == io::ErrorKind::UnexpectedEof {
                    return Ok(None);
                }
            }
            Err(GenError::Codec(err))
        }
    }
}

/// Child side of the protocol. Returns once stdin is closed and every
/// queued request has been answered.
pub fn serve_worker<R: Read, W: Write>(input: R, output: W) -> Result<()> {
    let mut reader = BufReader::new(input);
    let mut writer = BufWriter::new(output);

    let Some(setup) = read_message::<WorkerSetup, _>(&mut reader)? else {
        tracing::warn!("Worker process got no setup, exiting");
        return Ok(());
    };
    setup.settings.validate()?;
    tracing::debug!("Worker process {} ready (seed {})", setup.id, setup.seed);

    let mut worker = Worker::new(setup.id, setup.seed, setup.settings);
    while let Some(request) = read_message::<GenerationRequest, _>(&mut reader)? {
        if let Some(chunk) = worker.process(request) {
            bincode::serialize_into(&mut writer, &chunk)?;
            writer.flush()?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Requests written to a child and not answered yet.
#[derive(Default)]
struct Outstanding {
    dead: bool,
    requests: FxHashMap<ChunkCoord, GenerationRequest>,
}

/// Marks the child dead and hands back everything it had not answered.
fn retire(id: usize, outstanding: &Mutex<Outstanding>, returned: &Sender<Returned>) {
    let lost: Vec<GenerationRequest> = {
        let mut out = outstanding.lock();
        out.dead = true;
        out.requests.drain().map(|(_, request)| request).collect()
    };
    for request in lost {
        give_back(id, request, returned);
    }
}

struct ProcessWorker {
    id: usize,
    child: Child,
    feeder: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

/// Workers in separate OS processes.
pub struct ProcessPool {
    workers: Vec<ProcessWorker>,
}

impl ProcessPool {
    pub fn spawn(
        seed: WorldSeed,
        settings: &GenSettings,
        outbox: &Sender<GeneratedChunk>,
        returned: &Sender<Returned>,
    ) -> Result<(Self, Vec<Sender<GenerationRequest>>)> {
        let program = match &settings.worker_program {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };

        let mut pool = ProcessPool {
            workers: Vec::with_capacity(settings.worker_processes),
        };
        let mut inboxes = Vec::with_capacity(settings.worker_processes);

        for id in 0..settings.worker_processes {
            let setup = WorkerSetup {
                id,
                seed,
                settings: settings.clone(),
            };
            match spawn_worker(&program, setup, outbox, returned) {
                Ok((worker, inbox)) => {
                    pool.workers.push(worker);
                    inboxes.push(inbox);
                }
                Err(err) => {
                    // Close what was already spawned before bailing out
                    drop(inboxes);
                    pool.shutdown(Instant::now() + EXIT_POLL_INTERVAL);
                    return Err(err);
                }
            }
        }

        tracing::info!(
            "Spawned {} generation processes ({})",
            pool.workers.len(),
            program.display()
        );
        Ok((pool, inboxes))
    }
}

fn spawn_worker(
    program: &Path,
    setup: WorkerSetup,
    outbox: &Sender<GeneratedChunk>,
    returned: &Sender<Returned>,
) -> Result<(ProcessWorker, Sender<GenerationRequest>)> {
    let id = setup.id;
    let mut child = Command::new(program)
        .arg(WORKER_SUBCOMMAND)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(GenError::Spawn)?;

    let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
        child.kill().ok();
        child.wait().ok();
        return Err(GenError::Spawn(io::Error::other("worker pipes unavailable")));
    };

    let (inbox_tx, inbox_rx) = unbounded::<GenerationRequest>();
    let outstanding = Arc::new(Mutex::new(Outstanding::default()));

    let feeder = {
        let outstanding = Arc::clone(&outstanding);
        let returned = returned.clone();
        thread::Builder::new()
            .name(format!("room-gen-feed-{}", id))
            .spawn(move || feed(id, setup, inbox_rx, stdin, &outstanding, &returned))
    };
    let feeder = match feeder {
        Ok(handle) => handle,
        Err(err) => {
            child.kill().ok();
            child.wait().ok();
            return Err(GenError::Spawn(err));
        }
    };

    let outbox = outbox.clone();
    let returned = returned.clone();
    let reader = thread::Builder::new()
        .name(format!("room-gen-read-{}", id))
        .spawn(move || collect(id, stdout, outbox, &outstanding, &returned));
    let reader = match reader {
        Ok(handle) => handle,
        Err(err) => {
            // Closing the inbox lets the feeder finish
            drop(inbox_tx);
            child.kill().ok();
            child.wait().ok();
            feeder.join().ok();
            return Err(GenError::Spawn(err));
        }
    };

    tracing::debug!("Worker process {} started (pid {})", id, child.id());
    Ok((
        ProcessWorker {
            id,
            child,
            feeder: Some(feeder),
            reader: Some(reader),
        },
        inbox_tx,
    ))
}

fn write_message<T: Serialize, W: Write>(writer: &mut W, message: &T, flush: bool) -> Result<()> {
    bincode::serialize_into(&mut *writer, message)?;
    if flush {
        writer.flush()?;
    }
    Ok(())
}

/// Forwards the private inbox to the child's stdin; dropping the writer at
/// the end is the child's shutdown signal. Runs until the inbox is closed,
/// even after the child died, so nothing sent to this worker is lost.
fn feed(
    id: usize,
    setup: WorkerSetup,
    inbox: Receiver<GenerationRequest>,
    stdin: ChildStdin,
    outstanding: &Mutex<Outstanding>,
    returned: &Sender<Returned>,
) {
    let mut writer = BufWriter::new(stdin);
    if let Err(err) = write_message(&mut writer, &setup, true) {
        tracing::warn!("Worker process {} rejected its setup: {}", id, err);
        retire(id, outstanding, returned);
    }

    for request in inbox.iter() {
        {
            let mut out = outstanding.lock();
            if out.dead {
                drop(out);
                give_back(id, request, returned);
                continue;
            }
            out.requests.insert(request.coord, request);
        }
        if let Err(err) = write_message(&mut writer, &request, inbox.is_empty()) {
            tracing::warn!("Worker process {} stopped accepting requests: {}", id, err);
            retire(id, outstanding, returned);
        }
    }

    if !outstanding.lock().dead {
        writer.flush().ok();
    }
}

fn collect(
    id: usize,
    stdout: ChildStdout,
    outbox: Sender<GeneratedChunk>,
    outstanding: &Mutex<Outstanding>,
    returned: &Sender<Returned>,
) {
    let mut reader = BufReader::new(stdout);
    loop {
        match read_message::<GeneratedChunk, _>(&mut reader) {
            Ok(Some(chunk)) => {
                outstanding.lock().requests.remove(&chunk.coord);
                if outbox.send(chunk).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::error!("Worker process {} sent a malformed result: {}", id, err);
                break;
            }
        }
    }
    retire(id, outstanding, returned);
}

impl WorkerPool for ProcessPool {
    fn backend(&self) -> PoolBackend {
        PoolBackend::Processes
    }

    fn len(&self) -> usize {
        self.workers.len()
    }

    fn alive(&mut self) -> usize {
        self.workers
            .iter_mut()
            .map(|w| w.child.try_wait())
            .filter(|status| matches!(status, Ok(None)))
            .count()
    }

    fn shutdown(&mut self, deadline: Instant) -> HaltReport {
        let mut report = HaltReport::default();
        for mut worker in self.workers.drain(..) {
            let status = loop {
                match worker.child.try_wait() {
                    Ok(Some(status)) => break Some(status),
                    Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
                    Ok(None) => break None,
                    Err(err) => {
                        tracing::warn!("Cannot poll worker process {}: {}", worker.id, err);
                        break None;
                    }
                }
            };

            let killed = match status {
                Some(status) if status.success() => {
                    report.stopped += 1;
                    false
                }
                Some(status) => {
                    tracing::error!("Worker process {} exited with {}", worker.id, status);
                    report.crashed += 1;
                    false
                }
                None => {
                    tracing::warn!("Worker process {} did not stop in time, killing it", worker.id);
                    worker.child.kill().ok();
                    worker.child.wait().ok();
                    report.terminated += 1;
                    true
                }
            };

            let handles = [worker.feeder.take(), worker.reader.take()];
            if killed {
                // A grandchild may still hold the pipes open; detach instead
                // of waiting for it.
                drop(handles);
            } else {
                for handle in handles.into_iter().flatten() {
                    handle.join().ok();
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coord::{ChunkCoord, ChunkDimensions};
    use std::path::PathBuf;

    fn setup() -> WorkerSetup {
        WorkerSetup {
            id: 3,
            seed: WorldSeed::from_text("42"),
            settings: GenSettings {
                dimensions: ChunkDimensions::new(10, 10),
                ..GenSettings::default()
            },
        }
    }

    fn encode(requests: &[GenerationRequest]) -> Vec<u8> {
        let mut input = bincode::serialize(&setup()).unwrap();
        for request in requests {
            input.extend(bincode::serialize(request).unwrap());
        }
        input
    }

    #[test]
    fn test_serve_worker_answers_every_request() {
        let requests = [
            GenerationRequest::new(ChunkCoord::new(0, 0)),
            GenerationRequest::new(ChunkCoord::new(1, 0)),
            GenerationRequest::new(ChunkCoord::new(-1, 0)),
        ];
        let input = encode(&requests);
        let mut output = Vec::new();
        serve_worker(input.as_slice(), &mut output).unwrap();

        let mut reader = output.as_slice();
        let mut rooms = Vec::new();
        while let Some(room) = read_message::<GeneratedChunk, _>(&mut reader).unwrap() {
            rooms.push(room);
        }

        assert_eq!(rooms.len(), 3);
        assert_eq!(rooms[0].len(), 100);
        assert!(rooms[2].is_empty());

        let mut local = Worker::new(0, setup().seed, setup().settings);
        assert_eq!(Some(rooms[1].clone()), local.process(requests[1]));
    }

    #[test]
    fn test_serve_worker_skips_duplicates() {
        let request = GenerationRequest::new(ChunkCoord::new(2, 2));
        let input = encode(&[request, request]);
        let mut output = Vec::new();
        serve_worker(input.as_slice(), &mut output).unwrap();

        let mut reader = output.as_slice();
        assert!(read_message::<GeneratedChunk, _>(&mut reader).unwrap().is_some());
        assert!(read_message::<GeneratedChunk, _>(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_serve_worker_without_setup() {
        let mut output = Vec::new();
        serve_worker(io::empty(), &mut output).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_serve_worker_rejects_bad_settings() {
        let mut bad = setup();
        bad.settings.dimensions = ChunkDimensions::new(0, 0);
        let input = bincode::serialize(&bad).unwrap();
        let result = serve_worker(input.as_slice(), Vec::new());
        assert!(matches!(result, Err(GenError::InvalidSettings(_))));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let (out_tx, _out_rx) = unbounded();
        let (returned_tx, _returned_rx) = unbounded();
        let settings = GenSettings {
            backend: PoolBackend::Processes,
            worker_processes: 2,
            worker_program: Some(PathBuf::from("/nonexistent/roomgen-worker")),
            ..GenSettings::default()
        };
        let result = ProcessPool::spawn(WorldSeed::new(1), &settings, &out_tx, &returned_tx);
        assert!(matches!(result, Err(GenError::Spawn(_))));
    }

    #[test]
    fn test_retire_hands_back_unanswered_requests() {
        let (returned_tx, returned_rx) = unbounded();
        let outstanding = Mutex::new(Outstanding::default());
        for x in 0..3 {
            let request = GenerationRequest::new(ChunkCoord::new(x, 1));
            outstanding.lock().requests.insert(request.coord, request);
        }

        retire(4, &outstanding, &returned_tx);
        assert!(outstanding.lock().dead);
        assert!(outstanding.lock().requests.is_empty());

        let mut back: Vec<_> = returned_rx.try_iter().map(|r| (r.worker, r.request.coord.x)).collect();
        back.sort();
        assert_eq!(back, vec![(4, 0), (4, 1), (4, 2)]);
    }
}
