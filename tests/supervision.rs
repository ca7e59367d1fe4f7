#![cfg(unix)]

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use roomgen::{ChunkCoord, ChunkDimensions, GenSettings, PoolBackend, WorldGenHandler, WorldSeed};

fn process_settings(program: PathBuf, workers: usize) -> GenSettings {
    GenSettings {
        dimensions: ChunkDimensions::new(10, 10),
        backend: PoolBackend::Processes,
        worker_processes: workers,
        worker_program: Some(program),
        ..GenSettings::default()
    }
}

/// Writes an executable shell script. The file is written by a child shell
/// so no writable descriptor to it ever exists in this process.
fn script(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("roomgen-{}-{}.sh", name, std::process::id()));
    let status = Command::new("sh")
        .arg("-c")
        .arg("printf '#!/bin/sh\\n%s\\n' \"$1\" > \"$2\" && chmod +x \"$2\"")
        .arg("sh")
        .arg(body)
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    path
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn test_rooms_of_a_dead_worker_can_be_requested_again() {
    let wg = WorldGenHandler::new(
        WorldSeed::from_text("42"),
        process_settings(PathBuf::from("/bin/false"), 1),
    );
    wg.start().unwrap();
    let coord = ChunkCoord::new(2, 2);

    assert!(wg.request(coord).unwrap());
    assert!(wait_until(|| !wg.is_pending(coord)));
    assert!(wait_until(|| wg.alive_workers() == 0));

    assert!(wg.request(coord).unwrap());
    assert!(wait_until(|| !wg.is_pending(coord)));
    assert!(wg.drain_results().is_empty());

    let report = wg.halt();
    assert_eq!(report.crashed, 1);
    assert_eq!(report.stopped, 0);
}

#[test]
fn test_crashed_workers_are_reported() {
    let wg = WorldGenHandler::new(
        WorldSeed::from_text("42"),
        process_settings(PathBuf::from("/bin/false"), 3),
    );
    wg.start().unwrap();
    let report = wg.halt();
    assert_eq!(report.crashed, 3);
    assert_eq!(report.stopped + report.terminated, 0);
}

fn assert_terminated_on_time(program: PathBuf) {
    let settings = GenSettings {
        halt_timeout: Duration::from_millis(300),
        ..process_settings(program, 2)
    };
    let wg = WorldGenHandler::new(WorldSeed::from_text("42"), settings);
    wg.start().unwrap();

    let started = Instant::now();
    let report = wg.halt();
    let elapsed = started.elapsed();

    assert_eq!(report.terminated, 2);
    assert_eq!(report.stopped + report.crashed, 0);
    assert!(elapsed >= Duration::from_millis(250), "halt took {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "halt took {elapsed:?}");
}

#[test]
fn test_stuck_workers_are_terminated() {
    assert_terminated_on_time(script("stuck", "exec sleep 10"));
}

#[test]
fn test_stuck_wrapper_does_not_block_halt() {
    // The shell is killed but its `sleep` child keeps the pipes open
    assert_terminated_on_time(script("wrapper", "sleep 10"));
}
