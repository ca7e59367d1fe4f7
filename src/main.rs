//! Room generator
//!
//! Generates a block of rooms around an origin with a pool of workers and
//! prints a summary (or the rooms themselves). The hidden `worker`
//! subcommand is the child side of the process-backed pool.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use roomgen::utils::{load_settings, save_settings};
use roomgen::world::serve_worker;
use roomgen::{ChunkCoord, ChunkDimensions, GenSettings, PoolBackend, WorldGenHandler, WorldSeed};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    generate: GenerateArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve generation requests on stdin/stdout (used by the process pool)
    #[command(hide = true)]
    Worker,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// World seed (random 4-digit seed if omitted)
    #[arg(long)]
    seed: Option<String>,

    /// Room at the centre of the generated block
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    x: i32,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    y: i32,

    /// Rooms generated in each direction from the centre
    #[arg(long, default_value_t = 1)]
    radius: i32,

    #[arg(long, value_enum)]
    backend: Option<Backend>,

    /// Worker count for the selected backend
    #[arg(long)]
    workers: Option<usize>,

    /// Room size in tiles, e.g. 45x45
    #[arg(long, value_parser = parse_size)]
    size: Option<ChunkDimensions>,

    /// Load settings from this file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings to this file
    #[arg(long)]
    save_settings: Option<PathBuf>,

    /// Print every room as ASCII
    #[arg(long, default_value_t = false)]
    print: bool,

    /// Seconds to wait for all rooms
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    Threads,
    Processes,
}

fn parse_size(text: &str) -> Result<ChunkDimensions, String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok(ChunkDimensions::new(width, height))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Some(Command::Worker) => {
            // stdout carries results, logs go to stderr
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_writer(std::io::stderr)
                .init();
            serve_worker(std::io::stdin().lock(), std::io::stdout().lock())
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .init();
            generate(args.generate)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn generate(args: GenerateArgs) -> roomgen::Result<()> {
    let mut settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => GenSettings::default(),
    };
    if let Some(backend) = args.backend {
        settings.backend = match backend {
            Backend::Threads => PoolBackend::Threads,
            Backend::Processes => PoolBackend::Processes,
        };
    }
    if let Some(workers) = args.workers {
        match settings.backend {
            PoolBackend::Threads => settings.worker_threads = workers,
            PoolBackend::Processes => settings.worker_processes = workers,
        }
    }
    if let Some(size) = args.size {
        settings.dimensions = size;
    }
    settings.validate()?;
    if let Some(path) = &args.save_settings {
        save_settings(path, &settings)?;
        tracing::info!("Settings written to {}", path.display());
    }

    let (seed_text, seed) = match args.seed {
        Some(text) => {
            let seed = WorldSeed::from_text(&text);
            (text, seed)
        }
        None => WorldSeed::random(),
    };
    tracing::info!("Generating with seed {:?}", seed_text);

    let handler = WorldGenHandler::new(seed, settings);
    handler.start()?;

    let radius = args.radius.max(0);
    let mut requested = 0;
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            if handler.request(ChunkCoord::new(args.x + dx, args.y + dy))? {
                requested += 1;
            }
        }
    }

    let mut rooms = handler.wait_for(requested, Duration::from_secs(args.timeout));
    if rooms.len() < requested {
        tracing::warn!(
            "Only {} of {} rooms arrived in time ({} of {} workers alive)",
            rooms.len(),
            requested,
            handler.alive_workers(),
            handler.worker_count()
        );
    }
    let report = handler.halt();
    if report.crashed > 0 {
        tracing::warn!("{} workers crashed", report.crashed);
    }
    if report.terminated > 0 {
        tracing::warn!("{} workers had to be terminated", report.terminated);
    }

    rooms.sort_by_key(|room| (room.coord.y, room.coord.x));
    for room in &rooms {
        if room.is_empty() {
            println!("room {}: empty", room.coord);
            continue;
        }
        println!(
            "room {}: {} tiles, {} walls",
            room.coord,
            room.len(),
            room.wall_count()
        );
        if args.print {
            println!("{}", room.render_ascii());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("45x30").unwrap(), ChunkDimensions::new(45, 30));
        assert_eq!(parse_size("10X10").unwrap(), ChunkDimensions::new(10, 10));
        assert!(parse_size("10").is_err());
        assert!(parse_size("ax3").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_worker_subcommand() {
        let args = Args::try_parse_from(["roomgen", "worker"]).unwrap();
        assert!(matches!(args.command, Some(Command::Worker)));

        let args = Args::try_parse_from(["roomgen", "--seed", "42", "--x", "-2"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.generate.seed.as_deref(), Some("42"));
        assert_eq!(args.generate.x, -2);
    }
}
