//! Entry point: parse CLI arguments, assemble a [`puzzle_miner::frontier::MiningConfig`],
//! and run one mining session to completion.

use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::error;

use puzzle_miner::cli::Args;
use puzzle_miner::error::{Error, Result};
use puzzle_miner::filter::{parse as parse_filter, validate_accelerate, Filter};
use puzzle_miner::frontier::{run_mining, MiningConfig};
use puzzle_miner::protocol::ProtocolDescriptor;
use puzzle_miner::seed::SeedSource;
use puzzle_miner::sink::derive_sink_paths;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let descriptor = ProtocolDescriptor::load(&args.protocol_path)?;
    descriptor.validate()?;

    let quality = parse_filter(&args.puzzle_quality)?;
    let winning = parse_filter(&args.puzzle_winning)?;
    let drawing = parse_filter(&args.puzzle_drawing)?;
    let accelerate = parse_accelerate(args.puzzle_accelerate.as_deref())?;

    let seed_source = match &args.input {
        Some(path) => seed_source_for_path(path)?,
        None => SeedSource::Random {
            count: args.random_count,
            chess960: args.chess960,
        },
    };
    let initial_seeds = seed_source.produce()?;

    let unix_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let sinks = derive_sink_paths(&args.output, args.chess960, unix_millis);

    let (max_waves, max_total) = if args.random_infinite {
        (None, None)
    } else {
        (Some(args.max_waves), Some(args.max_total))
    };

    let config = MiningConfig {
        descriptor: Arc::new(descriptor),
        engine_instances: args.engine_instances.max(1),
        node_cap: args.max_nodes,
        time_ms: args.max_duration,
        quality,
        winning,
        drawing,
        accelerate,
        chess960: args.chess960,
        max_waves,
        max_frontier: args.max_frontier,
        max_total,
        random_seeds_per_refill: puzzle_miner::frontier::DEFAULT_RANDOM_SEEDS_PER_REFILL,
        sinks,
        cancel: Arc::new(AtomicBool::new(false)),
        on_wave: None,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)?;
    let summary = runtime.block_on(run_mining(config, initial_seeds))?;

    log::info!(
        "mining run complete: {} records processed across {} waves",
        summary.processed,
        summary.waves.len()
    );
    Ok(())
}

fn parse_accelerate(text: Option<&str>) -> Result<Option<Filter>> {
    let Some(text) = text else {
        return Ok(None);
    };
    let filter = parse_filter(text)?;
    validate_accelerate(&filter)?;
    Ok(Some(filter))
}

fn seed_source_for_path(path: &std::path::Path) -> Result<SeedSource> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pgn") => Ok(SeedSource::Pgn(path.to_path_buf())),
        Some("txt") | Some("fen") => Ok(SeedSource::FenList(path.to_path_buf())),
        other => Err(Error::UnsupportedSeedExtension(
            other.unwrap_or("").to_string(),
        )),
    }
}
