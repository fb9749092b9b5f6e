//! Command-line surface of the mining core.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};

/// Mine tactical puzzles by driving a UCI engine over a wave of candidate
/// positions.
#[derive(Debug, Parser)]
#[command(name = "puzzle-miner", version, about)]
pub struct Args {
    /// Treat seeds and random starts as Chess960 (Fischer Random).
    #[arg(long)]
    pub chess960: bool,

    /// Seed input: a FEN-per-line `.txt` file or a `.pgn` file. Omit to
    /// mine from random starting positions.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output root: a `.json`/`.jsonl` path (sibling puzzle/non-puzzle
    /// files are derived from it) or a directory (timestamped files are
    /// created inside it).
    #[arg(long)]
    pub output: PathBuf,

    /// Path to the TOML protocol descriptor for the engine to drive.
    #[arg(long)]
    pub protocol_path: PathBuf,

    /// Number of concurrent engine sessions.
    #[arg(long, default_value_t = 1)]
    pub engine_instances: usize,

    /// Per-job node budget.
    #[arg(long, default_value_t = 1_000_000)]
    pub max_nodes: u64,

    /// Per-job time budget. Accepts a bare millisecond count or a
    /// suffixed duration (`60s`, `2m`, `1h`).
    #[arg(long, default_value = "2000", value_parser = parse_duration_ms)]
    pub max_duration: u64,

    /// Filter DSL expression a candidate must satisfy to be considered a
    /// puzzle at all (search quality gate).
    #[arg(long)]
    pub puzzle_quality: String,

    /// Filter DSL expression identifying a decisive winning advantage.
    #[arg(long)]
    pub puzzle_winning: String,

    /// Filter DSL expression identifying a drawing/defensive resource.
    #[arg(long)]
    pub puzzle_drawing: String,

    /// Filter DSL expression allowed to cut a job short once satisfied.
    /// Restricted to monotone fields (not `diff`/`pvCount`).
    #[arg(long)]
    pub puzzle_accelerate: Option<String>,

    /// Number of random seed positions to generate when `--input` is
    /// omitted.
    #[arg(long, default_value_t = 32)]
    pub random_count: usize,

    /// Run forever, refilling the frontier with fresh random seeds
    /// whenever it empties, until externally cancelled.
    #[arg(long)]
    pub random_infinite: bool,

    /// Maximum number of waves to run. Ignored in infinite mode.
    #[arg(long, default_value_t = crate::frontier::DEFAULT_MAX_WAVES)]
    pub max_waves: u64,

    /// Maximum number of records dispatched per wave.
    #[arg(long, default_value_t = crate::frontier::DEFAULT_MAX_FRONTIER)]
    pub max_frontier: usize,

    /// Maximum number of records analyzed across the whole run. Ignored
    /// in infinite mode.
    #[arg(long, default_value_t = crate::frontier::DEFAULT_MAX_TOTAL)]
    pub max_total: u64,

    /// Enable debug-level logging.
    #[arg(long)]
    pub verbose: bool,
}

/// Parse `"1000"` (bare milliseconds), `"60s"`, `"2m"`, or `"1h"` into a
/// millisecond count.
pub fn parse_duration_ms(text: &str) -> std::result::Result<u64, String> {
    parse_duration(text).map_err(|e| e.to_string())
}

fn parse_duration(text: &str) -> Result<u64> {
    let text = text.trim();
    let (digits, unit_ms) = if let Some(n) = text.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = text.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1_000)
    } else {
        (text, 1)
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::InvalidDuration(text.to_string()))?;
    value
        .checked_mul(unit_ms)
        .ok_or_else(|| Error::InvalidDuration(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_milliseconds() {
        assert_eq!(parse_duration("1000").unwrap(), 1000);
    }

    #[test]
    fn parses_suffixed_units() {
        assert_eq!(parse_duration("60s").unwrap(), 60_000);
        assert_eq!(parse_duration("2m").unwrap(), 120_000);
        assert_eq!(parse_duration("1h").unwrap(), 3_600_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("12x").is_err());
    }
}
