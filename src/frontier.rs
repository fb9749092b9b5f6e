//! The frontier scheduler: the wave-based driver that
//! caps, analyzes, classifies, expands, deduplicates, and persists.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

use crate::analysis::{Analysis, Record, TerminatedBy};
use crate::engine::EnginePool;
use crate::error::Result;
use crate::filter::{compose_puzzle_verify, eval, EvalContext, Filter};
use crate::position;
use crate::protocol::ProtocolDescriptor;
use crate::seed::SeedSource;
use crate::sink::SinkPair;

/// Default scheduler bounds, overridable via [`MiningConfig`].
pub const DEFAULT_MAX_WAVES: u64 = 100;
pub const DEFAULT_MAX_FRONTIER: usize = 5_000;
pub const DEFAULT_MAX_TOTAL: u64 = 500_000;
pub const DEFAULT_RANDOM_SEEDS_PER_REFILL: usize = 100;

/// Per-wave progress, reported through [`MiningConfig::on_wave`]. Purely
/// observational: nothing about scheduler semantics depends on it.
#[derive(Debug, Clone, Copy)]
pub struct WaveSummary {
    pub wave: u64,
    pub dispatched: usize,
    pub puzzles: usize,
    pub non_puzzles: usize,
    pub processed_total: u64,
}

/// Final tally of a mining run.
#[derive(Debug, Clone)]
pub struct MiningSummary {
    pub waves: Vec<WaveSummary>,
    pub processed: u64,
}

/// Everything the scheduler needs, assembled by the CLI layer from
/// parsed arguments.
pub struct MiningConfig {
    pub descriptor: Arc<ProtocolDescriptor>,
    pub engine_instances: usize,
    pub node_cap: u64,
    pub time_ms: u64,
    pub quality: Filter,
    pub winning: Filter,
    pub drawing: Filter,
    pub accelerate: Option<Filter>,
    pub chess960: bool,
    /// `None` means infinite: the run continues until cancelled.
    pub max_waves: Option<u64>,
    pub max_frontier: usize,
    /// `None` means infinite.
    pub max_total: Option<u64>,
    pub random_seeds_per_refill: usize,
    pub sinks: SinkPair,
    pub cancel: Arc<AtomicBool>,
    pub on_wave: Option<Box<dyn Fn(&WaveSummary) + Send + Sync>>,
}

impl MiningConfig {
    fn infinite(&self) -> bool {
        self.max_waves.is_none() && self.max_total.is_none()
    }
}

/// Run a full mining session from `initial_seeds` to completion.
pub async fn run_mining(config: MiningConfig, initial_seeds: Vec<Record>) -> Result<MiningSummary> {
    config.sinks.ensure()?;
    let pool = EnginePool::spawn(config.descriptor.clone(), config.engine_instances).await?;
    let verify_filter = compose_puzzle_verify(&config.quality, &config.winning, &config.drawing);
    let accel = config.accelerate.clone().map(Arc::new);

    let mut seen: HashSet<String> = HashSet::new();
    let mut analyzed: HashSet<String> = HashSet::new();
    let mut frontier = dedup_new(initial_seeds, &analyzed, &mut seen);

    let mut processed: u64 = 0;
    let mut wave: u64 = 0;
    let mut summaries = Vec::new();
    let infinite = config.infinite();

    loop {
        if frontier.is_empty() && infinite {
            let refill = SeedSource::Random {
                count: config.random_seeds_per_refill,
                chess960: config.chess960,
            }
            .produce()?;
            frontier = dedup_new(refill, &analyzed, &mut seen);
        }

        if frontier.is_empty() {
            break;
        }
        if let Some(max_waves) = config.max_waves {
            if wave >= max_waves {
                break;
            }
        }
        if let Some(max_total) = config.max_total {
            if processed >= max_total {
                break;
            }
        }
        if config.cancel.load(Ordering::Relaxed) {
            break;
        }

        // Capping discards the tail; the retained prefix is deterministic.
        frontier.truncate(config.max_frontier);

        pool.analyse_all(
            &mut frontier,
            accel.clone(),
            config.node_cap,
            config.time_ms,
            &config.cancel,
        )
        .await;

        let mut wave_puzzles = Vec::new();
        let mut wave_non_puzzles = Vec::new();
        let mut next_frontier = Vec::new();

        for mut record in frontier.drain(..) {
            processed += 1;
            analyzed.insert(record.position.clone());

            let analysis = record
                .analysis
                .clone()
                .expect("EnginePool::analyse_all populates every record's analysis");

            let is_puzzle = !matches!(analysis.terminated_by, TerminatedBy::Error)
                && verify(&verify_filter, &record, &analysis);

            if is_puzzle {
                expand(&record, &analysis, &analyzed, &mut seen, &mut next_frontier);
                if let Some(max_total) = config.max_total {
                    let budget_hit = processed + next_frontier.len() as u64 >= max_total;
                    if budget_hit {
                        next_frontier.truncate(
                            (max_total.saturating_sub(processed)) as usize,
                        );
                    }
                }
            }

            record.analysis = Some(analysis);
            if is_puzzle {
                wave_puzzles.push(record);
            } else {
                wave_non_puzzles.push(record);
            }

            if let Some(max_total) = config.max_total {
                if processed >= max_total {
                    break;
                }
            }
        }

        config.sinks.puzzles.append(&wave_puzzles)?;
        config.sinks.non_puzzles.append(&wave_non_puzzles)?;

        let summary = WaveSummary {
            wave,
            dispatched: wave_puzzles.len() + wave_non_puzzles.len(),
            puzzles: wave_puzzles.len(),
            non_puzzles: wave_non_puzzles.len(),
            processed_total: processed,
        };
        match &config.on_wave {
            Some(cb) => cb(&summary),
            None => info!(
                "wave {} done: {} puzzles, {} non-puzzles, {} processed total",
                summary.wave, summary.puzzles, summary.non_puzzles, summary.processed_total
            ),
        }
        summaries.push(summary);

        frontier = next_frontier;
        wave += 1;
    }

    pool.close().await;
    Ok(MiningSummary {
        waves: summaries,
        processed,
    })
}

/// Filter out positions already `analyzed` or `seen`, registering the
/// kept ones into `seen`. A candidate is rejected only if it was already
/// analyzed or already seen, including earlier in the same batch.
fn dedup_new(candidates: Vec<Record>, analyzed: &HashSet<String>, seen: &mut HashSet<String>) -> Vec<Record> {
    let mut out = Vec::with_capacity(candidates.len());
    for record in candidates {
        let key = record.position.clone();
        if analyzed.contains(&key) || seen.contains(&key) {
            continue;
        }
        seen.insert(key);
        out.push(record);
    }
    out
}

fn verify(verify_filter: &Filter, record: &Record, analysis: &Analysis) -> bool {
    let side_to_move = record.live_position().ok().map(|pos| {
        use shakmaty::Position;
        pos.turn()
    });
    let ctx = EvalContext::new(analysis, side_to_move);
    eval(verify_filter, &ctx)
}

/// Enumerate every legal child of the position after the engine's best
/// move, i.e. the opponent's replies.
fn expand(
    record: &Record,
    analysis: &Analysis,
    analyzed: &HashSet<String>,
    seen: &mut HashSet<String>,
    next_frontier: &mut Vec<Record>,
) {
    if analysis.is_no_move() {
        return;
    }
    let Ok(pos) = record.live_position() else {
        return;
    };
    let Ok(after_best) = position::apply_uci(&pos, &analysis.best_move) else {
        return;
    };
    let after_best_key = position::canonical(&after_best);

    for child in position::legal_children(&after_best) {
        let key = position::canonical(&child);
        if analyzed.contains(&key) || seen.contains(&key) {
            continue;
        }
        seen.insert(key.clone());
        next_frontier.push(Record::new(key, Some(after_best_key.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_new_rejects_already_seen_and_already_analyzed() {
        let mut seen = HashSet::new();
        seen.insert("a".to_string());
        let mut analyzed = HashSet::new();
        analyzed.insert("b".to_string());
        let candidates = vec![
            Record::new("a".into(), None),
            Record::new("b".into(), None),
            Record::new("c".into(), None),
        ];
        let kept = dedup_new(candidates, &analyzed, &mut seen);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].position, "c");
    }

    #[test]
    fn dedup_new_rejects_duplicates_within_same_batch() {
        let mut seen = HashSet::new();
        let analyzed = HashSet::new();
        let candidates = vec![Record::new("x".into(), None), Record::new("x".into(), None)];
        let kept = dedup_new(candidates, &analyzed, &mut seen);
        assert_eq!(kept.len(), 1);
    }
}
