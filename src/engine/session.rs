//! One spawned engine subprocess and its bounded `analyze` API.
//!
//! Owns the child's stdin/stdout lifecycle, drains stderr in the
//! background, and speaks line-oriented UCI through `vampirc-uci`.
//! Descriptor-driven rather than tied to one fixed engine's protocol, so
//! any UCI-speaking binary works once it has a `ProtocolDescriptor`.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use shakmaty::Color;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use vampirc_uci::{parse_one, UciInfoAttribute, UciMessage};

use crate::analysis::{Analysis, Bound, Pv, Score, TerminatedBy, NO_MOVE};
use crate::filter::{eval, EvalContext, Filter};
use crate::position;
use crate::protocol::ProtocolDescriptor;

use super::types::{
    EngineError, EngineResult, EngineState, CLOSE_GRACE_WINDOW, HANDSHAKE_TIMEOUT,
    STOP_GRACE_WINDOW,
};

/// One principal variation as it is accumulated from info lines, before
/// being frozen into a [`Pv`] at the end of a job.
struct PvSlot {
    moves: Vec<String>,
    score: Score,
    depth: u32,
    nodes: u64,
    bound: Bound,
}

/// Accumulates info-line updates for one `analyze` job. The last info
/// line per multipv index wins for that index.
#[derive(Default)]
struct AnalysisBuilder {
    slots: Vec<Option<PvSlot>>,
}

impl AnalysisBuilder {
    fn apply_info(&mut self, attrs: Vec<UciInfoAttribute>) {
        let mut index = 0usize;
        let mut depth = None;
        let mut nodes = None;
        let mut score = None;
        let mut bound = Bound::Exact;
        let mut moves = None;

        for attr in attrs {
            match attr {
                UciInfoAttribute::MultiPv(mp) => index = (mp as usize).saturating_sub(1),
                UciInfoAttribute::Depth(d) => depth = Some(d as u32),
                UciInfoAttribute::Nodes(n) => nodes = Some(n),
                UciInfoAttribute::Score(s) => {
                    score = Some(match s.mate {
                        Some(m) => Score::Mate(m as i32),
                        None => Score::Cp(s.cp.unwrap_or(0) as i64),
                    });
                    bound = if s.lower_bound.unwrap_or(false) {
                        Bound::Lower
                    } else if s.upper_bound.unwrap_or(false) {
                        Bound::Upper
                    } else {
                        Bound::Exact
                    };
                }
                UciInfoAttribute::Pv(pv_moves) => {
                    moves = Some(pv_moves.iter().map(|m| m.to_string()).collect::<Vec<_>>());
                }
                _ => {}
            }
        }

        // An info line with no score or no pv carries nothing this crate's
        // analysis record needs (e.g. a bare "info currmove ..." line);
        // drop it rather than recording a half-built slot.
        let (Some(moves), Some(score)) = (moves, score) else {
            return;
        };
        let slot = PvSlot {
            moves,
            score,
            depth: depth.unwrap_or(0),
            nodes: nodes.unwrap_or(0),
            bound,
        };
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(slot);
    }

    fn best_move_so_far(&self) -> String {
        self.slots
            .iter()
            .flatten()
            .next()
            .and_then(|s| s.moves.first())
            .cloned()
            .unwrap_or_else(|| NO_MOVE.to_string())
    }

    fn best_nodes(&self) -> u64 {
        self.slots.iter().flatten().next().map(|s| s.nodes).unwrap_or(0)
    }

    fn pvs(&self) -> Vec<Pv> {
        self.slots
            .iter()
            .flatten()
            .map(|s| Pv {
                moves: s.moves.clone(),
                score: s.score,
                depth: s.depth,
                nodes: s.nodes,
                move_scores: None,
            })
            .collect()
    }

    /// A half-finished [`Analysis`] suitable for the `accelerate`
    /// predicate: restricted in practice to the
    /// monotone fields `validate_accelerate` allows.
    fn partial_analysis(&self) -> Analysis {
        Analysis {
            best_move: self.best_move_so_far(),
            bound: self.slots.iter().flatten().next().map(|s| s.bound).unwrap_or(Bound::Exact),
            terminated_by: TerminatedBy::TimeCap,
            pv: self.pvs(),
        }
    }

    fn finish(&self, best_move: String, terminated_by: TerminatedBy) -> Analysis {
        Analysis {
            best_move,
            bound: self.slots.iter().flatten().next().map(|s| s.bound).unwrap_or(Bound::Exact),
            terminated_by,
            pv: self.pvs(),
        }
    }
}

enum PumpOutcome {
    BestMove(String),
    DeadlineHit,
}

/// One spawned engine process with line-oriented read/write. Lifecycle:
/// `Spawning -> Handshaking -> Idle -> Analyzing -> Idle ... -> Closing ->
/// Closed`, with `Failed` reachable from any state.
pub struct EngineSession {
    descriptor: Arc<ProtocolDescriptor>,
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    state: EngineState,
}

impl EngineSession {
    pub async fn spawn(descriptor: Arc<ProtocolDescriptor>) -> EngineResult<EngineSession> {
        let path = descriptor.resolve_path();
        debug!("spawning engine process: {:?}", path);

        let mut child = Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(EngineError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(EngineError::NoStdout)?;
        let lines = BufReader::new(stdout).lines();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut stderr_lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = stderr_lines.next_line().await {
                    warn!("engine stderr: {line}");
                }
            });
        }

        let mut session = EngineSession {
            descriptor,
            child,
            stdin,
            lines,
            state: EngineState::Handshaking,
        };

        match timeout(HANDSHAKE_TIMEOUT, session.handshake()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = session.child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let _ = session.child.kill().await;
                return Err(EngineError::HandshakeTimeout);
            }
        }

        session.state = EngineState::Idle;
        Ok(session)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    async fn handshake(&mut self) -> EngineResult<()> {
        let init = self.descriptor.init.clone();
        for line in &init {
            self.send_line(line).await?;
        }
        loop {
            match self.lines.next_line().await? {
                Some(line) => {
                    trace!("engine: {line}");
                    if line.trim() == self.descriptor.ready_marker {
                        break;
                    }
                }
                None => return Err(EngineError::UnexpectedExit),
            }
        }
        for opt_line in self.descriptor.render_option_set() {
            self.send_line(&opt_line).await?;
        }
        Ok(())
    }

    /// Run one bounded analysis. On return the session
    /// is `Idle`; on error it transitions to `Failed` and the caller
    /// should discard it (the pool replaces failed sessions).
    pub async fn analyze(
        &mut self,
        position: &str,
        node_cap: u64,
        time_ms: u64,
        accelerate: Option<&Filter>,
    ) -> EngineResult<Analysis> {
        if !self.state.is_usable() {
            return Err(EngineError::InvalidState {
                expected: EngineState::Idle,
                actual: self.state,
            });
        }
        self.state = EngineState::Analyzing;
        let result = self.run_analysis(position, node_cap, time_ms, accelerate).await;
        self.state = match &result {
            Ok(_) => EngineState::Idle,
            Err(_) => EngineState::Failed,
        };
        result
    }

    async fn run_analysis(
        &mut self,
        position: &str,
        node_cap: u64,
        time_ms: u64,
        accelerate: Option<&Filter>,
    ) -> EngineResult<Analysis> {
        let side_to_move = position::parse_canonical(position).ok().map(|pos| {
            use shakmaty::Position;
            pos.turn()
        });

        self.send_line(&format!("position fen {position}")).await?;
        self.send_line(&self.descriptor.render_go(node_cap, time_ms)).await?;

        let deadline = Instant::now() + Duration::from_millis(time_ms.max(1));
        let mut builder = AnalysisBuilder::default();

        match self.pump_until(&mut builder, deadline, accelerate, side_to_move).await? {
            PumpOutcome::BestMove(best_move) => {
                let terminated_by = if builder.best_nodes() >= node_cap {
                    TerminatedBy::NodeCap
                } else {
                    TerminatedBy::BestMove
                };
                Ok(builder.finish(best_move, terminated_by))
            }
            PumpOutcome::DeadlineHit => {
                self.send_line(&self.descriptor.stop_command).await?;
                let grace_deadline = Instant::now() + STOP_GRACE_WINDOW;
                match self.pump_until(&mut builder, grace_deadline, None, side_to_move).await? {
                    PumpOutcome::BestMove(best_move) => {
                        Ok(builder.finish(best_move, TerminatedBy::TimeCap))
                    }
                    PumpOutcome::DeadlineHit => {
                        let synthesized = builder.best_move_so_far();
                        Ok(builder.finish(synthesized, TerminatedBy::TimeCap))
                    }
                }
            }
        }
    }

    /// Read lines until a bestmove arrives, the deadline elapses, or (when
    /// `accelerate` is given) the partial analysis satisfies it.
    async fn pump_until(
        &mut self,
        builder: &mut AnalysisBuilder,
        deadline: Instant,
        accelerate: Option<&Filter>,
        side_to_move: Option<Color>,
    ) -> EngineResult<PumpOutcome> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(PumpOutcome::DeadlineHit);
            }
            let line = match timeout(remaining, self.lines.next_line()).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => return Err(EngineError::UnexpectedExit),
                Ok(Err(e)) => return Err(classify_io_error(e)),
                Err(_) => return Ok(PumpOutcome::DeadlineHit),
            };
            trace!("engine: {line}");

            if line.starts_with(&self.descriptor.bestmove_prefix) {
                match parse_one(&line) {
                    UciMessage::BestMove { best_move, .. } => {
                        return Ok(PumpOutcome::BestMove(best_move.to_string()));
                    }
                    _ => {
                        warn!("malformed bestmove line, ignoring: {line}");
                        continue;
                    }
                }
            }

            if line.starts_with(&self.descriptor.info_prefix) {
                if let UciMessage::Info(attrs) = parse_one(&line) {
                    builder.apply_info(attrs);
                    if let Some(accel) = accelerate {
                        let partial = builder.partial_analysis();
                        if !partial.pv.is_empty() {
                            let ctx = EvalContext::new(&partial, side_to_move);
                            if eval(accel, &ctx) {
                                return Ok(PumpOutcome::DeadlineHit);
                            }
                        }
                    }
                }
                continue;
            }
            // Any other line (id, option, copyprotection chatter, a line
            // that matches neither configured prefix) is dropped; one
            // malformed or unrecognized line never aborts the job.
        }
    }

    async fn send_line(&mut self, line: &str) -> EngineResult<()> {
        debug!("> {line}");
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(classify_io_error)?;
        self.stdin.write_all(b"\n").await.map_err(classify_io_error)?;
        self.stdin.flush().await.map_err(classify_io_error)?;
        Ok(())
    }

    /// Send the quit command, wait up to [`CLOSE_GRACE_WINDOW`], then
    /// force-kill.
    pub async fn shutdown(mut self) {
        let _ = self.send_line(&self.descriptor.quit_command).await;
        if timeout(CLOSE_GRACE_WINDOW, self.child.wait()).await.is_err() {
            let _ = self.child.kill().await;
            let _ = self.child.wait().await;
        }
    }
}

fn classify_io_error(e: std::io::Error) -> EngineError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        EngineError::BrokenPipe
    } else {
        EngineError::Io(e)
    }
}
