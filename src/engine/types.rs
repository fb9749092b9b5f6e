//! Engine session error and lifecycle types.

use std::time::Duration;

use thiserror::Error;

/// Timeout for the UCI handshake (uci/uciok, isready/readyok).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace window after sending the stop command, to absorb the engine's
/// final bestmove line.
pub const STOP_GRACE_WINDOW: Duration = Duration::from_millis(250);

/// Per-session wait before a forced kill on pool closure.
pub const CLOSE_GRACE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake with engine timed out")]
    HandshakeTimeout,

    #[error("engine process has no stdin handle")]
    NoStdin,

    #[error("engine process has no stdout handle")]
    NoStdout,

    #[error("broken pipe talking to engine")]
    BrokenPipe,

    #[error("engine job timed out waiting for a response")]
    Timeout,

    #[error("invalid engine state: expected {expected:?}, got {actual:?}")]
    InvalidState { expected: EngineState, actual: EngineState },

    #[error("engine exited unexpectedly during analysis")]
    UnexpectedExit,

    #[error("FEN parsing error: {0}")]
    FenParsing(#[from] shakmaty::fen::ParseFenError),

    #[error("position setup error: {0}")]
    PositionSetup(#[from] shakmaty::PositionError<shakmaty::Chess>),

    #[error("UCI move parsing error: {0}")]
    UciMoveParsing(#[from] shakmaty::uci::ParseUciMoveError),

    #[error("illegal move: {0}")]
    IllegalMove(String),
}

impl From<shakmaty::uci::IllegalUciMoveError> for EngineError {
    fn from(err: shakmaty::uci::IllegalUciMoveError) -> Self {
        EngineError::IllegalMove(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Lifecycle states:
/// `Spawning -> Handshaking -> Idle -> Analyzing -> Idle ... -> Closing -> Closed`,
/// with `Failed` as a terminal error state reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Spawning,
    Handshaking,
    Idle,
    Analyzing,
    Closing,
    Closed,
    Failed,
}

impl EngineState {
    pub fn is_usable(&self) -> bool {
        matches!(self, EngineState::Idle)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Closed | EngineState::Failed)
    }
}
