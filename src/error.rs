//! Crate-level error type and exit-code mapping.
//!
//! One `thiserror` enum with `#[from]` conversions at every fallible
//! boundary, no ad-hoc `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::types::EngineError;
use crate::filter::FilterParseError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("FEN parsing error: {0}")]
    FenParsing(#[from] shakmaty::fen::ParseFenError),

    #[error("position setup error: {0}")]
    PositionSetup(#[from] shakmaty::PositionError<shakmaty::Chess>),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("UCI move parsing error: {0}")]
    UciMoveParsing(#[from] shakmaty::uci::ParseUciMoveError),

    #[error("invalid SAN move: {0}")]
    InvalidSan(String),

    #[error("filter expression error: {0}")]
    Filter(#[from] FilterParseError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("protocol descriptor is missing required field `{0}`")]
    MissingDescriptorField(&'static str),

    #[error("protocol descriptor path does not resolve to an executable: {0}")]
    DescriptorNotExecutable(PathBuf),

    #[error("unreadable seed file {path}: {source}")]
    SeedFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported seed file extension: {0}")]
    UnsupportedSeedExtension(String),

    #[error("invalid duration string: {0}")]
    InvalidDuration(String),

    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed PGN: {0}")]
    PgnParse(String),
}

/// Maps each error to the process exit code it should produce.
impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingDescriptorField(_)
            | Error::DescriptorNotExecutable(_)
            | Error::Filter(_)
            | Error::InvalidDuration(_)
            | Error::Toml(_)
            | Error::UnsupportedSeedExtension(_) => 2,
            Error::SeedFileUnreadable { .. } => 2,
            Error::Json(_) => 1,
            Error::PgnParse(_) => 2,
            Error::FenParsing(_)
            | Error::PositionSetup(_)
            | Error::UciMoveParsing(_)
            | Error::IllegalMove(_)
            | Error::InvalidSan(_) => 3,
            Error::Io(_) | Error::Engine(_) => 1,
        }
    }
}

impl From<shakmaty::uci::IllegalUciMoveError> for Error {
    fn from(err: shakmaty::uci::IllegalUciMoveError) -> Self {
        Error::IllegalMove(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
