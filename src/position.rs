//! Canonical position helpers over `shakmaty::Chess`.
//!
//! Positions are treated as opaque values with a stable textual
//! serialization. Legal-move generation, FEN parsing, and board
//! representation are not reimplemented here; they are supplied by
//! `shakmaty`.

use log::warn;
use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use crate::error::{Error, Result};

/// Parse a FEN string into a position, permissively tolerating Chess960
/// castling rights (falls back to ignoring extra material rather than
/// rejecting the position outright).
pub fn parse_fen(fen: &str) -> Result<Chess> {
    let parsed: Fen = fen.parse()?;
    let pos: Chess = match parsed.into_position(CastlingMode::Chess960) {
        Ok(p) => p,
        Err(e) => {
            warn!("position error parsing FEN, ignoring extra material: {}", fen);
            e.ignore_too_much_material()?
        }
    };
    Ok(pos)
}

/// Full FEN text, including halfmove clock and fullmove number.
pub fn full_fen(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// The deduplication key used by `seen`/`analyzed`.
///
/// This crate resolves the "canonical position string" open question by
/// using the *core signature* — piece placement, side to move, castling
/// rights, and en-passant target — and dropping the halfmove clock and
/// fullmove counter. Two positions reached via different move counts but
/// otherwise identical hash to the same key, which is what the frontier's
/// cross-wave dedup is for. See DESIGN.md for the tradeoff.
pub fn canonical(pos: &Chess) -> String {
    let full = full_fen(pos);
    full.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a canonical (core-signature) string produced by [`canonical`] back
/// into a live position. The dropped halfmove clock and fullmove number are
/// restored as `0`/`1`; neither affects legal-move generation, only
/// repetition/fifty-move bookkeeping this crate does not perform.
pub fn parse_canonical(canonical: &str) -> Result<Chess> {
    parse_fen(&format!("{canonical} 0 1"))
}

/// Apply a compact UCI move (e.g. `e2e4`, `e7e8q`) to a position.
pub fn apply_uci(pos: &Chess, uci_move: &str) -> Result<Chess> {
    let uci = UciMove::from_ascii(uci_move.as_bytes())?;
    let mv = uci.to_move(pos)?;
    let mut next = pos.clone();
    next.play_unchecked(&mv);
    Ok(next)
}

/// Every legal reply to `pos`, i.e. the positions reachable by one ply.
pub fn legal_children(pos: &Chess) -> Vec<Chess> {
    pos.legal_moves()
        .iter()
        .map(|mv| {
            let mut child = pos.clone();
            child.play_unchecked(mv);
            child
        })
        .collect()
}
