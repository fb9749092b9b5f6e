//! In-memory result of one engine analysis.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::position;

/// Sentinel best-move value for a terminal position.
pub const NO_MOVE: &str = "0000";

/// A centipawn score or a signed mate distance.
///
/// Serializes as a JSON number for centipawns, or a `"#-N"`/`"#+N"` string
/// for mate distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i64),
    Mate(i32),
}

/// Mate scores compare using a magnitude beyond any finite cp value.
/// `MATE_BASE` must exceed any realistic engine cp output (engines
/// commonly clamp around +-32000).
const MATE_BASE: i64 = 10_000_000;

impl Score {
    /// A total order key: any positive mate beats any finite cp; any
    /// negative mate loses to any finite cp; mate-in-N beats mate-in-M
    /// when N < M (and symmetrically for losing mates, further-off is
    /// less bad).
    pub fn order_key(&self) -> i64 {
        match self {
            Score::Cp(cp) => *cp,
            Score::Mate(n) if *n >= 0 => MATE_BASE - *n as i64,
            Score::Mate(n) => -MATE_BASE - *n as i64,
        }
    }

    pub fn negate(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate(n) => Score::Mate(-n),
        }
    }

    pub fn mate_distance(&self) -> Option<i32> {
        match self {
            Score::Mate(n) => Some(*n),
            Score::Cp(_) => None,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Cp(cp) => serializer.serialize_i64(*cp),
            Score::Mate(n) => {
                let sign = if *n >= 0 { "+" } else { "-" };
                serializer.serialize_str(&format!("#{sign}{}", n.abs()))
            }
        }
    }
}

struct ScoreVisitor;

impl<'de> Visitor<'de> for ScoreVisitor {
    type Value = Score;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a centipawn number or a \"#+N\"/\"#-N\" mate string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Score, E> {
        Ok(Score::Cp(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Score, E> {
        Ok(Score::Cp(v as i64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Score, E> {
        Ok(Score::Cp(v as i64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Score, E> {
        let rest = v.strip_prefix('#').ok_or_else(|| {
            de::Error::custom(format!("expected mate string to start with '#', got {v}"))
        })?;
        let n: i32 = rest.parse().map_err(de::Error::custom)?;
        Ok(Score::Mate(n))
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Score, D::Error> {
        deserializer.deserialize_any(ScoreVisitor)
    }
}

/// Whether a principal variation's score is exact or a search-window bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

/// What caused an analysis job to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminatedBy {
    #[serde(rename = "node-cap")]
    NodeCap,
    #[serde(rename = "time-cap")]
    TimeCap,
    #[serde(rename = "bestmove")]
    BestMove,
    #[serde(rename = "error")]
    Error,
}

/// One principal variation.
///
/// `moves` is serialized as a single space-delimited string of compact
/// moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pv {
    pub moves: Vec<String>,
    pub score: Score,
    pub depth: u32,
    pub nodes: u64,
    /// Per-move scored breakdown, if the engine/grammar provides one.
    pub move_scores: Option<Vec<Score>>,
}

impl Pv {
    pub fn best_move(&self) -> Option<&str> {
        self.moves.first().map(String::as_str)
    }
}

impl Serialize for Pv {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut n = 4;
        if self.move_scores.is_some() {
            n += 1;
        }
        let mut s = serializer.serialize_struct("Pv", n)?;
        s.serialize_field("moves", &self.moves.join(" "))?;
        s.serialize_field("score", &self.score)?;
        s.serialize_field("depth", &self.depth)?;
        s.serialize_field("nodes", &self.nodes)?;
        if let Some(ms) = &self.move_scores {
            s.serialize_field("moveScores", ms)?;
        }
        s.end()
    }
}

impl<'de> Deserialize<'de> for Pv {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Pv, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            moves: String,
            score: Score,
            depth: u32,
            nodes: u64,
            #[serde(default, rename = "moveScores")]
            move_scores: Option<Vec<Score>>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Pv {
            moves: raw.moves.split_whitespace().map(str::to_string).collect(),
            score: raw.score,
            depth: raw.depth,
            nodes: raw.nodes,
            move_scores: raw.move_scores,
        })
    }
}

/// Output of engine processing on one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub best_move: String,
    pub bound: Bound,
    pub terminated_by: TerminatedBy,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub pv: Vec<Pv>,
}

impl Analysis {
    pub fn error() -> Analysis {
        Analysis {
            best_move: NO_MOVE.to_string(),
            bound: Bound::Exact,
            terminated_by: TerminatedBy::Error,
            pv: Vec::new(),
        }
    }

    pub fn is_no_move(&self) -> bool {
        self.best_move == NO_MOVE
    }

    pub fn best_pv(&self) -> Option<&Pv> {
        self.pv.first()
    }

    pub fn pv_at(&self, index: usize) -> Option<&Pv> {
        self.pv.get(index)
    }
}

/// The unit of work. `position` and `parent` are stored in their
/// canonical textual form — the deduplication key rather than a live
/// `shakmaty::Chess` — so a `Record` is cheap to clone and to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub position: String,
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analysis: Option<Analysis>,
}

impl Record {
    pub fn new(position: String, parent: Option<String>) -> Record {
        Record {
            position,
            parent,
            analysis: None,
        }
    }

    /// Reconstruct a live position from the stored canonical text.
    pub fn live_position(&self) -> crate::error::Result<shakmaty::Chess> {
        position::parse_canonical(&self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_beats_any_finite_cp() {
        assert!(Score::Mate(3).order_key() > Score::Cp(9999).order_key());
        assert!(Score::Mate(-3).order_key() < Score::Cp(-9999).order_key());
    }

    #[test]
    fn shorter_mate_is_better() {
        assert!(Score::Mate(2).order_key() > Score::Mate(5).order_key());
    }

    #[test]
    fn pv_round_trips_through_json() {
        let pv = Pv {
            moves: vec!["e2e4".into(), "e7e5".into()],
            score: Score::Cp(34),
            depth: 12,
            nodes: 500,
            move_scores: None,
        };
        let json = serde_json::to_string(&pv).unwrap();
        assert!(json.contains("\"moves\":\"e2e4 e7e5\""));
        let back: Pv = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pv);
    }

    #[test]
    fn mate_score_serializes_with_hash_prefix() {
        let json = serde_json::to_string(&Score::Mate(-2)).unwrap();
        assert_eq!(json, "\"#-2\"");
        let back: Score = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Score::Mate(-2));
    }
}
