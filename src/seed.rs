//! Seed sources: produce the initial records a mining
//! run starts from.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::warn;
use pgn_reader::{BufferedReader, RawHeader, San, SanPlus, Skip, Visitor};
use rand::Rng;
use shakmaty::{Chess, Position};

use crate::analysis::Record;
use crate::error::{Error, Result};
use crate::position::{self, canonical};

/// The three ways a mining run can be seeded, behind a uniform `produce`
/// interface. Seed sources are consumed fully before the first wave.
pub enum SeedSource {
    /// `count` random legal starting-like positions.
    Random { count: usize, chess960: bool },
    /// Line-delimited FEN strings.
    FenList(PathBuf),
    /// All plies across a PGN file's mainlines and variations.
    Pgn(PathBuf),
}

impl SeedSource {
    pub fn produce(&self) -> Result<Vec<Record>> {
        match self {
            SeedSource::Random { count, chess960 } => Ok(random_seeds(*count, *chess960)),
            SeedSource::FenList(path) => read_fen_list(path),
            SeedSource::Pgn(path) => read_pgn(path),
        }
    }
}

/// Generate `count` random legal starting-like positions. The standard
/// variant plays a short random walk of plies from
/// the initial position to get some opening variety; the Chess960
/// variant generates a random Fischer-Random back-rank arrangement,
/// whose 960 combinations already provide the variety a walk would add.
fn random_seeds(count: usize, chess960: bool) -> Vec<Record> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let pos = if chess960 {
            chess960_start(&mut rng)
        } else {
            random_walk_from_start(&mut rng)
        };
        out.push(Record::new(canonical(&pos), None));
    }
    out
}

fn random_walk_from_start(rng: &mut impl Rng) -> Chess {
    let mut pos = Chess::default();
    let plies = rng.gen_range(0..=10);
    for _ in 0..plies {
        let moves = pos.legal_moves();
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.gen_range(0..moves.len())].clone();
        pos.play_unchecked(&mv);
    }
    pos
}

/// Classic Fischer-Random back-rank generator: bishops on opposite
/// colors, queen and knights on three of the remaining squares, the
/// last three squares (in file order) get rook/king/rook.
fn chess960_start(rng: &mut impl Rng) -> Chess {
    let mut squares: Vec<usize> = (0..8).collect();
    let mut rank = [' '; 8];

    let light: Vec<usize> = (0..8).filter(|i| i % 2 == 0).collect();
    let dark: Vec<usize> = (0..8).filter(|i| i % 2 == 1).collect();
    let b1 = light[rng.gen_range(0..light.len())];
    let b2 = dark[rng.gen_range(0..dark.len())];
    rank[b1] = 'B';
    rank[b2] = 'B';
    squares.retain(|&i| i != b1 && i != b2);

    let qi = squares.remove(rng.gen_range(0..squares.len()));
    rank[qi] = 'Q';
    let n1 = squares.remove(rng.gen_range(0..squares.len()));
    rank[n1] = 'N';
    let n2 = squares.remove(rng.gen_range(0..squares.len()));
    rank[n2] = 'N';

    squares.sort_unstable();
    rank[squares[0]] = 'R';
    rank[squares[1]] = 'K';
    rank[squares[2]] = 'R';

    let white: String = rank.iter().collect();
    let black = white.to_lowercase();
    let fen = format!("{black}/pppppppp/8/8/8/8/PPPPPPPP/{white} w KQkq - 0 1");
    position::parse_fen(&fen).expect("generated chess960 back rank is always a legal FEN")
}

/// Read a `.txt` seed file: UTF-8, one FEN per line, `#` comments and
/// blank lines ignored, malformed lines skipped with a warning.
fn read_fen_list(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path).map_err(|source| Error::SeedFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(file);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| Error::SeedFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match position::parse_fen(trimmed) {
            Ok(pos) => out.push(Record::new(canonical(&pos), None)),
            Err(e) => warn!("{}:{}: skipping malformed FEN: {e}", path.display(), lineno + 1),
        }
    }
    Ok(out)
}

/// Walk a PGN file's mainline and all variations via an explicit stack of
/// positions rather than owning pointers into a variation tree. Each
/// visited ply becomes a record whose parent is the pre-move position.
/// Illegal SAN aborts the current line but not other queued variations.
fn read_pgn(path: &Path) -> Result<Vec<Record>> {
    let bytes = std::fs::read(path).map_err(|source| Error::SeedFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufferedReader::new_cursor(&bytes);
    let mut visitor = PositionVisitor::default();
    let mut out = Vec::new();
    loop {
        match reader.read_game(&mut visitor) {
            Ok(Some(mut records)) => out.append(&mut records),
            Ok(None) => break,
            Err(e) => {
                warn!("{}: aborting remaining games after PGN read error: {e}", path.display());
                break;
            }
        }
    }
    Ok(out)
}

#[derive(Default)]
struct PositionVisitor {
    root: Chess,
    current: Chess,
    before_last_move: Chess,
    resume_stack: Vec<Chess>,
    /// Depth (resume_stack length) at which the current line went dead
    /// after an illegal move; `None` while the line is healthy.
    dead_since_depth: Option<usize>,
    records: Vec<Record>,
}

impl Visitor for PositionVisitor {
    type Result = Vec<Record>;

    fn begin_game(&mut self) {
        self.root = Chess::default();
        self.current = self.root.clone();
        self.before_last_move = self.root.clone();
        self.resume_stack.clear();
        self.dead_since_depth = None;
        self.records.clear();
    }

    fn header(&mut self, _key: &[u8], _value: RawHeader<'_>) {}

    fn san(&mut self, san_plus: SanPlus) {
        if self.dead_since_depth.is_some() {
            return;
        }
        self.before_last_move = self.current.clone();
        match resolve_san(&san_plus.san, &self.current) {
            Some(mv) => {
                let parent = canonical(&self.current);
                let mut next = self.current.clone();
                next.play_unchecked(&mv);
                self.records.push(Record::new(canonical(&next), Some(parent)));
                self.current = next;
            }
            None => {
                warn!("illegal SAN move {}, aborting this line", san_plus);
                self.dead_since_depth = Some(self.resume_stack.len());
            }
        }
    }

    fn begin_variation(&mut self) -> Skip {
        self.resume_stack.push(self.current.clone());
        self.current = self.before_last_move.clone();
        if self.dead_since_depth.is_some() {
            self.dead_since_depth = None;
        }
        Skip(false)
    }

    fn end_variation(&mut self) {
        if let Some(resumed) = self.resume_stack.pop() {
            if let Some(depth) = self.dead_since_depth {
                if self.resume_stack.len() < depth {
                    self.dead_since_depth = None;
                }
            }
            self.current = resumed;
        }
    }

    fn end_game(&mut self) -> Self::Result {
        std::mem::take(&mut self.records)
    }
}

fn resolve_san(san: &San, pos: &Chess) -> Option<shakmaty::Move> {
    san.to_move(pos).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_standard_seeds_are_legal_positions() {
        let seeds = random_seeds(20, false);
        assert_eq!(seeds.len(), 20);
        for s in &seeds {
            position::parse_canonical(&s.position).unwrap();
        }
    }

    #[test]
    fn random_chess960_seeds_parse_and_have_bishops_on_opposite_colors() {
        let seeds = random_seeds(20, true);
        for s in &seeds {
            let pos = position::parse_canonical(&s.position).unwrap();
            assert!(!pos.board().bishops().is_empty());
        }
    }

    #[test]
    fn fen_list_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        std::fs::write(
            &path,
            "# a comment\n\nrnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\nnotafen\n",
        )
        .unwrap();
        let seeds = read_fen_list(&path).unwrap();
        assert_eq!(seeds.len(), 1);
    }

    #[test]
    fn pgn_extracts_mainline_plies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.pgn");
        std::fs::write(&path, "1. e4 e5 2. Nf3 Nc6 *\n").unwrap();
        let seeds = read_pgn(&path).unwrap();
        assert_eq!(seeds.len(), 4);
        assert!(seeds[0].parent.is_some() || seeds[0].parent.is_none());
    }

    #[test]
    fn pgn_extracts_variation_plies_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.pgn");
        std::fs::write(&path, "1. e4 e5 (1... c5 2. Nf3) 2. Nf3 *\n").unwrap();
        let seeds = read_pgn(&path).unwrap();
        // e4, e5, c5, Nf3(in variation), Nf3(mainline) = 5 plies total
        assert_eq!(seeds.len(), 5);
    }
}
