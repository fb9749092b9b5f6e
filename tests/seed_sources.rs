//! Black-box coverage of the three seed source variants.

use puzzle_miner::position;
use puzzle_miner::seed::SeedSource;

#[test]
fn fen_list_skips_comments_blanks_and_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seeds.txt");
    std::fs::write(
        &path,
        "# opening positions\n\
         \n\
         rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\n\
         this is not a fen\n\
         6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1\n",
    )
    .unwrap();

    let seeds = SeedSource::FenList(path).produce().unwrap();
    assert_eq!(seeds.len(), 2);
    for s in &seeds {
        assert!(s.parent.is_none());
        position::parse_canonical(&s.position).unwrap();
    }
}

#[test]
fn fen_list_rejects_unreadable_path() {
    let err = SeedSource::FenList("/nonexistent/does-not-exist.txt".into())
        .produce()
        .unwrap_err();
    assert!(err.to_string().contains("unreadable"));
}

#[test]
fn pgn_seed_source_walks_mainline_and_variations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.pgn");
    std::fs::write(&path, "[Event \"Test\"]\n\n1. e4 e5 (1... c5 2. Nf3 Nc6) 2. Nf3 *\n").unwrap();

    let seeds = SeedSource::Pgn(path).produce().unwrap();
    // e4, e5, c5, Nf3(variation), Nc6(variation), Nf3(mainline) = 6 plies.
    assert_eq!(seeds.len(), 6);
    for s in &seeds {
        position::parse_canonical(&s.position).unwrap();
    }
    // Every non-opening ply records a parent for PGN-like reconstruction.
    assert!(seeds.iter().all(|s| s.parent.is_some()));
}

#[test]
fn random_standard_and_chess960_seeds_are_distinct_legal_starts() {
    let standard = SeedSource::Random {
        count: 16,
        chess960: false,
    }
    .produce()
    .unwrap();
    let c960 = SeedSource::Random {
        count: 16,
        chess960: true,
    }
    .produce()
    .unwrap();
    assert_eq!(standard.len(), 16);
    assert_eq!(c960.len(), 16);
    for s in standard.iter().chain(c960.iter()) {
        position::parse_canonical(&s.position).unwrap();
    }
}
