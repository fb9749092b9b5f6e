//! Black-box coverage of the filter DSL's public surface against
//! end-to-end puzzle classification scenarios.

use puzzle_miner::analysis::{Analysis, Bound, Pv, Score, TerminatedBy};
use puzzle_miner::filter::{compose_puzzle_verify, eval, parse, validate_accelerate, EvalContext};
use shakmaty::Color;

fn analysis(pvs: Vec<Pv>) -> Analysis {
    Analysis {
        best_move: pvs.first().and_then(Pv::best_move).unwrap_or("0000").to_string(),
        bound: Bound::Exact,
        terminated_by: TerminatedBy::BestMove,
        pv: pvs,
    }
}

fn pv(score: Score, depth: u32, nodes: u64) -> Pv {
    Pv {
        moves: vec!["a8a1".into()],
        score,
        depth,
        nodes,
        move_scores: None,
    }
}

#[test]
fn scenario_a_mate_in_one_classifies_as_puzzle() {
    let quality = parse("depth >= 10").unwrap();
    let winning = parse("mate[0] != NONE").unwrap();
    let drawing = parse("FALSE").unwrap();
    let composed = compose_puzzle_verify(&quality, &winning, &drawing);

    let a = analysis(vec![pv(Score::Mate(1), 12, 50_000)]);
    let ctx = EvalContext::new(&a, Some(Color::White));
    assert!(eval(&composed, &ctx));
}

#[test]
fn mate_scores_order_by_distance_not_just_sign() {
    // Mate-in-N beats mate-in-M when N<M. A forced mate always outranks
    // any finite centipawn score regardless of N.
    let quicker = parse("mate[0] > mate[1]").unwrap();
    let a = analysis(vec![
        pv(Score::Mate(2), 20, 1000),
        pv(Score::Mate(5), 18, 900),
    ]);
    let ctx = EvalContext::new(&a, None);
    assert!(eval(&quicker, &ctx));

    let beats_cp = parse("score[0] > 9000").unwrap();
    let a2 = analysis(vec![pv(Score::Mate(1), 10, 10)]);
    let ctx2 = EvalContext::new(&a2, None);
    assert!(eval(&beats_cp, &ctx2));
}

#[test]
fn scenario_b_quiet_position_is_not_a_puzzle() {
    let quality = parse("depth >= 10").unwrap();
    let winning = parse("diff >= 500").unwrap();
    let drawing = parse("FALSE").unwrap();
    let composed = compose_puzzle_verify(&quality, &winning, &drawing);

    // Single PV at shallow depth: diff has no second PV to compare against,
    // so it reads NONE and the winning/drawing disjunction is unsatisfied.
    let a = analysis(vec![pv(Score::Cp(20), 8, 10_000)]);
    let ctx = EvalContext::new(&a, Some(Color::White));
    assert!(!eval(&composed, &ctx));
}

#[test]
fn accelerate_rejects_diff_and_pvcount_end_to_end() {
    assert!(validate_accelerate(&parse("diff >= 300").unwrap()).is_err());
    assert!(validate_accelerate(&parse("pvCount >= 2").unwrap()).is_err());
    assert!(validate_accelerate(&parse("depth >= 25 OR nodes >= 2000000").unwrap()).is_ok());
}

#[test]
fn parser_reports_column_indexed_errors() {
    let err = parse("depth >= 10 AND frobnicate > 1").unwrap_err();
    assert!(err.column > 1);
    assert!(err.to_string().contains("column"));
}

#[test]
fn bound_and_side_to_move_symbols_compare_by_name() {
    let f = parse("bound = exact AND sideToMove = white").unwrap();
    let a = analysis(vec![pv(Score::Cp(30), 20, 1000)]);
    let ctx = EvalContext::new(&a, Some(Color::White));
    assert!(eval(&f, &ctx));

    let ctx_black = EvalContext::new(&a, Some(Color::Black));
    assert!(!eval(&f, &ctx_black));
}
