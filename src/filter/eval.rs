//! Total evaluator for the filter DSL.

use crate::analysis::{Analysis, Score};
use shakmaty::Color;

use super::ast::{Comparator, Field, Filter, Operand, Predicate};

/// Everything a filter predicate can be evaluated against. `side_to_move`
/// is supplied separately from `Analysis` because the analysis record
/// itself carries no board state.
pub struct EvalContext<'a> {
    pub analysis: &'a Analysis,
    pub side_to_move: Option<Color>,
}

impl<'a> EvalContext<'a> {
    pub fn new(analysis: &'a Analysis, side_to_move: Option<Color>) -> EvalContext<'a> {
        EvalContext { analysis, side_to_move }
    }
}

/// A resolved field or operand value. `NoneValue` is the DSL's explicit
/// `NONE` marker (e.g. `mate[0]` when the best PV has no forced mate); it is
/// distinct from a field that cannot be resolved at all (an out-of-range
/// PV index), which short-circuits the enclosing predicate to `false`
/// instead of participating in a comparison.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Num(f64),
    Sym(String),
    NoneValue,
}

fn resolve_field(field: Field, ctx: &EvalContext) -> Option<Value> {
    let analysis = ctx.analysis;
    match field {
        Field::Score(k) => analysis.pv_at(k).map(|pv| Value::Num(pv.score.order_key() as f64)),
        Field::Mate(k) => analysis.pv_at(k).map(|pv| match pv.score.mate_distance() {
            Some(n) => Value::Num(Score::Mate(n).order_key() as f64),
            None => Value::NoneValue,
        }),
        Field::Nodes => analysis.best_pv().map(|pv| Value::Num(pv.nodes as f64)),
        Field::Depth => analysis.best_pv().map(|pv| Value::Num(pv.depth as f64)),
        Field::PvCount => Some(Value::Num(analysis.pv.len() as f64)),
        Field::Diff => {
            if analysis.pv.len() < 2 {
                Some(Value::NoneValue)
            } else {
                let a = analysis.pv[0].score.order_key();
                let b = analysis.pv[1].score.order_key();
                Some(Value::Num((a - b) as f64))
            }
        }
        Field::Bound => Some(Value::Sym(bound_name(analysis.bound))),
        Field::SideToMove => ctx.side_to_move.map(|c| {
            Value::Sym(
                match c {
                    Color::White => "white",
                    Color::Black => "black",
                }
                .to_string(),
            )
        }),
    }
}

fn bound_name(bound: crate::analysis::Bound) -> String {
    use crate::analysis::Bound;
    match bound {
        Bound::Exact => "exact",
        Bound::Lower => "lower",
        Bound::Upper => "upper",
    }
    .to_string()
}

fn resolve_operand(operand: &Operand, ctx: &EvalContext) -> Option<Value> {
    match operand {
        Operand::Number(n) => Some(Value::Num(*n)),
        Operand::Mate(n) => Some(Value::Num(Score::Mate(*n).order_key() as f64)),
        Operand::Symbol(s) => Some(Value::Sym(s.clone())),
        Operand::Field(f) => resolve_field(*f, ctx),
        Operand::None => Some(Value::NoneValue),
    }
}

fn apply_numeric(op: Comparator, l: f64, r: f64) -> bool {
    match op {
        Comparator::Lt => l < r,
        Comparator::Le => l <= r,
        Comparator::Eq => l == r,
        Comparator::Ne => l != r,
        Comparator::Ge => l >= r,
        Comparator::Gt => l > r,
    }
}

fn apply_symbolic(op: Comparator, l: &str, r: &str) -> bool {
    match op {
        Comparator::Lt => l < r,
        Comparator::Le => l <= r,
        Comparator::Eq => l == r,
        Comparator::Ne => l != r,
        Comparator::Ge => l >= r,
        Comparator::Gt => l > r,
    }
}

fn eval_predicate(pred: &Predicate, ctx: &EvalContext) -> bool {
    let Some(left) = resolve_field(pred.field, ctx) else {
        return false;
    };
    let Some(right) = resolve_operand(&pred.operand, ctx) else {
        return false;
    };
    match (&left, &right) {
        (Value::NoneValue, _) | (_, Value::NoneValue) => pred.op == Comparator::Ne,
        (Value::Num(l), Value::Num(r)) => apply_numeric(pred.op, *l, *r),
        (Value::Sym(l), Value::Sym(r)) => apply_symbolic(pred.op, l, r),
        // A symbol compared against a number is a type mismatch; the DSL
        // has no coercion rule for it, so it is never satisfied.
        (Value::Sym(_), Value::Num(_)) | (Value::Num(_), Value::Sym(_)) => false,
    }
}

/// Evaluate a filter tree against an analysis. Total: every branch returns
/// a boolean, never an error.
pub fn eval(filter: &Filter, ctx: &EvalContext) -> bool {
    match filter {
        Filter::Predicate(p) => eval_predicate(p, ctx),
        Filter::And(terms) => terms.iter().all(|f| eval(f, ctx)),
        Filter::Or(terms) => terms.iter().any(|f| eval(f, ctx)),
        Filter::Not(inner) => !eval(inner, ctx),
        Filter::Const(b) => *b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Bound, Pv, TerminatedBy};
    use crate::filter::parser::parse;

    fn analysis_with(pvs: Vec<Pv>) -> Analysis {
        Analysis {
            best_move: pvs.first().and_then(|p| p.best_move()).unwrap_or("0000").to_string(),
            bound: Bound::Exact,
            terminated_by: TerminatedBy::BestMove,
            pv: pvs,
        }
    }

    fn pv(score: Score, depth: u32, nodes: u64) -> Pv {
        Pv {
            moves: vec!["e2e4".into()],
            score,
            depth,
            nodes,
            move_scores: None,
        }
    }

    #[test]
    fn depth_threshold_matches() {
        let a = analysis_with(vec![pv(Score::Cp(50), 18, 100_000)]);
        let ctx = EvalContext::new(&a, Some(Color::White));
        let f = parse("depth >= 15").unwrap();
        assert!(eval(&f, &ctx));
        let f = parse("depth >= 20").unwrap();
        assert!(!eval(&f, &ctx));
    }

    #[test]
    fn mate_beats_cp_threshold() {
        let a = analysis_with(vec![pv(Score::Mate(4), 30, 1)]);
        let ctx = EvalContext::new(&a, None);
        let f = parse("score >= 100000").unwrap();
        assert!(eval(&f, &ctx));
    }

    #[test]
    fn missing_pv_index_is_false_not_error() {
        let a = analysis_with(vec![pv(Score::Cp(10), 10, 10)]);
        let ctx = EvalContext::new(&a, None);
        let f = parse("score[3] > -1000000").unwrap();
        assert!(!eval(&f, &ctx));
    }

    #[test]
    fn mate_field_none_comparison() {
        let a = analysis_with(vec![pv(Score::Cp(10), 10, 10)]);
        let ctx = EvalContext::new(&a, None);
        assert!(eval(&parse("mate[0] != NONE").unwrap(), &ctx));
        assert!(!eval(&parse("mate[0] = NONE").unwrap(), &ctx));
    }

    #[test]
    fn diff_is_none_with_single_pv() {
        let a = analysis_with(vec![pv(Score::Cp(10), 10, 10)]);
        let ctx = EvalContext::new(&a, None);
        assert!(eval(&parse("diff != NONE").unwrap(), &ctx));
    }

    #[test]
    fn and_or_not_compose() {
        let a = analysis_with(vec![pv(Score::Cp(80), 20, 5000), pv(Score::Cp(10), 18, 3000)]);
        let ctx = EvalContext::new(&a, Some(Color::White));
        let f = parse("depth >= 20 AND (diff >= 50 OR sideToMove = black)").unwrap();
        assert!(eval(&f, &ctx));
        let f = parse("NOT (depth >= 20)").unwrap();
        assert!(!eval(&f, &ctx));
    }

    #[test]
    fn bound_symbol_equality() {
        let a = analysis_with(vec![pv(Score::Cp(10), 10, 10)]);
        let ctx = EvalContext::new(&a, None);
        assert!(eval(&parse("bound = exact").unwrap(), &ctx));
        assert!(!eval(&parse("bound = lower").unwrap(), &ctx));
    }
}
