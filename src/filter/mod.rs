//! The filter DSL: parsing, evaluation, and the
//! puzzle-verify/accelerate composition rules used by the frontier.

mod ast;
mod eval;
mod parser;

pub use ast::{Comparator, Field, Filter, Operand, Predicate};
pub use eval::{eval, EvalContext};
pub use parser::{parse, FilterParseError};

/// Compose the three named filters the CLI accepts into the single
/// "puzzle-verify" predicate a candidate position must satisfy:
/// `quality AND (winning OR drawing)`.
pub fn compose_puzzle_verify(quality: &Filter, winning: &Filter, drawing: &Filter) -> Filter {
    Filter::And(vec![
        quality.clone(),
        Filter::Or(vec![winning.clone(), drawing.clone()]),
    ])
}

/// Reject `accelerate` expressions that reference `diff` or `pvCount`:
/// early-stop predicates are restricted to fields that only grow more
/// informative as search effort increases, never ones that can swing
/// back down mid-search.
pub fn validate_accelerate(filter: &Filter) -> Result<(), FilterParseError> {
    if filter.references_nonmonotone_field() {
        return Err(FilterParseError {
            message: "accelerate expressions cannot reference `diff` or `pvCount`".to_string(),
            column: 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accelerate_rejects_diff() {
        let f = parse("diff >= 100").unwrap();
        assert!(validate_accelerate(&f).is_err());
    }

    #[test]
    fn accelerate_rejects_pvcount() {
        let f = parse("pvCount >= 3").unwrap();
        assert!(validate_accelerate(&f).is_err());
    }

    #[test]
    fn accelerate_accepts_monotone_fields() {
        let f = parse("depth >= 20 OR nodes >= 1000000").unwrap();
        assert!(validate_accelerate(&f).is_ok());
    }

    #[test]
    fn accelerate_rejects_diff_referenced_as_operand() {
        let f = parse("score >= diff").unwrap();
        assert!(validate_accelerate(&f).is_err());
    }

    #[test]
    fn compose_puzzle_verify_matches_and_or_shape() {
        let q = parse("depth >= 10").unwrap();
        let w = parse("score >= 200").unwrap();
        let d = parse("score <= 20 AND score >= -20").unwrap();
        let composed = compose_puzzle_verify(&q, &w, &d);
        match composed {
            Filter::And(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[1], Filter::Or(_)));
            }
            other => panic!("expected top-level AND, got {other:?}"),
        }
    }
}
