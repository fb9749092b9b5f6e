//! Filter DSL abstract syntax.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

/// A field selector, optionally indexed (`score[k]`); default index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Score(usize),
    Mate(usize),
    Nodes,
    Depth,
    PvCount,
    Diff,
    Bound,
    SideToMove,
}

/// A literal or field reference on the right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Mate(i32),
    /// A bare word that isn't a recognized field name (`exact`, `white`, ...).
    Symbol(String),
    Field(Field),
    None,
}

/// Field names recognized by [`crate::filter::parser`]; a bare identifier
/// that isn't one of these is a symbolic constant instead of a field
/// reference.
pub const FIELD_NAMES: &[&str] =
    &["score", "mate", "nodes", "depth", "pvCount", "diff", "bound", "sideToMove"];

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub op: Comparator,
    pub operand: Operand,
}

/// The filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Predicate(Predicate),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Const(bool),
}

impl Filter {
    /// True iff the `diff` or `pvCount` fields appear anywhere in the tree,
    /// either as the predicate field or as a field-reference operand. Used
    /// to enforce the `accelerate` restriction.
    pub fn references_nonmonotone_field(&self) -> bool {
        fn is_nonmonotone(f: &Field) -> bool {
            matches!(f, Field::Diff | Field::PvCount)
        }
        match self {
            Filter::Predicate(p) => {
                is_nonmonotone(&p.field)
                    || matches!(&p.operand, Operand::Field(f) if is_nonmonotone(f))
            }
            Filter::And(fs) | Filter::Or(fs) => fs.iter().any(Filter::references_nonmonotone_field),
            Filter::Not(f) => f.references_nonmonotone_field(),
            Filter::Const(_) => false,
        }
    }
}
