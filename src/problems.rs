// src/problems.rs
//! Structured problems reported by the engine.
//!
//! Problems are ordinary values, not exceptions: relation queries and
//! inference return them in `Result`s and hosts compose them into their own
//! diagnostics. Every problem carries the printed names of the involved
//! types, their ids, and a list of nested sub-problems explaining the
//! failure in more detail. Only programmer mistakes (registering two types
//! with the same identifier but different kinds, arity abuse) panic.

#![allow(unused_assignments)] // False positives from thiserror derive

use miette::Diagnostic;
use thiserror::Error;

use crate::types::TypeId;

/// Discriminant of a [`Problem`], for hosts that group or filter by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemKind {
    KindConflict,
    TypeEquality,
    SubType,
    Conversion,
    Assignability,
    Inference,
    AmbiguousOverload,
    Initialization,
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum Problem {
    #[error("cannot relate '{left}' (kind {left_kind}) and '{right}' (kind {right_kind})")]
    #[diagnostic(code(tyr::kind_conflict))]
    KindConflict {
        left: String,
        right: String,
        left_kind: &'static str,
        right_kind: &'static str,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("types '{left}' and '{right}' are not equal")]
    #[diagnostic(code(tyr::type_equality))]
    TypeEquality {
        left: String,
        right: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("'{sub}' is not a subtype of '{sup}'")]
    #[diagnostic(code(tyr::sub_type))]
    SubType {
        sub: String,
        sup: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("no conversion from '{from}' to '{to}' is registered")]
    #[diagnostic(code(tyr::conversion))]
    Conversion {
        from: String,
        to: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("'{from}' is not assignable to '{to}'")]
    #[diagnostic(code(tyr::assignability))]
    Assignability {
        from: String,
        to: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("{message}")]
    #[diagnostic(code(tyr::inference))]
    Inference {
        message: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("call to '{name}' is ambiguous between {} candidates", .candidates.len())]
    #[diagnostic(
        code(tyr::ambiguous_overload),
        help("no overload dominates the others; add a cast or a more specific overload")
    )]
    AmbiguousOverload {
        name: String,
        candidates: Vec<String>,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },

    #[error("{message}")]
    #[diagnostic(code(tyr::initialization))]
    Initialization {
        message: String,
        involved: Vec<TypeId>,
        #[related]
        nested: Vec<Problem>,
    },
}

impl Problem {
    pub fn kind(&self) -> ProblemKind {
        match self {
            Problem::KindConflict { .. } => ProblemKind::KindConflict,
            Problem::TypeEquality { .. } => ProblemKind::TypeEquality,
            Problem::SubType { .. } => ProblemKind::SubType,
            Problem::Conversion { .. } => ProblemKind::Conversion,
            Problem::Assignability { .. } => ProblemKind::Assignability,
            Problem::Inference { .. } => ProblemKind::Inference,
            Problem::AmbiguousOverload { .. } => ProblemKind::AmbiguousOverload,
            Problem::Initialization { .. } => ProblemKind::Initialization,
        }
    }

    /// The ids of the types this problem is about, outermost first.
    pub fn involved_types(&self) -> &[TypeId] {
        match self {
            Problem::KindConflict { involved, .. }
            | Problem::TypeEquality { involved, .. }
            | Problem::SubType { involved, .. }
            | Problem::Conversion { involved, .. }
            | Problem::Assignability { involved, .. }
            | Problem::Inference { involved, .. }
            | Problem::AmbiguousOverload { involved, .. }
            | Problem::Initialization { involved, .. } => involved,
        }
    }

    /// Sub-problems explaining this one, in discovery order.
    pub fn nested_problems(&self) -> &[Problem] {
        match self {
            Problem::KindConflict { nested, .. }
            | Problem::TypeEquality { nested, .. }
            | Problem::SubType { nested, .. }
            | Problem::Conversion { nested, .. }
            | Problem::Assignability { nested, .. }
            | Problem::Inference { nested, .. }
            | Problem::AmbiguousOverload { nested, .. }
            | Problem::Initialization { nested, .. } => nested,
        }
    }

    /// Walk the nested chain down to the first problem without children.
    pub fn root_cause(&self) -> &Problem {
        match self.nested_problems().first() {
            Some(inner) => inner.root_cause(),
            None => self,
        }
    }

    /// Format the problem and its nested chain for debugging (multi-line).
    pub fn full_chain(&self) -> String {
        let mut out = self.to_string();
        for nested in self.nested_problems() {
            for line in nested.full_chain().lines() {
                out.push_str("\n  ");
                out.push_str(line);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> Problem {
        Problem::SubType {
            sub: "integer".into(),
            sup: "string".into(),
            involved: vec![TypeId(1), TypeId(2)],
            nested: vec![],
        }
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(leaf().kind(), ProblemKind::SubType);
    }

    #[test]
    fn root_cause_follows_nesting() {
        let outer = Problem::Assignability {
            from: "integer".into(),
            to: "string".into(),
            involved: vec![TypeId(1), TypeId(2)],
            nested: vec![leaf()],
        };
        assert_eq!(outer.root_cause().kind(), ProblemKind::SubType);
    }

    #[test]
    fn full_chain_indents_nested() {
        let outer = Problem::Assignability {
            from: "a".into(),
            to: "b".into(),
            involved: vec![],
            nested: vec![leaf()],
        };
        let chain = outer.full_chain();
        assert!(chain.contains("not assignable"));
        assert!(chain.contains("\n  'integer' is not a subtype"));
    }

    #[test]
    fn involved_types_exposed_uniformly() {
        assert_eq!(leaf().involved_types(), &[TypeId(1), TypeId(2)]);
    }
}
