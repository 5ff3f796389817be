// src/validation.rs
//
// The validation collector: an ordered list of host-written rules that run
// on host nodes and surface issues. Validation never fails - rules return
// issue lists (possibly empty) and `validate` concatenates them. Rules may
// query the relation services directly; `ensure_node_is_assignable` is the
// stock constraint for assignment-like checks.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::TypeEngine;
use crate::problems::Problem;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One issue surfaced by a validation rule.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub message: String,
    /// The underlying relation or inference problem, when one exists.
    pub problem: Option<Problem>,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            problem: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            problem: None,
        }
    }

    pub fn with_problem(mut self, problem: Problem) -> Self {
        self.problem = Some(problem);
        self
    }
}

pub type ValidationRuleFn<N> = dyn Fn(&N, &TypeEngine<N>) -> Vec<ValidationIssue>;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ValidationHandle(u32);

struct ValidationEntry<N> {
    handle: ValidationHandle,
    rule: Box<ValidationRuleFn<N>>,
}

pub(crate) struct ValidationRegistry<N> {
    next: u32,
    rules: Vec<ValidationEntry<N>>,
    by_type: FxHashMap<TypeId, SmallVec<[ValidationHandle; 2]>>,
}

impl<N> ValidationRegistry<N> {
    pub(crate) fn new() -> Self {
        Self {
            next: 0,
            rules: Vec::new(),
            by_type: FxHashMap::default(),
        }
    }

    fn add(
        &mut self,
        rule: Box<ValidationRuleFn<N>>,
        bound_to: Option<TypeId>,
    ) -> ValidationHandle {
        let handle = ValidationHandle(self.next);
        self.next += 1;
        self.rules.push(ValidationEntry { handle, rule });
        if let Some(ty) = bound_to {
            self.by_type.entry(ty).or_default().push(handle);
        }
        handle
    }

    fn remove(&mut self, handle: ValidationHandle) -> bool {
        let before = self.rules.len();
        self.rules.retain(|entry| entry.handle != handle);
        for handles in self.by_type.values_mut() {
            handles.retain(|h| *h != handle);
        }
        self.rules.len() != before
    }

    pub(crate) fn evict_for_type(&mut self, ty: TypeId) {
        if let Some(handles) = self.by_type.remove(&ty) {
            self.rules.retain(|entry| !handles.contains(&entry.handle));
        }
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Register a validation rule. Rules run in registration order.
    pub fn add_validation_rule(
        &mut self,
        rule: impl Fn(&N, &TypeEngine<N>) -> Vec<ValidationIssue> + 'static,
    ) -> ValidationHandle {
        self.validation.add(Box::new(rule), None)
    }

    /// Register a validation rule tied to a type's lifetime; it is removed
    /// when the type is.
    pub fn add_validation_rule_for(
        &mut self,
        bound_to: TypeId,
        rule: impl Fn(&N, &TypeEngine<N>) -> Vec<ValidationIssue> + 'static,
    ) -> ValidationHandle {
        let bound_to = self.canonical_id(bound_to);
        self.validation.add(Box::new(rule), Some(bound_to))
    }

    pub fn remove_validation_rule(&mut self, handle: ValidationHandle) -> bool {
        self.validation.remove(handle)
    }

    /// Run every validation rule on the node and concatenate the issues.
    pub fn validate(&self, node: &N) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for entry in &self.validation.rules {
            issues.extend((entry.rule)(node, self));
        }
        issues
    }

    /// Stock constraint: the inferred type of `actual` must be assignable
    /// to the inferred type of `expected`. The message function renders the
    /// host-facing text from the underlying problem.
    pub fn ensure_node_is_assignable(
        &self,
        actual: &N,
        expected: &N,
        severity: Severity,
        message: impl Fn(&Problem) -> String,
    ) -> Vec<ValidationIssue> {
        let actual_type = match self.infer_type(actual) {
            Ok(ty) => ty,
            Err(problem) => {
                let text = message(&problem);
                return vec![ValidationIssue {
                    severity,
                    message: text,
                    problem: Some(problem),
                }];
            }
        };
        let expected_type = match self.infer_type(expected) {
            Ok(ty) => ty,
            Err(problem) => {
                let text = message(&problem);
                return vec![ValidationIssue {
                    severity,
                    message: text,
                    problem: Some(problem),
                }];
            }
        };
        match self.assignability_result(actual_type, expected_type) {
            Ok(_) => vec![],
            Err(problem) => {
                let text = message(&problem);
                vec![ValidationIssue {
                    severity,
                    message: text,
                    problem: Some(problem),
                }]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::RuleVerdict;

    #[derive(Debug, Clone, PartialEq)]
    enum Node {
        Int,
        Str,
        Assign(Box<Node>, Box<Node>),
    }

    fn engine() -> TypeEngine<Node> {
        let mut engine: TypeEngine<Node> = TypeEngine::new();
        let int = engine.create_primitive("integer");
        let s = engine.create_primitive("string");
        engine.add_inference_rule(move |node, _| match node {
            Node::Int => RuleVerdict::Type(int),
            Node::Str => RuleVerdict::Type(s),
            _ => RuleVerdict::NotApplicable,
        });
        engine
    }

    #[test]
    fn rules_run_in_order_and_concatenate() {
        let mut engine = engine();
        engine.add_validation_rule(|_, _| vec![ValidationIssue::warning("first")]);
        engine.add_validation_rule(|_, _| vec![]);
        engine.add_validation_rule(|_, _| vec![ValidationIssue::error("third")]);

        let issues = engine.validate(&Node::Int);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].message, "first");
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(issues[1].message, "third");
        assert_eq!(issues[1].severity, Severity::Error);
    }

    #[test]
    fn removed_rule_stops_reporting() {
        let mut engine = engine();
        let handle =
            engine.add_validation_rule(|_, _| vec![ValidationIssue::error("boom")]);
        assert_eq!(engine.validate(&Node::Int).len(), 1);
        assert!(engine.remove_validation_rule(handle));
        assert!(engine.validate(&Node::Int).is_empty());
    }

    #[test]
    fn assignment_rule_uses_assignability() {
        let mut engine = engine();
        engine.add_validation_rule(|node, engine| match node {
            Node::Assign(lhs, rhs) => engine.ensure_node_is_assignable(
                rhs,
                lhs,
                Severity::Error,
                |problem| format!("cannot assign: {problem}"),
            ),
            _ => vec![],
        });

        let ok = Node::Assign(Box::new(Node::Int), Box::new(Node::Int));
        assert!(engine.validate(&ok).is_empty());

        let bad = Node::Assign(Box::new(Node::Int), Box::new(Node::Str));
        let issues = engine.validate(&bad);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("cannot assign"));
        assert!(issues[0].problem.is_some());
    }

    #[test]
    fn validation_never_throws_on_uninferable_nodes() {
        let mut engine = engine();
        engine.add_validation_rule(|node, engine| match node {
            Node::Assign(lhs, rhs) => engine.ensure_node_is_assignable(
                rhs,
                lhs,
                Severity::Error,
                |problem| problem.to_string(),
            ),
            _ => vec![],
        });
        // Assign of an Assign has no inference rule; the constraint turns
        // the inference failure into an issue instead of failing.
        let weird = Node::Assign(
            Box::new(Node::Assign(Box::new(Node::Int), Box::new(Node::Int))),
            Box::new(Node::Int),
        );
        let issues = engine.validate(&weird);
        assert_eq!(issues.len(), 1);
    }
}
