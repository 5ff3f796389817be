// src/relations/assignability.rs
//
// Assignability: a shortest path from source to target whose steps are
// drawn from identity, subtype edges, and implicit conversion edges.
// Explicit-only conversions are never even enumerated. Among equal-length
// paths the subtype-first expansion order makes BFS prefer subtype steps
// over conversion steps, left to right.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::engine::TypeEngine;
use crate::graph::{ConversionMode, EdgeId, EdgeLabel};
use crate::problems::Problem;
use crate::relations::Relator;
use crate::types::TypeId;

/// Relation proved by one step of an assignability path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    SubType,
    ImplicitConversion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignabilityStep {
    pub from: TypeId,
    pub to: TypeId,
    pub kind: StepKind,
    /// The graph edge proving this step; kind-intrinsic subtype closure
    /// steps (top/bottom, fixed-parameters variance) carry no edge.
    pub edge: Option<EdgeId>,
}

/// Proof that a value of the source type may be used where the target type
/// is expected. Identity paths are empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssignabilityPath {
    pub steps: Vec<AssignabilityStep>,
}

impl AssignabilityPath {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// True when source and target were identical or equal types.
    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }
}

impl<'a> Relator<'a> {
    pub(crate) fn assignability(
        &self,
        from: TypeId,
        to: TypeId,
    ) -> Result<AssignabilityPath, Problem> {
        let from = self.canonical(from);
        let to = self.canonical(to);
        self.require(from)?;
        self.require(to)?;

        if self.are_types_equal(from, to).is_ok() {
            return Ok(AssignabilityPath::default());
        }

        let key = (from, to);
        if let Some(hit) = self.caches.assignability_hit(key) {
            tracing::trace!(?key, "assignability cache hit");
            return hit;
        }
        let result = self.search_path(from, to);
        self.caches
            .assignability
            .borrow_mut()
            .insert(key, result.clone());
        result
    }

    fn search_path(&self, from: TypeId, to: TypeId) -> Result<AssignabilityPath, Problem> {
        // Single-step fast paths before searching, in preference order.
        let single = |kind: StepKind, edge: Option<EdgeId>| {
            Ok(AssignabilityPath {
                steps: vec![AssignabilityStep {
                    from,
                    to,
                    kind,
                    edge,
                }],
            })
        };
        for edge in self.graph.outgoing(from) {
            if edge.label == EdgeLabel::SubType && self.canonical(edge.to) == to {
                return single(StepKind::SubType, Some(edge.id));
            }
        }
        if self.intrinsic_subtype(from, to) {
            return single(StepKind::SubType, None);
        }
        for edge in self.graph.outgoing(from) {
            if edge.label == EdgeLabel::Conversion(ConversionMode::ImplicitExplicit)
                && self.canonical(edge.to) == to
            {
                return single(StepKind::ImplicitConversion, Some(edge.id));
            }
        }

        let mut parents: FxHashMap<TypeId, AssignabilityStep> = FxHashMap::default();
        let mut queue: VecDeque<(TypeId, usize)> = VecDeque::new();
        let mut deepest: Vec<(TypeId, usize)> = Vec::new();
        queue.push_back((from, 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.max_path_length {
                continue;
            }
            let visit = |parents: &mut FxHashMap<TypeId, AssignabilityStep>,
                             queue: &mut VecDeque<(TypeId, usize)>,
                             step: AssignabilityStep|
             -> bool {
                let target = step.to;
                if target == from || parents.contains_key(&target) {
                    return false;
                }
                parents.insert(target, step);
                if target == to {
                    return true;
                }
                queue.push_back((target, depth + 1));
                false
            };

            // Subtype edges expand before conversions so equal-length ties
            // resolve toward subtype steps.
            for edge in self.graph.outgoing(current) {
                if edge.label != EdgeLabel::SubType {
                    continue;
                }
                let step = AssignabilityStep {
                    from: current,
                    to: self.canonical(edge.to),
                    kind: StepKind::SubType,
                    edge: Some(edge.id),
                };
                if visit(&mut parents, &mut queue, step) {
                    return Ok(self.reconstruct(from, to, &parents));
                }
            }
            // Kind-intrinsic subtype closure straight to the target.
            if current != to && self.intrinsic_subtype(current, to) {
                let step = AssignabilityStep {
                    from: current,
                    to,
                    kind: StepKind::SubType,
                    edge: None,
                };
                if visit(&mut parents, &mut queue, step) {
                    return Ok(self.reconstruct(from, to, &parents));
                }
            }
            for edge in self.graph.outgoing(current) {
                let EdgeLabel::Conversion(mode) = edge.label else {
                    continue;
                };
                if !mode.is_implicit() {
                    continue;
                }
                let step = AssignabilityStep {
                    from: current,
                    to: self.canonical(edge.to),
                    kind: StepKind::ImplicitConversion,
                    edge: Some(edge.id),
                };
                if visit(&mut parents, &mut queue, step) {
                    return Ok(self.reconstruct(from, to, &parents));
                }
            }
            deepest.push((current, depth));
        }

        Err(self.assignability_problem(from, to, &deepest))
    }

    fn reconstruct(
        &self,
        from: TypeId,
        to: TypeId,
        parents: &FxHashMap<TypeId, AssignabilityStep>,
    ) -> AssignabilityPath {
        let mut steps = Vec::new();
        let mut current = to;
        while current != from {
            let step = parents[&current].clone();
            current = step.from;
            steps.push(step);
        }
        steps.reverse();
        tracing::debug!(
            from = from.index(),
            to = to.index(),
            length = steps.len(),
            "assignability path found"
        );
        AssignabilityPath { steps }
    }

    /// A failed search reports why neither relation held directly, then
    /// lists the nearest partial matches: the deepest types the search
    /// reached before running out of edges.
    fn assignability_problem(
        &self,
        from: TypeId,
        to: TypeId,
        frontier: &[(TypeId, usize)],
    ) -> Problem {
        let mut nested = Vec::new();
        if let Err(problem) = self.is_subtype(from, to) {
            nested.push(problem);
        }
        if let Err(problem) = self.check_convertible(from, to) {
            nested.push(problem);
        }

        let mut closest: Vec<(TypeId, usize)> = frontier
            .iter()
            .copied()
            .filter(|(id, _)| *id != from)
            .collect();
        closest.sort_by_key(|(_, depth)| std::cmp::Reverse(*depth));
        for (reached, _) in closest.into_iter().take(4) {
            nested.push(Problem::Assignability {
                from: self.display(reached),
                to: self.display(to),
                involved: vec![reached, to],
                nested: vec![],
            });
        }

        Problem::Assignability {
            from: self.display(from),
            to: self.display(to),
            involved: vec![from, to],
            nested,
        }
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Find the shortest assignability path from `from` to `to`, or a
    /// problem listing the nearest partial matches.
    pub fn assignability_result(
        &self,
        from: TypeId,
        to: TypeId,
    ) -> Result<AssignabilityPath, Problem> {
        self.relator().assignability(from, to)
    }

    pub fn is_assignable(&self, from: TypeId, to: TypeId) -> bool {
        self.assignability_result(from, to).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TypeEngine;
    use crate::problems::ProblemKind;

    fn engine() -> TypeEngine<()> {
        TypeEngine::new()
    }

    /// boolean -conv-> integer -sub-> double -conv-> string
    fn conversion_chain(engine: &mut TypeEngine<()>) -> (TypeId, TypeId, TypeId, TypeId) {
        let b = engine.create_primitive("boolean");
        let i = engine.create_primitive("integer");
        let d = engine.create_primitive("double");
        let s = engine.create_primitive("string");
        engine
            .mark_as_convertible(b, i, ConversionMode::ImplicitExplicit)
            .unwrap();
        engine.mark_as_subtype(i, d).unwrap();
        engine
            .mark_as_convertible(d, s, ConversionMode::ImplicitExplicit)
            .unwrap();
        (b, i, d, s)
    }

    #[test]
    fn identity_path_is_empty() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let path = engine.assignability_result(int, int).unwrap();
        assert!(path.is_identity());
    }

    #[test]
    fn single_subtype_step() {
        let mut engine = engine();
        let (_, i, d, _) = conversion_chain(&mut engine);
        let path = engine.assignability_result(i, d).unwrap();
        assert_eq!(path.kinds(), vec![StepKind::SubType]);
        assert!(path.steps[0].edge.is_some());
    }

    #[test]
    fn conversion_then_subtype() {
        let mut engine = engine();
        let (b, i, d, _) = conversion_chain(&mut engine);
        let path = engine.assignability_result(b, d).unwrap();
        assert_eq!(
            path.kinds(),
            vec![StepKind::ImplicitConversion, StepKind::SubType]
        );
        assert_eq!(path.steps[0].from, b);
        assert_eq!(path.steps[0].to, i);
        assert_eq!(path.steps[1].to, d);
    }

    #[test]
    fn subtype_then_conversion() {
        let mut engine = engine();
        let (_, i, _, s) = conversion_chain(&mut engine);
        let path = engine.assignability_result(i, s).unwrap();
        assert_eq!(
            path.kinds(),
            vec![StepKind::SubType, StepKind::ImplicitConversion]
        );
    }

    #[test]
    fn full_three_step_chain() {
        let mut engine = engine();
        let (b, _, _, s) = conversion_chain(&mut engine);
        let path = engine.assignability_result(b, s).unwrap();
        assert_eq!(
            path.kinds(),
            vec![
                StepKind::ImplicitConversion,
                StepKind::SubType,
                StepKind::ImplicitConversion
            ]
        );
    }

    #[test]
    fn unreachable_target_reports_problem() {
        let mut engine = engine();
        let (b, _, _, s) = conversion_chain(&mut engine);
        let problem = engine.assignability_result(s, b).unwrap_err();
        assert_eq!(problem.kind(), ProblemKind::Assignability);
        // The sub-problems explain the denied relations.
        assert!(
            problem
                .nested_problems()
                .iter()
                .any(|p| p.kind() == ProblemKind::SubType)
        );
        assert!(
            problem
                .nested_problems()
                .iter()
                .any(|p| p.kind() == ProblemKind::Conversion)
        );
    }

    #[test]
    fn explicit_conversions_are_never_used() {
        let mut engine = engine();
        let a = engine.create_primitive("a");
        let b = engine.create_primitive("b");
        engine
            .mark_as_convertible(a, b, ConversionMode::Explicit)
            .unwrap();
        assert!(engine.assignability_result(a, b).is_err());
    }

    #[test]
    fn subtype_step_wins_ties_against_conversion() {
        let mut engine = engine();
        let a = engine.create_primitive("a");
        let b = engine.create_primitive("b");
        engine
            .mark_as_convertible(a, b, ConversionMode::ImplicitExplicit)
            .unwrap();
        engine.mark_as_subtype(a, b).unwrap();
        let path = engine.assignability_result(a, b).unwrap();
        assert_eq!(path.kinds(), vec![StepKind::SubType]);
    }

    #[test]
    fn kind_intrinsic_closure_contributes_a_step() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let path = engine.assignability_result(int, engine.top()).unwrap();
        assert_eq!(path.kinds(), vec![StepKind::SubType]);
        assert!(path.steps[0].edge.is_none());
    }

    #[test]
    fn assignable_to_everything_from_bottom() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        assert!(engine.is_assignable(engine.bottom(), int));
    }

    #[test]
    fn path_length_cap_bounds_the_search() {
        let mut engine = TypeEngine::<()>::with_config(crate::engine::EngineConfig {
            max_path_length: Some(1),
        });
        let (b, _, d, _) = conversion_chain(&mut engine);
        // b -> d needs two steps, beyond the cap.
        assert!(engine.assignability_result(b, d).is_err());
    }
}
