// src/relations/subtype.rs
//
// The subtype relation: reflexive, transitive over explicit subtype edges,
// extended by kind-intrinsic rules (top/bottom, fixed-parameters variance,
// structural width/depth subtyping). `mark_as_subtype` refuses edges that
// would close a cycle unless explicitly told not to check.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::engine::TypeEngine;
use crate::graph::{EdgeId, EdgeLabel, TypeGraph};
use crate::problems::Problem;
use crate::relations::Relator;
use crate::types::{ClassIdentity, FieldVariance, ParameterPolicy, TypeId, TypeKind};

/// Options for [`TypeEngine::mark_as_subtype_with`].
#[derive(Debug, Clone, Copy)]
pub struct SubTypeOptions {
    /// Refuse the edge if it would close a subtype cycle. The bottom type's
    /// edges are added with this check suppressed.
    pub check_for_cycles: bool,
}

impl Default for SubTypeOptions {
    fn default() -> Self {
        Self {
            check_for_cycles: true,
        }
    }
}

/// Would adding `sub -> sup` close a cycle, i.e. is `sub` already reachable
/// from `sup` over subtype edges?
pub(crate) fn closes_subtype_cycle(graph: &TypeGraph, sub: TypeId, sup: TypeId) -> bool {
    if sub == sup {
        return true;
    }
    let mut visited: FxHashSet<TypeId> = FxHashSet::default();
    let mut queue: VecDeque<TypeId> = VecDeque::new();
    visited.insert(sup);
    queue.push_back(sup);
    while let Some(current) = queue.pop_front() {
        for next in graph.subtype_successors(current) {
            if next == sub {
                return true;
            }
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }
    false
}

impl<'a> Relator<'a> {
    pub(crate) fn is_subtype(&self, sub: TypeId, sup: TypeId) -> Result<(), Problem> {
        let sub = self.canonical(sub);
        let sup = self.canonical(sup);
        self.require(sub)?;
        self.require(sup)?;

        let key = (sub, sup);
        if let Some(hit) = self.caches.subtype_hit(key) {
            tracing::trace!(?key, "subtype cache hit");
            return hit;
        }
        // A pair already on the comparison stack (possible through
        // kind-intrinsic argument recursion) is assumed to hold; the
        // outermost frame settles the final verdict.
        if !self.caches.subtype_in_progress.borrow_mut().insert(key) {
            return Ok(());
        }
        let result = self.subtype_uncached(sub, sup);
        self.caches.subtype_in_progress.borrow_mut().remove(&key);
        self.caches.subtype.borrow_mut().insert(key, result.clone());
        result
    }

    fn subtype_uncached(&self, sub: TypeId, sup: TypeId) -> Result<(), Problem> {
        if self.are_types_equal(sub, sup).is_ok() {
            return Ok(());
        }
        if self.intrinsic_subtype(sub, sup) {
            return Ok(());
        }

        // BFS over explicit subtype edges; each reached node may also close
        // the relation through a kind-intrinsic rule.
        let mut visited: FxHashSet<TypeId> = FxHashSet::default();
        let mut queue: VecDeque<(TypeId, usize)> = VecDeque::new();
        visited.insert(sub);
        queue.push_back((sub, 0));
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.max_path_length {
                continue;
            }
            for next in self.graph.subtype_successors(current) {
                let next = self.canonical(next);
                if !visited.insert(next) {
                    continue;
                }
                if next == sup || self.intrinsic_subtype(next, sup) {
                    return Ok(());
                }
                queue.push_back((next, depth + 1));
            }
        }

        let mut nested = Vec::new();
        self.subtype_detail(sub, sup, &mut nested);
        Err(Problem::SubType {
            sub: self.display(sub),
            sup: self.display(sup),
            involved: vec![sub, sup],
            nested,
        })
    }

    /// Kind-intrinsic subtype rules; no edges are consulted.
    pub(crate) fn intrinsic_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if sub == sup {
            return true;
        }
        let (Some(tsub), Some(tsup)) = (self.graph.type_by_id(sub), self.graph.type_by_id(sup))
        else {
            return false;
        };
        match (tsub.kind(), tsup.kind()) {
            (_, TypeKind::Top) => true,
            (TypeKind::Bottom, _) => true,
            (TypeKind::Fixed(a), TypeKind::Fixed(b)) => {
                if a.base != b.base || a.args.len() != b.args.len() {
                    return false;
                }
                let policy = self
                    .variance
                    .get(&a.base)
                    .copied()
                    .unwrap_or(ParameterPolicy::EqualType);
                a.args.iter().zip(b.args.iter()).all(|(&x, &y)| match policy {
                    ParameterPolicy::EqualType => self.are_types_equal(x, y).is_ok(),
                    ParameterPolicy::SubType => self.is_subtype(x, y).is_ok(),
                    ParameterPolicy::AssignableType => self.assignability(x, y).is_ok(),
                })
            }
            (TypeKind::Class(a), TypeKind::Class(b)) => {
                // Width/depth subtyping applies only under structural
                // identity: every field of the supertype must be present
                // with an equal (invariant) or subtype (covariant) type.
                if a.identity != ClassIdentity::Structural
                    || b.identity != ClassIdentity::Structural
                {
                    return false;
                }
                b.fields.iter().all(|sup_field| {
                    a.field(&sup_field.name).is_some_and(|sub_field| {
                        match b.field_variance {
                            FieldVariance::Invariant => {
                                self.are_types_equal(sub_field.ty, sup_field.ty).is_ok()
                            }
                            FieldVariance::Covariant => {
                                self.is_subtype(sub_field.ty, sup_field.ty).is_ok()
                            }
                        }
                    })
                })
            }
            _ => false,
        }
    }

    /// Per-kind detail for a denied relation, pushed as nested problems.
    fn subtype_detail(&self, sub: TypeId, sup: TypeId, nested: &mut Vec<Problem>) {
        let (Some(tsub), Some(tsup)) = (self.graph.type_by_id(sub), self.graph.type_by_id(sup))
        else {
            return;
        };
        match (tsub.kind(), tsup.kind()) {
            // Functions do not participate in subtyping unless equal.
            (TypeKind::Function(_), TypeKind::Function(_)) => {
                nested.push(self.kind_conflict(tsub, tsup));
            }
            (TypeKind::Fixed(a), TypeKind::Fixed(b))
                if a.base == b.base && a.args.len() == b.args.len() =>
            {
                let policy = self
                    .variance
                    .get(&a.base)
                    .copied()
                    .unwrap_or(ParameterPolicy::EqualType);
                for (&x, &y) in a.args.iter().zip(b.args.iter()) {
                    let argument_problem = match policy {
                        ParameterPolicy::EqualType => self.are_types_equal(x, y).err(),
                        ParameterPolicy::SubType => self.is_subtype(x, y).err(),
                        ParameterPolicy::AssignableType => self.assignability(x, y).err(),
                    };
                    if let Some(problem) = argument_problem {
                        nested.push(problem);
                    }
                }
            }
            _ => {}
        }
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Is `sub` a subtype of `sup`? Reflexive, transitive, cycle-safe.
    pub fn check_is_subtype(&self, sub: TypeId, sup: TypeId) -> Result<(), Problem> {
        self.relator().is_subtype(sub, sup)
    }

    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        self.check_is_subtype(sub, sup).is_ok()
    }

    /// Declare `sub` to be a subtype of `sup` by adding an explicit edge.
    pub fn mark_as_subtype(&mut self, sub: TypeId, sup: TypeId) -> Result<EdgeId, Problem> {
        self.mark_as_subtype_with(sub, sup, SubTypeOptions::default())
    }

    pub fn mark_as_subtype_with(
        &mut self,
        sub: TypeId,
        sup: TypeId,
        options: SubTypeOptions,
    ) -> Result<EdgeId, Problem> {
        let sub = self.canonical_id(sub);
        let sup = self.canonical_id(sup);
        self.relator().require(sub)?;
        self.relator().require(sup)?;

        if let Some(existing) = self.graph.find_edge(sub, sup, EdgeLabel::SubType) {
            return Ok(existing);
        }
        if options.check_for_cycles && closes_subtype_cycle(&self.graph, sub, sup) {
            tracing::debug!(sub = sub.index(), sup = sup.index(), "subtype cycle refused");
            return Err(Problem::Initialization {
                message: format!(
                    "declaring '{}' as a subtype of '{}' would close a subtype cycle",
                    self.print_type(sub),
                    self.print_type(sup)
                ),
                involved: vec![sub, sup],
                nested: vec![],
            });
        }
        let edge = self.graph.add_edge(sub, sup, EdgeLabel::SubType);
        self.drain_events();
        Ok(edge)
    }
}
