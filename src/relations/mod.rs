// src/relations/mod.rs
//
// The four relation services - equality, subtype, conversion, assignability -
// implemented on a borrowed `Relator` context so queries stay `&self` on the
// engine. Results (including problems) are memoized per identifier-stable
// id pair; the engine clears the cache on every structural change.

pub mod assignability;
pub mod conversion;
pub mod equality;
pub mod subtype;

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::TypeGraph;
use crate::printer;
use crate::problems::Problem;
use crate::types::{ParameterPolicy, Type, TypeId};

use self::assignability::AssignabilityPath;

/// Memoized relation results. Keys are `(TypeId, TypeId)` pairs - unordered
/// for the symmetric equality relation, ordered for the directed ones.
/// A cache hit reproduces the exact value the first query returned.
#[derive(Default)]
pub(crate) struct RelationCache {
    equality: RefCell<FxHashMap<(TypeId, TypeId), Result<(), Problem>>>,
    subtype: RefCell<FxHashMap<(TypeId, TypeId), Result<(), Problem>>>,
    assignability: RefCell<FxHashMap<(TypeId, TypeId), Result<AssignabilityPath, Problem>>>,
    /// Pairs currently being compared; a re-encountered pair is assumed
    /// equal, which makes equality of recursive classes terminate.
    in_progress: RefCell<FxHashSet<(TypeId, TypeId)>>,
    /// Same guard for the subtype relation (reachable through argument
    /// recursion of kind-intrinsic rules).
    subtype_in_progress: RefCell<FxHashSet<(TypeId, TypeId)>>,
}

impl RelationCache {
    pub(crate) fn clear(&self) {
        self.equality.borrow_mut().clear();
        self.subtype.borrow_mut().clear();
        self.assignability.borrow_mut().clear();
    }

    fn equality_hit(&self, key: (TypeId, TypeId)) -> Option<Result<(), Problem>> {
        self.equality.borrow().get(&key).cloned()
    }

    fn subtype_hit(&self, key: (TypeId, TypeId)) -> Option<Result<(), Problem>> {
        self.subtype.borrow().get(&key).cloned()
    }

    fn assignability_hit(
        &self,
        key: (TypeId, TypeId),
    ) -> Option<Result<AssignabilityPath, Problem>> {
        self.assignability.borrow().get(&key).cloned()
    }
}

/// Borrowed view of everything the relation algorithms need. Constructed by
/// the engine per query; holds no mutable state besides the cache cells.
pub(crate) struct Relator<'a> {
    pub(crate) graph: &'a TypeGraph,
    pub(crate) caches: &'a RelationCache,
    pub(crate) variance: &'a FxHashMap<String, ParameterPolicy>,
    pub(crate) forwarded: &'a FxHashMap<TypeId, TypeId>,
    pub(crate) max_path_length: usize,
}

impl<'a> Relator<'a> {
    /// Follow the forwarding chain left behind when a provisional type was
    /// deduplicated against an existing identifier.
    pub(crate) fn canonical(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(&next) = self.forwarded.get(&current) {
            current = next;
        }
        current
    }

    pub(crate) fn display(&self, id: TypeId) -> String {
        printer::print_type(self.graph, id)
    }

    /// Resolve a handle to a live type, or report a problem for stale ones.
    pub(crate) fn require(&self, id: TypeId) -> Result<&'a Type, Problem> {
        self.graph.type_by_id(id).ok_or_else(|| Problem::Initialization {
            message: format!("type handle #{} does not name a live type", id.index()),
            involved: vec![id],
            nested: vec![],
        })
    }

    pub(crate) fn kind_conflict(&self, left: &Type, right: &Type) -> Problem {
        tracing::trace!(
            left = left.identifier(),
            right = right.identifier(),
            "kind conflict"
        );
        Problem::KindConflict {
            left: self.display(left.id()),
            right: self.display(right.id()),
            left_kind: left.kind_name(),
            right_kind: right.kind_name(),
            involved: vec![left.id(), right.id()],
            nested: vec![],
        }
    }
}
