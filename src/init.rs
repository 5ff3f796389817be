// src/init.rs
//
// Deferred type initialization. Classes may reference types that do not
// exist yet, including themselves: references are recorded as
// preconditions, the class node exists immediately, and the engine
// finalizes it once every precondition resolves to a live node.
//
// Lifecycle: invalid -> identifiable (identifier is final; nominal classes
// start here) -> completed (fields and supertypes resolved). Removing a
// precondition type forces dependents back to invalid and re-queues their
// recipes, cascading.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::TypeEngine;
use crate::graph::EdgeLabel;
use crate::relations::subtype::closes_subtype_cycle;
use crate::types::class::structural_identifier;
use crate::types::{
    ClassData, ClassIdentity, Field, FieldVariance, TypeId, TypeIdVec, TypeKind, TypeState,
};

/// Reference to a type that may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Id(TypeId),
    /// Resolved against the identifier index once the type appears. A
    /// nominal class can name itself this way.
    Named(String),
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Id(id)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }
}

impl From<String> for TypeRef {
    fn from(name: String) -> Self {
        TypeRef::Named(name)
    }
}

/// Which lifecycle state an initialization listener waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Identifiable,
    Completed,
}

/// Creation details for a class.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: String,
    identity: ClassIdentity,
    field_variance: FieldVariance,
    fields: Vec<(String, TypeRef)>,
    supers: Vec<TypeRef>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: ClassIdentity::Nominal,
            field_variance: FieldVariance::Invariant,
            fields: Vec::new(),
            supers: Vec::new(),
        }
    }

    /// Switch to structural identity: the identifier encodes the fields.
    pub fn structural(mut self) -> Self {
        self.identity = ClassIdentity::Structural;
        self
    }

    /// Allow covariant field types in structural subtyping.
    pub fn covariant_fields(mut self) -> Self {
        self.field_variance = FieldVariance::Covariant;
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.fields.push((name.into(), ty.into()));
        self
    }

    pub fn super_class(mut self, ty: impl Into<TypeRef>) -> Self {
        self.supers.push(ty.into());
        self
    }
}

type InitCallback = Box<dyn FnOnce(TypeId)>;

struct PendingClass {
    target: TypeId,
    /// Nominal classes are published (identifiable, in the graph) from the
    /// start; structural ones stay reserved until their identifier can be
    /// derived.
    published: bool,
    recipe: ClassSpec,
}

pub(crate) struct Initializer {
    pending: Vec<PendingClass>,
    /// Recipes of completed classes, kept so a precondition removal can
    /// re-queue them.
    recipes: FxHashMap<TypeId, ClassSpec>,
    /// precondition type -> classes that were completed using it
    dependents: FxHashMap<TypeId, SmallVec<[TypeId; 2]>>,
    listeners: Vec<(TypeId, InitPhase, InitCallback)>,
}

impl Initializer {
    pub(crate) fn new() -> Self {
        Self {
            pending: Vec::new(),
            recipes: FxHashMap::default(),
            dependents: FxHashMap::default(),
            listeners: Vec::new(),
        }
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Create a class. Field and supertype references may name types that
    /// do not exist yet (including the class itself); the returned type
    /// stays below `Completed` until they all resolve.
    ///
    /// Creating a class whose identifier already names a live type returns
    /// the existing node.
    pub fn create_class(&mut self, spec: ClassSpec) -> TypeId {
        let target = match spec.identity {
            ClassIdentity::Nominal => {
                let data = ClassData {
                    name: spec.name.clone(),
                    identity: spec.identity,
                    field_variance: spec.field_variance,
                    fields: Vec::new(),
                    supers: TypeIdVec::new(),
                };
                let (id, added) = self.graph.add_type(
                    spec.name.clone(),
                    TypeKind::Class(data),
                    TypeState::Identifiable,
                );
                if !added {
                    // Identifier dedup: the caller gets the existing node
                    // and the new creation details are dropped.
                    self.drain_events();
                    return id;
                }
                self.init.pending.push(PendingClass {
                    target: id,
                    published: true,
                    recipe: spec,
                });
                id
            }
            ClassIdentity::Structural => {
                let id = self.graph.reserve();
                self.init.pending.push(PendingClass {
                    target: id,
                    published: false,
                    recipe: spec,
                });
                id
            }
        };
        self.progress_pending();
        self.drain_events();
        self.canonical_id(target)
    }

    /// Register a callback for when a type reaches the given lifecycle
    /// phase. Fires immediately if the phase was already reached; fires
    /// with the canonical node if the type gets deduplicated away.
    pub fn on_type_initialized(
        &mut self,
        target: TypeId,
        phase: InitPhase,
        callback: impl FnOnce(TypeId) + 'static,
    ) {
        self.init
            .listeners
            .push((target, phase, Box::new(callback)));
        self.fire_init_listeners(target);
    }

    fn resolve_ref(&self, reference: &TypeRef) -> Option<TypeId> {
        match reference {
            TypeRef::Id(id) => {
                let id = self.canonical_id(*id);
                self.graph.contains(id).then_some(id)
            }
            TypeRef::Named(name) => self.graph.get_type(name),
        }
    }

    /// Try to finalize every pending class; repeats until a fixed point so
    /// mutually recursive classes settle in one pass.
    pub(crate) fn progress_pending(&mut self) {
        loop {
            let mut progressed = false;
            let mut index = 0;
            while index < self.init.pending.len() {
                if self.try_finalize(index) {
                    self.init.pending.swap_remove(index);
                    progressed = true;
                } else {
                    index += 1;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    /// Returns true when the pending entry was finalized (or deduplicated)
    /// and should be dropped from the queue.
    fn try_finalize(&mut self, index: usize) -> bool {
        let pending = &self.init.pending[index];
        let target = pending.target;
        let published = pending.published;

        let mut fields: Vec<Field> = Vec::with_capacity(pending.recipe.fields.len());
        for (name, reference) in &pending.recipe.fields {
            match self.resolve_ref(reference) {
                Some(ty) => fields.push(Field {
                    name: name.clone(),
                    ty,
                }),
                None => return false,
            }
        }
        let mut supers = TypeIdVec::new();
        for reference in &pending.recipe.supers {
            match self.resolve_ref(reference) {
                Some(ty) => supers.push(ty),
                None => return false,
            }
        }

        // All preconditions exist; the type becomes identifiable now and
        // completed below.
        let recipe = self.init.pending[index].recipe.clone();
        let data = ClassData {
            name: recipe.name.clone(),
            identity: recipe.identity,
            field_variance: recipe.field_variance,
            fields: fields.clone(),
            supers: supers.clone(),
        };

        if !published {
            let identifier = structural_identifier(&recipe.name, &fields, &self.graph);
            if let Some(existing) = self.graph.get_type(&identifier) {
                // The initial node is discarded; callers reach the
                // canonical node through the forwarding table.
                tracing::debug!(
                    identifier = %identifier,
                    provisional = target.index(),
                    canonical = existing.index(),
                    "deduplicated pending type"
                );
                self.forwarded.insert(target, existing);
                self.fire_init_listeners(target);
                return true;
            }
            self.graph.publish_reserved(
                target,
                identifier,
                TypeKind::Class(data),
                TypeState::Identifiable,
            );
        } else {
            self.graph.update_kind(target, |kind| *kind = TypeKind::Class(data));
        }

        for &sup in &supers {
            if self.graph.find_edge(target, sup, EdgeLabel::SubType).is_some() {
                continue;
            }
            if closes_subtype_cycle(&self.graph, target, sup) {
                tracing::warn!(
                    class = %recipe.name,
                    sup = sup.index(),
                    "cyclic superclass declaration skipped"
                );
                continue;
            }
            self.graph.add_edge(target, sup, EdgeLabel::SubType);
        }

        for precondition in fields.iter().map(|f| f.ty).chain(supers.iter().copied()) {
            if precondition != target {
                let dependents = self.init.dependents.entry(precondition).or_default();
                if !dependents.contains(&target) {
                    dependents.push(target);
                }
            }
        }

        self.init.recipes.insert(target, recipe);
        self.graph.set_state(target, TypeState::Completed);
        self.caches.clear();
        self.fire_init_listeners(target);
        true
    }

    fn fire_init_listeners(&mut self, changed: TypeId) {
        let changed_canonical = self.canonical_id(changed);
        let mut index = 0;
        while index < self.init.listeners.len() {
            let (key, phase, _) = &self.init.listeners[index];
            if self.canonical_id(*key) != changed_canonical && *key != changed {
                index += 1;
                continue;
            }
            let state = self.graph.type_by_id(changed_canonical).map(|t| t.state());
            let ready = match phase {
                InitPhase::Identifiable => matches!(
                    state,
                    Some(TypeState::Identifiable | TypeState::Completed)
                ),
                InitPhase::Completed => matches!(state, Some(TypeState::Completed)),
            };
            if ready {
                let (_, _, callback) = self.init.listeners.remove(index);
                callback(changed_canonical);
            } else {
                index += 1;
            }
        }
    }

    /// A precondition type disappeared: dependents fall back to invalid and
    /// their recipes are re-queued, transitively.
    pub(crate) fn cascade_invalidate(&mut self, removed: TypeId) {
        self.init.recipes.remove(&removed);
        self.init.pending.retain(|p| p.target != removed);
        let mut worklist = vec![removed];
        while let Some(precondition) = worklist.pop() {
            let Some(dependents) = self.init.dependents.remove(&precondition) else {
                continue;
            };
            for dependent in dependents {
                let Some(recipe) = self.init.recipes.remove(&dependent) else {
                    continue;
                };
                if !self.graph.contains(dependent) {
                    continue;
                }
                tracing::debug!(
                    class = %recipe.name,
                    dependent = dependent.index(),
                    "invalidating dependent type"
                );
                self.graph.set_state(dependent, TypeState::Invalid);
                self.init.pending.push(PendingClass {
                    target: dependent,
                    published: true,
                    recipe,
                });
                worklist.push(dependent);
            }
        }
    }
}
