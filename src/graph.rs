// src/graph.rs
//
// The type graph: type nodes deduplicated by identifier, directed labeled
// edges, and a listener registry fed from a FIFO event queue.
//
// The graph itself only records and queues; the engine drains the queue to
// fixed point after every mutation, reacting internally (bottom-type edges,
// cache invalidation, rule eviction) and then delivering each event to the
// registered listeners in registration order.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::types::{Type, TypeId, TypeKind, TypeState};

/// Handle to an edge in the graph. Edges are first-class so relation paths
/// can be returned to callers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct EdgeId(pub(crate) u32);

impl EdgeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Mode of a conversion edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionMode {
    /// Usable both implicitly (assignability) and explicitly (casts).
    ImplicitExplicit,
    /// Usable only via an explicit cast; never part of assignability.
    Explicit,
}

impl ConversionMode {
    pub fn is_implicit(self) -> bool {
        matches!(self, ConversionMode::ImplicitExplicit)
    }
}

/// Edge label. `SubType` and `Conversion` drive the relation services;
/// the parameter/argument labels are kind-internal bindings that keep
/// component types reachable from their composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    SubType,
    Conversion(ConversionMode),
    InputParameter(u32),
    OutputParameter,
    TypeArgument(u32),
}

impl EdgeLabel {
    pub fn is_sub_type(self) -> bool {
        matches!(self, EdgeLabel::SubType)
    }

    pub fn is_conversion(self) -> bool {
        matches!(self, EdgeLabel::Conversion(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: TypeId,
    pub to: TypeId,
    pub label: EdgeLabel,
}

/// Graph mutation event. Removal events carry the removed value since the
/// node or edge is gone from the tables by the time listeners run.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    TypeAdded(TypeId),
    TypeRemoved(Type),
    EdgeAdded(EdgeId),
    EdgeRemoved(Edge),
}

/// Observer of graph mutations. Callbacks run synchronously during the
/// engine's event drain, in listener registration order.
pub trait GraphListener {
    fn on_type_added(&mut self, _graph: &TypeGraph, _added: TypeId) {}
    fn on_type_removed(&mut self, _graph: &TypeGraph, _removed: &Type) {}
    fn on_edge_added(&mut self, _graph: &TypeGraph, _edge: &Edge) {}
    fn on_edge_removed(&mut self, _graph: &TypeGraph, _edge: &Edge) {}
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(u32);

type EdgeIdVec = SmallVec<[EdgeId; 4]>;

pub struct TypeGraph {
    /// Node table indexed by TypeId; removed nodes leave a tombstone.
    nodes: Vec<Option<Type>>,
    /// Deduplication index - identifier to live node.
    ids_by_identifier: hashbrown::HashMap<String, TypeId>,
    /// Edge table indexed by EdgeId; removed edges leave a tombstone.
    edges: Vec<Option<Edge>>,
    outgoing: FxHashMap<TypeId, EdgeIdVec>,
    incoming: FxHashMap<TypeId, EdgeIdVec>,
    events: VecDeque<GraphEvent>,
    listeners: Vec<(ListenerId, Box<dyn GraphListener>)>,
    next_listener: u32,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            ids_by_identifier: hashbrown::HashMap::new(),
            edges: Vec::new(),
            outgoing: FxHashMap::default(),
            incoming: FxHashMap::default(),
            events: VecDeque::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Add a type, deduplicating by identifier.
    ///
    /// Returns the node id and whether a new node was actually inserted.
    /// Adding an identifier that already names a live node returns the
    /// existing node and emits no event. Re-adding the same identifier with
    /// a different kind is a programmer mistake and panics.
    pub fn add_type(
        &mut self,
        identifier: String,
        kind: TypeKind,
        state: TypeState,
    ) -> (TypeId, bool) {
        if let Some(&existing) = self.ids_by_identifier.get(&identifier) {
            let node = self.nodes[existing.0 as usize]
                .as_ref()
                .expect("INTERNAL ERROR: identifier index points at a removed node");
            if node.kind_name() != kind.name() {
                panic!(
                    "INTERNAL ERROR: identifier '{}' already registered with kind {}, \
                     cannot re-register as {}",
                    identifier,
                    node.kind_name(),
                    kind.name()
                );
            }
            return (existing, false);
        }

        let id = TypeId(self.nodes.len() as u32);
        tracing::debug!(identifier = %identifier, kind = kind.name(), id = id.0, "add type");
        self.ids_by_identifier.insert(identifier.clone(), id);
        self.nodes.push(Some(Type::new(id, identifier, kind, state)));
        self.events.push_back(GraphEvent::TypeAdded(id));
        (id, true)
    }

    /// Reserve a node slot without publishing it. Used for types whose
    /// identifier cannot be derived yet; `publish_reserved` fills the slot
    /// once the identifier is known.
    pub(crate) fn reserve(&mut self) -> TypeId {
        let id = TypeId(self.nodes.len() as u32);
        self.nodes.push(None);
        id
    }

    /// Fill a reserved slot with a now-identifiable type and emit the add
    /// event. The caller must have checked the identifier for duplicates.
    pub(crate) fn publish_reserved(
        &mut self,
        id: TypeId,
        identifier: String,
        kind: TypeKind,
        state: TypeState,
    ) {
        debug_assert!(self.nodes[id.0 as usize].is_none());
        debug_assert!(!self.ids_by_identifier.contains_key(&identifier));
        tracing::debug!(identifier = %identifier, kind = kind.name(), id = id.0, "publish type");
        self.ids_by_identifier.insert(identifier.clone(), id);
        self.nodes[id.0 as usize] = Some(Type::new(id, identifier, kind, state));
        self.events.push_back(GraphEvent::TypeAdded(id));
    }

    /// Remove a type: first detaches and emits removal for every incident
    /// edge, then emits the type removal itself.
    pub fn remove_type(&mut self, id: TypeId) -> Option<Type> {
        self.nodes.get(id.0 as usize)?.as_ref()?;

        let mut incident: EdgeIdVec = SmallVec::new();
        incident.extend(self.outgoing.get(&id).into_iter().flatten().copied());
        incident.extend(self.incoming.get(&id).into_iter().flatten().copied());
        for edge_id in incident {
            self.remove_edge(edge_id);
        }

        let ty = self.nodes[id.0 as usize].take()?;
        tracing::debug!(identifier = %ty.identifier(), id = id.0, "remove type");
        self.ids_by_identifier.remove(ty.identifier());
        self.outgoing.remove(&id);
        self.incoming.remove(&id);
        self.events.push_back(GraphEvent::TypeRemoved(ty.clone()));
        Some(ty)
    }

    /// Look up a live type by identifier.
    pub fn get_type(&self, identifier: &str) -> Option<TypeId> {
        self.ids_by_identifier.get(identifier).copied()
    }

    pub fn type_by_id(&self, id: TypeId) -> Option<&Type> {
        self.nodes.get(id.0 as usize)?.as_ref()
    }

    pub(crate) fn type_by_id_mut(&mut self, id: TypeId) -> Option<&mut Type> {
        self.nodes.get_mut(id.0 as usize)?.as_mut()
    }

    pub fn identifier_of(&self, id: TypeId) -> Option<&str> {
        self.type_by_id(id).map(|t| t.identifier())
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.type_by_id(id).is_some()
    }

    pub fn all_types(&self) -> impl Iterator<Item = &Type> {
        self.nodes.iter().filter_map(|n| n.as_ref())
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.ids_by_identifier.len()
    }

    pub(crate) fn set_state(&mut self, id: TypeId, state: TypeState) {
        if let Some(ty) = self.type_by_id_mut(id) {
            ty.set_state(state);
        }
    }

    pub(crate) fn update_kind(&mut self, id: TypeId, f: impl FnOnce(&mut TypeKind)) {
        if let Some(ty) = self.type_by_id_mut(id) {
            f(ty.kind_mut());
        }
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Add an edge between two live nodes. Dangling endpoints are a
    /// programmer mistake and panic.
    pub fn add_edge(&mut self, from: TypeId, to: TypeId, label: EdgeLabel) -> EdgeId {
        if !self.contains(from) || !self.contains(to) {
            panic!(
                "INTERNAL ERROR: edge {:?} between {:?} and {:?} has a dangling endpoint",
                label, from, to
            );
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Some(Edge {
            id,
            from,
            to,
            label,
        }));
        self.outgoing.entry(from).or_default().push(id);
        self.incoming.entry(to).or_default().push(id);
        self.events.push_back(GraphEvent::EdgeAdded(id));
        id
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.0 as usize)?.take()?;
        if let Some(out) = self.outgoing.get_mut(&edge.from) {
            out.retain(|e| *e != id);
        }
        if let Some(inc) = self.incoming.get_mut(&edge.to) {
            inc.retain(|e| *e != id);
        }
        self.events.push_back(GraphEvent::EdgeRemoved(edge.clone()));
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.0 as usize)?.as_ref()
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn outgoing(&self, id: TypeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edge(*e))
    }

    /// Incoming edges of a node, in insertion order.
    pub fn incoming(&self, id: TypeId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|e| self.edge(*e))
    }

    /// Targets of outgoing subtype edges.
    pub fn subtype_successors(&self, id: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        self.outgoing(id)
            .filter(|e| e.label.is_sub_type())
            .map(|e| e.to)
    }

    /// The direct conversion edge between two nodes, if any. Conversion is
    /// not transitive at the edge level.
    pub fn conversion_between(&self, from: TypeId, to: TypeId) -> Option<&Edge> {
        self.outgoing(from)
            .find(|e| e.to == to && e.label.is_conversion())
    }

    pub fn find_edge(&self, from: TypeId, to: TypeId, label: EdgeLabel) -> Option<EdgeId> {
        self.outgoing(from)
            .find(|e| e.to == to && e.label == label)
            .map(|e| e.id)
    }

    // ========================================================================
    // Events and listeners
    // ========================================================================

    pub fn add_listener(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub(crate) fn pop_event(&mut self) -> Option<GraphEvent> {
        self.events.pop_front()
    }

    /// Deliver one event to every listener, in registration order.
    pub(crate) fn dispatch(&mut self, event: &GraphEvent) {
        if self.listeners.is_empty() {
            return;
        }
        // Listeners are taken out for the duration of delivery so they can
        // be handed a shared view of the graph.
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            match event {
                GraphEvent::TypeAdded(id) => listener.on_type_added(self, *id),
                GraphEvent::TypeRemoved(ty) => listener.on_type_removed(self, ty),
                GraphEvent::EdgeAdded(id) => {
                    if let Some(edge) = self.edge(*id) {
                        listener.on_edge_added(self, edge);
                    }
                }
                GraphEvent::EdgeRemoved(edge) => listener.on_edge_removed(self, edge),
            }
        }
        listeners.append(&mut self.listeners);
        self.listeners = listeners;
    }
}

impl Default for TypeGraph {
    fn default() -> Self {
        Self::new()
    }
}
