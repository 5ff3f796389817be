// src/engine.rs
//
// TypeEngine: the central service owning the graph, the relation caches,
// the rule registries, and the overload groups. Generic over the host node
// type `N` (usually a cheap AST handle). All queries are `&self`; every
// mutation ends by draining the graph's event queue to a fixed point, which
// is where the engine reacts to its own changes (bottom-type edges, cache
// invalidation, bound-rule eviction, pending-initializer progress) before
// handing each event to user listeners.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::graph::{EdgeLabel, GraphEvent, GraphListener, ListenerId, TypeGraph};
use crate::infer::{InferenceRegistry, RuleVerdict};
use crate::init::Initializer;
use crate::printer;
use crate::relations::{RelationCache, Relator};
use crate::types::special::{BOTTOM_IDENTIFIER, TOP_IDENTIFIER};
use crate::types::{
    FixedData, FunctionData, Parameter, ParameterPolicy, TypeId, TypeIdVec, TypeKind, TypeState,
};
use crate::validation::{ValidationIssue, ValidationRegistry};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Frontier cap for relation path searches. Defaults to the number of
    /// live types at query time.
    pub max_path_length: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_path_length: None,
        }
    }
}

/// Creation details for a function type. Operators are functions created
/// without a declaration rule.
pub struct FunctionSpec<N> {
    pub(crate) name: String,
    pub(crate) output: Option<(String, TypeId)>,
    pub(crate) inputs: Vec<(String, TypeId)>,
    pub(crate) call_rule: Option<Box<dyn Fn(&N, &TypeEngine<N>) -> RuleVerdict<N>>>,
    pub(crate) declaration_rule: Option<Box<dyn Fn(&N, &TypeEngine<N>) -> RuleVerdict<N>>>,
    pub(crate) call_validation: Option<Box<dyn Fn(&N, &TypeEngine<N>) -> Vec<ValidationIssue>>>,
}

impl<N> FunctionSpec<N> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: None,
            inputs: Vec::new(),
            call_rule: None,
            declaration_rule: None,
            call_validation: None,
        }
    }

    pub fn returns(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.output = Some((name.into(), ty));
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: TypeId) -> Self {
        self.inputs.push((name.into(), ty));
        self
    }

    /// Inference rule for call sites, registered bound to the created type.
    pub fn with_call_rule(
        mut self,
        rule: impl Fn(&N, &TypeEngine<N>) -> RuleVerdict<N> + 'static,
    ) -> Self {
        self.call_rule = Some(Box::new(rule));
        self
    }

    /// Inference rule for the declaration node itself; absent for operators.
    pub fn with_declaration_rule(
        mut self,
        rule: impl Fn(&N, &TypeEngine<N>) -> RuleVerdict<N> + 'static,
    ) -> Self {
        self.declaration_rule = Some(Box::new(rule));
        self
    }

    /// Validation applied to call sites, bound to the created type.
    pub fn with_call_validation(
        mut self,
        rule: impl Fn(&N, &TypeEngine<N>) -> Vec<ValidationIssue> + 'static,
    ) -> Self {
        self.call_validation = Some(Box::new(rule));
        self
    }
}

/// Factory handle for a fixed-arity parameterized template.
#[derive(Debug, Clone)]
pub struct FixedParameters {
    base: String,
    parameter_names: Vec<String>,
}

impl FixedParameters {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn arity(&self) -> usize {
        self.parameter_names.len()
    }

    /// Instantiate the template with concrete argument types. Passing the
    /// wrong number of arguments is a programmer mistake and panics.
    pub fn create<N: Clone + 'static>(&self, engine: &mut TypeEngine<N>, arguments: &[TypeId]) -> TypeId {
        if arguments.len() != self.parameter_names.len() {
            panic!(
                "INTERNAL ERROR: template '{}' has {} parameters, got {} arguments",
                self.base,
                self.parameter_names.len(),
                arguments.len()
            );
        }
        engine.create_fixed_instance(&self.base, arguments)
    }
}

pub struct TypeEngine<N> {
    pub(crate) graph: TypeGraph,
    pub(crate) config: EngineConfig,
    top: TypeId,
    bottom: TypeId,
    pub(crate) caches: RelationCache,
    /// Parameter comparison policy per fixed-parameters base name.
    pub(crate) variance: FxHashMap<String, ParameterPolicy>,
    /// Overload groups: function name -> function types sharing it.
    pub(crate) overloads: FxHashMap<String, SmallVec<[TypeId; 2]>>,
    /// Provisional -> canonical redirects left by identifier deduplication.
    pub(crate) forwarded: FxHashMap<TypeId, TypeId>,
    pub(crate) init: Initializer,
    pub(crate) inference: InferenceRegistry<N>,
    pub(crate) validation: ValidationRegistry<N>,
}

impl<N: Clone + 'static> TypeEngine<N> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut graph = TypeGraph::new();
        let (top, _) = graph.add_type(TOP_IDENTIFIER.into(), TypeKind::Top, TypeState::Completed);
        let (bottom, _) = graph.add_type(
            BOTTOM_IDENTIFIER.into(),
            TypeKind::Bottom,
            TypeState::Completed,
        );
        let mut engine = Self {
            graph,
            config,
            top,
            bottom,
            caches: RelationCache::default(),
            variance: FxHashMap::default(),
            overloads: FxHashMap::default(),
            forwarded: FxHashMap::default(),
            init: Initializer::new(),
            inference: InferenceRegistry::new(),
            validation: ValidationRegistry::new(),
        };
        engine.drain_events();
        engine
    }

    // ========================================================================
    // Infrastructure facet
    // ========================================================================

    /// Read-only access to the underlying graph.
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn top(&self) -> TypeId {
        self.top
    }

    pub fn bottom(&self) -> TypeId {
        self.bottom
    }

    /// Resolve a handle through the forwarding left by deduplication.
    pub fn canonical_id(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(&next) = self.forwarded.get(&current) {
            current = next;
        }
        current
    }

    /// Look up a live type by identifier.
    pub fn type_by_identifier(&self, identifier: &str) -> Option<TypeId> {
        self.graph.get_type(identifier)
    }

    pub fn type_state(&self, id: TypeId) -> Option<TypeState> {
        self.graph.type_by_id(self.canonical_id(id)).map(|t| t.state())
    }

    /// User-facing signature of a type.
    pub fn print_type(&self, id: TypeId) -> String {
        printer::print_type(&self.graph, self.canonical_id(id))
    }

    pub fn add_graph_listener(&mut self, listener: Box<dyn GraphListener>) -> ListenerId {
        self.graph.add_listener(listener)
    }

    pub fn remove_graph_listener(&mut self, id: ListenerId) -> bool {
        self.graph.remove_listener(id)
    }

    pub(crate) fn relator(&self) -> Relator<'_> {
        Relator {
            graph: &self.graph,
            caches: &self.caches,
            variance: &self.variance,
            forwarded: &self.forwarded,
            max_path_length: self
                .config
                .max_path_length
                .unwrap_or_else(|| self.graph.live_count()),
        }
    }

    pub(crate) fn overload_group(&self, name: &str) -> Option<&[TypeId]> {
        self.overloads.get(name).map(|group| group.as_slice())
    }

    // ========================================================================
    // Factory facet
    // ========================================================================

    /// Create a primitive type. The identifier is the primitive's name;
    /// re-creating it returns the existing node.
    pub fn create_primitive(&mut self, name: &str) -> TypeId {
        let (id, _) = self
            .graph
            .add_type(name.to_string(), TypeKind::Primitive, TypeState::Completed);
        self.drain_events();
        id
    }

    /// Create a primitive together with an inference rule (e.g. for its
    /// literals), registered bound to the type. On an identifier-dedup hit
    /// the rule is dropped along with the rest of the creation details.
    pub fn create_primitive_with_rule(
        &mut self,
        name: &str,
        rule: impl Fn(&N, &TypeEngine<N>) -> RuleVerdict<N> + 'static,
    ) -> TypeId {
        let (id, added) =
            self.graph
                .add_type(name.to_string(), TypeKind::Primitive, TypeState::Completed);
        self.drain_events();
        if added {
            self.inference.add(Box::new(rule), Some(id));
        }
        id
    }

    /// Create a function type and enroll it in its overload group. The
    /// attached rules are registered bound to the created type.
    pub fn create_function(&mut self, spec: FunctionSpec<N>) -> TypeId {
        let Some((output_name, output_ty)) = spec.output else {
            panic!(
                "INTERNAL ERROR: function '{}' created without an output parameter",
                spec.name
            );
        };
        let output = Parameter {
            name: output_name,
            ty: self.canonical_id(output_ty),
        };
        let inputs: Vec<Parameter> = spec
            .inputs
            .into_iter()
            .map(|(name, ty)| Parameter {
                name,
                ty: self.canonical_id(ty),
            })
            .collect();

        let identifier =
            crate::types::function::signature_identifier(&spec.name, &output, &inputs, &self.graph);
        let data = FunctionData {
            name: spec.name.clone(),
            output: output.clone(),
            inputs: inputs.clone(),
        };
        let (id, added) =
            self.graph
                .add_type(identifier, TypeKind::Function(data), TypeState::Completed);
        if added {
            for (index, parameter) in inputs.iter().enumerate() {
                self.graph
                    .add_edge(id, parameter.ty, EdgeLabel::InputParameter(index as u32));
            }
            self.graph.add_edge(id, output.ty, EdgeLabel::OutputParameter);
            let group = self.overloads.entry(spec.name.clone()).or_default();
            if !group.contains(&id) {
                group.push(id);
            }
            // Rules ride along with the node: on a dedup hit the existing
            // node keeps its original rules and the new ones are dropped.
            if let Some(rule) = spec.call_rule {
                self.inference.add(rule, Some(id));
            }
            if let Some(rule) = spec.declaration_rule {
                self.inference.add(rule, Some(id));
            }
            if let Some(rule) = spec.call_validation {
                self.add_validation_rule_for(id, move |node, engine| rule(node, engine));
            }
        }
        self.drain_events();
        id
    }

    /// Create a unary operator: a function without a declaration rule.
    pub fn create_unary_operator(&mut self, name: &str, operand: TypeId, out: TypeId) -> TypeId {
        self.create_function(
            FunctionSpec::new(name)
                .param("operand", operand)
                .returns("result", out),
        )
    }

    pub fn create_binary_operator(
        &mut self,
        name: &str,
        left: TypeId,
        right: TypeId,
        out: TypeId,
    ) -> TypeId {
        self.create_function(
            FunctionSpec::new(name)
                .param("left", left)
                .param("right", right)
                .returns("result", out),
        )
    }

    pub fn create_ternary_operator(
        &mut self,
        name: &str,
        first: TypeId,
        second: TypeId,
        third: TypeId,
        out: TypeId,
    ) -> TypeId {
        self.create_function(
            FunctionSpec::new(name)
                .param("first", first)
                .param("second", second)
                .param("third", third)
                .returns("result", out),
        )
    }

    /// Declare (or re-declare) a fixed-parameters template. Re-declaring
    /// with a different variance updates the policy for all existing
    /// instances of the base name.
    pub fn declare_fixed_parameters(
        &mut self,
        base: &str,
        parameter_names: &[&str],
        policy: ParameterPolicy,
    ) -> FixedParameters {
        let previous = self.variance.insert(base.to_string(), policy);
        if previous.is_some_and(|p| p != policy) {
            tracing::debug!(base, ?policy, "template variance re-declared");
            self.caches.clear();
        }
        FixedParameters {
            base: base.to_string(),
            parameter_names: parameter_names.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub(crate) fn create_fixed_instance(&mut self, base: &str, arguments: &[TypeId]) -> TypeId {
        let args: TypeIdVec = arguments.iter().map(|&a| self.canonical_id(a)).collect();
        let identifier = crate::types::fixed::instance_identifier(base, &args, &self.graph);
        let data = FixedData {
            base: base.to_string(),
            args: args.clone(),
        };
        let (id, added) =
            self.graph
                .add_type(identifier, TypeKind::Fixed(data), TypeState::Completed);
        if added {
            for (position, &arg) in args.iter().enumerate() {
                self.graph
                    .add_edge(id, arg, EdgeLabel::TypeArgument(position as u32));
            }
        }
        self.drain_events();
        id
    }

    /// Remove a type: incident edges are detached first, bound rules are
    /// evicted, dependent types fall back to invalid.
    pub fn remove_type(&mut self, id: TypeId) -> bool {
        let id = self.canonical_id(id);
        let removed = self.graph.remove_type(id).is_some();
        if removed {
            self.drain_events();
        }
        removed
    }

    // ========================================================================
    // Event drain
    // ========================================================================

    /// Drain the graph's event queue to a fixed point: engine-internal
    /// reactions run first for each event (and may queue further events),
    /// then user listeners observe it. Delivery order is FIFO.
    pub(crate) fn drain_events(&mut self) {
        while let Some(event) = self.graph.pop_event() {
            self.caches.clear();
            match &event {
                GraphEvent::TypeAdded(id) => {
                    let id = *id;
                    // Bottom is a subtype of everything, including types
                    // added after it; the cycle check is suppressed.
                    if id != self.bottom
                        && self.graph.contains(self.bottom)
                        && self
                            .graph
                            .find_edge(self.bottom, id, EdgeLabel::SubType)
                            .is_none()
                    {
                        self.graph.add_edge(self.bottom, id, EdgeLabel::SubType);
                    }
                    self.progress_pending();
                }
                GraphEvent::TypeRemoved(ty) => {
                    let id = ty.id();
                    self.inference.evict_for_type(id);
                    self.validation.evict_for_type(id);
                    if let TypeKind::Function(func) = ty.kind()
                        && let Some(group) = self.overloads.get_mut(&func.name)
                    {
                        group.retain(|f| *f != id);
                        if group.is_empty() {
                            self.overloads.remove(&func.name);
                        }
                    }
                    self.forwarded.retain(|k, v| *k != id && *v != id);
                    self.cascade_invalidate(id);
                }
                GraphEvent::EdgeAdded(_) | GraphEvent::EdgeRemoved(_) => {}
            }
            self.graph.dispatch(&event);
        }
    }
}

impl<N: Clone + 'static> Default for TypeEngine<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, GraphListener};
    use crate::types::Type;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> TypeEngine<()> {
        TypeEngine::new()
    }

    #[test]
    fn new_engine_has_top_and_bottom_singletons() {
        let engine = engine();
        assert_eq!(engine.type_by_identifier("Top"), Some(engine.top()));
        assert_eq!(engine.type_by_identifier("Bottom"), Some(engine.bottom()));
        assert_eq!(engine.type_state(engine.top()), Some(TypeState::Completed));
    }

    #[test]
    fn primitive_creation_deduplicates() {
        let mut engine = engine();
        let a = engine.create_primitive("integer");
        let b = engine.create_primitive("integer");
        assert_eq!(a, b);
        assert_eq!(engine.graph().live_count(), 3); // Top, Bottom, integer
    }

    #[test]
    fn identical_signatures_share_one_function_node() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let f1 = engine.create_binary_operator("+", int, int, int);
        let f2 = engine.create_binary_operator("+", int, int, int);
        assert_eq!(f1, f2);
        assert_eq!(engine.overload_group("+").unwrap().len(), 1);
    }

    #[test]
    fn function_nodes_bind_their_parameter_types() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let s = engine.create_primitive("string");
        let f = engine.create_function(
            FunctionSpec::new("f").param("x", int).returns("result", s),
        );
        let inputs: Vec<_> = engine
            .graph()
            .outgoing(f)
            .filter(|e| matches!(e.label, EdgeLabel::InputParameter(_)))
            .map(|e| e.to)
            .collect();
        assert_eq!(inputs, vec![int]);
        assert!(
            engine
                .graph()
                .outgoing(f)
                .any(|e| e.label == EdgeLabel::OutputParameter && e.to == s)
        );
    }

    #[test]
    fn removing_a_function_shrinks_its_overload_group() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let s = engine.create_primitive("string");
        let f_int = engine.create_unary_operator("f", int, int);
        let _f_str = engine.create_unary_operator("f", s, s);
        assert_eq!(engine.overload_group("f").unwrap().len(), 2);

        engine.remove_type(f_int);
        assert_eq!(engine.overload_group("f").unwrap().len(), 1);
        let resolved = engine.resolve_overload("f", &[s]).unwrap();
        assert_eq!(resolved.output, s);
    }

    #[test]
    #[should_panic(expected = "INTERNAL ERROR")]
    fn function_without_output_panics() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        engine.create_function(FunctionSpec::new("broken").param("x", int));
    }

    #[test]
    #[should_panic(expected = "INTERNAL ERROR")]
    fn template_arity_mismatch_panics() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let list = engine.declare_fixed_parameters("List", &["T"], ParameterPolicy::EqualType);
        list.create(&mut engine, &[int, int]);
    }

    #[test]
    fn graph_listeners_observe_engine_mutations_in_order() {
        #[derive(Default)]
        struct Recorder(Rc<RefCell<Vec<String>>>);
        impl GraphListener for Recorder {
            fn on_type_added(&mut self, graph: &TypeGraph, added: crate::types::TypeId) {
                let name = graph.identifier_of(added).unwrap_or("?").to_string();
                self.0.borrow_mut().push(format!("+{name}"));
            }
            fn on_type_removed(&mut self, _graph: &TypeGraph, removed: &Type) {
                self.0.borrow_mut().push(format!("-{}", removed.identifier()));
            }
            fn on_edge_removed(&mut self, _graph: &TypeGraph, _edge: &Edge) {
                self.0.borrow_mut().push("-edge".to_string());
            }
        }

        let mut engine = engine();
        let log = Rc::new(RefCell::new(Vec::new()));
        engine.add_graph_listener(Box::new(Recorder(log.clone())));

        let int = engine.create_primitive("integer");
        engine.remove_type(int);

        // The bottom-type edge is added and removed alongside the node;
        // edge removal is delivered before the node removal.
        let log = log.borrow();
        assert_eq!(log.first().map(String::as_str), Some("+integer"));
        let minus_edge = log.iter().position(|e| e == "-edge").unwrap();
        let minus_node = log.iter().position(|e| e == "-integer").unwrap();
        assert!(minus_edge < minus_node);
    }

    #[test]
    fn caches_are_invalidated_by_structural_changes() {
        let mut engine = engine();
        let a = engine.create_primitive("a");
        let b = engine.create_primitive("b");
        assert!(!engine.is_subtype(a, b));
        engine.mark_as_subtype(a, b).unwrap();
        assert!(engine.is_subtype(a, b));
    }

    #[test]
    fn redeclaring_a_function_does_not_duplicate_its_rules() {
        let mut engine = engine();
        let int = engine.create_primitive("integer");
        let make_spec = || {
            FunctionSpec::new("f")
                .param("x", int)
                .returns("result", int)
                .with_call_validation(|_, _| vec![ValidationIssue::error("checked")])
        };
        let f1 = engine.create_function(make_spec());
        let f2 = engine.create_function(make_spec());
        assert_eq!(f1, f2);

        // The dedup hit dropped the second validation rule; the check
        // fires once, not twice.
        assert_eq!(engine.validate(&()).len(), 1);
    }

    #[test]
    fn redeclaring_a_primitive_drops_the_new_rule() {
        let mut engine = engine();
        let first =
            engine.create_primitive_with_rule("boolean", |_, _| RuleVerdict::NotApplicable);
        let second =
            engine.create_primitive_with_rule("boolean", |_, _| RuleVerdict::Matches(true));
        assert_eq!(first, second);

        // The second rule was dropped on the dedup hit, so only the first
        // (never-applicable) rule is registered and nothing answers.
        assert!(engine.infer_type(&()).is_err());
    }
}
