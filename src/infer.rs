// src/infer.rs
//
// The inference service: an ordered registry of rules dispatching a host
// node to its type. Rules fire in registration order; the first final
// answer wins. A rule may answer directly, delegate to the overload
// machinery (two-step call inference), or defer to the type it is bound to.
// Bound rules are evicted automatically when their type is removed.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::TypeEngine;
use crate::problems::Problem;
use crate::types::TypeId;

/// Answer of an inference rule for one host node.
pub enum RuleVerdict<N> {
    /// This rule does not recognize the node; try the next one.
    NotApplicable,
    /// Final answer: the node has this type.
    Type(TypeId),
    /// Two-step inference: the node is a call of the named overload group
    /// with these operand subnodes. The engine infers the operand types and
    /// selects the best signature; its output becomes the node's type.
    Call { name: String, operands: Vec<N> },
    /// `true` means the node matches and its type is the type this rule is
    /// bound to; `false` means not applicable.
    Matches(bool),
}

/// An inference rule. Rules receive the engine so they can query relations
/// or infer subnodes themselves.
pub type InferenceRuleFn<N> = dyn Fn(&N, &TypeEngine<N>) -> RuleVerdict<N>;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct RuleHandle(u32);

pub(crate) struct RuleEntry<N> {
    handle: RuleHandle,
    bound_to: Option<TypeId>,
    rule: Box<InferenceRuleFn<N>>,
}

pub(crate) struct InferenceRegistry<N> {
    next: u32,
    rules: Vec<RuleEntry<N>>,
    /// Bound-rule index so removing a type evicts its rules in O(k).
    by_type: FxHashMap<TypeId, SmallVec<[RuleHandle; 2]>>,
}

impl<N> InferenceRegistry<N> {
    pub(crate) fn new() -> Self {
        Self {
            next: 0,
            rules: Vec::new(),
            by_type: FxHashMap::default(),
        }
    }

    pub(crate) fn add(
        &mut self,
        rule: Box<InferenceRuleFn<N>>,
        bound_to: Option<TypeId>,
    ) -> RuleHandle {
        let handle = RuleHandle(self.next);
        self.next += 1;
        self.rules.push(RuleEntry {
            handle,
            bound_to,
            rule,
        });
        if let Some(ty) = bound_to {
            self.by_type.entry(ty).or_default().push(handle);
        }
        handle
    }

    pub(crate) fn remove(&mut self, handle: RuleHandle) -> bool {
        let before = self.rules.len();
        self.rules.retain(|entry| entry.handle != handle);
        for handles in self.by_type.values_mut() {
            handles.retain(|h| *h != handle);
        }
        self.rules.len() != before
    }

    pub(crate) fn evict_for_type(&mut self, ty: TypeId) {
        if let Some(handles) = self.by_type.remove(&ty) {
            tracing::debug!(ty = ty.index(), count = handles.len(), "evicting bound rules");
            self.rules.retain(|entry| !handles.contains(&entry.handle));
        }
    }

    fn rules(&self) -> impl Iterator<Item = &RuleEntry<N>> {
        self.rules.iter()
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Register an unbound inference rule. Rules run in registration order.
    pub fn add_inference_rule(
        &mut self,
        rule: impl Fn(&N, &TypeEngine<N>) -> RuleVerdict<N> + 'static,
    ) -> RuleHandle {
        self.inference.add(Box::new(rule), None)
    }

    /// Register a rule bound to a type: `Matches(true)` answers with that
    /// type, and the rule is removed automatically when the type is.
    pub fn add_inference_rule_for(
        &mut self,
        bound_to: TypeId,
        rule: impl Fn(&N, &TypeEngine<N>) -> RuleVerdict<N> + 'static,
    ) -> RuleHandle {
        let bound_to = self.canonical_id(bound_to);
        self.inference.add(Box::new(rule), Some(bound_to))
    }

    pub fn remove_inference_rule(&mut self, handle: RuleHandle) -> bool {
        self.inference.remove(handle)
    }

    /// Determine the type of a host node by dispatching through the rule
    /// registry.
    pub fn infer_type(&self, node: &N) -> Result<TypeId, Problem> {
        for entry in self.inference.rules() {
            match (entry.rule)(node, self) {
                RuleVerdict::NotApplicable | RuleVerdict::Matches(false) => continue,
                RuleVerdict::Type(ty) => {
                    return Ok(self.canonical_id(ty));
                }
                RuleVerdict::Matches(true) => match entry.bound_to {
                    Some(ty) => return Ok(self.canonical_id(ty)),
                    None => {
                        tracing::warn!(
                            "inference rule answered Matches(true) without a bound type; skipping"
                        );
                        continue;
                    }
                },
                RuleVerdict::Call { name, operands } => {
                    return self.infer_call(&name, &operands);
                }
            }
        }
        Err(Problem::Inference {
            message: "no inference rule applies to this node".to_string(),
            involved: vec![],
            nested: vec![],
        })
    }

    fn infer_call(&self, name: &str, operands: &[N]) -> Result<TypeId, Problem> {
        let mut argument_types = Vec::with_capacity(operands.len());
        let mut child_problems = Vec::new();
        for operand in operands {
            match self.infer_type(operand) {
                Ok(ty) => argument_types.push(ty),
                Err(problem) => child_problems.push(problem),
            }
        }
        if !child_problems.is_empty() {
            return Err(Problem::Inference {
                message: format!("could not infer the operand types of a call to '{name}'"),
                involved: argument_types,
                nested: child_problems,
            });
        }
        tracing::debug!(name, arity = argument_types.len(), "two-step call inference");
        let resolved = self.resolve_overload(name, &argument_types)?;
        Ok(self.canonical_id(resolved.output))
    }
}
