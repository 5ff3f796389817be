// src/relations/conversion.rs
//
// Explicit/implicit conversion edges between types. Conversion is a direct
// edge relation; transitivity only arises through assignability's path
// search. At most one conversion edge exists per ordered type pair.

use crate::engine::TypeEngine;
use crate::graph::{ConversionMode, EdgeId, EdgeLabel};
use crate::problems::Problem;
use crate::relations::Relator;
use crate::types::TypeId;

impl<'a> Relator<'a> {
    /// The mode of the direct conversion edge between two types, if any.
    pub(crate) fn conversion_mode(&self, from: TypeId, to: TypeId) -> Option<ConversionMode> {
        let from = self.canonical(from);
        let to = self.canonical(to);
        self.graph
            .conversion_between(from, to)
            .map(|edge| match edge.label {
                EdgeLabel::Conversion(mode) => mode,
                _ => unreachable!("conversion_between only yields conversion edges"),
            })
    }

    pub(crate) fn check_convertible(&self, from: TypeId, to: TypeId) -> Result<ConversionMode, Problem> {
        self.conversion_mode(from, to).ok_or_else(|| Problem::Conversion {
            from: self.display(self.canonical(from)),
            to: self.display(self.canonical(to)),
            involved: vec![self.canonical(from), self.canonical(to)],
            nested: vec![],
        })
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Register a conversion edge. Re-marking an existing pair replaces the
    /// previous mode.
    pub fn mark_as_convertible(
        &mut self,
        from: TypeId,
        to: TypeId,
        mode: ConversionMode,
    ) -> Result<EdgeId, Problem> {
        let from = self.canonical_id(from);
        let to = self.canonical_id(to);
        self.relator().require(from)?;
        self.relator().require(to)?;

        if let Some(existing) = self.graph.conversion_between(from, to) {
            if existing.label == EdgeLabel::Conversion(mode) {
                return Ok(existing.id);
            }
            let stale = existing.id;
            self.graph.remove_edge(stale);
        }
        let edge = self.graph.add_edge(from, to, EdgeLabel::Conversion(mode));
        self.drain_events();
        Ok(edge)
    }

    /// The registered conversion mode between two types, `None` if no edge
    /// exists. Direct edges only; see `assignability_result` for chains.
    pub fn conversion_mode(&self, from: TypeId, to: TypeId) -> Option<ConversionMode> {
        self.relator().conversion_mode(from, to)
    }

    /// Usable where an implicit coercion is expected.
    pub fn is_implicitly_convertible(&self, from: TypeId, to: TypeId) -> bool {
        self.conversion_mode(from, to)
            .is_some_and(ConversionMode::is_implicit)
    }

    /// Usable in an explicit cast: implicit-explicit conversions qualify,
    /// since implicit is a subset of explicit.
    pub fn is_explicitly_convertible(&self, from: TypeId, to: TypeId) -> bool {
        self.conversion_mode(from, to).is_some()
    }
}
