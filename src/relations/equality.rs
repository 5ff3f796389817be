// src/relations/equality.rs
//
// Structural type equality, delegated per kind, memoized on the unordered
// identifier pair. Comparing types of different kinds is a kind conflict.

use crate::engine::TypeEngine;
use crate::problems::Problem;
use crate::relations::Relator;
use crate::types::class::sorted_fields;
use crate::types::{ClassData, ClassIdentity, FixedData, FunctionData, Type, TypeId, TypeKind};

impl<'a> Relator<'a> {
    pub(crate) fn are_types_equal(&self, a: TypeId, b: TypeId) -> Result<(), Problem> {
        let a = self.canonical(a);
        let b = self.canonical(b);
        if a == b {
            return Ok(());
        }
        let ta = self.require(a)?;
        let tb = self.require(b)?;
        if ta.kind_name() != tb.kind_name() {
            return Err(self.kind_conflict(ta, tb));
        }

        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(hit) = self.caches.equality_hit(key) {
            tracing::trace!(?key, "equality cache hit");
            return hit;
        }
        // A pair already on the comparison stack is assumed equal; the
        // outermost frame settles the final verdict.
        if !self.caches.in_progress.borrow_mut().insert(key) {
            return Ok(());
        }
        let result = self.equality_by_kind(ta, tb);
        self.caches.in_progress.borrow_mut().remove(&key);
        self.caches.equality.borrow_mut().insert(key, result.clone());
        result
    }

    fn equality_by_kind(&self, a: &Type, b: &Type) -> Result<(), Problem> {
        let nested = match (a.kind(), b.kind()) {
            // Primitives and the singletons are equal only by identity,
            // which the caller already ruled out.
            (TypeKind::Primitive, TypeKind::Primitive)
            | (TypeKind::Top, TypeKind::Top)
            | (TypeKind::Bottom, TypeKind::Bottom) => vec![],
            (TypeKind::Class(ca), TypeKind::Class(cb)) => {
                match self.class_equality(ca, cb) {
                    Ok(()) => return Ok(()),
                    Err(nested) => nested,
                }
            }
            (TypeKind::Function(fa), TypeKind::Function(fb)) => {
                match self.function_equality(fa, fb) {
                    Ok(()) => return Ok(()),
                    Err(nested) => nested,
                }
            }
            (TypeKind::Fixed(xa), TypeKind::Fixed(xb)) => {
                match self.fixed_equality(xa, xb) {
                    Ok(()) => return Ok(()),
                    Err(nested) => nested,
                }
            }
            _ => unreachable!("kind mismatch is handled before dispatch"),
        };
        Err(Problem::TypeEquality {
            left: self.display(a.id()),
            right: self.display(b.id()),
            involved: vec![a.id(), b.id()],
            nested,
        })
    }

    /// Nominal classes are equal by identifier (so never here, identity was
    /// ruled out); structural classes by field-set equivalence.
    fn class_equality(&self, a: &ClassData, b: &ClassData) -> Result<(), Vec<Problem>> {
        if a.identity != ClassIdentity::Structural || b.identity != ClassIdentity::Structural {
            return Err(vec![]);
        }
        if a.fields.len() != b.fields.len() {
            return Err(vec![]);
        }
        let mut nested = Vec::new();
        for (fa, fb) in sorted_fields(a).iter().zip(sorted_fields(b).iter()) {
            if fa.name != fb.name {
                return Err(nested);
            }
            if let Err(problem) = self.are_types_equal(fa.ty, fb.ty) {
                nested.push(problem);
            }
        }
        if nested.is_empty() { Ok(()) } else { Err(nested) }
    }

    /// Identical output plus identical input sequence, by equality of the
    /// component types.
    fn function_equality(&self, a: &FunctionData, b: &FunctionData) -> Result<(), Vec<Problem>> {
        if a.inputs.len() != b.inputs.len() {
            return Err(vec![]);
        }
        let mut nested = Vec::new();
        if let Err(problem) = self.are_types_equal(a.output.ty, b.output.ty) {
            nested.push(problem);
        }
        for (pa, pb) in a.inputs.iter().zip(b.inputs.iter()) {
            if let Err(problem) = self.are_types_equal(pa.ty, pb.ty) {
                nested.push(problem);
            }
        }
        if nested.is_empty() { Ok(()) } else { Err(nested) }
    }

    /// Same base name and pairwise equal argument types.
    fn fixed_equality(&self, a: &FixedData, b: &FixedData) -> Result<(), Vec<Problem>> {
        if a.base != b.base || a.args.len() != b.args.len() {
            return Err(vec![]);
        }
        let mut nested = Vec::new();
        for (&xa, &xb) in a.args.iter().zip(b.args.iter()) {
            if let Err(problem) = self.are_types_equal(xa, xb) {
                nested.push(problem);
            }
        }
        if nested.is_empty() { Ok(()) } else { Err(nested) }
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Structural equality of two types. Symmetric, reflexive, memoized.
    pub fn are_types_equal(&self, a: TypeId, b: TypeId) -> Result<(), Problem> {
        self.relator().are_types_equal(a, b)
    }

    pub fn is_equal(&self, a: TypeId, b: TypeId) -> bool {
        self.are_types_equal(a, b).is_ok()
    }
}
