// src/types/class.rs
//
// Class kind: named fields plus a nominal or structural identity policy.

use crate::graph::TypeGraph;
use crate::types::{TypeId, TypeIdVec};

/// A named, typed field of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
}

/// How a class derives its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassIdentity {
    /// Identifier is the qualified class name alone.
    Nominal,
    /// Identifier additionally encodes the canonical field list, so two
    /// classes with the same shape are the same type.
    Structural,
}

/// Field comparison policy for structural subtyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldVariance {
    /// Field types must be equal.
    Invariant,
    /// A field of the subtype may be a subtype of the supertype's field.
    Covariant,
}

#[derive(Debug, Clone)]
pub struct ClassData {
    pub name: String,
    pub identity: ClassIdentity,
    pub field_variance: FieldVariance,
    pub fields: Vec<Field>,
    /// Declared superclasses. Mirrored as subtype edges once completed.
    pub supers: TypeIdVec,
}

/// Derive the identifier of a structural class: the qualified name plus a
/// canonical `(name, type-id)` encoding of its fields sorted by name.
pub(crate) fn structural_identifier(name: &str, fields: &[Field], graph: &TypeGraph) -> String {
    let mut parts: Vec<(&str, &str)> = fields
        .iter()
        .map(|f| {
            let ty = graph
                .identifier_of(f.ty)
                .expect("INTERNAL ERROR: structural field references a removed type");
            (f.name.as_str(), ty)
        })
        .collect();
    parts.sort_by_key(|(field_name, _)| *field_name);

    let mut out = String::from(name);
    out.push('{');
    for (idx, (field_name, ty)) in parts.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(field_name);
        out.push(':');
        out.push_str(ty);
    }
    out.push('}');
    out
}

/// Fields sorted by name, for order-insensitive comparison.
pub(crate) fn sorted_fields(data: &ClassData) -> Vec<&Field> {
    let mut fields: Vec<&Field> = data.fields.iter().collect();
    fields.sort_by_key(|f| f.name.as_str());
    fields
}

impl ClassData {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TypeGraph;
    use crate::types::{TypeKind, TypeState};

    #[test]
    fn structural_identifier_sorts_fields_by_name() {
        let mut graph = TypeGraph::new();
        let (int, _) = graph.add_type("integer".into(), TypeKind::Primitive, TypeState::Completed);
        let (s, _) = graph.add_type("string".into(), TypeKind::Primitive, TypeState::Completed);

        let fields = vec![
            Field {
                name: "zulu".into(),
                ty: s,
            },
            Field {
                name: "alpha".into(),
                ty: int,
            },
        ];
        assert_eq!(
            structural_identifier("Point", &fields, &graph),
            "Point{alpha:integer,zulu:string}"
        );
    }

    #[test]
    fn field_lookup_by_name() {
        let data = ClassData {
            name: "C".into(),
            identity: ClassIdentity::Nominal,
            field_variance: FieldVariance::Invariant,
            fields: vec![Field {
                name: "x".into(),
                ty: TypeId(0),
            }],
            supers: TypeIdVec::new(),
        };
        assert!(data.field("x").is_some());
        assert!(data.field("y").is_none());
    }
}
