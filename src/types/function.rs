// src/types/function.rs
//
// Function kind: one named output parameter plus ordered named inputs.
// Operators are plain functions whose declaration inference rule is absent;
// same-name functions form an overload group maintained by the engine.

use crate::graph::TypeGraph;
use crate::types::TypeId;

/// A named parameter of a function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct FunctionData {
    pub name: String,
    pub output: Parameter,
    pub inputs: Vec<Parameter>,
}

impl FunctionData {
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.inputs.iter().map(|p| p.ty)
    }
}

/// Derive the identifier of a function: `name(p1:T1,p2:T2)->R` using the
/// component types' identifiers.
pub(crate) fn signature_identifier(
    name: &str,
    output: &Parameter,
    inputs: &[Parameter],
    graph: &TypeGraph,
) -> String {
    let ident = |ty: TypeId| {
        graph
            .identifier_of(ty)
            .expect("INTERNAL ERROR: function signature references a removed type")
    };
    let mut out = String::from(name);
    out.push('(');
    for (idx, p) in inputs.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(&p.name);
        out.push(':');
        out.push_str(ident(p.ty));
    }
    out.push_str(")->");
    out.push_str(ident(output.ty));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TypeGraph;
    use crate::types::{TypeKind, TypeState};

    #[test]
    fn signature_identifier_shape() {
        let mut graph = TypeGraph::new();
        let (int, _) = graph.add_type("integer".into(), TypeKind::Primitive, TypeState::Completed);
        let (s, _) = graph.add_type("string".into(), TypeKind::Primitive, TypeState::Completed);

        let output = Parameter {
            name: "result".into(),
            ty: s,
        };
        let inputs = vec![
            Parameter {
                name: "left".into(),
                ty: int,
            },
            Parameter {
                name: "right".into(),
                ty: int,
            },
        ];
        assert_eq!(
            signature_identifier("concat", &output, &inputs, &graph),
            "concat(left:integer,right:integer)->string"
        );
    }

    #[test]
    fn nullary_signature_identifier() {
        let mut graph = TypeGraph::new();
        let (int, _) = graph.add_type("integer".into(), TypeKind::Primitive, TypeState::Completed);
        let output = Parameter {
            name: "result".into(),
            ty: int,
        };
        assert_eq!(
            signature_identifier("zero", &output, &[], &graph),
            "zero()->integer"
        );
    }
}
