// src/printer.rs
//
// User-facing type signatures. Unlike identifiers (the dedup keys), printed
// signatures are meant for diagnostics: classes print as their name, so
// recursive classes terminate.

use crate::graph::TypeGraph;
use crate::types::{TypeId, TypeKind};

pub fn print_type(graph: &TypeGraph, id: TypeId) -> String {
    let Some(ty) = graph.type_by_id(id) else {
        return format!("<unknown #{}>", id.index());
    };
    match ty.kind() {
        TypeKind::Primitive => ty.identifier().to_string(),
        TypeKind::Top => "Top".to_string(),
        TypeKind::Bottom => "Bottom".to_string(),
        TypeKind::Class(class) => class.name.clone(),
        TypeKind::Function(func) => {
            let params: Vec<String> = func
                .inputs
                .iter()
                .map(|p| format!("{}: {}", p.name, print_type(graph, p.ty)))
                .collect();
            format!(
                "{}({}) -> {}",
                func.name,
                params.join(", "),
                print_type(graph, func.output.ty)
            )
        }
        TypeKind::Fixed(fixed) => {
            let args: Vec<String> = fixed
                .args
                .iter()
                .map(|&a| print_type(graph, a))
                .collect();
            format!("{}<{}>", fixed.base, args.join(", "))
        }
    }
}
