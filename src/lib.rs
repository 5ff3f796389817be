// src/lib.rs
//! A host-agnostic type-system engine.
//!
//! The embedding host supplies its abstract syntax; the engine maintains a
//! graph of types, determines the type of host nodes through pluggable
//! inference rules, and decides whether one type is equal, a subtype,
//! convertible, or assignable to another - reporting structured problems
//! as values when not.

pub mod engine;
pub mod graph;
pub mod infer;
pub mod init;
pub mod overload;
pub mod printer;
pub mod problems;
pub mod relations;
pub mod types;
pub mod validation;

pub use engine::{EngineConfig, FixedParameters, FunctionSpec, TypeEngine};
pub use graph::{
    ConversionMode, Edge, EdgeId, EdgeLabel, GraphEvent, GraphListener, ListenerId, TypeGraph,
};
pub use infer::{RuleHandle, RuleVerdict};
pub use init::{ClassSpec, InitPhase, TypeRef};
pub use overload::ResolvedOverload;
pub use problems::{Problem, ProblemKind};
pub use relations::assignability::{AssignabilityPath, AssignabilityStep, StepKind};
pub use relations::subtype::SubTypeOptions;
pub use types::{
    ClassData, ClassIdentity, Field, FieldVariance, FixedData, FunctionData, Parameter,
    ParameterPolicy, Type, TypeId, TypeKind, TypeState,
};
pub use validation::{Severity, ValidationHandle, ValidationIssue};
