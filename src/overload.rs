// src/overload.rs
//
// Overloaded-function resolution: given a name and inferred argument types,
// pick the unique best match among same-name, same-arity function types.
//
// Applicability is assignability per position; the cost of an argument is
// the length of its shortest assignability path (0 = identity, each subtype
// or implicit-conversion step adds 1). A candidate wins when it Pareto
// dominates every other applicable candidate; anything else is ambiguous
// and reported, never silently picked.

use smallvec::SmallVec;

use crate::engine::TypeEngine;
use crate::problems::Problem;
use crate::relations::Relator;
use crate::types::{TypeId, TypeKind};

type CostVec = SmallVec<[usize; 4]>;

/// The outcome of a successful overload resolution.
#[derive(Debug, Clone)]
pub struct ResolvedOverload {
    /// The winning function type.
    pub function: TypeId,
    /// Its output type - the inferred type of the call.
    pub output: TypeId,
    /// Per-argument assignability path lengths.
    pub costs: Vec<usize>,
}

struct Applicable {
    function: TypeId,
    output: TypeId,
    costs: CostVec,
}

fn dominates(a: &CostVec, b: &CostVec) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x <= y) && a.iter().zip(b.iter()).any(|(x, y)| x < y)
}

impl<'a> Relator<'a> {
    pub(crate) fn resolve_overload(
        &self,
        name: &str,
        candidates: &[TypeId],
        arguments: &[TypeId],
    ) -> Result<ResolvedOverload, Problem> {
        let mut applicable: Vec<Applicable> = Vec::new();
        let mut failures: Vec<Problem> = Vec::new();
        let mut arity_matches = 0usize;

        for &candidate in candidates {
            let candidate = self.canonical(candidate);
            let Some(ty) = self.graph.type_by_id(candidate) else {
                continue;
            };
            let TypeKind::Function(func) = ty.kind() else {
                continue;
            };
            if func.arity() != arguments.len() {
                continue;
            }
            arity_matches += 1;

            let mut costs = CostVec::new();
            let mut failed = false;
            for (&argument, parameter) in arguments.iter().zip(func.inputs.iter()) {
                match self.assignability(argument, parameter.ty) {
                    Ok(path) => costs.push(path.len()),
                    Err(problem) => {
                        failures.push(problem);
                        failed = true;
                        break;
                    }
                }
            }
            if !failed {
                applicable.push(Applicable {
                    function: candidate,
                    output: func.output.ty,
                    costs,
                });
            }
        }

        if arity_matches == 0 {
            return Err(Problem::Inference {
                message: format!(
                    "no overload of '{}' accepts {} arguments",
                    name,
                    arguments.len()
                ),
                involved: arguments.to_vec(),
                nested: vec![],
            });
        }
        if applicable.is_empty() {
            let printed: Vec<String> = arguments.iter().map(|&a| self.display(a)).collect();
            return Err(Problem::Assignability {
                from: format!("({})", printed.join(", ")),
                to: name.to_string(),
                involved: arguments.to_vec(),
                nested: failures,
            });
        }

        let winners: Vec<usize> = (0..applicable.len())
            .filter(|&i| {
                (0..applicable.len())
                    .filter(|&j| j != i)
                    .all(|j| dominates(&applicable[i].costs, &applicable[j].costs))
            })
            .collect();

        if let [winner] = winners.as_slice() {
            let winner = &applicable[*winner];
            tracing::debug!(
                name,
                function = %self.display(winner.function),
                costs = ?winner.costs,
                "overload resolved"
            );
            return Ok(ResolvedOverload {
                function: winner.function,
                output: winner.output,
                costs: winner.costs.to_vec(),
            });
        }

        // No unique dominator: report the Pareto front as the tied set.
        let front: Vec<&Applicable> = applicable
            .iter()
            .filter(|c| {
                !applicable
                    .iter()
                    .any(|other| dominates(&other.costs, &c.costs))
            })
            .collect();
        Err(Problem::AmbiguousOverload {
            name: name.to_string(),
            candidates: front.iter().map(|c| self.display(c.function)).collect(),
            involved: front.iter().map(|c| c.function).collect(),
            nested: vec![],
        })
    }
}

impl<N: Clone + 'static> TypeEngine<N> {
    /// Resolve a call to the overload group `name` with the given argument
    /// types.
    pub fn resolve_overload(
        &self,
        name: &str,
        arguments: &[TypeId],
    ) -> Result<ResolvedOverload, Problem> {
        let Some(group) = self.overload_group(name) else {
            return Err(Problem::Inference {
                message: format!("no function named '{}' is registered", name),
                involved: arguments.to_vec(),
                nested: vec![],
            });
        };
        self.relator().resolve_overload(name, group, arguments)
    }
}
