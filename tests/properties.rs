// tests/properties.rs
//
// Algebraic laws of the relation services, checked over generated type
// lattices: reflexivity, symmetry of equality, and the top/bottom laws.

use proptest::prelude::*;

use tyr::{ConversionMode, TypeEngine, TypeId};

/// Build an engine holding `count` primitives plus a random (acyclic)
/// sprinkling of subtype and implicit-conversion edges.
fn lattice(
    count: usize,
    subtype_pairs: &[(usize, usize)],
    conversion_pairs: &[(usize, usize)],
) -> (TypeEngine<()>, Vec<TypeId>) {
    let mut engine: TypeEngine<()> = TypeEngine::new();
    let types: Vec<TypeId> = (0..count)
        .map(|i| engine.create_primitive(&format!("p{i}")))
        .collect();
    for &(a, b) in subtype_pairs {
        let (a, b) = (a % count, b % count);
        if a != b {
            // Edges that would close a cycle are refused; that is fine.
            let _ = engine.mark_as_subtype(types[a], types[b]);
        }
    }
    for &(a, b) in conversion_pairs {
        let (a, b) = (a % count, b % count);
        if a != b {
            engine
                .mark_as_convertible(types[a], types[b], ConversionMode::ImplicitExplicit)
                .unwrap();
        }
    }
    (engine, types)
}

proptest! {
    #[test]
    fn every_type_relates_to_itself(
        count in 1usize..8,
        subs in proptest::collection::vec((0usize..8, 0usize..8), 0..10),
        convs in proptest::collection::vec((0usize..8, 0usize..8), 0..10),
    ) {
        let (engine, types) = lattice(count, &subs, &convs);
        for &ty in &types {
            prop_assert!(engine.are_types_equal(ty, ty).is_ok());
            prop_assert!(engine.is_subtype(ty, ty));
            let path = engine.assignability_result(ty, ty).unwrap();
            prop_assert!(path.is_identity());
        }
    }

    #[test]
    fn equality_is_symmetric(
        count in 2usize..8,
        a in 0usize..8,
        b in 0usize..8,
    ) {
        let (engine, types) = lattice(count, &[], &[]);
        let a = types[a % count];
        let b = types[b % count];
        prop_assert_eq!(
            engine.are_types_equal(a, b).is_ok(),
            engine.are_types_equal(b, a).is_ok()
        );
    }

    #[test]
    fn bottom_is_subtype_of_every_type(
        count in 1usize..8,
        subs in proptest::collection::vec((0usize..8, 0usize..8), 0..10),
    ) {
        let (engine, types) = lattice(count, &subs, &[]);
        for &ty in &types {
            prop_assert!(engine.is_subtype(engine.bottom(), ty));
            prop_assert!(engine.is_assignable(engine.bottom(), ty));
        }
    }

    #[test]
    fn top_is_supertype_of_every_type(
        count in 1usize..8,
        subs in proptest::collection::vec((0usize..8, 0usize..8), 0..10),
    ) {
        let (engine, types) = lattice(count, &subs, &[]);
        for &ty in &types {
            prop_assert!(engine.is_subtype(ty, engine.top()));
        }
    }

    #[test]
    fn assignability_is_transitive(
        count in 2usize..6,
        subs in proptest::collection::vec((0usize..6, 0usize..6), 0..8),
        convs in proptest::collection::vec((0usize..6, 0usize..6), 0..8),
        x in 0usize..6,
        y in 0usize..6,
        z in 0usize..6,
    ) {
        let (engine, types) = lattice(count, &subs, &convs);
        let x = types[x % count];
        let y = types[y % count];
        let z = types[z % count];
        if engine.is_assignable(x, y) && engine.is_assignable(y, z) {
            prop_assert!(engine.is_assignable(x, z));
        }
    }

    #[test]
    fn found_paths_connect_source_to_target(
        count in 2usize..6,
        subs in proptest::collection::vec((0usize..6, 0usize..6), 0..8),
        convs in proptest::collection::vec((0usize..6, 0usize..6), 0..8),
        x in 0usize..6,
        y in 0usize..6,
    ) {
        let (engine, types) = lattice(count, &subs, &convs);
        let x = types[x % count];
        let y = types[y % count];
        if let Ok(path) = engine.assignability_result(x, y)
            && !path.is_identity()
        {
            prop_assert_eq!(path.steps.first().unwrap().from, x);
            prop_assert_eq!(path.steps.last().unwrap().to, y);
            for window in path.steps.windows(2) {
                prop_assert_eq!(window[0].to, window[1].from);
            }
        }
    }
}
