#![allow(missing_docs)]

use rstest::rstest;
use sfdd_core::Factory;
use sfdd_hom::HomStore;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[test]
fn test_insert_adds_keys_to_every_member() {
    init_logging();
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2]]);
    let inserted = store.insert([4]).apply(&family);
    assert_eq!(inserted, factory.family(vec![vec![1, 2, 4]]));
}

#[test]
fn test_insert_merges_on_existing_key() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2], vec![2, 3], vec![4]]);
    let inserted = store.insert([2]).apply(&family);
    assert_eq!(
        inserted,
        factory.family(vec![vec![1, 2], vec![2, 3], vec![2, 4]])
    );
}

#[test]
fn test_remove_drops_keys_from_every_member() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2], vec![2, 3]]);
    let removed = store.remove([2]).apply(&family);
    assert_eq!(removed, factory.family(vec![vec![1], vec![3]]));
}

#[test]
fn test_remove_can_collapse_members() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1], vec![2]]);
    let removed = store.remove([1, 2]).apply(&family);
    assert_eq!(removed, factory.one());
}

#[test]
fn test_filter_keeps_members_containing_all_keys() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2], vec![1, 3]]);
    let filtered = store.filter([2]).apply(&family);
    assert_eq!(filtered, factory.family(vec![vec![1, 2]]));
}

#[test]
fn test_filter_rejects_terminals() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    assert!(store.filter([1]).apply(&factory.one()).is_zero());
    assert!(store.filter([1]).apply(&factory.zero()).is_zero());
}

#[test]
fn test_empty_key_lists_are_identities() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2], vec![3]]);
    assert_eq!(store.insert(Vec::new()).apply(&family), family);
    assert_eq!(store.remove(Vec::new()).apply(&family), family);
    assert_eq!(store.filter(Vec::new()).apply(&family), family);
}

#[test]
fn test_dive_agrees_with_its_body_from_the_target_level() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let insert = store.insert([9]);
    let family = factory.family(vec![vec![2, 3], vec![3]]);

    // The walk bottoms out at the root (key 2) for both targets, so the
    // dive is exactly its body.
    assert_eq!(
        store.dive(2, &insert).apply(&family),
        insert.apply(&family)
    );
    assert_eq!(
        store.dive(1, &insert).apply(&family),
        insert.apply(&family)
    );
    assert_eq!(
        insert.apply(&family),
        factory.family(vec![vec![2, 3, 9], vec![3, 9]])
    );
}

#[test]
fn test_dive_descends_past_smaller_keys() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 3], vec![1]]);
    let dived = store.dive(3, &store.remove([3])).apply(&family);
    assert_eq!(dived, factory.family(vec![vec![1]]));
}

#[test]
fn test_dive_hands_opaque_bodies_the_stop_level() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let pinned = factory.family(vec![vec![7]]);
    let replace = store.constant(&pinned);

    // Root key 10 sits at or above target 5, so the body takes over there;
    // the same holds for terminals.
    assert_eq!(
        store.dive(5, &replace).apply(&factory.family(vec![vec![10]])),
        pinned
    );
    assert_eq!(store.dive(5, &replace).apply(&factory.one()), pinned);

    // Below the target the walk rebuilds the level and the body replaces
    // both subtrees.
    assert_eq!(
        store.dive(5, &replace).apply(&factory.family(vec![vec![2, 10]])),
        factory.family(vec![vec![2, 7], vec![7]])
    );
}

#[test]
fn test_identity_and_constant() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2]]);
    let pinned = factory.family(vec![vec![5]]);

    assert_eq!(store.identity().apply(&family), family);
    assert_eq!(store.constant(&pinned).apply(&family), pinned);
}

#[test]
fn test_union_hom_joins_branch_results() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1]]);
    let hom = store.union([store.insert([2]), store.insert([3])]);
    assert_eq!(
        hom.apply(&family),
        factory.family(vec![vec![1, 2], vec![1, 3]])
    );
}

#[test]
fn test_intersection_hom_meets_branch_results() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1], vec![2]]);
    let keep1 = store.filter([1]);
    let keep2 = store.filter([2]);
    assert!(store
        .intersection([keep1.clone(), keep2])
        .apply(&family)
        .is_zero());
    assert_eq!(
        store.intersection([keep1.clone(), keep1]).apply(&family),
        factory.family(vec![vec![1]])
    );
}

#[test]
fn test_composition_applies_left_to_right() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1]]);
    // Insert 2 first, then remove it again: the order is observable.
    let insert_then_remove = store.composition([store.insert([2]), store.remove([2])]);
    let remove_then_insert = store.composition([store.remove([2]), store.insert([2])]);

    assert_eq!(insert_then_remove.apply(&family), factory.family(vec![vec![1]]));
    assert_eq!(
        remove_then_insert.apply(&family),
        factory.family(vec![vec![1, 2]])
    );
}

#[test]
fn test_fixed_point_saturates() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    // Saturation under "members may also appear with key 3": adding the
    // union with the inserted variant until nothing changes.
    let widen = store.union([store.identity(), store.insert([3])]);
    let fix = store.fixed_point(&widen);

    let family = factory.family(vec![vec![1], vec![2, 3]]);
    let expected = factory.family(vec![vec![1], vec![1, 3], vec![2, 3]]);
    assert_eq!(fix.apply(&family), expected);

    // Applying again moves nothing: already a fixed point.
    assert_eq!(fix.apply(&expected), expected);
}

#[test]
fn test_inductive_substitute_and_steps() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    // Recursion scheme that keeps take branches and empties skip branches,
    // keeping exactly the members containing the root key.
    let keep_root = {
        let store = store.clone();
        store.clone().inductive(None, move |_, node| {
            let zero = node.factory().zero();
            (store.identity(), store.constant(&zero))
        })
    };

    let family = factory.family(vec![vec![1, 2], vec![2]]);
    assert_eq!(
        keep_root.apply(&family),
        factory.family(vec![vec![1, 2]])
    );

    // A substitute rewrites the accepting terminal.
    let replace_tip = store.inductive(Some(factory.family(vec![vec![9]])), |hom, _| {
        (hom.clone(), hom.clone())
    });
    assert_eq!(
        replace_tip.apply(&factory.one()),
        factory.family(vec![vec![9]])
    );
    assert_eq!(replace_tip.apply(&factory.zero()), factory.zero());
}

#[rstest]
#[case(vec![3, 1, 3], vec![1, 3])]
#[case(vec![2], vec![2])]
#[case(vec![], vec![])]
fn test_key_lists_normalize_at_construction(#[case] raw: Vec<u32>, #[case] sorted: Vec<u32>) {
    let store: HomStore<u32> = HomStore::new();
    assert_eq!(store.insert(raw.clone()), store.insert(sorted.clone()));
    assert_eq!(store.remove(raw.clone()), store.remove(sorted.clone()));
    assert_eq!(store.filter(raw), store.filter(sorted));
}

#[test]
#[should_panic(expected = "another factory")]
fn test_constant_from_another_factory_is_rejected() {
    let left: Factory<u32> = Factory::new();
    let right: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let pinned = left.family(vec![vec![1]]);
    let node = right.family(vec![vec![2]]);
    let _ = store.constant(&pinned).apply(&node);
}

#[test]
fn test_homomorphisms_are_uniqued() {
    let store: HomStore<u32> = HomStore::new();

    assert_eq!(store.insert([3, 1]), store.insert([1, 3, 3]));
    assert_eq!(store.identity(), store.identity());
    assert_eq!(
        store.composition([store.insert([1]), store.remove([2])]),
        store.composition([store.insert([1]), store.remove([2])])
    );
    assert_ne!(store.insert([1]), store.remove([1]));
    assert_ne!(
        store.dive(1, &store.insert([2])),
        store.dive(2, &store.insert([2]))
    );

    // Opaque recursion schemes are equal only to themselves.
    let a = store.inductive(None, |hom, _| (hom.clone(), hom.clone()));
    let b = store.inductive(None, |hom, _| (hom.clone(), hom.clone()));
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
}

#[test]
fn test_application_is_memoized_per_instance() {
    let factory: Factory<u32> = Factory::new();
    let store: HomStore<u32> = HomStore::new();

    let family = factory.family(vec![vec![1, 2], vec![2, 3]]);
    let hom = store.insert([5]);
    let first = hom.apply(&family);
    let second = hom.apply(&family);
    assert_eq!(first, second);

    // A structurally equal homomorphism is the same instance, so it shares
    // the cache.
    assert_eq!(store.insert([5]).apply(&family), first);
}

#[test]
fn test_singleton_combinators_collapse() {
    let store: HomStore<u32> = HomStore::new();
    let insert = store.insert([1]);

    assert_eq!(store.union([insert.clone()]), insert);
    assert_eq!(store.union([insert.clone(), insert.clone()]), insert);
    assert_eq!(store.intersection([insert.clone()]), insert);
    assert_eq!(store.composition([insert.clone()]), insert);
}
