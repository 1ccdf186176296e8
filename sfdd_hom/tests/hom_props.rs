#![allow(missing_docs)]

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use quickcheck::{quickcheck, Arbitrary, Gen};
use sfdd_core::{Factory, Node};
use sfdd_hom::{Hom, HomStore};

lazy_static! {
    static ref KEY_UNIVERSE: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
}

#[derive(Clone, Debug)]
struct SmallFamily(Vec<Vec<u8>>);

impl Arbitrary for SmallFamily {
    fn arbitrary(g: &mut Gen) -> Self {
        let members = usize::arbitrary(g) % 5;
        let sets = (0..members)
            .map(|_| {
                let len = usize::arbitrary(g) % 4;
                (0..len)
                    .map(|_| *g.choose(&KEY_UNIVERSE).expect("universe is non-empty"))
                    .collect()
            })
            .collect();
        SmallFamily(sets)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(SmallFamily))
    }
}

#[derive(Clone, Debug)]
struct KeySet(Vec<u8>);

impl Arbitrary for KeySet {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 3;
        KeySet(
            (0..len)
                .map(|_| *g.choose(&KEY_UNIVERSE).expect("universe is non-empty"))
                .collect(),
        )
    }
}

/// Flat description of a random homomorphism over keyed operations; kept
/// declarative so shrinking stays meaningful.
#[derive(Clone, Debug)]
enum HomShape {
    Insert(KeySet),
    Remove(KeySet),
    Filter(KeySet),
    Identity,
    Composition(Vec<HomShape>),
    Union(Vec<HomShape>),
    Dive(u8, Box<HomShape>),
    Saturate(KeySet),
}

impl HomShape {
    fn leaf(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 4 {
            0 => HomShape::Insert(KeySet::arbitrary(g)),
            1 => HomShape::Remove(KeySet::arbitrary(g)),
            2 => HomShape::Filter(KeySet::arbitrary(g)),
            _ => HomShape::Identity,
        }
    }

    fn nested(g: &mut Gen, depth: usize) -> Self {
        if depth == 0 {
            return Self::leaf(g);
        }
        match u8::arbitrary(g) % 6 {
            0 | 1 => {
                let len = 2 + usize::arbitrary(g) % 2;
                HomShape::Composition((0..len).map(|_| Self::nested(g, depth - 1)).collect())
            }
            2 => {
                let len = 2 + usize::arbitrary(g) % 2;
                HomShape::Union((0..len).map(|_| Self::nested(g, depth - 1)).collect())
            }
            3 => HomShape::Dive(
                *g.choose(&KEY_UNIVERSE).expect("universe is non-empty"),
                Box::new(Self::nested(g, depth - 1)),
            ),
            4 => HomShape::Saturate(KeySet::arbitrary(g)),
            _ => Self::leaf(g),
        }
    }

    fn build(&self, store: &HomStore<u8>) -> Hom<u8> {
        match self {
            HomShape::Insert(keys) => store.insert(keys.0.clone()),
            HomShape::Remove(keys) => store.remove(keys.0.clone()),
            HomShape::Filter(keys) => store.filter(keys.0.clone()),
            HomShape::Identity => store.identity(),
            HomShape::Composition(parts) => {
                store.composition(parts.iter().map(|part| part.build(store)))
            }
            HomShape::Union(parts) => store.union(parts.iter().map(|part| part.build(store))),
            HomShape::Dive(key, body) => store.dive(*key, &body.build(store)),
            HomShape::Saturate(keys) => {
                store.fixed_point(&store.union([store.identity(), store.insert(keys.0.clone())]))
            }
        }
    }
}

impl Arbitrary for HomShape {
    fn arbitrary(g: &mut Gen) -> Self {
        Self::nested(g, 2)
    }
}

type Model = BTreeSet<BTreeSet<u8>>;

fn model(family: &SmallFamily) -> Model {
    family
        .0
        .iter()
        .map(|set| set.iter().copied().collect())
        .collect()
}

fn build(factory: &Factory<u8>, family: &SmallFamily) -> Node<u8> {
    factory.family(family.0.clone())
}

fn realize(node: &Node<u8>) -> Model {
    node.sets().map(|set| set.into_iter().collect()).collect()
}

#[test]
fn test_insert_matches_model() {
    fn prop(family: SmallFamily, keys: KeySet) -> bool {
        let factory = Factory::new();
        let store = HomStore::new();
        let node = build(&factory, &family);
        let applied = store.insert(keys.0.clone()).apply(&node);

        let expected: Model = model(&family)
            .into_iter()
            .map(|mut set| {
                set.extend(keys.0.iter().copied());
                set
            })
            .collect();
        realize(&applied) == expected
    }
    quickcheck(prop as fn(SmallFamily, KeySet) -> bool);
}

#[test]
fn test_remove_matches_model() {
    fn prop(family: SmallFamily, keys: KeySet) -> bool {
        let factory = Factory::new();
        let store = HomStore::new();
        let node = build(&factory, &family);
        let applied = store.remove(keys.0.clone()).apply(&node);

        let expected: Model = model(&family)
            .into_iter()
            .map(|set| {
                set.into_iter()
                    .filter(|key| !keys.0.contains(key))
                    .collect()
            })
            .collect();
        realize(&applied) == expected
    }
    quickcheck(prop as fn(SmallFamily, KeySet) -> bool);
}

#[test]
fn test_filter_matches_model() {
    fn prop(family: SmallFamily, keys: KeySet) -> bool {
        let factory = Factory::new();
        let store = HomStore::new();
        let node = build(&factory, &family);
        let applied = store.filter(keys.0.clone()).apply(&node);

        let expected: Model = model(&family)
            .into_iter()
            .filter(|set| keys.0.iter().all(|key| set.contains(key)))
            .collect();
        realize(&applied) == expected
    }
    quickcheck(prop as fn(SmallFamily, KeySet) -> bool);
}

#[test]
fn test_dive_equals_body_for_keyed_bodies() {
    fn prop(family: SmallFamily, keys: KeySet) -> bool {
        if keys.0.is_empty() {
            return true;
        }
        let factory = Factory::new();
        let store = HomStore::new();
        let node = build(&factory, &family);

        // The body touches no key below its smallest, so diving onto that
        // key is the same transformation.
        let body = store.insert(keys.0.clone());
        let target = *keys.0.iter().min().expect("keys are non-empty");
        store.dive(target, &body).apply(&node) == body.apply(&node)
    }
    quickcheck(prop as fn(SmallFamily, KeySet) -> bool);
}

#[test]
fn test_optimize_preserves_application() {
    fn prop(shape: HomShape, family: SmallFamily) -> bool {
        let factory = Factory::new();
        let store = HomStore::new();
        let node = build(&factory, &family);

        let hom = shape.build(&store);
        let optimized = store.optimize(&hom);
        optimized.apply(&node) == hom.apply(&node)
    }
    quickcheck(prop as fn(HomShape, SmallFamily) -> bool);
}

#[test]
fn test_optimize_is_idempotent_on_random_shapes() {
    fn prop(shape: HomShape) -> bool {
        let store = HomStore::new();
        let hom = shape.build(&store);
        let once = store.optimize(&hom);
        store.optimize(&once) == once
    }
    quickcheck(prop as fn(HomShape) -> bool);
}
