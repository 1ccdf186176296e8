//! Uniquing store for homomorphisms.
//!
//! The store interns every homomorphism in a weak pool, in the same way the
//! node factory interns nodes. Structural equality over the operation (with
//! children compared by identity) therefore collapses to pointer equality,
//! which the optimizer and the per-instance caches rely on.

use std::cell::RefCell;
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, RandomState};
use sfdd_core::{Node, WeakPool};

use crate::hom::{Hom, HomData, HomOp};

pub(crate) struct StoreInner<K> {
    hasher: RandomState,
    table: RefCell<WeakPool<HomData<K>>>,
}

/// Factory and unique table for homomorphisms.
///
/// Cloning shares the store. Combinators only accept children uniqued in
/// the same store.
pub struct HomStore<K> {
    pub(crate) inner: Rc<StoreInner<K>>,
}

impl<K> Clone for HomStore<K> {
    fn clone(&self) -> Self {
        HomStore {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> Default for HomStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> HomStore<K> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        HomStore {
            inner: Rc::new(StoreInner {
                hasher: RandomState::new(),
                table: RefCell::new(WeakPool::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner<K>>) -> Self {
        HomStore { inner }
    }

    fn owns(&self, hom: &Hom<K>) -> bool {
        hom.0
            .store
            .upgrade()
            .is_some_and(|other| Rc::ptr_eq(&self.inner, &other))
    }

    fn check_children(&self, children: &[Hom<K>]) {
        for child in children {
            assert!(self.owns(child), "child belongs to another store");
        }
    }
}

const TAG_IDENTITY: u8 = 0;
const TAG_CONSTANT: u8 = 1;
const TAG_UNION: u8 = 2;
const TAG_INTERSECTION: u8 = 3;
const TAG_COMPOSITION: u8 = 4;
const TAG_FIXED_POINT: u8 = 5;
const TAG_INSERT: u8 = 6;
const TAG_REMOVE: u8 = 7;
const TAG_FILTER: u8 = 8;
const TAG_DIVE: u8 = 9;
const TAG_INDUCTIVE: u8 = 10;

impl<K: Ord + Hash + Clone> HomStore<K> {
    /// The identity homomorphism.
    #[must_use]
    pub fn identity(&self) -> Hom<K> {
        self.intern(HomOp::Identity)
    }

    /// The homomorphism mapping every node to `node`.
    #[must_use]
    pub fn constant(&self, node: &Node<K>) -> Hom<K> {
        self.intern(HomOp::Constant(node.clone()))
    }

    /// Pointwise union of the children's results.
    ///
    /// Duplicate children (by identity) collapse; a single surviving child
    /// is returned as-is.
    ///
    /// # Panics
    ///
    /// Panics on an empty child list or on children from another store.
    pub fn union<I>(&self, children: I) -> Hom<K>
    where
        I: IntoIterator<Item = Hom<K>>,
    {
        let children = self.distinct_children(children);
        if children.len() == 1 {
            return children.into_iter().next().expect("one child present");
        }
        self.intern(HomOp::Union(children))
    }

    /// Pointwise intersection of the children's results.
    ///
    /// Same child handling as [`union`](Self::union).
    pub fn intersection<I>(&self, children: I) -> Hom<K>
    where
        I: IntoIterator<Item = Hom<K>>,
    {
        let children = self.distinct_children(children);
        if children.len() == 1 {
            return children.into_iter().next().expect("one child present");
        }
        self.intern(HomOp::Intersection(children))
    }

    /// Chains the children left to right: the first child is applied first,
    /// the last one last.
    ///
    /// # Panics
    ///
    /// Panics on an empty child list or on children from another store.
    pub fn composition<I>(&self, children: I) -> Hom<K>
    where
        I: IntoIterator<Item = Hom<K>>,
    {
        let children: Vec<Hom<K>> = children.into_iter().collect();
        assert!(!children.is_empty(), "composition needs at least one child");
        self.check_children(&children);
        if children.len() == 1 {
            return children.into_iter().next().expect("one child present");
        }
        self.intern(HomOp::Composition(children))
    }

    /// Iterates `body` until the result node stops changing.
    ///
    /// Termination is the caller's responsibility; a non-monotone body
    /// diverges.
    pub fn fixed_point(&self, body: &Hom<K>) -> Hom<K> {
        assert!(self.owns(body), "child belongs to another store");
        self.intern(HomOp::FixedPoint(body.clone()))
    }

    /// Ensures every member set contains all of `keys`.
    ///
    /// Keys may arrive unsorted and with duplicates.
    pub fn insert<I>(&self, keys: I) -> Hom<K>
    where
        I: IntoIterator<Item = K>,
    {
        self.intern(HomOp::Insert(sorted_keys(keys)))
    }

    /// Ensures no member set contains any of `keys`.
    pub fn remove<I>(&self, keys: I) -> Hom<K>
    where
        I: IntoIterator<Item = K>,
    {
        self.intern(HomOp::Remove(sorted_keys(keys)))
    }

    /// Keeps only the member sets containing every one of `keys`.
    pub fn filter<I>(&self, keys: I) -> Hom<K>
    where
        I: IntoIterator<Item = K>,
    {
        self.intern(HomOp::Filter(sorted_keys(keys)))
    }

    /// Descends structurally past every level below `key`, then applies
    /// `body` to the remaining subdiagram.
    ///
    /// For a body that only touches keys at or above `key` (Insert, Remove,
    /// Filter and combinations of them), this is the same transformation
    /// reached through a single walk of the upper levels; the optimizer
    /// introduces these prefixes. Any other body, such as a `Constant`, is
    /// still handed every subdiagram at the stop depth wholesale, terminals
    /// included, so no family is left untouched unless the body leaves it
    /// untouched.
    pub fn dive(&self, key: K, body: &Hom<K>) -> Hom<K> {
        assert!(self.owns(body), "child belongs to another store");
        self.intern(HomOp::Dive(key, body.clone()))
    }

    /// User-supplied recursion scheme.
    ///
    /// At an internal node, `step` chooses the homomorphisms for the two
    /// branches. The accepting terminal maps to `substitute` when given.
    /// Two `Inductive` instances are equal only when they share the same
    /// step closure.
    pub fn inductive<F>(&self, substitute: Option<Node<K>>, step: F) -> Hom<K>
    where
        F: Fn(&Hom<K>, &Node<K>) -> (Hom<K>, Hom<K>) + 'static,
    {
        self.intern(HomOp::Inductive {
            substitute,
            step: Rc::new(step),
        })
    }

    fn distinct_children<I>(&self, children: I) -> Vec<Hom<K>>
    where
        I: IntoIterator<Item = Hom<K>>,
    {
        let mut distinct: Vec<Hom<K>> = Vec::new();
        for child in children {
            if !distinct.contains(&child) {
                distinct.push(child);
            }
        }
        assert!(!distinct.is_empty(), "combinator needs at least one child");
        self.check_children(&distinct);
        distinct
    }

    pub(crate) fn intern(&self, op: HomOp<K>) -> Hom<K> {
        let fingerprint = self.fingerprint(&op);
        let candidate = Rc::new(HomData {
            op,
            fingerprint,
            cache: RefCell::new(AHashMap::new()),
            store: Rc::downgrade(&self.inner),
        });
        let (_, canonical) = self
            .inner
            .table
            .borrow_mut()
            .insert_with(candidate, structurally_equal);
        Hom(canonical)
    }

    fn fingerprint(&self, op: &HomOp<K>) -> u64 {
        let mut state = self.inner.hasher.build_hasher();
        match op {
            HomOp::Identity => TAG_IDENTITY.hash(&mut state),
            HomOp::Constant(node) => {
                TAG_CONSTANT.hash(&mut state);
                node.hash(&mut state);
            }
            HomOp::Union(children) => {
                TAG_UNION.hash(&mut state);
                children.hash(&mut state);
            }
            HomOp::Intersection(children) => {
                TAG_INTERSECTION.hash(&mut state);
                children.hash(&mut state);
            }
            HomOp::Composition(children) => {
                TAG_COMPOSITION.hash(&mut state);
                children.hash(&mut state);
            }
            HomOp::FixedPoint(body) => {
                TAG_FIXED_POINT.hash(&mut state);
                body.hash(&mut state);
            }
            HomOp::Insert(keys) => {
                TAG_INSERT.hash(&mut state);
                keys.hash(&mut state);
            }
            HomOp::Remove(keys) => {
                TAG_REMOVE.hash(&mut state);
                keys.hash(&mut state);
            }
            HomOp::Filter(keys) => {
                TAG_FILTER.hash(&mut state);
                keys.hash(&mut state);
            }
            HomOp::Dive(key, body) => {
                TAG_DIVE.hash(&mut state);
                key.hash(&mut state);
                body.hash(&mut state);
            }
            HomOp::Inductive { substitute, step } => {
                TAG_INDUCTIVE.hash(&mut state);
                if let Some(node) = substitute {
                    node.hash(&mut state);
                }
                (Rc::as_ptr(step) as *const () as usize).hash(&mut state);
            }
        }
        state.finish()
    }
}

/// Structural equality used for interning: same variant, equal payload,
/// children compared by identity.
fn structurally_equal<K: Ord>(a: &HomData<K>, b: &HomData<K>) -> bool {
    match (&a.op, &b.op) {
        (HomOp::Identity, HomOp::Identity) => true,
        (HomOp::Constant(x), HomOp::Constant(y)) => x == y,
        (HomOp::Union(xs), HomOp::Union(ys))
        | (HomOp::Intersection(xs), HomOp::Intersection(ys))
        | (HomOp::Composition(xs), HomOp::Composition(ys)) => xs == ys,
        (HomOp::FixedPoint(x), HomOp::FixedPoint(y)) => x == y,
        (HomOp::Insert(xs), HomOp::Insert(ys))
        | (HomOp::Remove(xs), HomOp::Remove(ys))
        | (HomOp::Filter(xs), HomOp::Filter(ys)) => xs == ys,
        (HomOp::Dive(xk, xb), HomOp::Dive(yk, yb)) => xk == yk && xb == yb,
        (
            HomOp::Inductive {
                substitute: xs,
                step: xf,
            },
            HomOp::Inductive {
                substitute: ys,
                step: yf,
            },
        ) => xs == ys && Rc::ptr_eq(xf, yf),
        _ => false,
    }
}

fn sorted_keys<K: Ord, I>(keys: I) -> Vec<K>
where
    I: IntoIterator<Item = K>,
{
    let mut keys: Vec<K> = keys.into_iter().collect();
    keys.sort();
    keys.dedup();
    keys
}
