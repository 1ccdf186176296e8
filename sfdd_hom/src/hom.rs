//! Homomorphism handles and their operation variants.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use itertools::Itertools;
use sfdd_core::Node;

use crate::store::{HomStore, StoreInner};

/// Signature of the user-supplied recursion step of an `Inductive`
/// homomorphism: given the homomorphism itself and the internal node under
/// inspection, produce the homomorphisms for the `take` and `skip` branches.
pub type InductiveFn<K> = dyn Fn(&Hom<K>, &Node<K>) -> (Hom<K>, Hom<K>);

/// Operation performed by a homomorphism.
pub enum HomOp<K> {
    /// `φ(y) = y`.
    Identity,
    /// `φ(y) = c` for the pinned node `c`.
    Constant(Node<K>),
    /// `φ(y) = ⋃ᵢ φᵢ(y)`.
    Union(Vec<Hom<K>>),
    /// `φ(y) = ⋂ᵢ φᵢ(y)`.
    Intersection(Vec<Hom<K>>),
    /// Left-to-right chaining: `φ(y) = φₙ(…φ₁(y)…)`.
    Composition(Vec<Hom<K>>),
    /// Iterate the body until the result no longer changes.
    FixedPoint(Hom<K>),
    /// Ensure every member set contains all of the (sorted) keys.
    Insert(Vec<K>),
    /// Ensure no member set contains any of the (sorted) keys.
    Remove(Vec<K>),
    /// Keep only member sets containing every one of the (sorted) keys.
    Filter(Vec<K>),
    /// Descend structurally past every level below `key`, then apply the
    /// body to the remaining subdiagram.
    Dive(K, Hom<K>),
    /// User-supplied recursion scheme; uniqued by closure identity.
    Inductive {
        /// Replacement for the accepting terminal, if any.
        substitute: Option<Node<K>>,
        /// Branch-homomorphism chooser invoked at internal nodes.
        step: Rc<InductiveFn<K>>,
    },
}

pub(crate) struct HomData<K> {
    pub(crate) op: HomOp<K>,
    pub(crate) fingerprint: u64,
    pub(crate) cache: RefCell<AHashMap<Node<K>, Node<K>>>,
    pub(crate) store: Weak<StoreInner<K>>,
}

impl<K> Hash for HomData<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

/// Shared handle to a uniqued homomorphism.
///
/// Equality and hashing follow identity; the store guarantees structurally
/// equal homomorphisms are identical.
pub struct Hom<K>(pub(crate) Rc<HomData<K>>);

impl<K> Clone for Hom<K> {
    fn clone(&self) -> Self {
        Hom(Rc::clone(&self.0))
    }
}

impl<K> PartialEq for Hom<K> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<K> Eq for Hom<K> {}

impl<K> Hash for Hom<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.fingerprint.hash(state);
    }
}

impl<K> Hom<K> {
    /// The operation this homomorphism performs.
    #[must_use]
    pub fn op(&self) -> &HomOp<K> {
        &self.0.op
    }

    /// True for the identity homomorphism.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self.0.op, HomOp::Identity)
    }

    /// The store this homomorphism was uniqued in.
    ///
    /// # Panics
    ///
    /// Panics if the store has been dropped while this handle survived.
    #[must_use]
    pub fn store(&self) -> HomStore<K> {
        let inner = self
            .0
            .store
            .upgrade()
            .expect("homomorphism outlived its store");
        HomStore::from_inner(inner)
    }
}

impl<K: fmt::Debug> fmt::Debug for Hom<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.op {
            HomOp::Identity => write!(f, "Identity"),
            HomOp::Constant(node) => write!(f, "Constant(count={})", node.count()),
            HomOp::Union(children) => {
                write!(f, "Union({:?})", children.iter().format(", "))
            }
            HomOp::Intersection(children) => {
                write!(f, "Intersection({:?})", children.iter().format(", "))
            }
            HomOp::Composition(children) => {
                write!(f, "Composition({:?})", children.iter().format(", "))
            }
            HomOp::FixedPoint(body) => write!(f, "FixedPoint({body:?})"),
            HomOp::Insert(keys) => write!(f, "Insert({keys:?})"),
            HomOp::Remove(keys) => write!(f, "Remove({keys:?})"),
            HomOp::Filter(keys) => write!(f, "Filter({keys:?})"),
            HomOp::Dive(key, body) => write!(f, "Dive({key:?}, {body:?})"),
            HomOp::Inductive { .. } => write!(f, "Inductive"),
        }
    }
}
