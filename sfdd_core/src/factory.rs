//! Node factory: the owner of one SFDD island.
//!
//! The factory pins the two terminals, mints every internal node through the
//! weak unique table, and carries the operation caches of the set-algebra
//! kernel. All nodes reachable from a factory belong to it; mixing nodes
//! from two factories is a caller bug and fatal.

use std::cell::{OnceCell, RefCell};
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

use ahash::{AHashMap, RandomState};
use tracing::debug;

use crate::algebra::{PairKey, SetKey};
use crate::node::{Node, NodeData, NodeKind};
use crate::pool::WeakPool;

/// Sizing knobs for a new [`Factory`].
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Initial bucket count of the unique table.
    pub table_capacity: usize,
    /// Initial capacity of each operation cache.
    pub cache_capacity: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        FactoryConfig {
            table_capacity: 256,
            cache_capacity: 256,
        }
    }
}

/// Memoization caches of the set-algebra kernel, keyed by operand identity.
///
/// Keys and values are strong references; the caches are flushed when the
/// factory drops.
pub(crate) struct OpCaches<K> {
    pub(crate) union: AHashMap<PairKey<K>, Node<K>>,
    pub(crate) intersection: AHashMap<PairKey<K>, Node<K>>,
    pub(crate) symmetric_difference: AHashMap<PairKey<K>, Node<K>>,
    pub(crate) subtraction: AHashMap<PairKey<K>, Node<K>>,
    pub(crate) union_many: AHashMap<SetKey<K>, Node<K>>,
}

impl<K> OpCaches<K> {
    fn with_capacity(capacity: usize) -> Self {
        OpCaches {
            union: AHashMap::with_capacity(capacity),
            intersection: AHashMap::with_capacity(capacity),
            symmetric_difference: AHashMap::with_capacity(capacity),
            subtraction: AHashMap::with_capacity(capacity),
            union_many: AHashMap::with_capacity(capacity),
        }
    }
}

pub(crate) struct FactoryInner<K> {
    zero: OnceCell<Node<K>>,
    one: OnceCell<Node<K>>,
    hasher: RandomState,
    pub(crate) table: RefCell<WeakPool<NodeData<K>>>,
    pub(crate) caches: RefCell<OpCaches<K>>,
}

/// Handle to one SFDD island: terminals, unique table, and caches.
///
/// Cloning shares the island. A factory and its nodes are single-threaded;
/// callers serialize access externally.
pub struct Factory<K> {
    pub(crate) inner: Rc<FactoryInner<K>>,
}

impl<K> Clone for Factory<K> {
    fn clone(&self) -> Self {
        Factory {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K> Default for Factory<K> {
    fn default() -> Self {
        Self::new()
    }
}

const TAG_ZERO: u8 = 0;
const TAG_ONE: u8 = 1;
const TAG_INNER: u8 = 2;

impl<K> Factory<K> {
    /// Creates a factory with default sizing.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    /// Creates a factory sized by `config`.
    #[must_use]
    pub fn with_config(config: FactoryConfig) -> Self {
        let inner = Rc::new(FactoryInner {
            zero: OnceCell::new(),
            one: OnceCell::new(),
            hasher: RandomState::new(),
            table: RefCell::new(WeakPool::with_capacity(config.table_capacity)),
            caches: RefCell::new(OpCaches::with_capacity(config.cache_capacity)),
        });

        let zero = Node(Rc::new(NodeData {
            kind: NodeKind::Zero,
            count: 0,
            fingerprint: inner.hasher.hash_one(TAG_ZERO),
            factory: Rc::downgrade(&inner),
        }));
        let one = Node(Rc::new(NodeData {
            kind: NodeKind::One,
            count: 1,
            fingerprint: inner.hasher.hash_one(TAG_ONE),
            factory: Rc::downgrade(&inner),
        }));
        assert!(inner.zero.set(zero).is_ok(), "terminal already pinned");
        assert!(inner.one.set(one).is_ok(), "terminal already pinned");

        debug!("sfdd factory created");
        Factory { inner }
    }

    pub(crate) fn from_inner(inner: Rc<FactoryInner<K>>) -> Self {
        Factory { inner }
    }

    /// True when `node` belongs to this factory.
    #[must_use]
    pub fn same_island(&self, node: &Node<K>) -> bool {
        node.0
            .factory
            .upgrade()
            .is_some_and(|other| Rc::ptr_eq(&self.inner, &other))
    }

    /// The rejecting terminal, denoting `{}`.
    #[must_use]
    pub fn zero(&self) -> Node<K> {
        self.inner.zero.get().expect("terminal pinned at init").clone()
    }

    /// The accepting terminal, denoting `{∅}`.
    #[must_use]
    pub fn one(&self) -> Node<K> {
        self.inner.one.get().expect("terminal pinned at init").clone()
    }

    /// Live-node estimate of the unique table, terminals excluded.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.inner.table.borrow().live_len()
    }
}

impl<K: Ord + Hash + Clone> Factory<K> {
    /// Mints the canonical node `⟨key, take, skip⟩`.
    ///
    /// The only way to build internal nodes. A rejecting `take` collapses
    /// the node to its `skip`.
    ///
    /// # Panics
    ///
    /// Panics when `take` or `skip` has a root key not strictly above `key`,
    /// or when an operand belongs to another factory.
    pub fn node(&self, key: K, take: Node<K>, skip: Node<K>) -> Node<K> {
        assert!(
            self.same_island(&take) && self.same_island(&skip),
            "node children must come from the same factory"
        );
        if take.is_zero() {
            return skip;
        }
        if let Some(take_key) = take.key() {
            assert!(key < *take_key, "take child key must be above the node key");
        }
        if let Some(skip_key) = skip.key() {
            assert!(key < *skip_key, "skip child key must be above the node key");
        }

        let count = take.count() + skip.count();
        let fingerprint = {
            let mut state = self.inner.hasher.build_hasher();
            TAG_INNER.hash(&mut state);
            key.hash(&mut state);
            take.fingerprint().hash(&mut state);
            skip.fingerprint().hash(&mut state);
            count.hash(&mut state);
            state.finish()
        };

        let candidate = Rc::new(NodeData {
            kind: NodeKind::Inner { key, take, skip },
            count,
            fingerprint,
            factory: Rc::downgrade(&self.inner),
        });

        let (_, canonical) = self
            .inner
            .table
            .borrow_mut()
            .insert_with(candidate, structurally_equal);
        Node(canonical)
    }

    /// Builds the family denoted by a sequence of key sets.
    ///
    /// Each sub-sequence is one member set (duplicates within it collapse);
    /// an empty sub-sequence contributes the empty set. The result is the
    /// union of all members.
    pub fn family<I, S>(&self, sequences: I) -> Node<K>
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = K>,
    {
        let mut acc = self.zero();
        for sequence in sequences {
            let mut keys: Vec<K> = sequence.into_iter().collect();
            keys.sort();
            keys.dedup();

            let mut member = self.one();
            for key in keys.into_iter().rev() {
                member = self.node(key, member, self.zero());
            }
            acc = self.union(&acc, &member);
        }
        acc
    }
}

/// Structural equality used for unique-table insertion: equal keys and
/// counts, identical children.
fn structurally_equal<K: Ord>(a: &NodeData<K>, b: &NodeData<K>) -> bool {
    match (&a.kind, &b.kind) {
        (
            NodeKind::Inner {
                key: ak,
                take: at,
                skip: asx,
            },
            NodeKind::Inner {
                key: bk,
                take: bt,
                skip: bs,
            },
        ) => ak == bk && at == bt && asx == bs && a.count == b.count,
        (NodeKind::Zero, NodeKind::Zero) | (NodeKind::One, NodeKind::One) => true,
        _ => false,
    }
}
