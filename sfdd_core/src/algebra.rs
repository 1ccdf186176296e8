//! Set-algebra kernel: union, intersection, symmetric difference and
//! subtraction over canonical nodes.
//!
//! Every binary operation carries a memoization cache in the factory keyed
//! by operand identity: an unordered pair for the commutative three, an
//! ordered pair for subtraction. The n-ary union caches under the
//! identity-set of its whole operand collection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use tracing::trace;

use crate::factory::Factory;
use crate::node::{Node, NodeKind};

/// Identity-keyed operand pair.
///
/// Holds strong references so cached operands stay alive for the factory's
/// lifetime; hashing and equality follow node identity.
pub(crate) struct PairKey<K> {
    a: Node<K>,
    b: Node<K>,
}

impl<K> PairKey<K> {
    /// Pair for a commutative operation: normalized by address.
    fn unordered(a: &Node<K>, b: &Node<K>) -> Self {
        if a.addr() <= b.addr() {
            PairKey {
                a: a.clone(),
                b: b.clone(),
            }
        } else {
            PairKey {
                a: b.clone(),
                b: a.clone(),
            }
        }
    }

    /// Pair for a non-commutative operation: operand order preserved.
    fn ordered(a: &Node<K>, b: &Node<K>) -> Self {
        PairKey {
            a: a.clone(),
            b: b.clone(),
        }
    }
}

impl<K> PartialEq for PairKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b
    }
}

impl<K> Eq for PairKey<K> {}

impl<K> Hash for PairKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.a.addr().hash(state);
        self.b.addr().hash(state);
    }
}

/// Identity-set over an operand collection, for the n-ary union cache.
pub(crate) struct SetKey<K> {
    operands: Vec<Node<K>>,
}

impl<K> SetKey<K> {
    fn new(operands: &[Node<K>]) -> Self {
        let mut operands: Vec<Node<K>> = operands.to_vec();
        operands.sort_by_key(Node::addr);
        SetKey { operands }
    }
}

impl<K> PartialEq for SetKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.operands == other.operands
    }
}

impl<K> Eq for SetKey<K> {}

impl<K> Hash for SetKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for operand in &self.operands {
            operand.addr().hash(state);
        }
    }
}

impl<K: Ord + Hash + Clone> Factory<K> {
    /// Family union `a ∪ b`.
    pub fn union(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        self.check_operands(&[a, b]);
        self.union_rec(a, b)
    }

    /// Family intersection `a ∩ b`.
    pub fn intersection(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        self.check_operands(&[a, b]);
        self.intersection_rec(a, b)
    }

    /// Member sets in exactly one of `a` and `b`.
    pub fn symmetric_difference(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        self.check_operands(&[a, b]);
        self.symmetric_difference_rec(a, b)
    }

    /// Member sets of `a` that are not in `b`.
    pub fn subtracting(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        self.check_operands(&[a, b]);
        self.subtracting_rec(a, b)
    }

    /// Union of an arbitrary operand collection.
    ///
    /// Rejecting operands are dropped and duplicates (by identity) collapse
    /// before the operands are grouped by root key and folded skip-wise,
    /// terminals last.
    pub fn union_many(&self, operands: &[Node<K>]) -> Node<K> {
        for operand in operands {
            self.check_operands(&[operand]);
        }
        self.union_many_rec(operands)
    }

    fn check_operands(&self, operands: &[&Node<K>]) {
        for operand in operands {
            assert!(
                self.same_island(operand),
                "operand belongs to another factory"
            );
        }
    }

    fn union_rec(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        if a.is_zero() || a == b {
            return b.clone();
        }
        if b.is_zero() {
            return a.clone();
        }

        let key = PairKey::unordered(a, b);
        if let Some(hit) = self.inner.caches.borrow().union.get(&key) {
            trace!("union cache hit");
            return hit.clone();
        }

        let result = match (a.kind(), b.kind()) {
            (
                NodeKind::One,
                NodeKind::Inner {
                    key: bk,
                    take,
                    skip,
                },
            ) => self.node(bk.clone(), take.clone(), self.union_rec(skip, a)),
            (
                NodeKind::Inner {
                    key: ak,
                    take,
                    skip,
                },
                NodeKind::One,
            ) => self.node(ak.clone(), take.clone(), self.union_rec(skip, b)),
            (
                NodeKind::Inner {
                    key: ak,
                    take: a_take,
                    skip: a_skip,
                },
                NodeKind::Inner {
                    key: bk,
                    take: b_take,
                    skip: b_skip,
                },
            ) => match bk.cmp(ak) {
                Ordering::Greater => {
                    self.node(ak.clone(), a_take.clone(), self.union_rec(a_skip, b))
                }
                Ordering::Equal => self.node(
                    ak.clone(),
                    self.union_rec(a_take, b_take),
                    self.union_rec(a_skip, b_skip),
                ),
                Ordering::Less => self.node(bk.clone(), b_take.clone(), self.union_rec(b_skip, a)),
            },
            _ => unreachable!("terminal operands handled before the case split"),
        };

        self.inner
            .caches
            .borrow_mut()
            .union
            .insert(key, result.clone());
        result
    }

    fn intersection_rec(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        if a.is_zero() || b.is_zero() {
            return self.zero();
        }
        if a == b {
            return a.clone();
        }
        if a.is_one() {
            return b.skip_most();
        }
        if b.is_one() {
            return a.skip_most();
        }

        let key = PairKey::unordered(a, b);
        if let Some(hit) = self.inner.caches.borrow().intersection.get(&key) {
            trace!("intersection cache hit");
            return hit.clone();
        }

        let result = match (a.kind(), b.kind()) {
            (
                NodeKind::Inner {
                    key: ak,
                    take: a_take,
                    skip: a_skip,
                },
                NodeKind::Inner {
                    key: bk,
                    take: b_take,
                    skip: b_skip,
                },
            ) => match bk.cmp(ak) {
                Ordering::Greater => self.intersection_rec(a_skip, b),
                Ordering::Equal => self.node(
                    ak.clone(),
                    self.intersection_rec(a_take, b_take),
                    self.intersection_rec(a_skip, b_skip),
                ),
                Ordering::Less => self.intersection_rec(a, b_skip),
            },
            _ => unreachable!("terminal operands handled before the case split"),
        };

        self.inner
            .caches
            .borrow_mut()
            .intersection
            .insert(key, result.clone());
        result
    }

    fn symmetric_difference_rec(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        if a.is_zero() {
            return b.clone();
        }
        if b.is_zero() {
            return a.clone();
        }
        if a == b {
            return self.zero();
        }

        let key = PairKey::unordered(a, b);
        if let Some(hit) = self.inner.caches.borrow().symmetric_difference.get(&key) {
            trace!("symmetric difference cache hit");
            return hit.clone();
        }

        let result = match (a.kind(), b.kind()) {
            (
                NodeKind::One,
                NodeKind::Inner {
                    key: bk,
                    take,
                    skip,
                },
            ) => self.node(bk.clone(), take.clone(), self.symmetric_difference_rec(a, skip)),
            (
                NodeKind::Inner {
                    key: ak,
                    take,
                    skip,
                },
                NodeKind::One,
            ) => self.node(ak.clone(), take.clone(), self.symmetric_difference_rec(skip, b)),
            (
                NodeKind::Inner {
                    key: ak,
                    take: a_take,
                    skip: a_skip,
                },
                NodeKind::Inner {
                    key: bk,
                    take: b_take,
                    skip: b_skip,
                },
            ) => match bk.cmp(ak) {
                Ordering::Greater => self.node(
                    ak.clone(),
                    a_take.clone(),
                    self.symmetric_difference_rec(a_skip, b),
                ),
                Ordering::Equal => self.node(
                    ak.clone(),
                    self.symmetric_difference_rec(a_take, b_take),
                    self.symmetric_difference_rec(a_skip, b_skip),
                ),
                Ordering::Less => self.node(
                    bk.clone(),
                    b_take.clone(),
                    self.symmetric_difference_rec(a, b_skip),
                ),
            },
            _ => unreachable!("terminal operands handled before the case split"),
        };

        self.inner
            .caches
            .borrow_mut()
            .symmetric_difference
            .insert(key, result.clone());
        result
    }

    fn subtracting_rec(&self, a: &Node<K>, b: &Node<K>) -> Node<K> {
        if a.is_zero() || b.is_zero() {
            return a.clone();
        }
        if a == b {
            return self.zero();
        }

        let key = PairKey::ordered(a, b);
        if let Some(hit) = self.inner.caches.borrow().subtraction.get(&key) {
            trace!("subtraction cache hit");
            return hit.clone();
        }

        let result = match (a.kind(), b.kind()) {
            // ⊤ ∖ b drops to ⊥ exactly when b also accepts the empty set.
            (NodeKind::One, NodeKind::Inner { .. }) => {
                if b.skip_most().is_one() {
                    self.zero()
                } else {
                    a.clone()
                }
            }
            (
                NodeKind::Inner {
                    key: ak,
                    take,
                    skip,
                },
                NodeKind::One,
            ) => self.node(ak.clone(), take.clone(), self.subtracting_rec(skip, b)),
            (
                NodeKind::Inner {
                    key: ak,
                    take: a_take,
                    skip: a_skip,
                },
                NodeKind::Inner {
                    key: bk,
                    take: b_take,
                    skip: b_skip,
                },
            ) => match bk.cmp(ak) {
                Ordering::Greater => {
                    self.node(ak.clone(), a_take.clone(), self.subtracting_rec(a_skip, b))
                }
                Ordering::Equal => self.node(
                    ak.clone(),
                    self.subtracting_rec(a_take, b_take),
                    self.subtracting_rec(a_skip, b_skip),
                ),
                Ordering::Less => self.subtracting_rec(a, b_skip),
            },
            _ => unreachable!("terminal operands handled before the case split"),
        };

        self.inner
            .caches
            .borrow_mut()
            .subtraction
            .insert(key, result.clone());
        result
    }

    fn union_many_rec(&self, operands: &[Node<K>]) -> Node<K> {
        let distinct: Vec<Node<K>> = operands
            .iter()
            .filter(|operand| !operand.is_zero())
            .cloned()
            .unique_by(Node::addr)
            .collect();

        match distinct.as_slice() {
            [] => return self.zero(),
            [single] => return single.clone(),
            _ => {}
        }

        let key = SetKey::new(&distinct);
        if let Some(hit) = self.inner.caches.borrow().union_many.get(&key) {
            trace!("n-ary union cache hit");
            return hit.clone();
        }

        let has_one = distinct.iter().any(Node::is_one);
        let mut groups: BTreeMap<K, Vec<Node<K>>> = BTreeMap::new();
        for operand in &distinct {
            if let NodeKind::Inner { key, .. } = operand.kind() {
                groups.entry(key.clone()).or_default().push(operand.clone());
            }
        }

        // Fold per-key roots over ascending keys by descending through the
        // skip chain; the extracted ⊤ seeds the fold so terminals land last.
        let mut acc = if has_one { self.one() } else { self.zero() };
        for (root_key, group) in groups.iter().rev() {
            let root = if group.len() == 1 {
                group[0].clone()
            } else {
                let takes: Vec<Node<K>> = group
                    .iter()
                    .map(|n| n.take().expect("grouped nodes are internal").clone())
                    .collect();
                let skips: Vec<Node<K>> = group
                    .iter()
                    .map(|n| n.skip().expect("grouped nodes are internal").clone())
                    .collect();
                self.node(
                    root_key.clone(),
                    self.union_many_rec(&takes),
                    self.union_many_rec(&skips),
                )
            };
            acc = self.union_rec(&root, &acc);
        }

        self.inner
            .caches
            .borrow_mut()
            .union_many
            .insert(key, acc.clone());
        acc
    }
}
