//! Memoized homomorphism application.

use std::cmp::Ordering;
use std::hash::Hash;

use sfdd_core::Node;
use tracing::trace;

use crate::hom::{Hom, HomOp};
use crate::store::HomStore;

impl<K: Ord + Hash + Clone> Hom<K> {
    /// Applies this homomorphism to `node`.
    ///
    /// Results are memoized per instance, keyed by input-node identity;
    /// repeated application to the same node is a lookup.
    pub fn apply(&self, node: &Node<K>) -> Node<K> {
        if let Some(hit) = self.0.cache.borrow().get(node) {
            trace!("application cache hit");
            return hit.clone();
        }
        let result = self.compute(node);
        self.0
            .cache
            .borrow_mut()
            .insert(node.clone(), result.clone());
        result
    }

    fn compute(&self, node: &Node<K>) -> Node<K> {
        match &self.0.op {
            HomOp::Identity => node.clone(),
            HomOp::Constant(pinned) => {
                assert!(
                    pinned.factory().same_island(node),
                    "operand belongs to another factory"
                );
                pinned.clone()
            }
            HomOp::Union(children) => {
                let parts: Vec<Node<K>> =
                    children.iter().map(|child| child.apply(node)).collect();
                node.factory().union_many(&parts)
            }
            HomOp::Intersection(children) => {
                let mut parts = children.iter().map(|child| child.apply(node));
                let first = parts.next().expect("combinator children are non-empty");
                parts.fold(first, |acc, part| acc.intersection(&part))
            }
            HomOp::Composition(children) => children
                .iter()
                .fold(node.clone(), |acc, child| child.apply(&acc)),
            HomOp::FixedPoint(body) => {
                let mut current = node.clone();
                loop {
                    let next = body.apply(&current);
                    if next == current {
                        return current;
                    }
                    trace!("fixed point advanced");
                    current = next;
                }
            }
            HomOp::Insert(keys) => self.apply_insert(keys, node),
            HomOp::Remove(keys) => self.apply_remove(keys, node),
            HomOp::Filter(keys) => self.apply_filter(keys, node),
            HomOp::Dive(key, body) => self.apply_dive(key, body, node),
            HomOp::Inductive { substitute, step } => {
                if node.is_zero() {
                    return node.clone();
                }
                if node.is_one() {
                    return substitute.clone().unwrap_or_else(|| node.clone());
                }
                let (take_hom, skip_hom) = (step.as_ref())(self, node);
                let factory = node.factory();
                let key = node.key().expect("internal node has a key").clone();
                let take = node.take().expect("internal node has a take branch");
                let skip = node.skip().expect("internal node has a skip branch");
                factory.node(key, take_hom.apply(take), skip_hom.apply(skip))
            }
        }
    }

    fn remainder(&self, store: &HomStore<K>, keys: &[K]) -> Hom<K> {
        match &self.0.op {
            HomOp::Insert(_) => store.insert(keys.to_vec()),
            HomOp::Remove(_) => store.remove(keys.to_vec()),
            HomOp::Filter(_) => store.filter(keys.to_vec()),
            _ => unreachable!("remainder derivation is key-list specific"),
        }
    }

    fn apply_insert(&self, keys: &[K], node: &Node<K>) -> Node<K> {
        if node.is_zero() || keys.is_empty() {
            return node.clone();
        }
        let factory = node.factory();
        let store = self.store();
        let lowest = &keys[0];

        if node.is_one() {
            let rest = self.remainder(&store, &keys[1..]);
            return factory.node(lowest.clone(), rest.apply(node), factory.zero());
        }

        let key = node.key().expect("internal node has a key");
        let take = node.take().expect("internal node has a take branch");
        let skip = node.skip().expect("internal node has a skip branch");
        match key.cmp(lowest) {
            Ordering::Less => {
                factory.node(key.clone(), self.apply(take), self.apply(skip))
            }
            Ordering::Equal => {
                // The key is present along take and must become present
                // along skip, so both branches merge under it.
                let rest = self.remainder(&store, &keys[1..]);
                let merged = factory.union(take, skip);
                factory.node(key.clone(), rest.apply(&merged), factory.zero())
            }
            Ordering::Greater => {
                let rest = self.remainder(&store, &keys[1..]);
                factory.node(lowest.clone(), rest.apply(node), factory.zero())
            }
        }
    }

    fn apply_remove(&self, keys: &[K], node: &Node<K>) -> Node<K> {
        if node.is_terminal() || keys.is_empty() {
            return node.clone();
        }
        let factory = node.factory();
        let store = self.store();
        let lowest = &keys[0];

        let key = node.key().expect("internal node has a key");
        let take = node.take().expect("internal node has a take branch");
        let skip = node.skip().expect("internal node has a skip branch");
        match key.cmp(lowest) {
            Ordering::Less => {
                factory.node(key.clone(), self.apply(take), self.apply(skip))
            }
            Ordering::Equal => {
                let rest = self.remainder(&store, &keys[1..]);
                rest.apply(&factory.union(skip, take))
            }
            Ordering::Greater => {
                let rest = self.remainder(&store, &keys[1..]);
                rest.apply(node)
            }
        }
    }

    fn apply_filter(&self, keys: &[K], node: &Node<K>) -> Node<K> {
        if keys.is_empty() {
            return node.clone();
        }
        let factory = node.factory();
        if node.is_terminal() {
            return factory.zero();
        }
        let store = self.store();
        let lowest = &keys[0];

        let key = node.key().expect("internal node has a key");
        let take = node.take().expect("internal node has a take branch");
        let skip = node.skip().expect("internal node has a skip branch");
        match key.cmp(lowest) {
            Ordering::Less => {
                factory.node(key.clone(), self.apply(take), self.apply(skip))
            }
            Ordering::Equal => {
                let rest = self.remainder(&store, &keys[1..]);
                factory.node(key.clone(), rest.apply(take), factory.zero())
            }
            Ordering::Greater => factory.zero(),
        }
    }

    fn apply_dive(&self, target: &K, body: &Hom<K>, node: &Node<K>) -> Node<K> {
        // Walk structurally while the decision key is still below the
        // target, then hand the subdiagram to the body. Terminals and
        // levels at or above the target are the body's to transform.
        match node.key() {
            Some(key) if *key < *target => {
                let factory = node.factory();
                let take = node.take().expect("internal node has a take branch");
                let skip = node.skip().expect("internal node has a skip branch");
                factory.node(key.clone(), self.apply(take), self.apply(skip))
            }
            _ => body.apply(node),
        }
    }
}
