//! Canonical SFDD nodes.
//!
//! A node is either one of the two terminals or an internal
//! `⟨key, take, skip⟩` triple. The rejecting terminal denotes the empty
//! family `{}`; the accepting terminal denotes `{∅}`. An internal node
//! denotes `{ {key} ∪ s | s ∈ take } ∪ skip`.
//!
//! Nodes are hash-consed by their [`Factory`](crate::Factory), so two handles
//! denote the same family exactly when they compare equal (pointer identity).

use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::factory::{Factory, FactoryInner};
use crate::iter::Sets;

/// Shape of a node: a terminal or an internal decision triple.
///
/// Internal keys strictly increase along both `take` and `skip` edges, and
/// `take` is never the rejecting terminal; the factory enforces both.
pub(crate) enum NodeKind<K> {
    /// Rejecting terminal, the empty family.
    Zero,
    /// Accepting terminal, the family containing only the empty set.
    One,
    /// Decision on `key`: members containing it descend `take`, the rest
    /// descend `skip`.
    Inner {
        key: K,
        take: Node<K>,
        skip: Node<K>,
    },
}

pub(crate) struct NodeData<K> {
    pub(crate) kind: NodeKind<K>,
    pub(crate) count: u64,
    pub(crate) fingerprint: u64,
    pub(crate) factory: Weak<FactoryInner<K>>,
}

impl<K> Hash for NodeData<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

/// Shared handle to a canonical node.
///
/// Cloning is reference cloning; equality and hashing follow identity, which
/// canonicity makes coincide with structural equality.
pub struct Node<K>(pub(crate) Rc<NodeData<K>>);

impl<K> Clone for Node<K> {
    fn clone(&self) -> Self {
        Node(Rc::clone(&self.0))
    }
}

impl<K> PartialEq for Node<K> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<K> Eq for Node<K> {}

impl<K> Hash for Node<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.fingerprint.hash(state);
    }
}

impl<K> Node<K> {
    pub(crate) fn kind(&self) -> &NodeKind<K> {
        &self.0.kind
    }

    pub(crate) fn fingerprint(&self) -> u64 {
        self.0.fingerprint
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// True for the rejecting terminal.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        matches!(self.0.kind, NodeKind::Zero)
    }

    /// True for the accepting terminal.
    #[must_use]
    pub fn is_one(&self) -> bool {
        matches!(self.0.kind, NodeKind::One)
    }

    /// True for either terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.0.kind, NodeKind::Zero | NodeKind::One)
    }

    /// True iff the node denotes the empty family.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_zero()
    }

    /// Number of member sets in the denoted family.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.0.count
    }

    /// Decision key of an internal node.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        match &self.0.kind {
            NodeKind::Inner { key, .. } => Some(key),
            _ => None,
        }
    }

    /// `take` child of an internal node.
    #[must_use]
    pub fn take(&self) -> Option<&Node<K>> {
        match &self.0.kind {
            NodeKind::Inner { take, .. } => Some(take),
            _ => None,
        }
    }

    /// `skip` child of an internal node.
    #[must_use]
    pub fn skip(&self) -> Option<&Node<K>> {
        match &self.0.kind {
            NodeKind::Inner { skip, .. } => Some(skip),
            _ => None,
        }
    }

    /// Terminal reached by following `skip` edges.
    ///
    /// Accepting exactly when the empty set is a member of the family.
    #[must_use]
    pub fn skip_most(&self) -> Node<K> {
        let mut current = self.clone();
        loop {
            let next = match current.kind() {
                NodeKind::Inner { skip, .. } => skip.clone(),
                _ => return current,
            };
            current = next;
        }
    }

    /// The factory this node belongs to.
    ///
    /// # Panics
    ///
    /// Panics if the factory has been dropped while this handle survived;
    /// a node is only usable inside its own island.
    #[must_use]
    pub fn factory(&self) -> Factory<K> {
        let inner = self
            .0
            .factory
            .upgrade()
            .expect("node outlived its factory");
        Factory::from_inner(inner)
    }

    /// Restartable iterator over the member sets, each an ascending key
    /// vector, produced exactly once.
    #[must_use]
    pub fn sets(&self) -> Sets<K>
    where
        K: Clone,
    {
        Sets::new(self.clone())
    }
}

impl<K: Ord> Node<K> {
    /// Membership test for one finite set of keys.
    ///
    /// Keys may arrive unsorted and with duplicates. A pending key strictly
    /// below the current decision key cannot occur anywhere below this
    /// level, so the walk descends `skip` and ultimately fails.
    pub fn contains<I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = K>,
    {
        let mut pending: Vec<K> = keys.into_iter().collect();
        pending.sort();
        pending.dedup();

        let mut current = self.clone();
        let mut consumed = 0usize;
        loop {
            let next = match current.kind() {
                NodeKind::Inner { key, take, skip } => match pending.get(consumed) {
                    Some(k) if k == key => {
                        consumed += 1;
                        take.clone()
                    }
                    Some(_) => skip.clone(),
                    None => skip.clone(),
                },
                _ => return consumed == pending.len() && current.is_one(),
            };
            current = next;
        }
    }
}

impl<K: Ord + Hash + Clone> Node<K> {
    /// Family union `self ∪ other`.
    #[must_use]
    pub fn union(&self, other: &Node<K>) -> Node<K> {
        self.factory().union(self, other)
    }

    /// Family intersection `self ∩ other`.
    #[must_use]
    pub fn intersection(&self, other: &Node<K>) -> Node<K> {
        self.factory().intersection(self, other)
    }

    /// Member sets in exactly one of the two families.
    #[must_use]
    pub fn symmetric_difference(&self, other: &Node<K>) -> Node<K> {
        self.factory().symmetric_difference(self, other)
    }

    /// Member sets of `self` that are not members of `other`.
    #[must_use]
    pub fn subtracting(&self, other: &Node<K>) -> Node<K> {
        self.factory().subtracting(self, other)
    }
}

impl<K: Clone> IntoIterator for &Node<K> {
    type Item = Vec<K>;
    type IntoIter = Sets<K>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets()
    }
}
