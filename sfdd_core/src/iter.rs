//! Lazy enumeration of member sets.

use crate::node::{Node, NodeKind};

/// Cursor over the member sets of a family, in diagram order.
///
/// Walks the DAG depth-first, committing a key when entering a `take`
/// branch and revisiting the `skip` branch after the subtree is exhausted.
/// On backtracking the committed list is cut back to the keys strictly
/// below the revisited node's key. Each member set is produced exactly
/// once, as an ascending key vector.
pub struct Sets<K> {
    cursor: Option<Node<K>>,
    stack: Vec<(Node<K>, usize)>,
    committed: Vec<K>,
}

impl<K: Clone> Sets<K> {
    pub(crate) fn new(root: Node<K>) -> Self {
        Sets {
            cursor: Some(root),
            stack: Vec::new(),
            committed: Vec::new(),
        }
    }
}

impl<K: Clone> Iterator for Sets<K> {
    type Item = Vec<K>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.cursor.take() {
                Some(node) => match node.kind() {
                    NodeKind::Zero => {}
                    NodeKind::One => return Some(self.committed.clone()),
                    NodeKind::Inner { key, take, .. } => {
                        let below = self.committed.len();
                        self.committed.push(key.clone());
                        let take = take.clone();
                        self.stack.push((node, below));
                        self.cursor = Some(take);
                    }
                },
                None => {
                    let (revisit, below) = self.stack.pop()?;
                    self.committed.truncate(below);
                    self.cursor = revisit.skip().cloned();
                }
            }
        }
    }
}
