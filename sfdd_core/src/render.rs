//! Textual rendering of families and diagrams.

use std::fmt;

use itertools::Itertools;

use crate::node::{Node, NodeKind};

/// `{{1,2},{1}}`-style description of the denoted family.
impl<K: Clone + fmt::Display> fmt::Display for Node<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self
            .sets()
            .map(|set| format!("{{{}}}", set.iter().join(",")))
            .join(",");
        write!(f, "{{{body}}}")
    }
}

/// Multi-line rendering of the DAG with per-node counts.
impl<K: fmt::Debug> fmt::Debug for Node<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f, "", 0)
    }
}

fn render<K: fmt::Debug>(
    node: &Node<K>,
    f: &mut fmt::Formatter<'_>,
    label: &str,
    depth: usize,
) -> fmt::Result {
    let pad = "  ".repeat(depth);
    match node.kind() {
        NodeKind::Zero => writeln!(f, "{pad}{label}⊥"),
        NodeKind::One => writeln!(f, "{pad}{label}⊤"),
        NodeKind::Inner { key, take, skip } => {
            writeln!(f, "{pad}{label}⟨{key:?}⟩ count={}", node.count())?;
            render(take, f, "take: ", depth + 1)?;
            render(skip, f, "skip: ", depth + 1)
        }
    }
}
