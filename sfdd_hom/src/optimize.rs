//! Rewrite pass over homomorphism trees.
//!
//! `optimize` returns a semantically equal homomorphism that reaches its
//! working levels through `Dive` prefixes and orders independent key
//! operations by descent depth. The pass is pure and idempotent on its own
//! output. `Inductive` is a black box and passes through untouched.

use std::hash::Hash;

use tracing::trace;

use crate::hom::{Hom, HomOp};
use crate::store::HomStore;

/// Smallest key the homomorphism can possibly touch, when known.
fn min_key<K: Ord + Clone>(hom: &Hom<K>) -> Option<K> {
    match hom.op() {
        HomOp::Identity | HomOp::Inductive { .. } => None,
        HomOp::Constant(node) => node.key().cloned(),
        HomOp::Union(children)
        | HomOp::Intersection(children)
        | HomOp::Composition(children) => {
            let mut best: Option<K> = None;
            for child in children {
                let key = min_key(child)?;
                best = Some(match best {
                    None => key,
                    Some(current) => current.min(key),
                });
            }
            best
        }
        HomOp::FixedPoint(body) | HomOp::Dive(_, body) => min_key(body),
        HomOp::Insert(keys) | HomOp::Remove(keys) | HomOp::Filter(keys) => keys.first().cloned(),
    }
}

/// True for a non-trivial `Insert`/`Remove`, the reorderable run members.
fn in_key_run<K>(hom: &Hom<K>) -> bool {
    match hom.op() {
        HomOp::Insert(keys) | HomOp::Remove(keys) => !keys.is_empty(),
        _ => false,
    }
}

/// True for a `Dive(k, Composition(...))` wrapper of the shape this pass
/// itself produces: single-key Insert/Remove/Filter children and a target
/// equal to the composition's smallest key. Such wrappers are transparent
/// and may be spliced back into an enclosing composition. Single-key
/// children are required: run reordering is only order-safe between
/// operations on distinct single keys.
fn is_pass_wrapper<K: Ord + Clone>(hom: &Hom<K>) -> Option<&[Hom<K>]> {
    let HomOp::Dive(target, body) = hom.op() else {
        return None;
    };
    let HomOp::Composition(children) = body.op() else {
        return None;
    };
    let single_keyed = children.iter().all(|child| {
        matches!(
            child.op(),
            HomOp::Insert(keys) | HomOp::Remove(keys) | HomOp::Filter(keys) if keys.len() == 1
        )
    });
    if single_keyed && min_key(body).as_ref() == Some(target) {
        Some(children)
    } else {
        None
    }
}

impl<K: Ord + Hash + Clone> HomStore<K> {
    /// Rewrites `hom` into a semantically equal, cheaper homomorphism.
    pub fn optimize(&self, hom: &Hom<K>) -> Hom<K> {
        match hom.op() {
            HomOp::Identity | HomOp::Constant(_) | HomOp::Inductive { .. } => hom.clone(),
            HomOp::Insert(keys) | HomOp::Remove(keys) | HomOp::Filter(keys) => {
                self.split_keyed(hom, keys)
            }
            HomOp::Union(children) => {
                let rewritten =
                    self.union(children.iter().map(|child| self.optimize(child)));
                self.dive_wrapped(rewritten)
            }
            HomOp::Intersection(children) => {
                let rewritten =
                    self.intersection(children.iter().map(|child| self.optimize(child)));
                self.dive_wrapped(rewritten)
            }
            HomOp::Composition(children) => self.optimize_composition(children),
            HomOp::FixedPoint(body) => self.optimize_fixed_point(body),
            HomOp::Dive(key, body) => {
                let body = self.optimize(body);
                if let HomOp::Dive(inner_key, deeper) = body.op() {
                    if inner_key == key {
                        return self.dive(key.clone(), &deeper.clone());
                    }
                }
                self.dive(key.clone(), &body)
            }
        }
    }

    /// Rule 4: a multi-key operation becomes a dive onto the smallest key
    /// over a composition of its single-key parts, ascending.
    fn split_keyed(&self, hom: &Hom<K>, keys: &[K]) -> Hom<K> {
        if keys.len() < 2 {
            return hom.clone();
        }
        let singles: Vec<Hom<K>> = keys
            .iter()
            .map(|key| match hom.op() {
                HomOp::Insert(_) => self.insert([key.clone()]),
                HomOp::Remove(_) => self.remove([key.clone()]),
                HomOp::Filter(_) => self.filter([key.clone()]),
                _ => unreachable!("split applies to keyed operations only"),
            })
            .collect();
        trace!(parts = singles.len(), "split multi-key operation");
        self.dive(keys[0].clone(), &self.composition(singles))
    }

    /// Rule 1: a combinator with a known smallest key is reached through a
    /// dive.
    fn dive_wrapped(&self, rewritten: Hom<K>) -> Hom<K> {
        let combinator = matches!(
            rewritten.op(),
            HomOp::Union(_) | HomOp::Intersection(_)
        );
        if combinator {
            if let Some(key) = min_key(&rewritten) {
                return self.dive(key, &rewritten);
            }
        }
        rewritten
    }

    /// Rule 2: flatten nested compositions, then reorder maximal
    /// Insert/Remove runs by descent depth, each run reached via a dive.
    fn optimize_composition(&self, children: &[Hom<K>]) -> Hom<K> {
        let mut flat: Vec<Hom<K>> = Vec::new();
        for child in children {
            flatten_into(self.optimize(child), &mut flat);
        }

        let mut segments: Vec<Hom<K>> = Vec::new();
        let mut run: Vec<Hom<K>> = Vec::new();
        for hom in flat {
            if in_key_run(&hom) {
                run.push(hom);
            } else {
                self.flush_run(&mut run, &mut segments);
                segments.push(hom);
            }
        }
        self.flush_run(&mut run, &mut segments);

        if segments.len() == 1 {
            segments.into_iter().next().expect("one segment present")
        } else {
            self.composition(segments)
        }
    }

    fn flush_run(&self, run: &mut Vec<Hom<K>>, segments: &mut Vec<Hom<K>>) {
        match run.len() {
            0 => {}
            1 => segments.push(run.pop().expect("run is non-empty")),
            _ => {
                let mut sorted = std::mem::take(run);
                // Stable, so same-key operations keep their relative order.
                sorted.sort_by(|x, y| min_key(x).cmp(&min_key(y)));
                let target = min_key(&sorted[0]).expect("run members have keys");
                trace!(len = sorted.len(), "reordered key-operation run");
                let composed = self.composition(sorted);
                segments.push(self.dive(target, &composed));
            }
        }
    }

    /// Rule 3: a fixed point of a union containing the identity splits into
    /// chained independent fixed points.
    fn optimize_fixed_point(&self, body: &Hom<K>) -> Hom<K> {
        let body = self.optimize(body);
        if let HomOp::Union(children) = body.op() {
            if children.iter().any(Hom::is_identity) {
                let identity = self.identity();
                let parts: Vec<Hom<K>> = children
                    .iter()
                    .filter(|child| !child.is_identity())
                    .map(|child| {
                        self.fixed_point(&self.union([child.clone(), identity.clone()]))
                    })
                    .collect();
                if !parts.is_empty() {
                    trace!(parts = parts.len(), "split fixed point over union");
                    return if parts.len() == 1 {
                        parts.into_iter().next().expect("one part present")
                    } else {
                        self.composition(parts)
                    };
                }
            }
        }
        self.fixed_point(&body)
    }
}

fn flatten_into<K: Ord + Clone>(hom: Hom<K>, out: &mut Vec<Hom<K>>) {
    if let HomOp::Composition(children) = hom.op() {
        for child in children {
            flatten_into(child.clone(), out);
        }
        return;
    }
    if let Some(children) = is_pass_wrapper(&hom) {
        for child in children {
            out.push(child.clone());
        }
        return;
    }
    out.push(hom);
}
