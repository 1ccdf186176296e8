//! Homomorphisms over set-family decision diagrams.
//!
//! A homomorphism maps canonical nodes to canonical nodes. Instances are
//! uniqued by a [`HomStore`], so structurally equal homomorphisms are the
//! same allocation and application results are memoized per instance.
//!
//! The algebra consists of the generic combinators (`Identity`, `Constant`,
//! `Union`, `Intersection`, `Composition`, `FixedPoint`), the SFDD-specific
//! transformers (`Insert`, `Remove`, `Filter`, `Dive`, `Inductive`), and a
//! rewrite-based [`optimizer`](HomStore::optimize).

mod apply;
mod hom;
mod optimize;
mod store;

pub use hom::{Hom, HomOp, InductiveFn};
pub use store::HomStore;
