//! Canonical set-family decision diagrams.
//!
//! A family of finite sets over an ordered key domain is stored as a shared,
//! hash-consed DAG. Structurally equal diagrams are the same allocation, so
//! semantic equality of families is pointer equality of handles.
//!
//! A [`Factory`] owns the unique table and the operation caches; every node
//! belongs to exactly one factory and operations never mix factories.

mod algebra;
mod factory;
mod iter;
mod node;
mod render;

pub mod pool;

pub use factory::{Factory, FactoryConfig};
pub use iter::Sets;
pub use node::Node;
pub use pool::WeakPool;
