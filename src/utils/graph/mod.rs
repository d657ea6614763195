//! Generic directed-graph infrastructure.
//!
//! Algorithms are written against the [`GraphBase`], [`Successors`], [`Predecessors`] and
//! [`RootedGraph`] traits, and [`DirectedGraph`] is the adjacency-list implementation the
//! control flow graph is built on.

pub mod algorithms;
mod directed;
mod node;
mod traits;

pub use directed::DirectedGraph;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};
