//! Node identifier implementation for directed graphs.
//!
//! This module provides the [`NodeId`] type, a strongly-typed identifier for nodes
//! within a directed graph. The newtype wrapper provides type safety and prevents
//! accidental confusion between node indices and block handles or other integers.

use std::fmt;

/// A strongly-typed identifier for nodes within a directed graph.
///
/// Node IDs are assigned sequentially starting from 0 when nodes are added to a
/// [`DirectedGraph`](crate::utils::graph::DirectedGraph). For a
/// [`ControlFlowGraph`](crate::analysis::ControlFlowGraph) the id is the position of the
/// block in the function's layout, so the entry block is always `NodeId(0)`.
///
/// # Examples
///
/// ```rust
/// use vmopt::utils::graph::{DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let a: NodeId = graph.add_node("A");
/// let b: NodeId = graph.add_node("B");
///
/// assert_ne!(a, b);
/// assert_eq!(b.index(), 1);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a new `NodeId` from a raw index value.
    ///
    /// This constructor is primarily intended for internal use and testing.
    /// Normal usage should obtain `NodeId` values from
    /// [`DirectedGraph::add_node`](crate::utils::graph::DirectedGraph::add_node).
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index value of this node identifier.
    ///
    /// The index is a 0-based position that can be used to index into vectors
    /// storing per-node data.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}
