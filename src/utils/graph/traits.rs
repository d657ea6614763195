//! Traits abstracting over graph representations.
//!
//! The algorithms in [`algorithms`](crate::utils::graph::algorithms) are written against
//! these traits rather than a concrete graph type, so they run unchanged on a plain
//! [`DirectedGraph`](crate::utils::graph::DirectedGraph) and on a
//! [`ControlFlowGraph`](crate::analysis::ControlFlowGraph).

use crate::utils::graph::NodeId;

/// Basic node enumeration.
pub trait GraphBase {
    /// Returns the number of nodes. Node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Iterates over all node ids in index order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.node_count()).map(NodeId::new)
    }
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Iterates over the successors of `node` in edge insertion order.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// Inverse adjacency.
pub trait Predecessors: GraphBase {
    /// Iterates over the predecessors of `node`.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_;
}

/// A graph with a distinguished entry node.
pub trait RootedGraph: Successors {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}
