//! Adjacency-list directed graph.

use std::collections::HashSet;

use crate::utils::graph::{GraphBase, NodeId, Predecessors, Successors};

/// A directed graph with node payloads and ordered, duplicate-free adjacency lists.
///
/// Both directions are stored, so the forward and inverse adjacency are exact transposes
/// of each other by construction.
///
/// # Examples
///
/// ```rust
/// use vmopt::utils::graph::DirectedGraph;
///
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let a = graph.add_node("a");
/// let b = graph.add_node("b");
///
/// assert!(graph.add_edge(a, b));
/// assert!(!graph.add_edge(a, b)); // already present
/// assert_eq!(graph.successors_of(a), &[b]);
/// assert_eq!(graph.predecessors_of(b), &[a]);
/// ```
#[derive(Debug, Clone)]
pub struct DirectedGraph<N> {
    nodes: Vec<N>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
    edge_count: usize,
}

impl<N> Default for DirectedGraph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> DirectedGraph<N> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty graph with room for `nodes` nodes.
    #[must_use]
    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            successors: Vec::with_capacity(nodes),
            predecessors: Vec::with_capacity(nodes),
            edge_count: 0,
        }
    }

    /// Adds a node and returns its id.
    pub fn add_node(&mut self, data: N) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(data);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        id
    }

    /// Adds the edge `from -> to` unless it already exists or an endpoint is unknown.
    ///
    /// # Returns
    ///
    /// `true` if the edge was added.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> bool {
        if from.index() >= self.nodes.len() || to.index() >= self.nodes.len() {
            return false;
        }
        if self.successors[from.index()].contains(&to) {
            return false;
        }

        self.successors[from.index()].push(to);
        self.predecessors[to.index()].push(from);
        self.edge_count += 1;
        true
    }

    /// Adds the edges `from -> to` for every `to` in `targets`, in order.
    ///
    /// Duplicates, edges already present and unknown endpoints are skipped. Membership is
    /// tracked in a set, so a node with many distinct targets is linked in linear time.
    ///
    /// # Returns
    ///
    /// The number of edges added.
    pub fn add_edges<I>(&mut self, from: NodeId, targets: I) -> usize
    where
        I: IntoIterator<Item = NodeId>,
    {
        let count = self.nodes.len();
        if from.index() >= count {
            return 0;
        }

        let mut seen: HashSet<NodeId> = self.successors[from.index()].iter().copied().collect();
        let mut added = 0;
        for to in targets {
            if to.index() >= count || !seen.insert(to) {
                continue;
            }
            self.successors[from.index()].push(to);
            self.predecessors[to.index()].push(from);
            added += 1;
        }
        self.edge_count += added;
        added
    }

    /// Returns the payload of `node`.
    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<&N> {
        self.nodes.get(node.index())
    }

    /// Returns the successors of `node` in insertion order.
    #[must_use]
    pub fn successors_of(&self, node: NodeId) -> &[NodeId] {
        self.successors.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the predecessors of `node` in insertion order.
    #[must_use]
    pub fn predecessors_of(&self, node: NodeId) -> &[NodeId] {
        self.predecessors.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Iterates over all edges as `(from, to)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, succs)| succs.iter().map(move |&to| (NodeId::new(from), to)))
    }
}

impl<N> GraphBase for DirectedGraph<N> {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl<N> Successors for DirectedGraph<N> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors_of(node).iter().copied()
    }
}

impl<N> Predecessors for DirectedGraph<N> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors_of(node).iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_invariant() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let nodes: Vec<NodeId> = (0..4).map(|_| graph.add_node(())).collect();
        graph.add_edge(nodes[0], nodes[1]);
        graph.add_edge(nodes[0], nodes[2]);
        graph.add_edge(nodes[1], nodes[3]);
        graph.add_edge(nodes[2], nodes[3]);
        graph.add_edge(nodes[3], nodes[0]);
        graph.add_edge(nodes[3], nodes[0]);

        assert_eq!(graph.edge_count(), 5);
        for (from, to) in graph.edges() {
            assert!(graph.predecessors_of(to).contains(&from));
        }
        let inverse: usize = graph.node_ids().map(|n| graph.predecessors_of(n).len()).sum();
        assert_eq!(inverse, graph.edge_count());
    }

    #[test]
    fn test_add_edges_keeps_first_occurrence() {
        let mut graph: DirectedGraph<()> = DirectedGraph::new();
        let n: Vec<NodeId> = (0..4).map(|_| graph.add_node(())).collect();
        graph.add_edge(n[0], n[2]);

        let targets = [n[1], n[2], n[1], n[3], NodeId::new(8), n[3], n[1]];
        assert_eq!(graph.add_edges(n[0], targets), 2);
        assert_eq!(graph.successors_of(n[0]), &[n[2], n[1], n[3]]);
        assert_eq!(graph.predecessors_of(n[1]), &[n[0]]);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.add_edges(NodeId::new(8), [n[0]]), 0);
    }

    #[test]
    fn test_unknown_endpoints_rejected() {
        let mut graph: DirectedGraph<u8> = DirectedGraph::new();
        let a = graph.add_node(7);
        assert!(!graph.add_edge(a, NodeId::new(3)));
        assert_eq!(graph.node(a), Some(&7));
        assert!(graph.successors_of(NodeId::new(9)).is_empty());
    }
}
