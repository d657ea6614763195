//! Graph traversal algorithms.
//!
//! All traversals are iterative, so arbitrarily deep graphs cannot overflow the stack.
//! Successors are visited in the order the graph reports them.

use std::collections::VecDeque;

use crate::utils::graph::{NodeId, Successors};

/// Depth-first preorder iterator.
///
/// Created by [`dfs`].
pub struct Dfs<'a, G> {
    graph: &'a G,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<G: Successors> Iterator for Dfs<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if self.visited[node.index()] {
                continue;
            }
            self.visited[node.index()] = true;

            // Push in reverse so the first successor is explored first
            let succs: Vec<NodeId> = self.graph.successors(node).collect();
            for &succ in succs.iter().rev() {
                if !self.visited[succ.index()] {
                    self.stack.push(succ);
                }
            }
            return Some(node);
        }
        None
    }
}

/// Performs a depth-first traversal from `start`, yielding nodes in preorder.
///
/// # Examples
///
/// ```rust
/// use vmopt::utils::graph::{algorithms, DirectedGraph, NodeId};
///
/// let mut graph: DirectedGraph<()> = DirectedGraph::new();
/// let a = graph.add_node(());
/// let b = graph.add_node(());
/// let c = graph.add_node(());
/// graph.add_edge(a, b);
/// graph.add_edge(b, c);
///
/// let order: Vec<NodeId> = algorithms::dfs(&graph, a).collect();
/// assert_eq!(order, vec![a, b, c]);
/// ```
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> Dfs<'_, G> {
    let mut visited = vec![false; graph.node_count()];
    let stack = if start.index() < visited.len() {
        vec![start]
    } else {
        visited.clear();
        Vec::new()
    };
    Dfs {
        graph,
        stack,
        visited,
    }
}

/// Computes which nodes are reachable from any of `roots` (breadth-first).
///
/// # Returns
///
/// A vector indexed by node id; out-of-range roots are ignored.
pub fn reachable<G: Successors>(graph: &G, roots: &[NodeId]) -> Vec<bool> {
    let mut seen = vec![false; graph.node_count()];
    let mut queue = VecDeque::new();

    for &root in roots {
        if let Some(flag) = seen.get_mut(root.index()) {
            if !*flag {
                *flag = true;
                queue.push_back(root);
            }
        }
    }

    while let Some(node) = queue.pop_front() {
        for succ in graph.successors(node) {
            if !seen[succ.index()] {
                seen[succ.index()] = true;
                queue.push_back(succ);
            }
        }
    }

    seen
}
