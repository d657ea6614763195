//! Dominator tree computation using the Lengauer-Tarjan algorithm.
//!
//! # Theory
//!
//! A node `d` **dominates** a node `n` if every path from the entry node to `n`
//! must pass through `d`. The **immediate dominator** of `n` (idom(n)) is the
//! unique node that strictly dominates `n` but does not strictly dominate any
//! other dominator of `n`.
//!
//! The dominator tree is formed by making each node's immediate dominator its
//! parent. The entry node is the root (it has no dominator). Nodes unreachable
//! from the entry are not part of the tree at all.
//!
//! # Algorithm
//!
//! This implementation uses the Lengauer-Tarjan algorithm with path compression,
//! achieving O(E log V) time. Predecessors are taken from the graph instead of being
//! rediscovered per node, and both the DFS and the path compression are iterative.

use std::collections::BTreeSet;

use crate::utils::graph::{NodeId, Predecessors, Successors};

const UNDEF: usize = usize::MAX;

/// Result of dominator tree computation.
///
/// # Examples
///
/// ```rust
/// use vmopt::utils::graph::{algorithms::compute_dominators, DirectedGraph};
///
/// // entry -> a -> b
/// let mut graph: DirectedGraph<&str> = DirectedGraph::new();
/// let entry = graph.add_node("entry");
/// let a = graph.add_node("a");
/// let b = graph.add_node("b");
/// graph.add_edge(entry, a);
/// graph.add_edge(a, b);
///
/// let dom_tree = compute_dominators(&graph, entry);
/// assert!(dom_tree.dominates(entry, b));
/// assert_eq!(dom_tree.immediate_dominator(b), Some(a));
/// ```
#[derive(Debug, Clone)]
pub struct DominatorTree {
    /// The entry (root) node of the dominator tree
    entry: NodeId,
    /// Immediate dominator per node; `None` for the entry and for unreachable nodes
    idom: Vec<Option<NodeId>>,
    /// Reachable nodes in DFS preorder; every node appears after its immediate dominator
    preorder: Vec<NodeId>,
}

impl DominatorTree {
    /// Returns the entry (root) node of the dominator tree.
    #[inline]
    #[must_use]
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    /// Returns the number of nodes of the analyzed graph, reachable or not.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idom.len()
    }

    /// Returns `true` if `node` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        (node == self.entry && node.index() < self.idom.len())
            || matches!(self.idom.get(node.index()), Some(Some(_)))
    }

    /// Returns the immediate dominator of a node.
    ///
    /// `None` for the entry node and for nodes unreachable from it.
    #[inline]
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Checks if node `a` dominates node `b`.
    ///
    /// A reachable node dominates itself. Unreachable nodes neither dominate nor are
    /// dominated.
    ///
    /// # Complexity
    ///
    /// O(depth) where depth is the depth of `b` in the dominator tree.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        self.dominators(b).any(|d| d == a)
    }

    /// Checks if node `a` strictly dominates node `b`.
    #[inline]
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns an iterator over all dominators of a node, from the node itself
    /// up to (and including) the entry node.
    ///
    /// Yields nothing for unreachable nodes.
    pub fn dominators(&self, node: NodeId) -> DominatorIterator<'_> {
        DominatorIterator {
            tree: self,
            current: self.is_reachable(node).then_some(node),
        }
    }

    /// Returns the depth of a node in the dominator tree; the entry has depth 0.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        self.dominators(node).count().saturating_sub(1)
    }

    /// Returns all children of a node in the dominator tree, in index order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.idom
            .iter()
            .enumerate()
            .filter(|(_, idom)| **idom == Some(node))
            .map(|(i, _)| NodeId::new(i))
            .collect()
    }

    /// Returns the reachable nodes in DFS preorder, starting with the entry.
    #[must_use]
    pub fn preorder(&self) -> &[NodeId] {
        &self.preorder
    }

    /// Computes the full dominator set of every node.
    ///
    /// The set of a node is the node itself unioned with the set of its immediate
    /// dominator, accumulated top-down over the tree without recursion. Unreachable
    /// nodes get an empty set.
    #[must_use]
    pub fn dominator_sets(&self) -> Vec<BTreeSet<NodeId>> {
        let mut sets = vec![BTreeSet::new(); self.idom.len()];
        for &node in &self.preorder {
            let mut set = match self.immediate_dominator(node) {
                Some(idom) => sets[idom.index()].clone(),
                None => BTreeSet::new(),
            };
            set.insert(node);
            sets[node.index()] = set;
        }
        sets
    }
}

/// Iterator over dominators of a node, from the node up to the entry.
pub struct DominatorIterator<'a> {
    tree: &'a DominatorTree,
    current: Option<NodeId>,
}

impl Iterator for DominatorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.tree.immediate_dominator(current);
        Some(current)
    }
}

/// Computes the dominator tree of `graph` rooted at `entry` (Lengauer-Tarjan).
///
/// Only nodes reachable from `entry` take part; every other node ends up with no
/// immediate dominator.
///
/// # Algorithm Overview
///
/// 1. **DFS numbering**: number reachable nodes in preorder and record the DFS tree
/// 2. **Semidominators**: process nodes in reverse preorder, evaluating predecessors
///    through the link-eval forest with path compression
/// 3. **Implicit idom**: resolve the bucket of each DFS parent
/// 4. **Explicit idom**: `idom[w] = idom[idom[w]]` wherever `idom[w] != semi[w]`
///
/// # Examples
///
/// ```rust
/// use vmopt::utils::graph::{algorithms::compute_dominators, DirectedGraph};
///
/// // Diamond: entry -> {a, b} -> exit
/// let mut graph: DirectedGraph<()> = DirectedGraph::new();
/// let entry = graph.add_node(());
/// let a = graph.add_node(());
/// let b = graph.add_node(());
/// let exit = graph.add_node(());
/// graph.add_edge(entry, a);
/// graph.add_edge(entry, b);
/// graph.add_edge(a, exit);
/// graph.add_edge(b, exit);
///
/// let dom_tree = compute_dominators(&graph, entry);
/// assert!(!dom_tree.strictly_dominates(a, exit));
/// assert_eq!(dom_tree.immediate_dominator(exit), Some(entry));
/// ```
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();
    if entry.index() >= node_count {
        return DominatorTree {
            entry,
            idom: vec![None; node_count],
            preorder: Vec::new(),
        };
    }

    let mut lt = LengauerTarjan::new(node_count);
    lt.number(graph, entry);
    lt.compute(graph);

    let mut idom = vec![None; node_count];
    for w in 1..lt.vertex.len() {
        idom[lt.vertex[w]] = Some(NodeId::new(lt.vertex[lt.idom[w]]));
    }

    DominatorTree {
        entry,
        idom,
        preorder: lt.vertex.into_iter().map(NodeId::new).collect(),
    }
}

/// Internal state for the Lengauer-Tarjan algorithm.
///
/// Apart from `dfnum`, every vector is indexed by DFS number and stores DFS numbers.
struct LengauerTarjan {
    /// DFS number for each node, `UNDEF` if unreachable
    dfnum: Vec<usize>,
    /// Node with each DFS number (inverse of dfnum)
    vertex: Vec<usize>,
    /// Parent in the DFS tree
    parent: Vec<usize>,
    /// Semidominator
    semi: Vec<usize>,
    /// Immediate dominator (final result)
    idom: Vec<usize>,
    /// Ancestor in the link-eval forest, `UNDEF` for forest roots
    ancestor: Vec<usize>,
    /// Node with the smallest semidominator on the compressed path
    best: Vec<usize>,
    /// Nodes whose semidominator is this node
    bucket: Vec<Vec<usize>>,
}

impl LengauerTarjan {
    fn new(node_count: usize) -> Self {
        Self {
            dfnum: vec![UNDEF; node_count],
            vertex: Vec::with_capacity(node_count),
            parent: Vec::with_capacity(node_count),
            semi: Vec::new(),
            idom: Vec::new(),
            ancestor: Vec::new(),
            best: Vec::new(),
            bucket: Vec::new(),
        }
    }

    /// DFS traversal to assign DFS numbers and build the DFS tree.
    fn number<G: Successors>(&mut self, graph: &G, entry: NodeId) {
        let mut stack = vec![(entry.index(), UNDEF)];

        while let Some((node, parent)) = stack.pop() {
            if self.dfnum[node] != UNDEF {
                continue;
            }

            let number = self.vertex.len();
            self.dfnum[node] = number;
            self.vertex.push(node);
            self.parent.push(parent);

            let succs: Vec<NodeId> = graph.successors(NodeId::new(node)).collect();
            for succ in succs.into_iter().rev() {
                if self.dfnum[succ.index()] == UNDEF {
                    stack.push((succ.index(), number));
                }
            }
        }

        let count = self.vertex.len();
        self.semi = (0..count).collect();
        self.best = (0..count).collect();
        self.idom = vec![UNDEF; count];
        self.ancestor = vec![UNDEF; count];
        self.bucket = vec![Vec::new(); count];
    }

    fn compute<G: Predecessors>(&mut self, graph: &G) {
        for w in (1..self.vertex.len()).rev() {
            let parent = self.parent[w];

            // semi(w) = min over predecessors v of semi(eval(v))
            for pred in graph.predecessors(NodeId::new(self.vertex[w])) {
                let v = self.dfnum[pred.index()];
                if v == UNDEF {
                    // Unreachable predecessor
                    continue;
                }
                let u = self.eval(v);
                if self.semi[u] < self.semi[w] {
                    self.semi[w] = self.semi[u];
                }
            }

            let semi_w = self.semi[w];
            self.bucket[semi_w].push(w);
            self.ancestor[w] = parent;

            for v in std::mem::take(&mut self.bucket[parent]) {
                let u = self.eval(v);
                self.idom[v] = if self.semi[u] < self.semi[v] { u } else { parent };
            }
        }

        for w in 1..self.vertex.len() {
            if self.idom[w] != self.semi[w] {
                self.idom[w] = self.idom[self.idom[w]];
            }
        }
    }

    /// Evaluate: find the node with minimum semidominator on the path to the forest root.
    fn eval(&mut self, v: usize) -> usize {
        if self.ancestor[v] == UNDEF {
            return v;
        }
        self.compress(v);
        self.best[v]
    }

    /// Path compression for the forest, with an explicit stack in place of recursion.
    fn compress(&mut self, v: usize) {
        let mut path = Vec::new();
        let mut node = v;
        while self.ancestor[self.ancestor[node]] != UNDEF {
            path.push(node);
            node = self.ancestor[node];
        }

        // Closest to the root first, as the recursive formulation unwinds
        while let Some(node) = path.pop() {
            let ancestor = self.ancestor[node];
            if self.semi[self.best[ancestor]] < self.semi[self.best[node]] {
                self.best[node] = self.best[ancestor];
            }
            self.ancestor[node] = self.ancestor[ancestor];
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::utils::graph::{
        algorithms::dominators::compute_dominators, DirectedGraph, GraphBase, NodeId,
        Successors,
    };

    fn graph_from_edges(nodes: usize, edges: &[(usize, usize)]) -> DirectedGraph<()> {
        let mut graph = DirectedGraph::new();
        for _ in 0..nodes {
            graph.add_node(());
        }
        for &(from, to) in edges {
            graph.add_edge(NodeId::new(from), NodeId::new(to));
        }
        graph
    }

    /// Enumerates every simple path from `entry` and intersects the node sets of those
    /// ending at each target.
    fn exhaustive_dominators(graph: &DirectedGraph<()>, entry: NodeId) -> Vec<BTreeSet<NodeId>> {
        let n = graph.node_count();
        let mut result: Vec<Option<BTreeSet<NodeId>>> = vec![None; n];
        let mut path = vec![entry];
        let mut on_path = vec![false; n];
        on_path[entry.index()] = true;

        fn walk(
            graph: &DirectedGraph<()>,
            path: &mut Vec<NodeId>,
            on_path: &mut [bool],
            result: &mut [Option<BTreeSet<NodeId>>],
        ) {
            let Some(&last) = path.last() else {
                return;
            };
            let nodes: BTreeSet<NodeId> = path.iter().copied().collect();
            let slot = &mut result[last.index()];
            *slot = Some(match slot.take() {
                Some(existing) => existing.intersection(&nodes).copied().collect(),
                None => nodes,
            });

            let succs: Vec<NodeId> = graph.successors(last).collect();
            for succ in succs {
                if !on_path[succ.index()] {
                    on_path[succ.index()] = true;
                    path.push(succ);
                    walk(graph, path, on_path, result);
                    path.pop();
                    on_path[succ.index()] = false;
                }
            }
        }

        walk(graph, &mut path, &mut on_path, &mut result);
        result.into_iter().map(Option::unwrap_or_default).collect()
    }

    fn assert_matches_oracle(nodes: usize, edges: &[(usize, usize)]) {
        let graph = graph_from_edges(nodes, edges);
        let entry = NodeId::new(0);
        let tree = compute_dominators(&graph, entry);
        let expected = exhaustive_dominators(&graph, entry);

        assert_eq!(tree.dominator_sets(), expected, "edges {edges:?}");
        for u in graph.node_ids() {
            for v in graph.node_ids() {
                assert_eq!(
                    tree.dominates(u, v),
                    expected[v.index()].contains(&u),
                    "dominates({u}, {v}) for edges {edges:?}"
                );
            }
        }
    }

    #[test]
    fn test_dominator_single_node() {
        let graph = graph_from_edges(1, &[]);
        let entry = NodeId::new(0);
        let dom_tree = compute_dominators(&graph, entry);

        assert_eq!(dom_tree.entry(), entry);
        assert_eq!(dom_tree.immediate_dominator(entry), None);
        assert!(dom_tree.dominates(entry, entry));
        assert_eq!(dom_tree.depth(entry), 0);
    }

    #[test]
    fn test_dominator_linear_chain() {
        let graph = graph_from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
        let dom_tree = compute_dominators(&graph, NodeId::new(0));

        assert_eq!(dom_tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(2)));
        assert_eq!(dom_tree.depth(NodeId::new(3)), 3);
        let chain: Vec<NodeId> = dom_tree.dominators(NodeId::new(2)).collect();
        assert_eq!(chain, vec![NodeId::new(2), NodeId::new(1), NodeId::new(0)]);
        assert_eq!(dom_tree.children(NodeId::new(0)), vec![NodeId::new(1)]);
    }

    #[test]
    fn test_dominator_loop() {
        // 0 -> 1 -> 2 -> 1, 2 -> 3
        let graph = graph_from_edges(4, &[(0, 1), (1, 2), (2, 1), (2, 3)]);
        let dom_tree = compute_dominators(&graph, NodeId::new(0));

        assert!(dom_tree.dominates(NodeId::new(1), NodeId::new(2)));
        assert!(!dom_tree.dominates(NodeId::new(2), NodeId::new(1)));
        assert_eq!(dom_tree.immediate_dominator(NodeId::new(3)), Some(NodeId::new(2)));
    }

    #[test]
    fn test_unreachable_excluded() {
        let graph = graph_from_edges(3, &[(0, 1), (2, 1)]);
        let dom_tree = compute_dominators(&graph, NodeId::new(0));

        assert!(!dom_tree.is_reachable(NodeId::new(2)));
        assert_eq!(dom_tree.immediate_dominator(NodeId::new(2)), None);
        assert!(!dom_tree.dominates(NodeId::new(2), NodeId::new(2)));
        assert!(!dom_tree.dominates(NodeId::new(0), NodeId::new(2)));
        assert_eq!(dom_tree.immediate_dominator(NodeId::new(1)), Some(NodeId::new(0)));
        assert_eq!(dom_tree.preorder(), &[NodeId::new(0), NodeId::new(1)]);
    }

    #[test]
    fn test_oracle_diamond_with_loop() {
        //   0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3, 3 -> 4, 4 -> 1
        assert_matches_oracle(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (4, 1)]);
    }

    #[test]
    fn test_oracle_irreducible() {
        // Two entries into the 1 <-> 2 cycle
        assert_matches_oracle(4, &[(0, 1), (0, 2), (1, 2), (2, 1), (2, 3)]);
    }

    #[test]
    fn test_oracle_nested_loops_and_dead_node() {
        assert_matches_oracle(
            7,
            &[
                (0, 1),
                (1, 2),
                (2, 3),
                (3, 2),
                (3, 4),
                (4, 1),
                (4, 5),
                (6, 5),
                (6, 0),
            ],
        );
    }

    #[test]
    fn test_oracle_pseudo_random_graphs() {
        // Deterministic LCG so the graphs are reproducible
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: usize| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            ((state >> 33) as usize) % bound
        };

        for _ in 0..40 {
            let nodes = 2 + next(6);
            let edge_count = next(nodes * 2) + 1;
            let edges: Vec<(usize, usize)> =
                (0..edge_count).map(|_| (next(nodes), next(nodes))).collect();
            assert_matches_oracle(nodes, &edges);
        }
    }
}
