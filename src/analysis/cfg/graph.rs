//! Control flow graph snapshot of a function IR unit.

use std::{
    collections::{BTreeSet, HashMap},
    sync::OnceLock,
};

use crate::{
    ir::{BlockId, Function},
    utils::graph::{
        algorithms::{self, compute_dominators, DominatorTree},
        DirectedGraph, GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
    Error, Result,
};

/// A control flow graph built from a [`Function`].
///
/// Nodes are the function's blocks in layout order, so the entry block is always
/// `NodeId(0)`. Forward adjacency lists each successor once, in instruction order (for a
/// jump table: entries by discriminant, then the default). Inverse adjacency is its exact
/// transpose. Handler associations are not edges.
///
/// The graph is a snapshot: any mutation of the function invalidates it and a new one
/// must be built before the next pass that depends on it.
///
/// # Lazy Computation
///
/// The dominator tree is computed on first access and cached in a [`OnceLock`].
///
/// # Examples
///
/// ```rust
/// use vmopt::{analysis::ControlFlowGraph, ir::{BlockId, FunctionBuilder}};
///
/// let function = FunctionBuilder::new("f", 1, 1).build_with(|f| {
///     f.block(0, |b| {
///         b.load(0).branch(1, 2);
///     });
///     f.block(1, |b| b.jump(2));
///     f.block(2, |b| {
///         b.push_null().ret();
///     });
/// });
///
/// let cfg = ControlFlowGraph::build(&function)?;
/// assert_eq!(cfg.successor_blocks(BlockId::new(0)), vec![BlockId::new(1), BlockId::new(2)]);
/// assert!(cfg.dominates_block(BlockId::new(0), BlockId::new(2)));
/// # Ok::<(), vmopt::Error>(())
/// ```
#[derive(Debug)]
pub struct ControlFlowGraph {
    /// Underlying graph, one node per block
    graph: DirectedGraph<BlockId>,
    /// Reverse mapping from block handle to node
    nodes: HashMap<BlockId, NodeId>,
    /// Exported blocks, as flagged by the producer of the function
    exported: Vec<NodeId>,
    /// Cached dominator tree
    dominators: OnceLock<DominatorTree>,
}

impl ControlFlowGraph {
    /// Builds the control flow graph of `function`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyFunction`] if the function has no blocks
    /// - [`Error::InvalidBlockReference`] if a successor is not a live block
    /// - any error of [`Function::successors`]
    pub fn build(function: &Function) -> Result<Self> {
        if function.block_count() == 0 {
            return Err(Error::EmptyFunction);
        }

        let mut graph = DirectedGraph::with_capacity(function.block_count());
        let mut nodes = HashMap::with_capacity(function.block_count());
        let mut exported = Vec::new();

        for (id, block) in function.blocks() {
            let node = graph.add_node(id);
            nodes.insert(id, node);
            if block.is_exported() {
                exported.push(node);
            }
        }

        for (id, _) in function.blocks() {
            let targets = function
                .successors(id)?
                .into_iter()
                .map(|target| {
                    nodes
                        .get(&target)
                        .copied()
                        .ok_or(Error::InvalidBlockReference { block: id, target })
                })
                .collect::<Result<Vec<NodeId>>>()?;
            graph.add_edges(nodes[&id], targets);
        }

        Ok(Self {
            graph,
            nodes,
            exported,
            dominators: OnceLock::new(),
        })
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the block handle of a node.
    #[must_use]
    pub fn block(&self, node: NodeId) -> Option<BlockId> {
        self.graph.node(node).copied()
    }

    /// Returns the node of a block handle.
    #[must_use]
    pub fn node(&self, block: BlockId) -> Option<NodeId> {
        self.nodes.get(&block).copied()
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        // build() rejects empty functions
        self.graph.node(NodeId::new(0)).copied().unwrap_or_default()
    }

    /// Returns the exported nodes in layout order.
    #[must_use]
    pub fn exported(&self) -> &[NodeId] {
        &self.exported
    }

    /// Returns `true` if the block is exported.
    #[must_use]
    pub fn is_exported(&self, block: BlockId) -> bool {
        self.node(block).is_some_and(|n| self.exported.contains(&n))
    }

    /// Returns the successors of a node.
    #[must_use]
    pub fn successors_of(&self, node: NodeId) -> &[NodeId] {
        self.graph.successors_of(node)
    }

    /// Returns the predecessors of a node.
    #[must_use]
    pub fn predecessors_of(&self, node: NodeId) -> &[NodeId] {
        self.graph.predecessors_of(node)
    }

    /// Returns the successor blocks of `block`; empty for unknown blocks.
    #[must_use]
    pub fn successor_blocks(&self, block: BlockId) -> Vec<BlockId> {
        self.map_blocks(block, |node| self.successors_of(node))
    }

    /// Returns the predecessor blocks of `block`; empty for unknown blocks.
    #[must_use]
    pub fn predecessor_blocks(&self, block: BlockId) -> Vec<BlockId> {
        self.map_blocks(block, |node| self.predecessors_of(node))
    }

    fn map_blocks<'a, F>(&'a self, block: BlockId, adjacency: F) -> Vec<BlockId>
    where
        F: Fn(NodeId) -> &'a [NodeId],
    {
        self.node(block)
            .map(|node| {
                adjacency(node)
                    .iter()
                    .filter_map(|&n| self.block(n))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterates over all edges as block pairs.
    pub fn edges(&self) -> impl Iterator<Item = (BlockId, BlockId)> + '_ {
        self.graph
            .edges()
            .filter_map(|(from, to)| Some((self.block(from)?, self.block(to)?)))
    }

    /// Returns the dominator tree, computing it on first access.
    pub fn dominators(&self) -> &DominatorTree {
        self.dominators
            .get_or_init(|| compute_dominators(self, self.entry()))
    }

    /// Returns `true` if block `a` dominates block `b`.
    #[must_use]
    pub fn dominates_block(&self, a: BlockId, b: BlockId) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(a), Some(b)) => self.dominators().dominates(a, b),
            _ => false,
        }
    }

    /// Returns the immediate dominator of a block.
    #[must_use]
    pub fn idom_block(&self, block: BlockId) -> Option<BlockId> {
        let node = self.node(block)?;
        self.dominators()
            .immediate_dominator(node)
            .and_then(|n| self.block(n))
    }

    /// Returns the full dominator set of every block reachable from the entry.
    #[must_use]
    pub fn dominator_sets(&self) -> HashMap<BlockId, BTreeSet<BlockId>> {
        let dominators = self.dominators();
        dominators
            .dominator_sets()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| dominators.is_reachable(NodeId::new(*i)))
            .filter_map(|(i, set)| {
                let block = self.block(NodeId::new(i))?;
                Some((block, set.into_iter().filter_map(|n| self.block(n)).collect()))
            })
            .collect()
    }

    /// Returns, per node, whether it is reachable from the entry or an exported block.
    #[must_use]
    pub fn live_nodes(&self) -> Vec<bool> {
        let mut roots = Vec::with_capacity(self.exported.len() + 1);
        roots.push(self.entry());
        roots.extend_from_slice(&self.exported);
        algorithms::reachable(self, &roots)
    }

    /// Returns `true` if any edge `u -> v` has `v` dominating `u`.
    #[must_use]
    pub fn has_back_edges(&self) -> bool {
        let dominators = self.dominators();
        self.graph
            .edges()
            .any(|(from, to)| dominators.dominates(to, from))
    }
}

impl GraphBase for ControlFlowGraph {
    fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

impl Successors for ControlFlowGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors_of(node).iter().copied()
    }
}

impl Predecessors for ControlFlowGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors_of(node).iter().copied()
    }
}

impl RootedGraph for ControlFlowGraph {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use crate::{
        analysis::ControlFlowGraph,
        ir::{BlockId, FunctionBuilder},
        utils::graph::{NodeId, RootedGraph},
        Error,
    };

    fn b(i: usize) -> BlockId {
        BlockId::new(i)
    }

    #[test]
    fn test_adjacency_is_transposed_and_deduplicated() {
        let function = FunctionBuilder::new("switch", 1, 1).build_with(|f| {
            let table = f.jump_table(&[(0, 2), (1, 3), (2, 2)]);
            f.block(0, |bb| {
                bb.load(0).jump_table(table, 3);
            });
            f.block(3, |bb| bb.jump(2));
            f.block(2, |bb| {
                bb.push_null().ret();
            });
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        assert_eq!(cfg.successor_blocks(b(0)), vec![b(2), b(3)]);
        assert_eq!(cfg.predecessor_blocks(b(2)), vec![b(0), b(3)]);
        assert_eq!(cfg.node(b(3)), Some(NodeId::new(1)));
        assert_eq!(cfg.entry(), NodeId::new(0));
        assert_eq!(cfg.entry_block(), b(0));

        for (from, to) in cfg.edges() {
            assert!(cfg.predecessor_blocks(to).contains(&from));
        }
        assert_eq!(cfg.edges().count(), 3);
        assert!(cfg.is_exported(b(2)));
        assert!(cfg.is_exported(b(3)));
    }

    #[test]
    fn test_dominator_sets_skip_unreachable() {
        let function = FunctionBuilder::new("dead", 0, 0).build_with(|f| {
            f.block(0, |bb| bb.jump(1));
            f.block(1, |bb| {
                bb.push_null().ret();
            });
            f.block(2, |bb| bb.jump(1));
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        let sets = cfg.dominator_sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[&b(1)], BTreeSet::from([b(0), b(1)]));
        assert_eq!(cfg.idom_block(b(1)), Some(b(0)));
        assert_eq!(cfg.idom_block(b(2)), None);
        assert!(!cfg.dominates_block(b(2), b(1)));
        assert_eq!(cfg.live_nodes(), vec![true, true, false]);
    }

    #[test]
    fn test_back_edge_detection() {
        let function = FunctionBuilder::new("loop", 1, 1).build_with(|f| {
            f.block(0, |bb| bb.jump(1));
            f.block(1, |bb| {
                bb.load(0).branch(2, 3);
            });
            f.block(2, |bb| bb.jump(1));
            f.block(3, |bb| {
                bb.push_null().ret();
            });
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        assert!(cfg.has_back_edges());
    }

    #[test]
    fn test_dangling_successor_rejected() {
        let mut function = FunctionBuilder::new("dangling", 0, 0).build_with(|f| {
            f.block(0, |bb| bb.jump(1));
            f.block(1, |bb| {
                bb.push_null().ret();
            });
        });
        function.remove_block(b(1));

        assert_eq!(
            ControlFlowGraph::build(&function).err(),
            Some(Error::InvalidBlockReference {
                block: b(0),
                target: b(1)
            })
        );
    }
}
