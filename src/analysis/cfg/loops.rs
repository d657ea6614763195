//! Back-edge classification and natural loop discovery.
//!
//! An edge `u -> v` is a **back edge** iff `v` dominates `u`. Its target is a natural-loop
//! **header** and its source a **latch**. The body of the loop is every block that can
//! reach the latch without passing through the header, plus the header itself.
//!
//! ```text
//!     [header] <------+
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::ControlFlowGraph,
    ir::BlockId,
    utils::graph::{algorithms, NodeId, RootedGraph},
};

/// The back edges of a function, indexed both ways.
///
/// - [`by_header`](Self::by_header): header -> latches, e.g. `{H: {B}}` for a single loop
///   whose body `B` jumps back to `H`
/// - [`targets_of`](Self::targets_of): source -> headers it has a back edge to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackEdges {
    by_header: BTreeMap<BlockId, BTreeSet<BlockId>>,
    by_source: BTreeMap<BlockId, BTreeSet<BlockId>>,
}

impl BackEdges {
    /// Records the back edge `source -> header`.
    pub fn insert(&mut self, source: BlockId, header: BlockId) {
        self.by_header.entry(header).or_default().insert(source);
        self.by_source.entry(source).or_default().insert(header);
    }

    /// Returns the header -> latches map.
    #[must_use]
    pub fn by_header(&self) -> &BTreeMap<BlockId, BTreeSet<BlockId>> {
        &self.by_header
    }

    /// Returns the source -> headers map.
    #[must_use]
    pub fn by_source(&self) -> &BTreeMap<BlockId, BTreeSet<BlockId>> {
        &self.by_source
    }

    /// Iterates over the loop headers in handle order.
    pub fn headers(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.by_header.keys().copied()
    }

    /// Returns the latches of `header`.
    #[must_use]
    pub fn latches(&self, header: BlockId) -> Option<&BTreeSet<BlockId>> {
        self.by_header.get(&header)
    }

    /// Returns the headers `source` has a back edge to.
    #[must_use]
    pub fn targets_of(&self, source: BlockId) -> Option<&BTreeSet<BlockId>> {
        self.by_source.get(&source)
    }

    /// Returns `true` if `source -> header` is a back edge.
    #[must_use]
    pub fn contains(&self, source: BlockId, header: BlockId) -> bool {
        self.by_source
            .get(&source)
            .is_some_and(|headers| headers.contains(&header))
    }

    /// Returns `true` if `block` is a loop header.
    #[must_use]
    pub fn is_header(&self, block: BlockId) -> bool {
        self.by_header.contains_key(&block)
    }

    /// Returns the number of back edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_source.values().map(BTreeSet::len).sum()
    }

    /// Returns `true` if there are no back edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

/// A natural loop: a header plus every block reaching one of its latches without
/// passing through the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalLoop {
    /// The header block of the loop (single entry point).
    pub header: BlockId,
    /// Sources of the back edges into the header.
    pub latches: BTreeSet<BlockId>,
    /// All blocks of the loop body, header included.
    pub body: BTreeSet<BlockId>,
    /// Number of enclosing loops (0 = outermost).
    pub depth: usize,
}

impl NaturalLoop {
    /// Returns true if this loop contains the given block.
    #[must_use]
    pub fn contains(&self, block: BlockId) -> bool {
        self.body.contains(&block)
    }

    /// Returns the number of blocks in the loop body.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }
}

/// Classifies the back edges of `cfg`.
///
/// Walks the graph depth-first from the entry and tests every traversed edge `u -> v`
/// against the dominator relation. Functions with at most one block have no loops by
/// definition and are not analyzed.
///
/// # Examples
///
/// ```rust
/// use vmopt::{analysis::{find_back_edges, ControlFlowGraph}, ir::{BlockId, FunctionBuilder}};
///
/// let function = FunctionBuilder::new("loop", 1, 1).build_with(|f| {
///     f.block(0, |b| b.jump(1));
///     f.block(1, |b| {
///         b.load(0).branch(2, 3);
///     });
///     f.block(2, |b| b.jump(1));
///     f.block(3, |b| {
///         b.push_null().ret();
///     });
/// });
///
/// let cfg = ControlFlowGraph::build(&function)?;
/// let back_edges = find_back_edges(&cfg);
/// assert!(back_edges.contains(BlockId::new(2), BlockId::new(1)));
/// assert_eq!(back_edges.len(), 1);
/// # Ok::<(), vmopt::Error>(())
/// ```
#[must_use]
pub fn find_back_edges(cfg: &ControlFlowGraph) -> BackEdges {
    let mut back_edges = BackEdges::default();
    if cfg.block_count() <= 1 {
        return back_edges;
    }
    let dominators = cfg.dominators();
    for node in algorithms::dfs(cfg, cfg.entry()) {
        for &succ in cfg.successors_of(node) {
            if dominators.dominates(succ, node) {
                if let (Some(source), Some(header)) = (cfg.block(node), cfg.block(succ)) {
                    back_edges.insert(source, header);
                }
            }
        }
    }
    back_edges
}

/// Expands the back edges of `cfg` into natural loops, sorted by header.
#[must_use]
pub fn find_loops(cfg: &ControlFlowGraph, back_edges: &BackEdges) -> Vec<NaturalLoop> {
    let mut loops: Vec<NaturalLoop> = back_edges
        .by_header()
        .iter()
        .filter_map(|(&header, latches)| {
            let header_node = cfg.node(header)?;
            let mut body = BTreeSet::from([header_node]);
            for &latch in latches {
                if let Some(latch_node) = cfg.node(latch) {
                    expand_loop_body(cfg, &mut body, header_node, latch_node);
                }
            }
            Some(NaturalLoop {
                header,
                latches: latches.clone(),
                body: body.into_iter().filter_map(|n| cfg.block(n)).collect(),
                depth: 0,
            })
        })
        .collect();

    compute_depths(&mut loops);
    loops
}

/// Adds every node that reaches `latch` without passing through `header` to `body`.
///
/// Uses a worklist: starting from the latch, predecessors that aren't the header are
/// added until the body is closed.
fn expand_loop_body(
    cfg: &ControlFlowGraph,
    body: &mut BTreeSet<NodeId>,
    header: NodeId,
    latch: NodeId,
) {
    if body.contains(&latch) {
        return;
    }

    let mut worklist = vec![latch];
    while let Some(node) = worklist.pop() {
        if body.insert(node) {
            for &pred in cfg.predecessors_of(node) {
                if pred != header && !body.contains(&pred) {
                    worklist.push(pred);
                }
            }
        }
    }
}

/// A loop is nested in every other loop whose body contains its header.
fn compute_depths(loops: &mut [NaturalLoop]) {
    let depths: Vec<usize> = loops
        .iter()
        .map(|inner| {
            loops
                .iter()
                .filter(|outer| outer.header != inner.header && outer.contains(inner.header))
                .count()
        })
        .collect();

    for (natural_loop, depth) in loops.iter_mut().zip(depths) {
        natural_loop.depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use crate::{
        analysis::{find_back_edges, find_loops, ControlFlowGraph},
        ir::{BlockId, FunctionBuilder},
    };

    fn b(i: usize) -> BlockId {
        BlockId::new(i)
    }

    #[test]
    fn test_single_loop_reports_header_to_body() {
        // E -> H, H -> B | X, B -> H
        let function = FunctionBuilder::new("single", 1, 1).build_with(|f| {
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
        let back_edges = find_back_edges(&cfg);

        let expected: BTreeMap<BlockId, BTreeSet<BlockId>> =
            BTreeMap::from([(b(1), BTreeSet::from([b(2)]))]);
        assert_eq!(back_edges.by_header(), &expected);
        assert_eq!(
            back_edges.by_source(),
            &BTreeMap::from([(b(2), BTreeSet::from([b(1)]))])
        );
        assert_eq!(back_edges.len(), 1);
        assert!(back_edges.is_header(b(1)));

        let loops = find_loops(&cfg, &back_edges);
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].body, BTreeSet::from([b(1), b(2)]));
        assert_eq!(loops[0].depth, 0);
    }

    #[test]
    fn test_nested_loops_depth() {
        // 0 -> 1 (outer header) -> 2 (inner header) -> 3 -> 2 | 4, 4 -> 1 | 5
        let function = FunctionBuilder::new("nested", 1, 1).build_with(|f| {
            f.block(0, |bb| bb.jump(1));
            f.block(1, |bb| bb.jump(2));
            f.block(2, |bb| bb.jump(3));
            f.block(3, |bb| {
                bb.load(0).branch(2, 4);
            });
            f.block(4, |bb| {
                bb.load(0).branch(1, 5);
            });
            f.block(5, |bb| {
                bb.push_null().ret();
            });
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        let back_edges = find_back_edges(&cfg);
        assert!(back_edges.contains(b(3), b(2)));
        assert!(back_edges.contains(b(4), b(1)));
        assert_eq!(back_edges.len(), 2);

        let loops = find_loops(&cfg, &back_edges);
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].header, b(1));
        assert_eq!(loops[0].body, BTreeSet::from([b(1), b(2), b(3), b(4)]));
        assert_eq!(loops[0].depth, 0);
        assert_eq!(loops[1].header, b(2));
        assert_eq!(loops[1].body, BTreeSet::from([b(2), b(3)]));
        assert_eq!(loops[1].depth, 1);
    }

    #[test]
    fn test_irreducible_cycle_has_no_back_edge() {
        // 0 -> 1 | 2, 1 <-> 2: neither cycle node dominates the other
        let function = FunctionBuilder::new("irreducible", 1, 1).build_with(|f| {
            f.block(0, |bb| {
                bb.load(0).branch(1, 2);
            });
            f.block(1, |bb| {
                bb.load(0).branch(2, 3);
            });
            f.block(2, |bb| bb.jump(1));
            f.block(3, |bb| {
                bb.push_null().ret();
            });
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        assert!(find_back_edges(&cfg).is_empty());
    }

    #[test]
    fn test_single_block_function_has_no_loops() {
        let function = FunctionBuilder::new("spin", 0, 0).build_with(|f| {
            f.block(0, |bb| bb.jump(0));
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        let back_edges = find_back_edges(&cfg);
        assert!(back_edges.is_empty());
        assert!(find_loops(&cfg, &back_edges).is_empty());
        // The raw edge check still sees the cycle.
        assert!(cfg.has_back_edges());
    }

    #[test]
    fn test_self_loop_in_larger_function() {
        let function = FunctionBuilder::new("wait", 0, 0).build_with(|f| {
            f.block(0, |bb| bb.jump(1));
            f.block(1, |bb| {
                bb.push_bool(true).branch(1, 2);
            });
            f.block(2, |bb| {
                bb.push_null().ret();
            });
        });

        let cfg = ControlFlowGraph::build(&function).unwrap();
        let back_edges = find_back_edges(&cfg);
        assert!(back_edges.contains(BlockId::new(1), BlockId::new(1)));
        assert_eq!(find_loops(&cfg, &back_edges)[0].size(), 1);
    }
}
