//! Control Flow Graph (CFG) construction and analysis.
//!
//! This module provides a graph view over the blocks of a [`crate::ir::Function`] with
//! efficient traversal, dominator computation, and loop detection.
//!
//! # Architecture
//!
//! The CFG builds upon the generic [`crate::utils::graph::DirectedGraph`] infrastructure.
//! Every block becomes one node, numbered in layout order; every distinct
//! `(block, successor)` pair becomes one edge. Exception handlers are attached to
//! blocks in the IR but are not edges of the graph.
//!
//! # Key Components
//!
//! - [`ControlFlowGraph`] - The snapshot graph with a lazily cached dominator tree
//! - [`BackEdges`] - Back edges keyed by header and by source
//! - [`NaturalLoop`] - A loop header with its latches, body and nesting depth
//!
//! # Lazy Computation
//!
//! The dominator tree is computed on first access and cached using
//! [`std::sync::OnceLock`].
//!
//! # Examples
//!
//! ```rust
//! use vmopt::{analysis::{find_back_edges, find_loops, ControlFlowGraph}, ir::FunctionBuilder};
//!
//! let function = FunctionBuilder::new("count", 1, 1).build_with(|f| {
//!     f.block(0, |b| b.jump(1));
//!     f.block(1, |b| {
//!         b.load(0).branch(2, 3);
//!     });
//!     f.block(2, |b| {
//!         b.inc(0).jump(1);
//!     });
//!     f.block(3, |b| {
//!         b.load(0).ret();
//!     });
//! });
//!
//! let cfg = ControlFlowGraph::build(&function)?;
//! let loops = find_loops(&cfg, &find_back_edges(&cfg));
//! assert_eq!(loops.len(), 1);
//! assert_eq!(loops[0].size(), 2);
//! # Ok::<(), vmopt::Error>(())
//! ```

mod graph;
mod loops;

pub use graph::ControlFlowGraph;
pub use loops::{find_back_edges, find_loops, BackEdges, NaturalLoop};
