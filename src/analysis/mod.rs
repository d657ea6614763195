//! Program analyses over a function IR unit.
//!
//! Every analysis here is a read-only snapshot of a [`crate::ir::Function`]. Passes that
//! mutate the function invalidate all of them, and the [`crate::compiler`] pipeline
//! rebuilds whatever the next pass needs.
//!
//! # Architecture
//!
//! - [`cfg`] - Control flow graph, dominance queries and loop detection
//! - [`stack`] - Operand-stack discipline validation
//! - [`liveness`] - Linear live ranges of virtual registers
//!
//! # Usage
//!
//! ```rust
//! use vmopt::{analysis::{validate_stack, ControlFlowGraph}, ir::{BlockId, FunctionBuilder}};
//!
//! let function = FunctionBuilder::new("abs", 1, 1).build_with(|f| {
//!     f.block(0, |b| {
//!         b.load(0).push_int(0).lt().branch(1, 2);
//!     });
//!     f.block(1, |b| {
//!         b.load(0).neg().ret();
//!     });
//!     f.block(2, |b| {
//!         b.load(0).ret();
//!     });
//! });
//!
//! let layout = validate_stack(&function)?;
//! assert_eq!(layout.max_depth(), 2);
//!
//! let cfg = ControlFlowGraph::build(&function)?;
//! assert_eq!(cfg.idom_block(BlockId::new(2)), Some(BlockId::new(0)));
//! # Ok::<(), vmopt::Error>(())
//! ```

pub mod cfg;
pub mod liveness;
pub mod stack;

pub use cfg::{find_back_edges, find_loops, BackEdges, ControlFlowGraph, NaturalLoop};
pub use liveness::{compute_liveness, LiveRange, Liveness, ProgramPoint};
pub use stack::{validate_stack, StackLayout};
