// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # vmopt
//!
//! A bytecode-level optimizing backend for a stack-based dynamic-language virtual machine.
//! `vmopt` takes one function at a time, a stack-oriented instruction sequence split into
//! basic blocks, and turns it into a simplified, register-reduced form that is cheaper to
//! interpret.
//!
//! ## Features
//!
//! - **🧱 Arena-based IR** - Blocks are addressed by stable handles, so redirecting control
//!   flow is a single value update
//! - **📐 Stack discipline validation** - Proves the operand-stack height at every offset is
//!   independent of the path taken
//! - **🌳 Dominance and loops** - Lengauer-Tarjan dominator trees, back-edge classification
//!   and natural loop bodies
//! - **✂️ Control flow simplification** - Handler removal, trampoline elimination, block
//!   fusion and dead block removal
//! - **♻️ Register reduction** - Liveness-based reuse of physical register slots
//! - **🛡️ Transactional pipeline** - A failing unit is reported, never half-rewritten
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust
//! use vmopt::prelude::*;
//!
//! let mut function = FunctionBuilder::new("abs", 1, 1).build_with(|f| {
//!     f.block(0, |b| {
//!         b.load(0).push_int(0).lt().branch(1, 2);
//!     });
//!     f.block(1, |b| {
//!         b.load(0).neg().jump(3);
//!     });
//!     f.block(2, |b| {
//!         b.load(0).jump(3);
//!     });
//!     f.block(3, |b| {
//!         b.ret();
//!     });
//! });
//!
//! let pipeline = Pipeline::default();
//! let report = pipeline.optimize(&mut function)?;
//!
//! assert!(!report.has_loops());
//! assert_eq!(report.max_stack_depth, Some(2));
//! # Ok::<(), vmopt::Error>(())
//! ```
//!
//! ### Inspecting the Analyses
//!
//! ```rust
//! use vmopt::analysis::{find_back_edges, ControlFlowGraph};
//! use vmopt::ir::{BlockId, FunctionBuilder};
//!
//! let function = FunctionBuilder::new("spin", 0, 0).build_with(|f| {
//!     f.block(0, |b| b.jump(1));
//!     f.block(1, |b| {
//!         b.push_bool(true).branch(1, 2);
//!     });
//!     f.block(2, |b| {
//!         b.push_undefined().ret();
//!     });
//! });
//!
//! let cfg = ControlFlowGraph::build(&function)?;
//! assert!(cfg.dominates_block(BlockId::new(1), BlockId::new(2)));
//!
//! let back_edges = find_back_edges(&cfg);
//! assert!(back_edges.contains(BlockId::new(1), BlockId::new(1)));
//! # Ok::<(), vmopt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The crate is organized in layers, each depending only on the ones above it:
//!
//! - [`ir`] - Instructions, blocks, function IR units, the builder and the debug printer
//! - [`utils`] - Generic graph traits, traversals and the dominator tree
//! - [`analysis`] - Stack validation, control flow graph, loops and liveness
//! - [`compiler`] - Passes, the pass trait, the pipeline, configuration and events
//!
//! The pipeline runs a fixed sequence over one unit:
//!
//! ```text
//! validate → handler simplifier → block merger → handler simplifier
//!          → block placer → loop finder → register reducer → validate
//! ```
//!
//! Analyses are recomputed after every mutation and never cached across passes.
//!
//! ## Error Handling
//!
//! Every fault is an [`Error`] scoped to one unit. Validation faults point at the offending
//! block or offset; [`Error::InvariantViolation`] marks a bug in a pass. In both cases the
//! caller's unit is left untouched and should be executed unoptimized.
//!
//! ## Concurrency
//!
//! Units share no state. [`compiler::Pipeline::optimize_all`] compiles independent units on
//! the `rayon` thread pool, with all events gathered in one thread-safe
//! [`compiler::EventLog`].

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use vmopt::prelude::*;
///
/// let function = FunctionBuilder::new("id", 1, 1).build_with(|f| {
///     f.block(0, |b| {
///         b.load(0).ret();
///     });
/// });
/// assert_eq!(validate_stack(&function)?.max_depth(), 1);
/// # Ok::<(), vmopt::Error>(())
/// ```
pub mod prelude;

/// The function IR: instructions, blocks, units and their construction.
pub mod ir;

/// Shared helpers, most notably the generic graph toolkit.
pub mod utils;

/// Analyses over a function IR unit.
///
/// All analyses are pure functions of the unit. They borrow it immutably and must be
/// recomputed after any pass changes it.
pub mod analysis;

/// Optimization passes and the pipeline.
pub mod compiler;

/// `vmopt` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `vmopt` Error type
///
/// The main error type for all operations in this crate. Every variant describes a fault in
/// exactly one function IR unit.
pub use error::Error;
