//! Optimization passes and the pipeline that sequences them.
//!
//! This module sits on top of the analyses:
//!
//! - [`crate::ir`] - Function IR units, blocks and instructions
//! - [`crate::analysis`] - Stack validation, CFG, dominance, loops, liveness
//! - [`compiler`](self) - Passes that rewrite a unit, and the pipeline driving them
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Optimization Pipeline                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared, read-mostly state          │
//! │    ├─ PipelineConfig          (pass selection, limits)           │
//! │    └─ EventLog                (append-only, thread-safe)         │
//! │                                                                  │
//! │  Pipeline                     Fixed pass sequence per unit       │
//! │    ├─ optimize()              One unit, transactional            │
//! │    └─ optimize_all()          Independent units in parallel      │
//! │                                                                  │
//! │  Pass trait                   Interface for all passes           │
//! │    ├─ should_run()            Cheap applicability check          │
//! │    └─ run_on_function()       Per-unit transformation            │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ HandlerSimplifier       Drop handlers of safe blocks       │
//! │    ├─ BlockMerger             Trampolines, straight-line chains  │
//! │    ├─ BlockPlacer             Dead block removal                 │
//! │    └─ RegisterReducer         Linear slot reuse (opt-in)         │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use vmopt::compiler::{EventKind, Pipeline, PipelineConfig};
//! use vmopt::ir::FunctionBuilder;
//!
//! let mut function = FunctionBuilder::new("dead", 0, 0).build_with(|f| {
//!     f.block(0, |b| {
//!         b.push_null().ret();
//!     });
//!     f.block(1, |b| {
//!         b.push_null().ret();
//!     });
//! });
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! pipeline.optimize(&mut function)?;
//!
//! assert_eq!(function.block_count(), 1);
//! assert_eq!(pipeline.events().count_kind(EventKind::BlockRemoved), 1);
//! # Ok::<(), vmopt::Error>(())
//! ```

mod config;
mod context;
mod events;
mod pass;
mod passes;
mod pipeline;

pub use config::PipelineConfig;
pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::Pass;
pub use passes::{resolve_chain, BlockMerger, BlockPlacer, HandlerSimplifier, RegisterReducer};
pub use pipeline::{Pipeline, PipelineReport};
