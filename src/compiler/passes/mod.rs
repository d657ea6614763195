//! Built-in transformation passes.
//!
//! Each pass implements [`Pass`](crate::compiler::Pass) and records its rewrites in the
//! [`EventLog`](crate::compiler::EventLog) of the context it runs in.
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`HandlerSimplifier`] | Drops handlers of blocks that cannot throw |
//! | [`BlockMerger`] | Trampoline elimination and straight-line fusion |
//! | [`BlockPlacer`] | Removes blocks no root can reach |
//! | [`RegisterReducer`] | Linear reuse of physical register slots (opt-in) |
//!
//! The [`Pipeline`](crate::compiler::Pipeline) runs them in the order listed, with the
//! handler simplifier running once more after merging.

mod blockmerge;
mod handlers;
mod placement;
mod regalloc;
mod utils;

pub use blockmerge::BlockMerger;
pub use handlers::HandlerSimplifier;
pub use placement::BlockPlacer;
pub use regalloc::RegisterReducer;
pub use utils::resolve_chain;
