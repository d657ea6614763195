//! Handler simplification.
//!
//! A handler association only matters if some instruction of the protected block can
//! raise. Blocks made of nothing but register traffic, literals and jumps drop their
//! handler, which in turn lets the block merger fuse them with unprotected neighbours.

use log::trace;

use crate::{
    compiler::{pass::Pass, CompilerContext, EventKind},
    ir::{BlockId, Function},
    Result,
};

/// Clears the handler of every block that cannot throw.
#[derive(Debug, Default)]
pub struct HandlerSimplifier;

impl HandlerSimplifier {
    /// Creates a new handler simplifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for HandlerSimplifier {
    fn name(&self) -> &'static str {
        "handler-simplifier"
    }

    fn description(&self) -> &'static str {
        "Removes exception handlers from blocks that cannot throw"
    }

    fn run_on_function(&self, function: &mut Function, ctx: &CompilerContext) -> Result<bool> {
        let candidates: Vec<(BlockId, BlockId)> = function
            .blocks()
            .filter(|(_, block)| !block.can_throw())
            .filter_map(|(id, block)| block.handler().map(|handler| (id, handler)))
            .collect();

        for &(id, handler) in &candidates {
            if let Some(block) = function.block_mut(id) {
                block.set_handler(None);
            }
            trace!("{}: {} cannot throw, dropping handler {}", function.name(), id, handler);
            ctx.events
                .record(EventKind::HandlerCleared)
                .at(function.name(), id)
                .message(format!("dropped handler {handler}"))
                .pass(self.name());
        }

        Ok(!candidates.is_empty())
    }
}
