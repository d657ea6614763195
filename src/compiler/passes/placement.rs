//! Block placement: dead block removal.
//!
//! Blocks are kept iff they are reachable through forward edges from the entry or from
//! an exported block. Exported blocks are reachable by means other than forward edges
//! (jump tables, handlers, external pins), so they are roots in their own right. The
//! survivors keep their relative layout order with the entry first.

use log::debug;

use crate::{
    analysis::ControlFlowGraph,
    compiler::{pass::Pass, CompilerContext, EventKind},
    ir::{BlockId, Function},
    utils::graph::NodeId,
    Result,
};

/// Removes blocks that no root can reach.
#[derive(Debug, Default)]
pub struct BlockPlacer;

impl BlockPlacer {
    /// Creates a new block placer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for BlockPlacer {
    fn name(&self) -> &'static str {
        "block-placer"
    }

    fn description(&self) -> &'static str {
        "Removes unreachable blocks and keeps the entry block first"
    }

    fn run_on_function(&self, function: &mut Function, ctx: &CompilerContext) -> Result<bool> {
        let cfg = ControlFlowGraph::build(function)?;
        let live = cfg.live_nodes();

        let dead: Vec<BlockId> = live
            .iter()
            .enumerate()
            .filter(|&(_, &is_live)| !is_live)
            .filter_map(|(index, _)| cfg.block(NodeId::new(index)))
            .collect();

        for &id in &dead {
            function.remove_block(id);
            ctx.events
                .record(EventKind::BlockRemoved)
                .at(function.name(), id)
                .message(format!("{id} is unreachable"))
                .pass(self.name());
        }

        if !dead.is_empty() {
            debug!(
                "{}: removed {} unreachable blocks, {} left",
                function.name(),
                dead.len(),
                function.block_count()
            );
        }
        Ok(!dead.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::ControlFlowGraph,
        compiler::{pass::Pass, passes::BlockPlacer, CompilerContext, EventKind},
        ir::{BlockId, FunctionBuilder},
    };

    fn b(i: usize) -> BlockId {
        BlockId::new(i)
    }

    #[test]
    fn test_removes_unreachable_block() {
        let mut function = FunctionBuilder::new("dead", 0, 0).build_with(|f| {
            f.block(0, |bb| bb.jump(2));
            f.block(1, |bb| bb.jump(2));
            f.block(2, |bb| {
                bb.push_null().ret();
            });
        });

        let ctx = CompilerContext::default();
        assert!(BlockPlacer::new().run_on_function(&mut function, &ctx).unwrap());

        assert_eq!(function.layout(), &[b(0), b(2)]);
        assert!(function.block(b(1)).is_none());
        assert_eq!(ctx.events.count_kind(EventKind::BlockRemoved), 1);

        let cfg = ControlFlowGraph::build(&function).unwrap();
        assert_eq!(cfg.predecessor_blocks(b(2)), vec![b(0)]);
        assert!(cfg.node(b(1)).is_none());
    }

    #[test]
    fn test_exported_blocks_are_roots() {
        let mut function = FunctionBuilder::new("pinned", 0, 0).build_with(|f| {
            f.block(0, |bb| {
                bb.push_null().ret();
            });
            f.block(1, |bb| {
                bb.pin().jump(2);
            });
            f.block(2, |bb| {
                bb.push_null().ret();
            });
            f.block(3, |bb| {
                bb.push_null().ret();
            });
        });

        let ctx = CompilerContext::default();
        assert!(BlockPlacer::new().run_on_function(&mut function, &ctx).unwrap());
        assert_eq!(function.layout(), &[b(0), b(1), b(2)]);

        assert!(!BlockPlacer::new().run_on_function(&mut function, &ctx).unwrap());
    }
}
