//! Block merging: trampoline elimination and straight-line fusion.
//!
//! Two rewrites run alternately until neither changes anything:
//!
//! 1. **Trampolines**: a block whose only instruction is `jump X` is removed, and every
//!    reference to it (branches, handlers, jump tables, the entry position) is redirected
//!    to the final target of its trampoline chain.
//! 2. **Fusion**: a block ending in `jump B`, where `B` has no other predecessor, is not
//!    exported, is not the entry and has the same handler, absorbs `B`. Maximal chains
//!    are fused in one step into the chain head's slot.
//!
//! # Example
//!
//! Before:
//! ```text
//! b0: push_int 1; store r1; jump b1
//! b1: jump b2
//! b2: load r1; push_int 2; add; jump b3
//! b3: ret
//! ```
//!
//! After:
//! ```text
//! b0: push_int 1; store r1; load r1; push_int 2; add; ret
//! ```
//!
//! Exported blocks are never removed and never absorbed into a predecessor. An exported
//! block may still head a chain, since the head keeps its handle.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::{
    analysis::ControlFlowGraph,
    compiler::{pass::Pass, passes::utils::resolve_chain, CompilerContext, EventKind},
    ir::{BlockId, Function, Instruction},
    Result,
};

/// Eliminates trampolines and fuses straight-line block chains to a fixed point.
#[derive(Debug, Default)]
pub struct BlockMerger;

impl BlockMerger {
    /// Creates a new block merger.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Removes every non-exported trampoline, redirecting its references.
    ///
    /// # Returns
    ///
    /// The number of removed blocks.
    fn eliminate_trampolines(&self, function: &mut Function, ctx: &CompilerContext) -> usize {
        let trampolines: Vec<(BlockId, BlockId)> = function
            .blocks()
            .filter(|(_, block)| !block.is_exported())
            .filter_map(|(id, block)| block.trampoline_target(id).map(|target| (id, target)))
            .collect();
        if trampolines.is_empty() {
            return 0;
        }

        let forwarding: HashMap<BlockId, BlockId> = trampolines.iter().copied().collect();
        let mut removed = 0;

        for (trampoline, _) in trampolines {
            let Some(ultimate) = resolve_chain(&forwarding, trampoline) else {
                trace!("{}: {} is part of a trampoline cycle", function.name(), trampoline);
                continue;
            };

            let rewritten = function.redirect_references(trampoline, ultimate);
            function.remove_block(trampoline);
            removed += 1;

            trace!(
                "{}: removed trampoline {} -> {} ({} references)",
                function.name(),
                trampoline,
                ultimate,
                rewritten
            );
            ctx.events
                .record(EventKind::TrampolineRemoved)
                .at(function.name(), trampoline)
                .message(format!("{trampoline} -> {ultimate}"))
                .pass(self.name());
        }

        removed
    }

    /// Finds the fusible links `a -> b` of the current function.
    ///
    /// Only live predecessors count towards the single-predecessor condition. A dead block
    /// jumping into `b` is redirected to the chain head by [`fuse`](Self::fuse) and later
    /// dropped by the block placer.
    fn find_links(function: &Function, cfg: &ControlFlowGraph) -> HashMap<BlockId, BlockId> {
        let entry = cfg.entry_block();
        let live = cfg.live_nodes();
        let is_live = |id: BlockId| cfg.node(id).is_some_and(|node| live[node.index()]);
        let mut links = HashMap::new();

        for (a, block) in function.blocks() {
            if !is_live(a) {
                continue;
            }
            let Some(Instruction::Jump { target: b }) = block.terminator() else {
                continue;
            };
            let b = *b;
            if b == a || b == entry {
                continue;
            }
            let Some(successor) = function.block(b) else {
                continue;
            };
            if successor.is_exported() || successor.handler() != block.handler() {
                continue;
            }
            let mut live_preds = cfg
                .predecessor_blocks(b)
                .into_iter()
                .filter(|&pred| is_live(pred));
            if live_preds.next() != Some(a) || live_preds.next().is_some() {
                continue;
            }
            links.insert(a, b);
        }

        links
    }

    /// Fuses every maximal chain into its head.
    ///
    /// # Returns
    ///
    /// The number of blocks absorbed into chain heads.
    ///
    /// # Errors
    ///
    /// Returns an error if the CFG cannot be built or a chain link turns out to carry a
    /// different handler than its head.
    fn fuse_chains(&self, function: &mut Function, ctx: &CompilerContext) -> Result<usize> {
        let cfg = ControlFlowGraph::build(function)?;
        let links = Self::find_links(function, &cfg);
        if links.is_empty() {
            return Ok(0);
        }

        let linked: HashSet<BlockId> = links.values().copied().collect();
        let heads: Vec<BlockId> = function
            .layout()
            .iter()
            .copied()
            .filter(|id| links.contains_key(id) && !linked.contains(id))
            .collect();

        let mut absorbed = 0;
        for head in heads {
            let mut chain = vec![head];
            let mut current = head;
            while let Some(&next) = links.get(&current) {
                chain.push(next);
                current = next;
            }

            self.fuse(function, &chain)?;
            absorbed += chain.len() - 1;

            let members: Vec<String> = chain[1..].iter().map(ToString::to_string).collect();
            trace!("{}: fused {} <- {}", function.name(), head, members.join(", "));
            ctx.events
                .record(EventKind::BlocksFused)
                .at(function.name(), head)
                .message(format!("{head} <- {}", members.join(", ")))
                .pass(self.name());
        }

        Ok(absorbed)
    }

    /// Writes the fused instruction sequence of `chain` into the head's slot and removes
    /// the other links.
    fn fuse(&self, function: &mut Function, chain: &[BlockId]) -> Result<()> {
        let Some((&head, rest)) = chain.split_first() else {
            return Ok(());
        };
        let handler = function.expect_block(head)?.handler();

        let mut instructions = Vec::new();
        for (position, &id) in chain.iter().enumerate() {
            let block = function.expect_block(id)?;
            if block.handler() != handler {
                return Err(invariant_error!(
                    "chain link {} crosses the handler boundary of {}",
                    id,
                    head
                ));
            }
            if position + 1 == chain.len() {
                instructions.extend_from_slice(block.instructions());
            } else {
                instructions.extend_from_slice(block.body());
            }
        }

        let Some(block) = function.block_mut(head) else {
            return Err(invariant_error!("chain head {} disappeared", head));
        };
        *block.instructions_mut() = instructions;

        for &link in rest {
            function.remove_block(link);
            function.redirect_references(link, head);
        }
        Ok(())
    }
}

impl Pass for BlockMerger {
    fn name(&self) -> &'static str {
        "block-merger"
    }

    fn description(&self) -> &'static str {
        "Eliminates trampoline blocks and fuses straight-line block chains"
    }

    fn should_run(&self, function: &Function, _ctx: &CompilerContext) -> bool {
        function.block_count() > 1
    }

    fn run_on_function(&self, function: &mut Function, ctx: &CompilerContext) -> Result<bool> {
        let max_iterations = ctx.config.max_merge_iterations;
        let mut changed = false;

        for round in 0..max_iterations {
            let removed = self.eliminate_trampolines(function, ctx);
            let absorbed = self.fuse_chains(function, ctx)?;

            if removed + absorbed == 0 {
                debug!(
                    "{}: block merger converged after {} rounds, {} blocks left",
                    function.name(),
                    round + 1,
                    function.block_count()
                );
                return Ok(changed);
            }
            changed = true;
        }

        Err(invariant_error!(
            "block merger did not converge within {} rounds on {}",
            max_iterations,
            function.name()
        ))
    }
}
