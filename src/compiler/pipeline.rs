//! The optimization pipeline.
//!
//! [`Pipeline`] runs the passes in their fixed order over one function at a time:
//!
//! ```text
//! validate ─► handler-simplifier ─► block-merger ─► validate
//!                                                       │
//!   register-reducer ◄─ loop-finder ◄─ block-placer ◄─ handler-simplifier
//!         │
//!         └─► validate ─► report
//! ```
//!
//! Every analysis a pass needs is rebuilt inside that pass, so no CFG or dominator tree
//! outlives a mutation. The passes work on a private copy of the function; the caller's
//! function is replaced only once the whole sequence succeeded.

use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    analysis::{find_back_edges, find_loops, validate_stack, BackEdges, ControlFlowGraph, NaturalLoop},
    compiler::{
        pass::Pass,
        passes::{BlockMerger, BlockPlacer, HandlerSimplifier, RegisterReducer},
        CompilerContext, EventKind, EventLog, PipelineConfig,
    },
    ir::Function,
    Result,
};

/// Name used for loop finder events.
const LOOP_FINDER: &str = "loop-finder";

/// Outcome of a successful pipeline run over one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Whether any pass changed the function.
    pub changed: bool,
    /// Back edges of the final control flow graph, empty if loop detection is disabled.
    pub back_edges: BackEdges,
    /// Natural loops of the final control flow graph.
    pub loops: Vec<NaturalLoop>,
    /// Final register count.
    pub register_count: u32,
    /// Maximum operand-stack depth, if stack validation is enabled.
    pub max_stack_depth: Option<u32>,
    /// Number of blocks of the input function.
    pub blocks_before: usize,
    /// Number of blocks of the optimized function.
    pub blocks_after: usize,
}

impl PipelineReport {
    /// Returns `true` if the final function contains a loop.
    #[must_use]
    pub fn has_loops(&self) -> bool {
        !self.back_edges.is_empty()
    }

    /// Number of blocks the pipeline removed.
    #[must_use]
    pub fn blocks_removed(&self) -> usize {
        self.blocks_before.saturating_sub(self.blocks_after)
    }
}

/// Runs the optimization passes over function IR units.
///
/// A pipeline owns its [`CompilerContext`]; events of every function it optimizes
/// accumulate in the same log.
///
/// # Examples
///
/// ```rust
/// use vmopt::{compiler::Pipeline, ir::FunctionBuilder};
///
/// let mut function = FunctionBuilder::new("chain", 0, 0).build_with(|f| {
///     f.block(0, |b| {
///         b.push_int(1).jump(1);
///     });
///     f.block(1, |b| b.jump(2));
///     f.block(2, |b| {
///         b.push_int(2).add().ret();
///     });
/// });
///
/// let pipeline = Pipeline::default();
/// let report = pipeline.optimize(&mut function)?;
///
/// assert!(report.changed);
/// assert_eq!(function.block_count(), 1);
/// assert_eq!(report.max_stack_depth, Some(2));
/// # Ok::<(), vmopt::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Pipeline {
    ctx: CompilerContext,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            ctx: CompilerContext::new(config),
        }
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    /// Returns the shared context passed to every pass.
    #[must_use]
    pub fn context(&self) -> &CompilerContext {
        &self.ctx
    }

    /// Returns the events recorded so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.ctx.events
    }

    /// Optimizes one function.
    ///
    /// The passes run on a copy of `function`. On success the copy replaces `function`;
    /// on failure `function` is left exactly as it was, so the caller can keep executing
    /// the unoptimized unit.
    ///
    /// # Errors
    ///
    /// Returns a validation fault if the input violates the block, register or stack
    /// invariants, and [`crate::Error::InvariantViolation`] if a pass broke them.
    pub fn optimize(&self, function: &mut Function) -> Result<PipelineReport> {
        let mut working = function.clone();
        match self.run(&mut working) {
            Ok(report) => {
                if report.changed {
                    *function = working;
                }
                Ok(report)
            }
            Err(e) => {
                warn!("{}: optimization failed, keeping original: {}", function.name(), e);
                self.ctx
                    .events
                    .record(EventKind::Error)
                    .function(function.name())
                    .message(e.to_string());
                Err(e)
            }
        }
    }

    /// Optimizes independent functions in parallel.
    ///
    /// Returns one result per function, in input order. A failing function keeps its
    /// original body and does not affect the others.
    pub fn optimize_all(&self, functions: &mut [Function]) -> Vec<Result<PipelineReport>> {
        functions
            .par_iter_mut()
            .map(|function| self.optimize(function))
            .collect()
    }

    fn run(&self, function: &mut Function) -> Result<PipelineReport> {
        let config = &self.ctx.config;
        let blocks_before = function.block_count();

        function.validate()?;
        if config.validate_stack {
            validate_stack(function)?;
        }

        let mut changed = false;
        if config.simplify_handlers {
            changed |= self.run_pass(&HandlerSimplifier::new(), function)?;
        }
        if config.merge_blocks {
            changed |= self.run_pass(&BlockMerger::new(), function)?;
            self.check(function, config.validate_stack)?;
        }
        if config.simplify_handlers {
            changed |= self.run_pass(&HandlerSimplifier::new(), function)?;
        }
        if config.place_blocks {
            changed |= self.run_pass(&BlockPlacer::new(), function)?;
        }

        let (back_edges, loops) = if config.find_loops {
            self.detect_loops(function)?
        } else {
            (BackEdges::default(), Vec::new())
        };

        if config.reduce_registers {
            changed |= self.run_pass(&RegisterReducer::new(), function)?;
        }

        let max_stack_depth = self.check(function, config.validate_stack)?;
        debug!(
            "{}: {} -> {} blocks, {} registers, changed: {}",
            function.name(),
            blocks_before,
            function.block_count(),
            function.register_count(),
            changed
        );

        Ok(PipelineReport {
            changed,
            back_edges,
            loops,
            register_count: function.register_count(),
            max_stack_depth,
            blocks_before,
            blocks_after: function.block_count(),
        })
    }

    /// Runs one pass, honoring its `should_run` decision.
    fn run_pass(&self, pass: &dyn Pass, function: &mut Function) -> Result<bool> {
        if !pass.should_run(function, &self.ctx) {
            debug!("{}: {} not applicable", function.name(), pass.name());
            self.ctx
                .events
                .record(EventKind::PassSkipped)
                .function(function.name())
                .message("not applicable")
                .pass(pass.name());
            return Ok(false);
        }

        self.ctx
            .events
            .record(EventKind::PassStarted)
            .function(function.name())
            .message(pass.description())
            .pass(pass.name());

        let changed = pass.run_on_function(function, &self.ctx)?;

        debug!("{}: {} changed: {}", function.name(), pass.name(), changed);
        self.ctx
            .events
            .record(EventKind::PassCompleted)
            .function(function.name())
            .message(if changed { "changed" } else { "unchanged" })
            .pass(pass.name());
        Ok(changed)
    }

    /// Re-checks a function the passes produced.
    ///
    /// The input already passed validation, so any fault here is the pipeline's own.
    ///
    /// # Returns
    ///
    /// The maximum stack depth, if stack validation is enabled.
    fn check(&self, function: &Function, stack: bool) -> Result<Option<u32>> {
        function
            .validate()
            .map_err(|e| invariant_error!("{}: passes produced an invalid unit: {}", function.name(), e))?;
        if !stack {
            return Ok(None);
        }
        let layout = validate_stack(function).map_err(|e| {
            invariant_error!("{}: passes broke the stack discipline: {}", function.name(), e)
        })?;
        Ok(Some(layout.max_depth()))
    }

    fn detect_loops(&self, function: &Function) -> Result<(BackEdges, Vec<NaturalLoop>)> {
        let cfg = ControlFlowGraph::build(function)?;
        let back_edges = find_back_edges(&cfg);
        let loops = find_loops(&cfg, &back_edges);

        for natural in &loops {
            self.ctx
                .events
                .record(EventKind::LoopDetected)
                .at(function.name(), natural.header)
                .message(format!(
                    "{} blocks, {} latches, depth {}",
                    natural.size(),
                    natural.latches.len(),
                    natural.depth
                ))
                .pass(LOOP_FINDER);
        }
        if !loops.is_empty() {
            debug!("{}: found {} loops", function.name(), loops.len());
        }
        Ok((back_edges, loops))
    }
}
