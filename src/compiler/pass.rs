//! The pass trait.

use crate::{compiler::CompilerContext, ir::Function, Result};

/// A transformation over a single function IR unit.
///
/// All passes must be thread-safe (Send + Sync) so one instance can serve worker threads
/// compiling independent functions. Passes receive mutable access to the function and
/// shared access to the compiler context.
///
/// # Pipeline Integration
///
/// Passes don't declare their own ordering. The [`Pipeline`](crate::compiler::Pipeline)
/// runs them in a fixed sequence and rebuilds any analysis between passes, so a pass
/// always starts from a function satisfying the block invariants and must leave it that
/// way.
pub trait Pass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific function?
    ///
    /// Called before `run_on_function`. Override to skip functions that
    /// don't need this pass (e.g., too small, unsupported shape).
    fn should_run(&self, _function: &Function, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if any changes were made, `false` otherwise.
    /// Events should be recorded directly to `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the function violates an invariant the pass relies on. The
    /// function may be partially rewritten in that case and must be discarded.
    fn run_on_function(&self, function: &mut Function, ctx: &CompilerContext) -> Result<bool>;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
