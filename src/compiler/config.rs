//! Configuration for the optimization pipeline.

/// Configuration for the optimization pipeline.
///
/// Controls which passes run and the limits they operate under. The defaults run every
/// pass except the register reducer, whose linear liveness is not sound across loop back
/// edges and which therefore has to be requested explicitly.
///
/// # Examples
///
/// ```rust
/// use vmopt::compiler::PipelineConfig;
///
/// let config = PipelineConfig::default()
///     .with_register_reduction(true)
///     .with_min_registers(4);
/// assert!(config.reduce_registers);
/// assert!(config.merge_blocks);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Validate the operand-stack discipline on input and after merging (default: true).
    pub validate_stack: bool,

    /// Drop handler associations of blocks that cannot throw (default: true).
    pub simplify_handlers: bool,

    /// Eliminate trampolines and fuse straight-line chains (default: true).
    pub merge_blocks: bool,

    /// Remove blocks unreachable from the entry and the exported blocks (default: true).
    pub place_blocks: bool,

    /// Classify back edges and report natural loops (default: true).
    pub find_loops: bool,

    /// Pack virtual registers into reused physical slots (default: false).
    pub reduce_registers: bool,

    /// Floor for the register count after reduction (default: 1).
    pub min_registers: u32,

    /// Reduction only runs with at least `arg_count + reduction_headroom` registers
    /// (default: 2).
    pub reduction_headroom: u32,

    /// Maximum fixed-point rounds of the block merger (default: 50).
    pub max_merge_iterations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validate_stack: true,
            simplify_handlers: true,
            merge_blocks: true,
            place_blocks: true,
            find_loops: true,
            reduce_registers: false,
            min_registers: 1,
            reduction_headroom: 2,
            max_merge_iterations: 50,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that runs no transformation, only validation.
    #[must_use]
    pub fn validate_only() -> Self {
        Self {
            simplify_handlers: false,
            merge_blocks: false,
            place_blocks: false,
            find_loops: false,
            ..Self::default()
        }
    }

    /// Enables or disables stack validation.
    #[must_use]
    pub fn with_stack_validation(mut self, enable: bool) -> Self {
        self.validate_stack = enable;
        self
    }

    /// Enables or disables the handler simplifier.
    #[must_use]
    pub fn with_handler_simplification(mut self, enable: bool) -> Self {
        self.simplify_handlers = enable;
        self
    }

    /// Enables or disables the block merger.
    #[must_use]
    pub fn with_block_merging(mut self, enable: bool) -> Self {
        self.merge_blocks = enable;
        self
    }

    /// Enables or disables the block placer.
    #[must_use]
    pub fn with_block_placement(mut self, enable: bool) -> Self {
        self.place_blocks = enable;
        self
    }

    /// Enables or disables the loop finder.
    #[must_use]
    pub fn with_loop_detection(mut self, enable: bool) -> Self {
        self.find_loops = enable;
        self
    }

    /// Enables or disables the register reducer.
    #[must_use]
    pub fn with_register_reduction(mut self, enable: bool) -> Self {
        self.reduce_registers = enable;
        self
    }

    /// Sets the floor for the final register count.
    #[must_use]
    pub fn with_min_registers(mut self, min: u32) -> Self {
        self.min_registers = min;
        self
    }

    /// Sets how many registers beyond the arguments are needed before reduction runs.
    #[must_use]
    pub fn with_reduction_headroom(mut self, headroom: u32) -> Self {
        self.reduction_headroom = headroom;
        self
    }

    /// Sets the maximum number of block merger rounds.
    #[must_use]
    pub fn with_max_merge_iterations(mut self, max: usize) -> Self {
        self.max_merge_iterations = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::PipelineConfig;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.validate_stack);
        assert!(config.place_blocks);
        assert!(!config.reduce_registers);
        assert_eq!(config.min_registers, 1);
        assert_eq!(config.reduction_headroom, 2);
        assert_eq!(config.max_merge_iterations, 50);
    }

    #[test]
    fn test_validate_only() {
        let config = PipelineConfig::validate_only();
        assert!(config.validate_stack);
        assert!(!config.merge_blocks);
        assert!(!config.simplify_handlers);
        assert!(!config.reduce_registers);
    }
}
