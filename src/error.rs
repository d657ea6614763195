use thiserror::Error;

use crate::ir::{BlockId, Register};

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::InvariantViolation {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::InvariantViolation {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes a fault for exactly one function IR unit. A fault never leaves a
/// half-transformed unit behind: the [`Pipeline`](crate::compiler::Pipeline) only commits its
/// work when every pass succeeded, so the caller's recovery is always the same - keep
/// executing the unoptimized unit.
///
/// # Error Categories
///
/// ## Validation Faults
/// - [`Error::StackHeightMismatch`] - Operand-stack height depends on the path taken
/// - [`Error::StackUnderflow`] - An instruction pops more values than are available
/// - [`Error::InvalidReturnHeight`] - A `return` does not see exactly one value
/// - [`Error::EmptyBlock`], [`Error::MissingTerminator`], [`Error::MisplacedTerminator`] -
///   Broken block shape
/// - [`Error::InvalidBlockReference`], [`Error::InvalidJumpTable`] - Control transfer to
///   something outside the unit
/// - [`Error::RegisterOutOfRange`], [`Error::RegisterReadBeforeWrite`] - Register misuse
/// - [`Error::EmptyFunction`] - A unit without blocks
///
/// ## Internal Faults
/// - [`Error::InvariantViolation`] - A pass broke its own contract
///
/// # Examples
///
/// ```rust
/// use vmopt::{Error, ir::FunctionBuilder, compiler::Pipeline};
///
/// let mut function = FunctionBuilder::new("f", 0, 0).build_with(|f| {
///     f.block(0, |b| {
///         b.push_int(1).push_int(2).ret();
///     });
/// });
///
/// match Pipeline::default().optimize(&mut function) {
///     Ok(report) => println!("optimized: {}", report.changed),
///     Err(Error::InvalidReturnHeight { offset, height }) => {
///         eprintln!("return at {offset} sees {height} values, keeping original");
///     }
///     Err(e) => eprintln!("keeping original: {e}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operand-stack height at an offset differs between two paths reaching it.
    #[error("Stack height mismatch at offset {offset}: expected {expected}, found {found}")]
    StackHeightMismatch {
        /// Linear offset of the instruction
        offset: usize,
        /// Height recorded by the first path that reached the offset
        expected: u32,
        /// Height carried by the conflicting path
        found: u32,
    },

    /// An instruction pops more operands than the stack holds.
    #[error("Stack underflow at offset {offset}: height {height}, instruction pops {pops}")]
    StackUnderflow {
        /// Linear offset of the instruction
        offset: usize,
        /// Height before the instruction
        height: u32,
        /// Number of operands the instruction pops
        pops: u32,
    },

    /// A `return` instruction must see exactly one value on the operand stack.
    #[error("Return at offset {offset} with stack height {height}, expected 1")]
    InvalidReturnHeight {
        /// Linear offset of the return
        offset: usize,
        /// Height before the return
        height: u32,
    },

    /// A block contains no instructions at all.
    #[error("Block {block} is empty")]
    EmptyBlock {
        /// The offending block
        block: BlockId,
    },

    /// Two blocks were declared with the same id.
    #[error("Block {block} is declared twice")]
    DuplicateBlock {
        /// The repeated id
        block: BlockId,
    },

    /// The last instruction of a block does not transfer control.
    #[error("Block {block} does not end in a terminator")]
    MissingTerminator {
        /// The offending block
        block: BlockId,
    },

    /// A terminator appears before the last position of a block.
    #[error("Block {block} has a terminator at position {offset} before its end")]
    MisplacedTerminator {
        /// The offending block
        block: BlockId,
        /// Position of the early terminator within the block
        offset: usize,
    },

    /// A block references (by jump, handler or jump table) a block outside the unit.
    #[error("Block {block} references {target}, which is not part of the function")]
    InvalidBlockReference {
        /// The referencing block
        block: BlockId,
        /// The missing target
        target: BlockId,
    },

    /// A `jump_table` instruction names a constant that is not a jump table.
    #[error("Block {block} offset {offset}: constant {index} is not a jump table")]
    InvalidJumpTable {
        /// The block holding the instruction
        block: BlockId,
        /// Position within the block
        offset: usize,
        /// The constant pool index
        index: u32,
    },

    /// An instruction names a register at or above the function's register count.
    #[error("Block {block} offset {offset}: register {register} is out of range")]
    RegisterOutOfRange {
        /// The offending register
        register: Register,
        /// The block holding the instruction
        block: BlockId,
        /// Position within the block
        offset: usize,
    },

    /// A non-argument register is read before any instruction wrote it.
    #[error("Register {register} read before write in block {block} at offset {offset}")]
    RegisterReadBeforeWrite {
        /// The offending register
        register: Register,
        /// The block holding the read
        block: BlockId,
        /// Position within the block
        offset: usize,
    },

    /// The function has no blocks, so there is no entry.
    #[error("Function has no blocks")]
    EmptyFunction,

    /// A pass broke one of its own invariants.
    ///
    /// This never depends on the input; it indicates a defect in the pass and carries the
    /// source location where it was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the broken invariant
    /// * `file` - Source file where the violation was detected
    /// * `line` - Source line where the violation was detected
    #[error("Invariant violation - {file}:{line}: {message}")]
    InvariantViolation {
        /// The message to be printed for the violation
        message: String,
        /// The source file in which this error occurred
        file: &'static str,
        /// The source line in which this error occurred
        line: u32,
    },
}

impl Error {
    /// Returns `true` for faults caused by the input unit rather than by a pass.
    #[must_use]
    pub fn is_validation_fault(&self) -> bool {
        !matches!(self, Error::InvariantViolation { .. })
    }
}
