//! Stack-oriented bytecode IR.
//!
//! A [`Function`] owns an arena of [`Block`]s addressed by [`BlockId`], an argument and
//! register count, and a constant pool of [`Constant`]s (including [`JumpTable`]s). Each
//! block is an ordered run of [`Instruction`]s ending in exactly one terminator.
//!
//! # Key Components
//!
//! - [`Instruction`] / [`Opcode`] - Closed instruction set with static stack effects
//! - [`Block`] / [`BlockId`] - Basic blocks and their stable handles
//! - [`Function`] - The unit of compilation
//! - [`FunctionBuilder`] - Closure-based construction, producer of the exported flag
//!
//! Functions implement [`std::fmt::Display`] for debug printing.

mod block;
mod builder;
mod constant;
mod display;
mod function;
mod instruction;

pub use block::{Block, BlockId};
pub use builder::{BlockBuilder, FunctionBuilder};
pub use constant::{Constant, JumpTable};
pub use function::Function;
pub use instruction::{ConstIndex, Instruction, OpFlags, Opcode, Register, StackBehavior};
