//! # vmopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the vmopt library. Import it to get the IR builder, the analyses and the pipeline
//! in one line.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vmopt operations
pub use crate::Error;

/// The result type used throughout vmopt
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Function IR unit and its blocks
pub use crate::ir::{Block, BlockId, Function};

/// Closure-based construction of functions
pub use crate::ir::{BlockBuilder, FunctionBuilder};

/// Instructions and their classification
pub use crate::ir::{Instruction, OpFlags, Opcode, Register, StackBehavior};

/// Constant pool entries
pub use crate::ir::{ConstIndex, Constant, JumpTable};

// ================================================================================================
// Analysis
// ================================================================================================

/// Control flow graph and loops
pub use crate::analysis::{find_back_edges, find_loops, BackEdges, ControlFlowGraph, NaturalLoop};

/// Stack discipline and register liveness
pub use crate::analysis::{compute_liveness, validate_stack, LiveRange, Liveness, StackLayout};

// ================================================================================================
// Compiler
// ================================================================================================

/// The optimization pipeline
pub use crate::compiler::{Pipeline, PipelineConfig, PipelineReport};

/// Pass infrastructure
pub use crate::compiler::{CompilerContext, Pass};

/// Event tracking
pub use crate::compiler::{Event, EventKind, EventLog};
