//! Closure-based construction of function IR units.
//!
//! [`FunctionBuilder`] is the upstream interface of the optimizer: it is how a lowering
//! stage (or a test) hands a function to the pipeline. It is also the sole producer of the
//! `exported` block flag:
//!
//! - every block named by a jump-table entry is exported
//! - every block used as a handler is exported
//! - [`BlockBuilder::pin`] exports a block for any other external reference
//!
//! Blocks are named by the index passed to [`FunctionBuilder::block`], which becomes their
//! [`BlockId`]. The first declared block is the entry.
//!
//! ```rust
//! use vmopt::ir::{BlockId, FunctionBuilder};
//!
//! let function = FunctionBuilder::new("max", 2, 2).build_with(|f| {
//!     f.block(0, |b| {
//!         b.load(0).load(1).lt().branch(1, 2);
//!     });
//!     f.block(1, |b| {
//!         b.load(1).ret();
//!     });
//!     f.block(2, |b| {
//!         b.load(0).ret();
//!     });
//! });
//!
//! assert_eq!(function.entry(), Some(BlockId::new(0)));
//! assert!(function.validate().is_ok());
//! ```

use std::collections::BTreeSet;

use crate::{
    ir::{Block, BlockId, ConstIndex, Constant, Function, Instruction, JumpTable, Register},
    Error, Result,
};

/// Builds a [`Function`] from closures.
#[derive(Debug)]
pub struct FunctionBuilder {
    function: Function,
    pinned: BTreeSet<BlockId>,
    error: Option<Error>,
}

impl FunctionBuilder {
    /// Starts a new function.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in diagnostics
    /// * `arg_count` - Number of parameter registers
    /// * `register_count` - Exclusive upper bound of register ids
    #[must_use]
    pub fn new(name: impl Into<String>, arg_count: u32, register_count: u32) -> Self {
        Self {
            function: Function::new(name, arg_count, register_count),
            pinned: BTreeSet::new(),
            error: None,
        }
    }

    /// Runs `build` against this builder and returns the finished function.
    ///
    /// Exported flags are assigned after `build` returns, so a jump table may name blocks
    /// that are declared later. A repeated block declaration is logged and dropped; use
    /// [`try_build_with`](Self::try_build_with) to have it reported instead.
    pub fn build_with<F>(mut self, build: F) -> Function
    where
        F: FnOnce(&mut FunctionBuilder),
    {
        build(&mut self);
        self.finish()
    }

    /// Like [`build_with`](Self::build_with), but fails on the first malformed declaration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateBlock`] if a block index is declared more than once.
    pub fn try_build_with<F>(mut self, build: F) -> Result<Function>
    where
        F: FnOnce(&mut FunctionBuilder),
    {
        build(&mut self);
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(self.finish()),
        }
    }

    /// Declares a block with the given index; the first declared block is the entry.
    ///
    /// Only the first declaration of an index is kept. Later ones are logged, and
    /// [`try_build_with`](Self::try_build_with) turns them into an error.
    pub fn block<F>(&mut self, index: usize, build: F)
    where
        F: FnOnce(&mut BlockBuilder),
    {
        let mut builder = BlockBuilder::default();
        build(&mut builder);

        let id = BlockId::new(index);
        let mut block = Block::new(builder.instructions);
        block.set_handler(builder.handler);
        match self.function.insert_block(id, block) {
            Ok(()) if builder.pinned => {
                self.pinned.insert(id);
            }
            Ok(()) => {}
            Err(e) => {
                log::warn!("{}: {e}", self.function.name());
                self.error.get_or_insert(e);
            }
        }
    }

    /// Adds a jump table to the constant pool and returns its index.
    ///
    /// # Arguments
    ///
    /// * `entries` - `(discriminant, block index)` pairs
    pub fn jump_table(&mut self, entries: &[(i64, usize)]) -> ConstIndex {
        let table: JumpTable = entries
            .iter()
            .map(|&(discriminant, target)| (discriminant, BlockId::new(target)))
            .collect();
        self.function.add_constant(Constant::JumpTable(table))
    }

    /// Adds a constant to the pool and returns its index.
    pub fn constant(&mut self, constant: Constant) -> ConstIndex {
        self.function.add_constant(constant)
    }

    fn finish(mut self) -> Function {
        let mut exported: BTreeSet<BlockId> = std::mem::take(&mut self.pinned);
        for table in self.function.jump_tables() {
            exported.extend(table.targets());
        }
        for (_, block) in self.function.blocks() {
            exported.extend(block.handler());
        }

        for id in exported {
            if let Some(block) = self.function.block_mut(id) {
                block.set_exported(true);
            }
        }
        self.function
    }
}

/// Appends instructions to one block.
///
/// Non-terminating instructions return `&mut Self` for chaining; terminators end the chain.
#[derive(Debug, Default)]
pub struct BlockBuilder {
    instructions: Vec<Instruction>,
    handler: Option<BlockId>,
    pinned: bool,
}

macro_rules! simple_ops {
    ($($(#[$doc:meta])* $name:ident => $instr:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self) -> &mut Self {
                self.op($instr)
            }
        )*
    };
}

impl BlockBuilder {
    /// Appends an arbitrary instruction.
    pub fn op(&mut self, instr: Instruction) -> &mut Self {
        self.instructions.push(instr);
        self
    }

    /// Sets the block's exception handler; the handler becomes exported.
    pub fn handler(&mut self, handler: usize) -> &mut Self {
        self.handler = Some(BlockId::new(handler));
        self
    }

    /// Marks the block exported regardless of how it is referenced.
    pub fn pin(&mut self) -> &mut Self {
        self.pinned = true;
        self
    }

    simple_ops! {
        /// `push_undefined`
        push_undefined => Instruction::PushUndefined;
        /// `push_null`
        push_null => Instruction::PushNull;
        /// `pop`
        pop => Instruction::Pop;
        /// `dup`
        dup => Instruction::Dup;
        /// `swap`
        swap => Instruction::Swap;
        /// `add`
        add => Instruction::Add;
        /// `sub`
        sub => Instruction::Sub;
        /// `mul`
        mul => Instruction::Mul;
        /// `div`
        div => Instruction::Div;
        /// `mod`
        rem => Instruction::Mod;
        /// `eq`
        eq => Instruction::Eq;
        /// `strict_eq`
        strict_eq => Instruction::StrictEq;
        /// `lt`
        lt => Instruction::Lt;
        /// `le`
        le => Instruction::Le;
        /// `bit_and`
        bit_and => Instruction::BitAnd;
        /// `bit_or`
        bit_or => Instruction::BitOr;
        /// `shl`
        shl => Instruction::Shl;
        /// `neg`
        neg => Instruction::Neg;
        /// `not`
        not => Instruction::Not;
        /// `typeof`
        type_of => Instruction::Typeof;
        /// `get_elem`
        get_elem => Instruction::GetElem;
        /// `set_elem`
        set_elem => Instruction::SetElem;
        /// `new_object`
        new_object => Instruction::NewObject;
        /// `catch`
        catch => Instruction::Catch;
    }

    /// `push_bool`
    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.op(Instruction::PushBool(value))
    }

    /// `push_int`
    pub fn push_int(&mut self, value: i32) -> &mut Self {
        self.op(Instruction::PushInt(value))
    }

    /// `push_const`
    pub fn push_const(&mut self, index: ConstIndex) -> &mut Self {
        self.op(Instruction::PushConst(index))
    }

    /// `load_reg`
    pub fn load(&mut self, register: u32) -> &mut Self {
        self.op(Instruction::LoadReg(Register(register)))
    }

    /// `store_reg`
    pub fn store(&mut self, register: u32) -> &mut Self {
        self.op(Instruction::StoreReg(Register(register)))
    }

    /// `move dst, src`
    pub fn mov(&mut self, dst: u32, src: u32) -> &mut Self {
        self.op(Instruction::Move {
            dst: Register(dst),
            src: Register(src),
        })
    }

    /// `increment`
    pub fn inc(&mut self, register: u32) -> &mut Self {
        self.op(Instruction::Increment(Register(register)))
    }

    /// `get_prop`
    pub fn get_prop(&mut self, name: ConstIndex) -> &mut Self {
        self.op(Instruction::GetProp(name))
    }

    /// `set_prop`
    pub fn set_prop(&mut self, name: ConstIndex) -> &mut Self {
        self.op(Instruction::SetProp(name))
    }

    /// `call`
    pub fn call(&mut self, argc: u32) -> &mut Self {
        self.op(Instruction::Call { argc })
    }

    /// `construct`
    pub fn construct(&mut self, argc: u32) -> &mut Self {
        self.op(Instruction::Construct { argc })
    }

    /// `new_array`
    pub fn new_array(&mut self, count: u32) -> &mut Self {
        self.op(Instruction::NewArray { count })
    }

    /// Terminates with `jump`.
    pub fn jump(&mut self, target: usize) {
        self.op(Instruction::Jump {
            target: BlockId::new(target),
        });
    }

    /// Terminates with `branch`.
    pub fn branch(&mut self, if_true: usize, if_false: usize) {
        self.op(Instruction::Branch {
            if_true: BlockId::new(if_true),
            if_false: BlockId::new(if_false),
        });
    }

    /// Terminates with `jump_table`.
    pub fn jump_table(&mut self, table: ConstIndex, default: usize) {
        self.op(Instruction::JumpTable {
            table,
            default: BlockId::new(default),
        });
    }

    /// Terminates with `return`.
    pub fn ret(&mut self) {
        self.op(Instruction::Return);
    }

    /// Terminates with `throw`.
    pub fn throw(&mut self) {
        self.op(Instruction::Throw);
    }
}
