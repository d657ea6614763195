//! Instruction model for the stack-oriented bytecode IR.
//!
//! Every instruction is a variant of the closed [`Instruction`] sum type. All static
//! queries - stack effect, control classification, successor enumeration, register
//! operands and whether the instruction can raise - are exhaustive matches, so adding a
//! variant forces every query to be revisited.
//!
//! # Key Components
//!
//! - [`Instruction`] - The instruction sum type, operands included
//! - [`Opcode`] - Fieldless discriminant of [`Instruction`] (derived)
//! - [`OpFlags`] - Static per-opcode properties
//! - [`StackBehavior`] - Operand-stack pops, pushes and net effect
//! - [`Register`] - A virtual (or, after reduction, physical) register

use std::fmt;

use bitflags::bitflags;
use strum::{EnumDiscriminants, EnumIter, IntoStaticStr};

use crate::ir::BlockId;

/// Index into a function's constant pool.
pub type ConstIndex = u32;

/// A register operand.
///
/// Before register reduction the id names a virtual register, afterwards a physical slot.
/// Registers below the function's argument count hold the parameters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(pub u32);

impl Register {
    /// Returns the raw register number.
    #[must_use]
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Register({})", self.0)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

bitflags! {
    /// Static properties of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u8 {
        /// Ends a block; must be the last instruction.
        const TERMINATOR = 0x01;
        /// Transfers control to at least one block of the function.
        const BRANCH = 0x02;
        /// May raise an exception, handing control to the block's handler.
        const THROWS = 0x04;
        /// Reads at least one register.
        const READS_REGISTER = 0x08;
        /// Writes at least one register.
        const WRITES_REGISTER = 0x10;
    }
}

/// Stack effect of an instruction.
///
/// Describes how an instruction modifies the operand stack.
///
/// ```rust
/// use vmopt::ir::StackBehavior;
///
/// // An instruction that pops 2 values and pushes 1 (like 'add')
/// let add = StackBehavior::new(2, 1);
/// assert_eq!(add.net_effect, -1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of items popped from stack
    pub pops: u32,
    /// Number of items pushed to stack
    pub pushes: u32,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i64,
}

impl StackBehavior {
    /// Creates a stack behavior from its pop and push counts.
    #[must_use]
    pub const fn new(pops: u32, pushes: u32) -> Self {
        Self {
            pops,
            pushes,
            net_effect: pushes as i64 - pops as i64,
        }
    }
}

/// A single bytecode instruction.
///
/// Instructions are owned by exactly one [`Block`](crate::ir::Block). Control
/// instructions hold [`BlockId`] handles rather than references, so a pass can redirect a
/// target in place with [`Instruction::redirect_target`].
#[derive(Debug, Clone, PartialEq, Eq, EnumDiscriminants, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[strum_discriminants(name(Opcode), derive(Hash, EnumIter))]
#[strum_discriminants(doc = "Fieldless discriminant of [`Instruction`]")]
pub enum Instruction {
    /// Push `undefined`
    PushUndefined,
    /// Push `null`
    PushNull,
    /// Push a boolean literal
    PushBool(bool),
    /// Push a small integer literal
    PushInt(i32),
    /// Push a constant from the pool
    PushConst(ConstIndex),
    /// Discard the top of the stack
    Pop,
    /// Duplicate the top of the stack
    Dup,
    /// Swap the two topmost values
    Swap,
    /// Push the value of a register
    LoadReg(Register),
    /// Pop into a register
    StoreReg(Register),
    /// Copy one register into another
    Move {
        /// Written register
        dst: Register,
        /// Read register
        src: Register,
    },
    /// Numerically increment a register in place
    Increment(Register),
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,
    /// Loose equality
    Eq,
    /// Strict equality
    StrictEq,
    /// `a < b`
    Lt,
    /// `a <= b`
    Le,
    /// `a & b`
    BitAnd,
    /// `a | b`
    BitOr,
    /// `a << b`
    Shl,
    /// Numeric negation
    Neg,
    /// Logical not
    Not,
    /// Type tag of the top value as a string
    Typeof,
    /// Pop an object, push its named property (name from the constant pool)
    GetProp(ConstIndex),
    /// Pop an object and a value, store the named property
    SetProp(ConstIndex),
    /// Pop an object and a key, push the element
    GetElem,
    /// Pop an object, a key and a value, store the element
    SetElem,
    /// Pop callee, receiver and `argc` arguments, push the result
    Call {
        /// Number of arguments
        argc: u32,
    },
    /// Pop constructor and `argc` arguments, push the new object
    Construct {
        /// Number of arguments
        argc: u32,
    },
    /// Push a fresh empty object
    NewObject,
    /// Pop `count` elements, push an array holding them
    NewArray {
        /// Number of elements
        count: u32,
    },
    /// Push the exception currently being handled
    Catch,
    /// Continue at `target`
    Jump {
        /// The target block
        target: BlockId,
    },
    /// Pop a condition and continue at `if_true` or `if_false`
    Branch {
        /// Target when the condition is truthy
        if_true: BlockId,
        /// Target when the condition is falsy
        if_false: BlockId,
    },
    /// Pop a discriminant and dispatch through a jump table of the constant pool
    JumpTable {
        /// Constant pool index of the [`JumpTable`](crate::ir::JumpTable)
        table: ConstIndex,
        /// Target for discriminants missing from the table
        default: BlockId,
    },
    /// Pop the return value and leave the function
    Return,
    /// Pop a value and raise it
    Throw,
}

impl Opcode {
    /// Returns the static properties of this opcode.
    #[must_use]
    pub const fn flags(self) -> OpFlags {
        match self {
            Opcode::PushUndefined
            | Opcode::PushNull
            | Opcode::PushBool
            | Opcode::PushInt
            | Opcode::PushConst
            | Opcode::Pop
            | Opcode::Dup
            | Opcode::Swap
            | Opcode::Not
            | Opcode::Typeof
            | Opcode::NewObject
            | Opcode::NewArray
            | Opcode::Catch => OpFlags::empty(),
            Opcode::LoadReg => OpFlags::READS_REGISTER,
            Opcode::StoreReg => OpFlags::WRITES_REGISTER,
            Opcode::Move => OpFlags::READS_REGISTER.union(OpFlags::WRITES_REGISTER),
            Opcode::Increment => OpFlags::READS_REGISTER
                .union(OpFlags::WRITES_REGISTER)
                .union(OpFlags::THROWS),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::Eq
            | Opcode::StrictEq
            | Opcode::Lt
            | Opcode::Le
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::Shl
            | Opcode::Neg
            | Opcode::GetProp
            | Opcode::SetProp
            | Opcode::GetElem
            | Opcode::SetElem
            | Opcode::Call
            | Opcode::Construct => OpFlags::THROWS,
            Opcode::Jump | Opcode::Branch | Opcode::JumpTable => {
                OpFlags::TERMINATOR.union(OpFlags::BRANCH)
            }
            Opcode::Return => OpFlags::TERMINATOR,
            Opcode::Throw => OpFlags::TERMINATOR.union(OpFlags::THROWS),
        }
    }
}

impl Instruction {
    /// Returns the fieldless opcode of this instruction.
    #[must_use]
    #[inline]
    pub fn opcode(&self) -> Opcode {
        Opcode::from(self)
    }

    /// Returns the lowercase mnemonic used by the printer.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns the static properties of this instruction's opcode.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> OpFlags {
        self.opcode().flags()
    }

    /// Returns `true` if this instruction ends a block.
    #[must_use]
    #[inline]
    pub fn is_terminator(&self) -> bool {
        self.flags().contains(OpFlags::TERMINATOR)
    }

    /// Returns `true` if this instruction may raise an exception.
    #[must_use]
    #[inline]
    pub fn can_throw(&self) -> bool {
        self.flags().contains(OpFlags::THROWS)
    }

    /// Returns the operand-stack effect of this instruction.
    #[must_use]
    pub fn stack_behavior(&self) -> StackBehavior {
        match self {
            Instruction::PushUndefined
            | Instruction::PushNull
            | Instruction::PushBool(_)
            | Instruction::PushInt(_)
            | Instruction::PushConst(_)
            | Instruction::LoadReg(_)
            | Instruction::NewObject
            | Instruction::Catch => StackBehavior::new(0, 1),
            Instruction::Pop
            | Instruction::StoreReg(_)
            | Instruction::Branch { .. }
            | Instruction::JumpTable { .. }
            | Instruction::Return
            | Instruction::Throw => StackBehavior::new(1, 0),
            Instruction::Dup => StackBehavior::new(1, 2),
            Instruction::Swap => StackBehavior::new(2, 2),
            Instruction::Move { .. } | Instruction::Increment(_) | Instruction::Jump { .. } => {
                StackBehavior::new(0, 0)
            }
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod
            | Instruction::Eq
            | Instruction::StrictEq
            | Instruction::Lt
            | Instruction::Le
            | Instruction::BitAnd
            | Instruction::BitOr
            | Instruction::Shl
            | Instruction::GetElem => StackBehavior::new(2, 1),
            Instruction::Neg | Instruction::Not | Instruction::Typeof | Instruction::GetProp(_) => {
                StackBehavior::new(1, 1)
            }
            Instruction::SetProp(_) => StackBehavior::new(2, 0),
            Instruction::SetElem => StackBehavior::new(3, 0),
            Instruction::Call { argc } => StackBehavior::new(argc.saturating_add(2), 1),
            Instruction::Construct { argc } => StackBehavior::new(argc.saturating_add(1), 1),
            Instruction::NewArray { count } => StackBehavior::new(*count, 1),
        }
    }

    /// Returns the blocks this instruction can branch to directly.
    ///
    /// Jump-table entries live in the constant pool; use
    /// [`Function::successors`](crate::ir::Function::successors) to obtain the complete
    /// successor list of a block. For a `jump_table` this returns only the default target.
    #[must_use]
    pub fn direct_targets(&self) -> Vec<BlockId> {
        if !self.flags().contains(OpFlags::BRANCH) {
            return vec![];
        }
        match self {
            Instruction::Jump { target } => vec![*target],
            Instruction::Branch { if_true, if_false } => vec![*if_true, *if_false],
            Instruction::JumpTable { default, .. } => vec![*default],
            _ => vec![],
        }
    }

    /// Redirects direct control flow targets from `old_target` to `new_target`.
    ///
    /// Jump-table entries are redirected through
    /// [`JumpTable::redirect_target`](crate::ir::JumpTable::redirect_target).
    ///
    /// # Returns
    ///
    /// `true` if any target was changed, `false` otherwise.
    pub fn redirect_target(&mut self, old_target: BlockId, new_target: BlockId) -> bool {
        if old_target == new_target {
            return false;
        }

        match self {
            Instruction::Jump { target } | Instruction::JumpTable {
                default: target, ..
            } => {
                if *target == old_target {
                    *target = new_target;
                    true
                } else {
                    false
                }
            }
            Instruction::Branch { if_true, if_false } => {
                let mut changed = false;
                if *if_true == old_target {
                    *if_true = new_target;
                    changed = true;
                }
                if *if_false == old_target {
                    *if_false = new_target;
                    changed = true;
                }
                changed
            }
            _ => false,
        }
    }

    /// Returns the register read by this instruction.
    #[must_use]
    pub fn reads(&self) -> Option<Register> {
        if !self.flags().contains(OpFlags::READS_REGISTER) {
            return None;
        }
        match self {
            Instruction::LoadReg(reg) | Instruction::Increment(reg) => Some(*reg),
            Instruction::Move { src, .. } => Some(*src),
            _ => None,
        }
    }

    /// Returns the register written by this instruction.
    #[must_use]
    pub fn writes(&self) -> Option<Register> {
        if !self.flags().contains(OpFlags::WRITES_REGISTER) {
            return None;
        }
        match self {
            Instruction::StoreReg(reg) | Instruction::Increment(reg) => Some(*reg),
            Instruction::Move { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Rewrites every register operand through `map`.
    ///
    /// The read and the write operand are mapped separately, so an instruction such as
    /// `move` can end up with different physical slots for its two operands.
    pub fn map_registers<R, W>(&mut self, mut read: R, mut write: W)
    where
        R: FnMut(Register) -> Register,
        W: FnMut(Register) -> Register,
    {
        match self {
            Instruction::LoadReg(reg) => *reg = read(*reg),
            Instruction::StoreReg(reg) => *reg = write(*reg),
            Instruction::Increment(reg) => {
                let mapped = read(*reg);
                let written = write(*reg);
                debug_assert_eq!(mapped, written);
                *reg = written;
            }
            Instruction::Move { dst, src } => {
                *src = read(*src);
                *dst = write(*dst);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_terminators_are_exactly_control_transfers() {
        for opcode in Opcode::iter() {
            let terminator = opcode.flags().contains(OpFlags::TERMINATOR);
            let expected = matches!(
                opcode,
                Opcode::Jump | Opcode::Branch | Opcode::JumpTable | Opcode::Return | Opcode::Throw
            );
            assert_eq!(terminator, expected, "{opcode:?}");
        }
    }

    #[test]
    fn test_stack_behavior() {
        assert_eq!(Instruction::Add.stack_behavior().net_effect, -1);
        assert_eq!(Instruction::Dup.stack_behavior().net_effect, 1);
        assert_eq!(Instruction::Swap.stack_behavior().net_effect, 0);

        let call = Instruction::Call { argc: 3 }.stack_behavior();
        assert_eq!(call.pops, 5);
        assert_eq!(call.pushes, 1);
        assert_eq!(call.net_effect, -4);

        let array = Instruction::NewArray { count: 0 }.stack_behavior();
        assert_eq!(array.net_effect, 1);
    }

    #[test]
    fn test_redirect_branch_both_arms() {
        let mut instr = Instruction::Branch {
            if_true: BlockId::new(1),
            if_false: BlockId::new(1),
        };
        assert!(instr.redirect_target(BlockId::new(1), BlockId::new(4)));
        assert_eq!(
            instr,
            Instruction::Branch {
                if_true: BlockId::new(4),
                if_false: BlockId::new(4),
            }
        );
        assert!(!instr.redirect_target(BlockId::new(1), BlockId::new(4)));
    }

    #[test]
    fn test_redirect_jump_table_default() {
        let mut instr = Instruction::JumpTable {
            table: 0,
            default: BlockId::new(2),
        };
        assert!(instr.redirect_target(BlockId::new(2), BlockId::new(3)));
        assert_eq!(instr.direct_targets(), vec![BlockId::new(3)]);
    }

    #[test]
    fn test_register_operands() {
        let mv = Instruction::Move {
            dst: Register(3),
            src: Register(1),
        };
        assert_eq!(mv.reads(), Some(Register(1)));
        assert_eq!(mv.writes(), Some(Register(3)));
        assert!(!mv.can_throw());
        assert!(Instruction::Increment(Register(0)).can_throw());

        let mut store = Instruction::StoreReg(Register(7));
        store.map_registers(|r| r, |_| Register(2));
        assert_eq!(store, Instruction::StoreReg(Register(2)));
    }

    #[test]
    fn test_flags_agree_with_operands() {
        let r = Register(1);
        let target = BlockId::new(2);
        let samples = [
            Instruction::PushInt(1),
            Instruction::LoadReg(r),
            Instruction::StoreReg(r),
            Instruction::Move { dst: r, src: r },
            Instruction::Increment(r),
            Instruction::Add,
            Instruction::Jump { target },
            Instruction::Branch {
                if_true: target,
                if_false: target,
            },
            Instruction::JumpTable {
                table: 0,
                default: target,
            },
            Instruction::Return,
            Instruction::Throw,
        ];
        for instr in samples {
            let flags = instr.flags();
            assert_eq!(
                flags.contains(OpFlags::READS_REGISTER),
                instr.reads().is_some(),
                "{instr:?}"
            );
            assert_eq!(
                flags.contains(OpFlags::WRITES_REGISTER),
                instr.writes().is_some(),
                "{instr:?}"
            );
            assert_eq!(
                flags.contains(OpFlags::BRANCH),
                !instr.direct_targets().is_empty(),
                "{instr:?}"
            );
        }
    }

    #[test]
    fn test_mnemonics() {
        let table = Instruction::JumpTable {
            table: 0,
            default: BlockId::new(0),
        };
        assert_eq!(table.mnemonic(), "jump_table");
        assert_eq!(Instruction::PushUndefined.mnemonic(), "push_undefined");
        assert_eq!(Instruction::PushInt(4).opcode(), Opcode::PushInt);
    }
}
