//! Human readable rendering of function IR units.
//!
//! Every instruction is printed with its linear offset, mnemonic and decoded operands.
//! Blocks show their handler and whether they are exported; the constant pool is listed
//! after the blocks.
//!
//! ```text
//! function max (args: 2, registers: 2)
//! b0:
//!     0: load_reg r0
//!     1: load_reg r1
//!     2: lt
//!     3: branch b1, b2
//! b1:
//!     4: load_reg r1
//!     5: return
//! ```

use std::fmt;

use crate::ir::{Constant, Function, Instruction};

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Instruction::PushBool(value) => write!(f, " {value}"),
            Instruction::PushInt(value) => write!(f, " {value}"),
            Instruction::PushConst(index)
            | Instruction::GetProp(index)
            | Instruction::SetProp(index) => write!(f, " #{index}"),
            Instruction::LoadReg(reg) | Instruction::StoreReg(reg) | Instruction::Increment(reg) => {
                write!(f, " {reg}")
            }
            Instruction::Move { dst, src } => write!(f, " {dst}, {src}"),
            Instruction::Call { argc } | Instruction::Construct { argc } => write!(f, " {argc}"),
            Instruction::NewArray { count } => write!(f, " {count}"),
            Instruction::Jump { target } => write!(f, " {target}"),
            Instruction::Branch { if_true, if_false } => write!(f, " {if_true}, {if_false}"),
            Instruction::JumpTable { table, default } => write!(f, " #{table}, default {default}"),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(value) => write!(f, "number {value}"),
            Constant::String(value) => write!(f, "string {value:?}"),
            Constant::JumpTable(table) => {
                f.write_str("jump_table {")?;
                for (i, (discriminant, target)) in table.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {discriminant} => {target}")?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "function {} (args: {}, registers: {})",
            self.name(),
            self.arg_count(),
            self.register_count()
        )?;

        let mut offset = 0usize;
        for (id, block) in self.blocks() {
            write!(f, "{id}:")?;
            if block.is_exported() {
                f.write_str(" exported")?;
            }
            if let Some(handler) = block.handler() {
                write!(f, " handler {handler}")?;
            }
            writeln!(f)?;

            for instr in block.instructions() {
                writeln!(f, "    {offset}: {instr}")?;
                offset += 1;
            }
        }

        if !self.constants().is_empty() {
            writeln!(f, "constants:")?;
            for (index, constant) in self.constants().iter().enumerate() {
                writeln!(f, "    #{index}: {constant}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_render_function() {
        let function = FunctionBuilder::new("render", 1, 2).build_with(|f| {
            let table = f.jump_table(&[(0, 1), (7, 2)]);
            f.block(0, |b| {
                b.handler(2).mov(1, 0).load(1).jump_table(table, 1);
            });
            f.block(1, |b| {
                b.push_int(-3).ret();
            });
            f.block(2, |b| {
                b.catch().throw();
            });
        });

        let text = function.to_string();
        let expected = "\
function render (args: 1, registers: 2)
b0: handler b2
    0: move r1, r0
    1: load_reg r1
    2: jump_table #0, default b1
b1: exported
    3: push_int -3
    4: return
b2: exported
    5: catch
    6: throw
constants:
    #0: jump_table { 0 => b1, 7 => b2 }
";
        assert_eq!(text, expected);
    }
}
