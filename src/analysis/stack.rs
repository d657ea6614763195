//! Operand-stack discipline validation.
//!
//! Proves that the operand-stack height at every reachable instruction is independent of
//! the path taken to reach it. Offsets are linearized in layout order: the first
//! instruction of the entry block is offset `0`, and every block occupies the offsets
//! following its predecessor in the layout.
//!
//! Heights flow along successor edges with the height after the block's terminator and
//! along handler associations with height `0` (the handler's `catch` pushes the pending
//! exception). Exported blocks that the entry cannot reach are validated as additional
//! roots starting at height `0`.

use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::{
    ir::{BlockId, Function, Instruction},
    Error, Result,
};

/// Per-offset operand-stack heights of a validated function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    heights: Vec<Option<u32>>,
    block_starts: HashMap<BlockId, usize>,
    max_depth: u32,
}

impl StackLayout {
    /// Returns the height before the instruction at `offset`, or `None` if the offset is
    /// unreachable or out of range.
    #[must_use]
    pub fn height_at(&self, offset: usize) -> Option<u32> {
        self.heights.get(offset).copied().flatten()
    }

    /// Returns the linear offset of the first instruction of `block`.
    #[must_use]
    pub fn block_start(&self, block: BlockId) -> Option<usize> {
        self.block_starts.get(&block).copied()
    }

    /// Returns the maximum operand-stack depth over all reachable offsets.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Returns the number of linear offsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heights.len()
    }

    /// Returns `true` if the layout covers no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }
}

/// Validates the operand-stack discipline of `function`.
///
/// # Errors
///
/// - [`Error::StackHeightMismatch`] if two paths reach an offset with different heights
/// - [`Error::StackUnderflow`] if an instruction pops more values than the stack holds
/// - [`Error::InvalidReturnHeight`] if a `return` does not see exactly one value
/// - [`Error::EmptyFunction`], [`Error::EmptyBlock`], [`Error::InvalidBlockReference`] or
///   any error of [`Function::successors`] for malformed input
///
/// # Examples
///
/// ```rust
/// use vmopt::{analysis::validate_stack, ir::FunctionBuilder, Error};
///
/// // The two arms leave different heights behind at the join point
/// let function = FunctionBuilder::new("bad", 1, 1).build_with(|f| {
///     f.block(0, |b| {
///         b.load(0).branch(1, 2);
///     });
///     f.block(1, |b| {
///         b.push_int(1).jump(3);
///     });
///     f.block(2, |b| b.jump(3));
///     f.block(3, |b| {
///         b.ret();
///     });
/// });
///
/// assert!(matches!(validate_stack(&function), Err(Error::StackHeightMismatch { .. })));
/// ```
pub fn validate_stack(function: &Function) -> Result<StackLayout> {
    let entry = function.entry().ok_or(Error::EmptyFunction)?;

    let mut block_starts = HashMap::with_capacity(function.block_count());
    let mut total = 0;
    for (id, block) in function.blocks() {
        if block.is_empty() {
            return Err(Error::EmptyBlock { block: id });
        }
        block_starts.insert(id, total);
        total += block.len();
    }

    let mut validator = StackValidator {
        function,
        block_starts,
        heights: vec![None; total],
        worklist: VecDeque::new(),
        max_depth: 0,
    };

    validator.worklist.push_back((entry, 0));
    validator.drain()?;

    for exported in function.exported_blocks() {
        if validator.height_at_block(exported).is_none() {
            trace!("{}: validating unreached exported block {}", function.name(), exported);
            validator.worklist.push_back((exported, 0));
            validator.drain()?;
        }
    }

    Ok(StackLayout {
        heights: validator.heights,
        block_starts: validator.block_starts,
        max_depth: validator.max_depth,
    })
}

struct StackValidator<'a> {
    function: &'a Function,
    block_starts: HashMap<BlockId, usize>,
    heights: Vec<Option<u32>>,
    worklist: VecDeque<(BlockId, u32)>,
    max_depth: u32,
}

impl StackValidator<'_> {
    fn height_at_block(&self, block: BlockId) -> Option<u32> {
        let start = self.block_starts.get(&block)?;
        self.heights[*start]
    }

    fn drain(&mut self) -> Result<()> {
        while let Some((block, height)) = self.worklist.pop_front() {
            self.visit(block, height)?;
        }
        Ok(())
    }

    fn visit(&mut self, id: BlockId, entry_height: u32) -> Result<()> {
        let function = self.function;
        let block = function.expect_block(id)?;
        let start = self.block_starts[&id];

        if let Some(expected) = self.heights[start] {
            if expected == entry_height {
                return Ok(());
            }
            return Err(Error::StackHeightMismatch {
                offset: start,
                expected,
                found: entry_height,
            });
        }

        let mut height = entry_height;
        self.max_depth = self.max_depth.max(height);

        for (position, instr) in block.instructions().iter().enumerate() {
            let offset = start + position;
            self.heights[offset] = Some(height);

            let behavior = instr.stack_behavior();
            if matches!(instr, Instruction::Return) && height != 1 {
                return Err(Error::InvalidReturnHeight { offset, height });
            }
            if behavior.pops > height {
                return Err(Error::StackUnderflow {
                    offset,
                    height,
                    pops: behavior.pops,
                });
            }

            height = height - behavior.pops + behavior.pushes;
            self.max_depth = self.max_depth.max(height);
        }

        for target in function.successors(id)? {
            self.enqueue(id, target, height)?;
        }
        if let Some(handler) = block.handler() {
            self.enqueue(id, handler, 0)?;
        }
        Ok(())
    }

    fn enqueue(&mut self, from: BlockId, target: BlockId, height: u32) -> Result<()> {
        if !self.block_starts.contains_key(&target) {
            return Err(Error::InvalidBlockReference {
                block: from,
                target,
            });
        }
        self.worklist.push_back((target, height));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::validate_stack,
        ir::{BlockId, FunctionBuilder},
        Error,
    };

    #[test]
    fn test_diamond_heights_agree() {
        let function = FunctionBuilder::new("diamond", 1, 1).build_with(|f| {
            f.block(0, |b| {
                b.push_int(10).load(0).branch(1, 2);
            });
            f.block(1, |b| {
                b.push_int(1).add().jump(3);
            });
            f.block(2, |b| {
                b.push_int(2).mul().jump(3);
            });
            f.block(3, |b| {
                b.ret();
            });
        });

        let layout = validate_stack(&function).unwrap();
        assert_eq!(layout.len(), 10);
        assert_eq!(layout.block_start(BlockId::new(3)), Some(9));
        assert_eq!(layout.height_at(0), Some(0));
        assert_eq!(layout.height_at(2), Some(2));
        assert_eq!(layout.height_at(9), Some(1));
        assert_eq!(layout.max_depth(), 2);
    }

    #[test]
    fn test_mismatch_reports_join_offset() {
        let function = FunctionBuilder::new("bad", 1, 1).build_with(|f| {
            f.block(0, |b| {
                b.load(0).branch(1, 2);
            });
            f.block(1, |b| {
                b.push_int(1).jump(3);
            });
            f.block(2, |b| b.jump(3));
            f.block(3, |b| {
                b.ret();
            });
        });

        // block 1 is dequeued first and records height 1 at block 3 (offset 5)
        assert_eq!(
            validate_stack(&function),
            Err(Error::StackHeightMismatch {
                offset: 5,
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn test_return_needs_exactly_one_value() {
        let function = FunctionBuilder::new("two", 0, 0).build_with(|f| {
            f.block(0, |b| {
                b.push_int(1).push_int(2).ret();
            });
        });
        assert_eq!(
            validate_stack(&function),
            Err(Error::InvalidReturnHeight {
                offset: 2,
                height: 2
            })
        );
    }

    #[test]
    fn test_underflow() {
        let function = FunctionBuilder::new("underflow", 0, 0).build_with(|f| {
            f.block(0, |b| {
                b.push_int(1).add().ret();
            });
        });
        assert_eq!(
            validate_stack(&function),
            Err(Error::StackUnderflow {
                offset: 1,
                height: 1,
                pops: 2
            })
        );
    }

    #[test]
    fn test_handler_starts_empty() {
        let function = FunctionBuilder::new("try", 0, 0).build_with(|f| {
            f.block(0, |b| {
                b.push_int(1).push_int(0).div().handler(1).ret();
            });
            f.block(1, |b| {
                b.catch().ret();
            });
        });

        let layout = validate_stack(&function).unwrap();
        assert_eq!(layout.height_at(4), Some(0));
        assert_eq!(layout.height_at(5), Some(1));
    }

    #[test]
    fn test_unreached_exported_block_is_validated() {
        let function = FunctionBuilder::new("pinned", 0, 0).build_with(|f| {
            f.block(0, |b| {
                b.push_null().ret();
            });
            f.block(1, |b| {
                b.pin().pop().push_null().ret();
            });
        });

        assert_eq!(
            validate_stack(&function),
            Err(Error::StackUnderflow {
                offset: 2,
                height: 0,
                pops: 1
            })
        );
    }

    #[test]
    fn test_jump_table_targets_share_height() {
        let function = FunctionBuilder::new("switch", 1, 1).build_with(|f| {
            let table = f.jump_table(&[(0, 1), (1, 2)]);
            f.block(0, |b| {
                b.push_int(7).load(0).jump_table(table, 2);
            });
            f.block(1, |b| b.jump(2));
            f.block(2, |b| {
                b.ret();
            });
        });

        let layout = validate_stack(&function).unwrap();
        assert_eq!(layout.height_at(3), Some(1));
        assert_eq!(layout.height_at(4), Some(1));
    }
}
