//! The function IR unit: the unit of compilation.

use std::collections::HashSet;

use crate::{
    ir::{Block, BlockId, ConstIndex, Constant, Instruction, JumpTable},
    Error, Result,
};

/// One function body: its blocks, register file shape and constant pool.
///
/// Blocks live in an arena addressed by [`BlockId`]. The *layout* is the ordered list of
/// live blocks; its first element is the entry block. Removing a block leaves a tombstone
/// in the arena, so the handles of all remaining blocks stay valid.
///
/// Registers `[0, arg_count)` bind the parameters. `register_count` is the exclusive upper
/// bound of the register ids used by the instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    arg_count: u32,
    register_count: u32,
    constants: Vec<Constant>,
    blocks: Vec<Option<Block>>,
    layout: Vec<BlockId>,
}

impl Function {
    /// Creates an empty function.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in diagnostics
    /// * `arg_count` - Number of parameter registers
    /// * `register_count` - Exclusive upper bound of register ids
    #[must_use]
    pub fn new(name: impl Into<String>, arg_count: u32, register_count: u32) -> Self {
        Self {
            name: name.into(),
            arg_count,
            register_count,
            constants: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Returns the function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of parameter registers.
    #[must_use]
    pub fn arg_count(&self) -> u32 {
        self.arg_count
    }

    /// Returns the exclusive upper bound of register ids.
    #[must_use]
    pub fn register_count(&self) -> u32 {
        self.register_count
    }

    /// Sets the register count after register reduction.
    pub fn set_register_count(&mut self, register_count: u32) {
        self.register_count = register_count;
    }

    /// Returns the constant pool.
    #[must_use]
    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    /// Appends a constant and returns its index.
    pub fn add_constant(&mut self, constant: Constant) -> ConstIndex {
        self.constants.push(constant);
        // Pools beyond u32::MAX entries cannot be addressed by the instruction set
        ConstIndex::try_from(self.constants.len() - 1).unwrap_or(ConstIndex::MAX)
    }

    /// Returns the jump table stored at `index`, if that constant is one.
    #[must_use]
    pub fn jump_table(&self, index: ConstIndex) -> Option<&JumpTable> {
        self.constants
            .get(index as usize)
            .and_then(Constant::as_jump_table)
    }

    /// Iterates over all jump tables of the constant pool.
    pub fn jump_tables(&self) -> impl Iterator<Item = &JumpTable> {
        self.constants.iter().filter_map(Constant::as_jump_table)
    }

    /// Appends a block to the arena and to the end of the layout.
    pub fn add_block(&mut self, block: Block) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Some(block));
        self.layout.push(id);
        id
    }

    /// Places `block` at a specific arena slot, growing the arena with tombstones as
    /// needed, and appends it to the layout.
    ///
    /// Used by the builder so fixtures can name their blocks. Fails if the slot is taken.
    pub(crate) fn insert_block(&mut self, id: BlockId, block: Block) -> Result<()> {
        if self.blocks.len() <= id.index() {
            self.blocks.resize_with(id.index() + 1, || None);
        }
        let slot = &mut self.blocks[id.index()];
        if slot.is_some() {
            return Err(Error::DuplicateBlock { block: id });
        }
        *slot = Some(block);
        self.layout.push(id);
        Ok(())
    }

    /// Returns `true` if `id` names a live block.
    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.index()), Some(Some(_)))
    }

    /// Returns the block for `id`, if it is live.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns mutable access to the block for `id`, if it is live.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Returns the block for `id` or an invariant violation.
    pub(crate) fn expect_block(&self, id: BlockId) -> Result<&Block> {
        self.block(id)
            .ok_or_else(|| invariant_error!("block {} is not part of {}", id, self.name))
    }

    /// Returns the ordered list of live blocks; the first one is the entry.
    #[must_use]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Iterates over the live blocks in layout order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.layout
            .iter()
            .filter_map(|&id| self.block(id).map(|block| (id, block)))
    }

    /// Returns the number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.layout.len()
    }

    /// Returns the total number of instructions over all live blocks.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.blocks().map(|(_, block)| block.len()).sum()
    }

    /// Returns the entry block, or `None` for an empty function.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Iterates over the exported blocks in layout order.
    pub fn exported_blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks()
            .filter(|(_, block)| block.is_exported())
            .map(|(id, _)| id)
    }

    /// Replaces the layout with a permutation of the live blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if `layout` names a dead block, names a block
    /// twice or omits a live block.
    pub fn reorder(&mut self, layout: Vec<BlockId>) -> Result<()> {
        let mut seen = HashSet::with_capacity(layout.len());
        for &id in &layout {
            if !self.contains(id) || !seen.insert(id) {
                return Err(invariant_error!("invalid layout entry {}", id));
            }
        }
        if seen.len() != self.layout.len() {
            return Err(invariant_error!(
                "layout lists {} blocks, function has {}",
                seen.len(),
                self.layout.len()
            ));
        }

        self.layout = layout;
        Ok(())
    }

    /// Moves `id` to the front of the layout, making it the entry block.
    pub(crate) fn make_entry(&mut self, id: BlockId) {
        if let Some(pos) = self.layout.iter().position(|&b| b == id) {
            let block = self.layout.remove(pos);
            self.layout.insert(0, block);
        }
    }

    /// Removes a block, leaving a tombstone in its arena slot.
    ///
    /// References to the removed block held by other blocks are not touched; callers
    /// redirect them first.
    pub fn remove_block(&mut self, id: BlockId) -> Option<Block> {
        let block = self.blocks.get_mut(id.index())?.take()?;
        self.layout.retain(|&b| b != id);
        Some(block)
    }

    /// Returns the successors of a block in instruction order.
    ///
    /// For a `jump_table` terminator these are the table entries in discriminant order
    /// followed by the default target. Duplicates are preserved; handler edges are not
    /// successors.
    ///
    /// # Errors
    ///
    /// - [`Error::InvariantViolation`] if `id` is not a live block
    /// - [`Error::MissingTerminator`] if the block does not end in a terminator
    /// - [`Error::InvalidJumpTable`] if a `jump_table` names a constant that is not a table
    pub fn successors(&self, id: BlockId) -> Result<Vec<BlockId>> {
        let block = self.expect_block(id)?;
        let terminator = block
            .terminator()
            .ok_or(Error::MissingTerminator { block: id })?;

        match terminator {
            Instruction::JumpTable { table, default } => {
                let entries = self.jump_table(*table).ok_or(Error::InvalidJumpTable {
                    block: id,
                    offset: block.len() - 1,
                    index: *table,
                })?;
                let mut targets: Vec<BlockId> = entries.targets().collect();
                targets.push(*default);
                Ok(targets)
            }
            other => Ok(other.direct_targets()),
        }
    }

    /// Rewrites every reference to `old` so it points at `new`.
    ///
    /// This covers branch targets, handler references, jump-table entries of the constant
    /// pool and, if `old` is the entry block, the entry position of the layout.
    ///
    /// # Returns
    ///
    /// The number of rewritten references.
    pub fn redirect_references(&mut self, old: BlockId, new: BlockId) -> usize {
        if old == new {
            return 0;
        }

        let mut rewritten = 0;
        for block in self.blocks.iter_mut().flatten() {
            if block.redirect_target(old, new) {
                rewritten += 1;
            }
        }
        for constant in &mut self.constants {
            if let Some(table) = constant.as_jump_table_mut() {
                rewritten += table.redirect_target(old, new);
            }
        }
        if self.entry() == Some(old) && self.contains(new) {
            self.make_entry(new);
            rewritten += 1;
        }
        rewritten
    }

    /// Checks the structural invariants every pass relies on.
    ///
    /// A well-formed function has at least one block; every block is non-empty and ends in
    /// its only terminator; every branch, handler and jump-table target is a live block;
    /// every `jump_table` names a jump-table constant and every register is below the
    /// register count.
    ///
    /// # Errors
    ///
    /// Returns the first validation fault found, scanning in layout order.
    pub fn validate(&self) -> Result<()> {
        if self.layout.is_empty() {
            return Err(Error::EmptyFunction);
        }

        for (id, block) in self.blocks() {
            if block.is_empty() {
                return Err(Error::EmptyBlock { block: id });
            }

            let last = block.len() - 1;
            for (offset, instr) in block.instructions().iter().enumerate() {
                if instr.is_terminator() && offset != last {
                    return Err(Error::MisplacedTerminator { block: id, offset });
                }
                for register in instr.reads().into_iter().chain(instr.writes()) {
                    if register.index() >= self.register_count {
                        return Err(Error::RegisterOutOfRange {
                            register,
                            block: id,
                            offset,
                        });
                    }
                }
            }

            for target in self.successors(id)?.into_iter().chain(block.handler()) {
                if !self.contains(target) {
                    return Err(Error::InvalidBlockReference { block: id, target });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ir::{BlockId, FunctionBuilder, Instruction, Register},
        Error,
    };

    #[test]
    fn test_successors_jump_table_order() {
        let function = FunctionBuilder::new("switch", 1, 1).build_with(|f| {
            let table = f.jump_table(&[(5, 3), (1, 2), (9, 2)]);
            f.block(0, |b| {
                b.load(0).jump_table(table, 1);
            });
            f.block(1, |b| {
                b.push_undefined().ret();
            });
            f.block(2, |b| {
                b.push_int(2).ret();
            });
            f.block(3, |b| {
                b.push_int(3).ret();
            });
        });

        let succs = function.successors(BlockId::new(0)).unwrap();
        assert_eq!(
            succs,
            vec![
                BlockId::new(2),
                BlockId::new(3),
                BlockId::new(2),
                BlockId::new(1)
            ]
        );
        assert!(function.validate().is_ok());
    }

    #[test]
    fn test_redirect_references_everywhere() {
        let mut function = FunctionBuilder::new("redirect", 1, 1).build_with(|f| {
            let table = f.jump_table(&[(0, 1)]);
            f.block(0, |b| {
                b.load(0).jump_table(table, 1);
            });
            f.block(1, |b| {
                b.handler(2).push_int(1).push_int(2).add().ret();
            });
            f.block(2, |b| {
                b.catch().throw();
            });
            f.block(3, |b| {
                b.catch().throw();
            });
        });

        // default target, table entry
        assert_eq!(function.redirect_references(BlockId::new(1), BlockId::new(3)), 2);
        assert_eq!(function.successors(BlockId::new(0)).unwrap(), vec![BlockId::new(3); 2]);

        // handler reference
        assert_eq!(function.redirect_references(BlockId::new(2), BlockId::new(3)), 1);
        let handler = function.block(BlockId::new(1)).and_then(|b| b.handler());
        assert_eq!(handler, Some(BlockId::new(3)));

        // entry position
        function.redirect_references(BlockId::new(0), BlockId::new(3));
        assert_eq!(function.entry(), Some(BlockId::new(3)));
    }

    #[test]
    fn test_remove_block_keeps_handles() {
        let mut function = FunctionBuilder::new("remove", 0, 0).build_with(|f| {
            f.block(0, |b| b.jump(2));
            f.block(1, |b| b.jump(2));
            f.block(2, |b| {
                b.push_null().ret();
            });
        });

        assert!(function.remove_block(BlockId::new(1)).is_some());
        assert!(function.remove_block(BlockId::new(1)).is_none());
        assert_eq!(function.layout(), &[BlockId::new(0), BlockId::new(2)]);
        assert!(function.block(BlockId::new(2)).is_some());
        assert!(function.validate().is_ok());
    }

    #[test]
    fn test_validate_faults() {
        let mut function = FunctionBuilder::new("bad", 0, 1).build_with(|f| {
            f.block(0, |b| b.jump(1));
            f.block(1, |b| {
                b.push_null().ret();
            });
        });

        function.remove_block(BlockId::new(1));
        assert_eq!(
            function.validate(),
            Err(Error::InvalidBlockReference {
                block: BlockId::new(0),
                target: BlockId::new(1)
            })
        );

        if let Some(block) = function.block_mut(BlockId::new(0)) {
            block.instructions_mut().insert(0, Instruction::Return);
        }
        assert_eq!(
            function.validate(),
            Err(Error::MisplacedTerminator {
                block: BlockId::new(0),
                offset: 0
            })
        );

        if let Some(block) = function.block_mut(BlockId::new(0)) {
            *block.instructions_mut() = vec![Instruction::LoadReg(Register(4)), Instruction::Return];
        }
        assert!(matches!(
            function.validate(),
            Err(Error::RegisterOutOfRange { offset: 0, .. })
        ));

        if let Some(block) = function.block_mut(BlockId::new(0)) {
            block.instructions_mut().clear();
        }
        assert_eq!(
            function.validate(),
            Err(Error::EmptyBlock {
                block: BlockId::new(0)
            })
        );

        function.remove_block(BlockId::new(0));
        assert_eq!(function.validate(), Err(Error::EmptyFunction));
    }

    #[test]
    fn test_reorder_rejects_non_permutations() {
        let mut function = FunctionBuilder::new("order", 0, 0).build_with(|f| {
            f.block(0, |b| b.jump(1));
            f.block(1, |b| {
                b.push_null().ret();
            });
        });

        assert!(function.reorder(vec![BlockId::new(1)]).is_err());
        assert!(function
            .reorder(vec![BlockId::new(1), BlockId::new(1)])
            .is_err());
        assert!(function
            .reorder(vec![BlockId::new(1), BlockId::new(0)])
            .is_ok());
        assert_eq!(function.entry(), Some(BlockId::new(1)));
    }
}
