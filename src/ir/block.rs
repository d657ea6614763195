//! Basic blocks and their stable handles.

use std::fmt;

use crate::ir::Instruction;

/// A stable handle to a block of a [`Function`](crate::ir::Function).
///
/// `BlockId` indexes the function's block arena. It is independent of the block's position
/// in the function's layout, so reordering, removing or merging blocks never invalidates the
/// handles held by other instructions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a new `BlockId` from a raw arena index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw arena index of this handle.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// An ordered run of instructions ending in exactly one terminator.
///
/// A block carries an optional handler (the block entered when one of its instructions
/// raises) and an `exported` flag. Exported blocks are reachable other than through ordinary
/// branches - jump-table entries, handler targets or external pins - and are never merged
/// away or discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    instructions: Vec<Instruction>,
    handler: Option<BlockId>,
    exported: bool,
}

impl Block {
    /// Creates a block from its instructions.
    #[must_use]
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            handler: None,
            exported: false,
        }
    }

    /// Returns the instructions of this block.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns mutable access to the instructions of this block.
    pub fn instructions_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the terminator, if the block is well formed.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Returns mutable access to the terminator, if the block is well formed.
    pub fn terminator_mut(&mut self) -> Option<&mut Instruction> {
        self.instructions.last_mut().filter(|i| i.is_terminator())
    }

    /// Returns the instructions before the terminator.
    #[must_use]
    pub fn body(&self) -> &[Instruction] {
        match self.instructions.split_last() {
            Some((last, body)) if last.is_terminator() => body,
            _ => &self.instructions,
        }
    }

    /// Returns the handler block, if any.
    #[must_use]
    pub fn handler(&self) -> Option<BlockId> {
        self.handler
    }

    /// Sets or clears the handler block.
    pub fn set_handler(&mut self, handler: Option<BlockId>) {
        self.handler = handler;
    }

    /// Returns `true` if the block is exported.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Marks or unmarks the block as exported.
    pub fn set_exported(&mut self, exported: bool) {
        self.exported = exported;
    }

    /// Returns `true` if any instruction of this block may raise.
    #[must_use]
    pub fn can_throw(&self) -> bool {
        self.instructions.iter().any(Instruction::can_throw)
    }

    /// Returns the target if this block consists of a single unconditional jump.
    ///
    /// A jump to the block itself is not a trampoline: it is an infinite loop that must
    /// survive simplification.
    #[must_use]
    pub fn trampoline_target(&self, own_id: BlockId) -> Option<BlockId> {
        match self.instructions.as_slice() {
            [Instruction::Jump { target }] if *target != own_id => Some(*target),
            _ => None,
        }
    }

    /// Redirects every direct branch target and the handler from `old` to `new`.
    ///
    /// # Returns
    ///
    /// `true` if anything changed.
    pub fn redirect_target(&mut self, old: BlockId, new: BlockId) -> bool {
        let mut changed = false;
        if let Some(terminator) = self.terminator_mut() {
            changed |= terminator.redirect_target(old, new);
        }
        if self.handler == Some(old) && old != new {
            self.handler = Some(new);
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_and_terminator() {
        let block = Block::new(vec![
            Instruction::PushInt(1),
            Instruction::Jump {
                target: BlockId::new(2),
            },
        ]);
        assert_eq!(block.body(), &[Instruction::PushInt(1)]);
        assert!(block.terminator().is_some());
        assert!(!block.can_throw());
        assert_eq!(block.trampoline_target(BlockId::new(0)), None);
    }

    #[test]
    fn test_trampoline_detection() {
        let block = Block::new(vec![Instruction::Jump {
            target: BlockId::new(3),
        }]);
        assert_eq!(block.trampoline_target(BlockId::new(1)), Some(BlockId::new(3)));
        // Self loop is not a trampoline
        assert_eq!(block.trampoline_target(BlockId::new(3)), None);
    }

    #[test]
    fn test_redirect_includes_handler() {
        let mut block = Block::new(vec![Instruction::Add, Instruction::Return]);
        block.set_handler(Some(BlockId::new(5)));
        assert!(block.can_throw());
        assert!(block.redirect_target(BlockId::new(5), BlockId::new(6)));
        assert_eq!(block.handler(), Some(BlockId::new(6)));
    }
}
