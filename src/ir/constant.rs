//! Constant pool entries, including jump-table dispatch tables.

use std::collections::BTreeMap;

use crate::ir::BlockId;

/// A dispatch table used by the `jump_table` terminator.
///
/// Maps a discriminant to the block that handles it. Entries are kept ordered by
/// discriminant so successor enumeration is deterministic. Discriminants missing from the
/// table are dispatched to the instruction's `default` target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JumpTable {
    entries: BTreeMap<i64, BlockId>,
}

impl JumpTable {
    /// Creates an empty jump table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the target for `discriminant`.
    pub fn insert(&mut self, discriminant: i64, target: BlockId) -> Option<BlockId> {
        self.entries.insert(discriminant, target)
    }

    /// Returns the target for `discriminant`, if present.
    #[must_use]
    pub fn get(&self, discriminant: i64) -> Option<BlockId> {
        self.entries.get(&discriminant).copied()
    }

    /// Iterates over `(discriminant, target)` pairs in discriminant order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, BlockId)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// Iterates over the targets in discriminant order. Duplicates are not removed.
    pub fn targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.entries.values().copied()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces every entry pointing at `old` with `new`.
    ///
    /// # Returns
    ///
    /// The number of entries that were rewritten.
    pub fn redirect_target(&mut self, old: BlockId, new: BlockId) -> usize {
        if old == new {
            return 0;
        }

        let mut rewritten = 0;
        for target in self.entries.values_mut() {
            if *target == old {
                *target = new;
                rewritten += 1;
            }
        }
        rewritten
    }
}

impl FromIterator<(i64, BlockId)> for JumpTable {
    fn from_iter<T: IntoIterator<Item = (i64, BlockId)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An entry of a function's constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// A numeric literal too large for `push_int`
    Number(f64),
    /// A string literal or property name
    String(String),
    /// A jump-table dispatch table
    JumpTable(JumpTable),
}

impl Constant {
    /// Returns the jump table if this constant is one.
    #[must_use]
    pub fn as_jump_table(&self) -> Option<&JumpTable> {
        match self {
            Constant::JumpTable(table) => Some(table),
            _ => None,
        }
    }

    /// Returns mutable access to the jump table if this constant is one.
    pub fn as_jump_table_mut(&mut self) -> Option<&mut JumpTable> {
        match self {
            Constant::JumpTable(table) => Some(table),
            _ => None,
        }
    }
}
