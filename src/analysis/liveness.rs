//! Linear live ranges of virtual registers.
//!
//! Instructions are numbered by their position in layout order. Every position `p` has
//! two program points: the read point `2p` and the write point `2p + 1`, so an
//! instruction that reads one register and writes another (`move`) orders the read
//! before the write.
//!
//! The live range of a register is the half-open interval from its first write point to
//! one past its last access point. Two ranges interfere iff the intervals overlap.
//! Argument registers are pre-colored and live for the whole function, so they carry no
//! range.

use std::collections::BTreeMap;

use crate::{
    ir::{BlockId, Function, Register},
    Error, Result,
};

/// A point in the linear instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramPoint(usize);

impl ProgramPoint {
    /// The point at which the instruction at `position` reads its register.
    #[must_use]
    pub const fn read(position: usize) -> Self {
        ProgramPoint(position * 2)
    }

    /// The point at which the instruction at `position` writes its register.
    #[must_use]
    pub const fn write(position: usize) -> Self {
        ProgramPoint(position * 2 + 1)
    }

    /// Returns the linear position of the instruction.
    #[must_use]
    pub const fn position(self) -> usize {
        self.0 / 2
    }

    /// Returns `true` for write points.
    #[must_use]
    pub const fn is_write(self) -> bool {
        self.0 % 2 == 1
    }

    /// The point right after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        ProgramPoint(self.0 + 1)
    }
}

/// A half-open live range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    /// The first write
    pub start: ProgramPoint,
    /// One past the last access
    pub end: ProgramPoint,
}

impl LiveRange {
    /// Returns `true` if the two ranges share a program point.
    #[must_use]
    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns `true` if `point` lies within the range.
    #[must_use]
    pub fn contains(&self, point: ProgramPoint) -> bool {
        self.start <= point && point < self.end
    }

    /// Returns `true` if `point` is the last access of the range.
    #[must_use]
    pub fn ends_at(&self, point: ProgramPoint) -> bool {
        point.next() == self.end
    }
}

/// Live ranges of every non-argument register of a function.
#[derive(Debug, Clone)]
pub struct Liveness {
    arg_count: u32,
    ranges: BTreeMap<Register, LiveRange>,
    locations: Vec<(BlockId, usize)>,
}

impl Liveness {
    /// Returns the range of `register`; `None` for arguments and unused registers.
    #[must_use]
    pub fn range(&self, register: Register) -> Option<&LiveRange> {
        self.ranges.get(&register)
    }

    /// Iterates over all ranges ordered by register.
    pub fn ranges(&self) -> impl Iterator<Item = (Register, &LiveRange)> {
        self.ranges.iter().map(|(&reg, range)| (reg, range))
    }

    /// Returns the number of registers with a range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Returns `true` if no non-argument register is used.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Returns `true` if `register` is a pre-colored argument register.
    #[must_use]
    pub fn is_argument(&self, register: Register) -> bool {
        register.index() < self.arg_count
    }

    /// Returns the `(block, offset)` location of a program point.
    #[must_use]
    pub fn location(&self, point: ProgramPoint) -> Option<(BlockId, usize)> {
        self.locations.get(point.position()).copied()
    }

    /// Returns `true` if the ranges of `a` and `b` overlap.
    ///
    /// Argument registers interfere with every other register.
    #[must_use]
    pub fn interferes(&self, a: Register, b: Register) -> bool {
        if a == b {
            return true;
        }
        if self.is_argument(a) || self.is_argument(b) {
            return true;
        }
        match (self.ranges.get(&a), self.ranges.get(&b)) {
            (Some(ra), Some(rb)) => ra.overlaps(rb),
            _ => false,
        }
    }
}

/// Computes the live range of every non-argument register, walking blocks in layout order.
///
/// # Errors
///
/// Returns [`Error::RegisterReadBeforeWrite`] if a non-argument register is read before
/// any instruction earlier in the layout wrote it.
///
/// # Examples
///
/// ```rust
/// use vmopt::{analysis::{compute_liveness, ProgramPoint}, ir::{FunctionBuilder, Register}};
///
/// let function = FunctionBuilder::new("f", 0, 2).build_with(|f| {
///     f.block(0, |b| {
///         b.push_int(1).store(0).load(0).store(1).load(1).ret();
///     });
/// });
///
/// let liveness = compute_liveness(&function)?;
/// let r0 = liveness.range(Register(0)).unwrap();
/// assert_eq!(r0.start, ProgramPoint::write(1));
/// assert!(r0.ends_at(ProgramPoint::read(2)));
/// assert!(!liveness.interferes(Register(0), Register(1)));
/// # Ok::<(), vmopt::Error>(())
/// ```
pub fn compute_liveness(function: &Function) -> Result<Liveness> {
    let arg_count = function.arg_count();
    let mut ranges: BTreeMap<Register, LiveRange> = BTreeMap::new();
    let mut locations = Vec::with_capacity(function.instruction_count());

    for (id, block) in function.blocks() {
        for (offset, instr) in block.instructions().iter().enumerate() {
            let position = locations.len();
            locations.push((id, offset));

            if let Some(register) = instr.reads().filter(|r| r.index() >= arg_count) {
                let range =
                    ranges
                        .get_mut(&register)
                        .ok_or(Error::RegisterReadBeforeWrite {
                            register,
                            block: id,
                            offset,
                        })?;
                range.end = ProgramPoint::read(position).next();
            }

            if let Some(register) = instr.writes().filter(|r| r.index() >= arg_count) {
                let point = ProgramPoint::write(position);
                ranges
                    .entry(register)
                    .and_modify(|range| range.end = point.next())
                    .or_insert(LiveRange {
                        start: point,
                        end: point.next(),
                    });
            }
        }
    }

    Ok(Liveness {
        arg_count,
        ranges,
        locations,
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::{compute_liveness, ProgramPoint},
        ir::{BlockId, FunctionBuilder, Register},
        Error,
    };

    #[test]
    fn test_ranges_span_blocks() {
        let function = FunctionBuilder::new("f", 1, 3).build_with(|f| {
            f.block(0, |b| {
                b.load(0).store(1).jump(1);
            });
            f.block(1, |b| {
                b.push_int(2).store(2).load(1).load(2).add().ret();
            });
        });

        let liveness = compute_liveness(&function).unwrap();
        assert_eq!(liveness.len(), 2);
        assert!(liveness.range(Register(0)).is_none());
        assert!(liveness.is_argument(Register(0)));

        let r1 = liveness.range(Register(1)).unwrap();
        assert_eq!(r1.start, ProgramPoint::write(1));
        assert!(r1.ends_at(ProgramPoint::read(5)));
        assert_eq!(liveness.location(r1.end), Some((BlockId::new(1), 2)));

        assert!(liveness.interferes(Register(1), Register(2)));
        assert!(liveness.interferes(Register(0), Register(2)));
    }

    #[test]
    fn test_move_source_and_destination_do_not_overlap() {
        let function = FunctionBuilder::new("mv", 0, 2).build_with(|f| {
            f.block(0, |b| {
                b.push_null().store(0).mov(1, 0).load(1).ret();
            });
        });

        let liveness = compute_liveness(&function).unwrap();
        let r0 = *liveness.range(Register(0)).unwrap();
        let r1 = *liveness.range(Register(1)).unwrap();
        assert_eq!(r0.end, r1.start);
        assert!(!r0.overlaps(&r1));
        assert!(r1.contains(ProgramPoint::read(3)));
    }

    #[test]
    fn test_write_only_register() {
        let function = FunctionBuilder::new("dead", 0, 1).build_with(|f| {
            f.block(0, |b| {
                b.push_null().store(0).push_null().ret();
            });
        });

        let liveness = compute_liveness(&function).unwrap();
        let r0 = liveness.range(Register(0)).unwrap();
        assert_eq!(r0.start, ProgramPoint::write(1));
        assert_eq!(r0.end, ProgramPoint::write(1).next());
    }

    #[test]
    fn test_read_before_write() {
        let function = FunctionBuilder::new("undef", 1, 2).build_with(|f| {
            f.block(0, |b| {
                b.load(0).pop().load(1).ret();
            });
        });

        assert_eq!(
            compute_liveness(&function).err(),
            Some(Error::RegisterReadBeforeWrite {
                register: Register(1),
                block: BlockId::new(0),
                offset: 2
            })
        );
    }
}
