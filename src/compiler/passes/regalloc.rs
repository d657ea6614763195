//! Register reduction by linear slot reuse.
//!
//! Virtual registers are packed into physical slots in one forward walk over the layout.
//! A slot is released right after the last access of the register holding it and handed
//! to the next register that starts a range. Argument registers are pre-colored: they keep
//! their slot and their slots are never handed out.
//!
//! # Algorithm
//!
//! 1. Compute live ranges with [`compute_liveness`]
//! 2. Walk the instructions in layout order. At an instruction's read point, release the
//!    slot of a register whose range ends there. At its write point, give a register
//!    whose range starts there the lowest free slot. Release the slot of a register whose
//!    range ends at the write point after the instruction.
//! 3. Rewrite every register operand through the resulting map
//!
//! # Limitations
//!
//! Linear ranges only describe liveness correctly when every control transfer goes
//! forward in the layout. A value carried around a loop back edge, or into a handler
//! placed before the protected block, is not covered, so the pass declines to run on such
//! functions instead of producing a wrong assignment.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::{
    analysis::{compute_liveness, ControlFlowGraph, Liveness, ProgramPoint},
    compiler::{pass::Pass, CompilerContext, EventKind},
    ir::{BlockId, Function, Register},
    Result,
};

/// Packs virtual registers into reused physical slots.
#[derive(Debug, Default)]
pub struct RegisterReducer;

impl RegisterReducer {
    /// Creates a new register reducer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns `true` if every successor and handler of every block lies later in the
    /// layout.
    fn is_forward_only(function: &Function) -> Result<bool> {
        let positions: HashMap<BlockId, usize> = function
            .layout()
            .iter()
            .enumerate()
            .map(|(position, &id)| (id, position))
            .collect();

        for (position, (id, block)) in function.blocks().enumerate() {
            for target in function.successors(id)?.into_iter().chain(block.handler()) {
                match positions.get(&target) {
                    Some(&target_position) if target_position > position => {}
                    _ => return Ok(false),
                }
            }
        }
        Ok(true)
    }

    /// Assigns a physical slot to every register with a live range.
    ///
    /// # Returns
    ///
    /// The register map and the number of slots used, arguments included.
    fn assign(function: &Function, liveness: &Liveness) -> (HashMap<Register, Register>, u32) {
        let mut assignment: HashMap<Register, Register> = HashMap::new();
        let mut free: BTreeSet<u32> = BTreeSet::new();
        let mut next_slot = function.arg_count();

        let instructions = function
            .blocks()
            .flat_map(|(_, block)| block.instructions().iter());

        for (position, instr) in instructions.enumerate() {
            if let Some(register) = instr.reads() {
                let read = ProgramPoint::read(position);
                if let (Some(range), Some(slot)) =
                    (liveness.range(register), assignment.get(&register))
                {
                    if range.ends_at(read) {
                        free.insert(slot.index());
                    }
                }
            }

            if let Some(register) = instr.writes() {
                let write = ProgramPoint::write(position);
                if let Some(range) = liveness.range(register) {
                    if range.start == write {
                        let slot = free.pop_first().unwrap_or_else(|| {
                            next_slot += 1;
                            next_slot - 1
                        });
                        assignment.insert(register, Register(slot));
                    }
                    if range.ends_at(write) {
                        if let Some(slot) = assignment.get(&register) {
                            free.insert(slot.index());
                        }
                    }
                }
            }
        }

        (assignment, next_slot)
    }
}

impl Pass for RegisterReducer {
    fn name(&self) -> &'static str {
        "register-reducer"
    }

    fn description(&self) -> &'static str {
        "Reuses physical register slots once a virtual register's live range ends"
    }

    fn should_run(&self, function: &Function, ctx: &CompilerContext) -> bool {
        let threshold = function
            .arg_count()
            .saturating_add(ctx.config.reduction_headroom);
        function.register_count() >= threshold
    }

    fn run_on_function(&self, function: &mut Function, ctx: &CompilerContext) -> Result<bool> {
        let cfg = ControlFlowGraph::build(function)?;
        if cfg.has_back_edges() {
            debug!("{}: skipping register reduction, function has loops", function.name());
            ctx.events
                .record(EventKind::PassSkipped)
                .function(function.name())
                .message("function contains loops")
                .pass(self.name());
            return Ok(false);
        }
        if !Self::is_forward_only(function)? {
            debug!(
                "{}: skipping register reduction, layout is not in control flow order",
                function.name()
            );
            ctx.events
                .record(EventKind::PassSkipped)
                .function(function.name())
                .message("layout has backward control transfers")
                .pass(self.name());
            return Ok(false);
        }

        let liveness = compute_liveness(function)?;
        let (assignment, slots) = Self::assign(function, &liveness);

        let before = function.register_count();
        let after = slots.max(ctx.config.min_registers);
        let remapped = assignment.iter().any(|(from, to)| from != to);
        if !remapped && before == after {
            return Ok(false);
        }

        let map = |register: Register| assignment.get(&register).copied().unwrap_or(register);
        let ids: Vec<BlockId> = function.layout().to_vec();
        for id in ids {
            if let Some(block) = function.block_mut(id) {
                for instr in block.instructions_mut() {
                    instr.map_registers(map, map);
                }
            }
        }
        function.set_register_count(after);

        debug!(
            "{}: reduced {} registers to {}",
            function.name(),
            before,
            after
        );
        ctx.events
            .record(EventKind::RegistersReduced)
            .function(function.name())
            .message(format!("{before} -> {after} registers"))
            .pass(self.name());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::compute_liveness,
        compiler::{pass::Pass, passes::RegisterReducer, CompilerContext, EventKind},
        ir::{Function, FunctionBuilder, Register},
    };

    fn assigned(function: &Function) -> Vec<Register> {
        function
            .blocks()
            .flat_map(|(_, block)| block.instructions().iter())
            .filter_map(|instr| instr.writes().or(instr.reads()))
            .collect()
    }

    #[test]
    fn test_reuses_slots_after_last_read() {
        // r1 and r2 are short-lived temporaries, r3 is live across both
        let mut function = FunctionBuilder::new("temps", 1, 4).build_with(|f| {
            f.block(0, |b| {
                b.load(0).store(3);
                b.push_int(1).store(1).load(1).pop();
                b.push_int(2).store(2).load(2).pop();
                b.load(3).ret();
            });
        });

        let ctx = CompilerContext::default();
        let pass = RegisterReducer::new();
        assert!(pass.should_run(&function, &ctx));
        assert!(pass.run_on_function(&mut function, &ctx).unwrap());

        assert_eq!(function.register_count(), 3);
        assert_eq!(
            assigned(&function),
            vec![
                Register(0),
                Register(1),
                Register(2),
                Register(2),
                Register(2),
                Register(2),
                Register(1),
            ]
        );
        assert_eq!(ctx.events.count_kind(EventKind::RegistersReduced), 1);
        assert!(function.validate().is_ok());
    }

    #[test]
    fn test_overlapping_ranges_never_share_a_slot() {
        let original = FunctionBuilder::new("overlap", 2, 6).build_with(|f| {
            f.block(0, |b| {
                b.load(0).store(2).load(1).store(3).load(2).load(3).add().store(4);
                b.jump(1);
            });
            f.block(1, |b| {
                b.mov(5, 4).load(5).load(0).add().ret();
            });
        });

        let mut function = original.clone();
        let ctx = CompilerContext::default();
        RegisterReducer::new()
            .run_on_function(&mut function, &ctx)
            .unwrap();

        let before = compute_liveness(&original).unwrap();
        let mapping: Vec<(Register, Register)> = original
            .blocks()
            .flat_map(|(_, block)| block.instructions().iter())
            .zip(
                function
                    .blocks()
                    .flat_map(|(_, block)| block.instructions().iter()),
            )
            .flat_map(|(old, new)| {
                old.reads()
                    .zip(new.reads())
                    .into_iter()
                    .chain(old.writes().zip(new.writes()))
            })
            .collect();

        for &(a, slot_a) in &mapping {
            if a.index() < original.arg_count() {
                assert_eq!(a, slot_a, "argument {a} moved");
            }
            for &(b, slot_b) in &mapping {
                if a != b && slot_a == slot_b {
                    assert!(!before.interferes(a, b), "{a} and {b} share {slot_a}");
                }
            }
        }
        assert!(function.register_count() < original.register_count());
    }

    #[test]
    fn test_declines_loops() {
        let mut function = FunctionBuilder::new("loop", 1, 4).build_with(|f| {
            f.block(0, |b| {
                b.push_int(0).store(1).jump(1);
            });
            f.block(1, |b| {
                b.inc(1).load(1).load(0).lt().branch(1, 2);
            });
            f.block(2, |b| {
                b.load(1).ret();
            });
        });
        let original = function.clone();

        let ctx = CompilerContext::default();
        assert!(!RegisterReducer::new()
            .run_on_function(&mut function, &ctx)
            .unwrap());
        assert_eq!(function, original);
        assert!(ctx.events.has(EventKind::PassSkipped));
    }

    #[test]
    fn test_below_headroom_is_not_worthwhile() {
        let function = FunctionBuilder::new("small", 2, 3).build_with(|f| {
            f.block(0, |b| {
                b.load(0).store(2).load(2).ret();
            });
        });
        assert!(!RegisterReducer::new().should_run(&function, &CompilerContext::default()));
    }
}
