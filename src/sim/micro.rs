//! Micro-operations, the atomic transitions of the simulator.
//!
//! Each instruction is executed as an ordered list of [`MicroOp`]s,
//! preceded by the shared fetch-decode sequence ([`FETCH_DECODE`]).
//! A micro-operation is executed with [`MicroOp::execute`], which
//! applies it to the simulator and returns the [`Action`] it performed.

use crate::ast::sim::Opcode;
use crate::ast::Reg;

use super::action::{Action, Fault, InputInterrupt};
use super::alu::{ArithOp, CmpOp};
use super::Simulator;

/// A single atomic transition of the simulator.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum MicroOp {
    /// Marks the start of an instruction cycle.
    StepStart,
    /// Decodes the opcode in the IR.
    Decode,
    /// `target ← source`
    Transfer(Reg, Reg),
    /// `MBR ← M[MAR]`
    ReadMem,
    /// `M[MAR] ← MBR`
    WriteMem,
    /// `PC ← PC + 1`
    IncPC,
    /// An arithmetic operation on the AC.
    Arith(ArithOp),
    /// A comparison on the AC, selected by `IR[11:10]`.
    Compare,
    /// `PC ← PC + 1` if the last comparison was true.
    SkipIfTrue,
    /// Requests a value from the input source.
    RequestInput,
    /// Outputs the value of OUT.
    Output,
    /// Halts the machine.
    Halt,
}

use MicroOp::*;
use Reg::{AC, IR, MAR, MBR, OUT, PC};

/// The micro-operations shared by every instruction cycle, which fetch and decode the instruction.
pub const FETCH_DECODE: [MicroOp; 6] = [
    StepStart,
    Transfer(MAR, PC),
    ReadMem,
    Transfer(IR, MBR),
    IncPC,
    Decode,
];

/// The micro-operations which execute a decoded instruction.
pub fn program(opcode: Opcode) -> &'static [MicroOp] {
    match opcode {
        Opcode::JnS      => &[Transfer(MAR, IR), Transfer(MBR, PC), WriteMem, Transfer(PC, MAR), IncPC],
        Opcode::Load     => &[Transfer(MAR, IR), ReadMem, Transfer(AC, MBR)],
        Opcode::Store    => &[Transfer(MAR, IR), Transfer(MBR, AC), WriteMem],
        Opcode::Add      => &[Transfer(MAR, IR), ReadMem, Arith(ArithOp::Add)],
        Opcode::Subt     => &[Transfer(MAR, IR), ReadMem, Arith(ArithOp::Sub)],
        Opcode::Input    => &[RequestInput],
        Opcode::Output   => &[Transfer(OUT, AC), Output],
        Opcode::Halt     => &[Halt],
        Opcode::SkipCond => &[Compare, SkipIfTrue],
        Opcode::Jump     => &[Transfer(PC, IR)],
        Opcode::LoadImmi => &[Arith(ArithOp::LoadImmi)],
        Opcode::AddI     => &[Transfer(MAR, IR), ReadMem, Transfer(MAR, MBR), ReadMem, Arith(ArithOp::Add)],
        Opcode::JumpI    => &[Transfer(MAR, IR), ReadMem, Transfer(PC, MBR)],
        Opcode::LoadI    => &[Transfer(MAR, IR), ReadMem, Transfer(MAR, MBR), ReadMem, Transfer(AC, MBR)],
        Opcode::StoreI   => &[Transfer(MAR, IR), ReadMem, Transfer(MAR, MBR), Transfer(MBR, AC), WriteMem],
    }
}

impl MicroOp {
    /// Applies this micro-operation to the simulator.
    ///
    /// This returns the action performed, or `None` if this operation did not change
    /// any logged state (an untaken skip or an input request).
    /// This does not record the action in the log.
    pub(super) fn execute(self, sim: &mut Simulator) -> Option<Action> {
        match self {
            StepStart => Some(Action::StepStart { pc: sim.regs[PC] }),
            Decode => {
                let fault = match Opcode::decode(sim.regs[IR]) {
                    Ok(opcode) => {
                        let old = sim.decoded.replace(opcode);
                        return Some(Action::Decode { old, opcode });
                    },
                    Err(bits) => Fault::UnsupportedOpcode(bits),
                };
                Some(sim.fault(fault))
            },
            Transfer(target, source) => Some(sim.transfer(target, source)),
            ReadMem => {
                let addr = sim.regs[MAR];
                let old_mbr = sim.regs.set(MBR, sim.mem[addr]);
                Some(Action::MemRead { addr, old_mbr })
            },
            WriteMem => {
                let addr = sim.regs[MAR];
                let old = sim.mem.set(addr, sim.regs[MBR]);
                Some(Action::MemWrite { addr, old })
            },
            IncPC => {
                let old_pc = sim.regs.set(PC, sim.regs[PC].wrapping_add(1));
                Some(Action::IncrementPC { old_pc })
            },
            Arith(op) => {
                let result = op.apply(sim.regs[AC], sim.regs[MBR], sim.regs[IR]);
                let old_ac = sim.regs.set(AC, result);
                Some(Action::Arithmetic { op, old_ac })
            },
            Compare => {
                let ir = sim.regs[IR];
                let Some(op) = CmpOp::from_ir(ir) else {
                    return Some(sim.fault(Fault::UnsupportedSkipCond(ir & 0x0FFF)));
                };
                let result = op.check(sim.regs[AC]);
                let old_result = std::mem::replace(&mut sim.cmp_result, result);
                Some(Action::Comparison { op, old_result, result })
            },
            SkipIfTrue => match sim.cmp_result {
                true  => IncPC.execute(sim),
                false => None,
            },
            RequestInput => {
                sim.interrupt = InputInterrupt::NeedsValue;
                None
            },
            Output => Some(Action::Output { value: sim.regs[OUT] }),
            Halt => {
                sim.halted = true;
                Some(Action::Halt { halt: true, fault: None })
            },
        }
    }
}
