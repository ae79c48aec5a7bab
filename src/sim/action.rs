//! The action log.
//!
//! Every state change the simulator makes is recorded as an [`Action`],
//! which holds enough information to exactly undo that change.
//! Actions are recorded in an [`ActionLog`] along with the micro-program counter
//! and input state from when they were recorded (together, a [`LogEntry`]).
//!
//! Collaborators which display the log incrementally can use a [`LogWatcher`]
//! to find out what changed since they last looked.

use serde::{Deserialize, Serialize};

use crate::ast::sim::Opcode;
use crate::ast::Reg;

use super::alu::{ArithOp, CmpOp};

/// The reason the machine halted because of an error.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize, thiserror::Error)]
pub enum Fault {
    /// The IR held an opcode with no instruction (`0xF`).
    #[error("Unsupported opcode 0x{0:X}")]
    UnsupportedOpcode(u8),
    /// `SkipCond` was given a condition it does not know.
    #[error("Unsupported skipcond operand 0x{0:X}.")]
    UnsupportedSkipCond(u16),
}

/// The state of the input interrupt.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub enum InputInterrupt {
    /// No input is being requested.
    #[default]
    Idle,
    /// The machine is waiting on the input source for a value.
    NeedsValue,
    /// A value was placed in IN, and needs to be moved to the AC.
    NeedsLoad,
}

/// A single state transition in the simulator.
///
/// Each variant holds the prior value(s) it overwrote, so it can be inverted.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    /// The start of an instruction cycle.
    StepStart {
        /// The PC of the instruction about to be executed.
        pc: u16
    },
    /// The end of an instruction cycle.
    StepEnd,
    /// The IR was decoded.
    Decode {
        /// The previously decoded instruction.
        old: Option<Opcode>,
        /// The newly decoded instruction.
        opcode: Opcode
    },
    /// `PC ← PC + 1`
    #[serde(rename = "incpc")]
    IncrementPC {
        /// The previous value of the PC.
        old_pc: u16
    },
    /// An arithmetic operation on the AC.
    Arithmetic {
        /// The operation which occurred.
        op: ArithOp,
        /// The previous value of the AC.
        old_ac: u16
    },
    /// A comparison on the AC.
    Comparison {
        /// The operation which occurred.
        op: CmpOp,
        /// The result of the previous comparison.
        old_result: bool,
        /// The result of this comparison.
        result: bool
    },
    /// `MBR ← M[MAR]`
    #[serde(rename = "memread")]
    MemRead {
        /// The address read from.
        addr: u16,
        /// The previous value of the MBR.
        old_mbr: u16
    },
    /// `M[MAR] ← MBR`
    #[serde(rename = "memwrite")]
    MemWrite {
        /// The address written to.
        addr: u16,
        /// The previous contents at the address.
        old: u16
    },
    /// Memory was written from outside of the simulator.
    #[serde(rename = "memset")]
    MemSet {
        /// The address written to.
        addr: u16,
        /// The previous contents at the address.
        old: u16,
        /// The new contents at the address.
        new: u16
    },
    /// A register transfer (`target ← source`).
    #[serde(rename = "regtransfer")]
    RegTransfer {
        /// The register written to.
        target: Reg,
        /// The register read from.
        source: Reg,
        /// The previous value of the target.
        old: u16
    },
    /// A register was written from outside of the simulator.
    #[serde(rename = "regset")]
    RegSet {
        /// The register written to.
        reg: Reg,
        /// The previous value of the register.
        old: u16,
        /// The new value of the register.
        new: u16
    },
    /// The input source provided a value, which was placed in IN.
    Input {
        /// The previous value of IN.
        old: u16,
        /// The new value of IN.
        new: u16
    },
    /// The value of OUT was output.
    Output {
        /// The value output.
        value: u16
    },
    /// The halted flag changed.
    Halt {
        /// The new value of the halted flag.
        halt: bool,
        /// If the machine halted due to an error, the error.
        fault: Option<Fault>
    },
}
impl Action {
    /// Whether this action marks the start of an instruction cycle.
    pub fn is_step_start(&self) -> bool {
        matches!(self, Action::StepStart { .. })
    }
    /// Whether this action marks the end of an instruction cycle.
    pub fn is_step_end(&self) -> bool {
        matches!(self, Action::StepEnd)
    }
}
impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Action::StepStart { pc } => write!(f, "step @ {pc:03X}"),
            Action::StepEnd => f.write_str("step end"),
            Action::Decode { opcode, .. } => write!(f, "decode {opcode}"),
            Action::IncrementPC { .. } => f.write_str("PC ← PC + 1"),
            Action::Arithmetic { op, .. } => write!(f, "{op}"),
            Action::Comparison { op, result, .. } => write!(f, "{op} = {result}"),
            Action::MemRead { .. } => f.write_str("MBR ← M[MAR]"),
            Action::MemWrite { .. } => f.write_str("M[MAR] ← MBR"),
            Action::MemSet { addr, new, .. } => write!(f, "M[{addr:03X}] ← {new:04X}"),
            Action::RegTransfer { target, source, .. } => write!(f, "{target} ← {source}"),
            Action::RegSet { reg, new, .. } => write!(f, "{reg} ← {new:04X}"),
            Action::Input { new, .. } => write!(f, "IN ← {new:04X}"),
            Action::Output { value } => write!(f, "output {value:04X}"),
            Action::Halt { halt: true, fault: Some(fault) } => write!(f, "halt: {fault}"),
            Action::Halt { halt: true, fault: None } => f.write_str("halt"),
            Action::Halt { halt: false, .. } => f.write_str("unhalt"),
        }
    }
}

/// An action, along with the simulator state from the moment it was recorded.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct LogEntry {
    /// The recorded action.
    #[serde(flatten)]
    pub action: Action,
    /// The micro-program counter when the action was recorded.
    pub micro_pc: usize,
    /// The input interrupt state when the action was recorded.
    pub interrupt: InputInterrupt,
}

/// An append-only record of the simulator's actions.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct ActionLog(Vec<LogEntry>);
impl ActionLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self(vec![])
    }

    pub(super) fn push(&mut self, entry: LogEntry) {
        self.0.push(entry);
    }
    pub(super) fn pop(&mut self) -> Option<LogEntry> {
        self.0.pop()
    }
    pub(super) fn clear(&mut self) {
        self.0.clear();
    }

    /// Gets all log entries, oldest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.0
    }
    /// Iterates over the recorded actions, oldest first.
    pub fn actions(&self) -> impl DoubleEndedIterator<Item = &Action> + '_ {
        self.0.iter().map(|e| &e.action)
    }
    /// The number of entries in the log.
    pub fn len(&self) -> usize {
        self.0.len()
    }
    /// Whether the log has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// The most recent entry.
    pub fn last(&self) -> Option<&LogEntry> {
        self.0.last()
    }
}

/// A change in the log since the last time it was watched.
#[derive(Debug, PartialEq, Eq)]
pub enum LogDelta<'a> {
    /// Nothing changed.
    Unchanged,
    /// Entries were appended to the log.
    Appended(&'a [LogEntry]),
    /// The log shrank (by a rewind or a reset).
    ///
    /// Anything previously read from the log should be discarded
    /// and replaced with the entire current log, which is included here.
    Cleared(&'a [LogEntry]),
}

/// Tracks how much of a log has been seen, so only new entries need to be processed.
///
/// ```
/// use marie_ensemble::asm::assemble;
/// use marie_ensemble::sim::Simulator;
/// use marie_ensemble::sim::action::{LogDelta, LogWatcher};
///
/// let program = assemble("Halt").unwrap();
/// let mut sim = Simulator::default();
/// sim.load(&program).unwrap();
///
/// let mut watcher = LogWatcher::new();
/// assert_eq!(watcher.poll(sim.log()), LogDelta::Unchanged);
///
/// sim.micro_step();
/// assert!(matches!(watcher.poll(sim.log()), LogDelta::Appended(new) if new.len() == 1));
///
/// sim.micro_step_back();
/// assert_eq!(watcher.poll(sim.log()), LogDelta::Cleared(&[]));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWatcher {
    seen: usize,
}
impl LogWatcher {
    /// Creates a watcher which has seen nothing.
    pub fn new() -> Self {
        Self { seen: 0 }
    }

    /// Computes the change in the log since the last poll.
    pub fn poll<'a>(&mut self, log: &'a ActionLog) -> LogDelta<'a> {
        let entries = log.entries();
        let delta = match entries.len().cmp(&self.seen) {
            std::cmp::Ordering::Equal   => LogDelta::Unchanged,
            std::cmp::Ordering::Greater => LogDelta::Appended(&entries[self.seen..]),
            std::cmp::Ordering::Less    => LogDelta::Cleared(entries),
        };
        self.seen = entries.len();
        delta
    }
}
