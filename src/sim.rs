//! Simulating and execution for MARIE.
//!
//! This module is focused on executing assembled code (i.e., [`AssembledProgram`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates assembled code.
//! - [`mem`]: The module handling memory and the registers.
//! - [`micro`]: The module defining the micro-operations instructions are made of.
//! - [`alu`]: The module handling arithmetic and comparisons.
//! - [`action`]: The module defining the action log, which makes the simulator reversible.
//! - [`io`]: The module handling input sources and value formatting.
//! - [`debug`]: The module handling types of breakpoints for the simulator.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load a program into it:
//!
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::sim::{Simulator, RunStatus};
//! use std::time::Duration;
//!
//! let program = assemble("Load A\nHalt\nA, DEC 7").unwrap();
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load(&program).unwrap();
//! assert_eq!(simulator.run(Duration::ZERO), RunStatus::Halted);
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we do not need to rewind, we can turn off the action log:
//!
//! ```
//! # use marie_ensemble::sim::{Simulator, SimFlags};
//! let mut simulator = Simulator::new(SimFlags { enable_log: false, ..Default::default() });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Every instruction executes as a series of micro-steps:
//! a fetch-decode sequence shared by all instructions,
//! and then the micro-operations of the decoded instruction.
//!
//! Beyond the basic [`Simulator::run`] (which runs in time-limited batches),
//! there are also:
//! - [`Simulator::micro_step`], [`Simulator::step`]: manual step-by-step simulation
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::sim::Simulator;
//! use marie_ensemble::ast::Reg;
//!
//! let src = "
//!     Load A
//!     Add B
//!     Add B
//!     Halt
//!     A, DEC 1
//!     B, DEC 2
//! ";
//! let program = assemble(src).unwrap();
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load(&program).unwrap();
//!
//! // Running step by step:
//! assert!(sim.step());
//! assert_eq!(sim.reg(Reg::AC), 1);
//! assert!(sim.step());
//! assert_eq!(sim.reg(Reg::AC), 3);
//! assert!(sim.step());
//! assert_eq!(sim.reg(Reg::AC), 5);
//! assert!(sim.step());
//! assert!(sim.halted());
//! assert!(!sim.step());
//! ```
//!
//! ## Rewinding
//!
//! Every change the simulator makes is recorded in its [action log](Simulator::log).
//! The log holds enough information to undo each change, so execution can be rewound
//! with [`Simulator::micro_step_back`] and [`Simulator::step_back`].
//!
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::sim::Simulator;
//! use marie_ensemble::ast::Reg;
//!
//! let program = assemble("Load A\nStore B\nHalt\nA, DEC 5\nB, DEC 0").unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load(&program).unwrap();
//! sim.step();
//! sim.step();
//! assert_eq!(sim.mem(4), 5);
//!
//! sim.step_back();
//! assert_eq!(sim.mem(4), 0);
//! assert_eq!(sim.reg(Reg::AC), 5);
//! ```
//!
//! Changes made from outside the program (e.g., [`Simulator::set_reg`] and [`Simulator::set_mem`])
//! are recorded too, and can be rewound the same way.
//!
//! ## Querying State
//!
//! You can query (or set) a variety of different state values from the simulator.
//!
//! - Registers can be read with [`Simulator::reg`] and set with [`Simulator::set_reg`].
//! - Memory can be read with [`Simulator::mem`] and set with [`Simulator::set_mem`].
//! - A snapshot of the whole machine can be taken with [`Simulator::state`].
//!
//! ```
//! use marie_ensemble::sim::Simulator;
//! use marie_ensemble::ast::Reg;
//!
//! let mut sim = Simulator::default();
//!
//! sim.set_reg(Reg::AC, 0x1234);
//! assert_eq!(sim.reg(Reg::AC), 0x1234);
//!
//! // Values are masked to the width of their destination:
//! sim.set_reg(Reg::PC, 0x1234);
//! assert_eq!(sim.reg(Reg::PC), 0x234);
//! sim.set_mem(0x1FFF, 0x5678);
//! assert_eq!(sim.mem(0xFFF), 0x5678);
//! ```
//!
//! ## Debugging with breakpoints
//!
//! Breakpoints are accessible through the `breakpoints` field on [`Simulator`].
//!
//! To add a `breakpoint`, simply insert a [`Breakpoint`] and
//! it will break if its condition is met during all execution functions
//! (except [`Simulator::step`] and [`Simulator::micro_step`]).
//!
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::sim::{Simulator, RunStatus};
//! use marie_ensemble::sim::debug::Breakpoint;
//! use marie_ensemble::ast::Reg;
//! use std::time::Duration;
//!
//! let src = "
//!     Load A
//!     Add A
//!     Add A
//!     Halt
//!     A, DEC 1
//! ";
//! let program = assemble(src).unwrap();
//!
//! let mut sim = Simulator::default();
//! sim.load(&program).unwrap();
//! sim.breakpoints.insert(Breakpoint::PC(0x002));
//!
//! assert_eq!(sim.run(Duration::ZERO), RunStatus::Breakpoint);
//! assert_eq!(sim.reg(Reg::AC), 2);
//! assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
//! ```
//!
//! ## Input
//!
//! `Input` reads from the simulator's [`InputSource`] (set with [`Simulator::set_input`]).
//! If the input source has no value ready, the simulator waits on it,
//! and execution functions return without progress until one is available.
//!
//! ```
//! use marie_ensemble::asm::assemble;
//! use marie_ensemble::sim::{Simulator, RunStatus};
//! use marie_ensemble::ast::Reg;
//! use std::time::Duration;
//!
//! let program = assemble("Input\nHalt").unwrap();
//! let mut sim = Simulator::default();
//! sim.load(&program).unwrap();
//!
//! // The default input source never has input:
//! assert_eq!(sim.run(Duration::ZERO), RunStatus::AwaitingInput);
//!
//! sim.set_input(|| Some(-1));
//! assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
//! assert_eq!(sim.reg(Reg::AC), 0xFFFF);
//! ```
//!
//! [`Breakpoint`]: self::debug::Breakpoint
pub mod action;
pub mod alu;
pub mod debug;
pub mod io;
pub mod mem;
pub mod micro;

use std::borrow::Cow;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::asm::AssembledProgram;
use crate::ast::sim::Opcode;
use crate::ast::Reg;
use crate::parse::lex::parse_int_lit;

use self::action::{Action, ActionLog, Fault, InputInterrupt, LogEntry};
use self::debug::Breakpoint;
use self::io::{EmptyInput, InputSource};
use self::mem::{MemArray, RegFile, ADDR_MASK};
use self::micro::FETCH_DECODE;

/// Errors that can occur when operating the simulator.
///
/// Faults that occur while executing the program are not errors,
/// they halt the machine (see [`Fault`]).
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum SimErr {
    /// The program does not fit in memory at its origin.
    #[error("program of {len} words does not fit in memory at {origin:03X}")]
    ProgramTooLarge {
        /// Where the program was to be loaded.
        origin: u16,
        /// The length of the program.
        len: usize
    },
    /// A value given as text could not be parsed.
    #[error("invalid value {0:?}")]
    InvalidValue(String),
    /// A register given by name does not exist.
    #[error("unknown register {0:?}")]
    UnknownRegister(String),
}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::ProgramTooLarge { origin, .. } => Some(format!("at most {} words fit after {origin:03X}", crate::asm::MEM_SIZE.saturating_sub(usize::from(*origin))).into()),
            SimErr::InvalidValue(_) => Some("values are decimal (e.g., -1) or hexadecimal with a 0x prefix (e.g., 0xFFFF)".into()),
            SimErr::UnknownRegister(_) => Some("registers are AC, IN, IR, MAR, MBR, OUT, and PC".into()),
        }
    }
}

/// Reason why execution stopped.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RunStatus {
    /// The machine halted (either from a `Halt` instruction or a fault).
    Halted,
    /// The time budget of [`Simulator::run`] ran out. The program can be continued.
    Paused,
    /// The machine is waiting on the input source for a value.
    AwaitingInput,
    /// A breakpoint matched.
    Breakpoint,
    /// The tripwire of [`Simulator::run_while`] (or the limit of [`Simulator::run_with_limit`]) was hit.
    Tripwire,
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects should still apply.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct SimFlags {
    /// Whether actions are recorded into the log.
    ///
    /// If this is `false`, nothing is recorded, and the simulator cannot be rewound.
    ///
    /// By default, this flag is `true`.
    pub enable_log: bool,

    /// The time budget of one batch of [`Simulator::run_batch`].
    ///
    /// By default, this is 20 ms.
    pub run_interval: Duration,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            enable_log: true,
            run_interval: Duration::from_millis(20),
        }
    }
}

/// A snapshot of the machine's state.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct State {
    /// All 4096 words of memory.
    pub memory: Vec<u16>,
    /// The register file.
    pub registers: RegFile,
    /// Whether the machine is halted.
    pub halted: bool,
}

/// Executes assembled code.
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::load`] or [`Simulator::reset_registers`] resets most of these values.

    /// The simulator's memory.
    mem: MemArray,

    /// The simulator's register file.
    regs: RegFile,

    /// Where the loaded program starts.
    origin: u16,

    /// Whether the machine is halted.
    halted: bool,

    /// Record of every action taken since the last reset.
    log: ActionLog,

    /// Index of the next micro-operation in the current instruction cycle.
    ///
    /// The first [`FETCH_DECODE`] indices are the fetch-decode sequence,
    /// and the indices after are the decoded instruction's micro-operations.
    micro_pc: usize,

    /// The currently decoded instruction.
    decoded: Option<Opcode>,

    /// The result of the last comparison.
    cmp_result: bool,

    /// The state of the input request.
    interrupt: InputInterrupt,

    /// The number of instruction cycles completed since the last reset.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Resets do not reset these values.

    /// Where input values come from.
    input: Box<dyn InputSource + Send>,

    /// Configuration settings for the simulator.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,

    /// Breakpoints for the simulator.
    pub breakpoints: HashSet<Breakpoint>,
}
impl Simulator where Simulator: Send {}

impl Simulator {
    /// Creates a new simulator with zeroed memory and registers,
    /// and with an input source that never has input.
    pub fn new(flags: SimFlags) -> Self {
        Self {
            mem: MemArray::new(),
            regs: RegFile::new(),
            origin: 0,
            halted: false,
            log: ActionLog::new(),
            micro_pc: 0,
            decoded: None,
            cmp_result: false,
            interrupt: InputInterrupt::Idle,
            instructions_run: 0,

            input: Box::new(EmptyInput),
            flags,
            breakpoints: HashSet::new(),
        }
    }

    /// Sets the source the simulator reads input from.
    pub fn set_input(&mut self, input: impl InputSource + Send + 'static) {
        self.input = Box::new(input);
    }

    /// Loads a program into memory.
    ///
    /// This copies the program to its origin, zeroes the rest of memory,
    /// and resets the registers (see [`Simulator::reset_registers`]).
    ///
    /// If the program does not fit, this errors and leaves the simulator untouched.
    pub fn load(&mut self, program: &AssembledProgram) -> Result<(), SimErr> {
        let (origin, words) = (program.origin(), program.words());
        if !self.mem.load_block(origin, words) {
            return Err(SimErr::ProgramTooLarge { origin, len: words.len() });
        }

        self.origin = origin;
        self.reset_registers();
        tracing::debug!(origin, len = words.len(), "loaded program");
        Ok(())
    }

    /// Resets the machine to the start of the loaded program.
    ///
    /// This zeroes every register (except the PC, which is set to the program's origin)
    /// and clears the halted flag, the log, and any in-progress instruction.
    /// Memory, flags, breakpoints, and the input source are preserved.
    ///
    /// This cannot be rewound.
    pub fn reset_registers(&mut self) {
        self.regs = RegFile::new();
        self.regs.set(Reg::PC, self.origin);
        self.halted = false;
        self.log.clear();
        self.micro_pc = 0;
        self.decoded = None;
        self.cmp_result = false;
        self.interrupt = InputInterrupt::Idle;
        self.instructions_run = 0;
        tracing::debug!(origin = self.origin, "reset registers");
    }

    /// Reads a register.
    pub fn reg(&self, reg: Reg) -> u16 {
        self.regs[reg]
    }
    /// Reads a word of memory (the address is masked to 12 bits).
    pub fn mem(&self, addr: u16) -> u16 {
        self.mem[addr]
    }
    /// Gets the register file.
    pub fn regs(&self) -> &RegFile {
        &self.regs
    }
    /// Gets the memory array.
    pub fn memory(&self) -> &MemArray {
        &self.mem
    }
    /// Whether the machine is halted.
    pub fn halted(&self) -> bool {
        self.halted
    }
    /// The origin of the loaded program.
    pub fn origin(&self) -> u16 {
        self.origin
    }
    /// The action log.
    pub fn log(&self) -> &ActionLog {
        &self.log
    }
    /// The state of the input request.
    pub fn interrupt(&self) -> InputInterrupt {
        self.interrupt
    }
    /// The currently decoded instruction, if one has been decoded.
    pub fn decoded(&self) -> Option<Opcode> {
        self.decoded
    }
    /// The index of the next micro-operation in the current instruction cycle.
    pub fn micro_pc(&self) -> usize {
        self.micro_pc
    }
    /// The result of the last `SkipCond` comparison.
    pub fn comparison_result(&self) -> bool {
        self.cmp_result
    }
    /// Whether the machine is waiting on the input source for a value.
    pub fn awaiting_input(&self) -> bool {
        self.interrupt == InputInterrupt::NeedsValue
    }

    /// The address of the instruction currently executing.
    ///
    /// Between instructions, this is the PC.
    /// Mid-instruction, this is found from the log, and falls back to the PC if the log is disabled.
    pub fn current_pc(&self) -> u16 {
        if self.micro_pc == 0 {
            return self.regs[Reg::PC];
        }
        self.log.actions()
            .rev()
            .find_map(|a| match *a {
                Action::StepStart { pc } => Some(pc),
                _ => None
            })
            .unwrap_or(self.regs[Reg::PC])
    }

    /// The source line of the instruction currently executing (see [`Simulator::current_pc`]).
    pub fn current_line(&self, program: &AssembledProgram) -> Option<usize> {
        program.source_line(self.current_pc())
    }

    /// Takes a snapshot of memory, registers, and the halted flag.
    pub fn state(&self) -> State {
        State {
            memory: self.mem.as_slice().to_vec(),
            registers: self.regs,
            halted: self.halted,
        }
    }

    /// Sets a register, recording the change into the log.
    ///
    /// The value is masked to the register's width.
    pub fn set_reg(&mut self, reg: Reg, value: u16) {
        let old = self.regs.set(reg, value);
        let new = self.regs[reg];
        self.record(Action::RegSet { reg, old, new });
    }

    /// Sets a word of memory, recording the change into the log.
    ///
    /// The address is masked to 12 bits.
    pub fn set_mem(&mut self, addr: u16, value: u16) {
        let addr = addr & ADDR_MASK;
        let old = self.mem.set(addr, value);
        self.record(Action::MemSet { addr, old, new: value });
    }

    /// Sets whether the machine is halted, recording the change into the log.
    ///
    /// Nothing is recorded if the value does not change.
    pub fn set_halted(&mut self, halt: bool) {
        if self.halted != halt {
            self.halted = halt;
            self.record(Action::Halt { halt, fault: None });
        }
    }

    /// Sets a register from its name and a textual value (see [`Simulator::set_reg`]).
    ///
    /// ```
    /// use marie_ensemble::sim::{Simulator, SimErr};
    /// use marie_ensemble::ast::Reg;
    ///
    /// let mut sim = Simulator::default();
    /// sim.set_reg_str("ac", "-1").unwrap();
    /// assert_eq!(sim.reg(Reg::AC), 0xFFFF);
    /// sim.set_reg_str("MBR", "0x1F").unwrap();
    /// assert_eq!(sim.reg(Reg::MBR), 0x1F);
    ///
    /// assert_eq!(sim.set_reg_str("R0", "1"), Err(SimErr::UnknownRegister("R0".to_string())));
    /// assert_eq!(sim.set_reg_str("AC", "one"), Err(SimErr::InvalidValue("one".to_string())));
    /// ```
    pub fn set_reg_str(&mut self, reg: &str, value: &str) -> Result<(), SimErr> {
        let reg = reg.parse::<Reg>()
            .map_err(|_| SimErr::UnknownRegister(reg.to_string()))?;
        let value = parse_value(value)?;
        self.set_reg(reg, value);
        Ok(())
    }

    /// Sets a word of memory from a textual value (see [`Simulator::set_mem`]).
    pub fn set_mem_str(&mut self, addr: u16, value: &str) -> Result<(), SimErr> {
        let value = parse_value(value)?;
        self.set_mem(addr, value);
        Ok(())
    }

    /// Records an action into the log (if logging is enabled).
    fn record(&mut self, action: Action) {
        tracing::trace!(micro_pc = self.micro_pc, %action, "recorded");
        if self.flags.enable_log {
            self.log.push(LogEntry { action, micro_pc: self.micro_pc, interrupt: self.interrupt });
        }
    }

    /// Halts the machine due to a fault.
    fn fault(&mut self, fault: Fault) -> Action {
        tracing::warn!(pc = self.regs[Reg::PC], %fault, "machine faulted");
        self.halted = true;
        Action::Halt { halt: true, fault: Some(fault) }
    }

    /// Copies the value of one register into another (masked to the target's width).
    fn transfer(&mut self, target: Reg, source: Reg) -> Action {
        let old = self.regs.set(target, self.regs[source]);
        Action::RegTransfer { target, source, old }
    }

    /// Executes one micro-step.
    ///
    /// This returns the action performed (which was also recorded into the log),
    /// or `None` if no progress could be made
    /// (because the machine is halted or is waiting on input).
    pub fn micro_step(&mut self) -> Option<Action> {
        loop {
            if self.halted {
                return None;
            }

            match self.interrupt {
                InputInterrupt::Idle => {},
                InputInterrupt::NeedsValue => {
                    let value = self.input.poll_input()?;
                    let new = value as u16;
                    let old = self.regs.set(Reg::IN, new);

                    let action = Action::Input { old, new };
                    self.record(action);
                    self.interrupt = InputInterrupt::NeedsLoad;
                    return Some(action);
                },
                InputInterrupt::NeedsLoad => {
                    let action = self.transfer(Reg::AC, Reg::IN);
                    self.record(action);
                    self.interrupt = InputInterrupt::Idle;
                    return Some(action);
                },
            }

            let op = match self.micro_pc.checked_sub(FETCH_DECODE.len()) {
                None => FETCH_DECODE[self.micro_pc],
                Some(i) => match self.decoded.and_then(|opcode| micro::program(opcode).get(i)) {
                    Some(&op) => op,
                    None => {
                        self.record(Action::StepEnd);
                        self.micro_pc = 0;
                        self.instructions_run += 1;
                        return Some(Action::StepEnd);
                    }
                }
            };

            let action = op.execute(self);
            if let Some(action) = action {
                self.record(action);
            }
            self.micro_pc += 1;

            // Operations which did nothing are folded into the next one.
            if action.is_some() {
                return action;
            }
        }
    }

    /// Executes micro-steps until the current instruction is complete.
    ///
    /// This returns whether any progress was made.
    /// If the machine starts waiting on input partway through the instruction,
    /// this stops there (and returns `true`).
    pub fn step(&mut self) -> bool {
        match self.micro_step() {
            None => false,
            Some(a) if a.is_step_end() => true,
            Some(_) => {
                while let Some(a) = self.micro_step() {
                    if a.is_step_end() { break; }
                }
                true
            }
        }
    }

    /// Rewinds the last recorded action.
    ///
    /// This returns the action undone, or `None` if the log is empty.
    pub fn micro_step_back(&mut self) -> Option<Action> {
        let LogEntry { action, micro_pc, interrupt } = self.log.pop()?;
        self.undo(action);
        self.micro_pc = micro_pc;
        self.interrupt = interrupt;

        tracing::trace!(micro_pc, %action, "rewound");
        Some(action)
    }

    /// Rewinds to the start of the last instruction cycle.
    ///
    /// This returns whether there are more actions left to rewind.
    pub fn step_back(&mut self) -> bool {
        while let Some(action) = self.micro_step_back() {
            if action.is_step_start() { break; }
        }
        !self.log.is_empty()
    }

    /// Inverts the effect of an action.
    fn undo(&mut self, action: Action) {
        match action {
            Action::StepStart { .. } => {},
            Action::StepEnd => self.instructions_run = self.instructions_run.saturating_sub(1),
            Action::Decode { old, .. } => self.decoded = old,
            Action::IncrementPC { old_pc } => { self.regs.set(Reg::PC, old_pc); },
            Action::Arithmetic { old_ac, .. } => { self.regs.set(Reg::AC, old_ac); },
            Action::Comparison { old_result, .. } => self.cmp_result = old_result,
            Action::MemRead { old_mbr, .. } => { self.regs.set(Reg::MBR, old_mbr); },
            Action::MemWrite { addr, old } | Action::MemSet { addr, old, .. } => { self.mem.set(addr, old); },
            Action::RegTransfer { target, old, .. } | Action::RegSet { reg: target, old, .. } => { self.regs.set(target, old); },
            Action::Input { old, .. } => { self.regs.set(Reg::IN, old); },
            Action::Output { .. } => {},
            Action::Halt { halt, .. } => self.halted = !halt,
        }
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The typical break conditions are:
    /// - the machine halts
    /// - the machine waits on input which is not ready
    /// - a breakpoint matches
    ///
    /// The tripwire and breakpoints are checked between whole instructions.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> RunStatus {
        let status = loop {
            if self.halted {
                break RunStatus::Halted;
            }
            if !tripwire(self) {
                break RunStatus::Tripwire;
            }

            if !self.step() {
                break match self.halted {
                    true  => RunStatus::Halted,
                    false => RunStatus::AwaitingInput,
                };
            }

            // After executing, check that any breakpoints were hit.
            if !self.halted && self.breakpoints.iter().any(|bp| bp.check(self)) {
                break RunStatus::Breakpoint;
            }
        };

        tracing::debug!(?status, instructions_run = self.instructions_run, "stopped running");
        status
    }

    /// Executes the program for one time budget.
    ///
    /// If the interval is zero, this runs until the machine halts
    /// (or until it stops for input or a breakpoint).
    ///
    /// Otherwise, this runs whole instructions until the interval has elapsed,
    /// then returns [`RunStatus::Paused`] so the caller can decide when to continue.
    pub fn run(&mut self, interval: Duration) -> RunStatus {
        if interval.is_zero() {
            return self.run_while(|_| true);
        }

        let start = Instant::now();
        match self.run_while(|_| start.elapsed() < interval) {
            RunStatus::Tripwire => RunStatus::Paused,
            status => status
        }
    }

    /// Executes the program for the time budget configured in [`SimFlags::run_interval`].
    pub fn run_batch(&mut self) -> RunStatus {
        self.run(self.flags.run_interval)
    }

    /// Executes the program with a limit on how many instructions to execute.
    pub fn run_with_limit(&mut self, max_instructions: u64) -> RunStatus {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_instructions)
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}
impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("regs", &self.regs)
            .field("origin", &self.origin)
            .field("halted", &self.halted)
            .field("micro_pc", &self.micro_pc)
            .field("decoded", &self.decoded)
            .field("cmp_result", &self.cmp_result)
            .field("interrupt", &self.interrupt)
            .field("instructions_run", &self.instructions_run)
            .field("log_len", &self.log.len())
            .field("flags", &self.flags)
            .field("breakpoints", &self.breakpoints)
            .finish_non_exhaustive()
    }
}

/// Parses a value typed by a user: decimal (possibly negative) or hexadecimal with a `0x` prefix.
fn parse_value(value: &str) -> Result<u16, SimErr> {
    let invalid = || SimErr::InvalidValue(value.to_string());

    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => parse_int_lit(hex, 16),
        None => parse_int_lit(trimmed, 10),
    }.map_err(|_| invalid())?;

    match (-0x8000..=0xFFFF).contains(&parsed) {
        true  => Ok(parsed as u16),
        false => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::asm::{assemble, AssembledProgram};
    use crate::ast::sim::Opcode;
    use crate::ast::Reg;

    use super::action::{Action, Fault, InputInterrupt};
    use super::debug::{Breakpoint, Comparator};
    use super::io::InputSource;
    use super::*;

    const COUNTER: &str = "
        Start, Load A
        Add B
        Store A
        Skipcond 000
        Jump Start
        Halt
        A, DEC 0
        B, DEC 10000
    ";

    fn load(src: &str, input: impl InputSource + Send + 'static) -> (Simulator, AssembledProgram) {
        let program = assemble(src).unwrap();
        let mut sim = Simulator::default();
        sim.set_input(input);
        sim.load(&program).unwrap();
        (sim, program)
    }

    fn run_to_halt(src: &str) -> (Simulator, AssembledProgram) {
        let (mut sim, program) = load(src, || Some(0));
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        (sim, program)
    }

    #[test]
    fn test_add_sub() {
        let (sim, _) = run_to_halt("Load A\nAdd B\nHalt\nA, DEC 1234\nB, DEC 1010");
        assert_eq!(sim.reg(Reg::AC), 2244);

        let (sim, _) = run_to_halt("Load A\nSubt B\nHalt\nA, DEC 1234\nB, DEC 123");
        assert_eq!(sim.reg(Reg::AC), 1111);

        let (sim, _) = run_to_halt("Load A\nAddI C\nHalt\nA, DEC 1234\nB, DEC 1010\nC, DEC 4");
        assert_eq!(sim.reg(Reg::AC), 2244);

        let (sim, _) = run_to_halt("Load A\nClear\nHalt\nA, DEC 1234");
        assert_eq!(sim.reg(Reg::AC), 0);

        let (sim, _) = run_to_halt("LoadImmi 0FFF\nHalt");
        assert_eq!(sim.reg(Reg::AC), 0xFFF);
    }

    #[test]
    fn test_load_store() {
        let (sim, _) = run_to_halt("Load A\nHalt\nA, DEC 1234");
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (sim, program) = run_to_halt("Load A\nStore B\nHalt\nA, DEC 1234\nB, DEC 0");
        assert_eq!(sim.mem(program.lookup_label("B").unwrap()), 1234);

        let (sim, _) = run_to_halt("LoadI A\nHalt\nA, DEC 3\nDEC 1234");
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (sim, program) = run_to_halt("Load A\nStoreI B\nHalt\nA, DEC 1234\nB, DEC 5\nC, DEC 4321");
        assert_eq!(sim.mem(program.lookup_label("C").unwrap()), 1234);
    }

    #[test]
    fn test_jumps() {
        let (sim, _) = run_to_halt("Jump A\nHalt\nA, Load B\nHalt\nB, DEC 1234");
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (sim, _) = run_to_halt("JumpI A\nHalt\nLoad B\nHalt\nA, DEC 2\nB, DEC 1234");
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (sim, program) = run_to_halt("Jns A\nA, DEC 1234\nHalt");
        assert_eq!(sim.mem(program.lookup_label("A").unwrap()), 1);
    }

    #[test]
    fn test_input_output() {
        let (mut sim, _) = load("Input\nHalt", || Some(1234));
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        assert_eq!(sim.reg(Reg::IN), 1234);
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (sim, _) = run_to_halt("Load A\nOutput\nHalt\nA, DEC 1234");
        assert_eq!(sim.reg(Reg::OUT), 1234);
        assert!(sim.log().actions().any(|a| *a == Action::Output { value: 1234 }));
    }

    #[test]
    fn test_input_masked() {
        let mut values = vec![-1, 0x12345];
        let (mut sim, _) = load("Input\nInput\nHalt", move || values.pop());

        sim.step();
        assert_eq!(sim.reg(Reg::AC), 0x2345);
        sim.step();
        assert_eq!(sim.reg(Reg::AC), 0xFFFF);
    }

    #[test]
    fn test_halt() {
        let (sim, _) = run_to_halt("Halt");
        assert_eq!(sim.reg(Reg::IR), 0x7000);
        assert!(sim.halted());
        assert_eq!(sim.log().last().map(|e| e.action), Some(Action::Halt { halt: true, fault: None }));
    }

    fn check_skipcond(cond: &str, expected: [u16; 3]) {
        let src = format!("
            Input
            Skipcond {cond}
            Jump NoSkip
            Load One
            Halt
            NoSkip, Load Zero
            Halt
            Zero, DEC 0
            One, DEC 1
        ");
        let mut inputs = vec![-1, 0, 1];
        let (mut sim, _) = load(&src, move || inputs.pop());

        for (i, ac) in expected.into_iter().enumerate() {
            assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
            assert_eq!(sim.reg(Reg::AC), ac, "Skipcond {cond}, run {i}");
            sim.reset_registers();
        }
    }

    #[test]
    fn test_skipcond() {
        // inputs are 1, 0, -1
        check_skipcond("000", [0, 0, 1]);
        check_skipcond("400", [0, 1, 0]);
        check_skipcond("800", [1, 0, 0]);
        check_skipcond("0C00", [1, 0, 1]);
    }

    #[test]
    fn test_fetch_decode_sequence() {
        let (mut sim, _) = load("Load A\nHalt\nA, DEC 5", || Some(0));

        let actions: Vec<_> = std::iter::from_fn(|| sim.micro_step())
            .take_while(|a| !a.is_step_end())
            .collect();
        assert_eq!(actions, [
            Action::StepStart { pc: 0 },
            Action::RegTransfer { target: Reg::MAR, source: Reg::PC, old: 0 },
            Action::MemRead { addr: 0, old_mbr: 0 },
            Action::RegTransfer { target: Reg::IR, source: Reg::MBR, old: 0 },
            Action::IncrementPC { old_pc: 0 },
            Action::Decode { old: None, opcode: Opcode::Load },
            Action::RegTransfer { target: Reg::MAR, source: Reg::IR, old: 0 },
            Action::MemRead { addr: 2, old_mbr: 0x1002 },
            Action::RegTransfer { target: Reg::AC, source: Reg::MBR, old: 0 },
        ]);
        assert_eq!(sim.micro_pc(), 0);
        assert_eq!(sim.instructions_run, 1);

        let pcs: Vec<_> = sim.log().entries().iter().map(|e| e.micro_pc).collect();
        assert_eq!(pcs, [0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_untaken_skip_folds() {
        let (mut sim, _) = load("Skipcond 400\nHalt", || Some(0));
        sim.set_reg(Reg::AC, 1);

        sim.step();
        let n_skip = sim.log().actions()
            .filter(|a| matches!(a, Action::IncrementPC { .. }))
            .count();
        assert_eq!(n_skip, 1);
        assert_eq!(sim.reg(Reg::PC), 1);
        assert!(sim.log().actions().any(|a| matches!(a, Action::Comparison { result: false, .. })));
    }

    #[test]
    fn test_input_suspends() {
        let (mut sim, _) = load("Input\nHalt", super::io::EmptyInput);

        assert_eq!(sim.run(Duration::ZERO), RunStatus::AwaitingInput);
        assert!(sim.awaiting_input());
        let logged = sim.log().len();

        // No progress, no log entries:
        assert_eq!(sim.micro_step(), None);
        assert!(!sim.step());
        assert_eq!(sim.log().len(), logged);

        sim.set_input(|| Some(7));
        assert_eq!(sim.micro_step(), Some(Action::Input { old: 0, new: 7 }));
        assert_eq!(sim.interrupt(), InputInterrupt::NeedsLoad);
        assert_eq!(sim.micro_step(), Some(Action::RegTransfer { target: Reg::AC, source: Reg::IN, old: 0 }));
        assert_eq!(sim.interrupt(), InputInterrupt::Idle);
        assert_eq!(sim.micro_step(), Some(Action::StepEnd));

        // Rewinding restores the request:
        sim.micro_step_back();
        sim.micro_step_back();
        assert_eq!(sim.interrupt(), InputInterrupt::NeedsLoad);
        sim.micro_step_back();
        assert_eq!(sim.interrupt(), InputInterrupt::NeedsValue);
        assert_eq!(sim.reg(Reg::IN), 0);
    }

    #[test]
    fn test_micro_step_back_rerun() {
        let (mut sim, _) = load(COUNTER, || Some(0));
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        let full_log = sim.log().clone();
        let full_state = sim.state();

        for i in 1..=full_log.len() {
            for _ in 0..i {
                assert!(sim.micro_step_back().is_some());
            }
            assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
            assert_eq!(sim.log(), &full_log, "rewound {i} micro-steps");
            assert_eq!(sim.state(), full_state, "rewound {i} micro-steps");
        }
    }

    #[test]
    fn test_step_back_rerun() {
        let (mut sim, _) = load(COUNTER, || Some(0));
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        let full_log = sim.log().clone();
        let full_state = sim.state();
        let steps = full_log.actions().filter(|a| a.is_step_start()).count();

        for i in 1..=steps {
            for _ in 0..i {
                sim.step_back();
            }
            assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
            assert_eq!(sim.log(), &full_log, "rewound {i} steps");
            assert_eq!(sim.state(), full_state, "rewound {i} steps");
        }

        // Rewinding everything:
        for _ in 0..steps - 1 {
            assert!(sim.step_back());
        }
        assert!(!sim.step_back());
        assert!(sim.log().is_empty());
        assert_eq!(sim.micro_step_back(), None);
        assert!(!sim.step_back());
    }

    #[test]
    fn test_rewind_to_load() {
        let mut rng = StdRng::seed_from_u64(0x4D41_5249);

        for _ in 0..16 {
            let words: Vec<u16> = (0..64)
                .map(|_| {
                    let opcode: u16 = rng.gen_range(0x0..=0xE);
                    (opcode << 12) | rng.gen_range(0x000..0x040)
                })
                .collect();
            let program = AssembledProgram::from_words(0, words);

            let mut sim = Simulator::default();
            sim.set_input(|| Some(42));
            sim.load(&program).unwrap();
            let initial = sim.state();

            sim.run_with_limit(256);
            let n = sim.log().len();
            for _ in 0..n {
                assert!(sim.micro_step_back().is_some());
            }
            assert!(sim.log().is_empty());
            assert_eq!(sim.state(), initial);
            assert_eq!(sim.micro_pc(), 0);
            assert_eq!(sim.decoded(), None);
            assert_eq!(sim.interrupt(), InputInterrupt::Idle);
        }
    }

    #[test]
    fn test_determinism() {
        let mut rng = StdRng::seed_from_u64(2244);
        let inputs: Vec<i32> = (0..32).map(|_| rng.gen_range(-100..100)).collect();
        let src = "
            Loop, Input
            Add Sum
            Store Sum
            Load N
            Subt One
            Store N
            Skipcond 400
            Jump Loop
            Load Sum
            Output
            Halt
            Sum, DEC 0
            N, DEC 32
            One, DEC 1
        ";

        let (mut a, _) = load(src, {
            let mut it = inputs.clone().into_iter();
            move || it.next()
        });
        let (mut b, _) = load(src, {
            let mut it = inputs.clone().into_iter();
            move || it.next()
        });
        assert_eq!(a.run(Duration::ZERO), RunStatus::Halted);
        while b.step() {}

        assert_eq!(a.log(), b.log());
        assert_eq!(a.state(), b.state());
        assert_eq!(a.reg(Reg::OUT), inputs.iter().sum::<i32>() as u16);
    }

    #[test]
    fn test_interleave() {
        let (mut sim, program) = load(COUNTER, || Some(0));
        sim.run(Duration::ZERO);
        let full_log = sim.log().clone();
        let full_state = sim.state();

        sim.step_back();
        sim.micro_step();
        sim.load(&program).unwrap();
        sim.step();
        sim.micro_step();
        sim.micro_step();
        sim.step();
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);

        assert_eq!(sim.log(), &full_log);
        assert_eq!(sim.state(), full_state);
    }

    #[test]
    fn test_pokes() {
        let (mut sim, program) = load("Load A\nHalt\nA, DEC 0", || Some(0));
        sim.set_mem(program.lookup_label("A").unwrap(), 1234);
        sim.run(Duration::ZERO);
        assert_eq!(sim.reg(Reg::AC), 1234);

        let (mut sim, _) = load("Output\nHalt", || Some(0));
        sim.set_reg(Reg::AC, 1234);
        sim.run(Duration::ZERO);
        assert_eq!(sim.reg(Reg::OUT), 1234);
    }

    #[test]
    fn test_pokes_logged() {
        let mut sim = Simulator::default();

        sim.set_reg(Reg::PC, 0xFFFF);
        assert_eq!(sim.log().last().map(|e| e.action), Some(Action::RegSet { reg: Reg::PC, old: 0, new: 0xFFF }));
        sim.set_mem(0x1123, 5);
        assert_eq!(sim.log().last().map(|e| e.action), Some(Action::MemSet { addr: 0x123, old: 0, new: 5 }));
        sim.set_halted(false);
        assert_eq!(sim.log().len(), 2);
        sim.set_halted(true);
        assert!(!sim.step());

        assert!(sim.micro_step_back().is_some());
        assert!(!sim.halted());
        assert!(sim.micro_step_back().is_some());
        assert_eq!(sim.mem(0x123), 0);
        assert!(sim.micro_step_back().is_some());
        assert_eq!(sim.reg(Reg::PC), 0);
        assert!(sim.log().is_empty());
    }

    #[test]
    fn test_set_str() {
        let mut sim = Simulator::default();
        assert_eq!(sim.set_reg_str("XYZ", "1"), Err(SimErr::UnknownRegister("XYZ".to_string())));
        assert_eq!(sim.set_reg_str("ac", "abc"), Err(SimErr::InvalidValue("abc".to_string())));
        assert_eq!(sim.set_reg_str("ac", "65536"), Err(SimErr::InvalidValue("65536".to_string())));
        assert_eq!(sim.set_mem_str(0, ""), Err(SimErr::InvalidValue("".to_string())));
        assert!(sim.log().is_empty());

        sim.set_reg_str("Mar", "0xABC").unwrap();
        assert_eq!(sim.reg(Reg::MAR), 0xABC);
        sim.set_mem_str(0x10, "-32768").unwrap();
        assert_eq!(sim.mem(0x10), 0x8000);
    }

    #[test]
    fn test_unsupported_opcode() {
        let mut sim = Simulator::default();
        sim.load(&AssembledProgram::from_words(0, vec![0xF000])).unwrap();

        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        assert_eq!(
            sim.log().last().map(|e| e.action),
            Some(Action::Halt { halt: true, fault: Some(Fault::UnsupportedOpcode(0xF)) })
        );

        sim.micro_step_back();
        assert!(!sim.halted());
        assert_eq!(sim.micro_pc(), FETCH_DECODE.len() - 1);
    }

    #[test]
    fn test_decode_rewinds_to_previous() {
        let (mut sim, _) = load("Clear\nHalt", || Some(0));
        sim.step();
        assert_eq!(sim.decoded(), Some(Opcode::LoadImmi));

        // fetch-decode of Halt:
        for _ in 0..FETCH_DECODE.len() {
            sim.micro_step();
        }
        assert_eq!(sim.decoded(), Some(Opcode::Halt));
        sim.micro_step_back();
        assert_eq!(sim.decoded(), Some(Opcode::LoadImmi));
    }

    #[test]
    fn test_log_disabled() {
        let program = assemble(COUNTER).unwrap();
        let mut sim = Simulator::new(SimFlags { enable_log: false, ..Default::default() });
        sim.load(&program).unwrap();

        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
        assert!(sim.log().is_empty());
        assert_eq!(sim.micro_step_back(), None);
        assert!(!sim.step_back());
        assert!(sim.halted());
    }

    #[test]
    fn test_breakpoints() {
        let (mut sim, program) = load("Load A\nAdd A\nAdd A\nHalt\nA, DEC 1", || Some(0));
        sim.breakpoints.insert(Breakpoint::line(&program, 3).unwrap());
        sim.breakpoints.insert(Breakpoint::Reg { reg: Reg::AC, value: Comparator::Eq(3) });

        assert_eq!(sim.run(Duration::ZERO), RunStatus::Breakpoint);
        assert_eq!(sim.reg(Reg::PC), 2);
        assert_eq!(sim.reg(Reg::AC), 2);
        assert_eq!(sim.current_line(&program), Some(3));

        assert_eq!(sim.run(Duration::ZERO), RunStatus::Breakpoint);
        assert_eq!(sim.reg(Reg::AC), 3);
        assert_eq!(sim.run(Duration::ZERO), RunStatus::Halted);
    }

    #[test]
    fn test_run_with_limit() {
        let (mut sim, _) = load(COUNTER, || Some(0));
        assert_eq!(sim.run_with_limit(2), RunStatus::Tripwire);
        assert_eq!(sim.instructions_run, 2);
        assert_eq!(sim.reg(Reg::AC), 10000);

        assert_eq!(sim.run_with_limit(u64::MAX), RunStatus::Halted);
    }

    #[test]
    fn test_run_pauses() {
        let (mut sim, _) = load("Loop, Jump Loop", || Some(0));
        assert_eq!(sim.run(Duration::from_millis(5)), RunStatus::Paused);
        assert!(sim.instructions_run > 0);
        assert!(!sim.halted());

        sim.flags.run_interval = Duration::from_millis(1);
        assert_eq!(sim.run_batch(), RunStatus::Paused);
    }

    #[test]
    fn test_current_line() {
        let (mut sim, program) = load("Load A\nHalt\nA, DEC 1", || Some(0));
        assert_eq!(sim.current_line(&program), Some(1));
        sim.micro_step();
        sim.micro_step();
        sim.micro_step();
        assert_eq!(sim.current_line(&program), Some(1));
        sim.step();
        assert_eq!(sim.current_line(&program), Some(2));
    }

    #[test]
    fn test_program_too_large() {
        let mut sim = Simulator::default();
        let program = AssembledProgram::from_words(0xFFF, vec![0, 0]);
        assert_eq!(sim.load(&program), Err(SimErr::ProgramTooLarge { origin: 0xFFF, len: 2 }));

        // Origins past the end of memory are rejected, and still have help text.
        let program = AssembledProgram::from_words(0x2000, vec![0]);
        let err = sim.load(&program).unwrap_err();
        assert_eq!(err, SimErr::ProgramTooLarge { origin: 0x2000, len: 1 });
        assert_eq!(crate::err::Error::help(&err).as_deref(), Some("at most 0 words fit after 2000"));

        let program = AssembledProgram::from_words(0xFFF, vec![0x7000]);
        sim.load(&program).unwrap();
        assert_eq!(sim.reg(Reg::PC), 0xFFF);
        assert_eq!(sim.mem(0xFFF), 0x7000);
    }

    #[test]
    fn test_origin() {
        let (sim, program) = run_to_halt("ORG 100\nLoad A\nHalt\nA, DEC 9");
        assert_eq!(sim.origin(), 0x100);
        assert_eq!(program.lookup_label("A"), Some(0x102));
        assert_eq!(sim.reg(Reg::AC), 9);
        assert_eq!(sim.reg(Reg::PC), 0x102);
    }

    #[test]
    fn test_state_serde() {
        let (sim, _) = run_to_halt("Load A\nHalt\nA, DEC 1234");
        let state = sim.state();
        assert_eq!(state.memory.len(), crate::asm::MEM_SIZE);

        let json = serde_json::to_string(&state).unwrap();
        let back: State = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);

        let flags: SimFlags = serde_json::from_str(&serde_json::to_string(&sim.flags).unwrap()).unwrap();
        assert_eq!(flags, SimFlags::default());
    }
}
