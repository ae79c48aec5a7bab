//! Utilities to debug simulation.
//!
//! The key type here is [`Breakpoint`], which can be appended to the [`Simulator`]'s
//! breakpoint field to cause the simulator to break.
use std::fmt::Write;

use crate::asm::AssembledProgram;
use crate::ast::Reg;

use super::Simulator;

/// Common breakpoints.
#[derive(PartialEq, Eq, Hash, Clone)]
pub enum Breakpoint {
    /// Break when the PC is equal to the given value.
    PC(u16),

    /// Break when the provided register's value matches the predicate.
    Reg {
        /// Register to check.
        reg: Reg,
        /// Predicate to break against.
        value: Comparator
    },
    /// Break when the word at the provided address matches the predicate.
    Mem {
        /// Address to check.
        addr: u16,
        /// Predicate to break against.
        value: Comparator
    },
}

impl Breakpoint where Breakpoint: Send + Sync { /* assert Breakpoint is send/sync */ }

impl Breakpoint {
    /// Creates a breakpoint on the instruction assembled from the given source line.
    ///
    /// This returns `None` if that line did not produce a word.
    ///
    /// ```
    /// use marie_ensemble::asm::assemble;
    /// use marie_ensemble::sim::debug::Breakpoint;
    ///
    /// let program = assemble("ORG 100\nLoad A\n\nHalt\nA, DEC 1").unwrap();
    /// assert_eq!(Breakpoint::line(&program, 4), Some(Breakpoint::PC(0x101)));
    /// assert_eq!(Breakpoint::line(&program, 3), None);
    /// ```
    pub fn line(program: &AssembledProgram, line: usize) -> Option<Self> {
        program.lookup_line(line).map(Breakpoint::PC)
    }

    /// Checks if a break should occur.
    pub fn check(&self, sim: &Simulator) -> bool {
        match self {
            Breakpoint::PC(expected) => *expected == sim.reg(Reg::PC),
            Breakpoint::Reg { reg, value: cmp } => cmp.check(sim.reg(*reg)),
            Breakpoint::Mem { addr, value: cmp } => cmp.check(sim.mem(*addr)),
        }
    }

    fn fmt_bp(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::PC(expected) => {
                write!(f, "PC == {expected:03X}")?;
            },
            Self::Reg { reg, value } => {
                write!(f, "{reg} ")?;
                value.fmt_cmp(f)?;
            },
            Self::Mem { addr, value } => {
                write!(f, "M[{addr:03X}] ")?;
                value.fmt_cmp(f)?;
            },
        }
        Ok(())
    }
}
impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Breakpoint(")?;
        self.fmt_bp(f)?;
        f.write_char(')')
    }
}
/// Predicate on a 16-bit word, comparing it against a fixed value.
///
/// Words are compared unsigned, so `Lt(0)` never matches and `Ge(0x8000)`
/// matches every word with its sign bit set.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Comparator {
    /// Never matches.
    Never,
    /// Matches words less than the value.
    Lt(u16),
    /// Matches words equal to the value.
    Eq(u16),
    /// Matches words less than or equal to the value.
    Le(u16),
    /// Matches words greater than the value.
    Gt(u16),
    /// Matches words not equal to the value.
    Ne(u16),
    /// Matches words greater than or equal to the value.
    Ge(u16),
    /// Always matches.
    Always
}
impl Comparator {
    /// The operator symbol and the value compared against, if this is not a constant predicate.
    fn parts(&self) -> Option<(&'static str, u16)> {
        match *self {
            Comparator::Never | Comparator::Always => None,
            Comparator::Lt(r) => Some(("<", r)),
            Comparator::Eq(r) => Some(("==", r)),
            Comparator::Le(r) => Some(("<=", r)),
            Comparator::Gt(r) => Some((">", r)),
            Comparator::Ne(r) => Some(("!=", r)),
            Comparator::Ge(r) => Some((">=", r)),
        }
    }

    /// Checks if the word matches the predicate.
    pub fn check(&self, word: u16) -> bool {
        use std::cmp::Ordering::{self, Equal, Greater, Less};

        let (accepted, r): (&[Ordering], u16) = match *self {
            Comparator::Never  => return false,
            Comparator::Always => return true,
            Comparator::Lt(r)  => (&[Less], r),
            Comparator::Eq(r)  => (&[Equal], r),
            Comparator::Le(r)  => (&[Less, Equal], r),
            Comparator::Gt(r)  => (&[Greater], r),
            Comparator::Ne(r)  => (&[Less, Greater], r),
            Comparator::Ge(r)  => (&[Equal, Greater], r),
        };
        accepted.contains(&word.cmp(&r))
    }

    fn fmt_cmp(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self, self.parts()) {
            (_, Some((op, r))) => write!(f, "{op} {r:04X}"),
            (Comparator::Always, None) => f.write_str("always"),
            (_, None) => f.write_str("never"),
        }
    }
}
