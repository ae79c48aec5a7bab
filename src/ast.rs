//! Components relating to the abstract syntax trees (ASTs)
//! used in representing assembly instructions.
//!
//! These components together are used to construct...
//! - [`asm::Line`] (a data structure holding a classified line of assembly source code),
//! - [`asm::Operator`] (the resolved meaning of an operator word),
//! - and [`sim::Opcode`] (the opcode of a bytecode instruction, along with its metadata).

pub mod asm;
pub mod sim;

use serde::{Deserialize, Serialize};

/// A register of the MARIE machine.
///
/// Registers are either 12 bits wide (`PC`, `MAR`)
/// or 16 bits wide (everything else).
///
/// ```
/// use marie_ensemble::ast::Reg;
///
/// assert_eq!("mar".parse::<Reg>(), Ok(Reg::MAR));
/// assert_eq!(Reg::MAR.mask(), 0x0FFF);
/// assert_eq!(Reg::AC.to_string(), "AC");
/// ```
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reg {
    /// Accumulator.
    AC,
    /// Input register.
    IN,
    /// Instruction register.
    IR,
    /// Memory address register.
    MAR,
    /// Memory buffer register.
    MBR,
    /// Output register.
    OUT,
    /// Program counter.
    PC,
}
impl Reg {
    /// All registers, in the order they are stored in the register file.
    pub const ALL: [Reg; 7] = [Reg::AC, Reg::IN, Reg::IR, Reg::MAR, Reg::MBR, Reg::OUT, Reg::PC];

    /// The bit mask applied to every value written to this register.
    pub fn mask(self) -> u16 {
        match self {
            Reg::PC | Reg::MAR => 0x0FFF,
            _ => 0xFFFF,
        }
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Reg::AC  => "AC",
            Reg::IN  => "IN",
            Reg::IR  => "IR",
            Reg::MAR => "MAR",
            Reg::MBR => "MBR",
            Reg::OUT => "OUT",
            Reg::PC  => "PC",
        };
        f.pad(name)
    }
}
impl std::str::FromStr for Reg {
    type Err = RegParseErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reg::ALL.into_iter()
            .find(|r| r.to_string().eq_ignore_ascii_case(s))
            .ok_or(RegParseErr)
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        value as usize
    }
}

/// Error from parsing a register name which does not exist.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[error("unknown register")]
pub struct RegParseErr;
