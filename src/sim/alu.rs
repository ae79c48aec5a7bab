//! The arithmetic logic unit.
//!
//! These are pure functions of register values.
//! The simulator is responsible for reading their inputs out of
//! the register file and writing their outputs back.

use serde::{Deserialize, Serialize};

/// An arithmetic operation whose result is stored in the AC.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArithOp {
    /// `AC ← AC + MBR`
    Add,
    /// `AC ← AC - MBR`
    Sub,
    /// `AC ← IR[11:0]`
    LoadImmi,
}
impl ArithOp {
    /// Computes the new value of the AC.
    pub fn apply(self, ac: u16, mbr: u16, ir: u16) -> u16 {
        match self {
            ArithOp::Add => ac.wrapping_add(mbr),
            ArithOp::Sub => ac.wrapping_sub(mbr),
            ArithOp::LoadImmi => ir & 0x0FFF,
        }
    }
}
impl std::fmt::Display for ArithOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArithOp::Add => f.write_str("ADD"),
            ArithOp::Sub => f.write_str("SUB"),
            ArithOp::LoadImmi => f.write_str("LOAD_IMMI"),
        }
    }
}

/// A comparison on the AC, used by `SkipCond`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CmpOp {
    /// AC is negative (top bit set).
    AcNeg,
    /// AC is zero.
    AcZero,
    /// AC is positive (nonzero, top bit clear).
    AcPos,
    /// AC is nonzero.
    AcNonZero,
}
impl CmpOp {
    /// Selects the comparison from `IR[11:10]`.
    ///
    /// ```
    /// use marie_ensemble::sim::alu::CmpOp;
    ///
    /// assert_eq!(CmpOp::from_ir(0x8000), Some(CmpOp::AcNeg));
    /// assert_eq!(CmpOp::from_ir(0x8400), Some(CmpOp::AcZero));
    /// assert_eq!(CmpOp::from_ir(0x8800), Some(CmpOp::AcPos));
    /// assert_eq!(CmpOp::from_ir(0x8C00), Some(CmpOp::AcNonZero));
    /// ```
    pub fn from_ir(ir: u16) -> Option<Self> {
        match ir & 0x0C00 {
            0x000 => Some(CmpOp::AcNeg),
            0x400 => Some(CmpOp::AcZero),
            0x800 => Some(CmpOp::AcPos),
            0xC00 => Some(CmpOp::AcNonZero),
            _ => None
        }
    }

    /// Evaluates the comparison on the AC.
    pub fn check(self, ac: u16) -> bool {
        let negative = ac & 0x8000 != 0;
        match self {
            CmpOp::AcNeg => negative,
            CmpOp::AcZero => ac == 0,
            CmpOp::AcPos => ac != 0 && !negative,
            CmpOp::AcNonZero => ac != 0,
        }
    }
}
impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmpOp::AcNeg => f.write_str("AC_NEG"),
            CmpOp::AcZero => f.write_str("AC_ZERO"),
            CmpOp::AcPos => f.write_str("AC_POS"),
            CmpOp::AcNonZero => f.write_str("AC_NON_ZERO"),
        }
    }
}
