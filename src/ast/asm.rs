//! This module holds the AST for a line of MARIE assembly source code.
//!
//! A source file is a list of lines, each of which is classified into a [`Line`].
//! Statement lines ([`Stmt`]) keep their operator and operand as written,
//! because the meaning of the operand (address, label, or literal)
//! depends on the operator and is only resolved during assembly.

use std::str::FromStr;

use super::sim::Opcode;

/// A classified line of MARIE source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Line {
    /// An empty line, whitespace, or only a comment.
    Blank,
    /// An origination directive (`org 100`).
    Org(u16),
    /// A statement (an instruction, a directive, or `end`).
    Stmt(Stmt),
}

/// A statement: `[LABEL,] OPERATOR [OPERAND] [/comment]`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Stmt {
    /// The label defined on this line, if any.
    ///
    /// Labels are case-sensitive.
    pub label: Option<String>,
    /// The operator, lowercased.
    pub operator: String,
    /// The operand, as written.
    pub operand: Option<String>,
}
impl Stmt {
    /// Whether this is the `end` keyword, which stops assembly.
    pub fn is_end(&self) -> bool {
        self.operator == "end"
    }
}

/// The radix of a data directive (`DEC`, `OCT`, `HEX`).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Radix {
    /// `OCT`
    Oct,
    /// `DEC`
    Dec,
    /// `HEX`
    Hex,
}
impl Radix {
    /// The numeric base of this radix.
    pub fn base(self) -> u32 {
        match self {
            Radix::Oct => 8,
            Radix::Dec => 10,
            Radix::Hex => 16,
        }
    }
}

/// The meaning of a statement's operator.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Operator {
    /// A machine instruction.
    Instr(Opcode),
    /// `ADR X`, an alias for `JnS X`.
    Adr,
    /// `CLEAR`, an alias for `LoadImmi 0`.
    Clear,
    /// A data directive, which stores its operand literally.
    Data(Radix),
}
impl FromStr for Operator {
    type Err = ();

    /// Resolves an operator case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_lowercase() {
            "adr"   => Ok(Operator::Adr),
            "clear" => Ok(Operator::Clear),
            "oct"   => Ok(Operator::Data(Radix::Oct)),
            "dec"   => Ok(Operator::Data(Radix::Dec)),
            "hex"   => Ok(Operator::Data(Radix::Hex)),
            m => Opcode::from_mnemonic(m).map(Operator::Instr).ok_or(()),
        }
    }
}
