//! This module is used for holding simulation instructions ([`Opcode`]),
//! which are the instructions directly executed by the simulator.
//!
//! A MARIE word is laid out as `oooo aaaa aaaa aaaa`,
//! where `o` is the 4-bit opcode and `a` is the 12-bit operand.
//! Opcode `0xF` is unused.
//!
//! Besides decoding, each opcode carries metadata ([`InstrInfo`])
//! which editor tooling can use for autocomplete and hover text.

use serde::{Deserialize, Serialize};

macro_rules! opcodes {
    ($($(#[$m:meta])* $name:ident = $value:literal, operand: $operand:literal, $desc:literal;)+) => {
        /// A MARIE opcode.
        #[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum Opcode {
            $($(#[$m])* $name = $value),+
        }

        impl Opcode {
            /// All opcodes, in the order of the instruction table.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name),+];

            /// Decodes a 4-bit opcode. Returns `None` for opcode `0xF`.
            pub fn from_bits(bits: u8) -> Option<Self> {
                match bits {
                    $($value => Some(Opcode::$name)),+,
                    _ => None
                }
            }

            /// The display name of this instruction (e.g., `SkipCond`).
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name)),+
                }
            }

            /// Whether this instruction requires an operand.
            pub fn has_operand(self) -> bool {
                match self {
                    $(Opcode::$name => $operand),+
                }
            }

            /// A human readable description of the instruction and its RTL.
            pub fn description(self) -> &'static str {
                match self {
                    $(Opcode::$name => $desc),+
                }
            }
        }
    };
}
opcodes! {
    /// Jump and store.
    JnS = 0x0, operand: true,
        "Store the address of the next instruction into memory at address X, then jump to X + 1.\n\nM[X] ← PC\nPC ← X + 1";
    /// Load from memory.
    Load = 0x1, operand: true,
        "Load the value at the address X into the AC.\n\nAC ← M[X]";
    /// Store into memory.
    Store = 0x2, operand: true,
        "Store the value of the AC into memory at address X.\n\nM[X] ← AC";
    /// Add from memory.
    Add = 0x3, operand: true,
        "Add value at address X to the AC.\n\nAC ← AC + M[X]";
    /// Subtract from memory.
    Subt = 0x4, operand: true,
        "Subtract value at address X from the AC.\n\nAC ← AC - M[X]";
    /// Read from input.
    Input = 0x5, operand: false,
        "Read the next value from user input.\n\nAC ← IN";
    /// Write to output.
    Output = 0x6, operand: false,
        "Output the value in the AC.\n\nOUT ← AC";
    /// Stop the machine.
    Halt = 0x7, operand: false,
        "Stop execution of the program.";
    /// Conditionally skip the next instruction.
    SkipCond = 0x8, operand: true,
        "Skip the next instruction if the condition indicated by X holds:\n- 000: Skip if AC < 0\n- 400: Skip if AC = 0\n- 800: Skip if AC > 0\n- C00: Skip if AC ≠ 0";
    /// Unconditional jump.
    Jump = 0x9, operand: true,
        "Jump to address X.\n\nPC ← X";
    /// Load a 12-bit immediate.
    LoadImmi = 0xA, operand: true,
        "Set the AC to the given 12-bit unsigned immediate value X.\n\nAC ← X";
    /// Add indirect.
    AddI = 0xB, operand: true,
        "Use the contents at address X as the address of the value to add to the AC.\n\nAC ← AC + M[M[X]]";
    /// Jump indirect.
    JumpI = 0xC, operand: true,
        "Use the contents at address X as the memory address to jump to.\n\nPC ← M[X]";
    /// Load indirect.
    LoadI = 0xD, operand: true,
        "Use the contents at address X as the address of the value to load into the AC.\n\nAC ← M[M[X]]";
    /// Store indirect.
    StoreI = 0xE, operand: true,
        "Use the contents at address X as the memory address at which to store the value of the AC.\n\nM[M[X]] ← AC";
}

impl Opcode {
    /// Decodes the opcode of an instruction word (`IR[15:12]`).
    pub fn decode(word: u16) -> Result<Self, u8> {
        let bits = (word >> 12) as u8;
        Self::from_bits(bits).ok_or(bits)
    }

    /// Looks up an instruction by its mnemonic, case-insensitively.
    pub fn from_mnemonic(m: &str) -> Option<Self> {
        Self::ALL.iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(m))
    }

    /// The 4-bit value of this opcode.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Encodes this opcode with the given 12-bit operand.
    pub fn encode(self, operand: u16) -> u16 {
        (u16::from(self.bits()) << 12) | (operand & 0x0FFF)
    }

    /// The metadata of this instruction.
    pub fn info(self) -> InstrInfo {
        InstrInfo {
            name: self.name(),
            opcode: self.bits(),
            operand: self.has_operand(),
            description: self.description()
        }
    }
}
impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Metadata about an instruction, for editor tooling.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct InstrInfo {
    /// The name of the instruction.
    pub name: &'static str,
    /// The 4-bit opcode.
    pub opcode: u8,
    /// Whether the instruction accepts an operand.
    pub operand: bool,
    /// A description of the instruction.
    pub description: &'static str,
}

/// Lists the metadata of every supported instruction.
///
/// ```
/// use marie_ensemble::ast::sim::instructions;
///
/// let add = instructions().find(|i| i.name == "Add").unwrap();
/// assert_eq!(add.opcode, 0x3);
/// assert!(add.operand);
/// ```
pub fn instructions() -> impl Iterator<Item = InstrInfo> {
    Opcode::ALL.iter().map(|op| op.info())
}
