//! Assembling MARIE source code into machine words.
//!
//! The module's key function is [`assemble`], which converts source code
//! into an [`AssembledProgram`] (or a list of every error found along the way).
//!
//! Assembly occurs in two passes:
//! 1. The structural pass, where each line is parsed, the origin is determined,
//!    labels are assigned addresses, and the source map is built.
//!    This pass stops at the first `END` keyword.
//! 2. The encoding pass, where each statement is converted into its word,
//!    resolving labels, address literals, and data literals.
//!
//! Errors do not stop either pass, so every problem in the source is reported at once.
//! If any error occurs, no program is produced.
//!
//! ```
//! use marie_ensemble::asm::assemble;
//!
//! let program = assemble("
//!     ORG 100
//!     Load A
//!     Halt
//!     A, DEC 12
//! ").unwrap();
//!
//! assert_eq!(program.origin(), 0x100);
//! assert_eq!(program.words(), &[0x1102, 0x7000, 0x000C]);
//! assert_eq!(program.lookup_label("A"), Some(0x102));
//! assert_eq!(program.source_line(0x101), Some(4));
//! ```
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ast::asm::{Line, Operator, Radix, Stmt};
use crate::ast::sim::Opcode;
use crate::parse::lex::{parse_int_lit, IntLitErr};
use crate::parse::{parse_line, ParseErr};

/// The number of addressable words in MARIE memory.
pub const MEM_SIZE: usize = 0x1000;

/// The category of an assembly error.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum ErrCategory {
    /// The source is malformed.
    Syntax,
    /// A label was misused.
    Label,
    /// A value does not fit where it is placed.
    Value,
}
impl std::fmt::Display for ErrCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrCategory::Syntax => f.write_str("Syntax error"),
            ErrCategory::Label  => f.write_str("Label error"),
            ErrCategory::Value  => f.write_str("Value error"),
        }
    }
}

/// Kinds of errors that can occur from assembling given source code.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum AsmErrKind {
    /// A second `ORG`, or an `ORG` after a statement.
    #[error("Unexpected origination directive.")]
    UnexpectedOrg,
    /// Line could not be split into label, operator, and operand.
    #[error("Line has incorrect form.")]
    IncorrectForm,
    /// Label starts with a digit.
    #[error("Labels cannot start with a number.")]
    LabelStartsWithDigit,
    /// Label contains whitespace.
    #[error("Labels cannot contain whitespace.")]
    LabelHasWhitespace,
    /// Label was already defined on an earlier line.
    #[error("Labels must be unique. The label '{label}' was already defined on line {first_line}.")]
    DuplicateLabel {
        /// The label.
        label: String,
        /// The line of the first definition.
        first_line: usize
    },
    /// Statements extend past the end of memory.
    #[error("Program does not fit in memory.")]
    ProgramTooLarge,
    /// Data directive has no operand.
    #[error("Expected operand.")]
    ExpectedLiteral,
    /// Data directive operand has characters outside of its radix.
    #[error("Failed to parse operand.")]
    InvalidLiteral,
    /// Data directive operand does not fit in a word.
    #[error("Literal out of bounds.")]
    LiteralOutOfBounds,
    /// Operator is not an instruction or directive.
    #[error("Unknown operator '{0}'.")]
    UnknownOperator(String),
    /// Instruction requires an operand, but none was given.
    #[error("Expected operand for {0}.")]
    ExpectedOperand(String),
    /// Instruction takes no operand, but one was given.
    #[error("Unexpected operand '{operand}' for '{operator}'.")]
    UnexpectedOperand {
        /// The operator.
        operator: String,
        /// The operand which was given.
        operand: String
    },
    /// Address literal is above `0xFFF`.
    #[error("Address 0x{0} is out of bounds.")]
    AddrOutOfBounds(String),
    /// Operand is not an address literal and not a defined label.
    #[error("Unknown label '{0}'.")]
    UnknownLabel(String),
}
impl AsmErrKind {
    /// The category this error falls in.
    pub fn category(&self) -> ErrCategory {
        match self {
            AsmErrKind::DuplicateLabel { .. } => ErrCategory::Label,
            AsmErrKind::ProgramTooLarge | AsmErrKind::LiteralOutOfBounds => ErrCategory::Value,
            _ => ErrCategory::Syntax,
        }
    }
}
impl From<ParseErr> for AsmErrKind {
    fn from(value: ParseErr) -> Self {
        match value {
            ParseErr::IncorrectForm        => AsmErrKind::IncorrectForm,
            ParseErr::LabelStartsWithDigit => AsmErrKind::LabelStartsWithDigit,
            ParseErr::LabelHasWhitespace   => AsmErrKind::LabelHasWhitespace,
        }
    }
}

/// Error from assembling given source code.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct AsmErr {
    /// The kind of error.
    pub kind: AsmErrKind,
    /// The 1-based source line associated with this error.
    pub line: usize
}
impl AsmErr {
    /// Creates a new [`AsmErr`].
    pub fn new(kind: AsmErrKind, line: usize) -> Self {
        AsmErr { kind, line }
    }

    /// The category of this error.
    pub fn category(&self) -> ErrCategory {
        self.kind.category()
    }
}
impl std::fmt::Display for AsmErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category(), self.kind)
    }
}
impl std::error::Error for AsmErr {}
impl crate::err::Error for AsmErr {
    fn line(&self) -> Option<usize> {
        Some(self.line)
    }

    fn help(&self) -> Option<Cow<str>> {
        match &self.kind {
            AsmErrKind::UnexpectedOrg        => Some("ORG may only appear once, before any statement".into()),
            AsmErrKind::IncorrectForm        => Some("a line should look like `[LABEL,] OPERATOR [OPERAND] [/comment]`".into()),
            AsmErrKind::LabelStartsWithDigit => None,
            AsmErrKind::LabelHasWhitespace   => Some("remove the whitespace between the label and the comma".into()),
            AsmErrKind::DuplicateLabel { .. } => Some("rename one of the labels".into()),
            AsmErrKind::ProgramTooLarge      => Some(format!("there are only {MEM_SIZE} words of memory; try lowering the ORG").into()),
            AsmErrKind::ExpectedLiteral      => None,
            AsmErrKind::InvalidLiteral       => Some("DEC takes 0-9 (and an optional '-'), OCT takes 0-7, HEX takes 0-9 and A-F".into()),
            AsmErrKind::LiteralOutOfBounds   => Some("DEC must be within [-32768, 65535], HEX and OCT must be within [0, 65535]".into()),
            AsmErrKind::UnknownOperator(_)   => None,
            AsmErrKind::ExpectedOperand(_)   => None,
            AsmErrKind::UnexpectedOperand { .. } => None,
            AsmErrKind::AddrOutOfBounds(_)   => Some("addresses must be within [000, FFF]".into()),
            AsmErrKind::UnknownLabel(_)      => Some("operands starting with a digit are read as hex addresses, everything else as labels".into()),
        }
    }
}

/// A fully assembled program.
///
/// This is immutable once produced by [`assemble`].
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct AssembledProgram {
    origin: u16,
    program: Vec<u16>,
    symbols: BTreeMap<String, u16>,
    source_map: BTreeMap<u16, usize>,
}
impl AssembledProgram {
    /// Creates a program from a raw memory image with no debug information.
    pub fn from_words(origin: u16, program: Vec<u16>) -> Self {
        Self { origin, program, symbols: BTreeMap::new(), source_map: BTreeMap::new() }
    }

    /// The address at which the program starts.
    pub fn origin(&self) -> u16 {
        self.origin
    }
    /// The assembled words, starting from the origin.
    pub fn words(&self) -> &[u16] {
        &self.program
    }
    /// The number of assembled words.
    pub fn len(&self) -> usize {
        self.program.len()
    }
    /// Whether this program has no words.
    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }
    /// The address one past the last word of the program.
    pub fn end(&self) -> usize {
        usize::from(self.origin) + self.program.len()
    }

    /// The label table, mapping each label to its address.
    pub fn symbols(&self) -> &BTreeMap<String, u16> {
        &self.symbols
    }
    /// The source map, mapping each address to its 1-based source line.
    pub fn source_map(&self) -> &BTreeMap<u16, usize> {
        &self.source_map
    }

    /// Gets the address of a label.
    pub fn lookup_label(&self, label: &str) -> Option<u16> {
        self.symbols.get(label).copied()
    }
    /// Gets a label defined at the given address.
    ///
    /// If several labels are defined at the same address, the alphabetically first is returned.
    pub fn rev_lookup_label(&self, addr: u16) -> Option<&str> {
        self.symbols.iter()
            .find(|&(_, &a)| a == addr)
            .map(|(label, _)| &**label)
    }
    /// Gets the source line which produced the word at the given address.
    pub fn source_line(&self, addr: u16) -> Option<usize> {
        self.source_map.get(&addr).copied()
    }
    /// Gets the address of the word produced by the given source line.
    pub fn lookup_line(&self, line: usize) -> Option<u16> {
        self.source_map.iter()
            .find(|&(_, &l)| l == line)
            .map(|(&addr, _)| addr)
    }
}

/// Assembles source code into a program.
///
/// If any line has errors, every error found is returned (in order of discovery)
/// and no program is produced.
pub fn assemble(src: &str) -> Result<AssembledProgram, Vec<AsmErr>> {
    let mut errors = vec![];
    let mut origin = None;
    let mut parsed: Vec<(usize, Stmt)> = vec![];
    let mut symbols = BTreeMap::new();
    let mut label_lines = HashMap::new();
    let mut source_map = BTreeMap::new();
    let mut overflowed = false;

    // Pass 1: structure
    for (i, text) in src.lines().enumerate() {
        let lno = i + 1;
        let stmt = match parse_line(text) {
            Ok(Line::Blank) => continue,
            Ok(Line::Org(addr)) => {
                match origin.is_none() && parsed.is_empty() {
                    true  => origin = Some(addr),
                    false => errors.push(AsmErr::new(AsmErrKind::UnexpectedOrg, lno)),
                }
                continue;
            },
            Ok(Line::Stmt(stmt)) => stmt,
            Err(e) => {
                errors.push(AsmErr::new(e.into(), lno));
                continue;
            }
        };

        let addr = usize::from(origin.unwrap_or(0)) + parsed.len();
        let fits = addr < MEM_SIZE;
        if let Some(label) = &stmt.label {
            if let Some(&first_line) = label_lines.get(label) {
                errors.push(AsmErr::new(AsmErrKind::DuplicateLabel { label: label.clone(), first_line }, lno));
                continue;
            }
            label_lines.insert(label.clone(), lno);
            if fits {
                symbols.insert(label.clone(), addr as u16);
            }
        }
        if fits {
            source_map.insert(addr as u16, lno);
        }
        if stmt.is_end() {
            break;
        }
        if !fits {
            if !overflowed {
                errors.push(AsmErr::new(AsmErrKind::ProgramTooLarge, lno));
            }
            overflowed = true;
            continue;
        }
        parsed.push((lno, stmt));
    }

    // Pass 2: encoding
    let program: Vec<_> = parsed.iter()
        .filter_map(|(lno, stmt)| {
            encode_stmt(stmt, &symbols)
                .map_err(|kind| errors.push(AsmErr::new(kind, *lno)))
                .ok()
        })
        .collect();

    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "assembly failed");
        return Err(errors);
    }

    let origin = origin.unwrap_or(0);
    tracing::debug!(origin, len = program.len(), labels = symbols.len(), "assembled program");
    Ok(AssembledProgram { origin, program, symbols, source_map })
}

/// Encodes a single statement into its word.
fn encode_stmt(stmt: &Stmt, symbols: &BTreeMap<String, u16>) -> Result<u16, AsmErrKind> {
    let operator = stmt.operator.parse::<Operator>()
        .map_err(|_| AsmErrKind::UnknownOperator(stmt.operator.clone()))?;
    let operand = stmt.operand.as_deref();

    let opcode = match operator {
        Operator::Data(radix) => return encode_literal(operand, radix),
        Operator::Clear => match operand {
            Some(operand) => return Err(AsmErrKind::UnexpectedOperand { operator: stmt.operator.clone(), operand: operand.to_string() }),
            None => return Ok(Opcode::LoadImmi.encode(0)),
        },
        Operator::Adr => Opcode::JnS,
        Operator::Instr(opcode) => opcode,
    };

    let operand_bits = match (opcode.has_operand(), operand) {
        (true, Some(operand)) => resolve_address(operand, symbols)?,
        (true, None) => return Err(AsmErrKind::ExpectedOperand(stmt.operator.clone())),
        (false, Some(operand)) => return Err(AsmErrKind::UnexpectedOperand { operator: stmt.operator.clone(), operand: operand.to_string() }),
        (false, None) => 0,
    };

    Ok(opcode.encode(operand_bits))
}

/// Encodes the operand of a data directive.
fn encode_literal(operand: Option<&str>, radix: Radix) -> Result<u16, AsmErrKind> {
    let operand = operand.ok_or(AsmErrKind::ExpectedLiteral)?;
    let value = parse_int_lit(operand, radix.base())
        .map_err(|e| match e {
            IntLitErr::InvalidDigits => AsmErrKind::InvalidLiteral,
            IntLitErr::Overflow => AsmErrKind::LiteralOutOfBounds,
        })?;

    let in_bounds = match radix {
        Radix::Dec => (-0x8000..=0xFFFF).contains(&value),
        Radix::Oct | Radix::Hex => (0..=0xFFFF).contains(&value),
    };
    match in_bounds {
        // Negative values fold into 16-bit two's complement.
        true  => Ok(value as u16),
        false => Err(AsmErrKind::LiteralOutOfBounds)
    }
}

/// Resolves an instruction operand, which is either a hex address literal or a label.
fn resolve_address(operand: &str, symbols: &BTreeMap<String, u16>) -> Result<u16, AsmErrKind> {
    let is_literal = operand.starts_with(|c: char| c.is_ascii_digit())
        && operand.chars().all(|c| c.is_ascii_hexdigit());

    if is_literal {
        match parse_int_lit(operand, 16) {
            Ok(addr @ 0..=0xFFF) => Ok(addr as u16),
            _ => Err(AsmErrKind::AddrOutOfBounds(operand.to_string()))
        }
    } else {
        symbols.get(operand)
            .copied()
            .ok_or_else(|| AsmErrKind::UnknownLabel(operand.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{assemble, AsmErr, AsmErrKind, AssembledProgram, ErrCategory};

    fn assemble_words(src: &str) -> Vec<u16> {
        assemble(src).unwrap().words().to_vec()
    }
    fn assert_asm_fail(src: &str, kind: AsmErrKind, line: usize) {
        assert_eq!(assemble(src).unwrap_err(), [AsmErr::new(kind, line)]);
    }

    #[test]
    fn test_all_instructions() {
        let src = "
            Label, DEC 1
            HEX 2
            OCT 3
            Add Label
            Subt Label
            AddI Label
            Clear
            Load Label
            Store Label
            Input
            Output
            Jump Label
            Skipcond 800
            JnS Label
            LoadI Label
            StoreI Label
            Halt
            JumpI Label
            LoadImmi 0FF
            Adr Label
        ";

        assert_eq!(assemble_words(src), [
            0x0001, 0x0002, 0x0003, 0x3000, 0x4000, 0xB000, 0xA000, 0x1000, 0x2000,
            0x5000, 0x6000, 0x9000, 0x8800, 0x0000, 0xD000, 0xE000, 0x7000,
            0xC000, 0xA0FF, 0x0000,
        ]);
    }

    #[test]
    fn test_case_insensitive_operators() {
        assert_eq!(assemble_words("LOAD A\nhalt\nA, dec 5"), [0x1002, 0x7000, 0x0005]);
    }

    #[test]
    fn test_labels_case_sensitive() {
        assert_asm_fail("Load a\nA, DEC 5", AsmErrKind::UnknownLabel("a".to_string()), 1);
    }

    #[test]
    fn test_sym_table() {
        let src = "
            ORG 200
            Start, Load A / first
            Add B
            Store A

            A, DEC 0
            B, DEC 10000
        ";
        let program = assemble(src).unwrap();

        assert_eq!(program.origin(), 0x200);
        assert_eq!(program.lookup_label("Start"), Some(0x200));
        assert_eq!(program.lookup_label("A"), Some(0x203));
        assert_eq!(program.lookup_label("B"), Some(0x204));
        assert_eq!(program.rev_lookup_label(0x204), Some("B"));
        assert_eq!(program.rev_lookup_label(0x201), None);

        // Source map skips blank lines and the ORG.
        assert_eq!(program.source_line(0x200), Some(3));
        assert_eq!(program.source_line(0x203), Some(7));
        assert_eq!(program.lookup_line(8), Some(0x204));
        assert_eq!(program.lookup_line(6), None);
        assert_eq!(program.end(), 0x205);
    }

    #[test]
    fn test_duplicate_labels() {
        let errs = assemble("\nLabel, Add Label\nLabel, Halt\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, 3);
        assert_eq!(errs[0].category(), ErrCategory::Label);
        assert_eq!(
            errs[0].kind.to_string(),
            "Labels must be unique. The label 'Label' was already defined on line 2."
        );
    }

    #[test]
    fn test_unknown_label() {
        let errs = assemble("\n Add Foo\n").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind.to_string(), "Unknown label 'Foo'.");
        assert_eq!(errs[0].to_string(), "Syntax error: Unknown label 'Foo'.");
    }

    #[test]
    fn test_data_values() {
        let src = "
            DEC -100
            DEC 0
            DEC 100
            HEX FFFF
            HEX 0A
            OCT 7
            OCT 177777
            OCT 004
        ";
        assert_eq!(assemble_words(src), [0xFF9C, 0x0000, 0x0064, 0xFFFF, 0x000A, 0x0007, 0xFFFF, 0x0004]);
    }

    #[test]
    fn test_data_bounds() {
        assert!(assemble("DEC 65535").is_ok());
        assert!(assemble("DEC -32768").is_ok());
        assert_asm_fail("DEC 65536", AsmErrKind::LiteralOutOfBounds, 1);
        assert_asm_fail("DEC -32769", AsmErrKind::LiteralOutOfBounds, 1);
        assert_asm_fail("HEX 10000", AsmErrKind::LiteralOutOfBounds, 1);
        assert_asm_fail("OCT 200000", AsmErrKind::LiteralOutOfBounds, 1);
        assert_asm_fail("DEC 123456789012345678901234567890", AsmErrKind::LiteralOutOfBounds, 1);

        assert_asm_fail("OCT 8", AsmErrKind::InvalidLiteral, 1);
        assert_asm_fail("HEX -1", AsmErrKind::InvalidLiteral, 1);
        assert_asm_fail("DEC 0x10", AsmErrKind::InvalidLiteral, 1);
        assert_asm_fail("DEC", AsmErrKind::ExpectedLiteral, 1);

        let errs = assemble("DEC 65536").unwrap_err();
        assert_eq!(errs[0].category(), ErrCategory::Value);
    }

    #[test]
    fn test_address_bounds() {
        assert!(assemble("Add 123").is_ok());
        assert!(assemble("Add 0FFF").is_ok());
        assert_asm_fail("Add 1000", AsmErrKind::AddrOutOfBounds("1000".to_string()), 1);
        assert_eq!(
            assemble("Add 1000").unwrap_err()[0].to_string(),
            "Syntax error: Address 0x1000 is out of bounds."
        );
        // Starts with a digit but is not hex, so it is (an invalid) label.
        assert_asm_fail("Add 1G", AsmErrKind::UnknownLabel("1G".to_string()), 1);
    }

    #[test]
    fn test_operand_mismatch() {
        assert_asm_fail("Load", AsmErrKind::ExpectedOperand("load".to_string()), 1);
        assert_asm_fail("Adr", AsmErrKind::ExpectedOperand("adr".to_string()), 1);
        assert_asm_fail("Halt 5", AsmErrKind::UnexpectedOperand { operator: "halt".to_string(), operand: "5".to_string() }, 1);
        assert_asm_fail("Clear 5", AsmErrKind::UnexpectedOperand { operator: "clear".to_string(), operand: "5".to_string() }, 1);
        assert_asm_fail("Foo", AsmErrKind::UnknownOperator("foo".to_string()), 1);
    }

    #[test]
    fn test_org() {
        assert_eq!(assemble("org FFE\nHalt").unwrap().origin(), 0xFFE);
        assert_asm_fail("ORG 100\nORG 200\nHalt", AsmErrKind::UnexpectedOrg, 2);
        assert_asm_fail("Halt\nORG 200", AsmErrKind::UnexpectedOrg, 2);
    }

    #[test]
    fn test_end_stops_parsing() {
        let program = assemble("Halt\nEnd, END\nthis is garbage").unwrap();
        assert_eq!(program.words(), [0x7000]);
        // END produces no word, but its label and line are still mapped.
        assert_eq!(program.lookup_label("End"), Some(0x001));
        assert_eq!(program.source_line(0x001), Some(2));
        assert_eq!(program.lookup_line(2), Some(0x001));
        assert_eq!(program.lookup_line(3), None);

        let program = assemble("Halt
END").unwrap();
        assert_eq!(program.source_line(0x001), Some(2));
    }

    #[test]
    fn test_program_too_large() {
        assert!(assemble("ORG FFF\nHalt").is_ok());
        assert_asm_fail("ORG FFF\nHalt\nHalt\nHalt", AsmErrKind::ProgramTooLarge, 3);
    }

    #[test]
    fn test_errors_accumulate() {
        let src = "
            Load A
            1A, Halt
            Foo Bar
            Load X Y
            A, DEC 70000
            ORG 100
        ";
        let errs = assemble(src).unwrap_err();
        let found: Vec<_> = errs.iter().map(|e| (e.line, e.kind.clone())).collect();

        // Structural errors are found first, then encoding errors.
        assert_eq!(found, [
            (3, AsmErrKind::LabelStartsWithDigit),
            (5, AsmErrKind::IncorrectForm),
            (7, AsmErrKind::UnexpectedOrg),
            (4, AsmErrKind::UnknownOperator("foo".to_string())),
            (6, AsmErrKind::LiteralOutOfBounds),
        ]);
    }

    #[test]
    fn test_empty_source() {
        let program = assemble("").unwrap();
        assert_eq!(program, AssembledProgram::default());
        assert!(program.is_empty());
    }

    #[test]
    fn test_serialize() {
        let program = assemble("A, Halt").unwrap();
        let json = serde_json::to_value(&program).unwrap();
        assert_eq!(json["origin"], 0);
        assert_eq!(json["program"], serde_json::json!([0x7000]));
        assert_eq!(json["symbols"]["A"], 0);

        let back: AssembledProgram = serde_json::from_value(json).unwrap();
        assert_eq!(back, program);
    }
}
