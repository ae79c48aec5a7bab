//! Tokenizing MARIE assembly.
//!
//! This module holds the tokens that characterize a line of MARIE assembly ([`Token`]).
//! The line parser uses these tokens (and their spans) to split a line
//! into its label, operator, operand, and comment.
//!
//! MARIE's grammar is very loose: anything that is not whitespace,
//! a comma, or a comment counts as a word. Whether a word is a valid
//! mnemonic, label, or literal is decided later by the assembler.

use std::num::IntErrorKind;
use std::ops::Range;

use logos::Logos;

/// A unit of information in a line of MARIE source code.
#[derive(Debug, Logos, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"\s+", error = LexErr)]
pub enum Token {
    /// A comma, which terminates a label.
    #[token(",")]
    Comma,

    /// A comment, which starts with a slash and spans the remaining part of the line.
    #[regex(r"/.*")]
    Comment,

    /// A run of characters that are not whitespace, commas, or slashes.
    ///
    /// This can refer to either:
    /// - a label (e.g., `Loop`, `A`)
    /// - an operator (e.g. `Load`, `HEX`, `org`)
    /// - an operand (e.g. `0FF`, `Loop`, `-12`)
    #[regex(r"[^\s,/]+")]
    Word,
}

/// Any errors raised in attempting to tokenize a line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum LexErr {
    /// A character was found which could not start any token.
    #[default]
    InvalidSymbol
}
impl std::fmt::Display for LexErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexErr::InvalidSymbol => f.write_str("unrecognized symbol"),
        }
    }
}
impl std::error::Error for LexErr {}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::InvalidSymbol => Some("this char does not occur in any token in MARIE assembly".into()),
        }
    }
}

/// Tokenizes a single line, keeping the byte span of every token.
pub fn tokenize(line: &str) -> Result<Vec<(Token, Range<usize>)>, LexErr> {
    Token::lexer(line)
        .spanned()
        .map(|(tok, span)| tok.map(|t| (t, span)))
        .collect()
}

/// Errors from parsing an integer literal in a given radix.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum IntLitErr {
    /// The literal contains characters outside of its radix's digit set (or is empty).
    InvalidDigits,
    /// The literal has valid digits, but is too large to be represented at all.
    Overflow,
}

/// Parses an integer literal in the given radix (2, 8, 10, or 16).
///
/// Only radix 10 accepts a leading minus sign. No prefixes (e.g., `0x`) are accepted.
///
/// ```
/// use marie_ensemble::parse::lex::{parse_int_lit, IntLitErr};
///
/// assert_eq!(parse_int_lit("0FF", 16), Ok(0xFF));
/// assert_eq!(parse_int_lit("-12", 10), Ok(-12));
/// assert_eq!(parse_int_lit("-12", 16), Err(IntLitErr::InvalidDigits));
/// assert_eq!(parse_int_lit("8", 8), Err(IntLitErr::InvalidDigits));
/// ```
pub fn parse_int_lit(s: &str, radix: u32) -> Result<i64, IntLitErr> {
    let digits = match (radix, s.strip_prefix('-')) {
        (10, Some(rest)) => rest,
        _ => s
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(IntLitErr::InvalidDigits);
    }

    i64::from_str_radix(s, radix)
        .map_err(|e| convert_int_error(e.kind()))
}

/// Helper that converts an int error kind to its corresponding [`IntLitErr`].
fn convert_int_error(e: &IntErrorKind) -> IntLitErr {
    match e {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => IntLitErr::Overflow,
        _ => IntLitErr::InvalidDigits
    }
}
