//! Parsing assembly source code into an AST.
//!
//! MARIE assembly is line-oriented, so this module parses one line at a time
//! (via [`parse_line`]) into an [`ast::asm::Line`].
//! Each line is first tokenized by [`lex`], then classified as
//! blank, an origination directive, or a statement.
//!
//! ```
//! use marie_ensemble::parse::parse_line;
//! use marie_ensemble::ast::asm::{Line, Stmt};
//!
//! assert_eq!(parse_line("   / just a comment"), Ok(Line::Blank));
//! assert_eq!(parse_line("ORG 100"), Ok(Line::Org(0x100)));
//! assert_eq!(parse_line("Loop, Load X / comment"), Ok(Line::Stmt(Stmt {
//!     label: Some("Loop".to_string()),
//!     operator: "load".to_string(),
//!     operand: Some("X".to_string()),
//! })));
//! ```
//!
//! [`ast::asm::Line`]: crate::ast::asm::Line
pub mod lex;

use crate::ast::asm::{Line, Stmt};
use lex::Token;

/// Reasons why a single line could not be parsed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErr {
    /// Line does not have the form `[LABEL,] OPERATOR [OPERAND] [/comment]`.
    IncorrectForm,
    /// Label starts with a digit.
    LabelStartsWithDigit,
    /// Label has whitespace in it.
    LabelHasWhitespace,
}

/// Parses a single line of source code.
pub fn parse_line(src: &str) -> Result<Line, ParseErr> {
    let tokens = lex::tokenize(src).map_err(|_| ParseErr::IncorrectForm)?;

    // Everything after a comment is part of the comment, so it can only be the last token.
    let code = match tokens.split_last() {
        Some(((Token::Comment, _), rest)) => rest,
        _ => &tokens[..]
    };
    if code.is_empty() {
        return Ok(Line::Blank);
    }

    if let Some(origin) = parse_org(src, code) {
        return Ok(Line::Org(origin));
    }

    // Split label from the rest:
    let (label, rest) = match code.iter().position(|(t, _)| *t == Token::Comma) {
        Some(0) => return Err(ParseErr::IncorrectForm),
        Some(i) => {
            // The label spans from its first token up to the comma,
            // which includes any whitespace in between.
            let label = &src[code[0].1.start .. code[i].1.start];
            (Some(label), &code[i + 1..])
        },
        None => (None, code)
    };

    let words: Vec<_> = rest.iter()
        .map(|(t, span)| match t {
            Token::Word => Ok(&src[span.clone()]),
            _ => Err(ParseErr::IncorrectForm)
        })
        .collect::<Result<_, _>>()?;

    let (operator, operand) = match *words {
        [operator] => (operator, None),
        [operator, operand] => (operator, Some(operand)),
        _ => return Err(ParseErr::IncorrectForm)
    };

    if let Some(label) = label {
        if label.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ParseErr::LabelStartsWithDigit);
        }
        if label.contains(char::is_whitespace) {
            return Err(ParseErr::LabelHasWhitespace);
        }
    }

    Ok(Line::Stmt(Stmt {
        label: label.map(str::to_string),
        operator: operator.to_lowercase(),
        operand: operand.map(str::to_string),
    }))
}

/// Matches an origination directive: `org` followed by exactly 3 hex digits.
fn parse_org(src: &str, code: &[(Token, std::ops::Range<usize>)]) -> Option<u16> {
    let [(Token::Word, kw), (Token::Word, arg)] = code else { return None };
    let arg = &src[arg.clone()];

    let is_org = src[kw.clone()].eq_ignore_ascii_case("org")
        && arg.len() == 3
        && arg.chars().all(|c| c.is_ascii_hexdigit());

    match is_org {
        true  => u16::from_str_radix(arg, 16).ok(),
        false => None
    }
}
