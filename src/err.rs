//! Error interface for this crate.
//!
//! Every error type produced by the assembler and simulator
//! implements [`Error`], which exposes where the error occurred
//! and an optional hint on how to fix it.

use std::borrow::Cow;

/// Unified error interface for all errors in this crate.
///
/// Note that the [`Display`] implementation is used for a brief message,
/// where as [`Error::help`] is used for any clarifying details.
///
/// [`Display`]: std::fmt::Display
pub trait Error: std::error::Error {
    /// The 1-based source line this error refers to (if there is one).
    fn line(&self) -> Option<usize> {
        None
    }

    /// A clarifying message to help aid someone in how to fix the message.
    fn help(&self) -> Option<Cow<str>>;
}

/// Renders an error into a one-line report, prefixed with its line if it has one.
///
/// ```
/// use marie_ensemble::asm::assemble;
/// use marie_ensemble::err::report;
///
/// let errs = assemble("Foo X").unwrap_err();
/// assert_eq!(report(&errs[0]), "line 1: Syntax error: Unknown operator 'foo'.");
/// ```
pub fn report(err: &impl Error) -> String {
    match err.line() {
        Some(line) => format!("line {line}: {err}"),
        None => err.to_string(),
    }
}
