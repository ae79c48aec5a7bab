//! IO handling for MARIE.
//!
//! The simulator reads input through the [`InputSource`] trait.
//! An input source is polled whenever the machine is waiting on input,
//! and can return `None` to indicate no input is ready yet.
//!
//! Besides that key trait, this module also includes:
//! - [`EmptyInput`]: An `InputSource` which never has input.
//! - [`BufferedInput`]: An `InputSource` reading from a shared buffer.
//! - [`ChannelInput`]: An `InputSource` reading from a channel, for input from other threads.
//! - [`IoMode`]: Formatting and parsing of IO values as they are shown to a user.
//!
//! Any `FnMut() -> Option<i32>` closure is also an input source.
//!
//! Output is not handled here: every output is recorded
//! in the simulator's log as an [`Action::Output`].
//!
//! [`Action::Output`]: super::action::Action::Output

use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockWriteGuard, TryLockError};

use crossbeam_channel as cbc;
use serde::{Deserialize, Serialize};

use crate::parse::lex::parse_int_lit;

/// A source of input values.
pub trait InputSource {
    /// Polls for the next input value.
    ///
    /// If no value is ready, this returns `None`, and will be polled again later.
    /// Values are masked to 16 bits by the simulator.
    fn poll_input(&mut self) -> Option<i32>;
}
impl dyn InputSource {} // assert InputSource is dyn safe

impl<F: FnMut() -> Option<i32>> InputSource for F {
    fn poll_input(&mut self) -> Option<i32> {
        self()
    }
}

/// No input. Input is never ready.
///
/// If a program executes `Input` while this is the active input source, it will wait forever.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyInput;
impl InputSource for EmptyInput {
    fn poll_input(&mut self) -> Option<i32> {
        None
    }
}

/// Input that reads from a buffer.
///
/// The buffer can be accessed in code via [`BufferedInput::get_buffer`]
/// (and this struct can be cloned to share the buffer with the simulator).
///
/// Note that if a lock guard is acquired from the buffer,
/// the input becomes temporarily inaccessible to the simulator.
/// Thus, a lock guard should never be leaked otherwise the simulator loses access to the input.
///
/// ```
/// use marie_ensemble::asm::assemble;
/// use marie_ensemble::sim::Simulator;
/// use marie_ensemble::sim::io::BufferedInput;
/// use marie_ensemble::ast::Reg;
///
/// let program = assemble("Input\nHalt").unwrap();
/// let input = BufferedInput::new();
///
/// let mut sim = Simulator::default();
/// sim.set_input(input.clone());
/// sim.load(&program).unwrap();
///
/// input.get_buffer().write().unwrap().push_back(42);
/// sim.run(Default::default());
/// assert_eq!(sim.reg(Reg::AC), 42);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferedInput {
    buffer: Arc<RwLock<VecDeque<i32>>>
}
impl BufferedInput {
    /// Creates a new, empty buffered input.
    pub fn new() -> Self {
        Self { buffer: Default::default() }
    }
    /// Creates a new buffered input from an already defined buffer.
    pub fn with_buffer(buffer: Arc<RwLock<VecDeque<i32>>>) -> Self {
        Self { buffer }
    }

    fn try_buffer(&self) -> Option<RwLockWriteGuard<'_, VecDeque<i32>>> {
        match self.buffer.try_write() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Gets a reference to the input buffer.
    pub fn get_buffer(&self) -> &Arc<RwLock<VecDeque<i32>>> {
        &self.buffer
    }
}
impl InputSource for BufferedInput {
    fn poll_input(&mut self) -> Option<i32> {
        self.try_buffer()?.pop_front()
    }
}

/// Input that reads from a channel.
///
/// The sending half can live on another thread, so that input is provided
/// asynchronously while the simulator keeps polling.
#[derive(Debug, Clone)]
pub struct ChannelInput {
    reader: cbc::Receiver<i32>
}
impl ChannelInput {
    /// Creates a new channel input, returning the sender which feeds it.
    pub fn new() -> (cbc::Sender<i32>, Self) {
        let (tx, rx) = cbc::unbounded();
        (tx, Self { reader: rx })
    }
    /// Creates a channel input from an existing receiver.
    pub fn from_receiver(reader: cbc::Receiver<i32>) -> Self {
        Self { reader }
    }
}
impl InputSource for ChannelInput {
    fn poll_input(&mut self) -> Option<i32> {
        self.reader.try_recv().ok()
    }
}

/// The format in which IO values are shown to and read from a user.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// 4-digit uppercase hexadecimal (e.g., `00FF`).
    #[default]
    Hex,
    /// Signed decimal (e.g., `-1`).
    Dec,
    /// Octal, in groups of 3 digits (e.g., `177 777`).
    Oct,
    /// Binary, in groups of 4 digits (e.g., `1 0000`).
    Bin,
    /// A UTF-16 code unit.
    Unicode,
}
impl IoMode {
    /// Formats a word in this mode.
    ///
    /// ```
    /// use marie_ensemble::sim::io::IoMode;
    ///
    /// assert_eq!(IoMode::Hex.format(0xFF), "00FF");
    /// assert_eq!(IoMode::Dec.format(0xFFFF), "-1");
    /// assert_eq!(IoMode::Oct.format(0xFFFF), "177 777");
    /// assert_eq!(IoMode::Bin.format(0x1F), "1 1111");
    /// assert_eq!(IoMode::Unicode.format(0x41), "A");
    /// ```
    pub fn format(self, word: u16) -> String {
        match self {
            IoMode::Hex => format!("{word:04X}"),
            IoMode::Dec => (word as i16).to_string(),
            IoMode::Oct => group_digits(&format!("{word:o}"), 3),
            IoMode::Bin => group_digits(&format!("{word:b}"), 4),
            IoMode::Unicode => char::decode_utf16([word])
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect(),
        }
    }

    /// Parses user input in this mode.
    ///
    /// Whitespace between digit groups is ignored.
    /// Returns `None` if the input is invalid or does not fit in a word.
    pub fn parse(self, input: &str) -> Option<u16> {
        let radix = match self {
            IoMode::Hex => 16,
            IoMode::Dec => 10,
            IoMode::Oct => 8,
            IoMode::Bin => 2,
            IoMode::Unicode => {
                let mut units = input.encode_utf16();
                let unit = units.next()?;
                return units.next().is_none().then_some(unit);
            }
        };

        let digits: String = input.split_whitespace().collect();
        let value = parse_int_lit(&digits, radix).ok()?;
        let range = match self {
            IoMode::Dec => -0x8000..=0xFFFF,
            _ => 0..=0xFFFF
        };
        range.contains(&value).then_some(value as u16)
    }
}

/// Splits digits into groups of the given size, counting from the right.
fn group_digits(digits: &str, size: usize) -> String {
    let lead = match digits.len() % size {
        0 => size,
        n => n
    };
    let (head, tail) = digits.split_at(lead.min(digits.len()));

    let mut out = head.to_string();
    for chunk in tail.as_bytes().chunks(size) {
        out.push(' ');
        out.extend(chunk.iter().map(|&b| char::from(b)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_source() {
        let mut values = vec![3, 2, 1];
        let mut source = move || values.pop();
        assert_eq!(source.poll_input(), Some(1));
        assert_eq!(source.poll_input(), Some(2));
        assert_eq!(source.poll_input(), Some(3));
        assert_eq!(source.poll_input(), None);
    }

    #[test]
    fn test_buffered_source() {
        let mut input = BufferedInput::new();
        assert_eq!(input.poll_input(), None);

        input.get_buffer().write().unwrap().extend([5, -5]);
        assert_eq!(input.poll_input(), Some(5));

        // Locked buffer means not ready:
        {
            let _guard = input.get_buffer().write().unwrap();
            let mut other = input.clone();
            assert_eq!(other.poll_input(), None);
        }
        assert_eq!(input.poll_input(), Some(-5));
        assert_eq!(input.poll_input(), None);
    }

    #[test]
    fn test_channel_source() {
        let (tx, mut input) = ChannelInput::new();
        assert_eq!(input.poll_input(), None);

        std::thread::spawn(move || {
            tx.send(1234).unwrap();
        }).join().unwrap();

        assert_eq!(input.poll_input(), Some(1234));
        assert_eq!(input.poll_input(), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(IoMode::Hex.format(0), "0000");
        assert_eq!(IoMode::Hex.format(0xABCD), "ABCD");
        assert_eq!(IoMode::Dec.format(0x7FFF), "32767");
        assert_eq!(IoMode::Dec.format(0x8000), "-32768");
        assert_eq!(IoMode::Oct.format(0), "0");
        assert_eq!(IoMode::Oct.format(0o1234), "1 234");
        assert_eq!(IoMode::Oct.format(0o123), "123");
        assert_eq!(IoMode::Bin.format(0), "0");
        assert_eq!(IoMode::Bin.format(0xF), "1111");
        assert_eq!(IoMode::Bin.format(0x8001), "1000 0000 0000 0001");
        assert_eq!(IoMode::Unicode.format(0xD800), "\u{FFFD}");
    }

    #[test]
    fn test_parse() {
        assert_eq!(IoMode::Hex.parse("ff"), Some(0xFF));
        assert_eq!(IoMode::Hex.parse("10000"), None);
        assert_eq!(IoMode::Dec.parse("-1"), Some(0xFFFF));
        assert_eq!(IoMode::Dec.parse("-32769"), None);
        assert_eq!(IoMode::Dec.parse("abc"), None);
        assert_eq!(IoMode::Oct.parse("177 777"), Some(0xFFFF));
        assert_eq!(IoMode::Bin.parse("1 0000"), Some(0x10));
        assert_eq!(IoMode::Bin.parse("12"), None);
        assert_eq!(IoMode::Unicode.parse("A"), Some(0x41));
        assert_eq!(IoMode::Unicode.parse("AB"), None);
        assert_eq!(IoMode::Unicode.parse(""), None);

        for mode in [IoMode::Hex, IoMode::Dec, IoMode::Oct, IoMode::Bin] {
            for word in [0, 1, 0x7FFF, 0x8000, 0xFFFF] {
                assert_eq!(mode.parse(&mode.format(word)), Some(word), "{mode:?} {word:04X}");
            }
        }
    }
}
