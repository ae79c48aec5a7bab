//! Memory handling for MARIE.
//!
//! This module consists of:
//! - [`MemArray`]: Handles the 4096 words of memory.
//! - [`RegFile`]: Handles the seven registers.
//!
//! Both of these mask every value written into them,
//! so they can never hold a value wider than their cells.

use serde::{Deserialize, Serialize};

use crate::asm::MEM_SIZE;
use crate::ast::Reg;

/// The bit mask applied to every address.
pub const ADDR_MASK: u16 = 0x0FFF;

/// Memory.
///
/// This can be addressed with any `u16`; addresses are masked to 12 bits.
///
/// ```
/// use marie_ensemble::sim::mem::MemArray;
///
/// let mut mem = MemArray::new();
/// mem.set(0x123, 0xBEEF);
/// assert_eq!(mem[0x123], 0xBEEF);
/// assert_eq!(mem[0x1123], 0xBEEF); // wraps around
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemArray(Box<[u16; MEM_SIZE]>);
impl MemArray {
    /// Creates a new zeroed memory array.
    pub fn new() -> Self {
        Self(Box::new([0; MEM_SIZE]))
    }

    /// Sets the word at the address, returning the old value.
    pub fn set(&mut self, addr: u16, data: u16) -> u16 {
        std::mem::replace(&mut self.0[usize::from(addr & ADDR_MASK)], data)
    }

    /// Zeroes memory, then copies the block into memory starting at the given address.
    ///
    /// Returns `false` and leaves memory untouched if the block does not fit.
    pub fn load_block(&mut self, start: u16, data: &[u16]) -> bool {
        let si = usize::from(start);
        let Some(dest) = self.0.get_mut(si .. si + data.len()) else { return false };

        dest.copy_from_slice(data);
        self.0[..si].fill(0);
        self.0[si + data.len()..].fill(0);
        true
    }

    /// Gets a view of all of memory.
    pub fn as_slice(&self) -> &[u16] {
        &self.0[..]
    }
}
impl Default for MemArray {
    fn default() -> Self {
        Self::new()
    }
}
impl std::ops::Index<u16> for MemArray {
    type Output = u16;

    fn index(&self, index: u16) -> &Self::Output {
        &self.0[usize::from(index & ADDR_MASK)]
    }
}

/// The register file.
///
/// It can be indexed with a [`Reg`] to read a register.
/// Writing is only possible through [`RegFile::set`], which masks to the register's width.
///
/// ```
/// use marie_ensemble::sim::mem::RegFile;
/// use marie_ensemble::ast::Reg;
///
/// let mut reg = RegFile::new();
/// reg.set(Reg::AC, 0x1234);
/// reg.set(Reg::PC, 0x1234);
/// assert_eq!(reg[Reg::AC], 0x1234);
/// assert_eq!(reg[Reg::PC], 0x0234);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegFile([u16; 7]);
impl RegFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self([0; 7])
    }

    /// Sets the register (masking it to its width), returning the old value.
    pub fn set(&mut self, reg: Reg, data: u16) -> u16 {
        std::mem::replace(&mut self.0[usize::from(reg)], data & reg.mask())
    }

    /// Iterates over every register and its value.
    pub fn iter(&self) -> impl Iterator<Item = (Reg, u16)> + '_ {
        Reg::ALL.into_iter().map(|r| (r, self[r]))
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
