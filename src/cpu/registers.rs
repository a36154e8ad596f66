//! CPU register file.
//!
//! Two 8-bit accumulators, the fetch latches and the address-width
//! control registers:
//! - A, B: accumulators
//! - IR: last fetched opcode byte
//! - MAR / MDR: address and data latched by the last fetch
//! - PC: next fetch address
//! - SP: stack pointer (descending)
//! - IE: interrupt enable

use serde::{Serialize, Deserialize};

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A: primary accumulator, destination of ADD
    pub a: u8,

    /// B: secondary accumulator
    pub b: u8,

    /// IR: opcode byte most recently fetched
    pub ir: u8,

    /// MAR: address used by the most recent fetch
    pub mar: u16,

    /// MDR: byte read by the most recent fetch.
    /// Only ever written for observers; execution never reads it.
    pub mdr: u8,

    /// PC: address of the next byte to fetch
    pub pc: u16,

    /// SP: stack pointer, address of the next free stack cell
    pub sp: u16,

    /// IE: interrupts are serviced only while this is set
    pub ie: bool,
}

impl Registers {
    /// Create a register file for a memory of `capacity` bytes.
    ///
    /// Everything is zeroed except SP, which points at the top cell.
    pub fn new(capacity: usize) -> Self {
        Self {
            a: 0,
            b: 0,
            ir: 0,
            mar: 0,
            mdr: 0,
            pc: 0,
            sp: capacity.saturating_sub(1).min(u16::MAX as usize) as u16,
            ie: false,
        }
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u16) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(super::memory::DEFAULT_CAPACITY)
    }
}
