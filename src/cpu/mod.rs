//! CPU emulation core.
//!
//! This module implements the complete machine:
//! - byte-addressed memory (256 cells by default) with a descending stack
//! - registers: A, B (accumulators), IR, MAR, MDR, PC, SP, IE
//! - 16-opcode instruction set with one- and two-byte encodings
//! - single-level vectored interrupts

pub mod memory;
pub mod registers;
pub mod decode;
pub mod interrupt;
pub mod execute;

pub use memory::Memory;
pub use registers::Registers;
pub use decode::{Opcode, OperandKind};
pub use interrupt::{Interrupt, InterruptQueue};
pub use execute::{Cpu, CpuError, CpuSnapshot, CpuState};
