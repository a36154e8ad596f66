//! # irq8
//!
//! A step-by-step emulator of a tiny 8-bit CPU.
//!
//! Each [`Cpu::tick`] either services one pending interrupt or runs one
//! fetch-decode-execute cycle, so every stage of instruction processing
//! and interrupt handling can be observed between calls.

pub mod cpu;
pub mod asm;
pub mod demo;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, CpuSnapshot, Memory, Registers, Opcode, Interrupt};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, ImageError, load_program_file, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
