//! Assembler, disassembler and image files.
//!
//! This module provides:
//! - A simple two-pass assembler (text → program image)
//! - A disassembler (memory → readable text)
//! - The JSON program image format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use image::{ProgramImage, Segment, ImageError, load_image, save_image, load_program_file};
