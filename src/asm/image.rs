//! Program image file format.
//!
//! An image is a JSON document describing how to boot a machine:
//!
//! ```json
//! { "capacity": 256, "entry": 16,
//!   "segments": [ { "base": 0, "bytes": [64] }, { "base": 16, "bytes": [9, 0, 8, 17] } ] }
//! ```
//!
//! Segments are loaded in order, so a later segment overwrites an earlier
//! one where they overlap. PC is set to `entry` after the last load.

use crate::asm::assembler::{assemble, AssemblerError};
use crate::cpu::{Cpu, CpuError};
use crate::cpu::memory::DEFAULT_CAPACITY;
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A contiguous run of bytes loaded at `base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub base: u16,
    pub bytes: Vec<u8>,
}

/// A bootable program image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    /// Memory size of the machine to boot.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Initial program counter.
    #[serde(default)]
    pub entry: u16,
    /// Segments, loaded in order.
    pub segments: Vec<Segment>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl ProgramImage {
    /// Create an empty image for the default capacity.
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            entry: 0,
            segments: Vec::new(),
        }
    }

    /// Append a segment.
    pub fn push(&mut self, base: u16, bytes: Vec<u8>) {
        self.segments.push(Segment { base, bytes });
    }

    /// Total bytes across all segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.bytes.len()).sum()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a CPU of the image's capacity, load every segment and set the entry point.
    pub fn boot(&self) -> Result<Cpu, CpuError> {
        let mut cpu = Cpu::with_capacity(self.capacity)?;
        for segment in &self.segments {
            cpu.load_program(&segment.bytes, segment.base);
        }
        cpu.regs.pc = self.entry;
        debug!(
            segments = self.segments.len(),
            bytes = self.len(),
            entry = self.entry,
            "image booted"
        );
        Ok(cpu)
    }
}

impl Default for ProgramImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a JSON image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let image = serde_json::from_str(&text)?;
    Ok(image)
}

/// Write an image to disk as pretty-printed JSON.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let text = serde_json::to_string_pretty(image)?;
    std::fs::write(path.as_ref(), text)?;
    Ok(())
}

/// Load either assembly source (`.asm`) or a JSON image (anything else).
pub fn load_program_file<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let path = path.as_ref();
    let is_asm = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("asm"));

    if is_asm {
        let source = std::fs::read_to_string(path)?;
        Ok(assemble(&source)?)
    } else {
        load_image(path)
    }
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid image: {0}")]
    Json(#[from] serde_json::Error),

    #[error("assembly error: {0}")]
    Assembler(#[from] AssemblerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_image() {
        let image: ProgramImage =
            serde_json::from_str(r#"{ "segments": [ { "base": 2, "bytes": [255] } ] }"#).unwrap();
        assert_eq!(image.capacity, 256);
        assert_eq!(image.entry, 0);
        assert_eq!(image.len(), 1);
    }

    #[test]
    fn test_boot_sets_entry_after_all_segments() {
        let mut image = ProgramImage::new();
        image.entry = 0x10;
        image.push(0x00, vec![0x40]);
        image.push(0x10, vec![0x09, 0x00]);
        image.push(0x40, vec![0x0A]);

        let cpu = image.boot().unwrap();
        assert_eq!(cpu.regs.pc, 0x10);
        assert_eq!(cpu.mem.read(0x00), 0x40);
        assert_eq!(cpu.mem.read(0x40), 0x0A);
    }

    #[test]
    fn test_boot_rejects_bad_capacity() {
        let image = ProgramImage { capacity: 0, ..ProgramImage::new() };
        assert!(image.boot().is_err());
    }

    #[test]
    fn test_bad_json_is_reported() {
        let err = serde_json::from_str::<ProgramImage>("{").map_err(ImageError::from).unwrap_err();
        assert!(err.to_string().starts_with("invalid image"));
    }
}
