//! Byte-addressed main memory and the hardware stack that lives in it.
//!
//! Memory is a flat array of bytes. Accesses past the end never fail:
//! writes are dropped and reads come back as zero, so the executor can
//! keep stepping through a malformed program without panicking.

use serde::{Serialize, Deserialize};

/// Default memory capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 256;

/// Largest capacity. Operands, vectors and saved return addresses are
/// single bytes, so memory cannot extend past 0xFF.
pub const MAX_CAPACITY: usize = 256;

/// Main memory: `capacity` zero-initialised byte cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a zeroed memory of the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity],
        }
    }

    /// Number of addressable cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Read a byte. Addresses past the end read as 0.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.cells.get(addr as usize).copied().unwrap_or(0)
    }

    /// Write a byte. Writes past the end are ignored.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        if let Some(cell) = self.cells.get_mut(addr as usize) {
            *cell = value;
        }
    }

    /// Copy `image` into memory starting at `base`.
    ///
    /// Bytes that would land past the end are dropped. Returns the number
    /// of bytes actually written.
    pub fn load_image(&mut self, image: &[u8], base: u16) -> usize {
        let start = (base as usize).min(self.cells.len());
        let end = (start + image.len()).min(self.cells.len());
        let count = end - start;
        self.cells[start..end].copy_from_slice(&image[..count]);
        count
    }

    /// Push a byte onto the descending stack addressed by `sp`.
    ///
    /// Writes at `sp`, then moves `sp` down, stopping at 0.
    pub fn push(&mut self, sp: &mut u16, value: u8) {
        self.write(*sp, value);
        *sp = sp.saturating_sub(1);
    }

    /// Pop a byte from the descending stack addressed by `sp`.
    ///
    /// Moves `sp` up, stopping at the last cell, then reads at the new `sp`.
    pub fn pop(&self, sp: &mut u16) -> u8 {
        let top = self.top_of_stack();
        *sp = sp.saturating_add(1).min(top);
        self.read(*sp)
    }

    /// Highest valid address, where an empty stack points.
    #[inline]
    pub fn top_of_stack(&self) -> u16 {
        self.cells.len().saturating_sub(1).min(u16::MAX as usize) as u16
    }

    /// Borrow the full contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }

    /// Dump a window of memory as `(address, value)` pairs.
    ///
    /// The window is clipped to the end of memory.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&b| b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}
