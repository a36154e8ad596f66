//! Interrupt controller.
//!
//! Pending requests wait in a FIFO until the CPU reaches a tick boundary
//! with interrupts enabled. A line that is already pending is not queued
//! again, so repeated requests coalesce into one service.
//!
//! The vector table sits at the bottom of memory: the service routine
//! address for code `k` is the byte at `VECTOR_TABLE_BASE + k`.

use std::collections::VecDeque;
use serde::{Serialize, Deserialize};

/// Address of the first vector table entry.
pub const VECTOR_TABLE_BASE: u16 = 0x00;

/// An interrupt line, identified by its vector table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interrupt(pub u8);

impl Interrupt {
    /// The timer line.
    pub const TIMER: Interrupt = Interrupt(0);

    /// Raw interrupt code.
    #[inline]
    pub fn code(self) -> u8 {
        self.0
    }

    /// Address of this line's vector table entry.
    #[inline]
    pub fn vector_address(self) -> u16 {
        VECTOR_TABLE_BASE + self.0 as u16
    }

    /// Display name. Cosmetic only.
    pub fn name(self) -> String {
        match self {
            Interrupt::TIMER => "TIMER".to_string(),
            Interrupt(code) => format!("IRQ{}", code),
        }
    }
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Pending interrupt requests, oldest first, one entry per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptQueue {
    pending: VecDeque<Interrupt>,
}

impl InterruptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. Returns `false` if the line was already pending.
    pub fn request(&mut self, irq: Interrupt) -> bool {
        if self.pending.contains(&irq) {
            return false;
        }
        self.pending.push_back(irq);
        true
    }

    /// Take the oldest pending request.
    pub fn pop(&mut self) -> Option<Interrupt> {
        self.pending.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Interrupt> + '_ {
        self.pending.iter().copied()
    }
}
