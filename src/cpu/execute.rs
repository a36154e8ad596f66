//! CPU execution engine.
//!
//! Implements the tick: either one interrupt service or one
//! fetch-decode-execute cycle, never both.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Opcode};
use crate::cpu::interrupt::{Interrupt, InterruptQueue};
use crate::cpu::memory::{DEFAULT_CAPACITY, MAX_CAPACITY};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has executed HALT. Terminal.
    Halted,
}

/// The CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Completed ticks (for profiling).
    pub cycles: u64,
    /// Pending interrupt requests.
    interrupts: InterruptQueue,
    /// Human-readable trace of the last operation.
    status: String,
}

/// A value copy of everything an observer can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub memory: Vec<u8>,
    pub state: CpuState,
    pub cycles: u64,
    pub pending: Vec<Interrupt>,
    pub status: String,
}

impl Cpu {
    /// Create a CPU with the default 256-byte memory.
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY)
    }

    /// Create a CPU with `capacity` bytes of memory (1 to 256).
    pub fn with_capacity(capacity: usize) -> Result<Self, CpuError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(CpuError::InvalidCapacity(capacity));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        Self {
            regs: Registers::new(capacity),
            mem: Memory::new(capacity),
            state: CpuState::Running,
            cycles: 0,
            interrupts: InterruptQueue::new(),
            status: "Ready".into(),
        }
    }

    /// Load a program image at `start` and point PC at it.
    ///
    /// When loading several images, the last call decides the entry point.
    pub fn load_program(&mut self, program: &[u8], start: u16) {
        let written = self.mem.load_image(program, start);
        self.regs.pc = start;
        self.status = format!("Loaded {} bytes at 0x{:02X}", written, start);
        if written < program.len() {
            warn!(
                start,
                size = program.len(),
                written,
                "program image truncated at end of memory"
            );
        }
    }

    /// Raise an interrupt line. A line already pending is not queued twice.
    ///
    /// Returns whether the request was newly queued.
    pub fn request_interrupt(&mut self, irq: Interrupt) -> bool {
        let queued = self.interrupts.request(irq);
        self.status = if queued {
            format!("Interrupt {} requested", irq)
        } else {
            format!("Interrupt {} already pending", irq)
        };
        debug!(irq = irq.code(), queued, "interrupt requested");
        queued
    }

    /// Advance by one step: service a pending interrupt if allowed,
    /// otherwise fetch and execute one instruction. No-op once halted.
    pub fn tick(&mut self) {
        if self.state == CpuState::Halted {
            return;
        }

        if self.regs.ie && !self.interrupts.is_empty() {
            self.service_interrupt();
        } else {
            let opcode = self.fetch();
            self.execute(opcode);
        }

        self.cycles += 1;
    }

    /// Tick until halted or `max_ticks` have elapsed.
    ///
    /// Returns the number of ticks performed.
    pub fn run_limited(&mut self, max_ticks: u64) -> u64 {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_ticks);

        while self.state == CpuState::Running && self.cycles < limit {
            self.tick();
        }

        self.cycles - start_cycles
    }

    /// Enter the service routine of the oldest pending interrupt.
    fn service_interrupt(&mut self) {
        let Some(irq) = self.interrupts.pop() else {
            return;
        };

        self.regs.ie = false;
        let return_addr = self.regs.pc;
        // Capacity is at most 256, so every in-memory PC fits the saved byte.
        self.mem.push(&mut self.regs.sp, return_addr as u8);
        let vector = self.mem.read(irq.vector_address()) as u16;
        self.regs.jump(vector);

        self.status = format!(
            "Servicing {}: saved PC=0x{:02X}, vector -> 0x{:02X}",
            irq, return_addr, vector
        );
        debug!(irq = irq.code(), return_addr, vector, "interrupt serviced");
    }

    /// Fetch the byte at PC into IR and advance PC by one.
    fn fetch(&mut self) -> Option<Opcode> {
        let addr = self.regs.advance_pc();
        let byte = self.mem.read(addr);
        self.regs.mar = addr;
        self.regs.mdr = byte;
        self.regs.ir = byte;

        let mnemonic = decode::mnemonic_of(byte);
        self.status = format!("Fetched {} from 0x{:02X}", mnemonic, addr);
        trace!(addr, byte, mnemonic, "fetch");

        Opcode::from_byte(byte)
    }

    /// Read the operand byte at PC and advance PC past it.
    fn fetch_operand(&mut self) -> u8 {
        let addr = self.regs.advance_pc();
        self.mem.read(addr)
    }

    /// Execute a decoded opcode. `None` is an unrecognised byte.
    fn execute(&mut self, opcode: Option<Opcode>) {
        let Some(opcode) = opcode else {
            self.status = format!(
                "Unknown opcode 0x{:02X} at 0x{:02X}",
                self.regs.ir, self.regs.mar
            );
            warn!(byte = self.regs.ir, addr = self.regs.mar, "unknown opcode");
            return;
        };

        match opcode {
            // ==================== Data Transfer ====================

            Opcode::LoadAVal => {
                self.regs.a = self.fetch_operand();
            }

            Opcode::LoadBVal => {
                self.regs.b = self.fetch_operand();
            }

            Opcode::LoadAMem => {
                let addr = self.fetch_operand();
                self.regs.a = self.mem.read(addr as u16);
            }

            Opcode::LoadBMem => {
                let addr = self.fetch_operand();
                self.regs.b = self.mem.read(addr as u16);
            }

            Opcode::StoreA => {
                let addr = self.fetch_operand();
                self.mem.write(addr as u16, self.regs.a);
            }

            Opcode::StoreB => {
                let addr = self.fetch_operand();
                self.mem.write(addr as u16, self.regs.b);
            }

            // ==================== Arithmetic ====================

            Opcode::Add => {
                self.regs.a = self.regs.a.wrapping_add(self.regs.b);
            }

            // ==================== Control Flow ====================

            Opcode::Jmp => {
                let addr = self.fetch_operand();
                self.regs.jump(addr as u16);
            }

            Opcode::EnableInterrupts => {
                self.regs.ie = true;
            }

            Opcode::Iret => {
                let addr = self.mem.pop(&mut self.regs.sp);
                self.regs.jump(addr as u16);
                self.regs.ie = true;
                self.status = format!("Returned from interrupt to 0x{:02X}", addr);
                debug!(return_addr = addr, "interrupt return");
            }

            Opcode::Halt => {
                self.state = CpuState::Halted;
                self.status = format!("Halted at 0x{:02X}", self.regs.mar);
                debug!(addr = self.regs.mar, cycles = self.cycles + 1, "halted");
            }

            // ==================== Stack ====================

            Opcode::PushA => {
                self.mem.push(&mut self.regs.sp, self.regs.a);
            }

            Opcode::PushB => {
                self.mem.push(&mut self.regs.sp, self.regs.b);
            }

            Opcode::PopA => {
                self.regs.a = self.mem.pop(&mut self.regs.sp);
            }

            Opcode::PopB => {
                self.regs.b = self.mem.pop(&mut self.regs.sp);
            }

            // ==================== Special ====================

            Opcode::Noop => {
                // Do nothing
            }
        }
    }

    /// Pending interrupt lines, oldest first.
    pub fn pending_interrupts(&self) -> Vec<Interrupt> {
        self.interrupts.iter().collect()
    }

    /// Human-readable description of the last operation.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Copy out the observable state.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs.clone(),
            memory: self.mem.as_slice().to_vec(),
            state: self.state,
            cycles: self.cycles,
            pending: self.pending_interrupts(),
            status: self.status.clone(),
        }
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("pending", &self.interrupts)
            .finish()
    }
}

/// Errors that can occur when building a CPU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("invalid memory capacity {0} (expected 1..={max})", max = MAX_CAPACITY)]
    InvalidCapacity(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const LOAD_A_VAL: u8 = Opcode::LoadAVal as u8;
    const LOAD_B_VAL: u8 = Opcode::LoadBVal as u8;
    const LOAD_A_MEM: u8 = Opcode::LoadAMem as u8;
    const STORE_A: u8 = Opcode::StoreA as u8;
    const STORE_B: u8 = Opcode::StoreB as u8;
    const ADD: u8 = Opcode::Add as u8;
    const JMP: u8 = Opcode::Jmp as u8;
    const EI: u8 = Opcode::EnableInterrupts as u8;
    const IRET: u8 = Opcode::Iret as u8;
    const PUSH_A: u8 = Opcode::PushA as u8;
    const POP_B: u8 = Opcode::PopB as u8;
    const NOOP: u8 = Opcode::Noop as u8;
    const HALT: u8 = Opcode::Halt as u8;

    #[test]
    fn test_fresh_cpu() {
        let cpu = Cpu::new();
        assert_eq!(cpu.regs.sp, 255);
        assert_eq!(cpu.regs.pc, 0);
        assert!(!cpu.regs.ie);
        assert!(!cpu.is_halted());
        assert!(cpu.pending_interrupts().is_empty());
    }

    #[test]
    fn test_with_capacity_bounds() {
        assert_eq!(Cpu::with_capacity(0).unwrap_err(), CpuError::InvalidCapacity(0));
        assert_eq!(
            Cpu::with_capacity(MAX_CAPACITY + 1).unwrap_err(),
            CpuError::InvalidCapacity(257)
        );
        assert!(Cpu::with_capacity(1024).is_err());

        let cpu = Cpu::with_capacity(MAX_CAPACITY).unwrap();
        assert_eq!(cpu.regs.sp, 255);

        let cpu = Cpu::with_capacity(128).unwrap();
        assert_eq!(cpu.mem.capacity(), 128);
        assert_eq!(cpu.regs.sp, 127);
    }

    #[test]
    fn test_interrupt_returns_to_high_address() {
        let mut cpu = Cpu::new();
        cpu.mem.write(0, 0x20);
        cpu.load_program(&[IRET], 0x20);
        cpu.load_program(&[EI, NOOP, NOOP, LOAD_A_VAL, 9, HALT], 0xF0);

        cpu.tick();
        cpu.tick();
        cpu.request_interrupt(Interrupt::TIMER);
        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x20);
        assert_eq!(cpu.mem.read(255), 0xF2);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 0xF2);
        cpu.run_limited(10);
        assert_eq!(cpu.regs.a, 9);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_load_program_sets_pc() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[NOOP, HALT], 0x20);
        assert_eq!(cpu.regs.pc, 0x20);
        assert_eq!(cpu.mem.read(0x21), HALT);
    }

    #[test]
    fn test_load_store_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LOAD_A_VAL, 5, STORE_A, 0x10, HALT], 0);

        cpu.tick();
        assert_eq!(cpu.regs.a, 5);
        assert_eq!(cpu.regs.pc, 2);

        cpu.tick();
        cpu.tick();
        assert_eq!(cpu.mem.read(0x10), 5);
        assert!(cpu.is_halted());
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_add_wraps() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LOAD_A_VAL, 200, LOAD_B_VAL, 100, ADD, HALT], 0);
        cpu.run_limited(10);
        assert_eq!(cpu.regs.a, 44);
        assert_eq!(cpu.regs.b, 100);
    }

    #[test]
    fn test_load_from_memory_and_store_b() {
        let mut cpu = Cpu::new();
        cpu.mem.write(0x80, 9);
        cpu.load_program(&[LOAD_A_MEM, 0x80, LOAD_B_VAL, 3, STORE_B, 0x81, HALT], 0);
        cpu.run_limited(10);
        assert_eq!(cpu.regs.a, 9);
        assert_eq!(cpu.mem.read(0x81), 3);
    }

    #[test]
    fn test_jmp() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[JMP, 0x05, HALT, HALT, HALT, LOAD_A_VAL, 1, HALT], 0);
        cpu.tick();
        assert_eq!(cpu.regs.pc, 5);
        cpu.run_limited(10);
        assert_eq!(cpu.regs.a, 1);
    }

    #[test]
    fn test_stack_instructions() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LOAD_A_VAL, 0x33, PUSH_A, POP_B, HALT], 0);
        cpu.tick();
        cpu.tick();
        assert_eq!(cpu.regs.sp, 254);
        assert_eq!(cpu.mem.read(255), 0x33);
        cpu.tick();
        assert_eq!(cpu.regs.b, 0x33);
        assert_eq!(cpu.regs.sp, 255);
    }

    #[test]
    fn test_interrupt_waits_for_enable() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[NOOP, EI, NOOP], 0x10);
        cpu.mem.write(0, 0x40);
        cpu.request_interrupt(Interrupt::TIMER);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x11);
        assert_eq!(cpu.pending_interrupts(), vec![Interrupt::TIMER]);

        cpu.tick();
        assert!(cpu.regs.ie);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x40);
        assert!(!cpu.regs.ie);
        assert_eq!(cpu.mem.read(255), 0x12);
    }

    #[test]
    fn test_interrupts_do_not_nest() {
        let mut cpu = Cpu::new();
        cpu.mem.write(0, 0x40);
        cpu.mem.write(1, 0x50);
        cpu.load_program(&[NOOP, NOOP, IRET], 0x40);
        cpu.load_program(&[EI, NOOP, JMP, 0x21], 0x20);

        cpu.tick();
        cpu.request_interrupt(Interrupt::TIMER);
        cpu.request_interrupt(Interrupt(1));
        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x40);

        // IRQ1 stays pending while the timer routine runs.
        cpu.tick();
        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x42);
        assert_eq!(cpu.pending_interrupts(), vec![Interrupt(1)]);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x21);
        assert!(cpu.regs.ie);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 0x50);
        assert!(cpu.pending_interrupts().is_empty());
    }

    #[test]
    fn test_halted_is_terminal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[HALT], 0);
        cpu.tick();
        let before = cpu.snapshot();

        cpu.request_interrupt(Interrupt::TIMER);
        cpu.regs.ie = true;
        let regs = cpu.regs.clone();
        for _ in 0..3 {
            cpu.tick();
        }
        assert_eq!(cpu.regs, regs);
        assert_eq!(cpu.mem.as_slice(), before.memory.as_slice());
        assert_eq!(cpu.cycles, before.cycles);
    }

    #[test]
    #[traced_test]
    fn test_unknown_opcode_is_logged_and_skipped() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x42, LOAD_A_VAL, 7, HALT], 0);

        cpu.tick();
        assert_eq!(cpu.regs.pc, 1);
        assert_eq!(cpu.regs.ir, 0x42);
        assert!(cpu.status().contains("Unknown opcode 0x42"));
        assert!(logs_contain("unknown opcode"));

        cpu.run_limited(10);
        assert_eq!(cpu.regs.a, 7);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_fetch_latches() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[NOOP, LOAD_A_VAL, 1], 0x30);
        cpu.tick();
        cpu.tick();
        assert_eq!(cpu.regs.mar, 0x31);
        assert_eq!(cpu.regs.mdr, LOAD_A_VAL);
        assert_eq!(cpu.regs.ir, LOAD_A_VAL);
        assert!(cpu.status().contains("LOAD_A_VAL"));
    }

    #[test]
    fn test_pc_runs_off_the_end_without_panicking() {
        let mut cpu = Cpu::with_capacity(4).unwrap();
        cpu.load_program(&[NOOP, NOOP, NOOP, LOAD_A_VAL], 0);
        cpu.run_limited(8);
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.pc > 4);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut cpu = Cpu::new();
        cpu.request_interrupt(Interrupt::TIMER);
        let json = serde_json::to_string(&cpu.snapshot()).unwrap();
        let back: CpuSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pending, vec![Interrupt::TIMER]);
        assert_eq!(back.memory.len(), 256);
    }
}
