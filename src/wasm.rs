//! WebAssembly bindings for the emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_at;
use crate::asm::image::ProgramImage;
use crate::cpu::{Cpu, Interrupt};
use crate::demo::sample_image;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    image: ProgramImage,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a CPU booted with the sample program.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        let image = sample_image();
        let cpu = image.boot().unwrap_or_default();
        Self { cpu, image }
    }

    /// Load a program from assembly source code. Returns the byte count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let image = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.cpu = image.boot()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = image.len();
        self.image = image;
        Ok(len)
    }

    /// Advance one tick.
    #[wasm_bindgen]
    pub fn tick(&mut self) {
        self.cpu.tick();
    }

    /// Tick until halt or `max_ticks`. Returns the total tick count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_ticks: u32) -> u64 {
        self.cpu.run_limited(max_ticks as u64);
        self.cpu.cycles
    }

    /// Raise the TIMER interrupt.
    #[wasm_bindgen]
    pub fn request_timer(&mut self) -> bool {
        self.cpu.request_interrupt(Interrupt::TIMER)
    }

    /// Raise an arbitrary interrupt line.
    #[wasm_bindgen]
    pub fn request_interrupt(&mut self, code: u8) -> bool {
        self.cpu.request_interrupt(Interrupt(code))
    }

    /// Reset CPU to the loaded image.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        if let Ok(cpu) = self.image.boot() {
            self.cpu = cpu;
        }
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Get tick count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    #[wasm_bindgen]
    pub fn a(&self) -> u8 {
        self.cpu.regs.a
    }

    #[wasm_bindgen]
    pub fn b(&self) -> u8 {
        self.cpu.regs.b
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc
    }

    #[wasm_bindgen]
    pub fn sp(&self) -> u16 {
        self.cpu.regs.sp
    }

    #[wasm_bindgen]
    pub fn ie(&self) -> bool {
        self.cpu.regs.ie
    }

    /// Current CPU status line.
    #[wasm_bindgen]
    pub fn status(&self) -> String {
        self.cpu.status().to_string()
    }

    /// Get all memory.
    #[wasm_bindgen]
    pub fn memory_all(&self) -> Vec<u8> {
        self.cpu.mem.as_slice().to_vec()
    }

    /// Full observable state as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.snapshot())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// Disassemble the instruction at `addr`.
    #[wasm_bindgen]
    pub fn disassemble_at(&self, addr: usize) -> String {
        disassemble_at(self.cpu.mem.as_slice(), addr).0
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return its size in bytes.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let image = assemble(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(image.len())
}
