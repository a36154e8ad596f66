//! TUI debugger and host-side driver.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, IE and pending-interrupt view
//! - Memory grid with PC and SP highlighted
//! - Step/run/breakpoint controls with an adjustable tick rate
//! - A key that raises the TIMER interrupt
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
