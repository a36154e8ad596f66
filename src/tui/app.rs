//! Debugger application state and logic.

use crate::asm::disasm::{listing, ListingLine};
use crate::asm::image::ProgramImage;
use crate::cpu::{Cpu, Interrupt};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::collections::HashSet;
use std::io::{self, stdout, Stdout};
use std::time::{Duration, Instant};

/// Bytes shown per memory grid row.
pub const MEM_ROW_WIDTH: usize = 16;

/// Slowest and fastest continuous run rates, in ticks per second.
pub const MIN_RATE: u32 = 1;
pub const MAX_RATE: u32 = 1000;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Image the CPU was booted from, for reset.
    pub image: ProgramImage,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Debugger message to display next to the CPU status.
    pub message: String,
    /// Memory grid scroll offset, in rows.
    pub mem_scroll: usize,
    /// Continuous run rate in ticks per second.
    pub rate: u32,
    last_tick: Instant,
}

impl DebuggerApp {
    /// Create a new debugger from a booted CPU.
    pub fn new(cpu: Cpu, image: ProgramImage, rate: u32) -> Self {
        Self {
            cpu,
            image,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            message: "Ready. Press 's' to step, 'r' to run, 'i' to interrupt, 'q' to quit.".into(),
            mem_scroll: 0,
            rate: rate.clamp(MIN_RATE, MAX_RATE),
            last_tick: Instant::now(),
        }
    }

    /// Step one tick.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.message = format!("CPU halted after {} ticks", self.cpu.cycles);
            self.running = false;
            return;
        }

        self.cpu.tick();
        self.message.clear();
    }

    /// Run until halt or breakpoint.
    pub fn run(&mut self) {
        self.running = true;
        self.last_tick = Instant::now();
        self.message = format!("Running at {} ticks/s...", self.rate);
    }

    /// Stop continuous execution.
    pub fn pause(&mut self) {
        self.running = false;
        self.message = "Paused.".into();
    }

    /// Time between ticks at the current rate.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.rate
    }

    /// Time left until the next scheduled tick.
    pub fn time_to_next_tick(&self) -> Duration {
        self.tick_interval().saturating_sub(self.last_tick.elapsed())
    }

    /// Run one iteration of continuous execution if it is due.
    pub fn on_timer(&mut self) {
        if !self.running || self.last_tick.elapsed() < self.tick_interval() {
            return;
        }
        self.last_tick = Instant::now();
        self.tick();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.message = format!("Halted after {} ticks", self.cpu.cycles);
            return;
        }

        self.step();

        // Check for breakpoint
        let pc = self.cpu.regs.pc;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.message = format!("Breakpoint at PC=0x{:02X}", pc);
        }
    }

    /// Raise the TIMER line, as the external event source.
    pub fn request_timer(&mut self) {
        self.cpu.request_interrupt(Interrupt::TIMER);
        self.message.clear();
    }

    /// Double or halve the run rate.
    pub fn faster(&mut self) {
        self.rate = (self.rate * 2).min(MAX_RATE);
        self.message = format!("Rate: {} ticks/s", self.rate);
    }

    pub fn slower(&mut self) {
        self.rate = (self.rate / 2).max(MIN_RATE);
        self.message = format!("Rate: {} ticks/s", self.rate);
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.message = format!("Removed breakpoint at PC=0x{:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.message = format!("Set breakpoint at PC=0x{:02X}", pc);
        }
    }

    /// Reset CPU to the freshly booted image.
    pub fn reset(&mut self) {
        match self.image.boot() {
            Ok(cpu) => {
                self.cpu = cpu;
                self.message = "Reset. Ready.".into();
            }
            Err(e) => self.message = format!("Reset failed: {}", e),
        }
        self.running = false;
    }

    /// Scroll the memory grid, clamped to the last row.
    pub fn scroll_memory(&mut self, down: bool) {
        let rows = self.cpu.mem.capacity().div_ceil(MEM_ROW_WIDTH);
        if down {
            self.mem_scroll = (self.mem_scroll + 1).min(rows.saturating_sub(1));
        } else {
            self.mem_scroll = self.mem_scroll.saturating_sub(1);
        }
    }

    /// Apply one key press.
    pub fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('s') => {
                self.running = false;
                self.step();
            }
            KeyCode::Char('r') => self.run(),
            KeyCode::Char('p') => self.pause(),
            KeyCode::Char('i') => self.request_timer(),
            KeyCode::Char('b') => self.toggle_breakpoint(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.faster(),
            KeyCode::Char('-') => self.slower(),
            KeyCode::Char('x') => self.reset(),
            KeyCode::Up => self.scroll_memory(false),
            KeyCode::Down => self.scroll_memory(true),
            _ => {}
        }
    }

    /// Disassembly starting at the current PC.
    ///
    /// Decoding walks forward from PC, so it stays aligned with the
    /// instruction about to execute even when code and data are mixed.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(ListingLine, bool)> {
        let pc = self.cpu.regs.pc as usize;
        listing(self.cpu.mem.as_slice(), pc, lines)
            .into_iter()
            .map(|line| {
                let is_current = line.addr == pc;
                (line, is_current)
            })
            .collect()
    }
}

/// Run the debugger on a booted CPU.
///
/// The terminal is put back into cooked mode on every exit path, including
/// draw or input errors.
pub fn run_debugger(image: ProgramImage, rate: u32) -> io::Result<()> {
    let cpu = image
        .boot()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut app = DebuggerApp::new(cpu, image, rate);

    enable_raw_mode()?;
    let result = stdout()
        .execute(EnterAlternateScreen)
        .and_then(|_| Terminal::new(CrosstermBackend::new(stdout())))
        .and_then(|mut terminal| event_loop(&mut terminal, &mut app));

    let raw = disable_raw_mode();
    let screen = stdout().execute(LeaveAlternateScreen).map(|_| ());
    result.and(raw).and(screen)
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut DebuggerApp) -> io::Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| super::ui::draw(frame, app))?;

        // Wake up in time for the next scheduled tick
        let timeout = if app.running {
            app.time_to_next_tick()
        } else {
            Duration::from_millis(50)
        };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        app.on_timer();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{sample_image, TIMER_ISR_ADDR};

    fn app() -> DebuggerApp {
        let image = sample_image();
        DebuggerApp::new(image.boot().unwrap(), image, 10)
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app();
        app.cpu.regs.pc = 0x13;
        app.toggle_breakpoint();
        app.cpu.regs.pc = 0x10;

        app.run();
        for _ in 0..10 {
            app.tick();
        }
        assert!(!app.running);
        assert_eq!(app.cpu.regs.pc, 0x13);
    }

    #[test]
    fn test_keys_drive_the_app() {
        let mut app = app();
        app.handle_key(KeyCode::Char('r'));
        assert!(app.running);

        app.handle_key(KeyCode::Char('s'));
        assert!(!app.running);
        assert_eq!(app.cpu.cycles, 1);

        app.handle_key(KeyCode::Down);
        assert_eq!(app.mem_scroll, 1);

        app.handle_key(KeyCode::Char('z'));
        assert!(!app.should_quit);
        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_interrupt_key_enters_isr() {
        let mut app = app();
        app.step();
        app.request_timer();
        app.step();
        assert_eq!(app.cpu.regs.pc, TIMER_ISR_ADDR);
    }

    #[test]
    fn test_rate_is_clamped() {
        let mut app = app();
        for _ in 0..20 {
            app.faster();
        }
        assert_eq!(app.rate, MAX_RATE);
        for _ in 0..20 {
            app.slower();
        }
        assert_eq!(app.rate, MIN_RATE);
        assert_eq!(app.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_reset_reboots_image() {
        let mut app = app();
        for _ in 0..5 {
            app.step();
        }
        app.reset();
        assert_eq!(app.cpu.regs.pc, 0x10);
        assert_eq!(app.cpu.cycles, 0);
    }

    #[test]
    fn test_disassembly_starts_at_pc() {
        let app = app();
        let lines = app.get_disassembly(3);
        assert!(lines[0].1);
        assert_eq!(lines[0].0.text, "ENABLE_INTERRUPTS");
        assert_eq!(lines[1].0.text, "LOAD_A_MEM 0x80");
    }
}
