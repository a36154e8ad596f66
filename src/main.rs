//! irq8 - CLI Entry Point
//!
//! Commands:
//! - `irq8 run <program>` - Run an image or ASM file
//! - `irq8 debug [program]` - Interactive debugger
//! - `irq8 asm <source>` - Assemble to a JSON image
//! - `irq8 disasm <image>` - Disassemble an image
//! - `irq8 demo` - Run the built-in sample with periodic TIMER interrupts

use clap::{Parser, Subcommand};
use irq8::{Cpu, Interrupt, ProgramImage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "irq8")]
#[command(version)]
#[command(about = "A step-by-step 8-bit CPU emulator with vectored interrupts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the JSON image or ASM file to execute
        program: String,
        /// Maximum number of ticks to run
        #[arg(short, long, default_value = "10000")]
        max_ticks: u64,
        /// Request a TIMER interrupt every N ticks (0 = never)
        #[arg(short, long, default_value = "0")]
        interrupt_every: u64,
        /// Override the image's memory capacity
        #[arg(short, long)]
        capacity: Option<usize>,
        /// Log every fetch
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the JSON image or ASM file (default: built-in sample)
        program: Option<String>,
        /// Continuous run rate in ticks per second
        #[arg(short, long, default_value = "10")]
        rate: u32,
    },
    /// Assemble source to a JSON image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the JSON image or ASM file
        image: String,
    },
    /// Run the built-in sample program
    Demo {
        /// Number of ticks to run
        #[arg(short, long, default_value = "200")]
        ticks: u64,
        /// Request a TIMER interrupt every N ticks
        #[arg(short, long, default_value = "25")]
        interrupt_every: u64,
        /// Print the sample's assembly source and exit
        #[arg(long)]
        source: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let trace = matches!(cli.command, Some(Commands::Run { trace: true, .. }));
    // The debugger owns the terminal, so it gets no log output.
    if !matches!(cli.command, Some(Commands::Debug { .. })) {
        init_logging(trace);
    }

    match cli.command {
        Some(Commands::Run { program, max_ticks, interrupt_every, capacity, trace: _, json }) => {
            let mut image = load_or_exit(&program);
            if let Some(capacity) = capacity {
                image.capacity = capacity;
            }
            run_image(&image, max_ticks, interrupt_every, json);
        }
        Some(Commands::Debug { program, rate }) => {
            debug_program(program.as_deref(), rate);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Demo { ticks, interrupt_every, source }) => {
            if source {
                print!("{}", irq8::demo::SAMPLE_SOURCE);
            } else {
                run_demo(ticks, interrupt_every);
            }
        }
        None => {
            println!("irq8 v{}", env!("CARGO_PKG_VERSION"));
            println!("An 8-bit CPU emulator with vectored interrupts");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the defaults.
fn init_logging(trace: bool) {
    let default = if trace { "irq8=trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_or_exit(path: &str) -> ProgramImage {
    match irq8::load_program_file(path) {
        Ok(image) if image.is_empty() => {
            eprintln!("❌ No bytes to load in {}", path);
            std::process::exit(1);
        }
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn boot_or_exit(image: &ProgramImage) -> Cpu {
    match image.boot() {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("❌ Failed to boot image: {}", e);
            std::process::exit(1);
        }
    }
}

/// Host-side driver: tick, raising TIMER on a fixed period.
fn drive(cpu: &mut Cpu, max_ticks: u64, interrupt_every: u64) -> u64 {
    let start = cpu.cycles;
    while cpu.is_running() && cpu.cycles - start < max_ticks {
        let elapsed = cpu.cycles - start;
        if interrupt_every > 0 && elapsed > 0 && elapsed % interrupt_every == 0 {
            cpu.request_interrupt(Interrupt::TIMER);
        }
        cpu.tick();
    }
    cpu.cycles - start
}

fn run_image(image: &ProgramImage, max_ticks: u64, interrupt_every: u64, json: bool) {
    let mut cpu = boot_or_exit(image);
    let ticks = drive(&mut cpu, max_ticks, interrupt_every);

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    print_state(&cpu, ticks);
    if cpu.is_running() {
        println!();
        println!("⚠️  Reached max ticks limit ({}). Use --max-ticks to increase.", max_ticks);
    }
}

fn print_state(cpu: &Cpu, ticks: u64) {
    let regs = &cpu.regs;
    println!("━━━ Result ━━━");
    println!("Ticks: {}", ticks);
    println!("State: {:?}", cpu.state);
    println!("A: 0x{:02X} ({})   B: 0x{:02X} ({})", regs.a, regs.a, regs.b, regs.b);
    println!("PC: 0x{:02X}   SP: 0x{:02X}   IR: 0x{:02X}   IE: {}", regs.pc, regs.sp, regs.ir, regs.ie as u8);
    let pending: Vec<String> = cpu.pending_interrupts().iter().map(|i| i.name()).collect();
    println!("Pending: [{}]", pending.join(", "));
    println!("Status: {}", cpu.status());
}

#[cfg(feature = "tui")]
fn debug_program(path: Option<&str>, rate: u32) {
    let image = match path {
        Some(path) => load_or_exit(path),
        None => irq8::demo::sample_image(),
    };

    if let Err(e) = irq8::run_debugger(image, rate) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: Option<&str>, _rate: u32) {
    eprintln!("❌ Built without the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    let out_path = output.unwrap_or_else(|| {
        source_path.trim_end_matches(".asm").to_string() + ".json"
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let image = match irq8::assemble(&source) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes in {} segments", image.len(), image.segments.len());

    if let Err(e) = irq8::save_image(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    let image = load_or_exit(path);

    println!("📖 Disassembling: {} (entry 0x{:02X})", path, image.entry);
    println!();

    for segment in &image.segments {
        println!("; segment at 0x{:02X}", segment.base);
        print!("{}", irq8::disassemble(&segment.bytes, segment.base as usize));
        println!();
    }
}

fn run_demo(ticks: u64, interrupt_every: u64) {
    use irq8::demo::{sample_image, COUNTER_ADDR, TICKS_ADDR};

    let mut cpu = boot_or_exit(&sample_image());
    let ran = drive(&mut cpu, ticks, interrupt_every);

    println!("━━━ Sample program ━━━");
    println!("Main loop counter: {}", cpu.mem.read(COUNTER_ADDR));
    println!("TIMER services:    {}", cpu.mem.read(TICKS_ADDR));
    println!();
    print_state(&cpu, ran);
}
