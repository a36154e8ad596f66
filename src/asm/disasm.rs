//! Disassembler.
//!
//! Converts raw memory back to readable assembly. The listing is derived
//! from the same bytes the CPU executes, so data interleaved with code
//! shows up as `DATA` lines or as whatever instruction it happens to
//! encode.

use crate::cpu::decode::{Opcode, OperandKind};

/// One decoded listing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    /// Address of the first byte.
    pub addr: usize,
    /// Raw bytes covered by this line.
    pub bytes: Vec<u8>,
    /// Assembly text.
    pub text: String,
}

/// Disassemble the instruction starting at `addr`.
///
/// Returns the text and the number of bytes consumed (1 or 2). A
/// two-byte opcode cut off by the end of `mem` shows `??` as its operand.
pub fn disassemble_at(mem: &[u8], addr: usize) -> (String, usize) {
    let Some(&byte) = mem.get(addr) else {
        return ("??".to_string(), 1);
    };

    match Opcode::from_byte(byte) {
        Some(op) => match op.operand() {
            Some(kind) => {
                let operand = mem
                    .get(addr + 1)
                    .map_or_else(|| "??".to_string(), |&v| format_operand(v, kind));
                (format!("{} {}", op, operand), 2)
            }
            None => (op.to_string(), 1),
        },
        None => (format!("DATA 0x{:02X}", byte), 1),
    }
}

/// Disassemble `count` instructions starting at `start`.
pub fn listing(mem: &[u8], start: usize, count: usize) -> Vec<ListingLine> {
    let mut lines = Vec::with_capacity(count);
    let mut addr = start;

    while lines.len() < count && addr < mem.len() {
        let (text, width) = disassemble_at(mem, addr);
        let end = (addr + width).min(mem.len());
        lines.push(ListingLine {
            addr,
            bytes: mem[addr..end].to_vec(),
            text,
        });
        addr += width;
    }

    lines
}

/// Disassemble a byte range to a text listing.
pub fn disassemble(mem: &[u8], base: usize) -> String {
    let mut output = String::new();
    output.push_str("; irq8 disassembly\n");
    output.push_str("; ----------------\n\n");

    for line in listing(mem, 0, mem.len()) {
        let hex: Vec<String> = line.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        output.push_str(&format!(
            "{:04X}: {:<6} {}\n",
            base + line.addr,
            hex.join(" "),
            line.text
        ));
    }

    output
}

fn format_operand(value: u8, kind: OperandKind) -> String {
    match kind {
        OperandKind::Value => format!("{}", value),
        OperandKind::Address => format!("0x{:02X}", value),
    }
}
