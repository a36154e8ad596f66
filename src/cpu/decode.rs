//! Opcode table.
//!
//! Every instruction is one opcode byte, optionally followed by a single
//! operand byte (an immediate value or an address).

use serde::{Serialize, Deserialize};

/// A recognised opcode.
///
/// Any byte that does not map to a variant is data: fetching it is legal
/// and executes as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== Special ====================

    /// No operation
    Noop = 0x00,

    // ==================== Data Transfer ====================

    /// A := v
    LoadAVal = 0x01,
    /// B := v
    LoadBVal = 0x02,
    /// A := [addr]
    LoadAMem = 0x03,
    /// B := [addr]
    LoadBMem = 0x04,
    /// [addr] := A
    StoreA = 0x05,
    /// [addr] := B
    StoreB = 0x06,

    // ==================== Arithmetic ====================

    /// A := A + B (mod 256)
    Add = 0x07,

    // ==================== Control Flow ====================

    /// PC := addr
    Jmp = 0x08,
    /// IE := 1
    EnableInterrupts = 0x09,
    /// PC := pop(); IE := 1
    Iret = 0x0A,

    // ==================== Stack ====================

    /// push(A)
    PushA = 0x0B,
    /// push(B)
    PushB = 0x0C,
    /// A := pop()
    PopA = 0x0D,
    /// B := pop()
    PopB = 0x0E,

    /// Stop the CPU for good
    Halt = 0xFF,
}

/// Operand shape of a two-byte instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Immediate byte value.
    Value,
    /// Memory address.
    Address,
}

impl Opcode {
    /// Every opcode, in encoding order.
    pub const ALL: [Opcode; 16] = [
        Opcode::Noop,
        Opcode::LoadAVal,
        Opcode::LoadBVal,
        Opcode::LoadAMem,
        Opcode::LoadBMem,
        Opcode::StoreA,
        Opcode::StoreB,
        Opcode::Add,
        Opcode::Jmp,
        Opcode::EnableInterrupts,
        Opcode::Iret,
        Opcode::PushA,
        Opcode::PushB,
        Opcode::PopA,
        Opcode::PopB,
        Opcode::Halt,
    ];

    /// Decode a byte. `None` means the byte is not an instruction.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => Opcode::Noop,
            0x01 => Opcode::LoadAVal,
            0x02 => Opcode::LoadBVal,
            0x03 => Opcode::LoadAMem,
            0x04 => Opcode::LoadBMem,
            0x05 => Opcode::StoreA,
            0x06 => Opcode::StoreB,
            0x07 => Opcode::Add,
            0x08 => Opcode::Jmp,
            0x09 => Opcode::EnableInterrupts,
            0x0A => Opcode::Iret,
            0x0B => Opcode::PushA,
            0x0C => Opcode::PushB,
            0x0D => Opcode::PopA,
            0x0E => Opcode::PopB,
            0xFF => Opcode::Halt,
            _ => return None,
        };
        Some(op)
    }

    /// Encoded byte value.
    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Noop => "NOOP",
            Opcode::LoadAVal => "LOAD_A_VAL",
            Opcode::LoadBVal => "LOAD_B_VAL",
            Opcode::LoadAMem => "LOAD_A_MEM",
            Opcode::LoadBMem => "LOAD_B_MEM",
            Opcode::StoreA => "STORE_A",
            Opcode::StoreB => "STORE_B",
            Opcode::Add => "ADD",
            Opcode::Jmp => "JMP",
            Opcode::EnableInterrupts => "ENABLE_INTERRUPTS",
            Opcode::Iret => "IRET",
            Opcode::PushA => "PUSH_A",
            Opcode::PushB => "PUSH_B",
            Opcode::PopA => "POP_A",
            Opcode::PopB => "POP_B",
            Opcode::Halt => "HALT",
        }
    }

    /// Look an opcode up by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// The operand this opcode expects, if any.
    pub fn operand(self) -> Option<OperandKind> {
        match self {
            Opcode::LoadAVal | Opcode::LoadBVal => Some(OperandKind::Value),
            Opcode::LoadAMem
            | Opcode::LoadBMem
            | Opcode::StoreA
            | Opcode::StoreB
            | Opcode::Jmp => Some(OperandKind::Address),
            Opcode::Noop
            | Opcode::Add
            | Opcode::EnableInterrupts
            | Opcode::Iret
            | Opcode::PushA
            | Opcode::PushB
            | Opcode::PopA
            | Opcode::PopB
            | Opcode::Halt => None,
        }
    }

    /// Encoded length in bytes (1 or 2).
    #[inline]
    pub fn width(self) -> u16 {
        if self.operand().is_some() { 2 } else { 1 }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Mnemonic for a raw byte, `DATA` when it is not an opcode.
pub fn mnemonic_of(byte: u8) -> &'static str {
    Opcode::from_byte(byte).map_or("DATA", Opcode::mnemonic)
}
