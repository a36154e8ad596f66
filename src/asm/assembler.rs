//! Simple assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//!         ORG 0x00            ; Start a segment at address 0
//!         DB  isr             ; Vector table entry for TIMER
//!         ORG 0x10
//! ENTRY:  ENABLE_INTERRUPTS   ; Execution starts at the ENTRY label
//! loop:   LOAD_A_MEM count
//!         LOAD_B_VAL 1
//!         ADD
//!         STORE_A count
//!         JMP loop
//! count:  DB 0
//! ```
//!
//! Operands are decimal, `0x` hex, `'c'` characters or labels. Labels are
//! case-insensitive and may be used before they are defined.

use crate::asm::image::ProgramImage;
use crate::cpu::decode::Opcode;
use std::collections::HashMap;
use thiserror::Error;

/// Label that selects the entry point when present.
pub const ENTRY_LABEL: &str = "ENTRY";

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<ProgramImage, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A label reference waiting for pass 2.
struct Fixup {
    segment: usize,
    offset: usize,
    label: String,
    line: usize,
}

/// The assembler state.
struct Assembler {
    /// Address of the next emitted byte.
    current_addr: u32,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u32>,
    /// Forward references to patch.
    pending: Vec<Fixup>,
    /// Output segments as (base, bytes).
    segments: Vec<(u16, Vec<u8>)>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            segments: vec![(0, Vec::new())],
        }
    }

    fn assemble(&mut self, source: &str) -> Result<ProgramImage, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        let mut image = ProgramImage::new();
        for (base, bytes) in self.segments.drain(..) {
            if !bytes.is_empty() {
                image.push(base, bytes);
            }
        }
        image.entry = match self.symbols.get(ENTRY_LABEL) {
            Some(&addr) => addr as u16,
            None => image.segments.first().map_or(0, |s| s.base),
        };

        Ok(image)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments, but not a ';' quoted as a character literal
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':').filter(|&i| is_label(line[..i].trim())) {
            let label = line[..colon_idx].trim().to_uppercase();
            if self.symbols.insert(label.clone(), self.current_addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_statement(rest, line_num);
            }
            return Ok(());
        }

        self.process_statement(line, line_num)
    }

    fn process_statement(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, operands) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m.to_uppercase(), rest.trim()),
            None => (line.to_uppercase(), ""),
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                if operands.is_empty() {
                    return Err(AssemblerError::MissingOperand { line: line_num, mnemonic });
                }
                let addr = self.parse_number(operands, line_num)?;
                if addr > u16::MAX as u32 {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr as i64 });
                }
                self.current_addr = addr;
                match self.segments.last_mut() {
                    Some(last) if last.1.is_empty() => last.0 = addr as u16,
                    _ => self.segments.push((addr as u16, Vec::new())),
                }
            }

            "DB" | "DATA" => {
                if operands.is_empty() {
                    return Err(AssemblerError::MissingOperand { line: line_num, mnemonic });
                }
                for operand in operands.split(',') {
                    let byte = self.parse_operand(operand, line_num)?;
                    self.emit(byte, line_num)?;
                }
            }

            // Instructions
            _ => {
                let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;

                match (opcode.operand(), operands.is_empty()) {
                    (Some(_), true) => {
                        return Err(AssemblerError::MissingOperand { line: line_num, mnemonic });
                    }
                    (None, false) => {
                        return Err(AssemblerError::UnexpectedOperand { line: line_num, mnemonic });
                    }
                    (Some(_), false) => {
                        self.emit(opcode.byte(), line_num)?;
                        let byte = self.parse_operand(operands, line_num)?;
                        self.emit(byte, line_num)?;
                    }
                    (None, true) => {
                        self.emit(opcode.byte(), line_num)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse a byte operand. Labels become placeholders patched in pass 2.
    fn parse_operand(&mut self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let operand = operand.trim();
        if operand.is_empty() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "empty operand".into(),
            });
        }

        if is_label(operand) {
            let segment = self.segments.len() - 1;
            let offset = self.segments[segment].1.len();
            self.pending.push(Fixup {
                segment,
                offset,
                label: operand.to_uppercase(),
                line: line_num,
            });
            return Ok(0); // Placeholder, will be resolved in pass 2
        }

        let value = self.parse_number(operand, line_num)?;
        u8::try_from(value).map_err(|_| AssemblerError::ValueOutOfRange {
            line: line_num,
            value: value as i64,
        })
    }

    fn parse_number(&self, operand: &str, line_num: usize) -> Result<u32, AssemblerError> {
        let operand = operand.trim();

        // Character literal
        if let Some(inner) = operand.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            let mut chars = inner.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() => Ok(c as u32),
                _ => Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid character literal {}", operand),
                }),
            };
        }

        // Check for hex literal
        if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            return u32::from_str_radix(hex, 16).map_err(|_| AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid hex literal {}", operand),
            });
        }

        // Decimal, possibly negative (rejected as out of range)
        match operand.parse::<i64>() {
            Ok(num) => u32::try_from(num)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value: num }),
            Err(_) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid number {}", operand),
            }),
        }
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr > u16::MAX as u32 {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: self.current_addr as i64,
            });
        }
        if let Some(last) = self.segments.last_mut() {
            last.1.push(byte);
        }
        self.current_addr += 1;
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for fixup in &self.pending {
            let addr = *self.symbols.get(&fixup.label).ok_or_else(|| {
                AssemblerError::UndefinedLabel { line: fixup.line, label: fixup.label.clone() }
            })?;

            // Operands are one byte wide, so labels must sit in the first page.
            let byte = u8::try_from(addr).map_err(|_| AssemblerError::ValueOutOfRange {
                line: fixup.line,
                value: addr as i64,
            })?;
            self.segments[fixup.segment].1[fixup.offset] = byte;
        }
        Ok(())
    }
}

fn is_label(operand: &str) -> bool {
    operand
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && operand.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn strip_comment(line: &str) -> &str {
    let mut in_char = false;
    for (idx, c) in line.char_indices() {
        match c {
            '\'' => in_char = !in_char,
            ';' if !in_char => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("{mnemonic} on line {line} requires an operand")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("{mnemonic} on line {line} takes no operand")]
    UnexpectedOperand { line: usize, mnemonic: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            LOAD_A_VAL 5
            STORE_A 0x10
            HALT
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].bytes, vec![0x01, 5, 0x05, 0x10, 0xFF]);
        assert_eq!(image.entry, 0);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            LOAD_A_MEM value
            JMP done
            NOOP
        done:
            HALT
        value: DB 42
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.segments[0].bytes, vec![0x03, 6, 0x08, 5, 0x00, 0xFF, 42]);
    }

    #[test]
    fn test_org_segments_and_entry() {
        let source = r#"
            ORG 0
            DB isr
            ORG 0x10
        ENTRY: ENABLE_INTERRUPTS
            HALT
            ORG 0x40
        isr: IRET
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.entry, 0x10);
        assert_eq!(image.segments.len(), 3);
        assert_eq!(image.segments[0].bytes, vec![0x40]);
        assert_eq!(image.segments[1].base, 0x10);
        assert_eq!(image.segments[2].bytes, vec![0x0A]);
    }

    #[test]
    fn test_assemble_data() {
        let image = assemble("DB 1, 0x2, 'A', 255").unwrap();
        assert_eq!(image.segments[0].bytes, vec![1, 2, 65, 255]);
    }

    #[test]
    fn test_assemble_errors() {
        assert!(matches!(
            assemble("MUL 3"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("NOOP\nJMP nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("LOAD_A_VAL 256"),
            Err(AssemblerError::ValueOutOfRange { value: 256, .. })
        ));
        assert!(matches!(
            assemble("DB -1"),
            Err(AssemblerError::ValueOutOfRange { value: -1, .. })
        ));
        assert!(matches!(
            assemble("STORE_A"),
            Err(AssemblerError::MissingOperand { .. })
        ));
        assert!(matches!(
            assemble("ADD 1"),
            Err(AssemblerError::UnexpectedOperand { .. })
        ));
        assert!(matches!(
            assemble("a: NOOP\nA: NOOP"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
    }

    #[test]
    fn test_label_past_first_page() {
        let source = "ORG 0x100\nfar: NOOP\nJMP far";
        assert!(matches!(
            assemble(source),
            Err(AssemblerError::ValueOutOfRange { value: 256, .. })
        ));
    }

    #[test]
    fn test_semicolon_character_literal() {
        let image = assemble("DB ';' ; trailing comment").unwrap();
        assert_eq!(image.segments[0].bytes, vec![b';']);
    }
}
