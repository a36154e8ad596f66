//! Property-based tests for CPU invariants.

use irq8::{Cpu, Interrupt, Memory, Opcode};
use proptest::prelude::*;

proptest! {
    /// Fetch moves PC by one for every byte, plus one more for an operand.
    #[test]
    fn fetch_advances_pc(byte in any::<u8>(), operand in any::<u8>(), start in 0x10u16..0xF0) {
        let mut cpu = Cpu::new();
        cpu.load_program(&[byte, operand], start);
        cpu.tick();

        match Opcode::from_byte(byte) {
            Some(Opcode::Jmp) => prop_assert_eq!(cpu.regs.pc, operand as u16),
            Some(Opcode::Iret) => prop_assert!(cpu.regs.ie),
            Some(op) => prop_assert_eq!(cpu.regs.pc, start + op.width()),
            None => prop_assert_eq!(cpu.regs.pc, start + 1),
        }
        prop_assert_eq!(cpu.regs.mar, start);
        prop_assert_eq!(cpu.regs.ir, byte);
    }

    /// Push followed by pop is the identity away from the stack bounds.
    #[test]
    fn push_pop_inverse(value in any::<u8>(), sp in 1u16..255) {
        let mut mem = Memory::default();
        let mut stack_pointer = sp;

        mem.push(&mut stack_pointer, value);
        prop_assert_eq!(stack_pointer, sp - 1);
        prop_assert_eq!(mem.pop(&mut stack_pointer), value);
        prop_assert_eq!(stack_pointer, sp);
    }

    /// SP never leaves memory, whatever the program does.
    #[test]
    fn sp_stays_in_bounds(program in proptest::collection::vec(any::<u8>(), 1..64), ticks in 1u64..300) {
        let mut cpu = Cpu::with_capacity(128).unwrap();
        cpu.load_program(&program, 0);
        for _ in 0..ticks {
            cpu.tick();
            prop_assert!((cpu.regs.sp as usize) < cpu.mem.capacity());
        }
    }

    /// Any number of requests for the same line queue exactly one entry.
    #[test]
    fn requests_coalesce(codes in proptest::collection::vec(0u8..4, 0..32)) {
        let mut cpu = Cpu::new();
        for &code in &codes {
            cpu.request_interrupt(Interrupt(code));
        }

        let pending = cpu.pending_interrupts();
        let mut unique = codes.clone();
        unique.sort_unstable();
        unique.dedup();
        prop_assert_eq!(pending.len(), unique.len());

        // First-request order is preserved.
        let mut first_seen = Vec::new();
        for code in codes {
            if !first_seen.contains(&code) {
                first_seen.push(code);
            }
        }
        let pending_codes: Vec<u8> = pending.iter().map(|i| i.code()).collect();
        prop_assert_eq!(pending_codes, first_seen);
    }

    /// ADD is addition modulo 256 and leaves B alone.
    #[test]
    fn add_wraps(a in any::<u8>(), b in any::<u8>()) {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            Opcode::LoadAVal.byte(), a,
            Opcode::LoadBVal.byte(), b,
            Opcode::Add.byte(),
        ], 0);
        cpu.run_limited(3);
        prop_assert_eq!(cpu.regs.a, a.wrapping_add(b));
        prop_assert_eq!(cpu.regs.b, b);
    }
}
