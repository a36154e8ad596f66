//! Built-in sample program.
//!
//! The main loop counts forever in `counter` with interrupts enabled.
//! Every TIMER interrupt saves A and B, bumps `ticks`, restores A and B
//! and returns, so the main loop never notices it was interrupted.

use crate::asm::image::ProgramImage;
use crate::cpu::Opcode;

/// Address of the main loop's counter.
pub const COUNTER_ADDR: u16 = 0x80;
/// Address of the interrupt tick counter.
pub const TICKS_ADDR: u16 = 0x81;
/// Entry point of the main program.
pub const MAIN_ADDR: u16 = 0x10;
/// Address of the TIMER service routine.
pub const TIMER_ISR_ADDR: u16 = 0x40;

/// Assembly source of [`sample_image`].
pub const SAMPLE_SOURCE: &str = r#"; irq8 sample: counting main loop + TIMER service routine

        ORG 0x00            ; vector table
        DB  timer_isr       ; TIMER

        ORG 0x10
ENTRY:  ENABLE_INTERRUPTS
loop:   LOAD_A_MEM counter
        LOAD_B_VAL 1
        ADD
        STORE_A counter
        JMP loop

        ORG 0x40
timer_isr:
        PUSH_A              ; save caller registers
        PUSH_B
        LOAD_A_MEM ticks
        LOAD_B_VAL 1
        ADD
        STORE_A ticks
        POP_B               ; restore in reverse order
        POP_A
        IRET

        ORG 0x80
counter: DB 0
ticks:   DB 0
"#;

/// The sample program as a ready-to-boot image.
pub fn sample_image() -> ProgramImage {
    use Opcode::*;

    let counter = COUNTER_ADDR as u8;
    let ticks = TICKS_ADDR as u8;
    let main_loop = (MAIN_ADDR + 1) as u8;

    let mut image = ProgramImage::new();
    image.entry = MAIN_ADDR;

    image.push(0x00, vec![TIMER_ISR_ADDR as u8]);
    image.push(MAIN_ADDR, vec![
        EnableInterrupts.byte(),
        LoadAMem.byte(), counter,
        LoadBVal.byte(), 1,
        Add.byte(),
        StoreA.byte(), counter,
        Jmp.byte(), main_loop,
    ]);
    image.push(TIMER_ISR_ADDR, vec![
        PushA.byte(),
        PushB.byte(),
        LoadAMem.byte(), ticks,
        LoadBVal.byte(), 1,
        Add.byte(),
        StoreA.byte(), ticks,
        PopB.byte(),
        PopA.byte(),
        Iret.byte(),
    ]);
    image.push(COUNTER_ADDR, vec![0, 0]);

    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::Interrupt;

    #[test]
    fn test_source_matches_image() {
        assert_eq!(assemble(SAMPLE_SOURCE).unwrap(), sample_image());
    }

    #[test]
    fn test_sample_counts_and_services_timer() {
        let mut cpu = sample_image().boot().unwrap();

        // EI + one full pass of the five-instruction loop.
        for _ in 0..6 {
            cpu.tick();
        }
        assert_eq!(cpu.mem.read(COUNTER_ADDR), 1);

        cpu.request_interrupt(Interrupt::TIMER);
        let a_before = cpu.regs.a;
        let b_before = cpu.regs.b;
        cpu.tick();
        assert_eq!(cpu.regs.pc, TIMER_ISR_ADDR);

        // Nine instructions in the service routine.
        for _ in 0..9 {
            cpu.tick();
        }
        assert_eq!(cpu.mem.read(TICKS_ADDR), 1);
        assert_eq!((cpu.regs.a, cpu.regs.b), (a_before, b_before));
        assert!(cpu.regs.ie);
        assert_eq!(cpu.regs.sp, 255);

        // The main loop carries on from where it was interrupted.
        for _ in 0..5 {
            cpu.tick();
        }
        assert_eq!(cpu.mem.read(COUNTER_ADDR), 2);
    }
}
