// 65816 instruction-level tests
//
// Each test boots a synthetic LoROM image and steps the CPU through a
// short machine-code program, then inspects registers, flags, and memory.

mod common;

use common::RomBuilder;
use snes_rs::cpu::flags;
use snes_rs::{Bus, Cartridge, Cpu};

/// Boot a CPU with `code` placed at $00:8000 (the reset target)
fn boot(code: &[u8]) -> (Cpu, Bus) {
    let rom = RomBuilder::new().code(0x8000, code).build();
    boot_image(&rom)
}

fn boot_image(rom: &[u8]) -> (Cpu, Bus) {
    let mut bus = Bus::new();
    bus.load_cartridge(Cartridge::from_bytes(rom).unwrap());
    let mut cpu = Cpu::new();
    cpu.reset(&mut bus);
    (cpu, bus)
}

/// Step the CPU `n` times
fn step_n(cpu: &mut Cpu, bus: &mut Bus, n: usize) {
    for _ in 0..n {
        cpu.step(bus);
    }
}

// ========================================
// Loads, Stores, and Width Switching
// ========================================

#[test]
fn test_lda_immediate_8bit() {
    let (mut cpu, mut bus) = boot(&[0xA9, 0x42, 0xDB]); // LDA #$42; STP
    cpu.step(&mut bus);
    assert_eq!(cpu.a & 0xFF, 0x42);
    assert!(!cpu.get_flag(flags::ZERO));
    assert!(!cpu.get_flag(flags::NEGATIVE));
}

#[test]
fn test_lda_sets_negative_and_zero() {
    let (mut cpu, mut bus) = boot(&[0xA9, 0x80, 0xA9, 0x00, 0xDB]);
    cpu.step(&mut bus);
    assert!(cpu.get_flag(flags::NEGATIVE), "bit 7 drives N in 8-bit mode");
    cpu.step(&mut bus);
    assert!(cpu.get_flag(flags::ZERO));
}

#[test]
fn test_sixteen_bit_immediate_after_rep() {
    // CLC; XCE; REP #$30; LDA #$1234; STP
    let (mut cpu, mut bus) = boot(&[0x18, 0xFB, 0xC2, 0x30, 0xA9, 0x34, 0x12, 0xDB]);
    step_n(&mut cpu, &mut bus, 4);
    assert!(!cpu.emulation);
    assert!(!cpu.memory_is_8bit());
    assert_eq!(cpu.a, 0x1234);
}

#[test]
fn test_sta_reaches_wram() {
    // LDA #$7A; STA $0042; STP
    let (mut cpu, mut bus) = boot(&[0xA9, 0x7A, 0x8D, 0x42, 0x00, 0xDB]);
    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(bus.read(0x00_0042), 0x7A);
    assert_eq!(bus.read(0x7E_0042), 0x7A, "bank 0 mirrors WRAM");
}

#[test]
fn test_eight_bit_store_preserves_accumulator_high_byte() {
    // Native 16-bit, load $1234, drop to 8-bit, LDA #$56: A keeps $12 high
    let (mut cpu, mut bus) = boot(&[
        0x18, 0xFB, // native
        0xC2, 0x20, // REP #$20
        0xA9, 0x34, 0x12, // LDA #$1234
        0xE2, 0x20, // SEP #$20
        0xA9, 0x56, // LDA #$56
        0xDB,
    ]);
    step_n(&mut cpu, &mut bus, 6);
    assert_eq!(cpu.a, 0x1256);
}

// ========================================
// Mode Transitions
// ========================================

#[test]
fn test_xce_round_trip() {
    // XCE; XCE; STP - starting in emulation with C=0
    let (mut cpu, mut bus) = boot(&[0xFB, 0xFB, 0xDB]);
    assert!(cpu.emulation);
    assert!(!cpu.get_flag(flags::CARRY));

    cpu.step(&mut bus);
    assert!(!cpu.emulation, "E takes the old carry");
    assert!(cpu.get_flag(flags::CARRY), "C takes the old E");
    assert!(
        cpu.get_flag(flags::MEMORY_8) && cpu.get_flag(flags::INDEX_8),
        "M and X stay set until REP clears them"
    );

    cpu.sp = 0x1FF0; // native SP leaves page 1
    cpu.step(&mut bus);
    assert!(cpu.emulation, "second XCE returns to emulation");
    assert_eq!(cpu.sp & 0xFF00, 0x0100, "SP high byte forced to $01");
    assert!(cpu.get_flag(flags::MEMORY_8) && cpu.get_flag(flags::INDEX_8));
}

#[test]
fn test_rep_sep_round_trip() {
    // CLC; XCE; REP #$09; SEP #$09; STP
    let (mut cpu, mut bus) = boot(&[0x18, 0xFB, 0xC2, 0x09, 0xE2, 0x09, 0xDB]);
    step_n(&mut cpu, &mut bus, 2);
    let before = cpu.status;
    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.status, before, "REP then SEP restores P");
}

#[test]
fn test_sp_stays_in_page_one_through_stack_ops() {
    // PHA; PHP; PLA; PLP; STP in emulation mode
    let (mut cpu, mut bus) = boot(&[0x48, 0x08, 0x68, 0x28, 0xDB]);
    for _ in 0..4 {
        cpu.step(&mut bus);
        assert_eq!(cpu.sp & 0xFF00, 0x0100, "E=1 keeps SP in page 1");
    }
}

// ========================================
// Arithmetic
// ========================================

#[test]
fn test_adc_overflow_and_carry() {
    // LDA #$7F; CLC; ADC #$01 -> $80, V set, C clear, N set
    let (mut cpu, mut bus) = boot(&[0xA9, 0x7F, 0x18, 0x69, 0x01, 0xDB]);
    step_n(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.a & 0xFF, 0x80);
    assert!(cpu.get_flag(flags::OVERFLOW));
    assert!(!cpu.get_flag(flags::CARRY));
    assert!(cpu.get_flag(flags::NEGATIVE));
}

#[test]
fn test_adc_sets_carry_on_wrap() {
    // LDA #$FF; SEC; ADC #$00 -> $00, C set, Z set
    let (mut cpu, mut bus) = boot(&[0xA9, 0xFF, 0x38, 0x69, 0x00, 0xDB]);
    step_n(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.a & 0xFF, 0x00);
    assert!(cpu.get_flag(flags::CARRY));
    assert!(cpu.get_flag(flags::ZERO));
}

#[test]
fn test_adc_decimal_mode() {
    // SED; LDA #$09; CLC; ADC #$01 -> BCD $10
    let (mut cpu, mut bus) = boot(&[0xF8, 0xA9, 0x09, 0x18, 0x69, 0x01, 0xDB]);
    step_n(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.a & 0xFF, 0x10);
    assert!(!cpu.get_flag(flags::CARRY));
}

#[test]
fn test_sbc_decimal_mode() {
    // SED; LDA #$10; SEC; SBC #$01 -> BCD $09
    let (mut cpu, mut bus) = boot(&[0xF8, 0xA9, 0x10, 0x38, 0xE9, 0x01, 0xDB]);
    step_n(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.a & 0xFF, 0x09);
    assert!(cpu.get_flag(flags::CARRY), "no borrow");
}

#[test]
fn test_adc_16bit_carry() {
    // native 16-bit: LDA #$FFFF; CLC; ADC #$0001 -> 0, C set, Z set
    let (mut cpu, mut bus) = boot(&[
        0x18, 0xFB, 0xC2, 0x30, 0xA9, 0xFF, 0xFF, 0x18, 0x69, 0x01, 0x00, 0xDB,
    ]);
    step_n(&mut cpu, &mut bus, 5);
    assert_eq!(cpu.a, 0);
    assert!(cpu.get_flag(flags::CARRY));
    assert!(cpu.get_flag(flags::ZERO));
}

#[test]
fn test_cmp_sets_carry_when_greater_or_equal() {
    // LDA #$40; CMP #$40 -> Z and C set
    let (mut cpu, mut bus) = boot(&[0xA9, 0x40, 0xC9, 0x40, 0xC9, 0x41, 0xDB]);
    step_n(&mut cpu, &mut bus, 2);
    assert!(cpu.get_flag(flags::ZERO));
    assert!(cpu.get_flag(flags::CARRY));
    cpu.step(&mut bus);
    assert!(!cpu.get_flag(flags::CARRY), "A < operand clears C");
}

// ========================================
// Shifts
// ========================================

#[test]
fn test_asl_and_ror_carry_chain() {
    // LDA #$81; ASL A -> $02, C=1; ROR A -> $81 (carry rotates back in)
    let (mut cpu, mut bus) = boot(&[0xA9, 0x81, 0x0A, 0x6A, 0xDB]);
    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.a & 0xFF, 0x02);
    assert!(cpu.get_flag(flags::CARRY));
    cpu.step(&mut bus);
    assert_eq!(cpu.a & 0xFF, 0x81);
    assert!(!cpu.get_flag(flags::CARRY));
}

// ========================================
// Control Flow
// ========================================

#[test]
fn test_branch_taken_and_not_taken() {
    // LDA #$00; BNE +2 (not taken); BEQ +1 (taken, skips STP)
    let (mut cpu, mut bus) = boot(&[0xA9, 0x00, 0xD0, 0x02, 0xF0, 0x01, 0xDB, 0xA9, 0x11, 0xDB]);
    step_n(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.pc, 0x8007, "BEQ jumped over the STP");
    cpu.step(&mut bus);
    assert_eq!(cpu.a & 0xFF, 0x11);
}

#[test]
fn test_jsr_rts() {
    let rom = RomBuilder::new()
        .code(0x8000, &[0x20, 0x10, 0x80, 0xDB]) // JSR $8010; STP
        .code(0x8010, &[0xA9, 0x55, 0x60]) // LDA #$55; RTS
        .build();
    let (mut cpu, mut bus) = boot_image(&rom);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x8010);
    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(cpu.a & 0xFF, 0x55);
    assert_eq!(cpu.pc, 0x8003, "RTS lands after the JSR operand");
}

#[test]
fn test_jsl_rtl() {
    let rom = RomBuilder::new()
        .code(0x8000, &[0x22, 0x20, 0x80, 0x00, 0xDB]) // JSL $00:8020; STP
        .code(0x8020, &[0x6B]) // RTL
        .build();
    let (mut cpu, mut bus) = boot_image(&rom);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x8020);
    assert_eq!(cpu.pb, 0x00);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x8004, "RTL lands after the JSL operand");
}

#[test]
fn test_jmp_indirect() {
    // Pointer at $0020 -> $8010
    let rom = RomBuilder::new()
        .code(0x8000, &[0x6C, 0x20, 0x00, 0xDB]) // JMP ($0020); STP
        .code(0x8010, &[0xA9, 0x99, 0xDB])
        .build();
    let (mut cpu, mut bus) = boot_image(&rom);
    bus.write(0x00_0020, 0x10);
    bus.write(0x00_0021, 0x80);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x8010);
    cpu.step(&mut bus);
    assert_eq!(cpu.a & 0xFF, 0x99);
}

// ========================================
// Block Moves
// ========================================

#[test]
fn test_mvn_moves_block() {
    // Native 16-bit: move 4 bytes from $7E:1000 to $7E:1800
    let (mut cpu, mut bus) = boot(&[
        0x18, 0xFB, // native
        0xC2, 0x30, // 16-bit A and indexes
        0xA9, 0x03, 0x00, // LDA #$0003 (count - 1)
        0xA2, 0x00, 0x10, // LDX #$1000
        0xA0, 0x00, 0x18, // LDY #$1800
        0x54, 0x7E, 0x7E, // MVN $7E,$7E
        0xDB,
    ]);
    for (i, value) in [0xDE, 0xAD, 0xBE, 0xEF].iter().enumerate() {
        bus.write(0x7E_1000 + i as u32, *value);
    }

    step_n(&mut cpu, &mut bus, 6);
    // MVN executes once per byte, rewinding PC until A wraps
    step_n(&mut cpu, &mut bus, 4);

    assert_eq!(cpu.a, 0xFFFF);
    assert_eq!(cpu.x, 0x1004);
    assert_eq!(cpu.y, 0x1804);
    assert_eq!(cpu.db, 0x7E);
    for (i, value) in [0xDE, 0xAD, 0xBE, 0xEF].iter().enumerate() {
        assert_eq!(bus.read(0x7E_1800 + i as u32), *value, "byte {}", i);
    }
    cpu.step(&mut bus);
    assert!(cpu.stopped, "PC moved past the MVN when done");
}

// ========================================
// Interrupts
// ========================================

#[test]
fn test_nmi_vectors_through_emulation_table() {
    let rom = RomBuilder::new()
        .code(0x8000, &[0xEA, 0xEA, 0xEA]) // NOPs
        .code(0x9000, &[0xE6, 0x10, 0x40]) // INC $10; RTI
        .set_nmi_vector(0x9000)
        .build();
    let (mut cpu, mut bus) = boot_image(&rom);

    cpu.step(&mut bus); // one NOP
    let return_pc = cpu.pc;
    cpu.raise_nmi();
    cpu.step(&mut bus); // service
    assert_eq!(cpu.pc, 0x9000);
    assert!(cpu.get_flag(flags::IRQ_DISABLE));

    step_n(&mut cpu, &mut bus, 2); // INC; RTI
    assert_eq!(bus.read(0x00_0010), 1, "handler ran");
    assert_eq!(cpu.pc, return_pc, "RTI resumes the interrupted flow");
}

#[test]
fn test_irq_masked_by_i_flag() {
    let (mut cpu, mut bus) = boot(&[0xEA, 0xEA, 0xDB]);
    // I is set after reset; an asserted IRQ must not be serviced
    cpu.set_irq(true);
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x8001, "NOP executed, no vectoring");
}

#[test]
fn test_wai_wakes_without_service_when_masked() {
    // WAI; LDA #$01; STP
    let (mut cpu, mut bus) = boot(&[0xCB, 0xA9, 0x01, 0xDB]);
    cpu.step(&mut bus); // WAI
    assert!(cpu.waiting);

    let pc = cpu.pc;
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, pc, "still asleep");

    // Masked IRQ wakes the core but is not serviced
    cpu.set_irq(true);
    cpu.step(&mut bus);
    assert_eq!(cpu.a & 0xFF, 0x01, "execution continued after WAI");
}

#[test]
fn test_stp_halts_core() {
    let (mut cpu, mut bus) = boot(&[0xDB, 0xA9, 0x01]);
    cpu.step(&mut bus);
    assert!(cpu.stopped);
    let pc = cpu.pc;
    step_n(&mut cpu, &mut bus, 3);
    assert_eq!(cpu.pc, pc, "a stopped core makes no progress");
    assert_eq!(cpu.a & 0xFF, 0x00);
}

// ========================================
// Miscellaneous
// ========================================

#[test]
fn test_xba_swaps_bytes() {
    // Native 16-bit: LDA #$1234; XBA -> $3412, NZ from new low byte
    let (mut cpu, mut bus) = boot(&[0x18, 0xFB, 0xC2, 0x20, 0xA9, 0x34, 0x12, 0xEB, 0xDB]);
    step_n(&mut cpu, &mut bus, 4);
    assert_eq!(cpu.a, 0x3412);
    assert!(!cpu.get_flag(flags::ZERO));
}

#[test]
fn test_tsb_trb() {
    // LDA #$0F; TSB $20; LDA #$03; TRB $20; STP
    let (mut cpu, mut bus) = boot(&[
        0xA9, 0x0F, 0x04, 0x20, 0xA9, 0x03, 0x14, 0x20, 0xDB,
    ]);
    bus.write(0x00_0020, 0xF0);

    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(bus.read(0x00_0020), 0xFF, "TSB ors A into memory");
    assert!(cpu.get_flag(flags::ZERO), "A & old memory was zero");

    step_n(&mut cpu, &mut bus, 2);
    assert_eq!(bus.read(0x00_0020), 0xFC, "TRB clears A's bits");
    assert!(!cpu.get_flag(flags::ZERO));
}

#[test]
fn test_pea_pushes_immediate() {
    let (mut cpu, mut bus) = boot(&[0xF4, 0x34, 0x12, 0xDB]); // PEA $1234
    let sp = cpu.sp;
    cpu.step(&mut bus);
    assert_eq!(cpu.sp, sp.wrapping_sub(2));
    assert_eq!(bus.read(sp as u32), 0x12);
    assert_eq!(bus.read(sp.wrapping_sub(1) as u32), 0x34);
}

#[test]
fn test_direct_page_register_offsets_zero_page() {
    // Native: LDA #$0300 -> TCD; SEP #$20; LDA #$77; STA $10 -> $0310
    let (mut cpu, mut bus) = boot(&[
        0x18, 0xFB, 0xC2, 0x20, 0xA9, 0x00, 0x03, 0x5B, 0xE2, 0x20, 0xA9, 0x77, 0x85, 0x10, 0xDB,
    ]);
    step_n(&mut cpu, &mut bus, 8);
    assert_eq!(bus.read(0x00_0310), 0x77, "D register shifts the page");
}
