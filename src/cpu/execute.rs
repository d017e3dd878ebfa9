// CPU execution and opcode dispatch
//
// `step` services any pending interrupt, fetches one opcode, resolves its
// operand through the addressing layer, and dispatches to the instruction
// implementation. Dispatch is a flat match over the opcode byte; the
// opcode table supplies the addressing mode and base cycle count.

use crate::bus::Bus;
use crate::cpu::flags;
use crate::cpu::opcodes::OPCODE_TABLE;
use crate::cpu::vectors;
use crate::cpu::Cpu;

impl Cpu {
    /// Execute one instruction (or service one interrupt)
    ///
    /// Returns the number of cycles consumed. Interrupts are taken at
    /// instruction boundaries: a latched NMI wins over an asserted IRQ,
    /// and IRQ is masked by the I flag. A stopped core (STP) burns one
    /// cycle per call; a waiting core (WAI) does the same until an
    /// interrupt arrives.
    pub fn step(&mut self, bus: &mut Bus) -> u32 {
        if self.stopped {
            return 1;
        }

        if self.nmi_pending {
            self.nmi_pending = false;
            self.waiting = false;
            let cycles = self.service_interrupt(bus, vectors::NATIVE_NMI, vectors::EMU_NMI);
            self.cycles = self.cycles.wrapping_add(cycles as u64);
            return cycles;
        }

        if self.irq_line && !self.get_flag(flags::IRQ_DISABLE) {
            self.waiting = false;
            let cycles = self.service_interrupt(bus, vectors::NATIVE_IRQ, vectors::EMU_IRQ);
            self.cycles = self.cycles.wrapping_add(cycles as u64);
            return cycles;
        }

        if self.waiting {
            if self.irq_line {
                // Masked IRQ still wakes WAI; execution continues after it
                self.waiting = false;
            } else {
                return 1;
            }
        }

        let opcode = self.fetch8(bus);
        let cycles = self.execute_instruction(bus, opcode);
        self.cycles = self.cycles.wrapping_add(cycles as u64);
        cycles
    }

    /// Dispatch one fetched opcode
    #[allow(clippy::too_many_lines)]
    fn execute_instruction(&mut self, bus: &mut Bus, opcode: u8) -> u32 {
        let info = &OPCODE_TABLE[opcode as usize];
        let mode = info.mode;
        let mut cycles = info.cycles as u32;

        match opcode {
            // Load/Store instructions
            0xA1 | 0xA3 | 0xA5 | 0xA7 | 0xA9 | 0xAD | 0xAF | 0xB1 | 0xB2 | 0xB3 | 0xB5 | 0xB7
            | 0xB9 | 0xBD | 0xBF => {
                let operand = self.resolve_operand(bus, mode);
                self.lda(bus, operand);
            }
            0xA2 | 0xA6 | 0xB6 | 0xAE | 0xBE => {
                let operand = self.resolve_operand(bus, mode);
                self.ldx(bus, operand);
            }
            0xA0 | 0xA4 | 0xB4 | 0xAC | 0xBC => {
                let operand = self.resolve_operand(bus, mode);
                self.ldy(bus, operand);
            }
            0x81 | 0x83 | 0x85 | 0x87 | 0x8D | 0x8F | 0x91 | 0x92 | 0x93 | 0x95 | 0x97 | 0x99
            | 0x9D | 0x9F => {
                let operand = self.resolve_operand(bus, mode);
                self.sta(bus, operand);
            }
            0x86 | 0x96 | 0x8E => {
                let operand = self.resolve_operand(bus, mode);
                self.stx(bus, operand);
            }
            0x84 | 0x94 | 0x8C => {
                let operand = self.resolve_operand(bus, mode);
                self.sty(bus, operand);
            }
            0x64 | 0x74 | 0x9C | 0x9E => {
                let operand = self.resolve_operand(bus, mode);
                self.stz(bus, operand);
            }

            // Logic instructions
            0x01 | 0x03 | 0x05 | 0x07 | 0x09 | 0x0D | 0x0F | 0x11 | 0x12 | 0x13 | 0x15 | 0x17
            | 0x19 | 0x1D | 0x1F => {
                let operand = self.resolve_operand(bus, mode);
                self.ora(bus, operand);
            }
            0x21 | 0x23 | 0x25 | 0x27 | 0x29 | 0x2D | 0x2F | 0x31 | 0x32 | 0x33 | 0x35 | 0x37
            | 0x39 | 0x3D | 0x3F => {
                let operand = self.resolve_operand(bus, mode);
                self.and(bus, operand);
            }
            0x41 | 0x43 | 0x45 | 0x47 | 0x49 | 0x4D | 0x4F | 0x51 | 0x52 | 0x53 | 0x55 | 0x57
            | 0x59 | 0x5D | 0x5F => {
                let operand = self.resolve_operand(bus, mode);
                self.eor(bus, operand);
            }
            0x24 | 0x2C | 0x34 | 0x3C | 0x89 => {
                let operand = self.resolve_operand(bus, mode);
                self.bit(bus, operand);
            }
            0x04 | 0x0C => {
                let operand = self.resolve_operand(bus, mode);
                self.tsb(bus, operand);
            }
            0x14 | 0x1C => {
                let operand = self.resolve_operand(bus, mode);
                self.trb(bus, operand);
            }

            // Arithmetic instructions
            0x61 | 0x63 | 0x65 | 0x67 | 0x69 | 0x6D | 0x6F | 0x71 | 0x72 | 0x73 | 0x75 | 0x77
            | 0x79 | 0x7D | 0x7F => {
                let operand = self.resolve_operand(bus, mode);
                self.adc(bus, operand);
            }
            0xE1 | 0xE3 | 0xE5 | 0xE7 | 0xE9 | 0xED | 0xEF | 0xF1 | 0xF2 | 0xF3 | 0xF5 | 0xF7
            | 0xF9 | 0xFD | 0xFF => {
                let operand = self.resolve_operand(bus, mode);
                self.sbc(bus, operand);
            }
            0xC1 | 0xC3 | 0xC5 | 0xC7 | 0xC9 | 0xCD | 0xCF | 0xD1 | 0xD2 | 0xD3 | 0xD5 | 0xD7
            | 0xD9 | 0xDD | 0xDF => {
                let operand = self.resolve_operand(bus, mode);
                let a = self.a_value();
                let is8 = self.memory_is_8bit();
                self.compare(bus, operand, a, is8);
            }
            0xE0 | 0xE4 | 0xEC => {
                let operand = self.resolve_operand(bus, mode);
                let x = self.x_value();
                let is8 = self.index_is_8bit();
                self.compare(bus, operand, x, is8);
            }
            0xC0 | 0xC4 | 0xCC => {
                let operand = self.resolve_operand(bus, mode);
                let y = self.y_value();
                let is8 = self.index_is_8bit();
                self.compare(bus, operand, y, is8);
            }

            // Increment / decrement
            0x1A | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let operand = self.resolve_operand(bus, mode);
                self.inc(bus, operand);
            }
            0x3A | 0xC6 | 0xCE | 0xD6 | 0xDE => {
                let operand = self.resolve_operand(bus, mode);
                self.dec(bus, operand);
            }
            0xE8 => self.step_index(true, 1),
            0xC8 => self.step_index(false, 1),
            0xCA => self.step_index(true, -1),
            0x88 => self.step_index(false, -1),

            // Shifts and rotates
            0x06 | 0x0A | 0x0E | 0x16 | 0x1E => {
                let operand = self.resolve_operand(bus, mode);
                self.asl(bus, operand);
            }
            0x26 | 0x2A | 0x2E | 0x36 | 0x3E => {
                let operand = self.resolve_operand(bus, mode);
                self.rol(bus, operand);
            }
            0x46 | 0x4A | 0x4E | 0x56 | 0x5E => {
                let operand = self.resolve_operand(bus, mode);
                self.lsr(bus, operand);
            }
            0x66 | 0x6A | 0x6E | 0x76 | 0x7E => {
                let operand = self.resolve_operand(bus, mode);
                self.ror(bus, operand);
            }

            // Branches
            0x10 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, !self.get_flag(flags::NEGATIVE));
            }
            0x30 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, self.get_flag(flags::NEGATIVE));
            }
            0x50 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, !self.get_flag(flags::OVERFLOW));
            }
            0x70 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, self.get_flag(flags::OVERFLOW));
            }
            0x90 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, !self.get_flag(flags::CARRY));
            }
            0xB0 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, self.get_flag(flags::CARRY));
            }
            0xD0 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, !self.get_flag(flags::ZERO));
            }
            0xF0 => {
                let operand = self.resolve_operand(bus, mode);
                cycles += self.branch(operand, self.get_flag(flags::ZERO));
            }
            0x80 | 0x82 => {
                let operand = self.resolve_operand(bus, mode);
                self.branch(operand, true);
            }

            // Jumps and subroutines
            0x4C | 0x6C | 0x7C => {
                let operand = self.resolve_operand(bus, mode);
                self.jmp(operand);
            }
            0x5C | 0xDC => {
                let operand = self.resolve_operand(bus, mode);
                self.jml(operand);
            }
            0x20 | 0xFC => {
                let operand = self.resolve_operand(bus, mode);
                self.jsr(bus, operand);
            }
            0x22 => {
                let operand = self.resolve_operand(bus, mode);
                self.jsl(bus, operand);
            }
            0x60 => self.rts(bus),
            0x6B => self.rtl(bus),
            0x40 => self.rti(bus),

            // Software interrupts
            0x00 => cycles = self.software_interrupt(bus, false),
            0x02 => cycles = self.software_interrupt(bus, true),

            // Block moves
            0x44 => self.block_move(bus, false),
            0x54 => self.block_move(bus, true),

            // Register transfers
            0xAA => self.tax(),
            0xA8 => self.tay(),
            0x8A => self.txa(),
            0x98 => self.tya(),
            0x9B => self.txy(),
            0xBB => self.tyx(),
            0xBA => self.tsx(),
            0x9A => self.txs(),
            0x1B => self.tcs(),
            0x3B => self.tsc(),
            0x5B => self.tcd(),
            0x7B => self.tdc(),
            0xEB => self.xba(),

            // Stack instructions
            0x48 => self.pha(bus),
            0x68 => self.pla(bus),
            0xDA => {
                let x = self.x_value();
                self.push_index(bus, x);
            }
            0x5A => {
                let y = self.y_value();
                self.push_index(bus, y);
            }
            0xFA => {
                let value = self.pop_index(bus);
                self.set_x(value);
            }
            0x7A => {
                let value = self.pop_index(bus);
                self.set_y(value);
            }
            0x08 => {
                let status = self.status;
                self.push8(bus, status);
            }
            0x28 => self.plp(bus),
            0x8B => {
                let db = self.db;
                self.push8(bus, db);
            }
            0xAB => self.plb(bus),
            0x0B => {
                let d = self.d;
                self.push16(bus, d);
            }
            0x2B => self.pld(bus),
            0x4B => {
                let pb = self.pb;
                self.push8(bus, pb);
            }
            0xF4 => self.pea(bus),
            0xD4 => {
                let operand = self.resolve_operand(bus, mode);
                self.pei(bus, operand);
            }
            0x62 => {
                let operand = self.resolve_operand(bus, mode);
                self.per(bus, operand);
            }

            // Flag instructions
            0x18 => self.clear_flag(flags::CARRY),
            0x38 => self.set_flag(flags::CARRY),
            0x58 => self.clear_flag(flags::IRQ_DISABLE),
            0x78 => self.set_flag(flags::IRQ_DISABLE),
            0xD8 => self.clear_flag(flags::DECIMAL),
            0xF8 => self.set_flag(flags::DECIMAL),
            0xB8 => self.clear_flag(flags::OVERFLOW),
            0xC2 => {
                let operand = self.resolve_operand(bus, mode);
                self.rep(operand);
            }
            0xE2 => {
                let operand = self.resolve_operand(bus, mode);
                self.sep(operand);
            }
            0xFB => self.xce(),

            // Processor control
            0xEA => {} // NOP
            0x42 => {
                // WDM: reserved two-byte opcode, operand discarded
                let _ = self.fetch8(bus);
            }
            0xCB => self.waiting = true,
            0xDB => self.stopped = true,
        }

        cycles
    }
}
