// Instruction semantics for the 65816
//
// Each instruction takes a resolved operand from the addressing layer.
// Width-polymorphic operations consult the M flag (accumulator/memory) or
// the X flag (index registers) at execution time; the operand reader and
// writer share that width so immediates, loads and read-modify-write
// cycles all agree.

use crate::bus::Bus;
use crate::cpu::addressing::Operand;
use crate::cpu::{flags, vectors, Cpu};

impl Cpu {
    // ========================================
    // Load Instructions
    // ========================================
    // Loads copy memory (or an immediate) into a register and set N and Z.

    /// LDA - Load Accumulator
    ///
    /// Flags affected: N, Z
    pub(crate) fn lda(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        self.set_a(value);
        self.set_nz(value, is8);
    }

    /// LDX - Load X Register
    ///
    /// Flags affected: N, Z
    pub(crate) fn ldx(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.index_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        self.set_x(value);
        self.set_nz(value, is8);
    }

    /// LDY - Load Y Register
    ///
    /// Flags affected: N, Z
    pub(crate) fn ldy(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.index_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        self.set_y(value);
        self.set_nz(value, is8);
    }

    // ========================================
    // Store Instructions
    // ========================================
    // Stores write a register to memory and affect no flags.

    /// STA - Store Accumulator
    pub(crate) fn sta(&mut self, bus: &mut Bus, operand: Operand) {
        let value = self.a_value();
        let is8 = self.memory_is_8bit();
        self.write_operand(bus, operand, value, is8);
    }

    /// STX - Store X Register
    pub(crate) fn stx(&mut self, bus: &mut Bus, operand: Operand) {
        let value = self.x_value();
        let is8 = self.index_is_8bit();
        self.write_operand(bus, operand, value, is8);
    }

    /// STY - Store Y Register
    pub(crate) fn sty(&mut self, bus: &mut Bus, operand: Operand) {
        let value = self.y_value();
        let is8 = self.index_is_8bit();
        self.write_operand(bus, operand, value, is8);
    }

    /// STZ - Store Zero
    pub(crate) fn stz(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        self.write_operand(bus, operand, 0, is8);
    }

    // ========================================
    // Logic Instructions
    // ========================================

    /// ORA - OR Accumulator with memory
    ///
    /// Flags affected: N, Z
    pub(crate) fn ora(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        let result = self.a_value() | value;
        self.set_a(result);
        self.set_nz(result, is8);
    }

    /// AND - AND Accumulator with memory
    ///
    /// Flags affected: N, Z
    pub(crate) fn and(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        let result = self.a_value() & value;
        self.set_a(result);
        self.set_nz(result, is8);
    }

    /// EOR - Exclusive-OR Accumulator with memory
    ///
    /// Flags affected: N, Z
    pub(crate) fn eor(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        let result = self.a_value() ^ value;
        self.set_a(result);
        self.set_nz(result, is8);
    }

    /// BIT - Test memory bits against the accumulator
    ///
    /// Z comes from A AND memory. For non-immediate operands N and V copy
    /// the top two bits of the memory value; the immediate form sets Z
    /// only.
    pub(crate) fn bit(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        self.update_flag(flags::ZERO, self.a_value() & value == 0);
        if !matches!(operand, Operand::Immediate(_)) {
            let (sign, overflow) = if is8 { (0x80, 0x40) } else { (0x8000, 0x4000) };
            self.update_flag(flags::NEGATIVE, value & sign != 0);
            self.update_flag(flags::OVERFLOW, value & overflow != 0);
        }
    }

    /// TSB - Test and Set Bits
    ///
    /// Flags affected: Z (from A AND memory, before the store)
    pub(crate) fn tsb(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        let a = self.a_value();
        self.update_flag(flags::ZERO, a & value == 0);
        self.write_operand(bus, operand, value | a, is8);
    }

    /// TRB - Test and Reset Bits
    ///
    /// Flags affected: Z (from A AND memory, before the store)
    pub(crate) fn trb(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        let a = self.a_value();
        self.update_flag(flags::ZERO, a & value == 0);
        self.write_operand(bus, operand, value & !a, is8);
    }

    // ========================================
    // Arithmetic Instructions
    // ========================================

    /// ADC - Add with Carry
    ///
    /// Binary or BCD per the D flag, 8- or 16-bit per the M flag.
    ///
    /// Flags affected: N, V, Z, C
    pub(crate) fn adc(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        if self.get_flag(flags::DECIMAL) {
            self.adc_decimal(value);
        } else {
            self.adc_binary(value);
        }
    }

    /// Binary add: C from the width-extended unsigned sum, V from the
    /// signed-overflow rule
    fn adc_binary(&mut self, value: u16) {
        let is8 = self.memory_is_8bit();
        let (mask, sign): (u32, u32) = if is8 { (0xFF, 0x80) } else { (0xFFFF, 0x8000) };

        let a = self.a_value() as u32;
        let b = value as u32;
        let sum = a + b + self.get_flag(flags::CARRY) as u32;
        let result = sum & mask;

        self.update_flag(flags::CARRY, sum > mask);
        self.update_flag(flags::OVERFLOW, !(a ^ b) & (a ^ result) & sign != 0);
        self.set_a(result as u16);
        self.set_nz(result as u16, is8);
    }

    /// Decimal add: nibble-serial BCD with a carry chain; V keeps its
    /// binary interpretation
    fn adc_decimal(&mut self, value: u16) {
        let is8 = self.memory_is_8bit();
        let nibbles = if is8 { 2 } else { 4 };
        let sign: u16 = if is8 { 0x80 } else { 0x8000 };

        let a = self.a_value();
        let mut carry = self.get_flag(flags::CARRY) as u16;
        let mut result: u16 = 0;

        for i in 0..nibbles {
            let shift = i * 4;
            let mut digit = ((a >> shift) & 0xF) + ((value >> shift) & 0xF) + carry;
            if digit > 9 {
                digit += 6;
            }
            carry = (digit > 0xF) as u16;
            result |= (digit & 0xF) << shift;
        }

        self.update_flag(flags::CARRY, carry != 0);
        self.update_flag(flags::OVERFLOW, !(a ^ value) & (a ^ result) & sign != 0);
        self.set_a(result);
        self.set_nz(result, is8);
    }

    /// SBC - Subtract with Carry (carry clear = borrow)
    ///
    /// Flags affected: N, V, Z, C
    pub(crate) fn sbc(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        if self.get_flag(flags::DECIMAL) {
            self.sbc_decimal(value);
        } else {
            // Binary subtraction is addition of the complement
            let mask = if is8 { 0xFF } else { 0xFFFF };
            self.adc_binary(!value & mask);
        }
    }

    /// Decimal subtract: nibble-serial borrow chain; V keeps its binary
    /// interpretation
    fn sbc_decimal(&mut self, value: u16) {
        let is8 = self.memory_is_8bit();
        let nibbles = if is8 { 2 } else { 4 };
        let (mask, sign): (u32, u16) = if is8 { (0xFF, 0x80) } else { (0xFFFF, 0x8000) };

        let a = self.a_value();
        let binary = (a as u32)
            .wrapping_add(!value as u32 & mask)
            .wrapping_add(self.get_flag(flags::CARRY) as u32);

        let mut carry = self.get_flag(flags::CARRY) as i16;
        let mut result: u16 = 0;

        for i in 0..nibbles {
            let shift = i * 4;
            let mut digit =
                ((a >> shift) & 0xF) as i16 - ((value >> shift) & 0xF) as i16 + carry - 1;
            if digit < 0 {
                digit += 10;
                carry = 0;
            } else {
                carry = 1;
            }
            result |= ((digit as u16) & 0xF) << shift;
        }

        self.update_flag(flags::CARRY, carry != 0);
        self.update_flag(
            flags::OVERFLOW,
            (a ^ value) & (a ^ (binary as u16 & if is8 { 0xFF } else { 0xFFFF })) & sign != 0,
        );
        self.set_a(result);
        self.set_nz(result, is8);
    }

    /// CMP/CPX/CPY share one subtraction that only sets flags
    ///
    /// Flags affected: N, Z, C
    pub(crate) fn compare(&mut self, bus: &mut Bus, operand: Operand, register: u16, is8: bool) {
        let value = self.read_operand(bus, operand, is8);
        let mask: u32 = if is8 { 0xFF } else { 0xFFFF };
        let result = (register as u32).wrapping_sub(value as u32) & mask;
        self.update_flag(flags::CARRY, register >= value);
        self.set_nz(result as u16, is8);
    }

    // ========================================
    // Increment / Decrement
    // ========================================

    /// INC - Increment memory or accumulator
    ///
    /// Flags affected: N, Z
    pub(crate) fn inc(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let mask = if is8 { 0xFF } else { 0xFFFF };
        let result = self.read_operand(bus, operand, is8).wrapping_add(1) & mask;
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    /// DEC - Decrement memory or accumulator
    ///
    /// Flags affected: N, Z
    pub(crate) fn dec(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let mask = if is8 { 0xFF } else { 0xFFFF };
        let result = self.read_operand(bus, operand, is8).wrapping_sub(1) & mask;
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    /// INX/INY/DEX/DEY at the index width
    pub(crate) fn step_index(&mut self, x_register: bool, delta: i16) {
        let is8 = self.index_is_8bit();
        let mask = if is8 { 0xFF } else { 0xFFFF };
        let current = if x_register {
            self.x_value()
        } else {
            self.y_value()
        };
        let result = current.wrapping_add(delta as u16) & mask;
        if x_register {
            self.set_x(result);
        } else {
            self.set_y(result);
        }
        self.set_nz(result, is8);
    }

    // ========================================
    // Shifts and Rotates
    // ========================================

    /// ASL - Arithmetic Shift Left
    ///
    /// Flags affected: N, Z, C (bit shifted out)
    pub(crate) fn asl(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let mask: u32 = if is8 { 0xFF } else { 0xFFFF };
        let value = self.read_operand(bus, operand, is8) as u32;
        let shifted = value << 1;
        self.update_flag(flags::CARRY, shifted > mask);
        let result = (shifted & mask) as u16;
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    /// LSR - Logical Shift Right
    ///
    /// Flags affected: N (cleared), Z, C (bit shifted out)
    pub(crate) fn lsr(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let value = self.read_operand(bus, operand, is8);
        self.update_flag(flags::CARRY, value & 1 != 0);
        let result = value >> 1;
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    /// ROL - Rotate Left through carry
    ///
    /// Flags affected: N, Z, C
    pub(crate) fn rol(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let mask: u32 = if is8 { 0xFF } else { 0xFFFF };
        let value = self.read_operand(bus, operand, is8) as u32;
        let shifted = (value << 1) | self.get_flag(flags::CARRY) as u32;
        self.update_flag(flags::CARRY, shifted > mask);
        let result = (shifted & mask) as u16;
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    /// ROR - Rotate Right through carry
    ///
    /// Flags affected: N, Z, C
    pub(crate) fn ror(&mut self, bus: &mut Bus, operand: Operand) {
        let is8 = self.memory_is_8bit();
        let sign: u16 = if is8 { 0x80 } else { 0x8000 };
        let value = self.read_operand(bus, operand, is8);
        let carry_in = self.get_flag(flags::CARRY);
        self.update_flag(flags::CARRY, value & 1 != 0);
        let mut result = value >> 1;
        if carry_in {
            result |= sign;
        }
        self.write_operand(bus, operand, result, is8);
        self.set_nz(result, is8);
    }

    // ========================================
    // Register Transfers
    // ========================================

    /// TAX/TAY/TXA/TYA/TXY/TYX and the stack/direct-page transfers
    pub(crate) fn tax(&mut self) {
        let a = self.a;
        self.set_x(a);
        self.set_nz(self.x_value(), self.index_is_8bit());
    }

    pub(crate) fn tay(&mut self) {
        let a = self.a;
        self.set_y(a);
        self.set_nz(self.y_value(), self.index_is_8bit());
    }

    pub(crate) fn txa(&mut self) {
        let x = self.x;
        self.set_a(x);
        self.set_nz(self.a_value(), self.memory_is_8bit());
    }

    pub(crate) fn tya(&mut self) {
        let y = self.y;
        self.set_a(y);
        self.set_nz(self.a_value(), self.memory_is_8bit());
    }

    pub(crate) fn txy(&mut self) {
        let x = self.x;
        self.set_y(x);
        self.set_nz(self.y_value(), self.index_is_8bit());
    }

    pub(crate) fn tyx(&mut self) {
        let y = self.y;
        self.set_x(y);
        self.set_nz(self.x_value(), self.index_is_8bit());
    }

    /// TSX - Transfer SP to X
    pub(crate) fn tsx(&mut self) {
        let sp = self.sp;
        self.set_x(sp);
        self.set_nz(self.x_value(), self.index_is_8bit());
    }

    /// TXS - Transfer X to SP; no flags, page-1 clamp in emulation
    pub(crate) fn txs(&mut self) {
        self.sp = if self.emulation {
            0x0100 | (self.x & 0xFF)
        } else {
            self.x
        };
    }

    /// TCS - Transfer A to SP (always 16-bit); no flags
    pub(crate) fn tcs(&mut self) {
        self.sp = if self.emulation {
            0x0100 | (self.a & 0xFF)
        } else {
            self.a
        };
    }

    /// TSC - Transfer SP to A (always 16-bit)
    pub(crate) fn tsc(&mut self) {
        self.a = self.sp;
        self.set_nz(self.a, false);
    }

    /// TCD - Transfer A to the direct-page register (always 16-bit)
    pub(crate) fn tcd(&mut self) {
        self.d = self.a;
        self.set_nz(self.d, false);
    }

    /// TDC - Transfer the direct-page register to A (always 16-bit)
    pub(crate) fn tdc(&mut self) {
        self.a = self.d;
        self.set_nz(self.a, false);
    }

    /// XBA - Exchange the accumulator's bytes; N and Z from the new low
    /// byte
    pub(crate) fn xba(&mut self) {
        self.a = self.a.rotate_left(8);
        self.set_nz(self.a & 0xFF, true);
    }

    // ========================================
    // Stack Instructions
    // ========================================

    /// PHA - Push Accumulator at the M width
    pub(crate) fn pha(&mut self, bus: &mut Bus) {
        let value = self.a_value();
        if self.memory_is_8bit() {
            self.push8(bus, value as u8);
        } else {
            self.push16(bus, value);
        }
    }

    /// PLA - Pull Accumulator at the M width
    pub(crate) fn pla(&mut self, bus: &mut Bus) {
        let is8 = self.memory_is_8bit();
        let value = if is8 {
            self.pop8(bus) as u16
        } else {
            self.pop16(bus)
        };
        self.set_a(value);
        self.set_nz(value, is8);
    }

    /// PHX/PHY at the X width
    pub(crate) fn push_index(&mut self, bus: &mut Bus, value: u16) {
        if self.index_is_8bit() {
            self.push8(bus, value as u8);
        } else {
            self.push16(bus, value);
        }
    }

    /// PLX/PLY at the X width
    pub(crate) fn pop_index(&mut self, bus: &mut Bus) -> u16 {
        let is8 = self.index_is_8bit();
        let value = if is8 {
            self.pop8(bus) as u16
        } else {
            self.pop16(bus)
        };
        self.set_nz(value, is8);
        value
    }

    /// PLP - Pull the status register, enforcing width invariants
    pub(crate) fn plp(&mut self, bus: &mut Bus) {
        let value = self.pop8(bus);
        self.set_status_register(value);
    }

    /// PLB - Pull the data bank register
    pub(crate) fn plb(&mut self, bus: &mut Bus) {
        let value = self.pop8(bus);
        self.db = value;
        self.set_nz(value as u16, true);
    }

    /// PLD - Pull the direct-page register
    pub(crate) fn pld(&mut self, bus: &mut Bus) {
        let value = self.pop16(bus);
        self.d = value;
        self.set_nz(value, false);
    }

    /// PEA - Push a 16-bit immediate
    pub(crate) fn pea(&mut self, bus: &mut Bus) {
        let value = self.fetch16(bus);
        self.push16(bus, value);
    }

    /// PEI - Push the 16-bit word at a direct-page address
    pub(crate) fn pei(&mut self, bus: &mut Bus, operand: Operand) {
        if let Operand::Address(addr) = operand {
            let value = self.read16_bank0(bus, addr as u16);
            self.push16(bus, value);
        }
    }

    /// PER - Push PC plus a 16-bit displacement
    pub(crate) fn per(&mut self, bus: &mut Bus, operand: Operand) {
        if let Operand::Immediate(disp) = operand {
            let value = self.pc.wrapping_add(disp);
            self.push16(bus, value);
        }
    }

    // ========================================
    // Branches
    // ========================================

    /// Conditional branch: add the displacement when taken
    ///
    /// Returns the extra cycle a taken branch costs.
    pub(crate) fn branch(&mut self, operand: Operand, taken: bool) -> u32 {
        if let (Operand::Immediate(disp), true) = (operand, taken) {
            self.pc = self.pc.wrapping_add(disp);
            1
        } else {
            0
        }
    }

    // ========================================
    // Jumps and Subroutines
    // ========================================

    /// JMP - Jump within the current program bank
    pub(crate) fn jmp(&mut self, operand: Operand) {
        if let Operand::Address(addr) = operand {
            self.pc = addr as u16;
        }
    }

    /// JML - Jump long: replaces PB and PC
    pub(crate) fn jml(&mut self, operand: Operand) {
        if let Operand::Address(addr) = operand {
            self.pb = (addr >> 16) as u8;
            self.pc = addr as u16;
        }
    }

    /// JSR - Jump to Subroutine: pushes PC-1 (the address of the last
    /// operand byte)
    pub(crate) fn jsr(&mut self, bus: &mut Bus, operand: Operand) {
        if let Operand::Address(addr) = operand {
            let return_addr = self.pc.wrapping_sub(1);
            self.push16(bus, return_addr);
            self.pc = addr as u16;
        }
    }

    /// JSL - Jump to Subroutine Long: pushes PB then PC-1
    pub(crate) fn jsl(&mut self, bus: &mut Bus, operand: Operand) {
        if let Operand::Address(addr) = operand {
            let pb = self.pb;
            self.push8(bus, pb);
            let return_addr = self.pc.wrapping_sub(1);
            self.push16(bus, return_addr);
            self.pb = (addr >> 16) as u8;
            self.pc = addr as u16;
        }
    }

    /// RTS - Return from Subroutine
    pub(crate) fn rts(&mut self, bus: &mut Bus) {
        let addr = self.pop16(bus);
        self.pc = addr.wrapping_add(1);
    }

    /// RTL - Return from Subroutine Long: pops PC then PB
    pub(crate) fn rtl(&mut self, bus: &mut Bus) {
        let addr = self.pop16(bus);
        self.pc = addr.wrapping_add(1);
        self.pb = self.pop8(bus);
    }

    /// RTI - Return from Interrupt: pops P then PC (and PB in native mode)
    pub(crate) fn rti(&mut self, bus: &mut Bus) {
        let status = self.pop8(bus);
        self.set_status_register(status);
        self.pc = self.pop16(bus);
        if !self.emulation {
            self.pb = self.pop8(bus);
        }
    }

    /// BRK/COP - Software interrupts
    ///
    /// The signature byte is consumed, so the pushed return address is
    /// PC+1 relative to the opcode's operand.
    pub(crate) fn software_interrupt(&mut self, bus: &mut Bus, cop: bool) -> u32 {
        let _signature = self.fetch8(bus);
        if cop {
            self.service_interrupt(bus, vectors::NATIVE_COP, vectors::EMU_COP)
        } else {
            self.service_interrupt(bus, vectors::NATIVE_IRQ, vectors::EMU_IRQ)
        }
    }

    // ========================================
    // Block Moves
    // ========================================

    /// MVN/MVP - Block move, one byte per execution
    ///
    /// Moves a byte from source bank:X to destination bank:Y, steps the
    /// index registers (up for MVN, down for MVP), decrements the full
    /// 16-bit accumulator, and re-executes itself until A wraps to
    /// $FFFF. DB is left pointing at the destination bank.
    pub(crate) fn block_move(&mut self, bus: &mut Bus, increment: bool) {
        let dst_bank = self.fetch8(bus);
        let src_bank = self.fetch8(bus);

        let value = bus.read(((src_bank as u32) << 16) | self.x_value() as u32);
        bus.write(((dst_bank as u32) << 16) | self.y_value() as u32, value);

        let (x, y) = if increment {
            (self.x.wrapping_add(1), self.y.wrapping_add(1))
        } else {
            (self.x.wrapping_sub(1), self.y.wrapping_sub(1))
        };
        self.set_x(x);
        self.set_y(y);

        self.db = dst_bank;
        self.a = self.a.wrapping_sub(1);
        if self.a != 0xFFFF {
            // Not done: rewind to the opcode so the move resumes
            self.pc = self.pc.wrapping_sub(3);
        }
    }

    // ========================================
    // Flag Instructions
    // ========================================

    /// REP - Reset (clear) status bits given by the operand mask
    pub(crate) fn rep(&mut self, operand: Operand) {
        if let Operand::Immediate(mask) = operand {
            let status = self.status & !(mask as u8);
            self.set_status_register(status);
        }
    }

    /// SEP - Set status bits given by the operand mask
    pub(crate) fn sep(&mut self, operand: Operand) {
        if let Operand::Immediate(mask) = operand {
            let status = self.status | mask as u8;
            self.set_status_register(status);
        }
    }

    /// XCE - Exchange Carry with the Emulation flag
    ///
    /// Entering emulation forces M=X=1, clamps SP into page 1, and zeroes
    /// the index high bytes. Leaving emulation keeps M and X set until
    /// software clears them with REP.
    pub(crate) fn xce(&mut self) {
        let carry = self.get_flag(flags::CARRY);
        self.update_flag(flags::CARRY, self.emulation);
        self.emulation = carry;
        if self.emulation {
            self.status |= flags::MEMORY_8 | flags::INDEX_8;
            self.sp = 0x0100 | (self.sp & 0xFF);
            self.x &= 0xFF;
            self.y &= 0xFF;
        }
    }
}
