// CPU module - 65816 processor implementation
//
// The Ricoh 5A22's 65816 core: a 16-bit CPU that boots in a 65C02-like
// emulation mode and switches register widths at runtime through the M and
// X status flags.

// Sub-modules
pub mod addressing;
pub mod execute;
pub mod instructions;
pub mod opcodes;

use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use log::warn;

/// Processor Status Flags (P register)
///
/// Bit layout:
/// ```text
/// 7  6  5  4  3  2  1  0
/// N  V  M  X  D  I  Z  C
/// ```
///
/// - N: Negative flag (bit 7)
/// - V: Overflow flag (bit 6)
/// - M: Accumulator/memory width (bit 5, 1 = 8-bit)
/// - X: Index register width (bit 4, 1 = 8-bit)
/// - D: Decimal mode flag (bit 3)
/// - I: Interrupt disable flag (bit 2)
/// - Z: Zero flag (bit 1)
/// - C: Carry flag (bit 0)
///
/// The emulation flag E is a separate latch, not part of P. While E=1 the
/// M and X bits are forced set.
pub mod flags {
    pub const CARRY: u8 = 0b0000_0001; // Bit 0: C
    pub const ZERO: u8 = 0b0000_0010; // Bit 1: Z
    pub const IRQ_DISABLE: u8 = 0b0000_0100; // Bit 2: I
    pub const DECIMAL: u8 = 0b0000_1000; // Bit 3: D
    pub const INDEX_8: u8 = 0b0001_0000; // Bit 4: X
    pub const MEMORY_8: u8 = 0b0010_0000; // Bit 5: M
    pub const OVERFLOW: u8 = 0b0100_0000; // Bit 6: V
    pub const NEGATIVE: u8 = 0b1000_0000; // Bit 7: N
}

/// Interrupt Vector Addresses
///
/// 16-bit vectors in bank 0. Native mode and emulation mode use separate
/// tables; BRK shares the IRQ vector in both.
pub mod vectors {
    /// Native-mode COP vector ($FFE4-$FFE5)
    pub const NATIVE_COP: u16 = 0xFFE4;

    /// Native-mode NMI vector ($FFEA-$FFEB)
    pub const NATIVE_NMI: u16 = 0xFFEA;

    /// Native-mode IRQ/BRK vector ($FFEE-$FFEF)
    pub const NATIVE_IRQ: u16 = 0xFFEE;

    /// Emulation-mode COP vector ($FFF4-$FFF5)
    pub const EMU_COP: u16 = 0xFFF4;

    /// Emulation-mode NMI vector ($FFFA-$FFFB)
    pub const EMU_NMI: u16 = 0xFFFA;

    /// RESET vector ($FFFC-$FFFD), always read in emulation mode
    pub const RESET: u16 = 0xFFFC;

    /// Emulation-mode IRQ/BRK vector ($FFFE-$FFFF)
    pub const EMU_IRQ: u16 = 0xFFFE;
}

/// Program counter used when the reset vector reads back empty
///
/// An all-zero vector means the ROM image is broken; starting at $8000
/// keeps the core fetching out of mapped ROM instead of WRAM.
pub const RESET_FALLBACK_PC: u16 = 0x8000;

/// Register snapshot handed to the host and to save states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub sp: u16,
    pub pc: u16,
    pub pb: u8,
    pub db: u8,
    pub d: u16,
    pub p: u8,
    pub emulation: bool,
}

/// CPU structure representing the 65816 processor state
pub struct Cpu {
    // Registers
    pub a: u16,     // Accumulator (low byte only when M=1)
    pub x: u16,     // Index Register X
    pub y: u16,     // Index Register Y
    pub sp: u16,    // Stack Pointer
    pub pc: u16,    // Program Counter
    pub pb: u8,     // Program Bank
    pub db: u8,     // Data Bank
    pub d: u16,     // Direct Page Register
    pub status: u8, // Processor Status flags (NVMXDIZC)

    /// Emulation-mode flag (E), stored outside P
    pub emulation: bool,

    /// Latched non-maskable interrupt, serviced between instructions
    pub nmi_pending: bool,

    /// Level-triggered interrupt request line
    pub irq_line: bool,

    /// Set by STP; only a reset resumes execution
    pub stopped: bool,

    /// Set by WAI; cleared when an interrupt arrives
    pub waiting: bool,

    /// Total number of cycles executed
    pub cycles: u64,
}

impl Cpu {
    /// Create a new CPU in the pre-reset state
    ///
    /// The 65816 always powers up in emulation mode with 8-bit registers
    /// and interrupts disabled; `reset` must run before execution to load
    /// the program counter from the reset vector.
    pub fn new() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x01FF,
            pc: 0,
            pb: 0,
            db: 0,
            d: 0,
            status: flags::MEMORY_8 | flags::INDEX_8 | flags::IRQ_DISABLE,
            emulation: true,
            nmi_pending: false,
            irq_line: false,
            stopped: false,
            waiting: false,
            cycles: 0,
        }
    }

    /// Reset the CPU and load PC from the reset vector
    ///
    /// Enters emulation mode with M=X=1, I set, D cleared, SP at $01FF and
    /// the direct page at 0. The 16-bit vector at $00FFFC provides the
    /// entry point; a vector of $0000 (broken ROM) falls back to
    /// [`RESET_FALLBACK_PC`].
    pub fn reset(&mut self, bus: &mut Bus) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0x01FF;
        self.pb = 0;
        self.db = 0;
        self.d = 0;
        self.emulation = true;
        self.status = flags::MEMORY_8 | flags::INDEX_8 | flags::IRQ_DISABLE;
        self.nmi_pending = false;
        self.irq_line = false;
        self.stopped = false;
        self.waiting = false;
        self.cycles = 0;

        let vector = bus.read_u16(vectors::RESET as u32);
        self.pc = if vector == 0 {
            warn!(
                "reset vector is $0000, falling back to ${:04X}",
                RESET_FALLBACK_PC
            );
            RESET_FALLBACK_PC
        } else {
            vector
        };
    }

    /// Snapshot the register file
    pub fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            pb: self.pb,
            db: self.db,
            d: self.d,
            p: self.status,
            emulation: self.emulation,
        }
    }

    /// Restore the register file from a snapshot
    pub fn set_registers(&mut self, regs: &Registers) {
        self.a = regs.a;
        self.x = regs.x;
        self.y = regs.y;
        self.sp = regs.sp;
        self.pc = regs.pc;
        self.pb = regs.pb;
        self.db = regs.db;
        self.d = regs.d;
        self.emulation = regs.emulation;
        self.set_status_register(regs.p);
    }

    // ========================================
    // Status Flag Manipulation
    // ========================================

    /// Get the value of a specific flag
    #[inline]
    pub fn get_flag(&self, flag: u8) -> bool {
        (self.status & flag) != 0
    }

    /// Set a specific flag to 1
    #[inline]
    pub fn set_flag(&mut self, flag: u8) {
        self.status |= flag;
    }

    /// Clear a specific flag (set to 0)
    #[inline]
    pub fn clear_flag(&mut self, flag: u8) {
        self.status &= !flag;
    }

    /// Update a flag based on a condition
    #[inline]
    pub fn update_flag(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set_flag(flag);
        } else {
            self.clear_flag(flag);
        }
    }

    /// Replace the whole status register, enforcing the width invariants
    ///
    /// In emulation mode M and X stay forced. Narrowing the index
    /// registers zeroes their high bytes.
    pub fn set_status_register(&mut self, value: u8) {
        self.status = value;
        if self.emulation {
            self.status |= flags::MEMORY_8 | flags::INDEX_8;
        }
        if self.index_is_8bit() {
            self.x &= 0x00FF;
            self.y &= 0x00FF;
        }
    }

    /// True when the accumulator and memory operations are 8-bit
    #[inline]
    pub fn memory_is_8bit(&self) -> bool {
        self.emulation || self.get_flag(flags::MEMORY_8)
    }

    /// True when the index registers are 8-bit
    #[inline]
    pub fn index_is_8bit(&self) -> bool {
        self.emulation || self.get_flag(flags::INDEX_8)
    }

    /// Set N and Z from a result of the given width
    #[inline]
    pub(crate) fn set_nz(&mut self, value: u16, is_8bit: bool) {
        if is_8bit {
            self.update_flag(flags::ZERO, value & 0xFF == 0);
            self.update_flag(flags::NEGATIVE, value & 0x80 != 0);
        } else {
            self.update_flag(flags::ZERO, value == 0);
            self.update_flag(flags::NEGATIVE, value & 0x8000 != 0);
        }
    }

    // ========================================
    // Register Width Helpers
    // ========================================

    /// Accumulator value at the current memory width
    #[inline]
    pub(crate) fn a_value(&self) -> u16 {
        if self.memory_is_8bit() {
            self.a & 0xFF
        } else {
            self.a
        }
    }

    /// Store into the accumulator at the current memory width; the high
    /// byte survives 8-bit stores
    #[inline]
    pub(crate) fn set_a(&mut self, value: u16) {
        if self.memory_is_8bit() {
            self.a = (self.a & 0xFF00) | (value & 0xFF);
        } else {
            self.a = value;
        }
    }

    /// X register value at the current index width
    #[inline]
    pub(crate) fn x_value(&self) -> u16 {
        if self.index_is_8bit() {
            self.x & 0xFF
        } else {
            self.x
        }
    }

    /// Y register value at the current index width
    #[inline]
    pub(crate) fn y_value(&self) -> u16 {
        if self.index_is_8bit() {
            self.y & 0xFF
        } else {
            self.y
        }
    }

    /// Store into X; narrow mode keeps the high byte zero
    #[inline]
    pub(crate) fn set_x(&mut self, value: u16) {
        self.x = if self.index_is_8bit() {
            value & 0xFF
        } else {
            value
        };
    }

    /// Store into Y; narrow mode keeps the high byte zero
    #[inline]
    pub(crate) fn set_y(&mut self, value: u16) {
        self.y = if self.index_is_8bit() {
            value & 0xFF
        } else {
            value
        };
    }

    // ========================================
    // Memory Access Helpers
    // ========================================

    /// Fetch one byte at PB:PC and post-increment PC modulo 0x10000
    #[inline]
    pub(crate) fn fetch8(&mut self, bus: &mut Bus) -> u8 {
        let value = bus.read(((self.pb as u32) << 16) | self.pc as u32);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch a little-endian 16-bit operand
    #[inline]
    pub(crate) fn fetch16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        (hi << 8) | lo
    }

    /// Fetch a 24-bit operand (long address)
    #[inline]
    pub(crate) fn fetch24(&mut self, bus: &mut Bus) -> u32 {
        let lo = self.fetch16(bus) as u32;
        let bank = self.fetch8(bus) as u32;
        (bank << 16) | lo
    }

    /// Read a 16-bit value at a 24-bit address, incrementing across banks
    #[inline]
    pub(crate) fn read16(&self, bus: &mut Bus, addr: u32) -> u16 {
        let lo = bus.read(addr) as u16;
        let hi = bus.read(addr.wrapping_add(1) & 0xFF_FFFF) as u16;
        (hi << 8) | lo
    }

    /// Read a 16-bit value from bank 0, wrapping within the bank
    ///
    /// Direct-page and stack pointers live in bank 0 and wrap at $FFFF.
    #[inline]
    pub(crate) fn read16_bank0(&self, bus: &mut Bus, addr: u16) -> u16 {
        let lo = bus.read(addr as u32) as u16;
        let hi = bus.read(addr.wrapping_add(1) as u32) as u16;
        (hi << 8) | lo
    }

    /// Read a 24-bit pointer from bank 0
    #[inline]
    pub(crate) fn read24_bank0(&self, bus: &mut Bus, addr: u16) -> u32 {
        let lo = self.read16_bank0(bus, addr) as u32;
        let bank = bus.read(addr.wrapping_add(2) as u32) as u32;
        (bank << 16) | lo
    }

    /// Write a 16-bit value at a 24-bit address
    #[inline]
    pub(crate) fn write16(&self, bus: &mut Bus, addr: u32, value: u16) {
        bus.write(addr, (value & 0xFF) as u8);
        bus.write(addr.wrapping_add(1) & 0xFF_FFFF, (value >> 8) as u8);
    }

    // ========================================
    // Stack Operations
    // ========================================

    /// Push one byte; in emulation mode the stack stays inside page 1
    #[inline]
    pub(crate) fn push8(&mut self, bus: &mut Bus, value: u8) {
        bus.write(self.sp as u32, value);
        self.sp = self.sp.wrapping_sub(1);
        if self.emulation {
            self.sp = 0x0100 | (self.sp & 0xFF);
        }
    }

    /// Pop one byte
    #[inline]
    pub(crate) fn pop8(&mut self, bus: &mut Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        if self.emulation {
            self.sp = 0x0100 | (self.sp & 0xFF);
        }
        bus.read(self.sp as u32)
    }

    /// Push a 16-bit value, high byte first
    #[inline]
    pub(crate) fn push16(&mut self, bus: &mut Bus, value: u16) {
        self.push8(bus, (value >> 8) as u8);
        self.push8(bus, (value & 0xFF) as u8);
    }

    /// Pop a 16-bit value
    #[inline]
    pub(crate) fn pop16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.pop8(bus) as u16;
        let hi = self.pop8(bus) as u16;
        (hi << 8) | lo
    }

    // ========================================
    // Interrupts
    // ========================================

    /// Latch a non-maskable interrupt for the next instruction boundary
    pub fn raise_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Drive the level-triggered IRQ line
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Enter an interrupt handler through a native/emulation vector pair
    ///
    /// Pushes PB (native only), PC and P, sets I, clears D in native mode,
    /// and vectors through bank 0.
    pub(crate) fn service_interrupt(
        &mut self,
        bus: &mut Bus,
        native_vector: u16,
        emu_vector: u16,
    ) -> u32 {
        if !self.emulation {
            let pb = self.pb;
            self.push8(bus, pb);
        }
        let pc = self.pc;
        let status = self.status;
        self.push16(bus, pc);
        self.push8(bus, status);

        self.set_flag(flags::IRQ_DISABLE);
        if !self.emulation {
            self.clear_flag(flags::DECIMAL);
        }

        let vector = if self.emulation {
            emu_vector
        } else {
            native_vector
        };
        self.pb = 0;
        self.pc = bus.read_u16(vector as u32);
        7
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
