// DMA module - 8-channel general-purpose block transfer engine
//
// The DMA engine shuttles bytes between CPU-visible memory (the A bus) and
// the I/O register page at $2100-$21FF (the B bus). Each of the eight
// channels has its own register file at $43x0-$43xF:
//
// | Offset | Name  | Description                                |
// |--------|-------|--------------------------------------------|
// | $0     | DMAP  | Parameters: direction, A-step, unit mode   |
// | $1     | BBAD  | B-bus address (low byte within $21xx)      |
// | $2/$3  | A1T   | A-bus address (little-endian)              |
// | $4     | A1B   | A-bus bank                                 |
// | $5/$6  | DAS   | Transfer size (0 means 0x10000)            |
//
// Writing a set bit to $420B starts the corresponding channel; multiple set
// bits run channels in ascending order, each to completion. Transfers are
// synchronous: the triggering write returns after every byte has moved.
// The actual byte movement lives on the bus, which owns both address
// spaces; this module holds the channel state and decoding.

use serde::{Deserialize, Serialize};

/// Number of DMA channels
pub const CHANNEL_COUNT: usize = 8;

/// B-bus port offset patterns selected by the transfer-unit mode
/// (parameters bits 0-2). The offset is added to $2100 + BBAD for each
/// byte, cycling through the pattern.
pub const TRANSFER_PATTERNS: [&[u16]; 8] = [
    &[0],
    &[0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
    &[0, 1, 2, 3],
    &[0, 1, 0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
];

/// Per-channel A-bus address stepping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AStep {
    Increment,
    Decrement,
    Fixed,
}

/// One DMA channel's register file
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DmaChannel {
    /// $43x0 DMAP: bit 7 direction (1 = B to A), bit 4 decrement, bit 3
    /// fixed, bits 0-2 transfer-unit mode
    pub params: u8,

    /// $43x1 BBAD: low byte of the B-bus address within $2100-$21FF
    pub b_addr: u8,

    /// $43x2/$43x3 A1T: A-bus address
    pub a_addr: u16,

    /// $43x4 A1B: A-bus bank
    pub a_bank: u8,

    /// $43x5/$43x6 DAS: remaining transfer size; reads back 0 after a
    /// completed transfer
    pub size: u16,
}

impl DmaChannel {
    /// Read one register of this channel's file ($43x0-$43xF offset)
    pub fn read_register(&self, reg: u16) -> u8 {
        match reg {
            0x0 => self.params,
            0x1 => self.b_addr,
            0x2 => (self.a_addr & 0xFF) as u8,
            0x3 => (self.a_addr >> 8) as u8,
            0x4 => self.a_bank,
            0x5 => (self.size & 0xFF) as u8,
            0x6 => (self.size >> 8) as u8,
            // HDMA-only registers are not emulated
            _ => 0xFF,
        }
    }

    /// Write one register of this channel's file
    pub fn write_register(&mut self, reg: u16, value: u8) {
        match reg {
            0x0 => self.params = value,
            0x1 => self.b_addr = value,
            0x2 => self.a_addr = (self.a_addr & 0xFF00) | value as u16,
            0x3 => self.a_addr = (self.a_addr & 0x00FF) | ((value as u16) << 8),
            0x4 => self.a_bank = value,
            0x5 => self.size = (self.size & 0xFF00) | value as u16,
            0x6 => self.size = (self.size & 0x00FF) | ((value as u16) << 8),
            _ => {}
        }
    }

    /// Transfer direction: true moves bytes from the B bus into A-bus memory
    pub fn b_to_a(&self) -> bool {
        self.params & 0x80 != 0
    }

    /// B-bus port offsets for this channel's transfer-unit mode
    pub fn pattern(&self) -> &'static [u16] {
        TRANSFER_PATTERNS[(self.params & 0x07) as usize]
    }

    /// A-bus stepping: fixed takes precedence over decrement
    pub fn a_step(&self) -> AStep {
        if self.params & 0x08 != 0 {
            AStep::Fixed
        } else if self.params & 0x10 != 0 {
            AStep::Decrement
        } else {
            AStep::Increment
        }
    }

    /// Transfer length in bytes; a size of 0 means 0x10000
    pub fn transfer_length(&self) -> u32 {
        if self.size == 0 {
            0x10000
        } else {
            self.size as u32
        }
    }

    /// Advance the A-bus address by one step
    pub fn step_a_addr(&mut self) {
        match self.a_step() {
            AStep::Increment => self.a_addr = self.a_addr.wrapping_add(1),
            AStep::Decrement => self.a_addr = self.a_addr.wrapping_sub(1),
            AStep::Fixed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Register File Tests
    // ========================================

    #[test]
    fn test_register_round_trip() {
        let mut channel = DmaChannel::default();
        channel.write_register(0x0, 0x01);
        channel.write_register(0x1, 0x18);
        channel.write_register(0x2, 0x00);
        channel.write_register(0x3, 0x80);
        channel.write_register(0x4, 0x7E);
        channel.write_register(0x5, 0x20);
        channel.write_register(0x6, 0x00);

        assert_eq!(channel.read_register(0x0), 0x01);
        assert_eq!(channel.read_register(0x1), 0x18);
        assert_eq!(channel.a_addr, 0x8000);
        assert_eq!(channel.a_bank, 0x7E);
        assert_eq!(channel.size, 0x0020);
    }

    #[test]
    fn test_hdma_registers_read_open_bus() {
        let channel = DmaChannel::default();
        assert_eq!(channel.read_register(0x7), 0xFF);
        assert_eq!(channel.read_register(0xA), 0xFF);
    }

    // ========================================
    // Parameter Decoding Tests
    // ========================================

    #[test]
    fn test_direction_bit() {
        let mut channel = DmaChannel::default();
        assert!(!channel.b_to_a());
        channel.params = 0x80;
        assert!(channel.b_to_a());
    }

    #[test]
    fn test_all_transfer_patterns() {
        let expected: [&[u16]; 8] = [
            &[0],
            &[0, 1],
            &[0, 0],
            &[0, 0, 1, 1],
            &[0, 1, 2, 3],
            &[0, 1, 0, 1],
            &[0, 0],
            &[0, 0, 1, 1],
        ];
        let mut channel = DmaChannel::default();
        for mode in 0..8u8 {
            channel.params = mode;
            assert_eq!(channel.pattern(), expected[mode as usize], "mode {}", mode);
        }
    }

    #[test]
    fn test_a_step_decoding() {
        let mut channel = DmaChannel::default();
        assert_eq!(channel.a_step(), AStep::Increment);
        channel.params = 0x10;
        assert_eq!(channel.a_step(), AStep::Decrement);
        channel.params = 0x08;
        assert_eq!(channel.a_step(), AStep::Fixed);
        // Fixed wins when both bits are set
        channel.params = 0x18;
        assert_eq!(channel.a_step(), AStep::Fixed);
    }

    #[test]
    fn test_size_zero_means_full_bank() {
        let mut channel = DmaChannel::default();
        channel.size = 0;
        assert_eq!(channel.transfer_length(), 0x10000);
        channel.size = 0x20;
        assert_eq!(channel.transfer_length(), 0x20);
    }

    #[test]
    fn test_step_a_addr_wraps() {
        let mut channel = DmaChannel {
            a_addr: 0xFFFF,
            ..Default::default()
        };
        channel.step_a_addr();
        assert_eq!(channel.a_addr, 0x0000, "increment wraps within the bank");

        channel.params = 0x10;
        channel.a_addr = 0x0000;
        channel.step_a_addr();
        assert_eq!(channel.a_addr, 0xFFFF, "decrement wraps within the bank");
    }
}
