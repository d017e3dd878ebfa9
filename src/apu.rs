// APU module - Audio Processing Unit mailbox stub
//
// The real SNES sound system is a separate SPC700 CPU plus DSP that talks to
// the main CPU exclusively through four bidirectional I/O ports mapped at
// $2140-$2143. This module emulates only that mailbox; the SPC700 core and
// audio synthesis are out of scope.
//
// ## Register Map
//
// | Address | Name    | Access | Description          |
// |---------|---------|--------|----------------------|
// | $2140   | APUIO0  | R/W    | Mailbox port 0       |
// | $2141   | APUIO1  | R/W    | Mailbox port 1       |
// | $2142   | APUIO2  | R/W    | Mailbox port 2       |
// | $2143   | APUIO3  | R/W    | Mailbox port 3       |
//
// At power-on the SPC700 IPL ROM presents $AA on port 0 and $BB on port 1,
// and the upload protocol echoes written values back. The stub reproduces
// both behaviors so well-behaved boot handshakes terminate instead of
// spinning forever on a dead port.

use serde::{Deserialize, Serialize};

/// Mailbox stub standing in for the SPC700 sound system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apu {
    /// Values the CPU reads from $2140-$2143
    output: [u8; 4],

    /// Last values the CPU wrote to $2140-$2143
    input: [u8; 4],

    /// Cycle bookkeeping, advanced by the scheduler
    cycles: u64,
}

impl Apu {
    /// Create the mailbox in its post-IPL state
    pub fn new() -> Self {
        Apu {
            output: [0xAA, 0xBB, 0x00, 0x00],
            input: [0; 4],
            cycles: 0,
        }
    }

    /// Reset the mailbox to the IPL ready signature
    pub fn reset(&mut self) {
        self.output = [0xAA, 0xBB, 0x00, 0x00];
        self.input = [0; 4];
        self.cycles = 0;
    }

    /// CPU read of $2140 + port
    pub fn read_port(&self, port: usize) -> u8 {
        self.output[port & 3]
    }

    /// CPU write of $2140 + port
    ///
    /// The value is echoed straight back on the same port, which is what the
    /// IPL upload loop expects as its acknowledgement.
    pub fn write_port(&mut self, port: usize, value: u8) {
        let port = port & 3;
        self.input[port] = value;
        self.output[port] = value;
    }

    /// Last value the CPU wrote to a port (for host-side inspection)
    pub fn last_cpu_write(&self, port: usize) -> u8 {
        self.input[port & 3]
    }

    /// Advance the (stubbed) sound core by `cycles` CPU cycles
    pub fn step(&mut self, cycles: u32) {
        self.cycles = self.cycles.wrapping_add(cycles as u64);
    }

    /// Total cycles accounted to the sound core
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipl_ready_signature() {
        let apu = Apu::new();
        assert_eq!(apu.read_port(0), 0xAA);
        assert_eq!(apu.read_port(1), 0xBB);
        assert_eq!(apu.read_port(2), 0x00);
        assert_eq!(apu.read_port(3), 0x00);
    }

    #[test]
    fn test_write_echoes_back() {
        let mut apu = Apu::new();
        apu.write_port(0, 0xCC);
        assert_eq!(apu.read_port(0), 0xCC);
        assert_eq!(apu.last_cpu_write(0), 0xCC);
    }

    #[test]
    fn test_ports_are_independent() {
        let mut apu = Apu::new();
        apu.write_port(2, 0x11);
        apu.write_port(3, 0x22);
        assert_eq!(apu.read_port(2), 0x11);
        assert_eq!(apu.read_port(3), 0x22);
        assert_eq!(apu.read_port(0), 0xAA, "untouched port keeps IPL value");
    }

    #[test]
    fn test_reset_restores_signature() {
        let mut apu = Apu::new();
        apu.write_port(0, 0x42);
        apu.step(1000);
        apu.reset();
        assert_eq!(apu.read_port(0), 0xAA);
        assert_eq!(apu.cycles(), 0);
    }

    #[test]
    fn test_step_accumulates_cycles() {
        let mut apu = Apu::new();
        apu.step(227);
        apu.step(227);
        assert_eq!(apu.cycles(), 454);
    }
}
