// Save state functionality
//
// Serializes the complete machine state (CPU registers, WRAM, video
// memories, PPU and DMA register files, controllers, the APU mailbox) so
// a session can be captured and restored exactly. The frame buffer and
// per-line scratch are not stored; the next rendered frame regenerates
// them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::cpu::Registers;
use crate::dma::DmaChannel;
use crate::input::ControllerIo;
use crate::ppu::Background;

/// Errors that can occur during save state operations
#[derive(Debug)]
pub enum SaveStateError {
    /// I/O error
    Io(io::Error),

    /// Serialization/deserialization error
    Serialization(serde_json::Error),

    /// Save state version mismatch
    VersionMismatch { expected: u32, found: u32 },

    /// No ROM loaded
    NoRomLoaded,
}

impl std::fmt::Display for SaveStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveStateError::Io(e) => write!(f, "I/O error: {}", e),
            SaveStateError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SaveStateError::VersionMismatch { expected, found } => {
                write!(f, "Version mismatch: expected {}, found {}", expected, found)
            }
            SaveStateError::NoRomLoaded => write!(f, "No ROM loaded"),
        }
    }
}

impl std::error::Error for SaveStateError {}

impl From<io::Error> for SaveStateError {
    fn from(e: io::Error) -> Self {
        SaveStateError::Io(e)
    }
}

impl From<serde_json::Error> for SaveStateError {
    fn from(e: serde_json::Error) -> Self {
        SaveStateError::Serialization(e)
    }
}

/// Current save state format version
pub(crate) const SAVE_STATE_VERSION: u32 = 1;

/// CPU state for serialization: the register snapshot plus bookkeeping
#[derive(Debug, Serialize, Deserialize)]
pub struct CpuState {
    pub registers: Registers,
    pub nmi_pending: bool,
    pub irq_line: bool,
    pub stopped: bool,
    pub waiting: bool,
    pub cycles: u64,
}

/// PPU register state for serialization
#[derive(Debug, Serialize, Deserialize)]
pub struct PpuState {
    pub brightness: u8,
    pub force_blank: bool,
    pub obj_char_base: u16,
    pub obj_name_gap: u8,
    pub obj_size_select: u8,
    pub oam_word_addr: u16,
    pub oam_byte_addr: u16,
    pub bg_mode: u8,
    pub bg3_priority: bool,
    pub mosaic: u8,
    pub layers: [Background; 4],
    pub main_screen: u8,
    pub sub_screen: u8,
    pub vmain: u8,
    pub vram_addr: u16,
    pub vram_prefetch: u16,
    pub cgram_addr: u8,
    pub cgram_latch: u8,
    pub cgram_high_phase: bool,
    pub scanline: u16,
    pub frame_count: u64,
    pub vblank: bool,
}

/// Complete emulator save state
///
/// Contains all the state needed to restore the emulator to an exact
/// point in time.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveState {
    /// Version number for compatibility checking
    pub(crate) version: u32,

    /// Timestamp when the save state was created
    pub timestamp: String,

    /// ROM title for validation
    pub rom_title: String,

    /// CPU state
    pub cpu: CpuState,

    /// PPU register state
    pub ppu: PpuState,

    /// WRAM contents (128KB)
    pub wram: Vec<u8>,

    /// VRAM contents (32K words)
    pub vram: Vec<u16>,

    /// CGRAM contents
    pub cgram: Vec<u8>,

    /// OAM contents
    pub oam: Vec<u8>,

    /// DMA channel register files
    pub dma: Vec<DmaChannel>,

    /// Controller state
    pub input: ControllerIo,

    /// APU mailbox state
    pub apu: crate::apu::Apu,

    /// $4200 interrupt enables
    pub nmitimen: u8,
}

impl SaveState {
    /// Validate the format version
    pub(crate) fn check_version(&self) -> Result<(), SaveStateError> {
        if self.version != SAVE_STATE_VERSION {
            return Err(SaveStateError::VersionMismatch {
                expected: SAVE_STATE_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    /// Serialize to JSON and write to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a save state back from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SaveState, SaveStateError> {
        let json = fs::read_to_string(path)?;
        let state: SaveState = serde_json::from_str(&json)?;
        state.check_version()?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_state() -> SaveState {
        SaveState {
            version: SAVE_STATE_VERSION,
            timestamp: String::new(),
            rom_title: "TEST".into(),
            cpu: CpuState {
                registers: crate::cpu::Cpu::new().registers(),
                nmi_pending: false,
                irq_line: false,
                stopped: false,
                waiting: false,
                cycles: 0,
            },
            ppu: PpuState {
                brightness: 15,
                force_blank: false,
                obj_char_base: 0x6000,
                obj_name_gap: 0,
                obj_size_select: 0,
                oam_word_addr: 0,
                oam_byte_addr: 0,
                bg_mode: 0,
                bg3_priority: false,
                mosaic: 0,
                layers: [crate::ppu::Background {
                    tilemap_base: 0,
                    tilemap_size: 0,
                    char_base: 0,
                    hscroll: 0,
                    vscroll: 0,
                    scroll_prev: 0,
                    tile_16: false,
                }; 4],
                main_screen: 0,
                sub_screen: 0,
                vmain: 0,
                vram_addr: 0,
                vram_prefetch: 0,
                cgram_addr: 0,
                cgram_latch: 0,
                cgram_high_phase: false,
                scanline: 0,
                frame_count: 0,
                vblank: false,
            },
            wram: vec![0; 4],
            vram: vec![0; 4],
            cgram: vec![0; 4],
            oam: vec![0; 4],
            dma: vec![DmaChannel::default(); 8],
            input: ControllerIo::new(),
            apu: crate::apu::Apu::new(),
            nmitimen: 0,
        }
    }

    #[test]
    fn test_json_round_trip() {
        let state = minimal_state();
        let json = serde_json::to_string(&state).unwrap();
        let parsed: SaveState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, SAVE_STATE_VERSION);
        assert_eq!(parsed.rom_title, "TEST");
        assert_eq!(parsed.cpu.registers, state.cpu.registers);
    }

    #[test]
    fn test_version_check() {
        let mut state = minimal_state();
        state.version = 99;
        assert!(matches!(
            state.check_version(),
            Err(SaveStateError::VersionMismatch {
                expected: SAVE_STATE_VERSION,
                found: 99
            })
        ));
    }
}
