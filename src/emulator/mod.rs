// Emulator module - Main emulator coordinator
//
// Owns the CPU and the bus (which in turn owns PPU, APU, DMA, input and
// memory) and drives them through the frame scheduler: 262 scanlines per
// frame, each scanline rendering first and then letting the CPU spend a
// fixed cycle budget. Also implements the host-facing API: ROM loading,
// reset, frame callbacks, pacing, register inspection, save states and
// screenshots.

mod config;
mod save_state;
mod screenshot;

pub use config::{EmulatorConfig, SpeedMode};
pub use save_state::{CpuState, PpuState, SaveState, SaveStateError};
pub use screenshot::{save_screenshot, screenshot_path, ScreenshotError};

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::info;

use crate::bus::Bus;
use crate::cartridge::{Cartridge, RomError};
use crate::cpu::{Cpu, Registers};
use crate::input::{Button, Player};

/// Scanlines per NTSC frame
pub const SCANLINES_PER_FRAME: u16 = 262;

/// CPU cycles granted per scanline (~1364 master clocks / 6)
pub const CPU_CYCLES_PER_SCANLINE: u32 = 227;

/// Frame callback: receives the finished 256x224x4 RGBA buffer
pub type FrameCallback = Box<dyn FnMut(&[u8])>;

/// Main emulator structure
///
/// Coordinates all components and provides the host-facing control
/// surface for running games, inspecting state, and pacing frames.
pub struct Emulator {
    /// CPU (65816 processor)
    cpu: Cpu,

    /// Bus (owns every memory-mapped component)
    bus: Bus,

    /// Configuration
    config: EmulatorConfig,

    /// Currently loaded ROM path, when loaded from disk
    rom_path: Option<PathBuf>,

    /// Paused state, sampled at scanline boundaries
    paused: bool,

    /// Speed mode for frame pacing
    speed_mode: SpeedMode,

    /// Invoked once per completed frame
    frame_callback: Option<FrameCallback>,

    /// Frame timing for the pacing delay
    last_frame_time: Option<Instant>,
}

impl Emulator {
    /// Create a new emulator instance with no ROM loaded
    pub fn new() -> Self {
        Emulator {
            cpu: Cpu::new(),
            bus: Bus::new(),
            config: EmulatorConfig::load_or_default(),
            rom_path: None,
            paused: false,
            speed_mode: SpeedMode::Normal,
            frame_callback: None,
            last_frame_time: None,
        }
    }

    // ========================================
    // ROM Loading and Reset
    // ========================================

    /// Load a ROM image from a byte buffer and reset the machine
    pub fn load_rom_bytes(&mut self, data: &[u8]) -> Result<(), RomError> {
        let cartridge = Cartridge::from_bytes(data)?;
        info!("booting \"{}\"", cartridge.header.title);
        self.bus.load_cartridge(cartridge);
        self.reset();
        Ok(())
    }

    /// Load a ROM file from disk and reset the machine
    ///
    /// # Arguments
    /// * `path` - Path to the ROM file (.sfc/.smc)
    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RomError> {
        let path = path.as_ref();
        let cartridge = Cartridge::from_file(path)?;
        info!("booting \"{}\"", cartridge.header.title);
        self.bus.load_cartridge(cartridge);
        self.rom_path = Some(path.to_path_buf());
        self.reset();
        Ok(())
    }

    /// Reset all components, as if pressing the console's reset button
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.paused = false;
        self.last_frame_time = None;
    }

    // ========================================
    // Frame Scheduler
    // ========================================

    /// Run one scanline: PPU raster first, then the CPU's cycle budget
    ///
    /// The PPU raises vertical blank when it finishes scanline 223; on
    /// that edge the NMI flag latches and, if enabled in $4200, an NMI is
    /// delivered to the CPU before its next instruction. Memory written by
    /// the CPU becomes visible to the PPU on the next scanline.
    fn step_scanline(&mut self) {
        let was_vblank = self.bus.ppu.in_vblank();
        self.bus.ppu.render_scanline();
        if !was_vblank && self.bus.ppu.in_vblank() {
            self.bus.set_nmi_flag();
            if self.bus.nmi_enabled() {
                self.cpu.raise_nmi();
            }
        }

        let mut budget = CPU_CYCLES_PER_SCANLINE as i64;
        while budget > 0 {
            let cycles = self.cpu.step(&mut self.bus);
            // DMA triggered by a register write stalls the CPU
            let stall = self.bus.take_dma_stall();
            budget -= (cycles + stall) as i64;
        }

        self.bus.apu.step(CPU_CYCLES_PER_SCANLINE);
    }

    /// Run scanlines to the end of the current frame, then hand the frame
    /// buffer to the callback
    ///
    /// Pausing mid-frame returns early without losing raster position; a
    /// later call resumes where it stopped.
    pub fn run_frame(&mut self) {
        loop {
            if self.paused {
                return;
            }
            self.step_scanline();
            if self.bus.ppu.scanline() == 0 {
                break; // wrapped: the frame is complete
            }
        }

        if let Some(callback) = &mut self.frame_callback {
            callback(self.bus.ppu.frame().as_rgba());
        }
    }

    /// Sleep out the remainder of the frame budget
    ///
    /// Call once per displayed frame. The budget is `1000 / fps`
    /// milliseconds scaled by the speed mode; elapsed wall time since the
    /// previous call is credited against it.
    pub fn pace(&mut self) {
        let now = Instant::now();
        if let (Some(last), Some(multiplier)) = (self.last_frame_time, self.speed_mode.multiplier())
        {
            let budget = Duration::from_secs_f64(1.0 / (self.config.video.fps * multiplier));
            let elapsed = now.duration_since(last);
            if elapsed < budget {
                std::thread::sleep(budget - elapsed);
            }
        }
        self.last_frame_time = Some(Instant::now());
    }

    /// Pause emulation; takes effect at the next scanline boundary
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume a paused emulator without losing state
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether the emulator is paused
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Select the pacing speed
    pub fn set_speed_mode(&mut self, mode: SpeedMode) {
        self.speed_mode = mode;
    }

    // ========================================
    // Host Interface
    // ========================================

    /// Install the per-frame callback receiving the RGBA buffer
    pub fn set_frame_callback<F: FnMut(&[u8]) + 'static>(&mut self, callback: F) {
        self.frame_callback = Some(Box::new(callback));
    }

    /// The current frame buffer contents (256 x 224 x 4 RGBA bytes)
    pub fn frame(&self) -> &[u8] {
        self.bus.ppu.frame().as_rgba()
    }

    /// Snapshot of the CPU register file
    pub fn get_registers(&self) -> Registers {
        self.cpu.registers()
    }

    /// The CPU status register P
    pub fn get_flags(&self) -> u8 {
        self.cpu.status
    }

    /// Replace the CPU status register, honoring the width invariants
    pub fn set_flags(&mut self, p: u8) {
        self.cpu.set_status_register(p);
    }

    /// Frames completed since reset
    pub fn get_frame_count(&self) -> u64 {
        self.bus.ppu.frame_count()
    }

    /// Path of the ROM file, when it was loaded from disk
    pub fn rom_path(&self) -> Option<&Path> {
        self.rom_path.as_deref()
    }

    /// Title from the loaded cartridge header
    pub fn rom_title(&self) -> Option<&str> {
        self.bus
            .cartridge
            .as_ref()
            .map(|cart| cart.header.title.as_str())
    }

    /// Press or release a controller button
    pub fn set_button(&mut self, player: Player, button: Button, pressed: bool) {
        self.bus.input.set_button(player, button, pressed);
    }

    /// Replace a controller's live state with an active-low mask
    pub fn set_controller_state(&mut self, player: Player, mask: u16) {
        self.bus.input.set_state(player, mask);
    }

    /// Borrow the bus (component inspection in tests and tools)
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutably borrow the bus
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Emulator configuration
    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    // ========================================
    // Save States
    // ========================================

    /// Capture the complete machine state
    ///
    /// # Errors
    /// Fails with [`SaveStateError::NoRomLoaded`] before a ROM is loaded.
    pub fn save_state(&self) -> Result<SaveState, SaveStateError> {
        let cartridge = self
            .bus
            .cartridge
            .as_ref()
            .ok_or(SaveStateError::NoRomLoaded)?;

        let ppu = &self.bus.ppu;
        Ok(SaveState {
            version: save_state::SAVE_STATE_VERSION,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            rom_title: cartridge.header.title.clone(),
            cpu: CpuState {
                registers: self.cpu.registers(),
                nmi_pending: self.cpu.nmi_pending,
                irq_line: self.cpu.irq_line,
                stopped: self.cpu.stopped,
                waiting: self.cpu.waiting,
                cycles: self.cpu.cycles,
            },
            ppu: PpuState {
                brightness: ppu.brightness,
                force_blank: ppu.force_blank,
                obj_char_base: ppu.obj_char_base,
                obj_name_gap: ppu.obj_name_gap,
                obj_size_select: ppu.obj_size_select,
                oam_word_addr: ppu.oam_word_addr,
                oam_byte_addr: ppu.oam_byte_addr,
                bg_mode: ppu.bg_mode,
                bg3_priority: ppu.bg3_priority,
                mosaic: ppu.mosaic,
                layers: ppu.layers,
                main_screen: ppu.main_screen,
                sub_screen: ppu.sub_screen,
                vmain: ppu.vmain,
                vram_addr: ppu.vram_addr,
                vram_prefetch: ppu.vram_prefetch,
                cgram_addr: ppu.cgram_addr,
                cgram_latch: ppu.cgram_latch,
                cgram_high_phase: ppu.cgram_high_phase,
                scanline: ppu.scanline,
                frame_count: ppu.frame_count,
                vblank: ppu.vblank,
            },
            wram: self.bus.wram.clone(),
            vram: ppu.vram.clone(),
            cgram: ppu.cgram.clone(),
            oam: ppu.oam.clone(),
            dma: self.bus.dma.to_vec(),
            input: self.bus.input,
            apu: self.bus.apu.clone(),
            nmitimen: self.bus.nmitimen,
        })
    }

    /// Restore a previously captured machine state
    ///
    /// # Errors
    /// Fails when no ROM is loaded or the state's format version differs.
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), SaveStateError> {
        if self.bus.cartridge.is_none() {
            return Err(SaveStateError::NoRomLoaded);
        }
        state.check_version()?;

        self.cpu.set_registers(&state.cpu.registers);
        self.cpu.nmi_pending = state.cpu.nmi_pending;
        self.cpu.irq_line = state.cpu.irq_line;
        self.cpu.stopped = state.cpu.stopped;
        self.cpu.waiting = state.cpu.waiting;
        self.cpu.cycles = state.cpu.cycles;

        self.bus.wram.copy_from_slice(&state.wram);
        self.bus.nmitimen = state.nmitimen;
        self.bus.input = state.input;
        self.bus.apu = state.apu.clone();
        self.bus.dma.copy_from_slice(&state.dma);

        let ppu = &mut self.bus.ppu;
        ppu.vram.copy_from_slice(&state.vram);
        ppu.cgram.copy_from_slice(&state.cgram);
        ppu.oam.copy_from_slice(&state.oam);
        ppu.brightness = state.ppu.brightness;
        ppu.force_blank = state.ppu.force_blank;
        ppu.obj_char_base = state.ppu.obj_char_base;
        ppu.obj_name_gap = state.ppu.obj_name_gap;
        ppu.obj_size_select = state.ppu.obj_size_select;
        ppu.oam_word_addr = state.ppu.oam_word_addr;
        ppu.oam_byte_addr = state.ppu.oam_byte_addr;
        ppu.bg_mode = state.ppu.bg_mode;
        ppu.bg3_priority = state.ppu.bg3_priority;
        ppu.mosaic = state.ppu.mosaic;
        ppu.layers = state.ppu.layers;
        ppu.main_screen = state.ppu.main_screen;
        ppu.sub_screen = state.ppu.sub_screen;
        ppu.vmain = state.ppu.vmain;
        ppu.vram_addr = state.ppu.vram_addr;
        ppu.vram_prefetch = state.ppu.vram_prefetch;
        ppu.cgram_addr = state.ppu.cgram_addr;
        ppu.cgram_latch = state.ppu.cgram_latch;
        ppu.cgram_high_phase = state.ppu.cgram_high_phase;
        ppu.scanline = state.ppu.scanline;
        ppu.frame_count = state.ppu.frame_count;
        ppu.vblank = state.ppu.vblank;

        Ok(())
    }

    /// Write the current frame buffer as a PNG screenshot
    pub fn screenshot<P: AsRef<Path>>(&self, path: P) -> Result<(), ScreenshotError> {
        save_screenshot(path, self.frame())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_pause_and_resume() {
        let mut emulator = Emulator::new();
        emulator.pause();
        assert!(emulator.is_paused());

        // A paused emulator makes no raster progress
        let scanline = emulator.bus().ppu.scanline();
        emulator.run_frame();
        assert_eq!(emulator.bus().ppu.scanline(), scanline);

        emulator.resume();
        assert!(!emulator.is_paused());
    }

    #[test]
    fn test_frame_advances_without_rom() {
        // With no cartridge the CPU chews on open-bus bytes; the frame
        // loop must still terminate and count frames.
        let mut emulator = Emulator::new();
        emulator.run_frame();
        assert_eq!(emulator.get_frame_count(), 1);
    }

    #[test]
    fn test_frame_callback_receives_buffer() {
        let mut emulator = Emulator::new();
        let called = Rc::new(Cell::new(0usize));
        let called_inner = Rc::clone(&called);
        emulator.set_frame_callback(move |frame| {
            assert_eq!(frame.len(), 256 * 224 * 4);
            called_inner.set(called_inner.get() + 1);
        });

        emulator.run_frame();
        emulator.run_frame();
        assert_eq!(called.get(), 2);
    }

    #[test]
    fn test_save_state_requires_rom() {
        let emulator = Emulator::new();
        assert!(matches!(
            emulator.save_state(),
            Err(SaveStateError::NoRomLoaded)
        ));
    }
}
