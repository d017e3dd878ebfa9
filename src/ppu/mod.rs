// PPU module - Picture Processing Unit implementation
//
// This module contains the SNES PPU emulation: a scanline-based rasterizer
// that decodes planar tile data out of VRAM, composites up to four
// background layers and 128 sprites with per-pixel priority, and emits
// BGR555 palette entries as RGBA into the frame buffer.
//
// ## Raster Timing
//
// An NTSC frame is 262 scanlines; the first 224 are visible. The scheduler
// calls [`Ppu::render_scanline`] once per scanline:
//
// 1. Scanlines 0-223 rasterize into the frame buffer.
// 2. Reaching scanline 224 raises the vertical-blank flag.
// 3. Scanline 261 wraps back to 0 and clears vertical blank.
//
// ## Register Map (CPU bus $2100-$213F)
//
// | Address     | Name        | Access | Description                     |
// |-------------|-------------|--------|---------------------------------|
// | $2100       | INIDISP     | Write  | Forced blank, brightness        |
// | $2101       | OBSEL       | Write  | Sprite size / character base    |
// | $2102/$2103 | OAMADD      | Write  | OAM address                     |
// | $2104       | OAMDATA     | Write  | OAM data, auto-increment        |
// | $2105       | BGMODE      | Write  | BG mode, BG3 priority, tile size|
// | $2106       | MOSAIC      | Write  | Mosaic size and layer mask      |
// | $2107-$210A | BG1SC-BG4SC | Write  | Tilemap base and size           |
// | $210B/$210C | BG12NBA/34  | Write  | Character bases                 |
// | $210D-$2114 | BGnHOFS/V   | Write×2| Layer scroll, double write      |
// | $2115       | VMAIN       | Write  | VRAM increment control          |
// | $2116/$2117 | VMADD       | Write  | VRAM word address               |
// | $2118/$2119 | VMDATA      | Write  | VRAM data port                  |
// | $2121       | CGADD       | Write  | CGRAM word index                |
// | $2122       | CGDATA      | Write×2| CGRAM data port                 |
// | $212C/$212D | TM/TS       | Write  | Main/sub screen enables         |
// | $2138-$213B | Data reads  | Read   | OAM/VRAM/CGRAM read-back        |
// | $213E/$213F | STAT77/78   | Read   | Status stubs                    |
//
// Mode 7 matrix, window, and color-math registers are accepted and
// discarded; those features are not emulated.

pub mod constants;
mod registers;
mod rendering;

use serde::{Deserialize, Serialize};

use crate::display::FrameBuffer;
use constants::*;

#[cfg(test)]
mod tests;

/// Per-layer background state
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Background {
    /// Tilemap base address in VRAM words
    pub tilemap_base: u16,

    /// Tilemap size bits from BGnSC: bit 0 doubles the width to 64 tiles,
    /// bit 1 doubles the height
    pub tilemap_size: u8,

    /// Character (tile data) base address in VRAM words
    pub char_base: u16,

    /// Horizontal scroll, 10 bits
    pub hscroll: u16,

    /// Vertical scroll, 10 bits
    pub vscroll: u16,

    /// Previous byte written to this layer's scroll ports
    pub scroll_prev: u8,

    /// 16×16 tile flag from BGMODE bits 4-7
    pub tile_16: bool,
}

impl Background {
    fn new() -> Self {
        Background {
            tilemap_base: 0,
            tilemap_size: 0,
            char_base: 0,
            hscroll: 0,
            vscroll: 0,
            scroll_prev: 0,
            tile_16: false,
        }
    }
}

/// PPU structure holding video memories, register state, and the raster
/// position
pub struct Ppu {
    // ========================================
    // Video Memories
    // ========================================
    /// VRAM, word addressable (32 KiW)
    pub(crate) vram: Vec<u16>,

    /// CGRAM: 256 BGR555 entries stored as little-endian byte pairs
    pub(crate) cgram: Vec<u8>,

    /// OAM: 128 primary entries plus the extended-attribute tail
    pub(crate) oam: Vec<u8>,

    // ========================================
    // Display Control
    // ========================================
    /// Master brightness, 0-15
    pub(crate) brightness: u8,

    /// Forced blank (INIDISP bit 7)
    pub(crate) force_blank: bool,

    // ========================================
    // Sprite Control
    // ========================================
    /// Sprite character base in VRAM words
    pub(crate) obj_char_base: u16,

    /// Name-select gap added for tiles >= 0x100 (OBSEL bits 3-4)
    pub(crate) obj_name_gap: u8,

    /// Sprite size select (OBSEL bits 5-7): chooses the large-sprite edge
    pub(crate) obj_size_select: u8,

    /// Current OAM word address (9 bits; byte position is double this)
    pub(crate) oam_word_addr: u16,

    /// Current OAM byte position, wraps at 0x220
    pub(crate) oam_byte_addr: u16,

    // ========================================
    // Background Control
    // ========================================
    /// Background mode 0-7
    pub(crate) bg_mode: u8,

    /// BG3 priority promotion (BGMODE bit 3)
    pub(crate) bg3_priority: bool,

    /// Mosaic size and layer mask (stored, not applied)
    pub(crate) mosaic: u8,

    /// The four background layers
    pub(crate) layers: [Background; 4],

    /// Main-screen layer enables (TM): bits 0-3 = BG1-BG4, bit 4 = sprites
    pub(crate) main_screen: u8,

    /// Sub-screen layer enables (TS)
    pub(crate) sub_screen: u8,

    // ========================================
    // VRAM Port
    // ========================================
    /// VMAIN: bits 0-1 step select, bit 7 increment-on-high
    pub(crate) vmain: u8,

    /// Current VRAM word address
    pub(crate) vram_addr: u16,

    /// Prefetch buffer backing the VRAM read ports
    pub(crate) vram_prefetch: u16,

    // ========================================
    // CGRAM Port
    // ========================================
    /// Current CGRAM word index
    pub(crate) cgram_addr: u8,

    /// Low byte latched by the first data-port write
    pub(crate) cgram_latch: u8,

    /// True when the next data-port access is the high byte
    pub(crate) cgram_high_phase: bool,

    // ========================================
    // Raster Position
    // ========================================
    /// Current scanline, 0-261
    pub(crate) scanline: u16,

    /// Frames completed since reset
    pub(crate) frame_count: u64,

    /// Vertical-blank flag, set during scanlines 224-261
    pub(crate) vblank: bool,

    // ========================================
    // Per-Scanline Scratch
    // ========================================
    /// Layer id that currently owns each pixel of the line (0-3 = BG1-BG4,
    /// 4 = sprites, 0xFF = backdrop)
    line_layer: [u8; SCREEN_WIDTH],

    /// Winning priority rank for each pixel of the line
    line_priority: [u8; SCREEN_WIDTH],

    /// Output frame
    framebuffer: FrameBuffer,
}

impl Ppu {
    /// Create a PPU in its post-reset state
    pub fn new() -> Self {
        Ppu {
            vram: vec![0; VRAM_WORDS],
            cgram: vec![0; CGRAM_SIZE],
            oam: vec![0; OAM_SIZE],
            brightness: 0x0F,
            force_blank: false,
            // Default matches the common sprite-tile layout at word $6000;
            // OBSEL writes replace it
            obj_char_base: 0x6000,
            obj_name_gap: 0,
            obj_size_select: 0,
            oam_word_addr: 0,
            oam_byte_addr: 0,
            bg_mode: 0,
            bg3_priority: false,
            mosaic: 0,
            layers: [Background::new(); 4],
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
            line_layer: [0xFF; SCREEN_WIDTH],
            line_priority: [0; SCREEN_WIDTH],
            framebuffer: FrameBuffer::new(),
        }
    }

    /// Reset all register and raster state, preserving nothing
    pub fn reset(&mut self) {
        *self = Ppu::new();
    }

    /// The finished frame as RGBA bytes
    pub fn frame(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Layer that won each pixel of the most recently rendered line:
    /// 0-3 for BG1-BG4, 4 for sprites, 0xFF for the backdrop
    pub fn line_owners(&self) -> &[u8; SCREEN_WIDTH] {
        &self.line_layer
    }

    /// Current scanline (0-261)
    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Frames completed since reset
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Vertical-blank flag
    pub fn in_vblank(&self) -> bool {
        self.vblank
    }

    /// Master brightness register value (0-15)
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    // ========================================
    // Memory Helpers
    // ========================================

    /// Read a CGRAM entry as a little-endian BGR555 word
    ///
    /// `index` is a color index; the byte offset wraps at the CGRAM size.
    #[inline]
    pub(crate) fn cgram_word(&self, index: usize) -> u16 {
        let offset = (index * 2) & 0x1FF;
        u16::from_le_bytes([self.cgram[offset], self.cgram[offset + 1]])
    }

    /// Current VRAM address increment step from VMAIN bits 0-1
    #[inline]
    pub(crate) fn vram_step(&self) -> u16 {
        VRAM_STEPS[(self.vmain & 0x03) as usize]
    }

    /// Whether the data-port increment fires on the high-byte port
    #[inline]
    pub(crate) fn increment_on_high(&self) -> bool {
        self.vmain & 0x80 != 0
    }

    /// Direct VRAM word access for tests and save states
    pub fn vram_word(&self, addr: u16) -> u16 {
        self.vram[(addr as usize) & (VRAM_WORDS - 1)]
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}
