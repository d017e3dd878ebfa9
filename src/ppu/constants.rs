// PPU constants - raster geometry, memory sizes, and priority ranks

/// Visible pixels per scanline
pub const SCREEN_WIDTH: usize = 256;

/// Visible scanlines per frame (NTSC)
pub const VISIBLE_SCANLINES: u16 = 224;

/// Total scanlines per frame, visible plus vertical blank
pub const SCANLINES_PER_FRAME: u16 = 262;

/// VRAM size in 16-bit words (64 KiB)
pub const VRAM_WORDS: usize = 0x8000;

/// CGRAM size in bytes (256 BGR555 entries)
pub const CGRAM_SIZE: usize = 512;

/// OAM size in bytes: 128 primary 4-byte entries plus the 32-byte
/// extended-attribute table
pub const OAM_SIZE: usize = 544;

/// Number of sprites in OAM
pub const SPRITE_COUNT: usize = 128;

/// Byte offset of the extended-attribute table inside OAM
pub const OAM_EXT_OFFSET: usize = 512;

/// Priority rank added on top of the background ranks for every sprite;
/// the sprite's own 2-bit OAM priority is added to this
pub const SPRITE_RANK_BASE: u8 = 10;

/// Rank given to BG3 when the BGMODE priority-promotion bit is set in mode 1
pub const BG3_PROMOTED_RANK: u8 = 9;

/// VRAM data-port address increment steps selected by VMAIN bits 0-1.
/// The 0b10 and 0b11 encodings both step by 128.
pub const VRAM_STEPS: [u16; 4] = [1, 32, 128, 128];

/// One background layer's slot in a mode's layer list: (layer index,
/// bits per pixel, priority rank). Lists are ordered back to front and
/// higher ranks win ties.
pub type ModeLayer = (usize, u8, u8);

/// Background layer composition for each of the eight background modes
///
/// Mode 1 is listed without the BG3 promotion; the renderer substitutes
/// [`BG3_PROMOTED_RANK`] when the BGMODE bit 3 is set. Mode 7 is rendered
/// as a flat 8bpp layer (the affine transform is not emulated).
pub fn mode_layers(mode: u8) -> &'static [ModeLayer] {
    match mode & 7 {
        0 => &[(3, 2, 1), (2, 2, 2), (1, 2, 3), (0, 2, 4)],
        1 => &[(2, 2, 1), (1, 4, 2), (0, 4, 3)],
        2 => &[(1, 4, 1), (0, 4, 2)],
        3 => &[(1, 4, 1), (0, 8, 2)],
        4 => &[(1, 2, 1), (0, 8, 2)],
        5 => &[(1, 2, 1), (0, 4, 2)],
        6 => &[(0, 4, 1)],
        _ => &[(0, 8, 1)],
    }
}
