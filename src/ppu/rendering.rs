// PPU rendering logic
//
// One call to `render_scanline` rasterizes the current line (when visible)
// and advances the raster position. Composition happens directly in the
// frame buffer: the line is filled with the backdrop color, background
// layers and sprites then overwrite pixels they win under the per-pixel
// priority rule, and master brightness is applied last.

use super::constants::*;
use super::Ppu;
use crate::display::{apply_brightness, bgr555_to_rgba};

/// Layer id recorded in the scratch buffer for sprite pixels
const LAYER_SPRITES: u8 = 4;

/// Layer id meaning "backdrop still owns this pixel"
const LAYER_NONE: u8 = 0xFF;

impl Ppu {
    /// Render the current scanline and advance the raster position
    ///
    /// Scanlines 0-223 draw into the frame buffer. Reaching scanline 224
    /// raises vertical blank; wrapping past 261 clears it and increments
    /// the frame counter.
    pub fn render_scanline(&mut self) {
        if self.scanline < VISIBLE_SCANLINES {
            self.rasterize_line();
        }

        self.scanline += 1;
        if self.scanline == VISIBLE_SCANLINES {
            self.vblank = true;
        }
        if self.scanline == SCANLINES_PER_FRAME {
            self.scanline = 0;
            self.vblank = false;
            self.frame_count += 1;
        }
    }

    /// Compose one visible line into the frame buffer
    fn rasterize_line(&mut self) {
        let y = self.scanline as usize;

        self.line_priority = [0; SCREEN_WIDTH];
        self.line_layer = [LAYER_NONE; SCREEN_WIDTH];

        // Forced blank and zero brightness both yield a black line
        if self.force_blank || self.brightness == 0 {
            self.framebuffer.fill_scanline(y, [0, 0, 0, 0xFF]);
            return;
        }

        // Backdrop: CGRAM entry 0
        let backdrop = bgr555_to_rgba(self.cgram_word(0));
        self.framebuffer.fill_scanline(y, backdrop);

        let mode = self.bg_mode;
        for &(bg, bpp, rank) in mode_layers(mode) {
            if self.main_screen & (1 << bg) == 0 {
                continue;
            }
            let rank = if mode == 1 && bg == 2 && self.bg3_priority {
                BG3_PROMOTED_RANK
            } else {
                rank
            };
            self.render_background_line(bg, bpp, rank);
        }

        if self.main_screen & 0x10 != 0 {
            self.render_sprites_line();
        }

        if self.brightness < 15 {
            self.apply_line_brightness(y);
        }
    }

    /// Rasterize one background layer across the line
    ///
    /// Per pixel: apply scroll, fetch the tilemap entry (with 64-tile
    /// quadrant stepping when the layer size bits ask for it), decode the
    /// planar tile pixel, and composite under the priority rule. Pixel
    /// index 0 is transparent.
    fn render_background_line(&mut self, bg: usize, bpp: u8, rank: u8) {
        let layer = self.layers[bg];
        let y = self.scanline as usize;

        let tile_px: usize = if layer.tile_16 { 16 } else { 8 };
        let wide = layer.tilemap_size & 1 != 0;
        let tall = layer.tilemap_size & 2 != 0;
        let hmask = (if wide { 64 } else { 32 }) * tile_px - 1;
        let vmask = (if tall { 64 } else { 32 }) * tile_px - 1;

        let words_per_tile = (bpp as usize) * 4;

        for x in 0..SCREEN_WIDTH {
            let vx = (x + layer.hscroll as usize) & hmask;
            let vy = (y + layer.vscroll as usize) & vmask;
            let tx = vx / tile_px;
            let ty = vy / tile_px;

            // Tilemap word: 32x32 quadrants stepped in 0x400-word screens
            let mut map = layer.tilemap_base as usize + ((ty & 0x1F) << 5) + (tx & 0x1F);
            if wide && tx >= 32 {
                map += 0x400;
            }
            if tall && ty >= 32 {
                map += if wide { 0x800 } else { 0x400 };
            }
            let entry = self.vram[map & (VRAM_WORDS - 1)];

            let mut tile = (entry & 0x3FF) as usize;
            let palette = ((entry >> 10) & 0x07) as usize;
            let prio_bit = entry & 0x2000 != 0;
            let hflip = entry & 0x4000 != 0;
            let vflip = entry & 0x8000 != 0;

            let mut col = vx % tile_px;
            let mut row = vy % tile_px;
            if hflip {
                col = tile_px - 1 - col;
            }
            if vflip {
                row = tile_px - 1 - row;
            }
            // 16x16 tiles are four 8x8 subtiles: +1 across, +16 down
            if tile_px == 16 {
                if col >= 8 {
                    tile += 1;
                    col -= 8;
                }
                if row >= 8 {
                    tile += 16;
                    row -= 8;
                }
            }

            let pixel =
                self.tile_pixel(layer.char_base as usize + tile * words_per_tile, row, col, bpp);
            if pixel == 0 {
                continue;
            }

            let priority = rank + if prio_bit { 2 } else { 0 };
            if priority >= self.line_priority[x] {
                let color_index = palette * (1usize << bpp) + pixel as usize;
                let rgba = bgr555_to_rgba(self.cgram_word(color_index));
                self.line_priority[x] = priority;
                self.line_layer[x] = bg as u8;
                self.framebuffer.set_pixel(x, y, rgba);
            }
        }
    }

    /// Rasterize the sprite layer across the line
    ///
    /// OAM is walked from entry 127 down to 0 so that, at equal priority,
    /// lower-index sprites land on top. Sprites clip at the right edge
    /// rather than wrapping; x values past 256 re-enter from the left as
    /// negative positions.
    fn render_sprites_line(&mut self) {
        let y = self.scanline as i32;
        let fb_y = self.scanline as usize;

        for i in (0..SPRITE_COUNT).rev() {
            let entry = i * 4;
            let sy = self.oam[entry + 1] as i32;
            let tile_low = self.oam[entry + 2] as u16;
            let attr = self.oam[entry + 3];

            let ext = self.oam[OAM_EXT_OFFSET + i / 4] >> ((i % 4) * 2);
            let large = ext & 2 != 0;
            let size = self.sprite_size(large) as i32;

            let row_in_sprite = y - sy;
            if row_in_sprite < 0 || row_in_sprite >= size {
                continue;
            }

            let mut sx = self.oam[entry] as i32;
            if ext & 1 != 0 {
                sx -= 256; // x bit 8: sprite re-enters from the left
            }

            let tile = tile_low | (((attr & 1) as u16) << 8);
            let palette = ((attr >> 1) & 0x07) as usize;
            let oam_priority = (attr >> 4) & 0x03;
            let hflip = attr & 0x40 != 0;
            let vflip = attr & 0x80 != 0;
            let rank = SPRITE_RANK_BASE + oam_priority;

            let mut row = row_in_sprite;
            if vflip {
                row = size - 1 - row;
            }
            let row = row as usize;

            for step in 0..size {
                let px = sx + step;
                if px < 0 {
                    continue;
                }
                if px >= SCREEN_WIDTH as i32 {
                    break; // clip, never wrap
                }

                let mut col = step;
                if hflip {
                    col = size - 1 - col;
                }
                let col = col as usize;

                // Sprite sheets stride 16 tiles per row
                let tile_n = (tile as usize + col / 8 + (row / 8) * 16) & 0x1FF;
                let base = self.obj_tile_base(tile_n);
                let pixel = self.tile_pixel(base, row % 8, col % 8, 4);
                if pixel == 0 {
                    continue;
                }

                let x = px as usize;
                if rank >= self.line_priority[x] {
                    // Sprite palettes occupy the upper CGRAM half
                    let color_index = (8 + palette) * 16 + pixel as usize;
                    let rgba = bgr555_to_rgba(self.cgram_word(color_index));
                    self.line_priority[x] = rank;
                    self.line_layer[x] = LAYER_SPRITES;
                    self.framebuffer.set_pixel(x, fb_y, rgba);
                }
            }
        }
    }

    /// Decode one pixel out of a planar tile
    ///
    /// `tile_base` is the word address of the tile's first bitplane pair.
    /// Each pair of bitplanes shares 8 words: plane N in the low bytes,
    /// plane N+1 in the high bytes, one word per row, pixel bit `7-col`.
    fn tile_pixel(&self, tile_base: usize, row: usize, col: usize, bpp: u8) -> u8 {
        let bit = 7 - col;
        let mut pixel = 0u8;
        for pair in 0..(bpp as usize / 2) {
            let word = self.vram[(tile_base + pair * 8 + row) & (VRAM_WORDS - 1)];
            pixel |= (((word >> bit) & 1) as u8) << (pair * 2);
            pixel |= (((word >> (bit + 8)) & 1) as u8) << (pair * 2 + 1);
        }
        pixel
    }

    /// Word address of an object tile, honoring the OBSEL name gap for the
    /// upper tile page
    fn obj_tile_base(&self, tile: usize) -> usize {
        let mut base = self.obj_char_base as usize + (tile & 0xFF) * 16;
        if tile & 0x100 != 0 {
            base += (self.obj_name_gap as usize + 1) << 12;
        }
        base
    }

    /// Edge length in pixels for small/large sprites per OBSEL size select
    fn sprite_size(&self, large: bool) -> usize {
        const SIZES: [(usize, usize); 8] = [
            (8, 16),
            (8, 32),
            (8, 64),
            (16, 32),
            (16, 64),
            (32, 64),
            (16, 32),
            (16, 32),
        ];
        let (small, big) = SIZES[(self.obj_size_select & 7) as usize];
        if large {
            big
        } else {
            small
        }
    }

    /// Scale the finished line by the master brightness register
    fn apply_line_brightness(&mut self, y: usize) {
        for x in 0..SCREEN_WIDTH {
            let [r, g, b, a] = self.framebuffer.get_pixel(x, y);
            self.framebuffer.set_pixel(
                x,
                y,
                [
                    apply_brightness(r, self.brightness),
                    apply_brightness(g, self.brightness),
                    apply_brightness(b, self.brightness),
                    a,
                ],
            );
        }
    }
}
