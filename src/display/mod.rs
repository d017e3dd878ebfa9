// Display module - Frame buffer and color conversion
//
// The PPU renders into the frame buffer one scanline at a time; the host
// consumes the finished RGBA buffer through the emulator's frame callback.
// Window management and canvas presentation belong to the host, not here.

mod framebuffer;
mod palette;

pub use framebuffer::{FrameBuffer, BYTES_PER_PIXEL, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use palette::{apply_brightness, bgr555_to_rgba};
