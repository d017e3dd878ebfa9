// Screenshot capture
//
// Encodes the 256x224 RGBA frame buffer as a PNG file.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use crate::display::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Errors that can occur while writing a screenshot
#[derive(Debug)]
pub enum ScreenshotError {
    /// I/O error
    Io(io::Error),

    /// PNG encoding error
    Encoding(png::EncodingError),
}

impl std::fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenshotError::Io(e) => write!(f, "I/O error: {}", e),
            ScreenshotError::Encoding(e) => write!(f, "PNG encoding error: {}", e),
        }
    }
}

impl std::error::Error for ScreenshotError {}

impl From<io::Error> for ScreenshotError {
    fn from(e: io::Error) -> Self {
        ScreenshotError::Io(e)
    }
}

impl From<png::EncodingError> for ScreenshotError {
    fn from(e: png::EncodingError) -> Self {
        ScreenshotError::Encoding(e)
    }
}

/// Write one frame as a PNG file
///
/// # Arguments
/// * `path` - Destination file
/// * `rgba` - Frame data, 256 x 224 x 4 bytes
pub fn save_screenshot<P: AsRef<Path>>(path: P, rgba: &[u8]) -> Result<(), ScreenshotError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);

    let mut encoder = png::Encoder::new(writer, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(rgba)?;
    Ok(())
}

/// Build a screenshot path inside `directory`, optionally timestamped
pub fn screenshot_path(directory: &Path, include_timestamp: bool) -> PathBuf {
    let name = if include_timestamp {
        format!(
            "screenshot_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        )
    } else {
        "screenshot.png".to_string()
    };
    directory.join(name)
}
