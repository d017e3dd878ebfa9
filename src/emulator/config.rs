// Configuration management
//
// Handles emulator configuration, settings persistence, and speed control.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Default configuration file path
const CONFIG_FILE: &str = "emulator_config.toml";

/// Emulator configuration
///
/// Stores all user-configurable settings for the emulator core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Video settings
    pub video: VideoConfig,

    /// Save state settings
    pub save_state: SaveStateConfig,

    /// Screenshot settings
    pub screenshot: ScreenshotConfig,
}

/// Video configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Target frame rate (NTSC SNES runs at ~60.0988 Hz)
    pub fps: f64,
}

/// Save state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveStateConfig {
    /// Number of save slots (1-10)
    pub slots: u8,

    /// Save directory
    pub save_directory: PathBuf,
}

/// Screenshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Screenshot directory
    pub screenshot_directory: PathBuf,

    /// Include timestamp in filename
    pub include_timestamp: bool,
}

/// Speed mode for emulation pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedMode {
    /// Normal speed (1x)
    Normal,

    /// Double speed (2x)
    Double,

    /// No pacing at all
    Uncapped,
}

impl SpeedMode {
    /// Pacing multiplier applied to the frame budget
    pub fn multiplier(self) -> Option<f64> {
        match self {
            SpeedMode::Normal => Some(1.0),
            SpeedMode::Double => Some(2.0),
            SpeedMode::Uncapped => None,
        }
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            video: VideoConfig { fps: 60.0988 },
            save_state: SaveStateConfig {
                slots: 10,
                save_directory: PathBuf::from("saves"),
            },
            screenshot: ScreenshotConfig {
                screenshot_directory: PathBuf::from("screenshots"),
                include_timestamp: true,
            },
        }
    }
}

impl EmulatorConfig {
    /// Load the configuration file, falling back to defaults
    ///
    /// A missing or unparsable file yields the default configuration.
    pub fn load_or_default() -> Self {
        Self::load_from(CONFIG_FILE).unwrap_or_default()
    }

    /// Load configuration from a specific TOML file
    pub fn load_from(path: &str) -> Option<Self> {
        let contents = fs::read_to_string(path).ok()?;
        toml::from_str(&contents).ok()
    }

    /// Save the configuration as TOML
    pub fn save(&self) -> io::Result<()> {
        self.save_to(CONFIG_FILE)
    }

    /// Save the configuration to a specific path
    pub fn save_to(&self, path: &str) -> io::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert!((config.video.fps - 60.0988).abs() < 1e-9);
        assert_eq!(config.save_state.slots, 10);
        assert!(config.screenshot.include_timestamp);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EmulatorConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: EmulatorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.save_state.slots, config.save_state.slots);
        assert_eq!(
            parsed.screenshot.screenshot_directory,
            config.screenshot.screenshot_directory
        );
    }

    #[test]
    fn test_speed_multipliers() {
        assert_eq!(SpeedMode::Normal.multiplier(), Some(1.0));
        assert_eq!(SpeedMode::Double.multiplier(), Some(2.0));
        assert_eq!(SpeedMode::Uncapped.multiplier(), None);
    }
}
