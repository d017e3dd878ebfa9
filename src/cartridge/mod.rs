// Cartridge module - ROM image loading and address mapping
//
// This module handles SNES ROM images: stripping the 512-byte copier header
// some dumps carry, locating and parsing the internal cartridge header, and
// mapping CPU bus addresses into the ROM image for the two common cartridge
// layouts (LoROM and HiROM).
//
// # SNES Internal Header
//
// The internal header lives inside the ROM image itself, at $7FC0 for LoROM
// cartridges and $FFC0 for HiROM cartridges. The interesting fields:
//
// ```text
// +$00..+$14: Game title (21 bytes, space padded ASCII)
// +$25:       Map mode (bit 0 clear = LoROM, set = HiROM)
// +$27:       ROM size code (1024 << code bytes)
// +$28:       RAM size code (1024 << code bytes, 0 = none)
// +$29:       Region code
// +$2B:       Version
// +$2C/+$2D:  Checksum complement (little-endian)
// +$2E/+$2F:  Checksum (little-endian)
// ```
//
// A header is considered valid when `checksum XOR complement == 0xFFFF`.

use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

/// Offset of the internal header in a LoROM image
pub const LOROM_HEADER_OFFSET: usize = 0x7FC0;

/// Offset of the internal header in a HiROM image
pub const HIROM_HEADER_OFFSET: usize = 0xFFC0;

/// Size of the copier header prepended by some ROM dumping tools
const COPIER_HEADER_SIZE: usize = 512;

/// Errors that can occur while loading a ROM image
#[derive(Debug)]
pub enum RomError {
    /// I/O error while reading the ROM file
    Io(io::Error),

    /// The image is too small to contain an internal header
    TooSmall { size: usize },
}

impl std::fmt::Display for RomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RomError::Io(e) => write!(f, "I/O error: {}", e),
            RomError::TooSmall { size } => {
                write!(f, "ROM image too small ({} bytes)", size)
            }
        }
    }
}

impl std::error::Error for RomError {}

impl From<io::Error> for RomError {
    fn from(e: io::Error) -> Self {
        RomError::Io(e)
    }
}

/// Cartridge address mapping scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// LoROM: 32KB banks mapped at $8000-$FFFF of each bank
    LoRom,
    /// HiROM: 64KB banks mapped across the whole bank
    HiRom,
}

/// Cartridge region, decoded from header byte +$29
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Japan,
    Usa,
    Europe,
    Sweden,
    Finland,
    Denmark,
    France,
    Netherlands,
    Spain,
    Germany,
    Italy,
    China,
    Indonesia,
    SouthKorea,
    Unknown(u8),
}

impl Region {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Region::Japan,
            1 => Region::Usa,
            2 => Region::Europe,
            3 => Region::Sweden,
            4 => Region::Finland,
            5 => Region::Denmark,
            6 => Region::France,
            7 => Region::Netherlands,
            8 => Region::Spain,
            9 => Region::Germany,
            10 => Region::Italy,
            11 => Region::China,
            12 => Region::Indonesia,
            13 => Region::SouthKorea,
            other => Region::Unknown(other),
        }
    }
}

/// Parsed SNES internal header
#[derive(Debug, Clone)]
pub struct SnesHeader {
    /// Game title, filtered to printable ASCII and right-trimmed
    pub title: String,

    /// Mapping scheme claimed by the map-mode byte
    pub map_mode: MapMode,

    /// ROM size in bytes (1024 << code)
    pub rom_size: usize,

    /// Cartridge RAM size in bytes (0 when absent)
    pub ram_size: usize,

    /// Cartridge region
    pub region: Region,

    /// ROM version
    pub version: u8,

    /// Checksum complement (little-endian at +$2C)
    pub complement: u16,

    /// Checksum (little-endian at +$2E)
    pub checksum: u16,

    /// True when `checksum XOR complement == 0xFFFF`
    pub valid: bool,
}

impl SnesHeader {
    /// Parse the 48-byte internal header at `offset` in `rom`
    ///
    /// Returns `None` when the image is too small to hold a header at that
    /// offset. An invalid checksum pair does not fail the parse; it is
    /// reported through the `valid` field so mapping auto-detection can
    /// weigh both candidate headers.
    pub fn parse(rom: &[u8], offset: usize) -> Option<SnesHeader> {
        if rom.len() < offset + 0x30 {
            return None;
        }
        let header = &rom[offset..offset + 0x30];

        let title: String = header[0x00..0x15]
            .iter()
            .map(|&b| b as char)
            .filter(|c| (' '..='~').contains(c))
            .collect();
        let title = title.trim_end().to_string();

        let map_mode = if header[0x25] & 0x01 == 0 {
            MapMode::LoRom
        } else {
            MapMode::HiRom
        };

        let rom_size = 1024usize << (header[0x27] & 0x0F) as usize;
        let ram_size = match header[0x28] & 0x0F {
            0 => 0,
            code => 1024usize << code as usize,
        };

        let complement = u16::from_le_bytes([header[0x2C], header[0x2D]]);
        let checksum = u16::from_le_bytes([header[0x2E], header[0x2F]]);

        Some(SnesHeader {
            title,
            map_mode,
            rom_size,
            ram_size,
            region: Region::from_code(header[0x29]),
            version: header[0x2B],
            complement,
            checksum,
            valid: checksum ^ complement == 0xFFFF,
        })
    }
}

/// A loaded SNES cartridge
///
/// Holds the ROM image (copier header already stripped), the parsed internal
/// header, and the detected mapping scheme. Bus reads are directed through
/// [`Cartridge::read`], which applies the LoROM/HiROM address math.
#[derive(Debug)]
pub struct Cartridge {
    /// ROM image with any copier header removed
    pub rom: Vec<u8>,

    /// Parsed internal header (from the side selected by mapping detection)
    pub header: SnesHeader,

    /// Detected address mapping
    pub mapping: MapMode,
}

impl Cartridge {
    /// Load a cartridge from a raw ROM image
    ///
    /// Strips a 512-byte copier header when the image length mod 1024 is
    /// 512, then detects the mapping scheme:
    ///
    /// 1. Parse candidate headers at $7FC0 (LoROM) and $FFC0 (HiROM).
    /// 2. Prefer the side whose checksum/complement pair validates.
    /// 3. If both or neither validate, pick HiROM when the image is larger
    ///    than 2 MiB, LoROM otherwise.
    ///
    /// # Arguments
    /// * `data` - Raw ROM file contents
    ///
    /// # Errors
    /// Returns [`RomError::TooSmall`] when the image cannot contain a LoROM
    /// header. Header invalidity alone is not an error; the fallback
    /// detection rule applies and the header's `valid` flag records it.
    pub fn from_bytes(data: &[u8]) -> Result<Cartridge, RomError> {
        let rom: Vec<u8> = if data.len() % 1024 == COPIER_HEADER_SIZE {
            info!("stripping {} byte copier header", COPIER_HEADER_SIZE);
            data[COPIER_HEADER_SIZE..].to_vec()
        } else {
            data.to_vec()
        };

        if rom.len() < LOROM_HEADER_OFFSET + 0x30 {
            return Err(RomError::TooSmall { size: rom.len() });
        }

        let lo = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET);
        let hi = SnesHeader::parse(&rom, HIROM_HEADER_OFFSET);

        let lo_valid = lo.as_ref().map(|h| h.valid).unwrap_or(false);
        let hi_valid = hi.as_ref().map(|h| h.valid).unwrap_or(false);

        let mapping = match (lo_valid, hi_valid) {
            (true, false) => MapMode::LoRom,
            (false, true) => MapMode::HiRom,
            // Both or neither: fall back on image size
            _ => {
                if rom.len() > 2 * 1024 * 1024 {
                    MapMode::HiRom
                } else {
                    MapMode::LoRom
                }
            }
        };

        let header = match mapping {
            MapMode::LoRom => lo.or(hi),
            MapMode::HiRom => hi.or(lo),
        }
        .ok_or(RomError::TooSmall { size: rom.len() })?;

        if !header.valid {
            warn!(
                "no valid internal header, assuming {:?} from image size",
                mapping
            );
        } else {
            info!(
                "loaded \"{}\" ({:?}, {} bytes, region {:?})",
                header.title,
                mapping,
                rom.len(),
                header.region
            );
        }

        Ok(Cartridge {
            rom,
            header,
            mapping,
        })
    }

    /// Load a cartridge from a ROM file on disk
    ///
    /// # Arguments
    /// * `path` - Path to the ROM file (.sfc/.smc)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Cartridge, RomError> {
        let data = fs::read(path)?;
        Cartridge::from_bytes(&data)
    }

    /// Read a byte through the cartridge mapping
    ///
    /// Translates a bus `bank`/`offset` pair into a ROM image offset:
    ///
    /// - LoROM: `((bank & 0x7F) << 15) | (offset & 0x7FFF)`, only valid when
    ///   `offset >= 0x8000`
    /// - HiROM: `((bank & 0x3F) << 16) | offset`
    ///
    /// The effective address is reduced modulo the ROM size. Addresses a
    /// LoROM cartridge does not decode read as 0xFF (open-bus stub).
    pub fn read(&self, bank: u8, offset: u16) -> u8 {
        let effective = match self.mapping {
            MapMode::LoRom => {
                if offset < 0x8000 {
                    return 0xFF;
                }
                (((bank as usize) & 0x7F) << 15) | ((offset as usize) & 0x7FFF)
            }
            MapMode::HiRom => (((bank as usize) & 0x3F) << 16) | offset as usize,
        };
        self.rom[effective % self.rom.len()]
    }

    /// Verify the global checksum: the sum of all ROM bytes modulo 0x10000
    /// must equal the header checksum
    pub fn verify_global_checksum(&self) -> bool {
        let sum: u32 = self
            .rom
            .iter()
            .fold(0u32, |acc, &b| (acc + b as u32) & 0xFFFF);
        sum as u16 == self.header.checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal LoROM image with a valid header
    fn lorom_image(size: usize) -> Vec<u8> {
        let mut rom = vec![0u8; size];
        rom[LOROM_HEADER_OFFSET..LOROM_HEADER_OFFSET + 21]
            .copy_from_slice(b"TEST CARTRIDGE       ");
        rom[LOROM_HEADER_OFFSET + 0x25] = 0x20; // LoROM, slow
        rom[LOROM_HEADER_OFFSET + 0x27] = 0x08; // 256KB
        rom[LOROM_HEADER_OFFSET + 0x29] = 0x01; // USA
        rom[LOROM_HEADER_OFFSET + 0x2C] = 0xAA;
        rom[LOROM_HEADER_OFFSET + 0x2D] = 0xAA;
        rom[LOROM_HEADER_OFFSET + 0x2E] = 0x55;
        rom[LOROM_HEADER_OFFSET + 0x2F] = 0x55;
        rom
    }

    // ========================================
    // Header Parsing Tests
    // ========================================

    #[test]
    fn test_header_checksum_validity() {
        let rom = lorom_image(0x100000);
        let header = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET).unwrap();
        assert!(header.valid, "0x5555 ^ 0xAAAA == 0xFFFF should validate");
        assert_eq!(header.checksum, 0x5555);
        assert_eq!(header.complement, 0xAAAA);
    }

    #[test]
    fn test_header_title_trimmed() {
        let rom = lorom_image(0x100000);
        let header = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET).unwrap();
        assert_eq!(header.title, "TEST CARTRIDGE");
    }

    #[test]
    fn test_header_title_filters_non_printable() {
        let mut rom = lorom_image(0x100000);
        rom[LOROM_HEADER_OFFSET] = 0x01; // control character
        let header = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET).unwrap();
        assert_eq!(header.title, "EST CARTRIDGE");
    }

    #[test]
    fn test_header_sizes_and_region() {
        let rom = lorom_image(0x100000);
        let header = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET).unwrap();
        assert_eq!(header.rom_size, 1024 << 8);
        assert_eq!(header.ram_size, 0);
        assert_eq!(header.region, Region::Usa);
    }

    #[test]
    fn test_header_invalid_checksum() {
        let mut rom = lorom_image(0x100000);
        rom[LOROM_HEADER_OFFSET + 0x2E] = 0x00;
        let header = SnesHeader::parse(&rom, LOROM_HEADER_OFFSET).unwrap();
        assert!(!header.valid);
    }

    #[test]
    fn test_header_too_small() {
        assert!(SnesHeader::parse(&[0u8; 64], LOROM_HEADER_OFFSET).is_none());
    }

    // ========================================
    // Mapping Detection Tests
    // ========================================

    #[test]
    fn test_detect_lorom_from_valid_header() {
        // 1 MiB image, complement 0xAAAA / checksum 0x5555
        let rom = lorom_image(0x100000);
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapping, MapMode::LoRom);
        assert!(cart.header.valid);
        assert_eq!(cart.rom.len(), 0x100000);
    }

    #[test]
    fn test_detect_hirom_from_valid_header() {
        let mut rom = vec![0u8; 0x100000];
        rom[HIROM_HEADER_OFFSET + 0x25] = 0x21; // HiROM
        rom[HIROM_HEADER_OFFSET + 0x2C] = 0xFF;
        rom[HIROM_HEADER_OFFSET + 0x2D] = 0x0F;
        rom[HIROM_HEADER_OFFSET + 0x2E] = 0x00;
        rom[HIROM_HEADER_OFFSET + 0x2F] = 0xF0;
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapping, MapMode::HiRom);
    }

    #[test]
    fn test_detect_fallback_small_image_is_lorom() {
        // No valid header on either side, 1 MiB -> LoROM
        let rom = vec![0u8; 0x100000];
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapping, MapMode::LoRom);
        assert!(!cart.header.valid);
    }

    #[test]
    fn test_detect_fallback_large_image_is_hirom() {
        // No valid header on either side, 4 MiB -> HiROM
        let rom = vec![0u8; 0x400000];
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapping, MapMode::HiRom);
    }

    #[test]
    fn test_copier_header_stripped() {
        let mut data = vec![0u8; COPIER_HEADER_SIZE];
        data.extend_from_slice(&lorom_image(0x80000));
        let cart = Cartridge::from_bytes(&data).unwrap();
        assert_eq!(cart.rom.len(), 0x80000);
        assert!(cart.header.valid, "header should parse after stripping");
    }

    #[test]
    fn test_too_small_image_rejected() {
        let err = Cartridge::from_bytes(&[0u8; 1024]).unwrap_err();
        assert!(matches!(err, RomError::TooSmall { .. }));
    }

    // ========================================
    // Address Mapping Tests
    // ========================================

    #[test]
    fn test_lorom_read_maps_upper_half() {
        let mut rom = lorom_image(0x100000);
        rom[0x0000] = 0x11; // bank $00 $8000
        rom[0x7FFF] = 0x22; // bank $00 $FFFF
        rom[0x8000] = 0x33; // bank $01 $8000
        let cart = Cartridge::from_bytes(&rom).unwrap();

        assert_eq!(cart.read(0x00, 0x8000), 0x11);
        assert_eq!(cart.read(0x00, 0xFFFF), 0x22);
        assert_eq!(cart.read(0x01, 0x8000), 0x33);
        // Mirror banks $80+
        assert_eq!(cart.read(0x80, 0x8000), 0x11);
    }

    #[test]
    fn test_lorom_read_lower_half_is_open_bus() {
        let rom = lorom_image(0x100000);
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.read(0x40, 0x0000), 0xFF);
    }

    #[test]
    fn test_hirom_read_maps_full_bank() {
        let mut rom = vec![0u8; 0x400000];
        rom[0x0000] = 0x44;
        rom[0x10000] = 0x55;
        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert_eq!(cart.mapping, MapMode::HiRom);
        assert_eq!(cart.read(0xC0, 0x0000), 0x44);
        assert_eq!(cart.read(0xC1, 0x0000), 0x55);
        // Bank is masked with 0x3F
        assert_eq!(cart.read(0x00, 0x0000), 0x44);
    }

    #[test]
    fn test_read_wraps_modulo_rom_size() {
        let rom = lorom_image(0x80000); // 512KB
        let cart = Cartridge::from_bytes(&rom).unwrap();
        // Bank $20 maps past the image; it must wrap to bank $00
        assert_eq!(
            cart.read(0x20, 0x8000),
            cart.read(0x00, 0x8000),
            "effective address should reduce modulo ROM size"
        );
    }

    #[test]
    fn test_global_checksum() {
        let mut rom = lorom_image(0x100000);
        // The checksum and its complement bytes always sum to 0x1FE, so the
        // stored checksum can be solved for directly.
        for i in 0..4 {
            rom[LOROM_HEADER_OFFSET + 0x2C + i] = 0;
        }
        let base: u32 = rom.iter().fold(0u32, |acc, &b| (acc + b as u32) & 0xFFFF);
        let checksum = ((base + 0x1FE) & 0xFFFF) as u16;
        let complement = !checksum;
        rom[LOROM_HEADER_OFFSET + 0x2C..LOROM_HEADER_OFFSET + 0x2E]
            .copy_from_slice(&complement.to_le_bytes());
        rom[LOROM_HEADER_OFFSET + 0x2E..LOROM_HEADER_OFFSET + 0x30]
            .copy_from_slice(&checksum.to_le_bytes());

        let cart = Cartridge::from_bytes(&rom).unwrap();
        assert!(cart.header.valid);
        assert!(cart.verify_global_checksum());
    }
}
