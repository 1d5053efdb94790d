//! Atari 7800 cartridge handling and banking
//!
//! Images optionally start with a 128-byte header carrying the signature
//! `ATARI7800` at offset 1. The header selects the banking scheme, whether a
//! POKEY sits on the cartridge bus, the controllers and the video region.
//! Headerless images are classified by size alone.
//!
//! Banking works by copying 16KB windows of the image into the shared
//! address space and marking them as cartridge-owned:
//! - Linear: up to 48K mapped at the top of memory, no banking
//! - SuperCart: last bank fixed at $C000, bank window at $8000
//! - SuperCart large: as SuperCart, plus bank 0 fixed at $4000
//! - SuperCart RAM: as SuperCart, with 16K of RAM at $4000
//! - SuperCart ROM: as SuperCart, with bank 6 fixed at $4000
//! - Absolute: two banks switched at $4000, 32K fixed at $8000
//! - Activision: 8K windows, bank window at $A000 selected by writes to $FF80+

use crate::address_space::AddressSpace;
use crate::region::Region;
use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HEADER_SIZE: usize = 128;
pub const BANK_SIZE: usize = 16 * 1024;

const SIGNATURE: &[u8] = b"ATARI7800";
const MAX_LINEAR_SIZE: usize = 48 * 1024;
const ABSOLUTE_SIZE: usize = 64 * 1024;
const ACTIVISION_SIZE: usize = 128 * 1024;
/// Smallest Activision image that contains every fixed window.
const ACTIVISION_MIN_SIZE: usize = 122_880;

/// Default horizontal blank length in CPU cycles.
pub const DEFAULT_HBLANK: u32 = 34;
/// Longest horizontal blank that still leaves part of the 454-cycle
/// MARIA scanline for DMA.
pub const MAX_HBLANK: u32 = 113;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("Cartridge image too small: {0} bytes")]
    Truncated(usize),
    #[error("Unsupported headerless image size: {0} bytes")]
    UnsupportedScheme(usize),
    #[error("Linear image too large: {0} bytes")]
    ImageTooLarge(usize),
    #[error("Horizontal blank of {0} CPU cycles does not fit in a scanline")]
    InvalidHblank(u32),
}

/// Banking scheme types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartridgeScheme {
    Linear,
    SuperCart,
    SuperCartLarge,
    SuperCartRam,
    SuperCartRom,
    Absolute,
    Activision,
}

impl CartridgeScheme {
    /// Whether the scheme has a switchable bank window.
    pub fn is_banked(self) -> bool {
        !matches!(self, CartridgeScheme::Linear)
    }

    /// Address of the switchable bank window.
    fn window_base(self) -> u16 {
        match self {
            CartridgeScheme::Absolute => 0x4000,
            CartridgeScheme::Activision => 0xA000,
            _ => 0x8000,
        }
    }
}

/// Controller declared by the header for one port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    None,
    #[default]
    Joystick,
    LightGun,
}

impl Controller {
    fn from_header(code: u8) -> Self {
        match code {
            0 => Controller::None,
            2 => Controller::LightGun,
            _ => Controller::Joystick,
        }
    }
}

/// Per-cartridge timing and device flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartridgeQuirks {
    pub pokey: bool,
    /// Honour WSYNC halts
    pub wsync: bool,
    /// Charge MARIA DMA time to the CPU
    pub cycle_stealing: bool,
    pub light_gun: bool,
    /// Horizontal blank in CPU cycles; MARIA DMA starts after it
    pub hblank: u32,
}

impl Default for CartridgeQuirks {
    fn default() -> Self {
        Self {
            pokey: false,
            wsync: true,
            cycle_stealing: true,
            light_gun: false,
            hblank: DEFAULT_HBLANK,
        }
    }
}

/// Atari 7800 cartridge
#[derive(Debug, Clone)]
pub struct Cartridge {
    /// Image contents without the header
    data: Vec<u8>,
    digest: String,
    title: String,
    scheme: CartridgeScheme,
    region: Region,
    controllers: [Controller; 2],
    pub quirks: CartridgeQuirks,
    bank: u8,
}

impl Cartridge {
    /// Parse a cartridge image
    pub fn load(image: &[u8]) -> Result<Self, CartridgeError> {
        if image.len() <= HEADER_SIZE {
            return Err(CartridgeError::Truncated(image.len()));
        }

        let digest = format!("{:x}", md5::compute(image));
        let cart = if &image[1..10] == SIGNATURE {
            Self::from_header(image, digest)
        } else {
            Self::headerless(image, digest)?
        };

        if cart.scheme == CartridgeScheme::Linear && cart.data.len() > MAX_LINEAR_SIZE {
            return Err(CartridgeError::ImageTooLarge(cart.data.len()));
        }

        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "Cartridge: \"{}\" {} bytes, {:?}, pokey={}, {:?}",
                cart.title,
                cart.data.len(),
                cart.scheme,
                cart.quirks.pokey,
                cart.region
            )
        });
        Ok(cart)
    }

    fn from_header(image: &[u8], digest: String) -> Self {
        let header = &image[..HEADER_SIZE];
        let data = image[HEADER_SIZE..].to_vec();
        let title = String::from_utf8_lossy(&header[17..49])
            .trim_end_matches(['\0', ' '])
            .to_string();
        let declared = u32::from_be_bytes([header[49], header[50], header[51], header[52]]);
        if declared as usize != data.len() {
            log(LogCategory::Cartridge, LogLevel::Warn, || {
                format!(
                    "Cartridge: header declares {} bytes but image holds {}",
                    declared,
                    data.len()
                )
            });
        }

        let scheme = match header[53] {
            1 => CartridgeScheme::Absolute,
            2 => CartridgeScheme::Activision,
            _ => {
                if data.len() > 128 * 1024 {
                    CartridgeScheme::SuperCartLarge
                } else {
                    match header[54] {
                        2 | 3 => CartridgeScheme::SuperCart,
                        4..=7 => CartridgeScheme::SuperCartRam,
                        8..=11 => CartridgeScheme::SuperCartRom,
                        _ => CartridgeScheme::Linear,
                    }
                }
            }
        };

        let controllers = [
            Controller::from_header(header[55]),
            Controller::from_header(header[56]),
        ];
        let quirks = CartridgeQuirks {
            pokey: header[54] & 1 != 0,
            light_gun: controllers.contains(&Controller::LightGun),
            ..CartridgeQuirks::default()
        };

        Self {
            data,
            digest,
            title,
            scheme,
            region: Region::from_header(header[57]),
            controllers,
            quirks,
            bank: 0,
        }
    }

    fn headerless(image: &[u8], digest: String) -> Result<Self, CartridgeError> {
        let scheme = match image.len() {
            len if len <= MAX_LINEAR_SIZE => CartridgeScheme::Linear,
            ABSOLUTE_SIZE => CartridgeScheme::Absolute,
            ACTIVISION_SIZE => CartridgeScheme::Activision,
            len => return Err(CartridgeError::UnsupportedScheme(len)),
        };
        Ok(Self {
            data: image.to_vec(),
            digest,
            title: String::new(),
            scheme,
            region: Region::Ntsc,
            controllers: [Controller::Joystick; 2],
            quirks: CartridgeQuirks::default(),
            bank: 0,
        })
    }

    /// Byte offset of a bank inside the image.
    ///
    /// Small SuperCart images only decode the low two bank bits.
    fn bank_offset(&self, bank: u8) -> usize {
        let small = self.data.len() <= ABSOLUTE_SIZE;
        match self.scheme {
            CartridgeScheme::SuperCart
            | CartridgeScheme::SuperCartRam
            | CartridgeScheme::SuperCartRom
                if small =>
            {
                (bank as usize & 3) * BANK_SIZE
            }
            _ => bank as usize * BANK_SIZE,
        }
    }

    fn window(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = (offset + len).min(self.data.len());
        &self.data[start..end]
    }

    /// Install the power-on windows for the scheme and select bank 0.
    pub fn store(&mut self, space: &mut AddressSpace) {
        let size = self.data.len();
        match self.scheme {
            CartridgeScheme::Linear => {
                space.install_overlay((0x10000 - size) as u16, &self.data);
            }
            CartridgeScheme::SuperCart
            | CartridgeScheme::SuperCartLarge
            | CartridgeScheme::SuperCartRam
            | CartridgeScheme::SuperCartRom => {
                let last = size.saturating_sub(BANK_SIZE);
                space.install_overlay(0xC000, self.window(last, BANK_SIZE));
                match self.scheme {
                    CartridgeScheme::SuperCartLarge => {
                        space.install_overlay(0x4000, self.window(0, BANK_SIZE));
                    }
                    CartridgeScheme::SuperCartRam => space.clear_overlay(0x4000, BANK_SIZE),
                    CartridgeScheme::SuperCartRom => {
                        let offset = self.bank_offset(6);
                        space.install_overlay(0x4000, self.window(offset, BANK_SIZE));
                    }
                    _ => {}
                }
            }
            CartridgeScheme::Absolute => {
                space.install_overlay(0x4000, self.window(0, BANK_SIZE));
                let offset = self.bank_offset(2);
                space.install_overlay(0x8000, self.window(offset, 2 * BANK_SIZE));
            }
            CartridgeScheme::Activision => {
                if size > ACTIVISION_MIN_SIZE {
                    space.install_overlay(0xA000, self.window(0, BANK_SIZE));
                    space.install_overlay(0x4000, self.window(106_496, 8192));
                    space.install_overlay(0x6000, self.window(98_304, 8192));
                    space.install_overlay(0x8000, self.window(122_880, 8192));
                    space.install_overlay(0xE000, self.window(114_688, 8192));
                }
            }
        }
        self.bank = 0;
    }

    /// Handle a CPU write to cartridge-owned memory.
    pub fn write(&mut self, space: &mut AddressSpace, addr: u16, data: u8) {
        match self.scheme {
            CartridgeScheme::SuperCart
            | CartridgeScheme::SuperCartRam
            | CartridgeScheme::SuperCartRom => {
                if (0x8000..0xC000).contains(&addr) && data < 9 {
                    self.switch_bank(space, data);
                }
            }
            CartridgeScheme::SuperCartLarge => {
                if (0x8000..0xC000).contains(&addr) && data < 9 {
                    self.switch_bank(space, data + 1);
                }
            }
            CartridgeScheme::Absolute => {
                if addr == 0x8000 && (data == 1 || data == 2) {
                    self.switch_bank(space, data - 1);
                }
            }
            CartridgeScheme::Activision => {
                if addr >= 0xFF80 {
                    self.switch_bank(space, (addr & 7) as u8);
                }
            }
            CartridgeScheme::Linear => {}
        }
    }

    /// Map `bank` into the scheme's bank window. Banks past the end of the
    /// image are ignored.
    pub fn switch_bank(&mut self, space: &mut AddressSpace, bank: u8) {
        let offset = self.bank_offset(bank);
        if offset >= self.data.len() {
            log(LogCategory::Cartridge, LogLevel::Debug, || {
                format!("Cartridge: bank {} out of range, ignored", bank)
            });
            return;
        }
        let base = self.scheme.window_base();
        space.install_overlay(base, self.window(offset, BANK_SIZE));
        self.bank = bank;
        log(LogCategory::Cartridge, LogLevel::Debug, || {
            format!("Cartridge: bank {} at {:04X}", bank, base)
        });
    }

    /// Apply compatibility-database overrides. Nothing changes when the
    /// overrides would leave the cartridge unusable.
    pub fn apply_overrides(
        &mut self,
        overrides: &crate::database::QuirkOverrides,
    ) -> Result<(), CartridgeError> {
        if overrides.scheme == Some(CartridgeScheme::Linear) && self.data.len() > MAX_LINEAR_SIZE {
            return Err(CartridgeError::ImageTooLarge(self.data.len()));
        }
        if let Some(hblank) = overrides.hblank.filter(|&h| h > MAX_HBLANK) {
            return Err(CartridgeError::InvalidHblank(hblank));
        }

        if let Some(title) = &overrides.title {
            self.title = title.clone();
        }
        if let Some(scheme) = overrides.scheme {
            self.scheme = scheme;
        }
        if let Some(region) = overrides.region {
            self.region = region;
        }
        if let Some(pokey) = overrides.pokey {
            self.quirks.pokey = pokey;
        }
        if let Some(wsync) = overrides.wsync {
            self.quirks.wsync = wsync;
        }
        if let Some(stealing) = overrides.cycle_stealing {
            self.quirks.cycle_stealing = stealing;
        }
        if let Some(light_gun) = overrides.light_gun {
            self.quirks.light_gun = light_gun;
        }
        if let Some(hblank) = overrides.hblank {
            self.quirks.hblank = hblank;
        }
        Ok(())
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn scheme(&self) -> CartridgeScheme {
        self.scheme
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn controllers(&self) -> [Controller; 2] {
        self.controllers
    }

    pub fn current_bank(&self) -> u8 {
        self.bank
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}
