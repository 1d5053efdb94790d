//! Atari 7800 ProSystem implementation

#![allow(clippy::upper_case_acronyms)]

pub mod address_space;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod database;
pub mod input;
pub mod maria;
pub mod palette;
pub mod pokey;
pub mod region;
pub mod riot;
pub mod save_state;
pub mod scheduler;
pub mod tia;

use bus::Atari7800Bus;
use cartridge::{Cartridge, CartridgeError, CartridgeScheme};
use cpu::Atari7800Cpu;
use database::{CompatibilityDatabase, DatabaseError};
use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::{types::Frame, MountPointInfo, System};
use maria::{Maria, FRAME_WIDTH};
use palette::Palette;
use save_state::{SaveState, SaveStateError};
use scheduler::Scheduler;
use serde::Serialize;
use thiserror::Error;

pub use input::{ConsoleSwitches, InputSnapshot, JoystickState, LightGun};
pub use region::Region;

const CARTRIDGE_SLOT: &str = "Cartridge";

#[derive(Debug, Error)]
pub enum Atari7800Error {
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("Save state error: {0}")]
    SaveState(#[from] SaveStateError),
    #[error("Compatibility database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
}

/// Atari 7800 system
pub struct Atari7800System {
    cpu: Atari7800Cpu,
    maria: Maria,
    scheduler: Scheduler,
    region: Region,
    palette: Palette,
    database: CompatibilityDatabase,
    input: InputSnapshot,
}

impl Default for Atari7800System {
    fn default() -> Self {
        Self::new()
    }
}

impl Atari7800System {
    /// Create a new Atari 7800 system with no cartridge
    pub fn new() -> Self {
        let region = Region::default();
        Self {
            cpu: Atari7800Cpu::new(Atari7800Bus::new(region)),
            maria: Maria::new(region),
            scheduler: Scheduler::new(),
            region,
            palette: Palette::new(),
            database: CompatibilityDatabase::new(),
            input: InputSnapshot::default(),
        }
    }

    /// Use `database` for cartridges mounted from now on.
    pub fn set_database(&mut self, database: CompatibilityDatabase) {
        self.database = database;
    }

    /// Controller and console switch state used by `step_frame`.
    pub fn set_input(&mut self, input: InputSnapshot) {
        self.input = input;
    }

    /// Emulate one frame with the given controls.
    pub fn execute_frame(&mut self, input: &InputSnapshot) {
        self.scheduler
            .execute_frame(&mut self.cpu, &mut self.maria, self.region, input);
    }

    /// Color indices for the display area, `FRAME_WIDTH` per line.
    pub fn framebuffer(&self) -> &[u8] {
        self.maria.framebuffer()
    }

    /// The visible area of the last frame as ARGB pixels.
    pub fn frame(&self) -> Frame {
        let display = self.region.display_area();
        let visible = self.region.visible_area();
        let mut frame = Frame::new(FRAME_WIDTH as u32, visible.height());

        let start = (visible.top - display.top) as usize * FRAME_WIDTH;
        let indices = &self.maria.framebuffer()[start..start + frame.pixels.len()];
        for (pixel, &index) in frame.pixels.iter_mut().zip(indices) {
            *pixel = self.palette.argb(index);
        }
        frame
    }

    /// Unsigned 8-bit mono samples of the last frame.
    pub fn audio_samples(&self) -> &[u8] {
        self.scheduler.audio()
    }

    pub fn sample_rate(&self) -> u32 {
        self.region.sample_rate()
    }

    /// Frames since the counter last wrapped (it wraps once per second).
    pub fn frame_counter(&self) -> u32 {
        self.scheduler.frame()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Get debug information
    pub fn debug_info(&self) -> Option<DebugInfo> {
        self.cpu.bus().cartridge.as_ref().map(|cart| DebugInfo {
            title: cart.title().to_string(),
            digest: cart.digest().to_string(),
            rom_size: cart.size(),
            scheme: cart.scheme(),
            current_bank: cart.current_bank(),
            region: cart.region(),
            pokey: cart.quirks.pokey,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub title: String,
    pub digest: String,
    pub rom_size: usize,
    pub scheme: CartridgeScheme,
    pub current_bank: u8,
    pub region: Region,
    pub pokey: bool,
}

impl System for Atari7800System {
    type Error = Atari7800Error;

    fn reset(&mut self) {
        self.cpu.bus_mut().reset();
        self.maria.reset();
        let cycles = self.cpu.reset();
        self.scheduler.reset(cycles << 2);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        let input = self.input;
        self.execute_frame(&input);
        Ok(self.frame())
    }

    fn save_state(&self) -> Result<Vec<u8>, Self::Error> {
        Ok(SaveState::capture(&self.cpu)?.encode())
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let cart = self
            .cpu
            .bus()
            .cartridge
            .as_ref()
            .ok_or(Atari7800Error::NoCartridge)?;
        let decoded = SaveState::decode(data, cart.scheme() == CartridgeScheme::SuperCartRam)
            .and_then(|state| {
                if state.digest == cart.digest() {
                    Ok(state)
                } else {
                    Err(SaveStateError::DigestMismatch)
                }
            });
        let state = match decoded {
            Ok(state) => state,
            Err(err) => {
                log(LogCategory::SaveState, LogLevel::Warn, || {
                    format!("SaveState: load rejected: {}", err)
                });
                return Err(err.into());
            }
        };

        state.apply(&mut self.cpu)?;
        log(LogCategory::SaveState, LogLevel::Info, || {
            format!("SaveState: loaded version {} state", state.version)
        });
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_SLOT.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["a78".to_string(), "bin".to_string()],
            required: true,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_SLOT {
            return Err(Atari7800Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }

        let mut cartridge = Cartridge::load(data)?;
        if let Some(overrides) = self.database.lookup(cartridge.digest()) {
            cartridge.apply_overrides(overrides)?;
            log(LogCategory::Cartridge, LogLevel::Info, || {
                format!(
                    "Cartridge: database entry applied for {} ({:?})",
                    cartridge.digest(),
                    cartridge.scheme()
                )
            });
        }

        self.region = cartridge.region();
        self.maria.set_region(self.region);
        self.cpu.bus_mut().load_cartridge(cartridge);
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_SLOT {
            return Err(Atari7800Error::InvalidMountPoint(
                mount_point_id.to_string(),
            ));
        }

        self.cpu.bus_mut().eject_cartridge();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_SLOT && self.cpu.bus().cartridge.is_some()
    }
}
