//! Atari 7800 memory bus implementation
//!
//! All chips share one 64KB address space:
//! $0000-$001F: TIA registers (INPTCTRL, INPT0-5, audio)
//! $0020-$003F: MARIA registers
//! $0040-$00FF, $0140-$01FF: RAM, mirrored at $2040 and $2140
//! $0280-$029F: RIOT ports and timer
//! $1800-$27FF: RAM
//! $4000-$FFFF: cartridge (a POKEY may sit at $4000-$400F)
//!
//! Registers with side effects are decoded here; everything else falls
//! through to the address space, with writes to cartridge-owned memory
//! routed to the mapper.

use emu_core::apu::{AudioChip, PolyTables};
use emu_core::cpu_6502::Memory6502;
use emu_core::logging::{log, LogCategory, LogLevel};
use std::sync::Arc;

use crate::address_space::AddressSpace;
use crate::cartridge::{Cartridge, CartridgeQuirks};
use crate::maria::WSYNC;
use crate::pokey::{Pokey, POKEY_BASE, RANDOM};
use crate::region::Region;
use crate::riot::{Riot, INTFLG, INTIM, SWCHA, SWCHB};
use crate::tia::{TiaSound, AUDC0, AUDV1};

pub const INPTCTRL: u16 = 0x01;
const INPT0: u16 = 0x08;
const INPT5: u16 = 0x0D;
/// INPTCTRL value that locks the cartridge in and the BIOS out
const CARTRIDGE_ENABLE: u8 = 0x16;

/// Where an access lands after register decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Pokey,
    Cartridge,
    InputControl,
    Inputs,
    Wsync,
    TiaSound,
    PortA,
    PortB,
    TimerCount,
    TimerFlag,
    TimerStart,
    Ram,
}

/// Atari 7800 memory bus
#[derive(Debug)]
pub struct Atari7800Bus {
    pub space: AddressSpace,
    pub cartridge: Option<Cartridge>,
    pub riot: Riot,
    pub tia: TiaSound,
    pub pokey: Option<Pokey>,
    polys: Arc<PolyTables>,
    sample_rate: u32,
    wsync_request: bool,
}

impl Atari7800Bus {
    pub fn new(region: Region) -> Self {
        let polys = PolyTables::shared();
        let sample_rate = region.sample_rate();
        Self {
            space: AddressSpace::new(),
            cartridge: None,
            riot: Riot::new(),
            tia: TiaSound::new(Arc::clone(&polys), sample_rate),
            pokey: None,
            polys,
            sample_rate,
            wsync_request: false,
        }
    }

    /// Insert a cartridge. Its windows are installed on the next reset.
    pub fn load_cartridge(&mut self, cartridge: Cartridge) {
        let region = cartridge.region();
        self.sample_rate = region.sample_rate();
        self.tia = TiaSound::new(Arc::clone(&self.polys), self.sample_rate);
        self.pokey = cartridge
            .quirks
            .pokey
            .then(|| Pokey::new(Arc::clone(&self.polys), self.sample_rate));
        log(LogCategory::Sound, LogLevel::Debug, || {
            format!(
                "Sound: TIA at {} Hz, POKEY {}",
                self.sample_rate,
                if self.pokey.is_some() { "attached" } else { "absent" }
            )
        });
        self.cartridge = Some(cartridge);
    }

    pub fn eject_cartridge(&mut self) -> Option<Cartridge> {
        self.pokey = None;
        self.cartridge.take()
    }

    /// Power-on state: clear memory and chips, then map the cartridge.
    pub fn reset(&mut self) {
        self.space.reset();
        self.riot.reset();
        self.tia.reset();
        if let Some(pokey) = &mut self.pokey {
            pokey.reset();
        }
        self.wsync_request = false;
        if let Some(cart) = &mut self.cartridge {
            cart.store(&mut self.space);
        }
    }

    pub fn quirks(&self) -> CartridgeQuirks {
        self.cartridge
            .as_ref()
            .map(|cart| cart.quirks)
            .unwrap_or_default()
    }

    /// Check if WSYNC was requested and clear the flag
    pub fn take_wsync_request(&mut self) -> bool {
        let requested = self.wsync_request;
        self.wsync_request = false;
        requested
    }

    /// Advance the RIOT timer by `cycles` CPU cycles.
    pub fn advance_timer(&mut self, cycles: u32) {
        self.riot.advance_timer(&mut self.space, cycles);
    }

    fn decode(&self, addr: u16) -> Target {
        if self.pokey.is_some() && (POKEY_BASE..=POKEY_BASE + 0x0F).contains(&addr) {
            return Target::Pokey;
        }
        if self.space.is_overlay(addr) {
            return Target::Cartridge;
        }
        match addr {
            INPTCTRL => Target::InputControl,
            INPT0..=INPT5 => Target::Inputs,
            WSYNC => Target::Wsync,
            AUDC0..=AUDV1 => Target::TiaSound,
            SWCHA => Target::PortA,
            SWCHB => Target::PortB,
            0x284 | 0x286 => Target::TimerCount,
            0x285 | 0x287 => Target::TimerFlag,
            0x294..=0x297 | 0x29C..=0x29F => Target::TimerStart,
            _ => Target::Ram,
        }
    }

    fn store_ram(&mut self, addr: u16, val: u8) {
        self.space.write_byte(addr, val);
        match addr {
            0x2040..=0x20FF | 0x2140..=0x21FF => self.space.write_byte(addr - 0x2000, val),
            0x0040..=0x00FF | 0x0140..=0x01FF => self.space.write_byte(addr + 0x2000, val),
            _ => {}
        }
    }
}

impl Memory6502 for Atari7800Bus {
    fn read(&mut self, addr: u16) -> u8 {
        match self.decode(addr) {
            Target::Pokey if addr == RANDOM => self.peek(addr),
            Target::TimerCount => {
                let flag = self.space.read_byte(INTFLG);
                self.space.write_byte(INTFLG, flag & 0x7F);
                self.space.read_byte(INTIM)
            }
            Target::TimerFlag => {
                let flag = self.space.read_byte(INTFLG);
                self.space.write_byte(INTFLG, flag & 0x7F);
                flag
            }
            _ => self.space.read_byte(addr),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match self.decode(addr) {
            Target::Pokey => {
                if let Some(pokey) = &mut self.pokey {
                    pokey.write_register(addr, val);
                }
            }
            Target::Cartridge => {
                if let Some(cart) = &mut self.cartridge {
                    cart.write(&mut self.space, addr, val);
                }
            }
            Target::InputControl => {
                if val == CARTRIDGE_ENABLE {
                    if let Some(cart) = &mut self.cartridge {
                        cart.store(&mut self.space);
                    }
                }
            }
            Target::Inputs => {}
            Target::Wsync => {
                if self.quirks().wsync {
                    self.wsync_request = true;
                }
            }
            Target::TiaSound => self.tia.write_register(addr, val),
            Target::PortA => self.riot.set_output_latch_a(&mut self.space, val),
            Target::PortB => self.riot.set_output_latch_b(&mut self.space, val),
            Target::TimerStart => self.riot.start_timer(&mut self.space, addr, val),
            Target::TimerCount | Target::TimerFlag | Target::Ram => self.store_ram(addr, val),
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        match self.decode(addr) {
            Target::Pokey if addr == RANDOM => self
                .pokey
                .as_ref()
                .map_or(0, |pokey| pokey.read_register(addr)),
            _ => self.space.read_byte(addr),
        }
    }
}
