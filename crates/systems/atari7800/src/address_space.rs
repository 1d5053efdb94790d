//! Flat 64KB memory with a parallel cartridge-overlay map.
//!
//! Every address is owned either by RAM or by the cartridge mapping. Overlay
//! addresses hold cartridge contents; the bus forwards CPU writes to them to
//! the cartridge mapper instead of storing them. Memory-mapped registers are
//! decoded by the bus before an access ever reaches this array.

use emu_core::logging::{log, LogCategory, LogLevel};

pub const ADDRESS_SPACE_SIZE: usize = 0x10000;

/// First address owned by the cartridge after a reset.
pub const CARTRIDGE_BASE: u16 = 0x4000;

#[derive(Debug, Clone)]
pub struct AddressSpace {
    bytes: Vec<u8>,
    overlay: Vec<bool>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressSpace {
    pub fn new() -> Self {
        let mut space = Self {
            bytes: vec![0; ADDRESS_SPACE_SIZE],
            overlay: vec![false; ADDRESS_SPACE_SIZE],
        };
        space.reset();
        space
    }

    /// Zero all bytes and hand the region from 0x4000 up to the cartridge.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        let split = CARTRIDGE_BASE as usize;
        self.overlay[..split].fill(false);
        self.overlay[split..].fill(true);
    }

    #[inline]
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    /// Store a byte regardless of ownership.
    #[inline]
    pub fn write_byte(&mut self, addr: u16, val: u8) {
        self.bytes[addr as usize] = val;
    }

    #[inline]
    pub fn is_overlay(&self, addr: u16) -> bool {
        self.overlay[addr as usize]
    }

    /// Map `source` at `addr` as cartridge-owned memory.
    ///
    /// A window that would run past the top of the address space is ignored
    /// as a whole.
    pub fn install_overlay(&mut self, addr: u16, source: &[u8]) {
        let start = addr as usize;
        let end = start + source.len();
        if end > ADDRESS_SPACE_SIZE {
            log(LogCategory::Bus, LogLevel::Debug, || {
                format!(
                    "Bus: overlay of {} bytes at {:04X} exceeds the address space",
                    source.len(),
                    addr
                )
            });
            return;
        }
        self.bytes[start..end].copy_from_slice(source);
        self.overlay[start..end].fill(true);
    }

    /// Return a window to RAM ownership and zero it.
    pub fn clear_overlay(&mut self, addr: u16, len: usize) {
        let start = addr as usize;
        let end = (start + len).min(ADDRESS_SPACE_SIZE);
        self.bytes[start..end].fill(0);
        self.overlay[start..end].fill(false);
    }

    pub fn slice(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        &self.bytes[start..(start + len).min(ADDRESS_SPACE_SIZE)]
    }

    pub fn slice_mut(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let start = addr as usize;
        &mut self.bytes[start..(start + len).min(ADDRESS_SPACE_SIZE)]
    }
}
