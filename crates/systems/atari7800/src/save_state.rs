//! Binary save states
//!
//! ```text
//! offset  size  field
//! 0       16    "PRO-SYSTEM STATE"
//! 16      1     version (1 or 2)
//! 17      4     reserved, zero
//! 21      32    cartridge digest, lowercase hex
//! 53      7     A X Y P S PCL PCH
//! 60      1     cartridge bank
//! 61      16K   RAM $0000-$3FFF
//! ...     16K   RAM $4000-$7FFF (SuperCart RAM cartridges only)
//! ...     8     version 2: DRA DRB timing timer-register(LE) intervals clocks(LE)
//! ```
//!
//! Cartridge contents are never stored; the digest ties a state to the
//! image it was taken from.

use thiserror::Error;

use crate::cartridge::CartridgeScheme;
use crate::cpu::{Atari7800Cpu, CpuRegisters};
use crate::riot::RiotSnapshot;

pub const MAGIC: &[u8; 16] = b"PRO-SYSTEM STATE";
pub const CURRENT_VERSION: u8 = 2;

const DIGEST_SIZE: usize = 32;
const RAM_SIZE: usize = 0x4000;
const HEADER_SIZE: usize = 16 + 1 + 4 + DIGEST_SIZE;
const REGISTERS_SIZE: usize = 7 + 1;
const RIOT_SIZE: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SaveStateError {
    #[error("Invalid save state length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("Not a save state")]
    BadMagic,
    #[error("Unsupported save state version {0}")]
    UnsupportedVersion(u8),
    #[error("Save state belongs to a different cartridge")]
    DigestMismatch,
    #[error("No cartridge loaded")]
    NoCartridge,
}

/// Decoded contents of a save state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub version: u8,
    pub digest: String,
    pub registers: CpuRegisters,
    pub bank: u8,
    /// $0000-$3FFF
    pub ram: Vec<u8>,
    /// $4000-$7FFF for SuperCart RAM cartridges
    pub cartridge_ram: Option<Vec<u8>>,
    /// Present from version 2
    pub riot: Option<RiotSnapshot>,
}

/// Total size of a state of `version`.
pub fn expected_size(version: u8, cartridge_ram: bool) -> usize {
    let mut size = HEADER_SIZE + REGISTERS_SIZE + RAM_SIZE;
    if cartridge_ram {
        size += RAM_SIZE;
    }
    if version >= 2 {
        size += RIOT_SIZE;
    }
    size
}

impl SaveState {
    /// Snapshot the running machine.
    pub fn capture(cpu: &Atari7800Cpu) -> Result<Self, SaveStateError> {
        let bus = cpu.bus();
        let cart = bus.cartridge.as_ref().ok_or(SaveStateError::NoCartridge)?;
        let cartridge_ram = (cart.scheme() == CartridgeScheme::SuperCartRam)
            .then(|| bus.space.slice(0x4000, RAM_SIZE).to_vec());
        Ok(Self {
            version: CURRENT_VERSION,
            digest: cart.digest().to_string(),
            registers: cpu.registers(),
            bank: cart.current_bank(),
            ram: bus.space.slice(0x0000, RAM_SIZE).to_vec(),
            cartridge_ram,
            riot: Some(bus.riot.snapshot()),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(expected_size(self.version, self.cartridge_ram.is_some()));
        out.extend_from_slice(MAGIC);
        out.push(self.version);
        out.extend_from_slice(&[0; 4]);

        let mut digest = [0u8; DIGEST_SIZE];
        let len = self.digest.len().min(DIGEST_SIZE);
        digest[..len].copy_from_slice(&self.digest.as_bytes()[..len]);
        out.extend_from_slice(&digest);

        let r = &self.registers;
        let [pcl, pch] = r.pc.to_le_bytes();
        out.extend_from_slice(&[r.a, r.x, r.y, r.p, r.s, pcl, pch, self.bank]);
        out.extend_from_slice(&self.ram);
        if let Some(ram) = &self.cartridge_ram {
            out.extend_from_slice(ram);
        }
        if let Some(riot) = &self.riot {
            out.push(riot.dra);
            out.push(riot.drb);
            out.push(riot.timing as u8);
            out.extend_from_slice(&riot.timer_register.to_le_bytes());
            out.push(riot.intervals);
            out.extend_from_slice(&riot.clocks.to_le_bytes());
        }
        out
    }

    /// Parse a state for a cartridge with (`cartridge_ram`) or without
    /// SuperCart RAM.
    pub fn decode(data: &[u8], cartridge_ram: bool) -> Result<Self, SaveStateError> {
        if data.len() < HEADER_SIZE {
            return Err(SaveStateError::InvalidLength {
                expected: expected_size(CURRENT_VERSION, cartridge_ram),
                actual: data.len(),
            });
        }
        if &data[..16] != MAGIC {
            return Err(SaveStateError::BadMagic);
        }
        let version = data[16];
        let has_riot = match version {
            1 => false,
            2 => true,
            other => return Err(SaveStateError::UnsupportedVersion(other)),
        };
        let expected = expected_size(version, cartridge_ram);
        if data.len() != expected {
            return Err(SaveStateError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }

        let digest = String::from_utf8_lossy(&data[21..21 + DIGEST_SIZE])
            .trim_end_matches('\0')
            .to_string();
        let mut pos = HEADER_SIZE;
        let regs = &data[pos..pos + REGISTERS_SIZE];
        let registers = CpuRegisters {
            a: regs[0],
            x: regs[1],
            y: regs[2],
            p: regs[3],
            s: regs[4],
            pc: u16::from_le_bytes([regs[5], regs[6]]),
        };
        let bank = regs[7];
        pos += REGISTERS_SIZE;

        let ram = data[pos..pos + RAM_SIZE].to_vec();
        pos += RAM_SIZE;
        let cartridge_ram = if cartridge_ram {
            let ram = data[pos..pos + RAM_SIZE].to_vec();
            pos += RAM_SIZE;
            Some(ram)
        } else {
            None
        };

        let riot = has_riot.then(|| {
            let r = &data[pos..pos + RIOT_SIZE];
            RiotSnapshot {
                dra: r[0],
                drb: r[1],
                timing: r[2] != 0,
                timer_register: u16::from_le_bytes([r[3], r[4]]),
                intervals: r[5],
                clocks: u16::from_le_bytes([r[6], r[7]]),
            }
        });

        Ok(Self {
            version,
            digest,
            registers,
            bank,
            ram,
            cartridge_ram,
            riot,
        })
    }

    /// Install this state into the machine. The state must already have
    /// been checked against the loaded cartridge.
    pub fn apply(&self, cpu: &mut Atari7800Cpu) -> Result<(), SaveStateError> {
        let bus = cpu.bus_mut();
        let cart = bus.cartridge.as_mut().ok_or(SaveStateError::NoCartridge)?;
        if cart.digest() != self.digest {
            return Err(SaveStateError::DigestMismatch);
        }

        cart.store(&mut bus.space);
        if cart.scheme().is_banked() {
            cart.switch_bank(&mut bus.space, self.bank);
        }
        bus.space.slice_mut(0x0000, RAM_SIZE).copy_from_slice(&self.ram);
        if let Some(ram) = &self.cartridge_ram {
            bus.space.slice_mut(0x4000, RAM_SIZE).copy_from_slice(ram);
        }
        match &self.riot {
            Some(snapshot) => bus.riot.restore(snapshot, &bus.space),
            None => bus.riot.reset(),
        }
        bus.take_wsync_request();

        cpu.set_registers(&self.registers);
        Ok(())
    }
}
