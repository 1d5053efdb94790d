//! Polynomial (LFSR) sequence tables shared by the sound chips.
//!
//! Atari sound hardware derives its noise and buzz waveforms from maximal
//! length shift registers of 4, 5, 9 and 17 bits. Rather than clock the
//! registers per channel, the output bit sequences are generated once and
//! channels keep an index into them. The tables are immutable after
//! construction and shared behind an `Arc`.

use std::sync::Arc;

/// Output sequences of the maximal-length shift registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolyTables {
    /// 4-bit register, period 15
    pub poly4: Vec<u8>,
    /// 5-bit register, period 31
    pub poly5: Vec<u8>,
    /// 9-bit register, period 511
    pub poly9: Vec<u8>,
    /// 17-bit register, period 131071
    pub poly17: Vec<u8>,
    /// Divide-by-31 pulse pattern used by the TIA to gate channel clocks
    pub div31: Vec<u8>,
}

/// Output bits of a right-shifting Fibonacci LFSR of `bits` width.
///
/// The new top bit is `bit0 ^ bit{tap}`; the emitted bit is bit 0. Seeded with
/// all ones so the sequence starts high.
pub fn lfsr_sequence(bits: u32, tap: u32) -> Vec<u8> {
    let period = (1usize << bits) - 1;
    let mut reg: u32 = (1 << bits) - 1;
    let mut out = Vec::with_capacity(period);
    for _ in 0..period {
        out.push((reg & 1) as u8);
        let feedback = (reg ^ (reg >> tap)) & 1;
        reg = (reg >> 1) | (feedback << (bits - 1));
    }
    out
}

impl PolyTables {
    pub fn new() -> Self {
        let mut div31 = vec![0u8; 31];
        div31[18] = 1;
        Self {
            poly4: lfsr_sequence(4, 1),
            poly5: lfsr_sequence(5, 2),
            poly9: lfsr_sequence(9, 4),
            poly17: lfsr_sequence(17, 3),
            div31,
        }
    }

    /// Build a table set ready to be shared by several chips.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for PolyTables {
    fn default() -> Self {
        Self::new()
    }
}
