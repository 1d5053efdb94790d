//! TIA - sound half of the Television Interface Adapter
//!
//! The 7800 keeps the 2600's TIA for backwards compatibility and sound. Only
//! the two audio channels are emulated here; MARIA produces all video.
//!
//! Each channel divides the sample clock by AUDF+1 (three times slower for
//! AUDC values above 11) and on every divider tick steps a waveform chosen by
//! AUDC: a square toggle, or one of the 4, 5 or 9 bit polynomials, all gated
//! by the 5-bit polynomial or the divide-by-31 pattern.

use emu_core::apu::{AudioChip, PolyTables};
use std::sync::Arc;

pub const AUDC0: u16 = 0x15;
pub const AUDC1: u16 = 0x16;
pub const AUDF0: u16 = 0x17;
pub const AUDF1: u16 = 0x18;
pub const AUDV0: u16 = 0x19;
pub const AUDV1: u16 = 0x1A;

#[derive(Debug, Clone, Default)]
struct Channel {
    audc: u8,
    audf: u8,
    /// AUDV scaled by four
    audv: u8,
    counter: u32,
    counter_max: u32,
    volume: u8,
    poly4: usize,
    poly5: usize,
    poly9: usize,
}

#[derive(Debug, Clone)]
pub struct TiaSound {
    channels: [Channel; 2],
    polys: Arc<PolyTables>,
    sample_rate: u32,
}

impl TiaSound {
    pub fn new(polys: Arc<PolyTables>, sample_rate: u32) -> Self {
        Self {
            channels: Default::default(),
            polys,
            sample_rate,
        }
    }

    fn update_divider(&mut self, index: usize) {
        let channel = &mut self.channels[index];
        let max = if channel.audc == 0 {
            channel.volume = channel.audv;
            0
        } else {
            let max = channel.audf as u32 + 1;
            if channel.audc > 11 {
                max * 3
            } else {
                max
            }
        };
        if max != channel.counter_max {
            channel.counter_max = max;
            if channel.counter == 0 || max == 0 {
                channel.counter = max;
            }
        }
    }

    fn clock_channel(&mut self, index: usize) {
        let polys = &self.polys;
        let channel = &mut self.channels[index];
        channel.poly5 = (channel.poly5 + 1) % polys.poly5.len();

        let audc = channel.audc;
        let gate = audc & 2 == 0
            || (audc & 1 == 0 && polys.div31[channel.poly5] != 0)
            || (audc & 1 != 0 && polys.poly5[channel.poly5] != 0);
        if !gate {
            return;
        }

        let high = if audc & 4 != 0 {
            channel.volume == 0
        } else if audc & 8 != 0 {
            if audc == 8 {
                channel.poly9 = (channel.poly9 + 1) % polys.poly9.len();
                polys.poly9[channel.poly9] != 0
            } else {
                polys.poly5[channel.poly5] != 0
            }
        } else {
            channel.poly4 = (channel.poly4 + 1) % polys.poly4.len();
            polys.poly4[channel.poly4] != 0
        };
        channel.volume = if high { channel.audv } else { 0 };
    }
}

impl AudioChip for TiaSound {
    fn write_register(&mut self, addr: u16, val: u8) {
        if !(AUDC0..=AUDV1).contains(&addr) {
            return;
        }
        let index = ((addr - AUDC0) & 1) as usize;
        let channel = &mut self.channels[index];
        match addr {
            AUDC0 | AUDC1 => channel.audc = val & 0x0F,
            AUDF0 | AUDF1 => channel.audf = val & 0x1F,
            AUDV0 | AUDV1 => channel.audv = (val & 0x0F) << 2,
            _ => return,
        }
        self.update_divider(index);
    }

    fn process(&mut self, count: usize, out: &mut Vec<u8>) {
        for _ in 0..count {
            for index in 0..2 {
                let channel = &mut self.channels[index];
                if channel.counter > 1 {
                    channel.counter -= 1;
                } else if channel.counter == 1 {
                    channel.counter = channel.counter_max;
                    self.clock_channel(index);
                }
            }
            out.push(self.channels[0].volume + self.channels[1].volume);
        }
    }

    fn reset(&mut self) {
        self.channels = Default::default();
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
