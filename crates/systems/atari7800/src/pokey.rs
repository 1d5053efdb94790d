//! POKEY - cartridge-mounted sound chip
//!
//! Some cartridges carry a POKEY mapped at $4000. It has four channels
//! clocked from a 64kHz or 15kHz base (or 1.79MHz for channels 1 and 3),
//! optionally joined in pairs into 16-bit dividers.
//!
//! Synthesis is event driven: rather than ticking every base clock, the chip
//! jumps straight to whichever comes first, the next channel divider expiry
//! or the next output sample, and advances every counter by that distance.
//! The sample period is kept in 24.8 fixed point.

use emu_core::apu::{AudioChip, PolyTables};
use std::sync::Arc;

pub const POKEY_BASE: u16 = 0x4000;
pub const RANDOM: u16 = 0x400A;

const AUDF1: u16 = 0x00;
const AUDC1: u16 = 0x01;
const AUDF2: u16 = 0x02;
const AUDC2: u16 = 0x03;
const AUDF3: u16 = 0x04;
const AUDC3: u16 = 0x05;
const AUDF4: u16 = 0x06;
const AUDC4: u16 = 0x07;
const AUDCTL: u16 = 0x08;
const RANDOM_REG: u16 = 0x0A;

/// 1.79MHz machine clock
const FREQUENCY: u64 = 1_787_520;
const DIV_64: u32 = 28;
const DIV_15: u32 = 114;

// AUDC bits
const NOTPOLY5: u8 = 0x80;
const POLY4: u8 = 0x40;
const PURE: u8 = 0x20;
const VOLUME_ONLY: u8 = 0x10;
const VOLUME_MASK: u8 = 0x0F;

// AUDCTL bits
const AUDCTL_POLY9: u8 = 0x80;
const CH1_179: u8 = 0x40;
const CH3_179: u8 = 0x20;
const CH1_CH2: u8 = 0x10;
const CH3_CH4: u8 = 0x08;
const CLOCK_15: u8 = 0x01;

/// Divider value of a channel that never fires.
const PARKED: u32 = 0x7FFF_FFFF;

#[derive(Debug, Clone, Copy)]
struct Channel {
    audf: u8,
    audc: u8,
    divide_count: u32,
    divide_max: u32,
    output: bool,
    out_vol: u8,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            audf: 0,
            audc: 0,
            divide_count: PARKED,
            divide_max: PARKED,
            output: false,
            out_vol: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pokey {
    channels: [Channel; 4],
    audctl: u8,
    base_multiplier: u32,
    poly4: usize,
    poly5: usize,
    poly9: usize,
    poly17: usize,
    /// Base clocks elapsed since the polynomial indices were last advanced
    poly_adjust: usize,
    /// Base clocks per output sample, 24.8 fixed point
    sample_max: u64,
    sample_count: u64,
    polys: Arc<PolyTables>,
    sample_rate: u32,
}

impl Pokey {
    pub fn new(polys: Arc<PolyTables>, sample_rate: u32) -> Self {
        let sample_max = (FREQUENCY << 8) / sample_rate.max(1) as u64;
        Self {
            channels: [Channel::default(); 4],
            audctl: 0,
            base_multiplier: DIV_64,
            poly4: 0,
            poly5: 0,
            poly9: 0,
            poly17: 0,
            poly_adjust: 0,
            sample_max,
            sample_count: sample_max,
            polys,
            sample_rate,
        }
    }

    /// Recompute the dividers of every channel in `mask`.
    fn update_dividers(&mut self, mask: u8) {
        let audctl = self.audctl;
        let base = self.base_multiplier;
        let f = |ch: usize| self.channels[ch].audf as u32;

        let mut targets = [None; 4];
        if mask & 0x01 != 0 {
            targets[0] = Some(if audctl & CH1_179 != 0 {
                f(0) + 4
            } else {
                (f(0) + 1) * base
            });
        }
        if mask & 0x02 != 0 {
            targets[1] = Some(if audctl & CH1_CH2 != 0 {
                if audctl & CH1_179 != 0 {
                    f(1) * 256 + f(0) + 7
                } else {
                    (f(1) * 256 + f(0) + 1) * base
                }
            } else {
                (f(1) + 1) * base
            });
        }
        if mask & 0x04 != 0 {
            targets[2] = Some(if audctl & CH3_179 != 0 {
                f(2) + 4
            } else {
                (f(2) + 1) * base
            });
        }
        if mask & 0x08 != 0 {
            targets[3] = Some(if audctl & CH3_CH4 != 0 {
                if audctl & CH3_179 != 0 {
                    f(3) * 256 + f(2) + 7
                } else {
                    (f(3) * 256 + f(2) + 1) * base
                }
            } else {
                (f(3) + 1) * base
            });
        }

        let min_period = (self.sample_max >> 8) as u32;
        for (channel, target) in self.channels.iter_mut().zip(targets) {
            let Some(max) = target else { continue };
            if max != channel.divide_max {
                channel.divide_max = max;
                if channel.divide_count > max {
                    channel.divide_count = max;
                }
            }
            // Silent, constant or ultrasonic channels never need to fire
            if channel.audc & VOLUME_ONLY != 0
                || channel.audc & VOLUME_MASK == 0
                || channel.divide_max < min_period
            {
                channel.out_vol = channel.audc & VOLUME_MASK;
                channel.divide_count = PARKED;
                channel.divide_max = PARKED;
            }
        }
    }

    fn clock_channel(&mut self, index: usize) {
        let polys = &self.polys;
        self.poly4 = (self.poly4 + self.poly_adjust) % polys.poly4.len();
        self.poly5 = (self.poly5 + self.poly_adjust) % polys.poly5.len();
        self.poly9 = (self.poly9 + self.poly_adjust) % polys.poly9.len();
        self.poly17 = (self.poly17 + self.poly_adjust) % polys.poly17.len();
        self.poly_adjust = 0;

        let audctl = self.audctl;
        let channel = &mut self.channels[index];
        channel.divide_count = channel.divide_count.wrapping_add(channel.divide_max);
        if channel.audc & NOTPOLY5 != 0 || polys.poly5[self.poly5] != 0 {
            channel.output = if channel.audc & PURE != 0 {
                !channel.output
            } else if channel.audc & POLY4 != 0 {
                polys.poly4[self.poly4] != 0
            } else if audctl & AUDCTL_POLY9 != 0 {
                polys.poly9[self.poly9] != 0
            } else {
                polys.poly17[self.poly17] != 0
            };
        }
        channel.out_vol = if channel.output {
            channel.audc & VOLUME_MASK
        } else {
            0
        };
    }
}

impl AudioChip for Pokey {
    fn write_register(&mut self, addr: u16, val: u8) {
        let reg = addr & 0x0F;
        let mask = match reg {
            AUDF1 => {
                self.channels[0].audf = val;
                if self.audctl & CH1_CH2 != 0 {
                    0x03
                } else {
                    0x01
                }
            }
            AUDC1 => {
                self.channels[0].audc = val;
                0x01
            }
            AUDF2 => {
                self.channels[1].audf = val;
                0x02
            }
            AUDC2 => {
                self.channels[1].audc = val;
                0x02
            }
            AUDF3 => {
                self.channels[2].audf = val;
                if self.audctl & CH3_CH4 != 0 {
                    0x0C
                } else {
                    0x04
                }
            }
            AUDC3 => {
                self.channels[2].audc = val;
                0x04
            }
            AUDF4 => {
                self.channels[3].audf = val;
                0x08
            }
            AUDC4 => {
                self.channels[3].audc = val;
                0x08
            }
            AUDCTL => {
                self.audctl = val;
                self.base_multiplier = if val & CLOCK_15 != 0 { DIV_15 } else { DIV_64 };
                0x0F
            }
            _ => 0,
        };
        self.update_dividers(mask);
    }

    /// RANDOM returns eight bits of the active noise polynomial.
    fn read_register(&self, addr: u16) -> u8 {
        if addr & 0x0F != RANDOM_REG {
            return 0;
        }
        let (seq, start) = if self.audctl & AUDCTL_POLY9 != 0 {
            (&self.polys.poly9, self.poly9)
        } else {
            (&self.polys.poly17, self.poly17)
        };
        (0..8).fold(0u8, |acc, i| {
            (acc << 1) | seq[(start + self.poly_adjust + i) % seq.len()]
        })
    }

    fn process(&mut self, count: usize, out: &mut Vec<u8>) {
        let mut remaining = count;
        while remaining > 0 {
            let mut event_min = (self.sample_count >> 8) as u32;
            let mut next_event = None;
            for index in (0..4).rev() {
                if self.channels[index].divide_count <= event_min {
                    event_min = self.channels[index].divide_count;
                    next_event = Some(index);
                }
            }

            for channel in self.channels.iter_mut() {
                channel.divide_count -= event_min;
            }
            self.sample_count -= (event_min as u64) << 8;
            self.poly_adjust += event_min as usize;

            match next_event {
                Some(index) => self.clock_channel(index),
                None => {
                    self.sample_count += self.sample_max;
                    let sum: u8 = self.channels.iter().map(|c| c.out_vol).sum();
                    out.push((sum << 2) + 8);
                    remaining -= 1;
                }
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new(Arc::clone(&self.polys), self.sample_rate);
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pokey() -> Pokey {
        Pokey::new(PolyTables::shared(), 31440)
    }

    #[test]
    fn test_silent_output_is_biased() {
        let mut pokey = pokey();
        assert_eq!(pokey.generate_samples(8), vec![8; 8]);
    }

    #[test]
    fn test_volume_only_channel() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDC1, VOLUME_ONLY | 10);
        assert_eq!(pokey.channels[0].divide_max, PARKED);
        assert_eq!(pokey.generate_samples(4), vec![48; 4]);
    }

    #[test]
    fn test_ultrasonic_channel_is_parked() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDF1, 0);
        pokey.write_register(POKEY_BASE + AUDC1, NOTPOLY5 | PURE | 15);
        assert_eq!(pokey.channels[0].divide_max, PARKED);
        assert_eq!(pokey.generate_samples(2), vec![68; 2]);
    }

    #[test]
    fn test_pure_tone_toggles() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDC1, NOTPOLY5 | PURE | 15);
        pokey.write_register(POKEY_BASE + AUDF1, 99);
        assert_eq!(pokey.channels[0].divide_max, 100 * DIV_64);

        let samples = pokey.generate_samples(400);
        assert!(samples.contains(&8));
        assert!(samples.contains(&68));
        assert!(samples.iter().all(|&s| s == 8 || s == 68));
        let edges = samples.windows(2).filter(|w| w[0] != w[1]).count();
        // 2800 clocks per half period, about 57 clocks per sample
        assert!((6..=10).contains(&edges), "edges = {edges}");
    }

    #[test]
    fn test_joined_channels() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDC2, NOTPOLY5 | PURE | 15);
        pokey.write_register(POKEY_BASE + AUDCTL, CH1_CH2 | CH1_179);
        pokey.write_register(POKEY_BASE + AUDF1, 0x34);
        pokey.write_register(POKEY_BASE + AUDF2, 0x12);
        assert_eq!(pokey.channels[1].divide_max, 0x1234 + 7);

        pokey.write_register(POKEY_BASE + AUDCTL, CH1_CH2);
        assert_eq!(pokey.channels[1].divide_max, (0x1234 + 1) * DIV_64);
    }

    #[test]
    fn test_15khz_base_clock() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDCTL, CLOCK_15);
        pokey.write_register(POKEY_BASE + AUDC3, NOTPOLY5 | PURE | 8);
        pokey.write_register(POKEY_BASE + AUDF3, 9);
        assert_eq!(pokey.channels[2].divide_max, 10 * DIV_15);
    }

    #[test]
    fn test_divider_count_clamped() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDC4, PURE | 4);
        pokey.write_register(POKEY_BASE + AUDF4, 200);
        assert_eq!(pokey.channels[3].divide_count, 201 * DIV_64);
        pokey.write_register(POKEY_BASE + AUDF4, 100);
        assert_eq!(pokey.channels[3].divide_count, 101 * DIV_64);
    }

    #[test]
    fn test_random_reads() {
        let mut pokey = pokey();
        let first = pokey.read_register(RANDOM);
        pokey.generate_samples(3);
        assert_ne!(pokey.read_register(RANDOM), first);
        assert_eq!(pokey.read_register(POKEY_BASE), 0);
    }

    #[test]
    fn test_reset_restores_power_on() {
        let mut pokey = pokey();
        pokey.write_register(POKEY_BASE + AUDC1, VOLUME_ONLY | 10);
        pokey.reset();
        assert_eq!(pokey.generate_samples(2), vec![8; 2]);
    }
}
