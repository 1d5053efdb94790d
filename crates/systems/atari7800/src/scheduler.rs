//! Frame scheduler
//!
//! A frame is a fixed number of scanlines of 454 MARIA cycles each (one CPU
//! cycle is four MARIA cycles). Every scanline walks the same phases:
//!
//! ```text
//! PreDma ──(hblank reached)──> Dma ──> PostDma ──(454 reached)──> Done
//!    │                                    │
//!    └──(WSYNC)──> Halted <──(WSYNC)──────┘
//! ```
//!
//! The CPU runs until the horizontal blank ends, MARIA then takes the bus for
//! its display list DMA, and the CPU finishes the line. A WSYNC write halts
//! the CPU until the end of the line. The RIOT timer is advanced after every
//! instruction, by the DMA time when the cartridge charges DMA to the CPU,
//! and in one step for the remainder of a halted line. Each line ends with
//! two samples from each sound chip.

use emu_core::apu::AudioChip;
use emu_core::logging::{log, LogCategory, LogLevel};

use crate::cartridge::CartridgeQuirks;
use crate::cpu::Atari7800Cpu;
use crate::input::{InputSnapshot, LightGun};
use crate::maria::{Maria, MSTAT};
use crate::region::Region;
use crate::riot::INPT4;

/// MARIA cycles per scanline
pub const CYCLES_PER_SCANLINE: u32 = 454;

/// Sound samples produced per scanline by each chip
pub const SAMPLES_PER_SCANLINE: usize = 2;

/// Position within a scanline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanlinePhase {
    /// CPU runs during horizontal blank
    PreDma,
    /// MARIA display list DMA
    Dma,
    /// CPU runs for the rest of the line
    PostDma,
    /// CPU halted by WSYNC; DMA still has to run if the halt came first
    Halted { dma_pending: bool },
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// MARIA cycles used in the current scanline
    cycles: u32,
    /// Overshoot of the previous line when DMA is not charged to the CPU
    extra_cycles: u32,
    /// Frame counter, wrapping at the refresh rate
    frame: u32,
    tia_samples: Vec<u8>,
    pokey_samples: Vec<u8>,
    audio: Vec<u8>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with `cycles` already spent on the current line.
    pub fn reset(&mut self, cycles: u32) {
        *self = Self {
            cycles,
            ..Self::default()
        };
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Mixed audio of the last frame, unsigned 8-bit.
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn extra_cycles(&self) -> u32 {
        self.extra_cycles
    }

    /// Emulate one complete frame.
    pub fn execute_frame(
        &mut self,
        cpu: &mut Atari7800Cpu,
        maria: &mut Maria,
        region: Region,
        input: &InputSnapshot,
    ) {
        {
            let bus = cpu.bus_mut();
            bus.riot.set_input_snapshot(input, &mut bus.space);
        }
        let quirks = cpu.bus().quirks();
        let light_gun = input.light_gun.filter(|_| quirks.light_gun);
        let display = region.display_area();

        self.tia_samples.clear();
        self.pokey_samples.clear();

        for scanline in 1..=region.scanlines() {
            if scanline == display.top {
                cpu.bus_mut().space.write_byte(MSTAT, 0x00);
            } else if scanline == display.bottom {
                cpu.bus_mut().space.write_byte(MSTAT, 0x80);
            }

            self.execute_scanline(cpu, maria, region, scanline, &quirks, light_gun);

            let bus = cpu.bus_mut();
            bus.tia.process(SAMPLES_PER_SCANLINE, &mut self.tia_samples);
            if let Some(pokey) = &mut bus.pokey {
                pokey.process(SAMPLES_PER_SCANLINE, &mut self.pokey_samples);
            }
        }

        self.frame += 1;
        if self.frame >= region.frequency() {
            self.frame = 0;
        }
        self.mix_audio();
    }

    /// Walk one scanline through its phases, starting with the overshoot
    /// of the previous line.
    fn execute_scanline(
        &mut self,
        cpu: &mut Atari7800Cpu,
        maria: &mut Maria,
        region: Region,
        scanline: u32,
        quirks: &CartridgeQuirks,
        light_gun: Option<LightGun>,
    ) {
        let hblank = quirks.hblank * 4;
        let overshoot = self.cycles % CYCLES_PER_SCANLINE;
        if quirks.cycle_stealing {
            self.cycles = overshoot;
            self.extra_cycles = 0;
        } else {
            self.cycles = 0;
            self.extra_cycles = overshoot;
        }

        let mut phase = ScanlinePhase::PreDma;
        while phase != ScanlinePhase::Done {
            phase = match phase {
                ScanlinePhase::PreDma => {
                    if self.cycles >= hblank {
                        ScanlinePhase::Dma
                    } else if self.step_cpu(cpu, region, scanline, hblank, light_gun) {
                        ScanlinePhase::Halted { dma_pending: true }
                    } else {
                        ScanlinePhase::PreDma
                    }
                }
                ScanlinePhase::Dma => {
                    self.run_dma(cpu, maria, scanline, quirks.cycle_stealing);
                    ScanlinePhase::PostDma
                }
                ScanlinePhase::PostDma => {
                    if self.cycles >= CYCLES_PER_SCANLINE {
                        ScanlinePhase::Done
                    } else if self.step_cpu(cpu, region, scanline, hblank, light_gun) {
                        ScanlinePhase::Halted { dma_pending: false }
                    } else {
                        ScanlinePhase::PostDma
                    }
                }
                ScanlinePhase::Halted { dma_pending } => {
                    if self.cycles < CYCLES_PER_SCANLINE {
                        let remainder = CYCLES_PER_SCANLINE - self.cycles;
                        cpu.bus_mut().advance_timer(remainder >> 2);
                        self.cycles = CYCLES_PER_SCANLINE;
                    }
                    if dma_pending {
                        // Charged DMA runs past the end of the line and
                        // carries into the next one
                        self.run_dma(cpu, maria, scanline, quirks.cycle_stealing);
                    }
                    ScanlinePhase::Done
                }
                ScanlinePhase::Done => ScanlinePhase::Done,
            };
        }
    }

    /// Execute one instruction. Returns whether the CPU halted on WSYNC.
    fn step_cpu(
        &mut self,
        cpu: &mut Atari7800Cpu,
        region: Region,
        scanline: u32,
        hblank: u32,
        light_gun: Option<LightGun>,
    ) -> bool {
        let step = cpu.step();
        self.cycles += step.fine;

        let bus = cpu.bus_mut();
        if bus.riot.is_timing() {
            bus.advance_timer(step.base);
        }

        if let Some(gun) = light_gun {
            let top = region.visible_area().top + gun.y;
            let beam = hblank + gun.x * CYCLES_PER_SCANLINE.saturating_sub(hblank) / 320;
            let hit = scanline >= top
                && scanline <= top + 3
                && self.cycles + self.extra_cycles >= beam;
            let inpt4 = bus.space.read_byte(INPT4);
            let inpt4 = if hit { inpt4 & 0x7F } else { inpt4 | 0x80 };
            bus.space.write_byte(INPT4, inpt4);
        }

        bus.take_wsync_request()
    }

    fn run_dma(&mut self, cpu: &mut Atari7800Cpu, maria: &mut Maria, scanline: u32, charge: bool) {
        let output = maria.render_scanline(&cpu.bus().space, scanline);
        if charge {
            self.cycles += output.cycles;
            cpu.bus_mut().advance_timer(output.cycles >> 2);
        }
        if output.nmi {
            // Entry time is covered by MARIA's DLI overhead
            let _ = cpu.nmi();
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                format!("Scheduler: NMI on scanline {}", scanline)
            });
        }
    }

    fn mix_audio(&mut self) {
        self.audio.clear();
        if self.pokey_samples.is_empty() {
            self.audio.extend_from_slice(&self.tia_samples);
        } else {
            self.audio.extend(
                self.tia_samples
                    .iter()
                    .zip(&self.pokey_samples)
                    .map(|(&t, &p)| ((t as u16 + p as u16) / 2) as u8),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Atari7800Bus;
    use crate::cartridge::Cartridge;
    use crate::maria::{CTRL, DPPH, DPPL};
    use crate::riot::{INTFLG, INTIM};

    /// 16K linear cartridge with `program` at $C000 and `nmi` at $D000.
    fn machine(program: &[u8], nmi: &[u8]) -> (Atari7800Cpu, Maria, Scheduler) {
        let mut image = vec![0xEA; 16 * 1024];
        image[..program.len()].copy_from_slice(program);
        image[0x1000..0x1000 + nmi.len()].copy_from_slice(nmi);
        image[0x3FFA..].copy_from_slice(&[0x00, 0xD0, 0x00, 0xC0, 0x00, 0xC0]);
        let mut bus = Atari7800Bus::new(Region::Ntsc);
        bus.load_cartridge(Cartridge::load(&image).unwrap());
        bus.reset();
        let mut cpu = Atari7800Cpu::new(bus);
        let mut scheduler = Scheduler::new();
        scheduler.reset(cpu.reset() << 2);
        (cpu, Maria::new(Region::Ntsc), scheduler)
    }

    const WSYNC_LOOP: [u8; 6] = [
        0x8D, 0x24, 0x00, // STA WSYNC
        0x4C, 0x00, 0xC0, // JMP $C000
    ];

    #[test]
    fn test_frame_counter_wraps() {
        let (mut cpu, mut maria, mut scheduler) = machine(&WSYNC_LOOP, &[]);
        let input = InputSnapshot::default();
        for expected in 1..60 {
            scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
            assert_eq!(scheduler.frame(), expected);
        }
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
        assert_eq!(scheduler.frame(), 0);
    }

    #[test]
    fn test_audio_block_per_frame() {
        let (mut cpu, mut maria, mut scheduler) = machine(&WSYNC_LOOP, &[]);
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &InputSnapshot::default());
        assert_eq!(scheduler.audio().len(), 262 * SAMPLES_PER_SCANLINE);
        assert!(scheduler.audio().iter().all(|&s| s == 0));
    }

    #[test]
    fn test_mstat_marks_vblank() {
        let (mut cpu, mut maria, mut scheduler) = machine(&WSYNC_LOOP, &[]);
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &InputSnapshot::default());
        assert_eq!(cpu.bus().space.read_byte(MSTAT), 0x80);
    }

    #[test]
    fn test_halted_lines_advance_timer() {
        let program = [
            0xA9, 0xFF, // LDA #$FF
            0x8D, 0x97, 0x02, // STA T1024T
            0x8D, 0x24, 0x00, // STA WSYNC
            0x4C, 0x05, 0xC0, // JMP $C005
        ];
        let (mut cpu, mut maria, mut scheduler) = machine(&program, &[]);
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &InputSnapshot::default());
        // About 29,600 CPU cycles elapse in a halted frame
        let intim = cpu.bus().space.read_byte(INTIM);
        assert!((224..=228).contains(&intim), "INTIM = {intim}");
        assert_eq!(cpu.bus().space.read_byte(INTFLG) & 0x80, 0);
        assert_eq!(scheduler.cycles(), CYCLES_PER_SCANLINE);
    }

    /// Run the first display line with the CPU halted on WSYNC before
    /// hblank ends. Returns the DMA cost, INTIM after the line and the
    /// cycles carried into the next line.
    fn halted_dma_line(dma: bool, cycle_stealing: bool) -> (u32, u8, u32) {
        let program = [
            0xA9, 0xFF, // LDA #$FF
            0x8D, 0x94, 0x02, // STA TIM1T
            0x8D, 0x24, 0x00, // STA WSYNC
            0x4C, 0x08, 0xC0, // JMP $C008
        ];
        let (mut cpu, mut maria, mut scheduler) = machine(&program, &[]);
        if let Some(cart) = cpu.bus_mut().cartridge.as_mut() {
            cart.quirks.cycle_stealing = cycle_stealing;
        }
        {
            let space = &mut cpu.bus_mut().space;
            space.write_byte(DPPH, 0x18);
            space.write_byte(DPPL, 0x00);
            // One zone, no DLI, with a 31 byte direct object
            space.write_byte(0x1800, 0x0F);
            space.write_byte(0x1801, 0x19);
            space.write_byte(0x1802, 0x00);
            space.write_byte(0x1900, 0x00);
            space.write_byte(0x1901, 0x01);
            space.write_byte(0x1902, 0x22);
            space.write_byte(0x1903, 0x00);
            space.write_byte(CTRL, if dma { 0x40 } else { 0x00 });
        }

        let top = Region::Ntsc.display_area().top;
        let cost = Maria::new(Region::Ntsc)
            .render_scanline(&cpu.bus().space, top)
            .cycles;
        let quirks = cpu.bus().quirks();
        scheduler.reset(0);
        scheduler.execute_scanline(&mut cpu, &mut maria, Region::Ntsc, top, &quirks, None);
        let intim = cpu.bus().space.read_byte(INTIM);
        (cost, intim, scheduler.cycles())
    }

    #[test]
    fn test_halted_line_charges_dma() {
        let (cost, intim_on, carried) = halted_dma_line(true, true);
        let (no_cost, intim_off, idle) = halted_dma_line(false, true);
        assert_eq!(cost, 5 + 10 + 8 + 31 * 3);
        assert_eq!(no_cost, 0);

        // The timer pays for the DMA and the line runs over by its cost
        assert_eq!(intim_off - intim_on, (cost >> 2) as u8);
        assert_eq!(carried, CYCLES_PER_SCANLINE + cost);
        assert_eq!(idle, CYCLES_PER_SCANLINE);
    }

    #[test]
    fn test_halted_line_dma_free_without_cycle_stealing() {
        let (_, intim_on, cycles) = halted_dma_line(true, false);
        let (_, intim_off, _) = halted_dma_line(false, false);
        assert_eq!(intim_on, intim_off);
        assert_eq!(cycles, CYCLES_PER_SCANLINE);
    }

    #[test]
    fn test_charged_dma_carries_into_next_line() {
        let program = [
            0x8D, 0x24, 0x00, // STA WSYNC
            0x4C, 0x00, 0xC0, // JMP $C000
        ];
        let (mut cpu, mut maria, mut scheduler) = machine(&program, &[]);
        {
            let space = &mut cpu.bus_mut().space;
            space.write_byte(DPPH, 0x18);
            space.write_byte(DPPL, 0x00);
            space.write_byte(0x1800, 0x0F);
            space.write_byte(0x1801, 0x19);
            space.write_byte(0x1802, 0x00);
            space.write_byte(CTRL, 0x40);
        }
        let quirks = cpu.bus().quirks();
        let top = Region::Ntsc.display_area().top;
        scheduler.reset(0);
        scheduler.execute_scanline(&mut cpu, &mut maria, Region::Ntsc, top, &quirks, None);
        assert_eq!(scheduler.cycles(), CYCLES_PER_SCANLINE + 5 + 10);

        // The next line starts 15 cycles in and halts before its own DMA
        scheduler.execute_scanline(&mut cpu, &mut maria, Region::Ntsc, top + 1, &quirks, None);
        assert_eq!(scheduler.cycles(), CYCLES_PER_SCANLINE + 5);
    }

    #[test]
    fn test_display_list_interrupt() {
        let nmi = [
            0xEE, 0x00, 0x19, // INC $1900
            0x40, // RTI
        ];
        let program = [0x4C, 0x00, 0xC0]; // JMP $C000
        let (mut cpu, mut maria, mut scheduler) = machine(&program, &nmi);
        {
            let space = &mut cpu.bus_mut().space;
            space.write_byte(DPPH, 0x18);
            space.write_byte(DPPL, 0x00);
            space.write_byte(0x1800, 0x8F);
            space.write_byte(CTRL, 0x40);
        }
        let input = InputSnapshot::default();
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
        assert_eq!(cpu.bus().space.read_byte(0x1900), 1);
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
        assert_eq!(cpu.bus().space.read_byte(0x1900), 2);
    }

    #[test]
    fn test_overshoot_without_cycle_stealing() {
        let mut image = vec![0xEA; 16 * 1024];
        image[0..3].copy_from_slice(&[0x4C, 0x00, 0xC0]);
        image[0x3FFC..].copy_from_slice(&[0x00, 0xC0, 0x00, 0xC0]);
        let mut cart = Cartridge::load(&image).unwrap();
        cart.quirks.cycle_stealing = false;
        let mut bus = Atari7800Bus::new(Region::Ntsc);
        bus.load_cartridge(cart);
        bus.reset();
        let mut cpu = Atari7800Cpu::new(bus);
        let mut maria = Maria::new(Region::Ntsc);
        let mut scheduler = Scheduler::new();
        scheduler.reset(cpu.reset() << 2);

        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &InputSnapshot::default());
        // JMP takes 12 MARIA cycles, so lines end 2 cycles late
        assert_eq!(scheduler.extra_cycles(), scheduler.cycles() % CYCLES_PER_SCANLINE);
        assert!(scheduler.cycles() >= CYCLES_PER_SCANLINE);
    }

    #[test]
    fn test_light_gun_sensor() {
        let (mut cpu, mut maria, mut scheduler) = machine(&[0x4C, 0x00, 0xC0], &[]);
        let mut cart_quirks = cpu.bus().quirks();
        cart_quirks.light_gun = true;
        if let Some(cart) = cpu.bus_mut().cartridge.as_mut() {
            cart.quirks = cart_quirks;
        }
        let input = InputSnapshot {
            light_gun: Some(LightGun {
                x: 0,
                y: 300,
                trigger: false,
            }),
            ..Default::default()
        };
        // Aimed below the screen, the sensor never sees the beam
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
        assert_eq!(cpu.bus().space.read_byte(INPT4) & 0x80, 0x80);

        // Aimed at the last line, the sensor is lit when the frame ends
        let input = InputSnapshot {
            light_gun: Some(LightGun {
                x: 0,
                y: 262 - 26 - 3,
                trigger: false,
            }),
            ..Default::default()
        };
        scheduler.execute_frame(&mut cpu, &mut maria, Region::Ntsc, &input);
        assert_eq!(cpu.bus().space.read_byte(INPT4) & 0x80, 0);
    }
}
