//! MARIA - display-list graphics processor
//!
//! MARIA builds each scanline into a 160-byte line RAM by walking a display
//! list with DMA, then shifts the previous line's RAM out to the screen
//! while the next one is built.
//!
//! # Display lists
//!
//! The display list list (DLL) at DPPH:DPPL holds one 3-byte entry per zone:
//!
//! ```text
//! byte 0: bit 7 DLI (NMI at zone start), bit 6 H16, bit 5 H8, bits 3-0 offset
//! byte 1: display list high byte
//! byte 2: display list low byte
//! ```
//!
//! A display list is a run of 4-byte headers
//! `[addr lo, palette<<5 | width, addr hi, hpos]` and 5-byte extended headers
//! `[addr lo, mode, addr hi, palette<<5 | width, hpos]`, terminated by a
//! header whose second byte has none of bits 0-4 or 6 set. In the extended
//! form mode bit 7 selects the 2-bit wide write mode and bit 5 indirect
//! (character) addressing through CHARBASE.
//!
//! Each zone line reads graphics from page `addr hi + offset`; the offset
//! counts down to zero through the zone. With holey DMA enabled, graphics
//! at $8000+ whose A12 (H16) or A11 (H8) is set read as transparent.
//!
//! # Registers
//!
//! BACKGRND $20, palette colors $21-$3F (three per palette), WSYNC $24,
//! MSTAT $28, DPPH $2C, DPPL $30, CHARBASE $34, OFFSET $38, CTRL $3C.
//! CTRL bits 6-5 = 10 enables DMA, bit 4 selects two-byte characters, bit 2
//! kangaroo mode and bits 1-0 the read mode.

use crate::address_space::AddressSpace;
use crate::region::Region;
use emu_core::logging::{log, LogCategory, LogLevel};

pub const BACKGRND: u16 = 0x20;
pub const WSYNC: u16 = 0x24;
pub const MSTAT: u16 = 0x28;
pub const DPPH: u16 = 0x2C;
pub const DPPL: u16 = 0x30;
pub const CHARBASE: u16 = 0x34;
pub const CTRL: u16 = 0x3C;

pub const LINE_RAM_SIZE: usize = 160;
pub const FRAME_WIDTH: usize = 320;

// DMA costs in MARIA cycles
const DMA_STARTUP: u32 = 5;
const DMA_FIRST_LINE: u32 = 10;
const DMA_ZONE_END: u32 = 10;
const DMA_DLI: u32 = 20;
const DMA_HEADER: u32 = 8;
const DMA_EXTENDED_HEADER: u32 = 10;
const DMA_GRAPHIC: u32 = 3;
const DMA_CHARACTER: u32 = 3;

/// More headers than fit on a line; stops runaway walks over garbage lists.
const MAX_HEADERS: usize = 512;

/// Result of one scanline of MARIA activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanlineOutput {
    /// DMA time consumed, in MARIA cycles
    pub cycles: u32,
    /// A display list interrupt was requested
    pub nmi: bool,
}

#[derive(Debug, Clone)]
pub struct Maria {
    region: Region,
    /// Color indices, 320 wide, one row per display-area line
    framebuffer: Vec<u8>,
    line_ram: [u8; LINE_RAM_SIZE],
    dpp: u16,
    dp: u16,
    pp: u16,
    horizontal: u8,
    palette: u8,
    offset: u8,
    h08: bool,
    h16: bool,
    wmode: bool,
    cycles: u32,
}

impl Maria {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            framebuffer: vec![0; FRAME_WIDTH * region.display_area().height() as usize],
            line_ram: [0; LINE_RAM_SIZE],
            dpp: 0,
            dp: 0,
            pp: 0,
            horizontal: 0,
            palette: 0,
            offset: 0,
            h08: false,
            h16: false,
            wmode: false,
            cycles: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.region);
    }

    pub fn set_region(&mut self, region: Region) {
        if region != self.region {
            self.region = region;
            self.reset();
        }
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.framebuffer
    }

    pub fn line_ram(&self) -> &[u8; LINE_RAM_SIZE] {
        &self.line_ram
    }

    /// Run MARIA for one scanline (numbered from 1).
    pub fn render_scanline(&mut self, space: &AddressSpace, scanline: u32) -> ScanlineOutput {
        self.cycles = 0;
        let mut nmi = false;
        let display = self.region.display_area();
        let visible = self.region.visible_area();
        let ctrl = space.read_byte(CTRL);

        if ctrl & 0x60 != 0x40 || !display.contains(scanline) {
            if visible.contains(scanline) {
                let row = (scanline - display.top) as usize * FRAME_WIDTH;
                let background = space.read_byte(BACKGRND);
                self.framebuffer[row..row + FRAME_WIDTH].fill(background);
            }
            return ScanlineOutput::default();
        }

        self.cycles += DMA_STARTUP;
        if scanline == display.top {
            self.cycles += DMA_FIRST_LINE;
            self.dpp = u16::from_le_bytes([space.read_byte(DPPL), space.read_byte(DPPH)]);
            nmi |= self.load_zone(space);
        } else if visible.contains(scanline) {
            let row = (scanline - display.top) as usize;
            self.write_line_ram(space, row);
        }

        if scanline != display.bottom {
            self.dp = u16::from_be_bytes([
                space.read_byte(self.dpp.wrapping_add(1)),
                space.read_byte(self.dpp.wrapping_add(2)),
            ]);
            self.store_line_ram(space);
            self.offset = self.offset.wrapping_sub(1);
            if self.offset == 0xFF {
                self.dpp = self.dpp.wrapping_add(3);
                self.cycles += DMA_ZONE_END;
                nmi |= self.load_zone(space);
            }
        }

        ScanlineOutput {
            cycles: self.cycles,
            nmi,
        }
    }

    /// Latch the zone flags at DPP. Returns whether the zone requests a DLI.
    fn load_zone(&mut self, space: &AddressSpace) -> bool {
        let mode = space.read_byte(self.dpp);
        self.h08 = mode & 0x20 != 0;
        self.h16 = mode & 0x40 != 0;
        self.offset = mode & 0x0F;
        if mode & 0x80 != 0 {
            self.cycles += DMA_DLI;
            log(LogCategory::Interrupts, LogLevel::Trace, || {
                format!("MARIA: DLI at zone {:04X}", self.dpp)
            });
            true
        } else {
            false
        }
    }

    /// Walk the current display list into line RAM.
    pub fn store_line_ram(&mut self, space: &AddressSpace) {
        self.line_ram.fill(0);
        let ctrl = space.read_byte(CTRL);

        let mut headers = 0;
        let mut mode = space.read_byte(self.dp.wrapping_add(1));
        while mode & 0x5F != 0 {
            if headers == MAX_HEADERS {
                log(LogCategory::Graphics, LogLevel::Debug, || {
                    format!("MARIA: unterminated display list at {:04X}", self.dp)
                });
                break;
            }
            headers += 1;

            let dp = self.dp;
            let byte = |n: u16| space.read_byte(dp.wrapping_add(n));
            self.pp = u16::from_le_bytes([byte(0), byte(2)]);
            let mut indirect = false;
            let width_code;
            if mode & 0x1F != 0 {
                self.cycles += DMA_HEADER;
                self.palette = (byte(1) & 0xE0) >> 3;
                self.horizontal = byte(3);
                width_code = byte(1) & 0x1F;
                self.dp = dp.wrapping_add(4);
            } else {
                self.cycles += DMA_EXTENDED_HEADER;
                self.palette = (byte(3) & 0xE0) >> 3;
                self.horizontal = byte(4);
                indirect = byte(1) & 0x20 != 0;
                self.wmode = byte(1) & 0x80 != 0;
                width_code = byte(3) & 0x1F;
                self.dp = dp.wrapping_add(5);
            }
            let width = ((!width_code) & 0x1F) as u16 + 1;

            if !indirect {
                self.pp = self.pp.wrapping_add((self.offset as u16) << 8);
                for _ in 0..width {
                    self.cycles += DMA_GRAPHIC;
                    self.store_graphic(space, ctrl);
                }
            } else {
                let two_byte = ctrl & 0x10 != 0;
                let mut base = self.pp;
                let page = space.read_byte(CHARBASE).wrapping_add(self.offset);
                for _ in 0..width {
                    self.cycles += DMA_CHARACTER;
                    self.pp = u16::from_le_bytes([space.read_byte(base), page]);
                    base = base.wrapping_add(1);
                    self.cycles += DMA_GRAPHIC;
                    self.store_graphic(space, ctrl);
                    if two_byte {
                        self.cycles += DMA_GRAPHIC;
                        self.store_graphic(space, ctrl);
                    }
                }
            }

            mode = space.read_byte(self.dp.wrapping_add(1));
        }
    }

    fn is_holey(&self) -> bool {
        self.pp > 0x7FFF
            && ((self.h16 && self.pp & 0x1000 != 0) || (self.h08 && self.pp & 0x0800 != 0))
    }

    fn store_graphic(&mut self, space: &AddressSpace, ctrl: u8) {
        let data = space.read_byte(self.pp);
        let kangaroo = ctrl & 0x04 != 0;
        let holey = self.is_holey();
        if self.wmode {
            if holey {
                self.store_wide_cell(0, 0, kangaroo);
                self.store_wide_cell(0, 0, kangaroo);
            } else {
                self.store_wide_cell(data & 0x0C, (data & 0xC0) >> 6, kangaroo);
                self.store_wide_cell((data & 0x30) >> 4, (data & 0x03) << 2, kangaroo);
            }
        } else if holey {
            for _ in 0..4 {
                self.store_cell(0, kangaroo);
            }
        } else {
            self.store_cell((data & 0xC0) >> 6, kangaroo);
            self.store_cell((data & 0x30) >> 4, kangaroo);
            self.store_cell((data & 0x0C) >> 2, kangaroo);
            self.store_cell(data & 0x03, kangaroo);
        }
        self.pp = self.pp.wrapping_add(1);
    }

    fn store_cell(&mut self, data: u8, kangaroo: bool) {
        if let Some(cell) = self.line_ram.get_mut(self.horizontal as usize) {
            if data != 0 {
                *cell = self.palette | data;
            } else if kangaroo {
                *cell = 0;
            }
        }
        self.horizontal = self.horizontal.wrapping_add(1);
    }

    fn store_wide_cell(&mut self, high: u8, low: u8, kangaroo: bool) {
        if let Some(cell) = self.line_ram.get_mut(self.horizontal as usize) {
            if high != 0 || low != 0 {
                *cell = (self.palette & 0x10) | high | low;
            } else if kangaroo {
                *cell = 0;
            }
        }
        self.horizontal = self.horizontal.wrapping_add(1);
    }

    /// Shift line RAM out to a framebuffer row through the CTRL read mode.
    fn write_line_ram(&mut self, space: &AddressSpace, row: usize) {
        let color = |value: u8| {
            if value & 3 != 0 {
                space.read_byte(BACKGRND + value as u16)
            } else {
                space.read_byte(BACKGRND)
            }
        };
        let out = &mut self.framebuffer[row * FRAME_WIDTH..(row + 1) * FRAME_WIDTH];
        match space.read_byte(CTRL) & 0x03 {
            // 320B / 320D
            2 => {
                for (pixels, &v) in out.chunks_exact_mut(2).zip(self.line_ram.iter()) {
                    pixels[0] = color((v & 0x10) | ((v & 0x08) >> 3) | (v & 0x02));
                    pixels[1] = color((v & 0x10) | ((v & 0x04) >> 2) | ((v & 0x01) << 1));
                }
            }
            // 320A / 320C
            3 => {
                for (pixels, &v) in out.chunks_exact_mut(2).zip(self.line_ram.iter()) {
                    pixels[0] = color(v & 0x1E);
                    pixels[1] = color((v & 0x1C) | ((v & 0x01) << 1));
                }
            }
            // 160A / 160B
            _ => {
                for (pixels, &v) in out.chunks_exact_mut(2).zip(self.line_ram.iter()) {
                    let c = color(v);
                    pixels[0] = c;
                    pixels[1] = c;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DLL: u16 = 0x1800;
    const DL: u16 = 0x1900;
    const GFX: u16 = 0x2200;

    /// One 16-line zone with a single one-byte-wide 160A object at `hpos`.
    fn display_list(space: &mut AddressSpace, dli: bool, hpos: u8, data: u8) {
        space.write_byte(DPPH, (DLL >> 8) as u8);
        space.write_byte(DPPL, DLL as u8);
        space.write_byte(DLL, if dli { 0x8F } else { 0x0F });
        space.write_byte(DLL + 1, (DL >> 8) as u8);
        space.write_byte(DLL + 2, DL as u8);

        // palette 0, width 1
        for (i, b) in [GFX as u8, 0x1F, (GFX >> 8) as u8, hpos].iter().enumerate() {
            space.write_byte(DL + i as u16, *b);
        }
        for page in 0..16u16 {
            space.write_byte(GFX + (page << 8), data);
        }

        space.write_byte(BACKGRND, 0x01);
        space.write_byte(0x21, 0x11);
        space.write_byte(0x22, 0x22);
        space.write_byte(0x23, 0x33);
        space.write_byte(CTRL, 0x40);
    }

    fn row(maria: &Maria, row: usize) -> &[u8] {
        &maria.framebuffer()[row * FRAME_WIDTH..(row + 1) * FRAME_WIDTH]
    }

    #[test]
    fn test_dma_off_fills_background() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        space.write_byte(BACKGRND, 0x42);
        let out = maria.render_scanline(&space, 30);
        assert_eq!(out, ScanlineOutput::default());
        assert!(row(&maria, 14).iter().all(|&c| c == 0x42));
        assert!(row(&maria, 15).iter().all(|&c| c == 0));
    }

    #[test]
    fn test_outside_display_area_costs_nothing() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        display_list(&mut space, true, 0, 0xE4);
        assert_eq!(maria.render_scanline(&space, 10).cycles, 0);
    }

    #[test]
    fn test_first_line_loads_zone_and_raises_dli() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        display_list(&mut space, true, 0, 0xE4);
        let out = maria.render_scanline(&space, 16);
        assert!(out.nmi);
        assert_eq!(
            out.cycles,
            DMA_STARTUP + DMA_FIRST_LINE + DMA_DLI + DMA_HEADER + DMA_GRAPHIC
        );
        assert_eq!(maria.offset, 14);

        let out = maria.render_scanline(&space, 17);
        assert!(!out.nmi);
    }

    #[test]
    fn test_direct_graphics_160a() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        display_list(&mut space, false, 10, 0xE4);
        assert_eq!(space.read_byte(BACKGRND), 0x01);
        for line in 16..=27 {
            maria.render_scanline(&space, line);
        }
        assert_eq!(&maria.line_ram()[10..14], &[3, 2, 1, 0]);

        let pixels = row(&maria, 11);
        assert_eq!(&pixels[18..28], &[1, 1, 0x33, 0x33, 0x22, 0x22, 0x11, 0x11, 1, 1]);
        // Lines above the visible area are not drawn
        assert!(row(&maria, 5).iter().all(|&c| c == 0));
    }

    #[test]
    fn test_zone_advance_reloads_flags() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        display_list(&mut space, false, 0, 0xFF);
        // Second zone: one line, DLI requested
        space.write_byte(DLL + 3, 0x80);
        space.write_byte(DLL + 4, (DL >> 8) as u8);
        space.write_byte(DLL + 5, DL as u8);

        let mut nmis = Vec::new();
        for line in 16..=31 {
            if maria.render_scanline(&space, line).nmi {
                nmis.push(line);
            }
        }
        // The zone's sixteenth line is built on scanline 31
        assert_eq!(nmis, vec![31]);
        assert_eq!(maria.dpp, DLL + 3);
    }

    #[test]
    fn test_holey_dma() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        maria.h16 = true;
        maria.pp = 0x9000;
        assert!(maria.is_holey());
        maria.pp = 0x8000;
        assert!(!maria.is_holey());
        maria.pp = 0x1000;
        assert!(!maria.is_holey());

        space.write_byte(0x9000, 0xFF);
        maria.pp = 0x9000;
        maria.horizontal = 0;
        maria.store_graphic(&space, 0);
        assert_eq!(&maria.line_ram()[0..4], &[0, 0, 0, 0]);
        assert_eq!(maria.horizontal, 4);
    }

    #[test]
    fn test_kangaroo_mode_writes_transparent() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        maria.line_ram = [0x07; LINE_RAM_SIZE];
        space.write_byte(0x3000, 0x40);
        maria.pp = 0x3000;
        maria.store_graphic(&space, 0);
        assert_eq!(&maria.line_ram()[0..4], &[0x01, 0x07, 0x07, 0x07]);

        maria.pp = 0x3000;
        maria.horizontal = 0;
        maria.store_graphic(&space, 0x04);
        assert_eq!(&maria.line_ram()[0..4], &[0x01, 0, 0, 0]);
    }

    #[test]
    fn test_line_ram_clamped_at_160() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        space.write_byte(0x3000, 0xFF);
        maria.pp = 0x3000;
        maria.horizontal = 158;
        maria.store_graphic(&space, 0);
        assert_eq!(&maria.line_ram()[158..], &[3, 3]);
        assert_eq!(maria.horizontal, 162);
    }

    #[test]
    fn test_store_line_ram_is_repeatable() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        display_list(&mut space, false, 40, 0x1B);
        maria.dpp = DLL;
        maria.offset = 3;

        maria.dp = DL;
        maria.cycles = 0;
        maria.store_line_ram(&space);
        let first = *maria.line_ram();
        let first_cycles = maria.cycles;

        maria.dp = DL;
        maria.cycles = 0;
        maria.store_line_ram(&space);
        assert_eq!(*maria.line_ram(), first);
        assert_eq!(maria.cycles, first_cycles);
        assert_eq!(first.iter().filter(|&&c| c != 0).count(), 3);
    }

    #[test]
    fn test_indirect_extended_header() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        // Two characters from a list at $2400, palette 1, hpos 8
        for (i, b) in [0x00, 0x60, 0x24, 0x3E, 8].iter().enumerate() {
            space.write_byte(DL + i as u16, *b);
        }
        space.write_byte(0x2400, 0x05);
        space.write_byte(0x2401, 0x06);
        space.write_byte(CHARBASE, 0x30);
        space.write_byte(0x3005, 0xC0);
        space.write_byte(0x3006, 0x03);

        maria.dp = DL;
        maria.offset = 0;
        maria.store_line_ram(&space);
        assert_eq!(&maria.line_ram()[8..16], &[7, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(
            maria.cycles,
            DMA_EXTENDED_HEADER + 2 * (DMA_CHARACTER + DMA_GRAPHIC)
        );
    }

    #[test]
    fn test_read_mode_320a() {
        let mut space = AddressSpace::new();
        let mut maria = Maria::new(Region::Ntsc);
        space.write_byte(CTRL, 0x43);
        space.write_byte(BACKGRND, 0x01);
        space.write_byte(0x22, 0x22);
        maria.line_ram[0] = 0x03;
        maria.write_line_ram(&space, 0);
        // Left pixel takes bit 1, right pixel bit 0 shifted up
        assert_eq!(&row(&maria, 0)[0..2], &[0x22, 0x22]);
        maria.line_ram[0] = 0x01;
        maria.write_line_ram(&space, 0);
        assert_eq!(&row(&maria, 0)[0..2], &[0x01, 0x22]);
    }
}
