//! Television standard dependent timing and geometry.

use serde::{Deserialize, Serialize};

/// Inclusive scanline range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub top: u32,
    pub bottom: u32,
}

impl LineRange {
    pub fn contains(&self, line: u32) -> bool {
        line >= self.top && line <= self.bottom
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    /// Region code from byte 57 of a cartridge header.
    pub fn from_header(code: u8) -> Self {
        if code & 1 == 1 {
            Region::Pal
        } else {
            Region::Ntsc
        }
    }

    pub fn scanlines(self) -> u32 {
        match self {
            Region::Ntsc => 262,
            Region::Pal => 312,
        }
    }

    /// Frames per second; the frame counter wraps at this value.
    pub fn frequency(self) -> u32 {
        match self {
            Region::Ntsc => 60,
            Region::Pal => 50,
        }
    }

    /// Lines during which MARIA may perform display-list DMA.
    pub fn display_area(self) -> LineRange {
        match self {
            Region::Ntsc => LineRange { top: 16, bottom: 258 },
            Region::Pal => LineRange { top: 16, bottom: 308 },
        }
    }

    /// Lines copied from line RAM into the framebuffer.
    pub fn visible_area(self) -> LineRange {
        match self {
            Region::Ntsc => LineRange { top: 26, bottom: 249 },
            Region::Pal => LineRange { top: 26, bottom: 297 },
        }
    }

    /// Sound chips are clocked twice per scanline.
    pub fn samples_per_frame(self) -> usize {
        self.scanlines() as usize * 2
    }

    pub fn sample_rate(self) -> u32 {
        self.samples_per_frame() as u32 * self.frequency()
    }
}
