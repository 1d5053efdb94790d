//! Color index to ARGB conversion
//!
//! MARIA color registers hold a hue in the high nibble and a luminance in the
//! low nibble. Hue 0 is grey; hues 1-15 step around the color wheel. The
//! table is generated from a YIQ approximation, which is close enough for
//! display purposes.

const HUE_STEP_DEGREES: f32 = 24.0;
const HUE_START_DEGREES: f32 = 180.0;
const SATURATION: f32 = 0.25;

#[derive(Debug, Clone)]
pub struct Palette {
    colors: [u32; 256],
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

impl Palette {
    pub fn new() -> Self {
        let mut colors = [0u32; 256];
        for (index, color) in colors.iter_mut().enumerate() {
            *color = yiq_to_argb(index as u8);
        }
        Self { colors }
    }

    #[inline]
    pub fn argb(&self, index: u8) -> u32 {
        self.colors[index as usize]
    }
}

fn yiq_to_argb(index: u8) -> u32 {
    let hue = (index >> 4) as f32;
    let y = 0.05 + 0.9 * (index & 0x0F) as f32 / 15.0;

    let (i, q) = if index >> 4 == 0 {
        (0.0, 0.0)
    } else {
        let angle = (HUE_START_DEGREES - (hue - 1.0) * HUE_STEP_DEGREES).to_radians();
        (SATURATION * angle.cos(), SATURATION * angle.sin())
    };

    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    let r = channel(y + 0.956 * i + 0.621 * q);
    let g = channel(y - 0.272 * i - 0.647 * q);
    let b = channel(y - 1.106 * i + 1.703 * q);
    0xFF00_0000 | (r << 16) | (g << 8) | b
}
