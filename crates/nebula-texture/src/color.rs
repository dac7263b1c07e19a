//! Hex color references and arithmetic on packed 24-bit colors.

use std::fmt;

use crate::error::TextureError;

/// A 24-bit `0xRRGGBB` color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexColor(pub u32);

impl HexColor {
    pub const WHITE: HexColor = HexColor(0xffffff);
    pub const BLACK: HexColor = HexColor(0x000000);

    /// Parses `#rrggbb` (leading `#` optional).
    pub fn parse(s: &str) -> Result<Self, TextureError> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return Err(TextureError::InvalidColor(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(HexColor)
            .map_err(|_| TextureError::InvalidColor(s.to_string()))
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self((r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn rgb(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Channels scaled to `[0, 1]`.
    pub fn to_rgb_f32(self) -> [f32; 3] {
        self.rgb().map(|c| c as f32 / 255.0)
    }

    /// Builds a color from `[0, 1]` channels, clamping and rounding.
    pub fn from_rgb_f32(rgb: [f32; 3]) -> Self {
        let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        Self::from_rgb(r, g, b)
    }

    /// Lowercase `#rrggbb`, the canonical cache key.
    pub fn to_hex_string(self) -> String {
        format!("#{:06x}", self.0 & 0xffffff)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xffffff)
    }
}

/// Returns `true` if `name` is a color reference rather than a tile name.
pub fn is_color_ref(name: &str) -> bool {
    name.starts_with('#')
}

/// Parses `#primary` or `#primary/#secondary`.
///
/// A single color blends with itself.
pub fn parse_color_ref(name: &str) -> Result<(HexColor, HexColor), TextureError> {
    match name.split_once('/') {
        Some((primary, secondary)) => Ok((HexColor::parse(primary)?, HexColor::parse(secondary)?)),
        None => {
            let c = HexColor::parse(name)?;
            Ok((c, c))
        }
    }
}

/// Linear interpolation between two colors, channel by channel.
///
/// `amount` is not clamped: values outside `[0, 1]` extrapolate, and channels
/// that leave `0..=255` spill into their neighbours before the result is
/// truncated to 24 bits.
pub fn lerp_color(a: HexColor, b: HexColor, amount: f64) -> HexColor {
    let [ar, ag, ab] = a.rgb().map(f64::from);
    let [br, bg, bb] = b.rgb().map(f64::from);

    let rr = (ar + amount * (br - ar)).trunc() as i64;
    let rg = (ag + amount * (bg - ag)).trunc() as i64;
    let rb = (ab + amount * (bb - ab)).trunc() as i64;

    let packed = (1i64 << 24) + (rr << 16) + (rg << 8) + rb;
    HexColor((packed as u32) & 0xffffff)
}

// ---------------------------------------------------------------------------
// HSL
// ---------------------------------------------------------------------------

/// Converts to `(hue, saturation, lightness)`, each in `[0, 1]`.
pub fn rgb_to_hsl(color: HexColor) -> (f32, f32, f32) {
    let [r, g, b] = color.to_rgb_f32();
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, lightness);
    }

    let delta = max - min;
    let saturation = if lightness <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    let hue = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    (hue / 6.0, saturation, lightness)
}

/// Converts from HSL. Saturation and lightness are clamped to `[0, 1]`.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> HexColor {
    let h = hue.rem_euclid(1.0);
    let s = saturation.clamp(0.0, 1.0);
    let l = lightness.clamp(0.0, 1.0);

    if s == 0.0 {
        return HexColor::from_rgb_f32([l, l, l]);
    }

    let q = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    HexColor::from_rgb_f32([
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    ])
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * 6.0 * (2.0 / 3.0 - t)
    } else {
        p
    }
}
