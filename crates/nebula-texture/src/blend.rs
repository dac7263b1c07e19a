//! Procedural vertex colors for faces whose material is a color reference.
//!
//! Two value-noise fields are sampled at the face's world position: one picks
//! a point between the primary and secondary color, the other feeds a height
//! term. Faces higher up are then whitened by `(y / 25)^2`.

use std::num::NonZeroUsize;

use glam::Vec3;
use lru::LruCache;
use noise::{NoiseFn, Perlin};

use crate::color::{HexColor, hsl_to_rgb, lerp_color, parse_color_ref, rgb_to_hsl};
use crate::error::TextureError;

/// World units per noise period.
pub const NOISE_SCALE: f64 = 25.0;

/// Lightness removed from a color to get its shaded variant.
pub const DARK_LIGHTNESS_OFFSET: f32 = 0.1;

/// Noise-driven color blender owned by one [`crate::Texture`].
pub struct ColorBlender {
    color_noise: Perlin,
    height_noise: Perlin,
    light_dark: LruCache<String, (HexColor, HexColor)>,
}

impl ColorBlender {
    /// Creates the two noise fields from independent seeds.
    pub fn new(color_seed: u32, height_seed: u32, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            color_noise: Perlin::new(color_seed),
            height_noise: Perlin::new(height_seed),
            light_dark: LruCache::new(capacity),
        }
    }

    /// Resolves a `#primary[/#secondary]` reference at `world` to a color.
    pub fn resolve(&self, name: &str, world: Vec3) -> Result<HexColor, TextureError> {
        let (primary, secondary) = parse_color_ref(name)?;
        let p = [
            world.x as f64 / NOISE_SCALE,
            world.y as f64 / NOISE_SCALE,
            world.z as f64 / NOISE_SCALE,
        ];

        let t = self.color_noise.get(p).clamp(-1.0, 1.0).abs();
        let height = self.height_noise.get(p).abs();
        // Clamped to an empty range: the height field currently has no effect.
        let height_term = height.clamp(0.0, 0.0);

        let blended = lerp_color(primary, secondary, t);
        let highlight = p[1].powi(2) + height_term;
        Ok(lerp_color(blended, HexColor::WHITE, highlight))
    }

    /// Returns `(light, dark)` for `color`, where dark has its HSL lightness
    /// lowered by [`DARK_LIGHTNESS_OFFSET`]. Results are cached by hex string.
    pub fn light_dark(&mut self, color: HexColor) -> (HexColor, HexColor) {
        let key = color.to_hex_string();
        if let Some(pair) = self.light_dark.get(&key) {
            return *pair;
        }
        let (h, s, l) = rgb_to_hsl(color);
        let pair = (color, hsl_to_rgb(h, s, l - DARK_LIGHTNESS_OFFSET));
        self.light_dark.put(key, pair);
        pair
    }

    /// Number of cached light/dark pairs.
    pub fn cached_pairs(&self) -> usize {
        self.light_dark.len()
    }
}
