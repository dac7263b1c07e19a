//! Backing RGBA canvas for the atlas.
//!
//! Renderers need power-of-two textures to build mipmaps, so after every
//! packing round the canvas becomes a `pow2(max(w, h))` square with the old
//! pixels kept at the origin.

use std::path::Path;

use image::RgbaImage;

use crate::packer::PackedRect;

/// Smallest power of two `>= x`. `None` for `0` or on overflow.
pub fn pow2(x: u32) -> Option<u32> {
    if x == 0 {
        return None;
    }
    x.checked_next_power_of_two()
}

/// Pixel storage the packed tiles are drawn into.
#[derive(Clone, Debug)]
pub struct AtlasCanvas {
    image: RgbaImage,
}

impl AtlasCanvas {
    /// Creates a transparent canvas. Zero sizes are bumped to 1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The pixel data.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Grows to at least `width × height`, keeping pixels at the origin.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        let width = width.max(self.width());
        let height = height.max(self.height());
        if (width, height) != self.image.dimensions() {
            self.resize_preserving(width, height);
        }
    }

    /// Resizes to the nearest power-of-two square. Returns the new side.
    pub fn normalize_pow2(&mut self) -> u32 {
        let longest = self.width().max(self.height());
        // The canvas is never 0 wide; `longest` only overflows past 2^31.
        let side = pow2(longest).unwrap_or(longest);
        if (side, side) != self.image.dimensions() {
            self.resize_preserving(side, side);
        }
        side
    }

    /// Returns `true` when the canvas is a power-of-two square.
    pub fn is_pow2_square(&self) -> bool {
        self.width() == self.height() && self.width().is_power_of_two()
    }

    /// Copies `tile` into `rect`, replacing whatever was there.
    pub fn blit(&mut self, tile: &RgbaImage, rect: PackedRect) {
        image::imageops::replace(&mut self.image, tile, rect.x as i64, rect.y as i64);
    }

    /// Writes the canvas as an image file (format from the extension).
    pub fn save(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save(path)
    }

    fn resize_preserving(&mut self, width: u32, height: u32) {
        let mut resized = RgbaImage::new(width, height);
        image::imageops::replace(&mut resized, &self.image, 0, 0);
        self.image = resized;
    }
}
