//! UV rectangles and the tile name → rectangle index.
//!
//! Rectangles are stored as four corners in image space (origin top-left):
//!
//! ```text
//! 0 -- 1
//! |    |
//! 3 -- 2
//! ```
//!
//! The vertical flip to the renderer's bottom-left origin happens when the
//! corners are written to a mesh.

use std::collections::HashMap;

use glam::Vec2;

use crate::packer::{AtlasPacker, PackedRect, PackedTile};

/// Four normalized texture-coordinate corners of one atlas tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvRect(pub [Vec2; 4]);

impl UvRect {
    /// Builds the rectangle of `rect` inside a `width × height` canvas.
    pub fn from_pixels(rect: PackedRect, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        let u0 = rect.x as f32 / w;
        let v0 = rect.y as f32 / h;
        let u1 = (rect.x + rect.w) as f32 / w;
        let v1 = (rect.y + rect.h) as f32 / h;
        Self([
            Vec2::new(u0, v0),
            Vec2::new(u1, v0),
            Vec2::new(u1, v1),
            Vec2::new(u0, v1),
        ])
    }

    /// Corners in order.
    pub fn corners(&self) -> &[Vec2; 4] {
        &self.0
    }

    /// Returns `true` when every coordinate lies in `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.0
            .iter()
            .all(|c| (0.0..=1.0).contains(&c.x) && (0.0..=1.0).contains(&c.y))
    }

    /// See [`uvrot`].
    pub fn rotated(self, deg: i32) -> Self {
        uvrot(self, deg)
    }

    /// See [`uvinvert`].
    pub fn inverted(self) -> Self {
        uvinvert(self)
    }
}

/// Rotates a rectangle by relabeling its corners.
///
/// The new corner 0 is old corner `(4 - ceil(deg / 90)) mod 4`; the rest
/// follow cyclically. `deg == 0` is the identity, negative angles rotate the
/// other way.
pub fn uvrot(rect: UvRect, deg: i32) -> UvRect {
    if deg == 0 {
        return rect;
    }
    let quarter_turns = (deg as f32 / 90.0).ceil() as i32;
    let start = (4 - quarter_turns).rem_euclid(4) as usize;
    UvRect(std::array::from_fn(|j| rect.0[(start + j) % 4]))
}

/// Reverses the corner order to `[3, 2, 1, 0]`.
pub fn uvinvert(rect: UvRect) -> UvRect {
    let [c0, c1, c2, c3] = rect.0;
    UvRect([c3, c2, c1, c0])
}

// ---------------------------------------------------------------------------
// UvIndex
// ---------------------------------------------------------------------------

/// Tile name → UV rectangle for the current canvas.
///
/// Only consistent while no load batch is in flight; the owning
/// [`crate::Texture`] rebuilds it at the end of every batch.
#[derive(Debug, Default)]
pub struct UvIndex {
    uvs: HashMap<String, UvRect>,
    tiles: HashMap<String, PackedTile>,
    canvas_size: (u32, u32),
}

impl UvIndex {
    /// Recomputes every rectangle from the packer's authoritative tile list.
    pub fn rebuild(&mut self, packer: &dyn AtlasPacker, width: u32, height: u32) {
        self.uvs = packer.uv(width, height);
        self.tiles = packer
            .index()
            .iter()
            .map(|tile| (tile.name.clone(), tile.clone()))
            .collect();
        self.canvas_size = (width, height);
    }

    /// UV rectangle for `name`.
    pub fn get(&self, name: &str) -> Option<&UvRect> {
        self.uvs.get(name)
    }

    /// Pixel placement of `name`.
    pub fn tile(&self, name: &str) -> Option<&PackedTile> {
        self.tiles.get(name)
    }

    /// Number of indexed tiles.
    pub fn len(&self) -> usize {
        self.uvs.len()
    }

    /// Returns `true` before the first rebuild or when nothing is packed.
    pub fn is_empty(&self) -> bool {
        self.uvs.is_empty()
    }

    /// Canvas size the rectangles were normalized against.
    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    /// Iterates over `(name, rect)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UvRect)> {
        self.uvs.iter().map(|(name, rect)| (name.as_str(), rect))
    }
}
