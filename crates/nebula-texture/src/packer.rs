//! Atlas packing capability and the default guillotine packer.
//!
//! The texture only needs four things from a packer: place a tile or report
//! that it does not fit, grow, list placements, and turn placements into UVs.
//! Growth keeps every existing placement so already drawn pixels stay valid.

use std::collections::HashMap;

use crate::uv::UvRect;

/// Pixel rectangle of a packed tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PackedRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A named placement, as listed by [`AtlasPacker::index`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedTile {
    pub name: String,
    pub rect: PackedRect,
}

/// Capability the atlas uses to place tiles.
pub trait AtlasPacker: Send {
    /// Places `name` (`width × height` pixels). Returns `None` when there is no room.
    ///
    /// Packing a name that is already placed with the same size returns its
    /// existing rectangle.
    fn pack(&mut self, name: &str, width: u32, height: u32) -> Option<PackedRect>;

    /// Grows the packing area until a `width × height` tile fits.
    fn expand(&mut self, width: u32, height: u32);

    /// Current packing area in pixels.
    fn size(&self) -> (u32, u32);

    /// Every placement, in packing order.
    fn index(&self) -> &[PackedTile];

    /// UV rectangles of every placement inside a `width × height` canvas.
    fn uv(&self, width: u32, height: u32) -> HashMap<String, UvRect> {
        self.index()
            .iter()
            .map(|tile| {
                (
                    tile.name.clone(),
                    UvRect::from_pixels(tile.rect, width, height),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// GuillotinePacker
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct FreeRect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

/// Guillotine packer with best-short-side-fit placement.
///
/// Growth doubles the smaller dimension and appends the new strips as free
/// space, so earlier placements never move.
#[derive(Debug)]
pub struct GuillotinePacker {
    width: u32,
    height: u32,
    free_rects: Vec<FreeRect>,
    tiles: Vec<PackedTile>,
}

impl GuillotinePacker {
    /// Creates an empty packer covering `width × height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                w: width,
                h: height,
            }],
            tiles: Vec::new(),
        }
    }

    /// Grows the area to `width × height`, adding the new strips as free space.
    fn grow_to(&mut self, width: u32, height: u32) {
        let (old_w, old_h) = (self.width, self.height);
        if width > old_w {
            self.free_rects.push(FreeRect {
                x: old_w,
                y: 0,
                w: width - old_w,
                h: height.max(old_h),
            });
        }
        if height > old_h {
            self.free_rects.push(FreeRect {
                x: 0,
                y: old_h,
                w: old_w,
                h: height - old_h,
            });
        }
        self.width = width.max(old_w);
        self.height = height.max(old_h);
    }
}

impl AtlasPacker for GuillotinePacker {
    fn pack(&mut self, name: &str, width: u32, height: u32) -> Option<PackedRect> {
        if let Some(pos) = self.tiles.iter().position(|t| t.name == name) {
            let existing = self.tiles[pos].rect;
            if existing.w == width && existing.h == height {
                return Some(existing);
            }
            // Resized tile: the old area is abandoned, not reclaimed.
            self.tiles.remove(pos);
        }

        let best = find_bssf(&self.free_rects, width, height)?;
        let rect = self.free_rects.swap_remove(best);
        guillotine_split(&mut self.free_rects, &rect, width, height);

        let placed = PackedRect {
            x: rect.x,
            y: rect.y,
            w: width,
            h: height,
        };
        self.tiles.push(PackedTile {
            name: name.to_string(),
            rect: placed,
        });
        Some(placed)
    }

    fn expand(&mut self, width: u32, height: u32) {
        while find_bssf(&self.free_rects, width, height).is_none() {
            let (w, h) = (self.width, self.height);
            if w <= h {
                self.grow_to(w * 2, h);
            } else {
                self.grow_to(w, h * 2);
            }
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self) -> &[PackedTile] {
        &self.tiles
    }
}

/// Index of the free rectangle leaving the shortest leftover side.
fn find_bssf(free_rects: &[FreeRect], w: u32, h: u32) -> Option<usize> {
    free_rects
        .iter()
        .enumerate()
        .filter(|(_, r)| r.w >= w && r.h >= h)
        .min_by_key(|(_, r)| (r.w - w).min(r.h - h))
        .map(|(i, _)| i)
}

fn guillotine_split(free_rects: &mut Vec<FreeRect>, rect: &FreeRect, w: u32, h: u32) {
    let right_w = rect.w - w;
    let below_h = rect.h - h;

    if right_w > 0 {
        free_rects.push(FreeRect {
            x: rect.x + w,
            y: rect.y,
            w: right_w,
            h,
        });
    }
    if below_h > 0 {
        free_rects.push(FreeRect {
            x: rect.x,
            y: rect.y + h,
            w: rect.w,
            h: below_h,
        });
    }
}
