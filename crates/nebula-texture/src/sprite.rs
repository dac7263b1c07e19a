//! Cutting sprite sheets into atlas tiles.

use image::{RgbaImage, imageops};

/// Default edge length of a sheet tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 16;

/// Name of the tile whose top-left corner sits at pixel `(x, y)` of sheet `name`.
pub fn tile_name(name: &str, x: u32, y: u32) -> String {
    format!("{name}_{x}_{y}")
}

/// Cuts `sheet` into `tile_w × tile_h` tiles, columns outer and rows inner.
///
/// Tiles on a ragged right or bottom edge keep the full tile size; the part
/// outside the sheet stays transparent.
pub fn slice_sheet(sheet: &RgbaImage, name: &str, tile_w: u32, tile_h: u32) -> Vec<(String, RgbaImage)> {
    if tile_w == 0 || tile_h == 0 {
        return Vec::new();
    }
    let (width, height) = sheet.dimensions();
    let cols = width.div_ceil(tile_w);
    let rows = height.div_ceil(tile_h);

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for x in 0..cols {
        for y in 0..rows {
            let px = x * tile_w;
            let py = y * tile_h;
            let w = tile_w.min(width - px);
            let h = tile_h.min(height - py);
            let view = imageops::crop_imm(sheet, px, py, w, h).to_image();

            let tile = if w == tile_w && h == tile_h {
                view
            } else {
                let mut padded = RgbaImage::new(tile_w, tile_h);
                imageops::replace(&mut padded, &view, 0, 0);
                padded
            };
            tiles.push((tile_name(name, px, py), tile));
        }
    }
    tiles
}
