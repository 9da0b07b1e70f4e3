//! render.rs — map image composition.
//!
//! Sizes a canvas to the projected bounding box, overlays wi-fi spots as
//! labeled dots and encodes the result as PNG. The basemap itself comes from
//! the tile adapter; when that fails the overlay is drawn on a blank white
//! canvas of the same dimensions.

use std::io::Cursor;

use anyhow::Result;
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

use crate::coords::{self, BoundingBoxMerc};
use crate::font;
use crate::wigle::Spot;

/// Longest canvas side in pixels.
pub const TARGET_PX: u32 = 950;

const SPOT_RADIUS: i32 = 6;
const SPOT_FILL: Rgba<u8> = Rgba([58, 117, 196, 255]);
const SPOT_EDGE: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([20, 20, 20, 255]);
const LABEL_SCALE: i32 = 2;
const CANVAS_BG: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Canvas dimensions for a projected bbox: longest side is `TARGET_PX`, the
/// other follows the bbox aspect ratio.
pub fn canvas_dims(bb: &BoundingBoxMerc) -> (u32, u32) {
    let dx = bb.max_x - bb.min_x;
    let dy = bb.max_y - bb.min_y;
    if dx >= dy {
        let h = (f64::from(TARGET_PX) * dy / dx).round().max(1.0) as u32;
        (TARGET_PX, h)
    } else {
        let w = (f64::from(TARGET_PX) * dx / dy).round().max(1.0) as u32;
        (w, TARGET_PX)
    }
}

pub fn blank_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, CANVAS_BG)
}

/// Overlay every spot on the canvas. Spots are plotted at their projected
/// position, labeled with their name; empty names make empty labels and
/// duplicates are drawn as-is. Points outside the canvas clip harmlessly.
pub fn draw_spots(canvas: &mut RgbaImage, bb: &BoundingBoxMerc, spots: &[Spot]) {
    let (w, h) = canvas.dimensions();
    let dx = bb.max_x - bb.min_x;
    let dy = bb.max_y - bb.min_y;
    if dx <= 0.0 || dy <= 0.0 {
        return;
    }
    for spot in spots {
        let (mx, my) = coords::mercator(spot.lat, spot.lon);
        let px = ((mx - bb.min_x) / dx * f64::from(w)).round() as i32;
        let py = ((bb.max_y - my) / dy * f64::from(h)).round() as i32;
        draw_filled_circle_mut(canvas, (px, py), SPOT_RADIUS, SPOT_FILL);
        draw_hollow_circle_mut(canvas, (px, py), SPOT_RADIUS, SPOT_EDGE);
        font::draw_text(
            canvas,
            px + SPOT_RADIUS + 3,
            py - font::CHAR_H * LABEL_SCALE / 2,
            &spot.name,
            LABEL_COLOR,
            LABEL_SCALE,
        );
    }
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}
