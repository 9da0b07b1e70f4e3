//! tiles.rs — OpenStreetMap basemap adapter.
//!
//! Builds a basemap for a projected bounding box from standard slippy tiles:
//! pick a zoom level whose resolution roughly matches the requested canvas,
//! fetch the covering tiles, stitch them, crop to the exact bbox and resize.
//!
//! The tile x index wraps around the antimeridian like the tile pyramid
//! itself does; y rows outside the Mercator band are left white. Any tile
//! fetch error fails the whole basemap, which the orchestrator treats as a
//! partial failure of the render.

use std::f64::consts::PI;
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::app::BasemapSource;
use crate::coords::{BoundingBoxMerc, EARTH_RADIUS_M};

const TILE_SIZE: u32 = 256;
const MAX_ZOOM: u32 = 19;
const TILE_URL: &str = "https://tile.openstreetmap.org";
/// Identifying User-Agent, required by the OSM tile usage policy.
const USER_AGENT: &str = "wifi-spot-bot/0.1";

pub struct TileFetcher {
    agent: ureq::Agent,
}

impl TileFetcher {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(20))
            .build();
        Self { agent }
    }

    fn fetch_tile(&self, zoom: u32, x: u32, y: u32) -> Result<RgbaImage> {
        let url = format!("{TILE_URL}/{zoom}/{x}/{y}.png");
        let resp = self
            .agent
            .get(&url)
            .call()
            .with_context(|| format!("fetching tile {zoom}/{x}/{y}"))?;
        let mut bytes = Vec::new();
        resp.into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("reading tile {zoom}/{x}/{y}"))?;
        let img = image::load_from_memory(&bytes)
            .with_context(|| format!("decoding tile {zoom}/{x}/{y}"))?;
        Ok(img.to_rgba8())
    }
}

impl Default for TileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl BasemapSource for TileFetcher {
    fn fetch_basemap(&self, bb: &BoundingBoxMerc, width: u32, height: u32) -> Result<RgbaImage> {
        let zoom = zoom_for(bb, width);
        let tiles_per_side = 1i64 << zoom;

        let (x0, y0) = global_px(bb.min_x, bb.max_y, zoom);
        let (x1, y1) = global_px(bb.max_x, bb.min_y, zoom);

        let tile = f64::from(TILE_SIZE);
        let tx0 = (x0 / tile).floor() as i64;
        let tx1 = (x1 / tile).floor() as i64;
        let ty0 = (y0 / tile).floor() as i64;
        let ty1 = (y1 / tile).floor() as i64;

        let mosaic_w = ((tx1 - tx0 + 1) as u32) * TILE_SIZE;
        let mosaic_h = ((ty1 - ty0 + 1) as u32) * TILE_SIZE;
        let mut mosaic = RgbaImage::from_pixel(mosaic_w, mosaic_h, image::Rgba([255, 255, 255, 255]));

        for ty in ty0..=ty1 {
            if ty < 0 || ty >= tiles_per_side {
                // above/below the Mercator band, nothing to draw there
                continue;
            }
            for tx in tx0..=tx1 {
                let wrapped_x = tx.rem_euclid(tiles_per_side) as u32;
                let img = self.fetch_tile(zoom, wrapped_x, ty as u32)?;
                imageops::overlay(
                    &mut mosaic,
                    &img,
                    (tx - tx0) * i64::from(TILE_SIZE),
                    (ty - ty0) * i64::from(TILE_SIZE),
                );
            }
        }

        let crop_x = (x0 - (tx0 as f64) * tile).floor().max(0.0) as u32;
        let crop_y = (y0 - (ty0 as f64) * tile).floor().max(0.0) as u32;
        let crop_w = ((x1 - x0).round() as u32).clamp(1, mosaic_w - crop_x);
        let crop_h = ((y1 - y0).round() as u32).clamp(1, mosaic_h - crop_y);
        let cropped = imageops::crop_imm(&mosaic, crop_x, crop_y, crop_w, crop_h).to_image();

        Ok(imageops::resize(&cropped, width, height, FilterType::Triangle))
    }
}

/// Zoom level whose meters-per-pixel best matches the bbox span rendered at
/// `width` pixels, clamped to the pyramid's range.
fn zoom_for(bb: &BoundingBoxMerc, width: u32) -> u32 {
    let world = 2.0 * PI * EARTH_RADIUS_M;
    let meters_per_px = (bb.max_x - bb.min_x) / f64::from(width.max(1));
    if meters_per_px <= 0.0 {
        return MAX_ZOOM;
    }
    let zoom = (world / (f64::from(TILE_SIZE) * meters_per_px)).log2().round();
    zoom.clamp(0.0, f64::from(MAX_ZOOM)) as u32
}

/// Mercator meters to global pixel coordinates at a zoom level. Pixel y
/// grows southward, like the tile pyramid.
fn global_px(x_m: f64, y_m: f64, zoom: u32) -> (f64, f64) {
    let half_world = PI * EARTH_RADIUS_M;
    let world_px = f64::from(TILE_SIZE) * (1u64 << zoom) as f64;
    let px = (x_m + half_world) / (2.0 * half_world) * world_px;
    let py = (half_world - y_m) / (2.0 * half_world) * world_px;
    (px, py)
}
