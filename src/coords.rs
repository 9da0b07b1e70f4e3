//! coords.rs — pure viewport-to-bounding-box math.
//!
//! A viewport is (lat, lon, scale) where scale is the half-height of the
//! view in degrees of latitude. Two bounding boxes are derived from it:
//! one in geographic degrees (the wigle query shape) and one in EPSG:3857
//! Web-Mercator meters (the render canvas shape).
//!
//! Everything here is a pure function of its input. Callers keep lat within
//! [-80, 80]; the cosine correction blows up toward the poles and the
//! viewport store's clamp is the only guard.

use std::f64::consts::PI;

/// Spherical Web-Mercator earth radius, meters. Same sphere the slippy
/// tile pyramid is built on.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Geographic bounding box in degrees, the wigle search query shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxDeg {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Projected bounding box in EPSG:3857 meters, the render canvas shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxMerc {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Longitude half-width for a given latitude half-height. Meridians
/// converge with latitude, so the span widens to keep the viewport square
/// in projected space.
#[inline]
pub fn lon_half_width(scale: f64, lat: f64) -> f64 {
    scale / (lat * PI / 180.0).cos()
}

/// Degree bounding box around a viewport center.
pub fn bounding_box_deg(lat: f64, lon: f64, scale: f64) -> BoundingBoxDeg {
    let yscale = scale;
    let xscale = lon_half_width(scale, lat);
    BoundingBoxDeg {
        min_lat: lat - yscale,
        max_lat: lat + yscale,
        min_lon: lon - xscale,
        max_lon: lon + xscale,
    }
}

/// Project a geographic point into EPSG:3857 meters.
#[inline]
pub fn mercator(lat: f64, lon: f64) -> (f64, f64) {
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Project the four corners of a degree bbox and take the projected extent.
pub fn bounding_box_merc(bb: &BoundingBoxDeg) -> BoundingBoxMerc {
    let corners = [
        (bb.min_lat, bb.min_lon),
        (bb.max_lat, bb.min_lon),
        (bb.max_lat, bb.max_lon),
        (bb.min_lat, bb.max_lon),
    ];
    let mut out = BoundingBoxMerc {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };
    for (lat, lon) in corners {
        let (x, y) = mercator(lat, lon);
        out.min_x = out.min_x.min(x);
        out.min_y = out.min_y.min(y);
        out.max_x = out.max_x.max(x);
        out.max_y = out.max_y.max(y);
    }
    out
}
