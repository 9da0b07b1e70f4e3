//! viewport.rs — per-user viewport state.
//!
//! Each user id owns one viewport (center latitude/longitude in degrees plus
//! scale, the half-height of the view in degrees of latitude). Viewports are
//! created lazily with a fixed default on first touch and live for the
//! process lifetime.
//!
//! Incremental mutations (`pan`, `rescale`) clamp their result. `set_absolute`
//! does not: absolute jumps are trusted more than incremental moves, and the
//! render cycle re-validates before deriving bounding boxes. Whether that
//! asymmetry should stay is an open product question; for now it is kept.

use std::collections::HashMap;

use crate::coords::lon_half_width;

pub type UserId = i64;

pub const MIN_SCALE: f64 = 0.000625;
pub const MAX_SCALE: f64 = 5.12;
/// Latitude cap. Not the true pole limit; it keeps the cosine correction in
/// `lon_half_width` away from its singularity.
pub const MAX_LAT: f64 = 80.0;
pub const MAX_LON: f64 = 180.0;

pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    lat: 37.97106,
    lon: 34.67732,
    scale: 0.025,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub lat: f64,
    pub lon: f64,
    pub scale: f64,
}

/// Keyed store of viewports. Every entry point get-or-creates the default,
/// so callers never observe a missing user.
#[derive(Debug, Default)]
pub struct ViewportStore {
    map: HashMap<UserId, Viewport>,
}

impl ViewportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the user's viewport, creating the default if absent.
    pub fn get(&mut self, user: UserId) -> Viewport {
        *self.map.entry(user).or_insert(DEFAULT_VIEWPORT)
    }

    /// Step the center by unit amounts of the current scale. The longitude
    /// step divides by the cosine of the already-updated latitude, matching
    /// the asymmetric widening in the bounding-box math. Results clamp; a
    /// step at the boundary is a no-op on that axis.
    pub fn pan(&mut self, user: UserId, d_lat: i32, d_lon: i32) {
        let vp = self.map.entry(user).or_insert(DEFAULT_VIEWPORT);
        let lat = vp.lat + f64::from(d_lat) * vp.scale;
        let lon = vp.lon + f64::from(d_lon) * lon_half_width(vp.scale, lat);
        vp.lat = lat.clamp(-MAX_LAT, MAX_LAT);
        vp.lon = lon.clamp(-MAX_LON, MAX_LON);
    }

    /// Multiply the scale and clamp. `factor` must be strictly positive;
    /// only the two fixed zoom factors are ever passed.
    pub fn rescale(&mut self, user: UserId, factor: f64) {
        let vp = self.map.entry(user).or_insert(DEFAULT_VIEWPORT);
        vp.scale = (vp.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
    }

    /// Replace the viewport outright. No clamping here; `scale: None` keeps
    /// the prior scale.
    pub fn set_absolute(&mut self, user: UserId, lat: f64, lon: f64, scale: Option<f64>) {
        let vp = self.map.entry(user).or_insert(DEFAULT_VIEWPORT);
        vp.lat = lat;
        vp.lon = lon;
        if let Some(s) = scale {
            vp.scale = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = 42;

    #[test]
    fn first_touch_creates_default() {
        let mut store = ViewportStore::new();
        assert_eq!(store.get(USER), DEFAULT_VIEWPORT);
    }

    #[test]
    fn pan_north_moves_latitude_only() {
        let mut store = ViewportStore::new();
        store.pan(USER, 1, 0);
        let vp = store.get(USER);
        assert!((vp.lat - (37.97106 + 0.025)).abs() < 1e-12);
        assert_eq!(vp.lon, DEFAULT_VIEWPORT.lon);
        assert_eq!(vp.scale, DEFAULT_VIEWPORT.scale);
    }

    #[test]
    fn pan_east_widens_with_latitude() {
        let mut store = ViewportStore::new();
        store.pan(USER, 0, 1);
        let vp = store.get(USER);
        // the step is scale / cos(lat), strictly wider than scale itself
        assert!(vp.lon - DEFAULT_VIEWPORT.lon > DEFAULT_VIEWPORT.scale);
        assert_eq!(vp.lat, DEFAULT_VIEWPORT.lat);
    }

    #[test]
    fn pan_and_inverse_pan_round_trip() {
        let mut store = ViewportStore::new();
        let before = store.get(USER);
        store.pan(USER, 0, 1);
        store.pan(USER, 0, -1);
        let after = store.get(USER);
        assert!((after.lat - before.lat).abs() < 1e-9);
        assert!((after.lon - before.lon).abs() < 1e-9);
    }

    #[test]
    fn pan_clamps_at_latitude_cap() {
        let mut store = ViewportStore::new();
        store.set_absolute(USER, MAX_LAT, 0.0, Some(0.5));
        store.pan(USER, 1, 0);
        assert_eq!(store.get(USER).lat, MAX_LAT);
        // and the cap is a fixed point
        store.pan(USER, 1, 0);
        assert_eq!(store.get(USER).lat, MAX_LAT);
    }

    #[test]
    fn pan_clamps_at_longitude_cap() {
        let mut store = ViewportStore::new();
        store.set_absolute(USER, 0.0, MAX_LON, None);
        store.pan(USER, 0, 1);
        assert_eq!(store.get(USER).lon, MAX_LON);
    }

    #[test]
    fn zoom_sequence_halves_and_doubles() {
        let mut store = ViewportStore::new();
        store.rescale(USER, 0.5);
        assert_eq!(store.get(USER).scale, 0.0125);
        store.rescale(USER, 0.5);
        assert_eq!(store.get(USER).scale, 0.00625);
        store.rescale(USER, 2.0);
        assert_eq!(store.get(USER).scale, 0.0125);
    }

    #[test]
    fn rescale_round_trips_away_from_bounds() {
        let mut store = ViewportStore::new();
        store.rescale(USER, 2.0);
        store.rescale(USER, 0.5);
        assert_eq!(store.get(USER).scale, DEFAULT_VIEWPORT.scale);
    }

    #[test]
    fn rescale_clamps_both_ends() {
        let mut store = ViewportStore::new();
        store.set_absolute(USER, 0.0, 0.0, Some(MAX_SCALE));
        store.rescale(USER, 2.0);
        assert_eq!(store.get(USER).scale, MAX_SCALE);

        store.set_absolute(USER, 0.0, 0.0, Some(MIN_SCALE));
        store.rescale(USER, 0.5);
        assert_eq!(store.get(USER).scale, MIN_SCALE);
    }

    #[test]
    fn set_absolute_keeps_scale_when_omitted() {
        let mut store = ViewportStore::new();
        store.set_absolute(USER, 10.0, 20.0, None);
        let vp = store.get(USER);
        assert_eq!((vp.lat, vp.lon), (10.0, 20.0));
        assert_eq!(vp.scale, DEFAULT_VIEWPORT.scale);

        store.set_absolute(USER, 10.0, 20.0, Some(0.01));
        assert_eq!(store.get(USER).scale, 0.01);
    }

    #[test]
    fn set_absolute_does_not_clamp() {
        let mut store = ViewportStore::new();
        store.set_absolute(USER, 999.0, -999.0, None);
        let vp = store.get(USER);
        assert_eq!((vp.lat, vp.lon), (999.0, -999.0));
        // a zero pan afterwards pulls it back into range
        store.pan(USER, 0, 0);
        let vp = store.get(USER);
        assert_eq!((vp.lat, vp.lon), (MAX_LAT, -MAX_LON));
    }

    #[test]
    fn users_are_independent() {
        let mut store = ViewportStore::new();
        store.pan(1, 1, 0);
        assert_eq!(store.get(2), DEFAULT_VIEWPORT);
    }
}
