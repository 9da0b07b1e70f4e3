//! app.rs — command dispatch and the render cycle.
//!
//! The dispatcher maps a parsed command to a viewport mutation and (for
//! everything but help) a render. The render cycle itself degrades instead
//! of failing: a broken spot search or basemap fetch is reported to the user
//! as text and the image still goes out with whatever could be composed.
//! Only geocoding aborts its command, and only parse errors skip the render
//! entirely.
//!
//! Adapters are traits so tests can drive the whole cycle with recording
//! stubs instead of live HTTP.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use image::RgbaImage;
use log::warn;

use crate::command::{self, Command};
use crate::coords::{self, BoundingBoxDeg, BoundingBoxMerc};
use crate::render;
use crate::viewport::{UserId, Viewport, ViewportStore};
use crate::wigle::{Place, Spot};

/// Zoom step for `e`/`q`; the only rescale factors ever used are this and
/// its reciprocal.
pub const ZOOM_FACTOR: f64 = 2.0;
/// Above this scale the viewport is too wide for a useful spot query and the
/// search is skipped outright.
pub const MAX_SEARCH_SCALE: f64 = 0.09;

pub trait Messenger {
    fn send_text(&self, user: UserId, text: &str) -> Result<()>;
    fn send_image(&self, user: UserId, png: &[u8], filename: &str) -> Result<()>;
}

pub trait SpotSource {
    fn search(&self, bb: &BoundingBoxDeg) -> Result<Vec<Spot>>;
}

pub trait Geocoder {
    fn geocode(&self, query: &str) -> Result<Vec<Place>>;
}

pub trait BasemapSource {
    fn fetch_basemap(&self, bb: &BoundingBoxMerc, width: u32, height: u32) -> Result<RgbaImage>;
}

pub struct App<'a, M, S, G, B> {
    store: ViewportStore,
    messenger: &'a M,
    spots: &'a S,
    geocoder: &'a G,
    basemap: &'a B,
}

impl<'a, M, S, G, B> App<'a, M, S, G, B>
where
    M: Messenger,
    S: SpotSource,
    G: Geocoder,
    B: BasemapSource,
{
    pub fn new(messenger: &'a M, spots: &'a S, geocoder: &'a G, basemap: &'a B) -> Self {
        Self {
            store: ViewportStore::new(),
            messenger,
            spots,
            geocoder,
            basemap,
        }
    }

    /// Dispatch one text message.
    pub fn handle_text(&mut self, user: UserId, text: &str) -> Result<()> {
        match command::parse(text) {
            Ok(Command::Help) => self.messenger.send_text(user, command::HELP),
            Ok(Command::Pan { d_lat, d_lon }) => {
                self.store.pan(user, d_lat, d_lon);
                self.render(user)
            }
            Ok(Command::ZoomIn) => {
                self.store.rescale(user, 1.0 / ZOOM_FACTOR);
                self.render(user)
            }
            Ok(Command::ZoomOut) => {
                self.store.rescale(user, ZOOM_FACTOR);
                self.render(user)
            }
            Ok(Command::GoTo { lat, lon, scale }) => {
                self.store.set_absolute(user, lat, lon, scale);
                self.render(user)
            }
            Ok(Command::Find(query)) => self.find_place(user, &query),
            Err(e) => self.messenger.send_text(user, &e.to_string()),
        }
    }

    /// A shared device location jumps the viewport, keeping the scale.
    pub fn handle_location(&mut self, user: UserId, lat: f64, lon: f64) -> Result<()> {
        self.store.set_absolute(user, lat, lon, None);
        self.render(user)
    }

    fn find_place(&mut self, user: UserId, query: &str) -> Result<()> {
        let places = match self.geocoder.geocode(query) {
            Ok(p) => p,
            Err(e) => {
                warn!("geocode failed for {query:?}: {e:#}");
                return self.messenger.send_text(
                    user,
                    &format!("Failed to find this place! The error was:\n{e}"),
                );
            }
        };
        let Some(place) = places.first() else {
            return self.messenger.send_text(user, "Requested place not found!");
        };
        // size the viewport to roughly fit the found place's extent
        let [min_lat, max_lat, min_lon, max_lon] = place.bbox;
        let d_lat = max_lat - min_lat;
        let d_lon = max_lon - min_lon;
        let scale = 0.5 * (d_lat * d_lat + d_lon * d_lon).sqrt();
        self.store.set_absolute(user, place.lat, place.lon, Some(scale));
        self.render(user)
    }

    /// One full render cycle for the user's current viewport.
    fn render(&mut self, user: UserId) -> Result<()> {
        // Re-validate first: a zero rescale and a zero pan clamp whatever an
        // absolute jump may have left out of range.
        self.store.rescale(user, 1.0);
        self.store.pan(user, 0, 0);
        let vp = self.store.get(user);
        self.messenger.send_text(
            user,
            &format!("Please wait..\nYour position: {} {} {}", vp.lat, vp.lon, vp.scale),
        )?;

        let bb_deg = coords::bounding_box_deg(vp.lat, vp.lon, vp.scale);
        let bb_merc = coords::bounding_box_merc(&bb_deg);

        let mut found: Vec<Spot> = Vec::new();
        if vp.scale < MAX_SEARCH_SCALE {
            match self.spots.search(&bb_deg) {
                Ok(spots) => {
                    self.messenger
                        .send_text(user, &format!("Found {} spots", spots.len()))?;
                    found = spots;
                }
                Err(e) => {
                    warn!("spot search failed: {e:#}");
                    self.messenger.send_text(
                        user,
                        &format!(
                            "Failed to obtain wi-fi spot list for this location! The error was:\n{e}"
                        ),
                    )?;
                }
            }
        } else {
            self.messenger
                .send_text(user, "Zoom level is too wide, zoom in to see wi-fi networks")?;
        }

        let (width, height) = render::canvas_dims(&bb_merc);
        let mut canvas = match self.basemap.fetch_basemap(&bb_merc, width, height) {
            Ok(img) => img,
            Err(e) => {
                warn!("basemap fetch failed: {e:#}");
                self.messenger.send_text(
                    user,
                    &format!("Failed to obtain base map for this location! The error was:\n{e}"),
                )?;
                render::blank_canvas(width, height)
            }
        };

        render::draw_spots(&mut canvas, &bb_merc, &found);
        let png = render::encode_png(&canvas)?;
        self.messenger
            .send_image(user, &png, &image_filename(user, &vp))
    }

    #[cfg(test)]
    fn viewport(&mut self, user: UserId) -> Viewport {
        self.store.get(user)
    }
}

/// Filename for one delivered image. Unique enough to avoid collisions when
/// different users render concurrently; not a content identity.
fn image_filename(user: UserId, vp: &Viewport) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!(
        "{}_{}.{:03}_{}_{}_{}.png",
        user,
        now.as_secs(),
        now.subsec_millis(),
        vp.lat,
        vp.lon,
        vp.scale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::{DEFAULT_VIEWPORT, MAX_LAT, MAX_LON};
    use anyhow::anyhow;
    use std::cell::RefCell;

    const USER: UserId = 7;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Text(String),
        Image(String),
    }

    #[derive(Default)]
    struct RecordingMessenger {
        sent: RefCell<Vec<Sent>>,
    }

    impl RecordingMessenger {
        fn texts(&self) -> Vec<String> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|s| match s {
                    Sent::Text(t) => Some(t.clone()),
                    Sent::Image(_) => None,
                })
                .collect()
        }

        fn images(&self) -> Vec<String> {
            self.sent
                .borrow()
                .iter()
                .filter_map(|s| match s {
                    Sent::Image(f) => Some(f.clone()),
                    Sent::Text(_) => None,
                })
                .collect()
        }
    }

    impl Messenger for RecordingMessenger {
        fn send_text(&self, _user: UserId, text: &str) -> Result<()> {
            self.sent.borrow_mut().push(Sent::Text(text.to_string()));
            Ok(())
        }

        fn send_image(&self, _user: UserId, png: &[u8], filename: &str) -> Result<()> {
            assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
            self.sent.borrow_mut().push(Sent::Image(filename.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubSpots {
        fail: bool,
        spots: Vec<Spot>,
        calls: RefCell<u32>,
    }

    impl SpotSource for StubSpots {
        fn search(&self, _bb: &BoundingBoxDeg) -> Result<Vec<Spot>> {
            *self.calls.borrow_mut() += 1;
            if self.fail {
                return Err(anyhow!("wigle is down"));
            }
            Ok(self.spots.clone())
        }
    }

    #[derive(Default)]
    struct StubGeocoder {
        fail: bool,
        places: Vec<Place>,
    }

    impl Geocoder for StubGeocoder {
        fn geocode(&self, _query: &str) -> Result<Vec<Place>> {
            if self.fail {
                return Err(anyhow!("geocoder is down"));
            }
            Ok(self.places.clone())
        }
    }

    #[derive(Default)]
    struct StubBasemap {
        fail: bool,
    }

    impl BasemapSource for StubBasemap {
        fn fetch_basemap(&self, _bb: &BoundingBoxMerc, w: u32, h: u32) -> Result<RgbaImage> {
            if self.fail {
                return Err(anyhow!("tiles are down"));
            }
            Ok(render::blank_canvas(w, h))
        }
    }

    struct Fixture {
        messenger: RecordingMessenger,
        spots: StubSpots,
        geocoder: StubGeocoder,
        basemap: StubBasemap,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                messenger: RecordingMessenger::default(),
                spots: StubSpots::default(),
                geocoder: StubGeocoder::default(),
                basemap: StubBasemap::default(),
            }
        }

        fn app(&self) -> App<'_, RecordingMessenger, StubSpots, StubGeocoder, StubBasemap> {
            App::new(&self.messenger, &self.spots, &self.geocoder, &self.basemap)
        }
    }

    #[test]
    fn help_commands_send_help_without_rendering() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "/start").unwrap();
        app.handle_text(USER, "no such command").unwrap();
        assert_eq!(fx.messenger.texts(), vec![command::HELP, command::HELP]);
        assert!(fx.messenger.images().is_empty());
    }

    #[test]
    fn pan_command_renders_one_image() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "w").unwrap();
        let vp = app.viewport(USER);
        assert!((vp.lat - (DEFAULT_VIEWPORT.lat + DEFAULT_VIEWPORT.scale)).abs() < 1e-12);
        assert_eq!(vp.lon, DEFAULT_VIEWPORT.lon);
        assert_eq!(fx.messenger.images().len(), 1);
        // position echo plus spot count
        let texts = fx.messenger.texts();
        assert!(texts[0].starts_with("Please wait.."));
        assert_eq!(texts[1], "Found 0 spots");
    }

    #[test]
    fn bad_go_to_reports_and_leaves_viewport_alone() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "g abc def").unwrap();
        assert_eq!(app.viewport(USER), DEFAULT_VIEWPORT);
        assert!(fx.messenger.images().is_empty());
        let texts = fx.messenger.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Bad coordinates!"));
    }

    #[test]
    fn short_go_to_asks_for_two_coordinates() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "g 5").unwrap();
        assert_eq!(fx.messenger.texts(), vec!["Specify at least two coordinates!"]);
        assert_eq!(app.viewport(USER), DEFAULT_VIEWPORT);
    }

    #[test]
    fn go_to_scale_semantics() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "g 10 20").unwrap();
        assert_eq!(app.viewport(USER).scale, DEFAULT_VIEWPORT.scale);
        app.handle_text(USER, "g 10 20 0.01").unwrap();
        assert_eq!(app.viewport(USER).scale, 0.01);
        assert_eq!(fx.messenger.images().len(), 2);
    }

    #[test]
    fn out_of_range_jump_is_clamped_by_the_render_revalidation() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "g 999 999").unwrap();
        let vp = app.viewport(USER);
        assert_eq!((vp.lat, vp.lon), (MAX_LAT, MAX_LON));
        let texts = fx.messenger.texts();
        assert!(texts[0].contains("80 180"), "{:?}", texts[0]);
    }

    #[test]
    fn zoom_sequence_matches_the_fixed_factors() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "e").unwrap();
        assert_eq!(app.viewport(USER).scale, 0.0125);
        app.handle_text(USER, "e").unwrap();
        assert_eq!(app.viewport(USER).scale, 0.00625);
        app.handle_text(USER, "q").unwrap();
        assert_eq!(app.viewport(USER).scale, 0.0125);
    }

    #[test]
    fn wide_viewport_skips_the_search() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "g 10 20 1.5").unwrap();
        assert_eq!(*fx.spots.calls.borrow(), 0);
        let texts = fx.messenger.texts();
        assert!(texts
            .iter()
            .any(|t| t == "Zoom level is too wide, zoom in to see wi-fi networks"));
        // the image still goes out
        assert_eq!(fx.messenger.images().len(), 1);
    }

    #[test]
    fn search_failure_degrades_but_still_delivers_the_image() {
        let mut fx = Fixture::new();
        fx.spots.fail = true;
        let mut app = fx.app();
        app.handle_text(USER, "d").unwrap();
        let texts = fx.messenger.texts();
        assert!(texts
            .iter()
            .any(|t| t.starts_with("Failed to obtain wi-fi spot list")));
        assert_eq!(fx.messenger.images().len(), 1);
    }

    #[test]
    fn basemap_failure_degrades_but_still_delivers_the_image() {
        let mut fx = Fixture::new();
        fx.basemap.fail = true;
        let mut app = fx.app();
        app.handle_text(USER, "a").unwrap();
        let texts = fx.messenger.texts();
        assert!(texts.iter().any(|t| t.starts_with("Failed to obtain base map")));
        assert_eq!(fx.messenger.images().len(), 1);
    }

    #[test]
    fn found_spots_are_reported_and_drawn() {
        let mut fx = Fixture::new();
        fx.spots.spots = vec![
            Spot { name: "cafe".into(), lat: 37.971, lon: 34.677 },
            Spot { name: String::new(), lat: 37.972, lon: 34.678 },
        ];
        let mut app = fx.app();
        app.handle_text(USER, "s").unwrap();
        assert!(fx.messenger.texts().iter().any(|t| t == "Found 2 spots"));
        assert_eq!(fx.messenger.images().len(), 1);
    }

    #[test]
    fn geocode_zero_results_aborts_without_render() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "f Nowhereville").unwrap();
        assert_eq!(fx.messenger.texts(), vec!["Requested place not found!"]);
        assert!(fx.messenger.images().is_empty());
        assert_eq!(app.viewport(USER), DEFAULT_VIEWPORT);
    }

    #[test]
    fn geocode_failure_aborts_without_render() {
        let mut fx = Fixture::new();
        fx.geocoder.fail = true;
        let mut app = fx.app();
        app.handle_text(USER, "f Prijepolje").unwrap();
        let texts = fx.messenger.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Failed to find this place!"));
        assert!(fx.messenger.images().is_empty());
    }

    #[test]
    fn geocode_hit_jumps_and_sizes_the_viewport() {
        let mut fx = Fixture::new();
        fx.geocoder.places = vec![Place {
            lat: 43.38,
            lon: 19.64,
            bbox: [43.35, 43.41, 19.61, 19.69],
        }];
        let mut app = fx.app();
        app.handle_text(USER, "f Prijepolje").unwrap();
        let vp = app.viewport(USER);
        assert_eq!((vp.lat, vp.lon), (43.38, 19.64));
        let expected = 0.5 * (0.06f64 * 0.06 + 0.08 * 0.08).sqrt();
        assert!((vp.scale - expected).abs() < 1e-9);
        assert_eq!(fx.messenger.images().len(), 1);
    }

    #[test]
    fn shared_location_keeps_the_scale() {
        let fx = Fixture::new();
        let mut app = fx.app();
        app.handle_text(USER, "e").unwrap();
        let scale = app.viewport(USER).scale;
        app.handle_location(USER, 55.5, 37.0).unwrap();
        let vp = app.viewport(USER);
        assert_eq!((vp.lat, vp.lon), (55.5, 37.0));
        assert_eq!(vp.scale, scale);
    }

    #[test]
    fn filename_carries_user_and_viewport() {
        let name = image_filename(42, &Viewport { lat: 10.5, lon: -3.25, scale: 0.025 });
        assert!(name.starts_with("42_"));
        assert!(name.ends_with("_10.5_-3.25_0.025.png"));
    }
}
