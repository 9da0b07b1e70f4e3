//! wigle.rs — wigle.net API adapter.
//!
//! Two endpoints of the same service: `network/search` returns access points
//! inside a degree bounding box, `network/geocode` resolves a free-text place
//! name. Both are plain GET + JSON with a Basic auth header.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::coords::BoundingBoxDeg;

const SEARCH_URL: &str = "https://api.wigle.net/api/v2/network/search";
const GEOCODE_URL: &str = "https://api.wigle.net/api/v2/network/geocode";
const RESULTS_PER_PAGE: u32 = 100;

/// One discovered access point. The name may be empty; wigle reports
/// hidden-SSID networks with a null name.
#[derive(Debug, Clone, PartialEq)]
pub struct Spot {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// One geocode hit with its reported extent
/// (`bbox = [min_lat, max_lat, min_lon, max_lon]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub lat: f64,
    pub lon: f64,
    pub bbox: [f64; 4],
}

pub struct Wigle {
    agent: ureq::Agent,
    auth: String,
}

impl Wigle {
    pub fn new(api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(30))
            .build();
        Self {
            agent,
            auth: format!("Basic {api_key}"),
        }
    }

    /// Access points inside the bbox, first page only.
    pub fn search(&self, bb: &BoundingBoxDeg) -> Result<Vec<Spot>> {
        let resp = self
            .agent
            .get(SEARCH_URL)
            .set("Accept", "application/json")
            .set("Authorization", &self.auth)
            .query("latrange1", &bb.min_lat.to_string())
            .query("latrange2", &bb.max_lat.to_string())
            .query("longrange1", &bb.min_lon.to_string())
            .query("longrange2", &bb.max_lon.to_string())
            .query("resultsPerPage", &RESULTS_PER_PAGE.to_string())
            .call()
            .context("wigle search request")?;
        let parsed: SearchResponse =
            serde_json::from_reader(resp.into_reader()).context("wigle search response")?;
        if !parsed.success {
            bail!("wigle search refused: {}", parsed.message.unwrap_or_default());
        }
        Ok(parsed
            .results
            .into_iter()
            .map(|r| Spot {
                name: r.ssid.unwrap_or_default(),
                lat: r.trilat,
                lon: r.trilong,
            })
            .collect())
    }

    /// Resolve a free-text place query. The query goes out verbatim.
    pub fn geocode(&self, query: &str) -> Result<Vec<Place>> {
        let resp = self
            .agent
            .get(GEOCODE_URL)
            .set("Accept", "application/json")
            .set("Authorization", &self.auth)
            .query("first", "0")
            .query("freenet", "false")
            .query("paynet", "false")
            .query("addresscode", query)
            .call()
            .context("wigle geocode request")?;
        let parsed: GeocodeResponse =
            serde_json::from_reader(resp.into_reader()).context("wigle geocode response")?;
        if !parsed.success {
            bail!("wigle geocode refused: {}", parsed.message.unwrap_or_default());
        }
        Ok(parsed
            .results
            .into_iter()
            .map(|r| Place {
                lat: r.lat,
                lon: r.lon,
                bbox: r.boundingbox,
            })
            .collect())
    }
}

impl crate::app::SpotSource for Wigle {
    fn search(&self, bb: &BoundingBoxDeg) -> Result<Vec<Spot>> {
        Wigle::search(self, bb)
    }
}

impl crate::app::Geocoder for Wigle {
    fn geocode(&self, query: &str) -> Result<Vec<Place>> {
        Wigle::geocode(self, query)
    }
}

/// Top-level search reply. Only `results` matters; paging fields are ignored.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<SpotRecord>,
}

#[derive(Debug, Deserialize)]
struct SpotRecord {
    ssid: Option<String>,
    trilat: f64,
    trilong: f64,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceRecord>,
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    lat: f64,
    lon: f64,
    boundingbox: [f64; 4],
}
