#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Trip record, coordinate and route types.
//!
//! A [`TripRecord`] is one row of the observed origin-destination dataset.
//! The pipeline enriches it in two steps: first with sampled coordinates
//! ([`PlacedTrip`]), then with a resolved path ([`RoutedTrip`]). Field names
//! on the wire match the source CSV columns so the saved JSON lines up with
//! the input dataset.

pub mod mode;
pub mod progress;

use std::fmt;

use chrono::NaiveTime;
use odsynth_boundary_models::AreaCode;
use serde::{Deserialize, Serialize};

pub use mode::{TravelMode, UnknownModeCode};

/// A geographic coordinate (EPSG:4326), serialized as `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(p: GeoPoint) -> Self {
        [p.lon, p.lat]
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

/// A routed path: an ordered sequence of geographic points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route {
    pub points: Vec<GeoPoint>,
}

impl Route {
    #[must_use]
    pub const fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One observed origin-destination movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    #[serde(rename = "origin_hdong_cd")]
    pub origin_area: AreaCode,
    #[serde(rename = "dest_hdong_cd")]
    pub dest_area: AreaCode,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub gender: String,
    pub age: String,
    /// Travel mode code; see [`TravelMode::from_code`].
    #[serde(rename = "modal", deserialize_with = "mode::deserialize_code")]
    pub mode_code: u8,
    pub origin_purpose: String,
    pub dest_purpose: String,
    #[serde(rename = "od_dist_avg")]
    pub avg_distance: f64,
    #[serde(rename = "od_duration_avg")]
    pub avg_duration: f64,
    #[serde(rename = "od_cnts")]
    pub trip_count: f64,
}

impl TripRecord {
    /// Returns `true` if `time` falls inside `[start_time, end_time]`.
    #[must_use]
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// A trip with sampled origin and destination coordinates attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedTrip {
    #[serde(flatten)]
    pub trip: TripRecord,
    pub origin_coordinates: GeoPoint,
    pub destination_coordinates: GeoPoint,
}

/// A placed trip whose path has been resolved by the routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedTrip {
    #[serde(flatten)]
    pub placed: PlacedTrip,
    pub route: Route,
}

/// A route from one of the configured fixed origins to the fixed
/// destination, with an explicitly chosen routing profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedRouteRecord {
    pub origin_coordinates: GeoPoint,
    pub destination_coordinates: GeoPoint,
    #[serde(rename = "modal")]
    pub mode: TravelMode,
    pub route: Route,
    #[serde(rename = "od_cnts")]
    pub trip_count: u32,
}

/// `HH:MM` time-of-day serialization, as used by the source dataset.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format(FORMAT))
    }

    /// Accepts `HH:MM` and `HH:MM:SS`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a time string in either format.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Parses an `HH:MM` or `HH:MM:SS` string.
    ///
    /// # Errors
    ///
    /// Returns a [`chrono::ParseError`] if neither format matches.
    pub fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
    }
}
