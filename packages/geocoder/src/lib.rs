#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Korean administrative area geocoding.
//!
//! Wraps the SGIS Open API of Statistics Korea, configured from
//! `services/sgis.toml`:
//!
//! - address → WGS84 point plus the service's own area code and names
//! - service area code → boundary rings in the Korean unified grid
//!
//! The mobility dataset and SGIS number dong-level areas differently, so
//! [`address`] provides the name normalization and code composition
//! needed to translate between the two.

pub mod address;
pub mod service_registry;
pub mod sgis;

use async_trait::async_trait;
use odsynth_boundary_models::{AreaCode, RawRings};
use odsynth_trip_models::GeoPoint;
use thiserror::Error;

/// A geocoding result for an administrative area.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedArea {
    /// Raw `adm_cd` as returned, when numeric.
    pub adm_code: Option<AreaCode>,
    /// Eight-digit code accepted by the boundary endpoint.
    pub area_code: AreaCode,
    /// Province (시도) name.
    pub sido_name: String,
    /// District (시군구) name.
    pub sgg_name: String,
    /// Dong (읍면동) name.
    pub dong_name: String,
    /// Matched location (WGS84).
    pub point: GeoPoint,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// The service answered with a non-zero `errCd`.
    #[error("SGIS error {code}: {message}")]
    Service {
        /// Service error code.
        code: i64,
        /// Service error message.
        message: String,
    },
}

/// The lookups remote boundary resolution needs from a geocoding service.
#[async_trait]
pub trait AreaService: Send + Sync {
    /// Geocodes an address; `Ok(None)` when nothing matches.
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedArea>, GeocodeError>;

    /// Outer boundary of a service area code; `Ok(None)` when the service
    /// has none.
    async fn boundary(&self, code: AreaCode) -> Result<Option<RawRings>, GeocodeError>;
}
