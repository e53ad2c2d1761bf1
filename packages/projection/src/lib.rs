#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Conversion between the Korean unified national grid and geographic
//! coordinates.
//!
//! Boundary polygons are delivered in EPSG:5179 (Korea 2000 / Unified CS),
//! a transverse Mercator grid on the GRS80 ellipsoid. The routing service
//! and map layers expect EPSG:4326 longitude/latitude. Korea 2000 is
//! geocentric, so no datum shift is applied between the two.
//!
//! Batches go through the same per-thread projection pair as single
//! points, so both granularities agree exactly.

use geo::Point;
use odsynth_trip_models::GeoPoint;
use proj4rs::proj::Proj;

/// PROJ definition of EPSG:5179.
pub const KOREA_UNIFIED: &str = "+proj=tmerc +lat_0=38 +lon_0=127.5 +k=0.9996 \
     +x_0=1000000 +y_0=2000000 +ellps=GRS80 +units=m +no_defs";

/// PROJ definition of the geographic side. Angles are radians inside
/// `proj4rs` and degrees at this crate's boundary.
pub const GEOGRAPHIC: &str = "+proj=longlat +ellps=GRS80 +no_defs";

/// Errors raised by the coordinate transform.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// A coordinate was NaN or infinite.
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite {
        /// First component.
        x: f64,
        /// Second component.
        y: f64,
    },

    /// A projection definition could not be parsed.
    #[error("invalid projection definition: {message}")]
    Definition { message: String },

    /// The projection rejected a coordinate.
    #[error("cannot transform ({x}, {y}): {source}")]
    Proj {
        x: f64,
        y: f64,
        #[source]
        source: proj4rs::errors::Error,
    },
}

/// The grid and geographic projections, parsed once per thread.
struct KoreaGrid {
    grid: Proj,
    geographic: Proj,
}

impl KoreaGrid {
    fn new() -> Result<Self, proj4rs::errors::Error> {
        Ok(Self {
            grid: Proj::from_proj_string(KOREA_UNIFIED)?,
            geographic: Proj::from_proj_string(GEOGRAPHIC)?,
        })
    }

    fn inverse(&self, x: f64, y: f64) -> Result<GeoPoint, TransformError> {
        let mut coord = (x, y, 0.0);
        proj4rs::transform::transform(&self.grid, &self.geographic, &mut coord)
            .map_err(|source| TransformError::Proj { x, y, source })?;
        Ok(GeoPoint::new(coord.0.to_degrees(), coord.1.to_degrees()))
    }

    fn forward(&self, point: GeoPoint) -> Result<Point<f64>, TransformError> {
        let mut coord = (point.lon.to_radians(), point.lat.to_radians(), 0.0);
        proj4rs::transform::transform(&self.geographic, &self.grid, &mut coord).map_err(
            |source| TransformError::Proj {
                x: point.lon,
                y: point.lat,
                source,
            },
        )?;
        Ok(Point::new(coord.0, coord.1))
    }
}

thread_local! {
    static PROJECTIONS: Result<KoreaGrid, proj4rs::errors::Error> = KoreaGrid::new();
}

fn with_projections<T>(
    f: impl FnOnce(&KoreaGrid) -> Result<T, TransformError>,
) -> Result<T, TransformError> {
    PROJECTIONS.with(|projections| match projections {
        Ok(projections) => f(projections),
        Err(e) => Err(TransformError::Definition {
            message: e.to_string(),
        }),
    })
}

const fn check_finite(x: f64, y: f64) -> Result<(), TransformError> {
    if x.is_finite() && y.is_finite() {
        Ok(())
    } else {
        Err(TransformError::NonFinite { x, y })
    }
}

/// Converts one grid point (EPSG:5179) to geographic coordinates.
///
/// # Errors
///
/// Returns [`TransformError::NonFinite`] for NaN or infinite input, or
/// [`TransformError::Proj`] if the projection rejects the point.
pub fn to_geographic(point: Point<f64>) -> Result<GeoPoint, TransformError> {
    check_finite(point.x(), point.y())?;
    with_projections(|p| p.inverse(point.x(), point.y()))
}

/// Converts a batch of grid points. An empty batch yields an empty result.
///
/// # Errors
///
/// Returns the error of the first point that fails.
pub fn to_geographic_batch(points: &[Point<f64>]) -> Result<Vec<GeoPoint>, TransformError> {
    with_projections(|p| {
        points
            .iter()
            .map(|point| {
                check_finite(point.x(), point.y())?;
                p.inverse(point.x(), point.y())
            })
            .collect()
    })
}

/// Converts a geographic point back to the national grid.
///
/// # Errors
///
/// Returns [`TransformError::NonFinite`] for NaN or infinite input, or
/// [`TransformError::Proj`] if the projection rejects the point.
pub fn to_grid(point: GeoPoint) -> Result<Point<f64>, TransformError> {
    check_finite(point.lon, point.lat)?;
    with_projections(|p| p.forward(point))
}
