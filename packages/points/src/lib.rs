#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate generation for trip records.
//!
//! Every record gets an origin point sampled inside its origin area. The
//! destinations are split by the attendance probability: a fixed share of
//! records is pinned to the event location and the rest are spread over
//! the destination area. All points are geographic (longitude first).

pub mod destinations;
pub mod origins;

use odsynth_boundary::BoundaryError;
use odsynth_boundary_models::AreaPolygon;
use odsynth_projection::TransformError;
use odsynth_sampling::SampleError;
use odsynth_trip_models::GeoPoint;
use rand::Rng;

pub use destinations::{DestinationPoint, assign_destinations, split_counts};
pub use origins::assign_origins;

/// Errors raised while placing points.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    /// The area boundary could not be resolved.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// No point could be drawn inside the area.
    #[error("Sampling failed: {0}")]
    Sample(#[from] SampleError),

    /// A sampled grid point could not be reprojected.
    #[error("Reprojection failed: {0}")]
    Transform(#[from] TransformError),

    /// The attendance probability is outside `[0, 1]`.
    #[error("attendance probability {0} is outside [0, 1]")]
    InvalidProbability(f64),

    /// Some destinations need sampling but no destination area was given.
    #[error("{count} destination(s) need sampling but no destination area is available")]
    MissingArea {
        /// Number of points that needed the area.
        count: usize,
    },
}

/// Draws one point inside `area` and returns it in geographic coordinates.
///
/// # Errors
///
/// Returns [`PlacementError`] if sampling or reprojection fails.
pub fn sample_point<R: Rng + ?Sized>(
    area: &AreaPolygon,
    rng: &mut R,
) -> Result<GeoPoint, PlacementError> {
    let points = odsynth_sampling::sample(area, 1, rng)?;
    let point = points
        .into_iter()
        .next()
        .ok_or(SampleError::Exhausted { attempts: 0 })?;
    Ok(odsynth_projection::to_geographic(point)?)
}
