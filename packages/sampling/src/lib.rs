#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Uniform point sampling inside boundary polygons.
//!
//! Draws a homogeneous Poisson point process conditioned on the number of
//! points, restricted to an [`AreaPolygon`]. Each point is produced by
//! acceptance-rejection against the bounding box of one component polygon.
//! For a multipolygon the component is chosen per draw with probability
//! proportional to its area, so the intensity is the same everywhere in
//! the area.
//!
//! All randomness comes from the caller's [`Rng`]; use [`seeded_rng`] for a
//! reproducible source.

use geo::{Area, BoundingRect, Contains, Point, Polygon, Rect};
use odsynth_boundary_models::AreaPolygon;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

/// Rejection draws allowed per accepted point before giving up.
const MAX_ATTEMPTS_PER_POINT: u32 = 100_000;

/// Errors raised while sampling.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SampleError {
    /// The area has no positive surface to sample from.
    #[error("area is degenerate (total area {area})")]
    DegenerateArea {
        /// Total unsigned area found.
        area: f64,
    },

    /// Rejection sampling failed to land inside the polygon.
    #[error("no interior point found after {attempts} draws")]
    Exhausted {
        /// Number of draws attempted.
        attempts: u32,
    },
}

/// Creates the pipeline's random source. Returns the seed actually used so
/// that an unseeded run can be logged and reproduced.
#[must_use]
pub fn seeded_rng(seed: Option<u64>) -> (XorShiftRng, u64) {
    let seed = seed.unwrap_or_else(rand::random);
    (XorShiftRng::seed_from_u64(seed), seed)
}

/// A component polygon prepared for rejection sampling.
struct Part<'a> {
    polygon: &'a Polygon<f64>,
    bounds: Rect<f64>,
}

/// Samples exactly `count` points uniformly inside `area`.
///
/// Points are in the same reference system as the polygon (grid
/// coordinates). `count == 0` returns an empty vector without inspecting
/// the geometry.
///
/// # Errors
///
/// Returns [`SampleError::DegenerateArea`] if the area is zero, or
/// [`SampleError::Exhausted`] if a point cannot be placed.
pub fn sample<R: Rng + ?Sized>(
    area: &AreaPolygon,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Point<f64>>, SampleError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut parts = Vec::new();
    let mut weights = Vec::new();
    for polygon in area.parts() {
        let Some(bounds) = polygon.bounding_rect() else {
            continue;
        };
        let weight = polygon.unsigned_area();
        if weight > 0.0 && bounds.width() > 0.0 && bounds.height() > 0.0 {
            parts.push(Part { polygon, bounds });
            weights.push(weight);
        }
    }

    let total: f64 = weights.iter().sum();
    let chooser = WeightedIndex::new(&weights)
        .map_err(|_| SampleError::DegenerateArea { area: total })?;

    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let part = &parts[chooser.sample(rng)];
        points.push(sample_in_part(part, rng)?);
    }

    log::trace!(
        "Sampled {count} points over {} component(s), total area {total:.1}",
        parts.len()
    );

    Ok(points)
}

fn sample_in_part<R: Rng + ?Sized>(part: &Part<'_>, rng: &mut R) -> Result<Point<f64>, SampleError> {
    let min = part.bounds.min();
    let max = part.bounds.max();
    for _ in 0..MAX_ATTEMPTS_PER_POINT {
        let candidate = Point::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
        if part.polygon.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(SampleError::Exhausted {
        attempts: MAX_ATTEMPTS_PER_POINT,
    })
}
