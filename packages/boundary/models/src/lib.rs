#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative area codes and boundary geometry types.
//!
//! Boundaries arrive as nested coordinate arrays in the national grid
//! reference system (EPSG:5179). A two-dimensional array is a single ring;
//! a three-dimensional array is a set of rings, each of which becomes its
//! own polygon. [`AreaPolygon::from_rings`] performs that classification.

use std::fmt;

use geo::{Area, BoundingRect, Contains, LineString, MultiPolygon, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Identifier of a sub-city administrative division.
///
/// Codes are numeric. The all-zero code is reserved for areas the
/// geocoding service could not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct AreaCode(pub u64);

impl AreaCode {
    /// The reserved "unresolvable area" code (`00000000`).
    pub const SENTINEL: Self = Self(0);

    /// Returns `true` if this is the reserved unresolvable-area code.
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        self.0 == Self::SENTINEL.0
    }

    /// Returns the raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AreaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AreaCode {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl<'de> Deserialize<'de> for AreaCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Codes show up as integers, floats (`1101053.0`) and zero-padded
        // strings (`"00000000"`) depending on which tool wrote the file.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Ok(Self(v)),
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::float_cmp
            )]
            Raw::Float(v) if v >= 0.0 && v.fract() == 0.0 => Ok(Self(v as u64)),
            Raw::Float(v) => Err(serde::de::Error::custom(format!(
                "invalid area code {v}"
            ))),
            Raw::Text(s) => s
                .parse()
                .map_err(|e| serde::de::Error::custom(format!("invalid area code '{s}': {e}"))),
        }
    }
}

/// Which code column a lookup is keyed by.
///
/// The mobility dataset and the geocoding service number areas
/// differently, so every boundary source is built for one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Codes as they appear in the origin-destination dataset.
    Dataset,
    /// Codes as issued by the geocoding service.
    Api,
}

/// Boundary coordinates exactly as delivered by a boundary source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRings {
    /// A single ring (2D array of `[x, y]` pairs).
    Ring(Vec<[f64; 2]>),
    /// Several rings (3D array); each ring becomes one polygon.
    Rings(Vec<Vec<[f64; 2]>>),
}

/// Errors raised while turning raw rings into polygon geometry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// No rings were supplied.
    #[error("boundary has no rings")]
    Empty,

    /// A ring has fewer than three distinct vertices.
    #[error("ring {index} has {len} vertices, need at least 3")]
    DegenerateRing {
        /// Position of the offending ring.
        index: usize,
        /// Number of vertices found.
        len: usize,
    },
}

/// Boundary geometry for one administrative area, in grid coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaPolygon {
    /// A single-ring area.
    Polygon(Polygon<f64>),
    /// An area made of several disjoint rings.
    MultiPolygon(MultiPolygon<f64>),
}

impl AreaPolygon {
    /// Classifies raw rings by dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if there are no rings or a ring has fewer
    /// than three vertices.
    pub fn from_rings(rings: RawRings) -> Result<Self, GeometryError> {
        match rings {
            RawRings::Ring(ring) => Ok(Self::Polygon(to_polygon(0, ring)?)),
            RawRings::Rings(rings) => {
                if rings.is_empty() {
                    return Err(GeometryError::Empty);
                }
                let polygons = rings
                    .into_iter()
                    .enumerate()
                    .map(|(i, ring)| to_polygon(i, ring))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::MultiPolygon(MultiPolygon::new(polygons)))
            }
        }
    }

    /// Returns the component polygons (one for a single polygon).
    #[must_use]
    pub fn parts(&self) -> Vec<&Polygon<f64>> {
        match self {
            Self::Polygon(p) => vec![p],
            Self::MultiPolygon(mp) => mp.0.iter().collect(),
        }
    }

    /// Total unsigned area in squared grid units (square metres).
    #[must_use]
    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(p) => p.unsigned_area(),
            Self::MultiPolygon(mp) => mp.unsigned_area(),
        }
    }

    /// Axis-aligned bounding box, or `None` for empty geometry.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Polygon(p) => p.bounding_rect(),
            Self::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    /// Returns `true` if `point` lies in the interior of the area.
    #[must_use]
    pub fn contains(&self, point: &Point<f64>) -> bool {
        match self {
            Self::Polygon(p) => p.contains(point),
            Self::MultiPolygon(mp) => mp.contains(point),
        }
    }
}

fn to_polygon(index: usize, ring: Vec<[f64; 2]>) -> Result<Polygon<f64>, GeometryError> {
    let mut distinct = ring.clone();
    if distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    if distinct.len() < 3 {
        return Err(GeometryError::DegenerateRing {
            index,
            len: distinct.len(),
        });
    }
    let exterior: LineString<f64> = ring.into_iter().map(|[x, y]| (x, y)).collect();
    Ok(Polygon::new(exterior, vec![]))
}
