//! Travel mode codes and routing profile names.
//!
//! The mobility dataset records travel mode as a small integer. The routing
//! service selects its profile through a URL path segment, so every code
//! maps onto exactly one profile name.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Routing profile used for a trip.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TravelMode {
    /// Passenger car.
    #[serde(rename = "driving-car")]
    #[strum(serialize = "driving-car")]
    Car,
    /// Heavy-goods vehicle.
    #[serde(rename = "driving-hgv")]
    #[strum(serialize = "driving-hgv")]
    HeavyGoods,
    /// Walking.
    #[serde(rename = "foot-walking")]
    #[strum(serialize = "foot-walking")]
    Walking,
    /// Cycling.
    #[serde(rename = "cycling-regular")]
    #[strum(serialize = "cycling-regular")]
    Cycling,
}

impl TravelMode {
    /// Maps a dataset mode code onto a routing profile.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownModeCode`] for codes outside `0..=7`.
    pub const fn from_code(code: u8) -> Result<Self, UnknownModeCode> {
        match code {
            0 | 2 | 5 | 7 => Ok(Self::Car),
            1 | 6 => Ok(Self::HeavyGoods),
            3 => Ok(Self::Walking),
            4 => Ok(Self::Cycling),
            _ => Err(UnknownModeCode { code }),
        }
    }

    /// Profile name as used in the routing service URL.
    #[must_use]
    pub fn profile(self) -> &'static str {
        match self {
            Self::Car => "driving-car",
            Self::HeavyGoods => "driving-hgv",
            Self::Walking => "foot-walking",
            Self::Cycling => "cycling-regular",
        }
    }
}

/// A mode code with no routing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownModeCode {
    pub code: u8,
}

impl std::fmt::Display for UnknownModeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unmapped travel mode code {}: expected 0-7", self.code)
    }
}

impl std::error::Error for UnknownModeCode {}

/// Deserializes a mode code written as an integer, an integral float
/// (`3.0`) or a numeric string.
///
/// # Errors
///
/// Returns an error for negative, fractional, out-of-range or non-numeric
/// values.
pub fn deserialize_code<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Int(v) => v,
        Raw::Text(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<u64>() {
                Ok(v) => v,
                Err(_) => float_code(trimmed.parse::<f64>().map_err(|_| {
                    serde::de::Error::custom(format!("invalid mode code '{s}'"))
                })?)
                .map_err(serde::de::Error::custom)?,
            }
        }
        Raw::Float(v) => float_code(v).map_err(serde::de::Error::custom)?,
    };

    u8::try_from(value).map_err(|_| serde::de::Error::custom(format!("mode code {value} out of range")))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_code(v: f64) -> Result<u64, String> {
    if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u8::MAX) {
        Ok(v as u64)
    } else {
        Err(format!("invalid mode code {v}"))
    }
}
