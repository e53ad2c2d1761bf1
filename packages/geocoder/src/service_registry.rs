//! Compile-time registry of the geocoding service configuration.
//!
//! The SGIS endpoint settings live in `services/sgis.toml` and are embedded
//! at compile time, so a binary always carries a known-good default.

use std::time::Duration;

use serde::Deserialize;

/// SGIS service settings loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct SgisService {
    /// Unique identifier (`"sgis"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API root, without trailing slash.
    pub base_url: String,
    /// Boundary vintage passed as `year` to the boundary endpoint.
    pub boundary_year: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

impl SgisService {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const SGIS_TOML: &str = include_str!("../services/sgis.toml");

/// Returns the embedded SGIS configuration.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (caught by the tests below).
#[must_use]
pub fn sgis() -> SgisService {
    toml::de::from_str(SGIS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse geocoding service 'sgis': {e}"))
}
