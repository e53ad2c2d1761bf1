#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rate-limited client for the openrouteservice directions API.
//!
//! The free plan allows 40 requests per rolling minute. [`RateLimiter`]
//! enforces that ceiling locally, [`RouteClient`] adds a single retry after
//! a throttled response and turns every other failure into a per-record
//! [`RouteError`]. Service settings come from
//! `services/openrouteservice.toml` via [`service_registry`].

pub mod client;
pub mod limiter;
pub mod service_registry;
pub mod transport;

pub use client::{RouteClient, RouteJob, decode_geometry};
pub use limiter::{RateLimitState, RateLimiter, write_state};
pub use transport::{DirectionsRequest, OrsTransport, RouteTransport, TransportResponse};

/// Errors for a single route request. None of these abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service kept throttling after the retry.
    #[error("throttled by the routing service after {attempts} attempts")]
    Throttled {
        /// Requests sent for this record.
        attempts: u32,
    },

    /// Non-success status other than 429.
    #[error("routing service returned HTTP {status}: {body}")]
    Status {
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// The response body is not JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response has no `routes[0].geometry`.
    #[error("response has no route geometry: {body}")]
    MissingGeometry {
        /// Start of the response body.
        body: String,
    },

    /// The route geometry could not be decoded.
    #[error("invalid route geometry: {message}")]
    Geometry { message: String },
}
