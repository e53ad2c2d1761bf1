//! Route resolution with quota, throttle retry and per-record isolation.

use std::sync::Arc;
use std::time::Duration;

use odsynth_trip_models::progress::ProgressCallback;
use odsynth_trip_models::{GeoPoint, Route, TravelMode};

use crate::RouteError;
use crate::limiter::RateLimiter;
use crate::service_registry::RoutingService;
use crate::transport::{DirectionsRequest, RouteTransport, TransportResponse};

/// Precision of the encoded route geometry.
const POLYLINE_PRECISION: u32 = 5;

/// Longest error body kept in a [`RouteError`].
const BODY_PREVIEW_LEN: usize = 300;

/// One origin-destination pair to route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteJob {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub mode: TravelMode,
}

/// Outcome of a single request.
enum Attempt {
    Done(Route),
    Throttled,
    Failed(RouteError),
}

/// Directions client that never lets one record's failure stop a batch.
///
/// Every request, including the retry after a throttled response, first
/// takes a slot from the shared [`RateLimiter`].
pub struct RouteClient {
    transport: Box<dyn RouteTransport>,
    limiter: Arc<RateLimiter>,
    cooldown: Duration,
    preference: String,
    radius_m: u32,
}

impl RouteClient {
    #[must_use]
    pub fn new(
        transport: Box<dyn RouteTransport>,
        limiter: Arc<RateLimiter>,
        service: &RoutingService,
    ) -> Self {
        Self {
            transport,
            limiter,
            cooldown: service.rate_limit.cooldown(),
            preference: service.preference.clone(),
            radius_m: service.radius_m,
        }
    }

    /// Resolves the route between two points.
    ///
    /// A throttled response is retried once after the cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the request failed, was throttled twice, or
    /// the response carried no usable geometry.
    pub async fn resolve_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        mode: TravelMode,
    ) -> Result<Route, RouteError> {
        let request = DirectionsRequest {
            coordinates: [origin.into(), destination.into()],
            preference: self.preference.clone(),
            radiuses: [self.radius_m, self.radius_m],
        };

        match self.attempt(mode, &request).await {
            Attempt::Done(route) => return Ok(route),
            Attempt::Failed(e) => return Err(e),
            Attempt::Throttled => {}
        }

        log::warn!(
            "Routing service throttled the request, retrying in {}s",
            self.cooldown.as_secs()
        );
        tokio::time::sleep(self.cooldown).await;

        match self.attempt(mode, &request).await {
            Attempt::Done(route) => Ok(route),
            Attempt::Failed(e) => Err(e),
            Attempt::Throttled => Err(RouteError::Throttled { attempts: 2 }),
        }
    }

    /// Resolves a batch sequentially, returning one result per job in job
    /// order.
    pub async fn resolve_batch(
        &self,
        jobs: &[RouteJob],
        progress: &dyn ProgressCallback,
    ) -> Vec<Result<Route, RouteError>> {
        progress.set_total(jobs.len() as u64);
        progress.set_message("Resolving routes".to_string());

        let mut results = Vec::with_capacity(jobs.len());
        let mut failures = 0_usize;
        for (i, job) in jobs.iter().enumerate() {
            let result = self
                .resolve_route(job.origin, job.destination, job.mode)
                .await;
            if let Err(e) = &result {
                failures += 1;
                log::warn!("Route {} of {} failed: {e}", i + 1, jobs.len());
            }
            results.push(result);
            progress.inc(1);
        }

        progress.finish(format!(
            "{} route(s) resolved, {failures} failed",
            jobs.len() - failures
        ));
        results
    }

    async fn attempt(&self, mode: TravelMode, request: &DirectionsRequest) -> Attempt {
        self.limiter.acquire().await;
        match self.transport.directions(mode.profile(), request).await {
            Ok(response) if response.is_throttled() => Attempt::Throttled,
            Ok(response) => match parse_response(&response) {
                Ok(route) => Attempt::Done(route),
                Err(e) => Attempt::Failed(e),
            },
            Err(e) => Attempt::Failed(e),
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_LEN).collect()
}

/// Extracts and decodes `routes[0].geometry`.
fn parse_response(response: &TransportResponse) -> Result<Route, RouteError> {
    if !response.is_success() {
        return Err(RouteError::Status {
            status: response.status,
            body: preview(&response.body),
        });
    }

    let body: serde_json::Value = serde_json::from_str(&response.body)?;
    let encoded = body["routes"][0]["geometry"]
        .as_str()
        .ok_or_else(|| RouteError::MissingGeometry {
            body: preview(&response.body),
        })?;

    decode_geometry(encoded)
}

/// Decodes an encoded polyline into `(lon, lat)` points.
///
/// # Errors
///
/// Returns [`RouteError::Geometry`] if the string is not a valid polyline.
pub fn decode_geometry(encoded: &str) -> Result<Route, RouteError> {
    let line = polyline::decode_polyline(encoded, POLYLINE_PRECISION).map_err(|e| {
        RouteError::Geometry {
            message: e.to_string(),
        }
    })?;
    Ok(Route::new(
        line.coords().map(|c| GeoPoint::new(c.x, c.y)).collect(),
    ))
}
