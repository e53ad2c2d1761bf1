//! HTTP transport for directions requests.
//!
//! [`RouteTransport`] performs a single request and hands back the raw
//! status and body; retry and quota decisions belong to
//! [`crate::RouteClient`].

use async_trait::async_trait;
use serde::Serialize;

use crate::RouteError;
use crate::service_registry::RoutingService;

/// Body of a directions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionsRequest {
    /// `[[lon, lat], [lon, lat]]`, origin first.
    pub coordinates: [[f64; 2]; 2],
    pub preference: String,
    /// Snapping radius in metres per coordinate.
    pub radiuses: [u32; 2],
}

/// Status and body of a directions response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    #[must_use]
    pub const fn is_throttled(&self) -> bool {
        self.status == 429
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends directions requests for a routing profile.
#[async_trait]
pub trait RouteTransport: Send + Sync {
    /// Sends one request without retrying.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if no response was received.
    async fn directions(
        &self,
        profile: &str,
        request: &DirectionsRequest,
    ) -> Result<TransportResponse, RouteError>;
}

/// openrouteservice over HTTPS.
#[derive(Debug, Clone)]
pub struct OrsTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl OrsTransport {
    /// Builds a transport with the service's per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Http`] if the HTTP client cannot be built.
    pub fn new(service: &RoutingService, token: &str) -> Result<Self, RouteError> {
        let client = reqwest::Client::builder()
            .timeout(service.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: service.base_url.clone(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl RouteTransport for OrsTransport {
    async fn directions(
        &self,
        profile: &str,
        request: &DirectionsRequest,
    ) -> Result<TransportResponse, RouteError> {
        let response = self
            .client
            .post(format!("{}/v2/directions/{profile}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(
                reqwest::header::ACCEPT,
                "application/json, application/geo+json; charset=utf-8",
            )
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_api_shape() {
        let request = DirectionsRequest {
            coordinates: [[126.97, 37.56], [127.0, 37.55]],
            preference: "recommended".to_string(),
            radiuses: [2000, 2000],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "coordinates": [[126.97, 37.56], [127.0, 37.55]],
                "preference": "recommended",
                "radiuses": [2000, 2000]
            })
        );
    }

    #[test]
    fn classifies_status() {
        let throttled = TransportResponse {
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_throttled());
        assert!(!throttled.is_success());
        assert!(
            TransportResponse {
                status: 200,
                body: String::new()
            }
            .is_success()
        );
    }
}
