//! SGIS Open API client (Statistics Korea).
//!
//! Three endpoints are used: token issue, WGS84 geocoding of Korean
//! addresses, and administrative boundary lookup by service area code.
//! Every call carries the access token obtained by [`SgisClient::authenticate`].
//!
//! See <https://sgis.kostat.go.kr/developer/html/openApi/api/data.html>

use async_trait::async_trait;
use geojson::{GeoJson, Value};
use odsynth_boundary_models::{AreaCode, RawRings};
use odsynth_trip_models::GeoPoint;

use crate::address::compose_area_code;
use crate::service_registry::SgisService;
use crate::{AreaService, GeocodeError, GeocodedArea};

/// `errCd` value the service uses for "no matching address".
const NO_RESULT: i64 = -1;

/// Authenticated SGIS session.
#[derive(Debug, Clone)]
pub struct SgisClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    boundary_year: u16,
}

impl SgisClient {
    /// Issues an access token and returns a ready client.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails or the service rejects
    /// the credentials.
    pub async fn authenticate(
        service: &SgisService,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(service.timeout())
            .build()?;

        log::debug!("Requesting SGIS access token from {}", service.base_url);
        let body: serde_json::Value = client
            .get(format!("{}/auth/authentication.json", service.base_url))
            .query(&[
                ("consumer_key", consumer_key),
                ("consumer_secret", consumer_secret),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let access_token = parse_access_token(&body)?;
        log::info!("Authenticated with {}", service.name);

        Ok(Self {
            client,
            base_url: service.base_url.clone(),
            access_token,
            boundary_year: service.boundary_year,
        })
    }

    /// Geocodes a free-form Korean address.
    ///
    /// Returns `Ok(None)` when the service reports no match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
    pub async fn geocode(&self, address: &str) -> Result<Option<GeocodedArea>, GeocodeError> {
        log::trace!("Geocoding '{address}'");
        let body: serde_json::Value = self
            .client
            .get(format!("{}/addr/geocodewgs84.json", self.base_url))
            .query(&[
                ("accessToken", self.access_token.as_str()),
                ("address", address),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_geocode(&body)
    }

    /// Fetches the outer boundary of a service area code.
    ///
    /// Returns `Ok(None)` when the response holds no feature.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
    pub async fn boundary(&self, code: AreaCode) -> Result<Option<RawRings>, GeocodeError> {
        log::trace!("Fetching boundary for {code}");
        let text = self
            .client
            .get(format!("{}/boundary/hadmarea.geojson", self.base_url))
            .query(&[
                ("accessToken", self.access_token.clone()),
                ("year", self.boundary_year.to_string()),
                ("adm_cd", code.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_boundary(&text)
    }
}

#[async_trait]
impl AreaService for SgisClient {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedArea>, GeocodeError> {
        Self::geocode(self, address).await
    }

    async fn boundary(&self, code: AreaCode) -> Result<Option<RawRings>, GeocodeError> {
        Self::boundary(self, code).await
    }
}

fn parse_error(message: impl Into<String>) -> GeocodeError {
    GeocodeError::Parse {
        message: message.into(),
    }
}

/// Reads `errCd`/`errMsg`; `0` or absent means success.
fn check_status(body: &serde_json::Value) -> Result<Option<i64>, GeocodeError> {
    let code = body["errCd"]
        .as_i64()
        .or_else(|| body["errCd"].as_str().and_then(|s| s.parse().ok()));
    match code {
        None | Some(0) => Ok(None),
        Some(NO_RESULT) => Ok(Some(NO_RESULT)),
        Some(code) => Err(GeocodeError::Service {
            code,
            message: body["errMsg"].as_str().unwrap_or_default().to_string(),
        }),
    }
}

fn parse_access_token(body: &serde_json::Value) -> Result<String, GeocodeError> {
    if check_status(body)?.is_some() {
        return Err(GeocodeError::Service {
            code: NO_RESULT,
            message: body["errMsg"].as_str().unwrap_or_default().to_string(),
        });
    }
    body["result"]["accessToken"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(String::from)
        .ok_or_else(|| parse_error("Missing result.accessToken in SGIS response"))
}

/// Fields are strings in practice, occasionally numbers.
fn text_field<'a>(row: &'a serde_json::Value, key: &str) -> Option<std::borrow::Cow<'a, str>> {
    match &row[key] {
        serde_json::Value::String(s) => Some(std::borrow::Cow::Borrowed(s.as_str())),
        serde_json::Value::Number(n) => Some(std::borrow::Cow::Owned(n.to_string())),
        _ => None,
    }
}

fn parse_geocode(body: &serde_json::Value) -> Result<Option<GeocodedArea>, GeocodeError> {
    if check_status(body)?.is_some() {
        return Ok(None);
    }

    let Some(first) = body["result"]["resultdata"]
        .as_array()
        .and_then(|rows| rows.first())
    else {
        return Ok(None);
    };

    let sido_cd = text_field(first, "sido_cd")
        .ok_or_else(|| parse_error("Missing sido_cd in SGIS geocode result"))?;
    let sgg_cd = text_field(first, "sgg_cd");
    let adm_cd = text_field(first, "adm_cd");

    let area_code = compose_area_code(&sido_cd, sgg_cd.as_deref(), adm_cd.as_deref())
        .ok_or_else(|| parse_error(format!("Non-numeric area codes in SGIS result: {first}")))?;

    let coordinate = |key: &str| {
        text_field(first, key)
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| parse_error(format!("Missing {key} in SGIS geocode result")))
    };
    let point = GeoPoint::new(coordinate("x")?, coordinate("y")?);

    let name = |key: &str| text_field(first, key).map(|s| s.into_owned()).unwrap_or_default();

    Ok(Some(GeocodedArea {
        adm_code: adm_cd.and_then(|s| s.parse().ok()),
        area_code,
        sido_name: name("sido_nm"),
        sgg_name: name("sgg_nm"),
        dong_name: name("adm_nm"),
        point,
    }))
}

fn to_ring(positions: &[Vec<f64>]) -> Result<Vec<[f64; 2]>, GeocodeError> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok([*x, *y]),
            _ => Err(parse_error("Boundary position has fewer than two components")),
        })
        .collect()
}

fn parse_boundary(text: &str) -> Result<Option<RawRings>, GeocodeError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| parse_error(format!("Invalid boundary GeoJSON: {e}")))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(parse_error("Boundary response is not a FeatureCollection"));
    };

    let Some(geometry) = collection
        .features
        .into_iter()
        .next()
        .and_then(|feature| feature.geometry)
    else {
        return Ok(None);
    };

    match geometry.value {
        Value::Polygon(rings) => match rings.first() {
            Some(exterior) => Ok(Some(RawRings::Ring(to_ring(exterior)?))),
            None => Ok(None),
        },
        Value::MultiPolygon(polygons) => match polygons.first() {
            Some(rings) => Ok(Some(RawRings::Rings(
                rings.iter().map(|r| to_ring(r)).collect::<Result<_, _>>()?,
            ))),
            None => Ok(None),
        },
        other => Err(parse_error(format!(
            "Unexpected boundary geometry type: {}",
            other.type_name()
        ))),
    }
}
