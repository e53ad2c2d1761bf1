//! Boundary source backed by the SGIS Open API.
//!
//! Service codes are fetched directly. Dataset codes are first translated
//! by geocoding the area's names from the code table, since the dataset
//! numbering has no published mapping to the service's.

use std::sync::Arc;

use async_trait::async_trait;
use odsynth_boundary_models::{AreaCode, CodeKind, RawRings};
use odsynth_geocoder::AreaService;
use odsynth_geocoder::address::location_query;

use crate::table::AreaTable;
use crate::{BoundaryError, BoundarySource};

/// Remote boundary lookups through a geocoding [`AreaService`], normally
/// an authenticated `SgisClient`.
pub struct SgisBoundaries {
    service: Arc<dyn AreaService>,
    table: Arc<AreaTable>,
}

impl SgisBoundaries {
    #[must_use]
    pub fn new(service: Arc<dyn AreaService>, table: Arc<AreaTable>) -> Self {
        Self { service, table }
    }

    /// Maps a dataset code to a service code by geocoding its names.
    /// Returns the sentinel code when the service finds no match.
    async fn service_code(&self, code: AreaCode) -> Result<AreaCode, BoundaryError> {
        let unresolved = BoundaryError::Unresolved {
            code,
            kind: CodeKind::Dataset,
        };
        let Some(entry) = self.table.find(code, CodeKind::Dataset) else {
            return Err(unresolved);
        };
        let Some(sido) = entry.sido_name.as_deref() else {
            return Err(unresolved);
        };
        let query = location_query(sido, entry.sgg_name.as_deref(), entry.dong_name.as_deref());

        match self.service.geocode(&query).await? {
            Some(area) => {
                log::debug!("{code} ('{query}') -> service code {}", area.area_code);
                Ok(area.area_code)
            }
            None => {
                log::debug!("No geocoding match for {code} ('{query}')");
                Ok(AreaCode::SENTINEL)
            }
        }
    }
}

#[async_trait]
impl BoundarySource for SgisBoundaries {
    fn id(&self) -> &'static str {
        "sgis"
    }

    async fn fetch(&self, code: AreaCode, kind: CodeKind) -> Result<RawRings, BoundaryError> {
        let service_code = match kind {
            CodeKind::Api => code,
            CodeKind::Dataset => self.service_code(code).await?,
        };

        if service_code.is_sentinel() {
            return Err(BoundaryError::Unresolved { code, kind });
        }

        self.service
            .boundary(service_code)
            .await?
            .ok_or(BoundaryError::Unresolved { code, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use odsynth_geocoder::{GeocodeError, GeocodedArea};
    use odsynth_trip_models::GeoPoint;

    use crate::table::AreaEntry;

    const DATASET_CODE: AreaCode = AreaCode(1_102_058);
    const SERVICE_CODE: AreaCode = AreaCode(11_020_580);

    fn square() -> RawRings {
        RawRings::Ring(vec![
            [953_000.0, 1_951_000.0],
            [954_000.0, 1_951_000.0],
            [954_000.0, 1_952_000.0],
            [953_000.0, 1_951_000.0],
        ])
    }

    /// Geocodes queries naming a known dong and serves one boundary.
    struct ScriptedAreas {
        dongs: Vec<(&'static str, AreaCode)>,
        boundaries: Vec<(AreaCode, RawRings)>,
        queries: Mutex<Vec<String>>,
        boundary_calls: Mutex<Vec<AreaCode>>,
    }

    impl ScriptedAreas {
        fn new(dongs: Vec<(&'static str, AreaCode)>, boundaries: Vec<(AreaCode, RawRings)>) -> Self {
            Self {
                dongs,
                boundaries,
                queries: Mutex::new(Vec::new()),
                boundary_calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AreaService for ScriptedAreas {
        async fn geocode(&self, address: &str) -> Result<Option<GeocodedArea>, GeocodeError> {
            self.queries.lock().unwrap().push(address.to_string());
            Ok(self
                .dongs
                .iter()
                .find(|(dong, _)| address.contains(dong))
                .map(|&(dong, area_code)| GeocodedArea {
                    adm_code: Some(area_code),
                    area_code,
                    sido_name: "서울특별시".to_string(),
                    sgg_name: "중구".to_string(),
                    dong_name: dong.to_string(),
                    point: GeoPoint::new(126.9857, 37.5609),
                }))
        }

        async fn boundary(&self, code: AreaCode) -> Result<Option<RawRings>, GeocodeError> {
            self.boundary_calls.lock().unwrap().push(code);
            Ok(self
                .boundaries
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, rings)| rings.clone()))
        }
    }

    fn entry(code: AreaCode, sido: Option<&str>, dong: &str) -> AreaEntry {
        AreaEntry {
            code,
            api_code: None,
            sido_name: sido.map(String::from),
            sgg_name: Some("중구".to_string()),
            dong_name: Some(dong.to_string()),
            boundary: None,
        }
    }

    fn source(service: &Arc<ScriptedAreas>, entries: Vec<AreaEntry>) -> SgisBoundaries {
        let service: Arc<dyn AreaService> = service.clone();
        SgisBoundaries::new(service, Arc::new(AreaTable::new(entries)))
    }

    #[tokio::test]
    async fn dataset_code_is_geocoded_by_name_then_fetched() {
        let service = Arc::new(ScriptedAreas::new(
            vec![("신당5동", SERVICE_CODE)],
            vec![(SERVICE_CODE, square())],
        ));
        let boundaries = source(
            &service,
            vec![entry(DATASET_CODE, Some("서울특별시"), "신당제5동")],
        );

        let rings = boundaries.fetch(DATASET_CODE, CodeKind::Dataset).await.unwrap();

        assert_eq!(rings, square());
        let queries = service.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0], "서울특별시 중구 신당5동");
        assert_eq!(*service.boundary_calls.lock().unwrap(), vec![SERVICE_CODE]);
    }

    #[tokio::test]
    async fn service_codes_skip_geocoding() {
        let service = Arc::new(ScriptedAreas::new(vec![], vec![(SERVICE_CODE, square())]));
        let boundaries = source(&service, vec![]);

        assert_eq!(
            boundaries.fetch(SERVICE_CODE, CodeKind::Api).await.unwrap(),
            square()
        );
        assert!(service.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_geocoding_match_is_unresolved_without_a_boundary_request() {
        let service = Arc::new(ScriptedAreas::new(vec![], vec![(SERVICE_CODE, square())]));
        let boundaries = source(
            &service,
            vec![entry(DATASET_CODE, Some("서울특별시"), "명동")],
        );

        let err = boundaries
            .fetch(DATASET_CODE, CodeKind::Dataset)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BoundaryError::Unresolved { code, kind: CodeKind::Dataset } if code == DATASET_CODE
        ));
        assert_eq!(service.queries.lock().unwrap().len(), 1);
        assert!(service.boundary_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_province_name_is_unresolved() {
        let service = Arc::new(ScriptedAreas::new(
            vec![("명동", SERVICE_CODE)],
            vec![(SERVICE_CODE, square())],
        ));
        let boundaries = source(&service, vec![entry(DATASET_CODE, None, "명동")]);

        assert!(
            boundaries
                .fetch(DATASET_CODE, CodeKind::Dataset)
                .await
                .unwrap_err()
                .is_unresolved()
        );
        assert!(
            boundaries
                .fetch(AreaCode(9_999_999), CodeKind::Dataset)
                .await
                .unwrap_err()
                .is_unresolved()
        );
        assert!(service.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_boundary_response_is_unresolved() {
        let service = Arc::new(ScriptedAreas::new(vec![("명동", SERVICE_CODE)], vec![]));
        let boundaries = source(
            &service,
            vec![entry(DATASET_CODE, Some("서울특별시"), "명동")],
        );

        let err = boundaries
            .fetch(DATASET_CODE, CodeKind::Dataset)
            .await
            .unwrap_err();

        assert!(err.is_unresolved());
        assert_eq!(*service.boundary_calls.lock().unwrap(), vec![SERVICE_CODE]);
    }
}
