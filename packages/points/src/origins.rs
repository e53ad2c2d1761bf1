//! Origin placement.

use odsynth_boundary::PolygonResolver;
use odsynth_boundary_models::CodeKind;
use odsynth_trip_models::progress::ProgressCallback;
use odsynth_trip_models::{GeoPoint, TripRecord};
use rand::Rng;

use crate::{PlacementError, sample_point};

/// Assigns one origin point per record, in record order.
///
/// Each record's origin area is resolved by its dataset code and one point
/// is sampled inside it. Failures stay with their record: the returned
/// vector has exactly one entry per input record.
pub async fn assign_origins<R: Rng + ?Sized>(
    records: &[TripRecord],
    resolver: &mut PolygonResolver,
    rng: &mut R,
    progress: &dyn ProgressCallback,
) -> Vec<Result<GeoPoint, PlacementError>> {
    progress.set_total(records.len() as u64);
    progress.set_message("Sampling origins".to_string());

    let mut placed = Vec::with_capacity(records.len());
    let mut failures = 0_usize;

    for record in records {
        let result = match resolver.resolve(record.origin_area, CodeKind::Dataset).await {
            Ok(area) => sample_point(&area, rng),
            Err(e) => Err(PlacementError::from(e)),
        };
        if let Err(e) = &result {
            failures += 1;
            log::warn!("Origin {} could not be placed: {e}", record.origin_area);
        }
        placed.push(result);
        progress.inc(1);
    }

    progress.finish(format!(
        "{} origin(s) placed, {failures} failed",
        records.len() - failures
    ));
    log::info!(
        "Placed {} of {} origins ({} distinct area(s) looked up)",
        records.len() - failures,
        records.len(),
        resolver.cached()
    );

    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use odsynth_boundary::{BoundaryError, BoundarySource};
    use odsynth_boundary_models::{AreaCode, RawRings};
    use odsynth_sampling::seeded_rng;
    use odsynth_trip_models::progress::NullProgress;

    /// A 1 km square around Seoul City Hall for code 1, nothing else.
    struct OneSquare;

    #[async_trait]
    impl BoundarySource for OneSquare {
        fn id(&self) -> &'static str {
            "one-square"
        }

        async fn fetch(&self, code: AreaCode, kind: CodeKind) -> Result<RawRings, BoundaryError> {
            if code == AreaCode(1) {
                Ok(RawRings::Ring(vec![
                    [953_500.0, 1_951_500.0],
                    [954_500.0, 1_951_500.0],
                    [954_500.0, 1_952_500.0],
                    [953_500.0, 1_952_500.0],
                    [953_500.0, 1_951_500.0],
                ]))
            } else {
                Err(BoundaryError::Unresolved { code, kind })
            }
        }
    }

    fn record(origin: u64) -> TripRecord {
        TripRecord {
            origin_area: AreaCode(origin),
            dest_area: AreaCode(1),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            gender: "F".to_string(),
            age: "30".to_string(),
            mode_code: 0,
            origin_purpose: "1".to_string(),
            dest_purpose: "2".to_string(),
            avg_distance: 1200.0,
            avg_duration: 15.0,
            trip_count: 3.0,
        }
    }

    #[tokio::test]
    async fn failures_stay_with_their_record() {
        let records: Vec<_> = [1, 1, 0, 5, 1].into_iter().map(record).collect();
        let mut resolver = PolygonResolver::new(Box::new(OneSquare));
        let (mut rng, _) = seeded_rng(Some(3));

        let placed = assign_origins(&records, &mut resolver, &mut rng, &NullProgress).await;

        assert_eq!(placed.len(), 5);
        let ok: Vec<bool> = placed.iter().map(Result::is_ok).collect();
        assert_eq!(ok, [true, true, false, false, true]);
        assert!(matches!(
            placed[2],
            Err(PlacementError::Boundary(BoundaryError::Unresolved { .. }))
        ));
    }

    #[tokio::test]
    async fn origins_land_near_the_area() {
        let records: Vec<_> = (0..50).map(|_| record(1)).collect();
        let mut resolver = PolygonResolver::new(Box::new(OneSquare));
        let (mut rng, _) = seeded_rng(Some(8));

        let placed = assign_origins(&records, &mut resolver, &mut rng, &NullProgress).await;

        for point in placed.into_iter().map(Result::unwrap) {
            assert!((point.lon - 126.98).abs() < 0.02, "{point}");
            assert!((point.lat - 37.566).abs() < 0.02, "{point}");
        }
        assert_eq!(resolver.cached(), 1);
    }
}
