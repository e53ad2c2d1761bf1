//! Routing stages: a random sample of placed trips, or fixed origins.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use odsynth_dataset::error_table::ErrorRow;
use odsynth_dataset::output::{
    fixed_origins_dir, fixed_origins_file_name, routes_dir, routes_file_name, write_checkpoint,
    write_records,
};
use odsynth_routing::service_registry::{self, RoutingService};
use odsynth_routing::{
    OrsTransport, RateLimitState, RateLimiter, RouteClient, RouteJob, write_state,
};
use odsynth_trip_models::progress::ProgressCallback;
use odsynth_trip_models::{
    FixedRouteRecord, GeoPoint, PlacedTrip, RoutedTrip, TravelMode, UnknownModeCode,
};
use rand::Rng;

use crate::config::{ConfigError, PipelineConfig, validate_sample_size};
use crate::{Operator, PipelineError, RunSummary, Stage, now, run_key};

/// Routes a random sample of `placed` and saves the routed records.
/// Failed routes are appended to `errors`.
///
/// # Errors
///
/// Returns [`PipelineError`] for an invalid sample size, an unmapped mode
/// code, or when results cannot be written. Failed routes are not errors.
pub async fn route_sample<R: Rng + ?Sized>(
    config: &PipelineConfig,
    placed: Vec<PlacedTrip>,
    operator: &dyn Operator,
    rng: &mut R,
    summary: &mut RunSummary,
    errors: &mut Vec<ErrorRow>,
) -> Result<(), PipelineError> {
    let key = run_key(config)?;
    let service = service_registry::openrouteservice();
    let cap = service.rate_limit.daily_cap;
    log::info!(
        "{} record(s) available; {} allows {cap} requests per day",
        placed.len(),
        service.name
    );

    let n = match config.samples {
        Some(n) => n,
        None => operator.sample_size(placed.len(), cap)?,
    };
    let n = validate_sample_size(n, placed.len(), cap)?;
    let sampled = draw_sample(placed, n, rng);
    let jobs = route_jobs(&sampled)?;

    let start = Instant::now();
    let limiter = load_limiter(config.rate_limit_state_path.as_deref(), &service)?;
    let client = route_client(config, &service, limiter)?;
    let progress = operator.progress(Stage::Routes);
    let (routed, failed) = route_placed(&client, sampled, &jobs, progress.as_ref()).await;

    let dir = routes_dir(&config.save_directory, &key);
    let path = dir.join(routes_file_name(routed.len()));
    write_records(&path, &routed)?;
    write_checkpoint(&dir, &config.redacted())?;

    log::info!(
        "Routes stage finished in {:.1}s: {} routed, {} failed",
        start.elapsed().as_secs_f64(),
        routed.len(),
        failed.len()
    );
    summary.routed += routed.len();
    summary.outputs.push(path);
    errors.extend(failed);
    Ok(())
}

/// Routes every configured fixed origin to the fixed destination.
/// Failed routes are appended to `errors`.
///
/// # Errors
///
/// Returns [`PipelineError`] if the configuration is incomplete, the
/// origins exceed the daily cap, or results cannot be written.
pub async fn route_fixed_origins(
    config: &PipelineConfig,
    operator: &dyn Operator,
    summary: &mut RunSummary,
    errors: &mut Vec<ErrorRow>,
) -> Result<(), PipelineError> {
    let missing = |field| ConfigError::Missing {
        field,
        mode: config.mode,
    };
    let destination = config
        .fixed_destination
        .ok_or_else(|| missing("fixed_destination"))?;
    let mode = config.profile.ok_or_else(|| missing("profile"))?;

    let service = service_registry::openrouteservice();
    validate_sample_size(
        config.fixed_origins.len(),
        config.fixed_origins.len(),
        service.rate_limit.daily_cap,
    )?;
    log::info!(
        "Routing {} fixed origin(s) to {destination} by {mode}",
        config.fixed_origins.len()
    );

    let start = Instant::now();
    let limiter = load_limiter(config.rate_limit_state_path.as_deref(), &service)?;
    let client = route_client(config, &service, limiter)?;
    let progress = operator.progress(Stage::FixedOrigins);
    let (records, failed) = route_fixed(
        &client,
        &config.fixed_origins,
        destination,
        mode,
        progress.as_ref(),
    )
    .await;

    let dir = fixed_origins_dir(&config.save_directory);
    let path = dir.join(fixed_origins_file_name(now()));
    write_records(&path, &records)?;
    write_checkpoint(&dir, &config.redacted())?;

    log::info!(
        "Fixed-origin routing finished in {:.1}s: {} routed, {} failed",
        start.elapsed().as_secs_f64(),
        records.len(),
        failed.len()
    );
    summary.routed += records.len();
    summary.outputs.push(path);
    errors.extend(failed);
    Ok(())
}

/// Draws `n` records uniformly without replacement, in random order.
/// Asking for more than available returns everything, shuffled.
pub fn draw_sample<T, R: Rng + ?Sized>(records: Vec<T>, n: usize, rng: &mut R) -> Vec<T> {
    let n = n.min(records.len());
    let mut picked: Vec<Option<usize>> = vec![None; records.len()];
    for (order, index) in rand::seq::index::sample(rng, records.len(), n)
        .into_iter()
        .enumerate()
    {
        picked[index] = Some(order);
    }

    let mut chosen: Vec<(usize, T)> = records
        .into_iter()
        .zip(picked)
        .filter_map(|(record, order)| order.map(|o| (o, record)))
        .collect();
    chosen.sort_unstable_by_key(|(order, _)| *order);
    chosen.into_iter().map(|(_, record)| record).collect()
}

/// One routing job per record.
///
/// # Errors
///
/// Returns [`UnknownModeCode`] for the first record whose mode code has no
/// routing profile, before any request is made.
pub fn route_jobs(records: &[PlacedTrip]) -> Result<Vec<RouteJob>, UnknownModeCode> {
    records
        .iter()
        .map(|record| {
            Ok(RouteJob {
                origin: record.origin_coordinates,
                destination: record.destination_coordinates,
                mode: TravelMode::from_code(record.trip.mode_code)?,
            })
        })
        .collect()
}

/// Routes `records` (one job each) and splits them by outcome.
pub async fn route_placed(
    client: &RouteClient,
    records: Vec<PlacedTrip>,
    jobs: &[RouteJob],
    progress: &dyn ProgressCallback,
) -> (Vec<RoutedTrip>, Vec<ErrorRow>) {
    let results = client.resolve_batch(jobs, progress).await;

    let mut routed = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    for (placed, result) in records.into_iter().zip(results) {
        match result {
            Ok(route) => routed.push(RoutedTrip { placed, route }),
            Err(e) => errors.push(ErrorRow::from_placed(&placed, e.to_string())),
        }
    }
    (routed, errors)
}

/// Routes each origin to `destination` and splits them by outcome.
pub async fn route_fixed(
    client: &RouteClient,
    origins: &[GeoPoint],
    destination: GeoPoint,
    mode: TravelMode,
    progress: &dyn ProgressCallback,
) -> (Vec<FixedRouteRecord>, Vec<ErrorRow>) {
    let jobs: Vec<RouteJob> = origins
        .iter()
        .map(|&origin| RouteJob {
            origin,
            destination,
            mode,
        })
        .collect();
    let results = client.resolve_batch(&jobs, progress).await;

    let mut records = Vec::with_capacity(jobs.len());
    let mut errors = Vec::new();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(route) => records.push(FixedRouteRecord {
                origin_coordinates: job.origin,
                destination_coordinates: job.destination,
                mode,
                route,
                trip_count: 1,
            }),
            Err(e) => errors.push(ErrorRow::from_fixed(
                job.origin,
                job.destination,
                mode,
                e.to_string(),
            )),
        }
    }
    (records, errors)
}

fn route_client(
    config: &PipelineConfig,
    service: &RoutingService,
    limiter: Arc<RateLimiter>,
) -> Result<RouteClient, PipelineError> {
    let token = config.ors_token.as_deref().ok_or(ConfigError::Missing {
        field: "ors_token",
        mode: config.mode,
    })?;
    let transport = OrsTransport::new(service, token)?;
    Ok(RouteClient::new(Box::new(transport), limiter, service))
}

/// Builds the limiter, restoring recent calls from `path` when it exists.
///
/// With a path, every admitted call is written back to it, so a run that
/// stops mid-batch still leaves its window for the next one.
///
/// # Errors
///
/// Returns [`PipelineError`] if an existing state file cannot be read or
/// the path cannot be written.
pub fn load_limiter(
    path: Option<&Path>,
    service: &RoutingService,
) -> Result<Arc<RateLimiter>, PipelineError> {
    let limits = &service.rate_limit;
    let Some(path) = path else {
        return Ok(Arc::new(RateLimiter::new(
            limits.max_calls,
            limits.window(),
        )));
    };

    let state: RateLimitState = if path.is_file() {
        serde_json::from_str(&std::fs::read_to_string(path)?)?
    } else {
        RateLimitState::default()
    };
    write_state(path, &state)?;
    log::debug!("Routing call history is kept in {}", path.display());

    let limiter = RateLimiter::from_state(limits.max_calls, limits.window(), &state)
        .persisted_at(path.to_path_buf());
    Ok(Arc::new(limiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveTime;
    use odsynth_boundary_models::AreaCode;
    use odsynth_routing::{DirectionsRequest, RouteError, RouteTransport, TransportResponse};
    use odsynth_trip_models::TripRecord;
    use odsynth_trip_models::progress::NullProgress;

    /// Echoes the endpoints as a route, or answers without geometry for
    /// origins west of `fail_west_of`.
    struct EchoTransport {
        fail_west_of: f64,
    }

    #[async_trait]
    impl RouteTransport for EchoTransport {
        async fn directions(
            &self,
            _profile: &str,
            request: &DirectionsRequest,
        ) -> Result<TransportResponse, RouteError> {
            let [origin, _] = request.coordinates;
            let body = if origin[0] < self.fail_west_of {
                serde_json::json!({ "routes": [{ "summary": {} }] })
            } else {
                let geometry = polyline::encode_coordinates(
                    request.coordinates.iter().map(|&[x, y]| geo::Coord { x, y }),
                    5,
                )
                .unwrap();
                serde_json::json!({ "routes": [{ "geometry": geometry }] })
            };
            Ok(TransportResponse {
                status: 200,
                body: body.to_string(),
            })
        }
    }

    fn client(fail_west_of: f64) -> RouteClient {
        let service = service_registry::openrouteservice();
        let limiter = load_limiter(None, &service).unwrap();
        RouteClient::new(Box::new(EchoTransport { fail_west_of }), limiter, &service)
    }

    fn placed(origin_lon: f64, mode_code: u8) -> PlacedTrip {
        PlacedTrip {
            trip: TripRecord {
                origin_area: AreaCode(1_101_053),
                dest_area: AreaCode(1_102_055),
                start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                gender: "M".to_string(),
                age: "20".to_string(),
                mode_code,
                origin_purpose: "1".to_string(),
                dest_purpose: "2".to_string(),
                avg_distance: 900.0,
                avg_duration: 11.0,
                trip_count: 2.0,
            },
            origin_coordinates: GeoPoint::new(origin_lon, 37.5),
            destination_coordinates: GeoPoint::new(127.0, 37.55),
        }
    }

    #[test]
    fn sample_is_without_replacement() {
        let records: Vec<u32> = (0..100).collect();
        let (mut rng, _) = odsynth_sampling::seeded_rng(Some(7));

        let mut sample = draw_sample(records.clone(), 30, &mut rng);
        assert_eq!(sample.len(), 30);
        sample.sort_unstable();
        sample.dedup();
        assert_eq!(sample.len(), 30);

        assert_eq!(draw_sample(records, 500, &mut rng).len(), 100);
    }

    #[test]
    fn sample_is_reproducible_for_a_seed() {
        let records: Vec<u32> = (0..50).collect();
        let (mut a, _) = odsynth_sampling::seeded_rng(Some(3));
        let (mut b, _) = odsynth_sampling::seeded_rng(Some(3));
        assert_eq!(
            draw_sample(records.clone(), 10, &mut a),
            draw_sample(records, 10, &mut b)
        );
    }

    #[test]
    fn unmapped_mode_is_rejected_before_routing() {
        let records = vec![placed(126.9, 0), placed(126.9, 9)];
        assert_eq!(route_jobs(&records).unwrap_err().code, 9);

        let jobs = route_jobs(&records[..1]).unwrap();
        assert_eq!(jobs[0].mode, TravelMode::Car);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_routes_become_error_rows_in_order() {
        let records: Vec<PlacedTrip> = (0..10_u32)
            .map(|i| {
                let lon = if i == 4 {
                    100.0
                } else {
                    126.9 + f64::from(i) * 0.01
                };
                placed(lon, 3)
            })
            .collect();
        let jobs = route_jobs(&records).unwrap();

        let (routed, errors) = route_placed(&client(110.0), records, &jobs, &NullProgress).await;

        assert_eq!(routed.len(), 9);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].origin_coordinates.as_deref(), Some("100 37.5"));
        for (trip, i) in routed.iter().zip([0_u32, 1, 2, 3, 5, 6, 7, 8, 9]) {
            assert_eq!(trip.route.len(), 2);
            let lon = 126.9 + f64::from(i) * 0.01;
            assert!((trip.placed.origin_coordinates.lon - lon).abs() < 1e-9);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_origins_share_destination_and_mode() {
        let origins = [
            GeoPoint::new(126.97, 37.56),
            GeoPoint::new(100.0, 37.0),
            GeoPoint::new(127.01, 37.58),
        ];
        let venue = GeoPoint::new(126.978, 37.5665);

        let (records, errors) = route_fixed(
            &client(110.0),
            &origins,
            venue,
            TravelMode::Walking,
            &NullProgress,
        )
        .await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.destination_coordinates == venue
            && r.mode == TravelMode::Walking
            && r.trip_count == 1));
        assert_eq!(records[1].origin_coordinates, GeoPoint::new(127.01, 37.58));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].modal.as_deref(), Some("foot-walking"));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_window_survives_an_interrupted_batch() {
        let dir = std::env::temp_dir().join("odsynth_limiter_state");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("state.json");
        let service = service_registry::openrouteservice();

        let limiter = load_limiter(Some(&path), &service).unwrap();
        assert!(path.is_file());
        for _ in 0..40 {
            limiter.acquire().await;
        }
        // No explicit save: the process is gone.
        drop(limiter);

        let restored = load_limiter(Some(&path), &service).unwrap();
        assert_eq!(restored.in_window().await, 40);
        let start = tokio::time::Instant::now();
        restored.acquire().await;
        assert!(start.elapsed() >= std::time::Duration::from_secs(59));

        assert_eq!(load_limiter(None, &service).unwrap().in_window().await, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
