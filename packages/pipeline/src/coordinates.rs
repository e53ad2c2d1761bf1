//! Coordinates stage: filter trips to one destination and place both ends.

use std::sync::Arc;
use std::time::Instant;

use odsynth_boundary::local::LocalBoundaries;
use odsynth_boundary::sgis::SgisBoundaries;
use odsynth_boundary::table::AreaTable;
use odsynth_boundary::{BoundarySource, PolygonResolver};
use odsynth_boundary_models::{AreaCode, CodeKind};
use odsynth_dataset::error_table::ErrorRow;
use odsynth_dataset::output::{coordinates_dir, write_checkpoint, write_records};
use odsynth_dataset::trips::{filter_trips, load_trips, od_file_path};
use odsynth_geocoder::service_registry;
use odsynth_geocoder::sgis::SgisClient;
use odsynth_points::{
    DestinationPoint, PlacementError, assign_destinations, assign_origins, split_counts,
};
use odsynth_trip_models::{GeoPoint, PlacedTrip, TripRecord};
use rand::Rng;

use crate::config::{BoundarySourceKind, ConfigError, PipelineConfig};
use crate::{Operator, PipelineError, RunSummary, Stage, run_key};

/// File name of the coordinates output.
pub const COORDINATES_FILE: &str = "coordinates.json";

/// The geocoded event venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Destination {
    /// Code used for boundary lookups against the service.
    pub api_code: AreaCode,
    /// Code matched against `dest_hdong_cd` in the dataset.
    pub dataset_code: AreaCode,
    /// The venue itself, where attending trips end.
    pub point: GeoPoint,
}

/// Runs the coordinates stage and returns the placed trips.
///
/// Trips whose origin cannot be placed are appended to `errors`.
///
/// # Errors
///
/// Returns [`PipelineError`] for missing inputs, failed authentication, an
/// unknown destination, or a destination area that cannot be sampled.
pub async fn generate<R: Rng + ?Sized>(
    config: &PipelineConfig,
    operator: &dyn Operator,
    rng: &mut R,
    summary: &mut RunSummary,
    errors: &mut Vec<ErrorRow>,
) -> Result<Vec<PlacedTrip>, PipelineError> {
    let start = Instant::now();
    let key = run_key(config)?;
    let missing = |field| ConfigError::Missing {
        field,
        mode: config.mode,
    };

    let table_path = config
        .dong_code_path
        .as_deref()
        .ok_or_else(|| missing("dong_code_path"))?;
    let od_dir = config
        .od_data_path
        .as_deref()
        .ok_or_else(|| missing("od_data_path"))?;
    let (Some(key_id), Some(secret)) = (
        config.sgis_consumer_key.as_deref(),
        config.sgis_consumer_secret.as_deref(),
    ) else {
        return Err(missing("sgis_consumer_key").into());
    };

    let trips = load_trips(&od_file_path(od_dir, config.year, key.date))?;
    let table = Arc::new(AreaTable::load(table_path)?);
    let client = SgisClient::authenticate(&service_registry::sgis(), key_id, secret).await?;

    let destination = resolve_destination(&client, &table, key.destination, config).await?;
    let trips = filter_trips(trips, destination.dataset_code, key.time);
    if trips.is_empty() {
        log::warn!(
            "No trips end in {} for the selected date and time",
            destination.dataset_code
        );
    }

    let mut resolver = PolygonResolver::new(boundary_source(config.boundary_source, client, table));

    let progress = operator.progress(Stage::Origins);
    let origins = assign_origins(&trips, &mut resolver, rng, progress.as_ref()).await;

    let (_, background) = split_counts(trips.len(), key.probability)?;
    let area = if background > 0 {
        Some(resolver.resolve(destination.api_code, CodeKind::Api).await?)
    } else {
        None
    };
    let destinations = assign_destinations(
        trips.len(),
        destination.point,
        area.as_deref(),
        key.probability,
        rng,
    )?;

    let (placed, dropped) = combine(trips, origins, destinations);

    let dir = coordinates_dir(&config.save_directory, &key);
    let path = dir.join(COORDINATES_FILE);
    write_records(&path, &placed)?;
    write_checkpoint(&dir, &config.redacted())?;

    log::info!(
        "Coordinates stage finished in {:.1}s: {} placed, {} dropped",
        start.elapsed().as_secs_f64(),
        placed.len(),
        dropped.len()
    );
    summary.placed = placed.len();
    summary.outputs.push(path);
    errors.extend(dropped);
    Ok(placed)
}

/// Geocodes the venue and finds its dataset code.
async fn resolve_destination(
    client: &SgisClient,
    table: &AreaTable,
    address: &str,
    config: &PipelineConfig,
) -> Result<Destination, PipelineError> {
    let area = client
        .geocode(address)
        .await?
        .ok_or_else(|| PipelineError::DestinationNotFound {
            address: address.to_string(),
        })?;
    let api_code = area.adm_code.unwrap_or(area.area_code);
    let dataset_code = dataset_destination_code(config.destination_code, table, api_code)?;

    log::info!(
        "Destination '{address}' is {} {} {} (service code {api_code}, dataset code {dataset_code}) at {}",
        area.sido_name,
        area.sgg_name,
        area.dong_name,
        area.point
    );
    Ok(Destination {
        api_code,
        dataset_code,
        point: area.point,
    })
}

/// The configured override, else the table's mapping of `api_code`.
fn dataset_destination_code(
    configured: Option<AreaCode>,
    table: &AreaTable,
    api_code: AreaCode,
) -> Result<AreaCode, PipelineError> {
    if let Some(code) = configured {
        log::info!("Using configured destination code {code}");
        return Ok(code);
    }
    table
        .dataset_code(api_code)
        .ok_or_else(|| PipelineError::UnmappedDestination {
            api_code: api_code.to_string(),
        })
}

fn boundary_source(
    kind: BoundarySourceKind,
    client: SgisClient,
    table: Arc<AreaTable>,
) -> Box<dyn BoundarySource> {
    log::info!("Resolving boundaries from the {kind} source");
    match kind {
        BoundarySourceKind::Local => Box::new(LocalBoundaries::new(table)),
        BoundarySourceKind::Sgis => Box::new(SgisBoundaries::new(Arc::new(client), table)),
    }
}

/// Zips trips with their placed points.
///
/// All three inputs are positional over the same filtered set. A trip whose
/// origin failed becomes an error row; its destination point is discarded.
#[must_use]
pub fn combine(
    trips: Vec<TripRecord>,
    origins: Vec<Result<GeoPoint, PlacementError>>,
    destinations: Vec<DestinationPoint>,
) -> (Vec<PlacedTrip>, Vec<ErrorRow>) {
    let mut placed = Vec::with_capacity(trips.len());
    let mut errors = Vec::new();

    for ((trip, origin), destination) in trips.into_iter().zip(origins).zip(destinations) {
        match origin {
            Ok(origin) => placed.push(PlacedTrip {
                trip,
                origin_coordinates: origin,
                destination_coordinates: destination.point,
            }),
            Err(e) => errors.push(ErrorRow::from_trip(&trip, e.to_string())),
        }
    }

    (placed, errors)
}
