#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestrates a synthetic OD dataset run.
//!
//! Stages run in a fixed order: load and filter trips, place origins,
//! place destinations over the whole filtered set, route a sample, then
//! persist. [`config::RunMode`] decides which of them execute. Per-record
//! failures from every stage are collected and written to a single error
//! table when the run ends; anything else aborts the run before that
//! stage's results are written.

pub mod config;
pub mod coordinates;
pub mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use odsynth_boundary::BoundaryError;
use odsynth_dataset::DatasetError;
use odsynth_dataset::error_table::{ErrorRow, write_errors};
use odsynth_dataset::output::RunKey;
use odsynth_geocoder::GeocodeError;
use odsynth_points::PlacementError;
use odsynth_routing::RouteError;
use odsynth_trip_models::UnknownModeCode;
use odsynth_trip_models::progress::ProgressCallback;

use config::{ConfigError, PipelineConfig, RunMode};

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authentication or a destination lookup against SGIS failed.
    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    /// The area code table or the destination boundary is unusable.
    #[error("Boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    /// Destination placement failed as a whole.
    #[error("Placement error: {0}")]
    Placement(#[from] PlacementError),

    /// The routing client could not be built.
    #[error("Routing setup error: {0}")]
    Route(#[from] RouteError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The destination address matched nothing.
    #[error("Destination '{address}' could not be geocoded")]
    DestinationNotFound { address: String },

    /// The destination's service code has no dataset counterpart.
    #[error(
        "No dataset code for destination area {api_code}; set 'destination_code' in the configuration"
    )]
    UnmappedDestination { api_code: String },

    /// A sampled record carries a mode code with no routing profile.
    #[error("Invalid travel mode in sampled records: {0}")]
    Mode(#[from] UnknownModeCode),

    /// Rate limiter state could not be read or written.
    #[error("Rate limit state error: {0}")]
    State(#[from] std::io::Error),

    #[error("Rate limit state is not valid JSON: {0}")]
    StateJson(#[from] serde_json::Error),

    /// The operator could not supply a sample size.
    #[error("Input error: {message}")]
    Input { message: String },
}

/// Per-record loops that report progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Stage {
    #[strum(serialize = "Placing origins")]
    Origins,
    #[strum(serialize = "Resolving routes")]
    Routes,
    #[strum(serialize = "Routing fixed origins")]
    FixedOrigins,
}

/// Decisions and feedback the pipeline delegates to whoever runs it.
pub trait Operator: Send + Sync {
    /// Progress sink for one per-record loop.
    fn progress(&self, stage: Stage) -> Arc<dyn ProgressCallback>;

    /// Number of records to route when the configuration does not say.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Input`] if no answer can be obtained.
    fn sample_size(&self, available: usize, daily_cap: usize) -> Result<usize, PipelineError>;
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records placed by the coordinates stage.
    pub placed: usize,
    /// Records with a resolved route.
    pub routed: usize,
    /// Records written to the error table.
    pub failed: usize,
    /// Result files, in the order they were written.
    pub outputs: Vec<PathBuf>,
}

/// Runs every stage `config.mode` selects.
///
/// Failed records are written once, after the last stage, even when a
/// later stage aborts the run.
///
/// # Errors
///
/// Returns [`PipelineError`] on invalid configuration, missing inputs,
/// failed authentication, or when results cannot be written.
pub async fn run(
    config: &PipelineConfig,
    operator: &dyn Operator,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;
    let start = Instant::now();
    let mut summary = RunSummary::default();
    let mut errors = Vec::new();

    let outcome = run_stages(config, operator, &mut summary, &mut errors).await;
    let written = record_errors(&config.error_directory, &errors, now(), &mut summary);
    outcome?;
    written?;

    log::info!(
        "Run complete in {:.1}s: {} placed, {} routed, {} failed",
        start.elapsed().as_secs_f64(),
        summary.placed,
        summary.routed,
        summary.failed
    );
    Ok(summary)
}

async fn run_stages(
    config: &PipelineConfig,
    operator: &dyn Operator,
    summary: &mut RunSummary,
    errors: &mut Vec<ErrorRow>,
) -> Result<(), PipelineError> {
    let (mut rng, seed) = odsynth_sampling::seeded_rng(config.seed);
    log::info!("Starting {} run (seed {seed})", config.mode);

    match config.mode {
        RunMode::Coordinates => {
            coordinates::generate(config, operator, &mut rng, summary, errors).await?;
        }
        RunMode::Routes => {
            let path = config
                .coordinates_path
                .as_deref()
                .ok_or(ConfigError::Missing {
                    field: "coordinates_path",
                    mode: config.mode,
                })?;
            let placed = odsynth_dataset::output::read_records(path)?;
            routes::route_sample(config, placed, operator, &mut rng, summary, errors).await?;
        }
        RunMode::FixedOrigins => {
            routes::route_fixed_origins(config, operator, summary, errors).await?;
        }
        RunMode::Full => {
            let placed = coordinates::generate(config, operator, &mut rng, summary, errors).await?;
            routes::route_sample(config, placed, operator, &mut rng, summary, errors).await?;
        }
    }
    Ok(())
}

/// Writes the run's failed records to one `errors_<ts>.csv` in `dir`.
fn record_errors(
    dir: &Path,
    rows: &[ErrorRow],
    at: chrono::NaiveDateTime,
    summary: &mut RunSummary,
) -> Result<Option<PathBuf>, PipelineError> {
    let path = write_errors(dir, rows, at)?;
    if path.is_some() {
        summary.failed = rows.len();
    }
    Ok(path)
}

/// Key naming the result directory of a filtered run.
fn run_key(config: &PipelineConfig) -> Result<RunKey<'_>, ConfigError> {
    Ok(RunKey {
        destination: config.destination()?,
        date: config.date()?,
        time: config.time()?,
        probability: config.probability()?,
    })
}

/// Local wall-clock time used in generated file names.
fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
