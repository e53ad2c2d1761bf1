//! The daily origin-destination CSV.
//!
//! One file per day, `od_<year><MMDD>_1.csv`, with one row per aggregated
//! movement between two dong-level areas.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use odsynth_boundary_models::AreaCode;
use odsynth_trip_models::TripRecord;

use crate::DatasetError;

/// Path of the file for `date` (`MMDD`) in `year`.
#[must_use]
pub fn od_file_path(dir: &Path, year: u16, date: &str) -> PathBuf {
    dir.join(format!("od_{year}{date}_1.csv"))
}

/// Reads every well-formed row of an origin-destination CSV.
///
/// Malformed rows are skipped and counted in the log.
///
/// # Errors
///
/// Returns [`DatasetError::NotFound`] if the file is missing, or another
/// [`DatasetError`] if the header cannot be read.
pub fn load_trips(path: &Path) -> Result<Vec<TripRecord>, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut trips = Vec::new();
    let mut skipped = 0_u64;
    for result in reader.deserialize::<TripRecord>() {
        match result {
            Ok(trip) => trips.push(trip),
            Err(e) => {
                log::trace!("Skipping malformed row: {e}");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} malformed row(s) in {}", path.display());
    }
    log::info!("Loaded {} trip records from {}", trips.len(), path.display());

    Ok(trips)
}

/// Keeps the trips ending in `destination` and, when `time` is given,
/// active at that time.
#[must_use]
pub fn filter_trips(
    trips: Vec<TripRecord>,
    destination: AreaCode,
    time: Option<NaiveTime>,
) -> Vec<TripRecord> {
    let total = trips.len();
    let filtered: Vec<_> = trips
        .into_iter()
        .filter(|t| t.dest_area == destination)
        .filter(|t| time.is_none_or(|time| t.is_active_at(time)))
        .collect();

    match time {
        Some(time) => log::info!(
            "{} of {total} trips end in {destination} and are active at {}",
            filtered.len(),
            time.format("%H:%M")
        ),
        None => log::info!(
            "{} of {total} trips end in {destination} (all day)",
            filtered.len()
        ),
    }

    filtered
}
