//! CSV table of records dropped from a batch.
//!
//! At most one file per batch, `errors_<YYYYmmdd_HHMMSS>.csv`, and only
//! when something failed. Columns mirror the dataset so rows can be
//! inspected next to the source; fields that do not apply to a record
//! kind are left blank. The last column holds the failure reason.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use odsynth_boundary_models::AreaCode;
use odsynth_trip_models::{GeoPoint, PlacedTrip, TravelMode, TripRecord};
use serde::Serialize;

use crate::DatasetError;
use crate::output::TIMESTAMP_FORMAT;

/// One failed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorRow {
    pub origin_hdong_cd: Option<AreaCode>,
    pub dest_hdong_cd: Option<AreaCode>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub gender: Option<String>,
    pub age: Option<String>,
    pub modal: Option<String>,
    pub origin_purpose: Option<String>,
    pub dest_purpose: Option<String>,
    pub od_dist_avg: Option<f64>,
    pub od_duration_avg: Option<f64>,
    pub od_cnts: Option<f64>,
    /// `lon lat`.
    pub origin_coordinates: Option<String>,
    /// `lon lat`.
    pub destination_coordinates: Option<String>,
    pub reason: String,
}

fn point_text(p: GeoPoint) -> String {
    format!("{} {}", p.lon, p.lat)
}

impl ErrorRow {
    /// A trip that failed before coordinates were attached.
    #[must_use]
    pub fn from_trip(trip: &TripRecord, reason: impl Into<String>) -> Self {
        Self {
            origin_hdong_cd: Some(trip.origin_area),
            dest_hdong_cd: Some(trip.dest_area),
            start_time: Some(trip.start_time.format("%H:%M").to_string()),
            end_time: Some(trip.end_time.format("%H:%M").to_string()),
            gender: Some(trip.gender.clone()),
            age: Some(trip.age.clone()),
            modal: Some(trip.mode_code.to_string()),
            origin_purpose: Some(trip.origin_purpose.clone()),
            dest_purpose: Some(trip.dest_purpose.clone()),
            od_dist_avg: Some(trip.avg_distance),
            od_duration_avg: Some(trip.avg_duration),
            od_cnts: Some(trip.trip_count),
            origin_coordinates: None,
            destination_coordinates: None,
            reason: reason.into(),
        }
    }

    /// A placed trip whose route failed.
    #[must_use]
    pub fn from_placed(placed: &PlacedTrip, reason: impl Into<String>) -> Self {
        Self {
            origin_coordinates: Some(point_text(placed.origin_coordinates)),
            destination_coordinates: Some(point_text(placed.destination_coordinates)),
            ..Self::from_trip(&placed.trip, reason)
        }
    }

    /// A fixed-origin pair whose route failed.
    #[must_use]
    pub fn from_fixed(
        origin: GeoPoint,
        destination: GeoPoint,
        mode: TravelMode,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            modal: Some(mode.to_string()),
            od_cnts: Some(1.0),
            origin_coordinates: Some(point_text(origin)),
            destination_coordinates: Some(point_text(destination)),
            reason: reason.into(),
            ..Self::default()
        }
    }
}

/// Writes `rows` to `errors_<timestamp>.csv` in `dir`.
///
/// Returns `Ok(None)` without touching the filesystem when `rows` is empty.
///
/// # Errors
///
/// Returns [`DatasetError`] if the directory or file cannot be written.
pub fn write_errors(
    dir: &Path,
    rows: &[ErrorRow],
    at: NaiveDateTime,
) -> Result<Option<PathBuf>, DatasetError> {
    if rows.is_empty() {
        return Ok(None);
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("errors_{}.csv", at.format(TIMESTAMP_FORMAT)));
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::warn!("{} failed record(s) written to {}", rows.len(), path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn trip() -> TripRecord {
        TripRecord {
            origin_area: AreaCode(1_101_053),
            dest_area: AreaCode(1_102_055),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            gender: "M".to_string(),
            age: "30".to_string(),
            mode_code: 3,
            origin_purpose: "1".to_string(),
            dest_purpose: "2".to_string(),
            avg_distance: 800.0,
            avg_duration: 12.5,
            trip_count: 1.0,
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    #[test]
    fn nothing_is_written_without_failures() {
        let dir = std::env::temp_dir().join("odsynth_errors_empty");
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(write_errors(&dir, &[], at()).unwrap(), None);
        assert!(!dir.exists());
    }

    #[test]
    fn writes_one_row_per_failure_with_reason() {
        let dir = std::env::temp_dir().join("odsynth_errors_rows");
        let _ = std::fs::remove_dir_all(&dir);

        let placed = PlacedTrip {
            trip: trip(),
            origin_coordinates: GeoPoint::new(126.9, 37.5),
            destination_coordinates: GeoPoint::new(127.0, 37.55),
        };
        let rows = vec![
            ErrorRow::from_trip(&trip(), "unresolved area 1101053"),
            ErrorRow::from_placed(&placed, "throttled"),
            ErrorRow::from_fixed(
                GeoPoint::new(126.8, 37.4),
                GeoPoint::new(127.0, 37.55),
                TravelMode::Walking,
                "no geometry",
            ),
        ];

        let path = write_errors(&dir, &rows, at()).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "errors_20240610_140500.csv");

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("origin_hdong_cd"));
        assert_eq!(headers.iter().last(), Some("reason"));

        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get(0), Some("1101053"));
        assert_eq!(records[0].get(14), Some("unresolved area 1101053"));
        assert_eq!(records[1].get(12), Some("126.9 37.5"));
        assert_eq!(records[2].get(0), Some(""));
        assert_eq!(records[2].get(6), Some("foot-walking"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
