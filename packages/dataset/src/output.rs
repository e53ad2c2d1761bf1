//! Result files and their directory layout.
//!
//! ```text
//! <save>/<destination>_D<MMDD>_T<HHMM|ALL>_P<p>/coordinates/coordinates.json
//! <save>/<destination>_D<MMDD>_T<HHMM|ALL>_P<p>/routes/routes_<n>_samples.json
//! <save>/fixed_origins/<YYYYmmdd_HHMMSS>.json
//! ```
//!
//! Each result directory also receives `last_checkpoint.toml`, a snapshot
//! of the configuration that produced it.

use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::DatasetError;

/// File name of the configuration snapshot.
pub const CHECKPOINT_FILE: &str = "last_checkpoint.toml";

/// Timestamp format used in generated file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Identifies one filtered run: where, when, and how likely attendance is.
#[derive(Debug, Clone, PartialEq)]
pub struct RunKey<'a> {
    pub destination: &'a str,
    /// `MMDD`.
    pub date: &'a str,
    /// `None` for an all-day run.
    pub time: Option<NaiveTime>,
    pub probability: f64,
}

impl RunKey<'_> {
    /// Directory name, e.g. `서울광장_D0610_T1400_P0.3`.
    #[must_use]
    pub fn directory_name(&self) -> String {
        let destination: String = self
            .destination
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let time = self
            .time
            .map_or_else(|| "ALL".to_string(), |t| t.format("%H%M").to_string());
        format!(
            "{destination}_D{}_T{time}_P{}",
            self.date,
            format_probability(self.probability)
        )
    }
}

/// `0.3` → `"0.3"`, `1.0` → `"1.0"`.
#[allow(clippy::float_cmp)]
fn format_probability(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{p:.1}")
    } else {
        format!("{p}")
    }
}

/// Directory for coordinate-only output.
#[must_use]
pub fn coordinates_dir(save_dir: &Path, key: &RunKey<'_>) -> PathBuf {
    save_dir.join(key.directory_name()).join("coordinates")
}

/// Directory for routed output.
#[must_use]
pub fn routes_dir(save_dir: &Path, key: &RunKey<'_>) -> PathBuf {
    save_dir.join(key.directory_name()).join("routes")
}

/// Directory for fixed-origin output.
#[must_use]
pub fn fixed_origins_dir(save_dir: &Path) -> PathBuf {
    save_dir.join("fixed_origins")
}

/// File name for a routed sample of `n` records.
#[must_use]
pub fn routes_file_name(n: usize) -> String {
    format!("routes_{n}_samples.json")
}

/// File name for a fixed-origin run started at `at`.
#[must_use]
pub fn fixed_origins_file_name(at: NaiveDateTime) -> String {
    format!("{}.json", at.format(TIMESTAMP_FORMAT))
}

/// Writes `records` as a JSON array, creating parent directories.
///
/// # Errors
///
/// Returns [`DatasetError`] if the directory or file cannot be written.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer(file, records)?;
    log::info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Reads a JSON array of records.
///
/// # Errors
///
/// Returns [`DatasetError::NotFound`] if the file is missing, or another
/// [`DatasetError`] if it cannot be parsed.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DatasetError> {
    if !path.is_file() {
        return Err(DatasetError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    let records: Vec<T> = serde_json::from_reader(file)?;
    log::info!("Read {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Writes the configuration snapshot into `dir`.
///
/// # Errors
///
/// Returns [`DatasetError`] if serialization or writing fails.
pub fn write_checkpoint<C: Serialize>(dir: &Path, config: &C) -> Result<PathBuf, DatasetError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(CHECKPOINT_FILE);
    std::fs::write(&path, toml::to_string_pretty(config)?)?;
    log::debug!("Wrote configuration checkpoint to {}", path.display());
    Ok(path)
}
