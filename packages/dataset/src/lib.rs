#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reading and writing the pipeline's files.
//!
//! - [`trips`]: the daily origin-destination CSV and its filters
//! - [`output`]: result JSON, configuration checkpoint and directory layout
//! - [`error_table`]: the per-batch CSV of records that were dropped

pub mod error_table;
pub mod output;
pub mod trips;

use std::path::PathBuf;

/// Errors from dataset I/O.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// An input file does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON reading or writing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The checkpoint could not be serialized.
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),
}
