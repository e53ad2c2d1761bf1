//! The area code table.
//!
//! A JSON array with one object per dong-level area. It bridges the two
//! numbering schemes in use (dataset codes and geocoding service codes) and
//! may carry the boundary rings, in which case no remote lookup is needed.
//!
//! ```json
//! [{ "행정동코드": 11020550, "API_행정동코드": 11020550,
//!    "시도명": "서울특별시", "시군구명": "중구", "읍면동명": "명동",
//!    "행정경계구역": [[953000.0, 1951000.0], ...] }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use odsynth_boundary_models::{AreaCode, CodeKind, RawRings};
use serde::Deserialize;

use crate::BoundaryError;

/// One row of the area code table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AreaEntry {
    /// Code used by the origin-destination dataset.
    #[serde(rename = "행정동코드", alias = "code")]
    pub code: AreaCode,
    /// Code used by the geocoding service.
    #[serde(rename = "API_행정동코드", alias = "api_code", default)]
    pub api_code: Option<AreaCode>,
    #[serde(rename = "시도명", alias = "sido_name", default)]
    pub sido_name: Option<String>,
    #[serde(rename = "시군구명", alias = "sgg_name", default)]
    pub sgg_name: Option<String>,
    #[serde(rename = "읍면동명", alias = "dong_name", default)]
    pub dong_name: Option<String>,
    /// Boundary rings in grid coordinates, if bundled.
    #[serde(rename = "행정경계구역", alias = "boundary", default)]
    pub boundary: Option<RawRings>,
}

/// In-memory area code table indexed by both code kinds.
#[derive(Debug, Clone, Default)]
pub struct AreaTable {
    entries: Vec<AreaEntry>,
    by_code: BTreeMap<AreaCode, usize>,
    by_api_code: BTreeMap<AreaCode, usize>,
}

impl AreaTable {
    /// Builds the indexes. The first row wins when a code repeats.
    #[must_use]
    pub fn new(entries: Vec<AreaEntry>) -> Self {
        let mut by_code = BTreeMap::new();
        let mut by_api_code = BTreeMap::new();
        for (i, entry) in entries.iter().enumerate() {
            by_code.entry(entry.code).or_insert(i);
            if let Some(api) = entry.api_code {
                by_api_code.entry(api).or_insert(i);
            }
        }
        Self {
            entries,
            by_code,
            by_api_code,
        }
    }

    /// Parses a table from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError::Json`] if the text is not a valid table.
    pub fn from_json_str(text: &str) -> Result<Self, BoundaryError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Reads a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`BoundaryError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, BoundaryError> {
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&text)?;
        log::info!(
            "Loaded {} area code entries from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Looks up the row for `code` interpreted as `kind`.
    #[must_use]
    pub fn find(&self, code: AreaCode, kind: CodeKind) -> Option<&AreaEntry> {
        let index = match kind {
            CodeKind::Dataset => self.by_code.get(&code),
            CodeKind::Api => self.by_api_code.get(&code),
        };
        index.map(|&i| &self.entries[i])
    }

    /// Translates a geocoding service code into the dataset's code.
    #[must_use]
    pub fn dataset_code(&self, api_code: AreaCode) -> Option<AreaCode> {
        self.find(api_code, CodeKind::Api).map(|entry| entry.code)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
