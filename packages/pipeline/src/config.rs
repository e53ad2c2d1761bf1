//! Run configuration.
//!
//! A run is described by one TOML file. Which keys are required depends on
//! [`RunMode`]; [`PipelineConfig::validate`] checks them all before any
//! file is read or any request is sent.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use odsynth_boundary_models::AreaCode;
use odsynth_trip_models::{GeoPoint, TravelMode, hhmm};
use serde::{Deserialize, Serialize};

/// Year of the origin-destination files when none is configured.
pub const DEFAULT_YEAR: u16 = 2023;

const REDACTED: &str = "<redacted>";

/// Which stages a run executes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    /// Filter and place coordinates, no routing.
    Coordinates,
    /// Route a sample of previously saved coordinates.
    Routes,
    /// Route a list of fixed origins to one destination.
    FixedOrigins,
    /// Coordinates followed by routes in one invocation.
    Full,
}

impl RunMode {
    const fn places_coordinates(self) -> bool {
        matches!(self, Self::Coordinates | Self::Full)
    }

    const fn routes_samples(self) -> bool {
        matches!(self, Self::Routes | Self::Full)
    }
}

/// Where origin boundaries come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoundarySourceKind {
    /// The `행정경계구역` column of the area code table.
    #[default]
    Local,
    /// The SGIS boundary endpoint.
    Sgis,
}

/// Errors found while loading or checking the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`PipelineConfig`].
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A key the selected mode needs is absent.
    #[error("'{field}' is required in {mode} mode")]
    Missing { field: &'static str, mode: RunMode },

    /// A key has an unusable value.
    #[error("Invalid '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub mode: RunMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgis_consumer_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgis_consumer_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ors_token: Option<String>,

    /// Directory holding `od_<year><MMDD>_1.csv` files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od_data_path: Option<PathBuf>,
    /// JSON area code table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dong_code_path: Option<PathBuf>,
    pub save_directory: PathBuf,
    pub error_directory: PathBuf,

    /// `MMDD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Address of the event venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub view_all_day: bool,
    /// `HH:MM`, ignored when `view_all_day` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Share of trips that end exactly at the venue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    /// Coordinates file routed in `routes` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_origins: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_destination: Option<GeoPoint>,
    /// Routing profile for fixed origins, e.g. `foot-walking`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<TravelMode>,

    #[serde(default)]
    pub boundary_source: BoundarySourceKind,
    /// Random seed. A fresh one is drawn and logged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Number of records sent to the routing service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(default = "default_year")]
    pub year: u16,
    /// Dataset code of the destination area, skipping the table lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_code: Option<AreaCode>,
    /// JSON file carrying recent routing call times across restarts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_state_path: Option<PathBuf>,
}

const fn default_year() -> u16 {
    DEFAULT_YEAR
}

impl PipelineConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or
    /// fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded {} configuration from {}", config.mode, path.display());
        Ok(config)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing or validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every key the mode needs is present and well formed.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode.places_coordinates() {
            self.require("sgis_consumer_key", self.sgis_consumer_key.as_ref())?;
            self.require("sgis_consumer_secret", self.sgis_consumer_secret.as_ref())?;
            self.require("od_data_path", self.od_data_path.as_ref())?;
            self.require("dong_code_path", self.dong_code_path.as_ref())?;
        }

        if self.mode == RunMode::Routes {
            self.require("coordinates_path", self.coordinates_path.as_ref())?;
        }

        if self.mode.places_coordinates() || self.mode.routes_samples() {
            self.require("destination", self.destination.as_ref())?;
            self.date()?;
            self.time()?;
            self.probability()?;
        }

        if self.mode != RunMode::Coordinates {
            self.require("ors_token", self.ors_token.as_ref())?;
        }

        if self.mode == RunMode::FixedOrigins {
            if self.fixed_origins.is_empty() {
                return Err(self.missing("fixed_origins"));
            }
            self.require("fixed_destination", self.fixed_destination.as_ref())?;
            self.require("profile", self.profile.as_ref())?;
        }

        if self.samples == Some(0) {
            return Err(ConfigError::Invalid {
                field: "samples",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    const fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::Missing {
            field,
            mode: self.mode,
        }
    }

    fn require<T>(&self, field: &'static str, value: Option<&T>) -> Result<(), ConfigError> {
        value.map(|_| ()).ok_or_else(|| self.missing(field))
    }

    /// The validated `MMDD` date.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the date is absent or not four digits
    /// forming a calendar day.
    pub fn date(&self) -> Result<&str, ConfigError> {
        let date = self.date.as_deref().ok_or_else(|| self.missing("date"))?;
        let invalid = || ConfigError::Invalid {
            field: "date",
            message: format!("expected MMDD, got '{date}'"),
        };
        if date.len() != 4 || !date.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let month: u32 = date[..2].parse().map_err(|_| invalid())?;
        let day: u32 = date[2..].parse().map_err(|_| invalid())?;
        chrono::NaiveDate::from_ymd_opt(i32::from(self.year), month, day).ok_or_else(invalid)?;
        Ok(date)
    }

    /// The time filter, or `None` for an all-day run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a time is needed but absent or not `HH:MM`.
    pub fn time(&self) -> Result<Option<NaiveTime>, ConfigError> {
        if self.view_all_day {
            return Ok(None);
        }
        let raw = self.time.as_deref().ok_or_else(|| self.missing("time"))?;
        hhmm::parse(raw)
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                field: "time",
                message: format!("expected HH:MM, got '{raw}': {e}"),
            })
    }

    /// The attendance probability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if it is absent or outside `[0, 1]`.
    pub fn probability(&self) -> Result<f64, ConfigError> {
        let p = self
            .probability
            .ok_or_else(|| self.missing("probability"))?;
        if (0.0..=1.0).contains(&p) {
            Ok(p)
        } else {
            Err(ConfigError::Invalid {
                field: "probability",
                message: format!("{p} is outside [0, 1]"),
            })
        }
    }

    /// Destination address, with whitespace kept.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if absent.
    pub fn destination(&self) -> Result<&str, ConfigError> {
        self.destination
            .as_deref()
            .ok_or_else(|| self.missing("destination"))
    }

    /// A copy safe to write next to the results.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let hide = |s: &Option<String>| s.as_ref().map(|_| REDACTED.to_string());
        Self {
            sgis_consumer_key: hide(&self.sgis_consumer_key),
            sgis_consumer_secret: hide(&self.sgis_consumer_secret),
            ors_token: hide(&self.ors_token),
            ..self.clone()
        }
    }
}

/// Checks a routing sample size against the data and the daily quota.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] describing the violated bound.
pub fn validate_sample_size(n: usize, available: usize, daily_cap: usize) -> Result<usize, ConfigError> {
    let message = if n < 1 {
        "must be at least 1".to_string()
    } else if n > daily_cap {
        format!("{n} exceeds the routing service daily cap of {daily_cap}")
    } else if n > available {
        format!("{n} exceeds the {available} available record(s)")
    } else {
        return Ok(n);
    };
    Err(ConfigError::Invalid {
        field: "samples",
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COORDINATES: &str = r#"
mode = "coordinates"
sgis_consumer_key = "key"
sgis_consumer_secret = "secret"
od_data_path = "data/od"
dong_code_path = "data/dong_code.json"
save_directory = "out"
error_directory = "out/errors"
date = "0610"
destination = "서울특별시 중구 세종대로 110"
time = "14:00"
probability = 0.3
"#;

    #[test]
    fn parses_coordinates_mode_with_defaults() {
        let config = PipelineConfig::from_toml_str(COORDINATES).unwrap();
        assert_eq!(config.mode, RunMode::Coordinates);
        assert_eq!(config.year, DEFAULT_YEAR);
        assert_eq!(config.boundary_source, BoundarySourceKind::Local);
        assert_eq!(config.time().unwrap(), NaiveTime::from_hms_opt(14, 0, 0));
        assert!((config.probability().unwrap() - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.date().unwrap(), "0610");
    }

    #[test]
    fn all_day_runs_ignore_time() {
        let text = COORDINATES.replace("time = \"14:00\"", "view_all_day = true");
        let config = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.time().unwrap(), None);
    }

    #[test]
    fn missing_keys_name_field_and_mode() {
        let text = COORDINATES.replace("od_data_path = \"data/od\"\n", "");
        let err = PipelineConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                field: "od_data_path",
                mode: RunMode::Coordinates
            }
        ));

        let text = COORDINATES.replace("time = \"14:00\"\n", "");
        assert!(matches!(
            PipelineConfig::from_toml_str(&text),
            Err(ConfigError::Missing { field: "time", .. })
        ));
    }

    #[test]
    fn rejects_bad_values() {
        for (from, to, field) in [
            ("probability = 0.3", "probability = 1.5", "probability"),
            ("date = \"0610\"", "date = \"1340\"", "date"),
            ("date = \"0610\"", "date = \"610\"", "date"),
            ("time = \"14:00\"", "time = \"2pm\"", "time"),
        ] {
            let text = COORDINATES.replace(from, to);
            match PipelineConfig::from_toml_str(&text) {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn routes_mode_needs_token_and_coordinates() {
        let text = COORDINATES.replace("mode = \"coordinates\"", "mode = \"routes\"");
        assert!(matches!(
            PipelineConfig::from_toml_str(&text),
            Err(ConfigError::Missing {
                field: "coordinates_path",
                ..
            })
        ));

        let text = format!("{text}coordinates_path = \"out/coordinates.json\"\n");
        assert!(matches!(
            PipelineConfig::from_toml_str(&text),
            Err(ConfigError::Missing {
                field: "ors_token",
                ..
            })
        ));

        let text = format!("{text}ors_token = \"token\"\n");
        assert!(PipelineConfig::from_toml_str(&text).is_ok());
    }

    #[test]
    fn fixed_origins_mode_parses_points_and_profile() {
        let text = r#"
mode = "fixed_origins"
ors_token = "token"
save_directory = "out"
error_directory = "out/errors"
fixed_origins = [[126.97, 37.56], [127.01, 37.58]]
fixed_destination = [126.978, 37.5665]
profile = "foot-walking"
"#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.fixed_origins.len(), 2);
        assert_eq!(config.fixed_origins[1], GeoPoint::new(127.01, 37.58));
        assert_eq!(config.profile, Some(TravelMode::Walking));

        let text = text.replace("profile = \"foot-walking\"\n", "");
        assert!(matches!(
            PipelineConfig::from_toml_str(&text),
            Err(ConfigError::Missing { field: "profile", .. })
        ));
    }

    #[test]
    fn redacted_hides_credentials_only() {
        let config = PipelineConfig::from_toml_str(COORDINATES).unwrap();
        let redacted = config.redacted();
        assert_eq!(redacted.sgis_consumer_key.as_deref(), Some(REDACTED));
        assert_eq!(redacted.sgis_consumer_secret.as_deref(), Some(REDACTED));
        assert_eq!(redacted.ors_token, None);
        assert_eq!(redacted.destination, config.destination);

        let text = toml::to_string_pretty(&redacted).unwrap();
        assert!(!text.contains("secret\""));
        let back: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, redacted);
    }

    #[test]
    fn sample_size_bounds() {
        assert_eq!(validate_sample_size(10, 50, 2000).unwrap(), 10);
        assert_eq!(validate_sample_size(50, 50, 2000).unwrap(), 50);
        assert!(validate_sample_size(0, 50, 2000).is_err());
        assert!(validate_sample_size(51, 50, 2000).is_err());
        assert!(validate_sample_size(2001, 5000, 2000).is_err());
    }

    #[test]
    fn run_mode_names() {
        assert_eq!(RunMode::FixedOrigins.to_string(), "fixed_origins");
        assert_eq!("full".parse::<RunMode>().unwrap(), RunMode::Full);
    }
}
