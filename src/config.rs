//! Run configuration, read once from the environment and passed down explicitly.

use crate::error::ConfigError;
use crate::sources::open_meteo::{AIR_QUALITY_URL, WEATHER_URL};
use crate::store::feature_store::DEFAULT_FEATURE_PATH;
use crate::store::model_registry::DEFAULT_MODELS_DIR;
use crate::store::tiered::StorageMode;
use crate::training::forest::ForestParams;
use crate::types::location::LatLon;
use bon::Builder;
use chrono::{Days, Duration, NaiveDate, Utc};
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_CITY: &str = "Karachi";
pub const DEFAULT_DAYS_HISTORY: u32 = 14;
pub const DEFAULT_REMOTE_PROJECT: &str = "default";

const KNOWN_CITIES: [(&str, LatLon); 1] = [("karachi", LatLon::KARACHI)];

/// Connection details for a remote feature store / model registry.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub host: String,
    pub api_key: String,
    pub project: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("project", &self.project)
            .finish()
    }
}

/// Everything a pipeline run needs to know.
///
/// # Examples
///
/// ```
/// use aqi_forecast::{LatLon, PipelineConfig, StorageMode};
///
/// let config = PipelineConfig::builder()
///     .days_history(7)
///     .feature_path("/tmp/features.parquet")
///     .build();
///
/// assert_eq!(config.city, "Karachi");
/// assert_eq!(config.location, LatLon::KARACHI);
/// assert_eq!(config.storage_mode, StorageMode::Local);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    #[builder(default = DEFAULT_CITY.to_string(), into)]
    pub city: String,
    #[builder(default)]
    pub location: LatLon,
    /// Days of pollutant history fetched per feature run.
    #[builder(default = DEFAULT_DAYS_HISTORY)]
    pub days_history: u32,
    #[builder(default)]
    pub storage_mode: StorageMode,
    #[builder(default = PathBuf::from(DEFAULT_FEATURE_PATH), into)]
    pub feature_path: PathBuf,
    #[builder(default = PathBuf::from(DEFAULT_MODELS_DIR), into)]
    pub models_dir: PathBuf,
    #[builder(default = AIR_QUALITY_URL.to_string(), into)]
    pub air_quality_url: String,
    #[builder(default = WEATHER_URL.to_string(), into)]
    pub weather_url: String,
    pub remote: Option<RemoteCredentials>,
    /// Largest gap allowed when matching weather rows to pollutant hours.
    pub max_join_distance: Option<Duration>,
    #[builder(default)]
    pub forest: ForestParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Loads `.env` (if present) and reads the configuration from the process
    /// environment.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] when `DAYS_HISTORY` is not a positive
    /// integer or reaches before the earliest representable date.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Could not load .env: {}", e);
            }
        }
        Self::from_vars(std::env::vars())
    }

    /// Builds the configuration from `(key, value)` pairs.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CITY` | `Karachi` |
    /// | `DAYS_HISTORY` | `14` |
    /// | `LOCAL_FEATURE_STORE` | `1` (anything else selects the remote tier) |
    /// | `HOPSWORKS_HOST`, `HOPSWORKS_API_KEY`, `HOPSWORKS_PROJECT` | no remote, project `default` |
    /// | `OPEN_METEO_BASE` | the public weather endpoint |
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let city = get("CITY").unwrap_or(DEFAULT_CITY).to_string();
        let location = city_location(&city);

        let days_history = match get("DAYS_HISTORY") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|d| *d > 0 && history_start(Utc::now().date_naive(), *d).is_ok())
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: "DAYS_HISTORY".to_string(),
                    value: raw.to_string(),
                })?,
            None => DEFAULT_DAYS_HISTORY,
        };

        let storage_mode = match get("LOCAL_FEATURE_STORE").unwrap_or("1") {
            "1" => StorageMode::Local,
            _ => StorageMode::Remote,
        };

        let remote = get("HOPSWORKS_API_KEY").map(|api_key| RemoteCredentials {
            host: clean_host(get("HOPSWORKS_HOST").unwrap_or_default()),
            api_key: api_key.to_string(),
            project: get("HOPSWORKS_PROJECT")
                .unwrap_or(DEFAULT_REMOTE_PROJECT)
                .to_string(),
        });

        let weather_url = get("OPEN_METEO_BASE").unwrap_or(WEATHER_URL).to_string();

        Ok(Self::builder()
            .city(city)
            .location(location)
            .days_history(days_history)
            .storage_mode(storage_mode)
            .weather_url(weather_url)
            .maybe_remote(remote)
            .build())
    }
}

/// The first day of a `days`-long history ending at `end`.
pub(crate) fn history_start(end: NaiveDate, days: u32) -> Result<NaiveDate, ConfigError> {
    end.checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "DAYS_HISTORY".to_string(),
            value: days.to_string(),
        })
}

fn city_location(city: &str) -> LatLon {
    let key = city.to_lowercase();
    KNOWN_CITIES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, location)| *location)
        .unwrap_or_else(|| {
            warn!(
                "No coordinates known for '{}', using {}'s",
                city, DEFAULT_CITY
            );
            LatLon::KARACHI
        })
}

/// Collapses a doubled scheme such as `https://https://host`.
fn clean_host(host: &str) -> String {
    host.replace("https://https://", "https://")
        .replace("http://https://", "https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() -> Result<(), ConfigError> {
        let config = PipelineConfig::from_vars(Vec::<(String, String)>::new())?;
        assert_eq!(config.city, "Karachi");
        assert_eq!(config.location, LatLon::KARACHI);
        assert_eq!(config.days_history, 14);
        assert_eq!(config.storage_mode, StorageMode::Local);
        assert_eq!(config.feature_path, PathBuf::from("data/features.csv"));
        assert_eq!(config.models_dir, PathBuf::from("data/models"));
        assert_eq!(config.weather_url, WEATHER_URL);
        assert!(config.remote.is_none());
        assert!(config.max_join_distance.is_none());
        Ok(())
    }

    #[test]
    fn test_from_vars() -> Result<(), ConfigError> {
        let config = PipelineConfig::from_vars([
            ("CITY", "Karachi"),
            ("DAYS_HISTORY", "30"),
            ("LOCAL_FEATURE_STORE", "0"),
            ("HOPSWORKS_HOST", "https://https://c.app.hopsworks.ai"),
            ("HOPSWORKS_API_KEY", "secret"),
            ("OPEN_METEO_BASE", "http://localhost:8080/v1/forecast"),
        ])?;
        assert_eq!(config.days_history, 30);
        assert_eq!(config.storage_mode, StorageMode::Remote);
        assert_eq!(config.weather_url, "http://localhost:8080/v1/forecast");

        let remote = config.remote.unwrap();
        assert_eq!(remote.host, "https://c.app.hopsworks.ai");
        assert_eq!(remote.project, "default");
        assert!(!format!("{:?}", remote).contains("secret"));
        Ok(())
    }

    #[test]
    fn test_invalid_days() {
        for bad in ["two weeks", "0", "-3", "200000000"] {
            assert!(matches!(
                PipelineConfig::from_vars([("DAYS_HISTORY", bad)]),
                Err(ConfigError::InvalidValue { key, .. }) if key == "DAYS_HISTORY"
            ));
        }
    }

    #[test]
    fn test_history_start() -> Result<(), ConfigError> {
        let end = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            history_start(end, 14)?,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(matches!(
            history_start(end, u32::MAX),
            Err(ConfigError::InvalidValue { key, value })
                if key == "DAYS_HISTORY" && value == "4294967295"
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_city_keeps_name() -> Result<(), ConfigError> {
        let config = PipelineConfig::from_vars([("CITY", "Atlantis")])?;
        assert_eq!(config.city, "Atlantis");
        assert_eq!(config.location, LatLon::KARACHI);
        Ok(())
    }

    #[test]
    fn test_clean_host() {
        assert_eq!(clean_host("http://https://h"), "https://h");
        assert_eq!(clean_host("https://h"), "https://h");
    }
}
