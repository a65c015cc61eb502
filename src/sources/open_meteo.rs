//! Async client for the Open-Meteo air-quality and weather APIs.
//!
//! Both endpoints answer with a JSON body of the form
//! `{"hourly": {"time": [...], "<variable>": [...], ...}}`, which is turned
//! into a raw Polars frame with a `time` column and one `Float64` column per
//! variable. Requests are made once; failures are returned to the caller.

use crate::sources::error::SourceError;
use crate::types::location::LatLon;
use crate::types::schema::{parse_timestamp, timestamp_series, COL_TIME};
use bon::bon;
use chrono::NaiveDate;
use log::{debug, info};
use polars::prelude::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
pub const WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Hourly pollutant variables requested by default.
pub const AIR_QUALITY_VARIABLES: [&str; 7] = [
    "pm10",
    "pm2_5",
    "carbon_monoxide",
    "ozone",
    "nitrogen_dioxide",
    "sulphur_dioxide",
    "us_aqi",
];

/// Hourly weather variables requested by default.
pub const WEATHER_VARIABLES: [&str; 3] = ["temperature_2m", "relativehumidity_2m", "windspeed_10m"];

#[derive(Debug, Deserialize)]
struct HourlyResponse {
    #[serde(default)]
    hourly: Option<BTreeMap<String, Vec<Value>>>,
}

/// Fetches raw hourly observations from Open-Meteo.
///
/// # Examples
///
/// ```no_run
/// use aqi_forecast::{LatLon, OpenMeteoClient};
/// use chrono::NaiveDate;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OpenMeteoClient::new();
/// let raw = client
///     .air_quality()
///     .location(LatLon::KARACHI)
///     .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
///     .end(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap())
///     .call()
///     .await?;
/// println!("{}", raw);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: Client,
    air_quality_url: String,
    weather_url: String,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[bon]
impl OpenMeteoClient {
    /// A client talking to the public Open-Meteo endpoints.
    pub fn new() -> Self {
        Self::with_urls(AIR_QUALITY_URL, WEATHER_URL)
    }

    /// A client talking to custom endpoints (mirrors, self-hosted instances, test servers).
    pub fn with_urls(air_quality_url: impl Into<String>, weather_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            air_quality_url: air_quality_url.into(),
            weather_url: weather_url.into(),
        }
    }

    pub fn air_quality_url(&self) -> &str {
        &self.air_quality_url
    }

    pub fn weather_url(&self) -> &str {
        &self.weather_url
    }

    /// Fetches hourly pollutant concentrations for `start..=end` (UTC dates).
    ///
    /// Defaults to [`AIR_QUALITY_VARIABLES`] at [`LatLon::KARACHI`].
    ///
    /// # Errors
    ///
    /// Network and HTTP failures, a malformed body, and a response without
    /// hourly data all return a [`SourceError`].
    #[builder]
    pub async fn air_quality(
        &self,
        #[builder(default)] location: LatLon,
        start: NaiveDate,
        end: NaiveDate,
        variables: Option<Vec<String>>,
    ) -> Result<DataFrame, SourceError> {
        let variables = variables.unwrap_or_else(|| to_strings(&AIR_QUALITY_VARIABLES));
        let body = self
            .get(&self.air_quality_url, location, start, end, &variables)
            .await?;
        let df = parse_hourly(&self.air_quality_url, &body, true)?;
        info!("Fetched {} hourly air-quality rows", df.height());
        Ok(df)
    }

    /// Fetches hourly weather observations for `start..=end` (UTC dates).
    ///
    /// Defaults to [`WEATHER_VARIABLES`] at [`LatLon::KARACHI`]. A response
    /// without hourly data yields an empty frame.
    ///
    /// # Errors
    ///
    /// Network and HTTP failures and a malformed body return a [`SourceError`].
    #[builder]
    pub async fn weather(
        &self,
        #[builder(default)] location: LatLon,
        start: NaiveDate,
        end: NaiveDate,
        variables: Option<Vec<String>>,
    ) -> Result<DataFrame, SourceError> {
        let variables = variables.unwrap_or_else(|| to_strings(&WEATHER_VARIABLES));
        let body = self
            .get(&self.weather_url, location, start, end, &variables)
            .await?;
        let df = parse_hourly(&self.weather_url, &body, false)?;
        info!("Fetched {} hourly weather rows", df.height());
        Ok(df)
    }

    async fn get(
        &self,
        url: &str,
        location: LatLon,
        start: NaiveDate,
        end: NaiveDate,
        variables: &[String],
    ) -> Result<Vec<u8>, SourceError> {
        let query = [
            ("latitude", location.0.to_string()),
            ("longitude", location.1.to_string()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", end.format("%Y-%m-%d").to_string()),
            ("hourly", variables.join(",")),
        ];
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(match e.status() {
                    Some(status) => SourceError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => SourceError::NetworkRequest(url.to_string(), e),
                });
            }
        };
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Parses an Open-Meteo body into a frame with a `time` column and one
/// `Float64` column per hourly variable.
///
/// When the body has no hourly block, `required` decides between
/// [`SourceError::MissingHourly`] and an empty frame.
pub(crate) fn parse_hourly(
    url: &str,
    body: &[u8],
    required: bool,
) -> Result<DataFrame, SourceError> {
    let response: HourlyResponse =
        serde_json::from_slice(body).map_err(|e| SourceError::JsonParse(url.to_string(), e))?;

    let mut hourly = response.hourly.unwrap_or_default();
    let times = match hourly.remove(COL_TIME) {
        Some(times) if !times.is_empty() => times,
        _ if required => return Err(SourceError::MissingHourly(url.to_string())),
        _ => return Ok(DataFrame::empty()),
    };

    let ms = times
        .iter()
        .map(|v| {
            v.as_str()
                .and_then(parse_timestamp)
                .map(|dt| Some(dt.and_utc().timestamp_millis()))
                .ok_or_else(|| SourceError::TimestampParse(v.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = vec![Column::from(timestamp_series(ms)?.with_name(COL_TIME.into()))];
    for (name, values) in hourly {
        if values.len() != times.len() {
            return Err(SourceError::LengthMismatch {
                variable: name,
                expected: times.len(),
                found: values.len(),
            });
        }
        let values: Vec<Option<f64>> = values.iter().map(Value::as_f64).collect();
        columns.push(Series::new(name.into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_server;
    use crate::types::schema::column_names;

    const AIR_BODY: &str = r#"{
        "latitude": 24.875,
        "hourly_units": {"time": "iso8601", "pm2_5": "μg/m³"},
        "hourly": {
            "time": ["2024-01-01T00:00", "2024-01-01T01:00"],
            "pm2_5": [10.0, null],
            "us_aqi": [42, 50]
        }
    }"#;

    #[test]
    fn test_parse_hourly() -> Result<(), Box<dyn std::error::Error>> {
        let df = parse_hourly("test", AIR_BODY.as_bytes(), true)?;
        assert_eq!(column_names(&df), vec!["time", "pm2_5", "us_aqi"]);
        assert!(matches!(
            df.column("time")?.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));
        let pm25: Vec<Option<f64>> = df.column("pm2_5")?.f64()?.into_iter().collect();
        assert_eq!(pm25, vec![Some(10.0), None]);
        let aqi: Vec<Option<f64>> = df.column("us_aqi")?.f64()?.into_iter().collect();
        assert_eq!(aqi, vec![Some(42.0), Some(50.0)]);
        Ok(())
    }

    #[test]
    fn test_missing_hourly() -> Result<(), Box<dyn std::error::Error>> {
        let body = br#"{"latitude": 1.0}"#;
        assert!(matches!(
            parse_hourly("aq", body, true),
            Err(SourceError::MissingHourly(_))
        ));
        assert_eq!(parse_hourly("weather", body, false)?.height(), 0);
        assert_eq!(
            parse_hourly("weather", br#"{"hourly": {}}"#, false)?.height(),
            0
        );
        Ok(())
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(matches!(
            parse_hourly("x", b"not json", true),
            Err(SourceError::JsonParse(..))
        ));
        let short = br#"{"hourly": {"time": ["2024-01-01T00:00"], "pm10": [1.0, 2.0]}}"#;
        assert!(matches!(
            parse_hourly("x", short, true),
            Err(SourceError::LengthMismatch { found: 2, expected: 1, .. })
        ));
        let bad_time = br#"{"hourly": {"time": ["noon"], "pm10": [1.0]}}"#;
        assert!(matches!(
            parse_hourly("x", bad_time, true),
            Err(SourceError::TimestampParse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_from_server() -> Result<(), Box<dyn std::error::Error>> {
        let base = test_server::serve(vec![
            ("/air", 200, AIR_BODY.to_string()),
            ("/weather", 500, String::new()),
        ])
        .await?;
        let client = OpenMeteoClient::with_urls(format!("{base}/air"), format!("{base}/weather"));
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let raw = client.air_quality().start(day).end(day).call().await?;
        assert_eq!(raw.height(), 2);

        let err = client
            .weather()
            .location(LatLon(52.52, 13.40))
            .start(day)
            .end(day)
            .call()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::HttpStatus { .. }));
        Ok(())
    }
}
