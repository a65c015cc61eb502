//! Canonical column names and the normalization adapter applied to every raw
//! frame at ingestion.
//!
//! Raw inputs disagree on naming (`time` vs `timestamp`, `PM2.5` vs `pm2_5`)
//! and on how timestamps are typed (strings, dates, datetimes of any unit).
//! [`normalize_frame`] resolves all of that once, so the rest of the crate
//! works against a single schema: a timezone-naive UTC `timestamp` column in
//! milliseconds and lowercase `snake_case` names for everything else.

use crate::features::error::FeatureError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use std::collections::HashSet;

// Time
pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_TIME: &str = "time";

// Long-form readings
pub const COL_PARAMETER: &str = "parameter";
pub const COL_VALUE: &str = "value";

// Calendar
pub const COL_HOUR: &str = "hour";
pub const COL_DAY: &str = "day";
pub const COL_MONTH: &str = "month";

// Derived AQI fields
pub const COL_PM25_VAL: &str = "pm25_val";
pub const COL_AQI_PM25: &str = "aqi_pm25";
pub const COL_AQI_LAG1: &str = "aqi_lag1";
pub const COL_AQI_CHANGE_RATE: &str = "aqi_change_rate";

// Targets
pub const COL_TARGET_DAY1: &str = "target_day1";
pub const COL_TARGET_DAY2: &str = "target_day2";
pub const COL_TARGET_DAY3: &str = "target_day3";
pub const TARGET_COLUMNS: [&str; 3] = [COL_TARGET_DAY1, COL_TARGET_DAY2, COL_TARGET_DAY3];

/// Suffix given to weather columns whose name collides with a pollutant column.
pub const WEATHER_SUFFIX: &str = "_weather";

/// Substrings identifying a PM2.5 concentration column.
const PM25_ALIASES: [&str; 3] = ["pm25", "pm2_5", "pm2.5"];

/// Accepted textual timestamp layouts, tried in order after RFC 3339.
const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub(crate) const MS_PER_HOUR: i64 = 3_600_000;
const MS_PER_DAY: i64 = 86_400_000;

/// Lowercases a column name and replaces every non-alphanumeric character with `_`.
///
/// ```
/// use aqi_forecast::normalize_column_name;
///
/// assert_eq!(normalize_column_name("PM2.5"), "pm2_5");
/// assert_eq!(normalize_column_name(" Relative Humidity "), "relative_humidity");
/// ```
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Returns the time column of a frame, preferring `timestamp` over `time`.
pub fn find_time_column<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let names: Vec<&str> = names.into_iter().collect();
    [COL_TIMESTAMP, COL_TIME]
        .into_iter()
        .find_map(|wanted| names.iter().copied().find(|n| *n == wanted))
}

/// Returns the first column whose name looks like a PM2.5 concentration.
///
/// Derived columns (`pm25_val`, `aqi_pm25`) are never matched.
pub fn find_pm25_column<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    names.into_iter().find(|name| {
        *name != COL_PM25_VAL
            && *name != COL_AQI_PM25
            && PM25_ALIASES.iter().any(|alias| name.contains(alias))
    })
}

/// True for the dtypes that take part in averaging and imputation.
pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Parses a textual timestamp. Offsets are converted to UTC; naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Floors epoch milliseconds to the start of their hour.
pub(crate) fn floor_to_hour(ms: i64) -> i64 {
    ms - ms.rem_euclid(MS_PER_HOUR)
}

pub(crate) fn ms_to_datetime(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Reads any supported time column as epoch milliseconds.
pub(crate) fn column_to_epoch_ms(column: &Column) -> Result<Vec<Option<i64>>, FeatureError> {
    let name = column.name().to_string();
    match column.dtype() {
        DataType::Datetime(unit, _) => {
            let divisor = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let physical = column.cast(&DataType::Int64)?;
            Ok(physical
                .i64()?
                .into_iter()
                .map(|v| v.map(|v| v.div_euclid(divisor)))
                .collect())
        }
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .i32()?
                .into_iter()
                .map(|v| v.map(|d| i64::from(d) * MS_PER_DAY))
                .collect())
        }
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| match v {
                None => Ok(None),
                Some(s) => parse_timestamp(s)
                    .map(|dt| Some(dt.and_utc().timestamp_millis()))
                    .ok_or_else(|| FeatureError::TimestampParse {
                        column: name.clone(),
                        value: s.to_string(),
                    }),
            })
            .collect(),
        other => Err(FeatureError::UnsupportedTimeType {
            column: name,
            dtype: other.to_string(),
        }),
    }
}

/// Builds the canonical `timestamp` column from epoch milliseconds.
pub(crate) fn timestamp_series(ms: Vec<Option<i64>>) -> Result<Series, PolarsError> {
    Series::new(COL_TIMESTAMP.into(), ms).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}

/// Reads the canonical `timestamp` column back as epoch milliseconds.
pub(crate) fn timestamps_ms(df: &DataFrame) -> Result<Vec<Option<i64>>, FeatureError> {
    let column = df
        .column(COL_TIMESTAMP)
        .map_err(|_| FeatureError::MissingTimeColumn {
            columns: column_names(df),
        })?;
    column_to_epoch_ms(column)
}

/// Reads a column as `f64` values, casting integer columns.
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, FeatureError> {
    let column = df
        .column(name)
        .map_err(|e| FeatureError::ColumnNotFound(name.to_string(), e))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

pub(crate) fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Normalizes a raw frame to the canonical schema.
///
/// * every column name goes through [`normalize_column_name`]; names that
///   collide after normalization get a numeric suffix,
/// * the `timestamp`/`time` column is parsed into a `Datetime(ms)` column named
///   `timestamp`; any other time alias is dropped.
///
/// # Errors
///
/// * [`FeatureError::MissingTimeColumn`] if neither `timestamp` nor `time` is present.
/// * [`FeatureError::TimestampParse`] / [`FeatureError::UnsupportedTimeType`] if the
///   time column cannot be read.
pub fn normalize_frame(mut df: DataFrame) -> Result<DataFrame, FeatureError> {
    let mut seen = HashSet::new();
    let normalized: Vec<String> = column_names(&df)
        .iter()
        .map(|name| {
            let base = normalize_column_name(name);
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        })
        .collect();
    df.set_column_names(normalized.iter().map(String::as_str))?;

    let names = column_names(&df);
    let time_col = find_time_column(names.iter().map(String::as_str))
        .ok_or_else(|| FeatureError::MissingTimeColumn {
            columns: names.clone(),
        })?
        .to_string();

    let ms = column_to_epoch_ms(df.column(&time_col)?)?;
    for alias in [COL_TIME, COL_TIMESTAMP] {
        if names.iter().any(|n| n == alias) {
            df = df.drop(alias)?;
        }
    }

    let mut columns = vec![Column::from(timestamp_series(ms)?)];
    columns.extend(df.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("pm2.5"), "pm2_5");
        assert_eq!(normalize_column_name("Carbon-Monoxide"), "carbon_monoxide");
        assert_eq!(normalize_column_name("us_aqi"), "us_aqi");
    }

    #[test]
    fn test_find_pm25_column_variants() {
        assert_eq!(find_pm25_column(["pm10", "pm2_5"]), Some("pm2_5"));
        assert_eq!(find_pm25_column(["station_pm25"]), Some("station_pm25"));
        assert_eq!(find_pm25_column(["pm25_val", "aqi_pm25"]), None);
        assert_eq!(find_pm25_column(["ozone", "pm10"]), None);
    }

    #[test]
    fn test_find_time_column_prefers_timestamp() {
        assert_eq!(find_time_column(["time", "timestamp"]), Some("timestamp"));
        assert_eq!(find_time_column(["time", "pm10"]), Some("time"));
        assert_eq!(find_time_column(["pm10"]), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01T13:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 13:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T13:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T18:00:00+05:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_floor_to_hour() {
        assert_eq!(floor_to_hour(MS_PER_HOUR + 59 * 60_000), MS_PER_HOUR);
        assert_eq!(floor_to_hour(2 * MS_PER_HOUR), 2 * MS_PER_HOUR);
        assert_eq!(floor_to_hour(-1), -MS_PER_HOUR);
    }

    #[test]
    fn test_normalize_frame_renames_and_parses_time() -> Result<(), Box<dyn std::error::Error>> {
        let df = DataFrame::new(vec![
            Series::new("Time".into(), &["2024-01-01T00:00", "2024-01-01T01:00"]).into(),
            Series::new("PM2.5".into(), &[10.0, 20.0]).into(),
        ])?;

        let normalized = normalize_frame(df)?;
        assert_eq!(column_names(&normalized), vec!["timestamp", "pm2_5"]);
        assert!(matches!(
            normalized.column(COL_TIMESTAMP)?.dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));
        assert_eq!(
            timestamps_ms(&normalized)?,
            vec![Some(1_704_067_200_000), Some(1_704_070_800_000)]
        );
        Ok(())
    }

    #[test]
    fn test_normalize_frame_without_time_column() -> Result<(), Box<dyn std::error::Error>> {
        let df = DataFrame::new(vec![Series::new("pm10".into(), &[1.0]).into()])?;
        let err = normalize_frame(df).unwrap_err();
        assert!(matches!(err, FeatureError::MissingTimeColumn { .. }));
        Ok(())
    }

    #[test]
    fn test_normalize_frame_deduplicates_names() -> Result<(), Box<dyn std::error::Error>> {
        let df = DataFrame::new(vec![
            Series::new("timestamp".into(), &["2024-01-01 00:00:00"]).into(),
            Series::new("PM2.5".into(), &[1.0]).into(),
            Series::new("pm2_5".into(), &[2.0]).into(),
        ])?;
        let normalized = normalize_frame(df)?;
        assert_eq!(
            column_names(&normalized),
            vec!["timestamp", "pm2_5", "pm2_5_1"]
        );
        Ok(())
    }
}
