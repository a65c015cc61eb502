//! Hour bucketing of raw pollutant readings.

use crate::features::error::FeatureError;
use crate::types::frames::pollutant_frame::HourlyPollutantFrame;
use crate::types::schema::{
    column_names, f64_values, floor_to_hour, is_numeric, normalize_column_name, normalize_frame,
    timestamp_series, timestamps_ms, COL_PARAMETER, COL_TIMESTAMP, COL_VALUE,
};
use log::debug;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Shape of a raw pollutant table, decided by column presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadingLayout {
    /// One row per reading: `timestamp`, `parameter`, `value`.
    Long,
    /// One column per pollutant.
    Wide,
}

impl ReadingLayout {
    fn detect(df: &DataFrame) -> Self {
        let names = column_names(df);
        let has = |wanted: &str| names.iter().any(|n| n == wanted);
        if has(COL_PARAMETER) && has(COL_VALUE) {
            ReadingLayout::Long
        } else {
            ReadingLayout::Wide
        }
    }
}

/// Reshapes raw readings into one row per hour holding the mean of every pollutant.
///
/// The input may be long form (`timestamp`/`time`, `parameter`, `value`) or wide
/// form (a time column plus one column per pollutant). Timestamps are floored to
/// the start of their hour and every reading within an hour is averaged. Long-form
/// parameters become columns named after the normalized parameter, sorted by name;
/// wide-form non-numeric columns are dropped. Rows without a timestamp are dropped.
///
/// The result is sorted by `timestamp` with one row per distinct hour.
///
/// # Errors
///
/// Returns [`FeatureError::MissingTimeColumn`] if the input has no `timestamp` or
/// `time` column, or a parsing error if that column cannot be read as timestamps.
///
/// # Examples
///
/// ```
/// use aqi_forecast::aggregate_pollutants;
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let raw = df!(
///     "timestamp" => ["2024-01-01T10:05", "2024-01-01T10:40", "2024-01-01T11:00"],
///     "parameter" => ["pm25", "pm25", "pm25"],
///     "value" => [10.0, 20.0, 30.0],
/// )?;
/// let hourly = aggregate_pollutants(raw)?;
/// assert_eq!(hourly.height(), 2);
/// # Ok(())
/// # }
/// ```
pub fn aggregate_pollutants(raw: DataFrame) -> Result<HourlyPollutantFrame, FeatureError> {
    let df = normalize_frame(raw)?;
    let layout = ReadingLayout::detect(&df);
    debug!("Aggregating {} raw readings ({:?} layout)", df.height(), layout);

    let hours: Vec<Option<i64>> = timestamps_ms(&df)?
        .into_iter()
        .map(|ms| ms.map(floor_to_hour))
        .collect();

    let frame = match layout {
        ReadingLayout::Long => pivot_long(&df, &hours)?,
        ReadingLayout::Wide => group_wide(df, hours)?,
    };
    debug!("Aggregated into {} hourly rows", frame.height());
    Ok(HourlyPollutantFrame::new(frame))
}

/// Pivots long-form readings into one column per parameter, averaging per hour.
fn pivot_long(df: &DataFrame, hours: &[Option<i64>]) -> Result<DataFrame, FeatureError> {
    let parameters = df
        .column(COL_PARAMETER)
        .map_err(|e| FeatureError::ColumnNotFound(COL_PARAMETER.to_string(), e))?
        .cast(&DataType::String)?;
    let values = f64_values(df, COL_VALUE)?;

    // hour -> parameter -> (sum, count)
    let mut cells: BTreeMap<i64, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    let mut names: BTreeSet<String> = BTreeSet::new();

    for ((hour, parameter), value) in hours.iter().zip(parameters.str()?).zip(values) {
        let (Some(hour), Some(parameter)) = (hour, parameter) else {
            continue;
        };
        let name = normalize_column_name(parameter);
        names.insert(name.clone());
        let cell = cells.entry(*hour).or_default().entry(name).or_insert((0.0, 0));
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            cell.0 += v;
            cell.1 += 1;
        }
    }

    let timestamps: Vec<Option<i64>> = cells.keys().map(|h| Some(*h)).collect();
    let mut columns = vec![Column::from(timestamp_series(timestamps)?)];
    for name in &names {
        let means: Vec<Option<f64>> = cells
            .values()
            .map(|row| {
                row.get(name)
                    .and_then(|(sum, count)| (*count > 0).then(|| sum / *count as f64))
            })
            .collect();
        columns.push(Series::new(name.as_str().into(), means).into());
    }
    Ok(DataFrame::new(columns)?)
}

/// Groups wide-form rows by hour, averaging every numeric column.
fn group_wide(mut df: DataFrame, hours: Vec<Option<i64>>) -> Result<DataFrame, FeatureError> {
    df.with_column(timestamp_series(hours)?)?;

    let means: Vec<Expr> = df
        .get_columns()
        .iter()
        .filter(|c| c.name().as_str() != COL_TIMESTAMP && is_numeric(c.dtype()))
        .map(|c| col(c.name().clone()).cast(DataType::Float64).mean())
        .collect();

    Ok(df
        .lazy()
        .filter(col(COL_TIMESTAMP).is_not_null())
        .group_by([col(COL_TIMESTAMP)])
        .agg(means)
        .sort([COL_TIMESTAMP], SortMultipleOptions::default())
        .collect()?)
}
