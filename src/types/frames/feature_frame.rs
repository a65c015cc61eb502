//! The engineered feature table and its typed row view.

use crate::features::error::FeatureError;
use crate::types::schema::{
    column_names, f64_values, is_numeric, ms_to_datetime, timestamps_ms, COL_AQI_CHANGE_RATE,
    COL_AQI_LAG1, COL_AQI_PM25, COL_DAY, COL_HOUR, COL_MONTH, COL_PM25_VAL, COL_TARGET_DAY1,
    COL_TARGET_DAY2, COL_TARGET_DAY3, COL_TIME, COL_TIMESTAMP, TARGET_COLUMNS,
};
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One hour of the feature table with the derived fields statically typed.
///
/// Pollutant and weather columns vary with the data source, so they are kept
/// by name in [`FeatureRow::measurements`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: NaiveDateTime,
    pub hour: Option<i32>,
    pub day: Option<i32>,
    pub month: Option<i32>,
    pub pm25_val: Option<f64>,
    pub aqi_pm25: Option<f64>,
    pub aqi_lag1: Option<f64>,
    pub aqi_change_rate: Option<f64>,
    pub target_day1: Option<f64>,
    pub target_day2: Option<f64>,
    pub target_day3: Option<f64>,
    /// Every other numeric column (pollutant means, joined weather variables).
    pub measurements: BTreeMap<String, Option<f64>>,
}

const DERIVED_COLUMNS: [&str; 11] = [
    COL_TIMESTAMP,
    COL_HOUR,
    COL_DAY,
    COL_MONTH,
    COL_PM25_VAL,
    COL_AQI_PM25,
    COL_AQI_LAG1,
    COL_AQI_CHANGE_RATE,
    COL_TARGET_DAY1,
    COL_TARGET_DAY2,
    COL_TARGET_DAY3,
];

/// The feature table: one row per hour ordered by `timestamp` ascending.
///
/// Built by [`crate::build_features`], persisted through a
/// [`crate::FeatureStore`] and consumed by the training and forecast stages.
///
/// # Examples
///
/// ```
/// use aqi_forecast::{aggregate_pollutants, build_features};
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let raw = df!(
///     "time" => ["2024-01-01T00:00", "2024-01-01T01:00"],
///     "pm2_5" => [10.0, 40.0],
/// )?;
/// let features = build_features(&aggregate_pollutants(raw)?, None)?;
///
/// let rows = features.rows()?;
/// assert_eq!(rows[0].aqi_pm25, Some(42.0));
/// assert_eq!(rows[1].aqi_lag1, Some(42.0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// The underlying Polars frame.
    pub frame: DataFrame,
}

impl FeatureFrame {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    /// Applies a Polars predicate and returns the matching rows as a new frame.
    ///
    /// ```
    /// # use aqi_forecast::{aggregate_pollutants, build_features};
    /// use polars::prelude::*;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let raw = df!(
    /// #     "time" => ["2024-01-01T00:00", "2024-01-01T01:00"],
    /// #     "pm2_5" => [10.0, 60.0],
    /// # )?;
    /// let features = build_features(&aggregate_pollutants(raw)?, None)?;
    /// let unhealthy = features.filter(col("aqi_pm25").gt(lit(150.0)))?;
    /// assert_eq!(unhealthy.height(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn filter(&self, predicate: Expr) -> Result<FeatureFrame, FeatureError> {
        Ok(FeatureFrame::new(self.lazy().filter(predicate).collect()?))
    }

    /// Rows whose timestamp falls within `start..=end`.
    pub fn get_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<FeatureFrame, FeatureError> {
        self.filter(
            col(COL_TIMESTAMP)
                .gt_eq(lit(start))
                .and(col(COL_TIMESTAMP).lt_eq(lit(end))),
        )
    }

    /// The last `n` rows (all rows if there are fewer).
    pub fn tail(&self, n: usize) -> FeatureFrame {
        FeatureFrame::new(self.frame.tail(Some(n)))
    }

    pub fn timestamps(&self) -> Result<Vec<Option<NaiveDateTime>>, FeatureError> {
        Ok(timestamps_ms(&self.frame)?
            .into_iter()
            .map(|ms| ms.and_then(ms_to_datetime))
            .collect())
    }

    /// Numeric columns usable as model inputs: everything except the time and
    /// target columns.
    pub fn feature_columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .filter(|c| is_numeric(c.dtype()))
            .map(|c| c.name().to_string())
            .filter(|name| {
                name != COL_TIMESTAMP
                    && name != COL_TIME
                    && !TARGET_COLUMNS.contains(&name.as_str())
            })
            .collect()
    }

    /// Reads a column as `f64`, or all `None` if the frame does not have it.
    pub fn values_or_null(&self, name: &str) -> Result<Vec<Option<f64>>, FeatureError> {
        if column_names(&self.frame).iter().any(|n| n == name) {
            f64_values(&self.frame, name)
        } else {
            Ok(vec![None; self.height()])
        }
    }

    /// Collects the frame into typed rows. Rows without a timestamp are skipped.
    pub fn rows(&self) -> Result<Vec<FeatureRow>, FeatureError> {
        let timestamps = self.timestamps()?;
        let as_i32 = |values: Vec<Option<f64>>| -> Vec<Option<i32>> {
            values.into_iter().map(|v| v.map(|v| v as i32)).collect()
        };
        let hour = as_i32(self.values_or_null(COL_HOUR)?);
        let day = as_i32(self.values_or_null(COL_DAY)?);
        let month = as_i32(self.values_or_null(COL_MONTH)?);
        let pm25_val = self.values_or_null(COL_PM25_VAL)?;
        let aqi_pm25 = self.values_or_null(COL_AQI_PM25)?;
        let aqi_lag1 = self.values_or_null(COL_AQI_LAG1)?;
        let aqi_change_rate = self.values_or_null(COL_AQI_CHANGE_RATE)?;
        let target_day1 = self.values_or_null(COL_TARGET_DAY1)?;
        let target_day2 = self.values_or_null(COL_TARGET_DAY2)?;
        let target_day3 = self.values_or_null(COL_TARGET_DAY3)?;

        let measurement_names: Vec<String> = self
            .feature_columns()
            .into_iter()
            .filter(|name| !DERIVED_COLUMNS.contains(&name.as_str()))
            .collect();
        let measurement_values = measurement_names
            .iter()
            .map(|name| f64_values(&self.frame, name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(timestamps
            .into_iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                Some(FeatureRow {
                    timestamp: ts?,
                    hour: hour[i],
                    day: day[i],
                    month: month[i],
                    pm25_val: pm25_val[i],
                    aqi_pm25: aqi_pm25[i],
                    aqi_lag1: aqi_lag1[i],
                    aqi_change_rate: aqi_change_rate[i],
                    target_day1: target_day1[i],
                    target_day2: target_day2[i],
                    target_day3: target_day3[i],
                    measurements: measurement_names
                        .iter()
                        .zip(&measurement_values)
                        .map(|(name, values)| (name.clone(), values[i]))
                        .collect(),
                })
            })
            .collect())
    }

    pub fn into_inner(self) -> DataFrame {
        self.frame
    }
}
