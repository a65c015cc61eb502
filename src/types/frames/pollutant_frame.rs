use crate::features::error::FeatureError;
use crate::types::schema::{
    column_names, find_pm25_column, ms_to_datetime, timestamps_ms, COL_TIMESTAMP,
};
use chrono::NaiveDateTime;
use polars::prelude::DataFrame;

/// Hourly pollutant means: one row per distinct hour, one column per pollutant.
///
/// Produced by [`crate::aggregate_pollutants`]. The `timestamp` column is
/// unique, floored to the hour and sorted ascending.
#[derive(Debug, Clone)]
pub struct HourlyPollutantFrame {
    /// The underlying frame with a `timestamp` column and one `Float64` column per pollutant.
    pub frame: DataFrame,
}

impl HourlyPollutantFrame {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Every column except `timestamp`.
    pub fn pollutant_columns(&self) -> Vec<String> {
        column_names(&self.frame)
            .into_iter()
            .filter(|name| name != COL_TIMESTAMP)
            .collect()
    }

    /// The column holding PM2.5 concentrations, if any.
    pub fn pm25_column(&self) -> Option<String> {
        let names = self.pollutant_columns();
        find_pm25_column(names.iter().map(String::as_str)).map(str::to_string)
    }

    /// First and last hour covered, `None` for an empty frame.
    pub fn time_span(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, FeatureError> {
        let ms = timestamps_ms(&self.frame)?;
        let mut present = ms.into_iter().flatten();
        let Some(first) = present.next() else {
            return Ok(None);
        };
        let (min, max) = present.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Ok(ms_to_datetime(min).zip(ms_to_datetime(max)))
    }

    pub fn into_inner(self) -> DataFrame {
        self.frame
    }
}
