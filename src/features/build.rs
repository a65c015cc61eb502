//! Feature table construction: calendar fields, AQI, lag, weather enrichment,
//! imputation and forward-looking targets.

use crate::features::asof::nearest_indices;
use crate::features::error::FeatureError;
use crate::features::targets::{
    change_rate, fill_with_mean, forward_rolling_mean, lag1, TARGET_WINDOW,
};
use crate::types::aqi::pm25_to_aqi;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::frames::pollutant_frame::HourlyPollutantFrame;
use crate::types::frames::weather_frame::WeatherFrame;
use crate::types::horizon::Horizon;
use crate::types::schema::{
    column_names, f64_values, find_pm25_column, is_numeric, timestamps_ms, COL_AQI_CHANGE_RATE,
    COL_AQI_LAG1, COL_AQI_PM25, COL_DAY, COL_HOUR, COL_MONTH, COL_PM25_VAL, COL_TIMESTAMP,
    WEATHER_SUFFIX,
};
use chrono::Duration;
use log::{debug, warn};
use polars::prelude::*;

/// Columns whose first row has no predecessor and stays null through imputation.
const LEADING_NULL_COLUMNS: [&str; 2] = [COL_AQI_LAG1, COL_AQI_CHANGE_RATE];

/// Builds the feature table from hourly pollutants and optional weather.
///
/// The default builder joins weather rows by nearest timestamp regardless of
/// distance. Use [`FeatureBuilder::with_max_join_distance`] to leave pollutant
/// rows without weather when the closest observation is too far away.
///
/// ```
/// use aqi_forecast::{aggregate_pollutants, FeatureBuilder, WeatherFrame};
/// use chrono::Duration;
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pollutants = aggregate_pollutants(df!(
///     "time" => ["2024-01-01T00:00", "2024-01-01T01:00"],
///     "pm2_5" => [10.0, 40.0],
/// )?)?;
/// let weather = WeatherFrame::from_raw(df!(
///     "time" => ["2024-01-03T00:00"],
///     "temperature_2m" => [21.5],
/// )?)?;
///
/// let features = FeatureBuilder::new()
///     .with_max_join_distance(Duration::hours(3))
///     .build(&pollutants, Some(&weather))?;
/// // Too far away: the joined column exists but holds no observations.
/// assert_eq!(features.values_or_null("temperature_2m")?, vec![None, None]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    max_join_distance: Option<Duration>,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops weather matches further than `distance` from the pollutant hour.
    pub fn with_max_join_distance(mut self, distance: Duration) -> Self {
        self.max_join_distance = Some(distance);
        self
    }

    pub fn max_join_distance(&self) -> Option<Duration> {
        self.max_join_distance
    }

    /// Produces the feature table, ordered by `timestamp` ascending.
    ///
    /// In order: sort by time, derive `hour`/`day`/`month`, read PM2.5 into
    /// `pm25_val`, convert it into `aqi_pm25`, derive `aqi_lag1` and
    /// `aqi_change_rate`, join weather, fill missing numeric values with their
    /// column mean, and finally compute `target_day1..3`.
    ///
    /// A table without a PM2.5 column is not an error: `pm25_val`, `aqi_pm25`
    /// and everything derived from them are null.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::MissingTimeColumn`] if the pollutant frame has no
    /// `timestamp` column, or a [`FeatureError::DataFrameProcessing`] error if a
    /// Polars operation fails.
    pub fn build(
        &self,
        pollutants: &HourlyPollutantFrame,
        weather: Option<&WeatherFrame>,
    ) -> Result<FeatureFrame, FeatureError> {
        if !column_names(&pollutants.frame)
            .iter()
            .any(|n| n == COL_TIMESTAMP)
        {
            return Err(FeatureError::MissingTimeColumn {
                columns: column_names(&pollutants.frame),
            });
        }

        let mut df = pollutants
            .frame
            .clone()
            .lazy()
            .sort([COL_TIMESTAMP], SortMultipleOptions::default())
            .with_columns([
                col(COL_TIMESTAMP).dt().hour().cast(DataType::Int32).alias(COL_HOUR),
                col(COL_TIMESTAMP).dt().day().cast(DataType::Int32).alias(COL_DAY),
                col(COL_TIMESTAMP).dt().month().cast(DataType::Int32).alias(COL_MONTH),
            ])
            .collect()?;
        let height = df.height();

        let names = column_names(&df);
        let pm25 = match find_pm25_column(names.iter().map(String::as_str)) {
            Some(name) => {
                debug!("Using '{}' as the PM2.5 column", name);
                f64_values(&df, name)?
            }
            None => {
                warn!(
                    "No PM2.5 column among {:?}, AQI fields will be null",
                    names
                );
                vec![None; height]
            }
        };
        let aqi: Vec<Option<f64>> = pm25.iter().map(|c| pm25_to_aqi(*c)).collect();
        let lag = lag1(&aqi);
        let rate = change_rate(&aqi, &lag);

        set_f64(&mut df, COL_PM25_VAL, pm25)?;
        set_f64(&mut df, COL_AQI_PM25, aqi)?;
        set_f64(&mut df, COL_AQI_LAG1, lag)?;
        set_f64(&mut df, COL_AQI_CHANGE_RATE, rate)?;

        if let Some(weather) = weather.filter(|w| !w.is_empty()) {
            self.join_weather(&mut df, weather)?;
        }

        impute_means(&mut df)?;

        let aqi = f64_values(&df, COL_AQI_PM25)?;
        for horizon in Horizon::ALL {
            let target = forward_rolling_mean(&aqi, horizon.shift_hours(), TARGET_WINDOW, 1);
            set_f64(&mut df, horizon.target_column(), target)?;
        }

        debug!("Built {} feature rows with {} columns", df.height(), df.width());
        Ok(FeatureFrame::new(df))
    }

    /// Attaches every numeric weather variable to its nearest pollutant hour.
    ///
    /// Variables whose name already exists in `df` get the `_weather` suffix.
    fn join_weather(&self, df: &mut DataFrame, weather: &WeatherFrame) -> Result<(), FeatureError> {
        let weather = weather.frame();
        let left = timestamps_ms(df)?;
        // (timestamp, row) of every weather row with a time, in time order.
        let mut rows: Vec<(i64, usize)> = timestamps_ms(weather)?
            .into_iter()
            .enumerate()
            .filter_map(|(row, t)| t.map(|t| (t, row)))
            .collect();
        rows.sort_by_key(|&(t, _)| t);
        let right: Vec<i64> = rows.iter().map(|&(t, _)| t).collect();
        let tolerance = self.max_join_distance.map(|d| d.num_milliseconds());
        let matches: Vec<Option<usize>> = nearest_indices(&left, &right, tolerance)
            .into_iter()
            .map(|m| m.map(|i| rows[i].1))
            .collect();

        let existing = column_names(df);
        for column in weather.get_columns() {
            let name = column.name().as_str();
            if name == COL_TIMESTAMP {
                continue;
            }
            if !is_numeric(column.dtype()) {
                debug!("Skipping non-numeric weather column '{}'", name);
                continue;
            }
            let values = f64_values(weather, name)?;
            let joined: Vec<Option<f64>> = matches
                .iter()
                .map(|m| m.and_then(|i| values[i]))
                .collect();
            let target = if existing.iter().any(|n| n == name) {
                format!("{name}{WEATHER_SUFFIX}")
            } else {
                name.to_string()
            };
            set_f64(df, &target, joined)?;
        }
        Ok(())
    }
}

/// Builds the feature table with the default [`FeatureBuilder`].
///
/// See [`FeatureBuilder::build`].
///
/// # Examples
///
/// ```
/// use aqi_forecast::{aggregate_pollutants, build_features};
/// use polars::prelude::*;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let pollutants = aggregate_pollutants(df!(
///     "timestamp" => ["2024-01-01T00:00", "2024-01-01T01:00", "2024-01-01T02:00"],
///     "pm2_5" => [10.0, 40.0, 60.0],
/// )?)?;
/// let features = build_features(&pollutants, None)?;
/// assert_eq!(
///     features.values_or_null("aqi_pm25")?,
///     vec![Some(42.0), Some(112.0), Some(153.0)]
/// );
/// # Ok(())
/// # }
/// ```
pub fn build_features(
    pollutants: &HourlyPollutantFrame,
    weather: Option<&WeatherFrame>,
) -> Result<FeatureFrame, FeatureError> {
    FeatureBuilder::default().build(pollutants, weather)
}

/// Inserts or replaces a `Float64` column.
fn set_f64(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<(), FeatureError> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Fills missing values of every float column with that column's mean.
fn impute_means(df: &mut DataFrame) -> Result<(), FeatureError> {
    let float_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| matches!(c.dtype(), DataType::Float64 | DataType::Float32))
        .map(|c| c.name().to_string())
        .collect();

    for name in float_columns {
        let values = f64_values(df, &name)?;
        let keep_leading = usize::from(LEADING_NULL_COLUMNS.contains(&name.as_str()));
        let filled = fill_with_mean(&values, keep_leading);
        set_f64(df, &name, filled)?;
    }
    Ok(())
}
