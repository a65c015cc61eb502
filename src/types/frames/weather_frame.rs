use crate::features::error::FeatureError;
use crate::types::schema::{column_names, normalize_frame, timestamp_series, COL_TIMESTAMP};
use polars::prelude::*;

/// Hourly weather observations used to enrich the feature table.
///
/// An empty frame means "no enrichment": building features against it yields
/// the same table as building without weather at all.
#[derive(Debug, Clone)]
pub struct WeatherFrame {
    frame: DataFrame,
}

impl WeatherFrame {
    /// Normalizes a raw weather table (`time` or `timestamp` plus variables).
    ///
    /// Rows without a timestamp are dropped and the rest sorted by time.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::MissingTimeColumn`] if the table has no time column.
    pub fn from_raw(raw: DataFrame) -> Result<Self, FeatureError> {
        if raw.width() == 0 {
            return Ok(Self::empty());
        }
        let frame = normalize_frame(raw)?
            .lazy()
            .filter(col(COL_TIMESTAMP).is_not_null())
            .sort([COL_TIMESTAMP], SortMultipleOptions::default())
            .collect()?;
        Ok(Self { frame })
    }

    /// A weather frame with no rows and no variables.
    pub fn empty() -> Self {
        let frame = timestamp_series(Vec::new())
            .and_then(|ts| DataFrame::new(vec![ts.into()]))
            .unwrap_or_default();
        Self { frame }
    }

    /// Normalized frame: a `timestamp` column sorted ascending without nulls, then
    /// one column per weather variable.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_inner(self) -> DataFrame {
        self.frame
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Names of the weather variables (every column but `timestamp`).
    pub fn variables(&self) -> Vec<String> {
        column_names(&self.frame)
            .into_iter()
            .filter(|name| name != COL_TIMESTAMP)
            .collect()
    }
}

impl Default for WeatherFrame {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::schema::timestamps_ms;

    #[test]
    fn test_from_raw_sorts_and_normalizes() -> Result<(), Box<dyn std::error::Error>> {
        let raw = df!(
            "time" => [Some("2024-01-01T02:00"), None, Some("2024-01-01T01:00")],
            "Temperature 2m" => [2.0, 9.0, 1.0],
        )?;
        let weather = WeatherFrame::from_raw(raw)?;

        assert_eq!(weather.height(), 2);
        assert_eq!(weather.variables(), vec!["temperature_2m"]);
        assert_eq!(
            timestamps_ms(&weather.frame)?,
            vec![Some(1_704_070_800_000), Some(1_704_074_400_000)]
        );
        Ok(())
    }

    #[test]
    fn test_empty_weather() -> Result<(), Box<dyn std::error::Error>> {
        let weather = WeatherFrame::empty();
        assert!(weather.is_empty());
        assert!(weather.variables().is_empty());
        assert!(WeatherFrame::from_raw(DataFrame::empty())?.is_empty());
        Ok(())
    }
}
