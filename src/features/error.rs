use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("No 'timestamp' or 'time' column found in data (columns: {columns:?})")]
    MissingTimeColumn { columns: Vec<String> },

    #[error("Could not parse '{value}' in column '{column}' as a timestamp")]
    TimestampParse { column: String, value: String },

    #[error("Column '{column}' has type {dtype}, which cannot be read as a timestamp")]
    UnsupportedTimeType { column: String, dtype: String },

    #[error("Required column '{0}' not found in DataFrame")]
    ColumnNotFound(String, #[source] PolarsError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
