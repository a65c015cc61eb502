use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse JSON response from {0}")]
    JsonParse(String, #[source] serde_json::Error),

    #[error("Response from {0} has no hourly data")]
    MissingHourly(String),

    #[error("Hourly variable '{variable}' has {found} values, expected {expected}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Could not parse '{0}' as an hourly timestamp")]
    TimestampParse(String),

    #[error("Failed processing DataFrame: {0}")]
    DataFrame(#[from] PolarsError),
}
