mod config;
mod error;
mod features;
mod forecast;
mod pipeline;
mod sources;
mod store;
mod training;
mod types;

pub use config::*;
pub use error::{AqiError, ConfigError};
pub use forecast::*;
pub use pipeline::*;

pub use features::aggregate::aggregate_pollutants;
pub use features::build::{build_features, FeatureBuilder};
pub use features::error::FeatureError;
pub use features::targets::{
    change_rate, fill_with_mean, forward_rolling_mean, lag1, CHANGE_RATE_EPSILON, TARGET_WINDOW,
};

pub use sources::error::SourceError;
pub use sources::open_meteo::*;

pub use store::error::StoreError;
pub use store::feature_store::*;
pub use store::model_registry::*;
pub use store::tiered::*;

pub use training::dataset::{
    train_test_split, FeatureMatrix, TrainingSet, SPLIT_SEED, TEST_FRACTION,
};
pub use training::error::TrainingError;
pub use training::forest::*;
pub use training::metrics::Metrics;
pub use training::trainer::*;

pub use types::aqi::*;
pub use types::frames::feature_frame::*;
pub use types::frames::pollutant_frame::*;
pub use types::frames::weather_frame::*;
pub use types::horizon::Horizon;
pub use types::location::LatLon;
pub use types::schema::{
    find_pm25_column, find_time_column, normalize_column_name, normalize_frame, parse_timestamp,
    COL_AQI_CHANGE_RATE, COL_AQI_LAG1, COL_AQI_PM25, COL_DAY, COL_HOUR, COL_MONTH, COL_PARAMETER,
    COL_PM25_VAL, COL_TARGET_DAY1, COL_TARGET_DAY2, COL_TARGET_DAY3, COL_TIME, COL_TIMESTAMP,
    COL_VALUE, TARGET_COLUMNS, WEATHER_SUFFIX,
};
