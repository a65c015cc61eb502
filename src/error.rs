use crate::features::error::FeatureError;
use crate::sources::error::SourceError;
use crate::store::error::StoreError;
use crate::training::error::TrainingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum AqiError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No pollutant data returned for {0}")]
    NoPollutantData(String),
}
