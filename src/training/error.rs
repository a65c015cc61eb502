use crate::features::error::FeatureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Target column '{0}' not found in the feature table")]
    MissingTarget(String),

    #[error("No rows with a non-null '{target}' to train on")]
    EmptyTrainingSet { target: String },

    #[error("Need at least {needed} samples, found {found}")]
    InsufficientSamples { needed: usize, found: usize },

    #[error("Expected {expected} feature values per row, found {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("Got {rows} feature rows but {targets} targets")]
    TargetLengthMismatch { rows: usize, targets: usize },

    #[error("Model has not been fitted")]
    NotFitted,

    #[error(transparent)]
    Feature(#[from] FeatureError),
}
