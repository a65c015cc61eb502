use crate::features::error::FeatureError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("'{0}' not found. Run the feature pipeline first.")]
    FileNotFound(PathBuf),

    #[error("I/O error on '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to write table '{0}'")]
    TableWrite(PathBuf, #[source] PolarsError),

    #[error("Failed to read table '{0}'")]
    TableRead(PathBuf, #[source] PolarsError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("Failed to encode model '{0}'")]
    ModelEncode(String, #[source] Box<bincode::error::EncodeError>),

    #[error("Failed to decode model from '{0}'")]
    ModelDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to (de)serialize model metadata '{0}'")]
    Metadata(PathBuf, #[source] serde_json::Error),

    #[error("No model named '{0}' in the registry")]
    ModelNotFound(String),

    #[error("No remote store is configured")]
    RemoteNotConfigured,

    #[error("Remote store '{0}' failed")]
    Remote(String, #[source] Box<dyn std::error::Error + Send + Sync>),
}
