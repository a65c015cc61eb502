use crate::store::error::StoreError;
use crate::training::trainer::{ModelArtifact, ModelMetadata};
use crate::types::horizon::Horizon;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::info;
use std::path::{Path, PathBuf};

/// Default directory of the local model registry.
pub const DEFAULT_MODELS_DIR: &str = "data/models";

const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Versionless storage of one model per horizon, keyed by `model_day{N}`.
pub trait ModelRegistry {
    /// Stores `artifact`, replacing any model with the same name.
    fn save(&self, artifact: &ModelArtifact) -> Result<(), StoreError>;

    /// Loads the model for `horizon`.
    fn load(&self, horizon: Horizon) -> Result<ModelArtifact, StoreError>;

    /// Reads the metadata (including metrics) without loading the model.
    fn metadata(&self, horizon: Horizon) -> Result<ModelMetadata, StoreError>;
}

/// Models kept in a local directory.
///
/// Each model is written as `model_day{N}.bin` (bincode) with its metadata in
/// `model_day{N}.json`.
#[derive(Debug, Clone)]
pub struct LocalModelRegistry {
    dir: PathBuf,
}

impl LocalModelRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, horizon: Horizon) -> PathBuf {
        self.dir.join(format!("{}.bin", horizon.model_name()))
    }

    pub fn metadata_path(&self, horizon: Horizon) -> PathBuf {
        self.dir.join(format!("{}.json", horizon.model_name()))
    }

    fn read_existing(&self, path: &Path, horizon: Horizon) -> Result<Vec<u8>, StoreError> {
        if !path.exists() {
            return Err(StoreError::ModelNotFound(horizon.model_name()));
        }
        std::fs::read(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))
    }
}

impl ModelRegistry for LocalModelRegistry {
    fn save(&self, artifact: &ModelArtifact) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::DirCreation(self.dir.clone(), e))?;

        let bytes = bincode::serde::encode_to_vec(artifact, BINCODE_CONFIG)
            .map_err(|e| StoreError::ModelEncode(artifact.name.clone(), Box::new(e)))?;
        let model_path = self.model_path(artifact.horizon);
        std::fs::write(&model_path, &bytes).map_err(|e| StoreError::Io(model_path.clone(), e))?;

        let metadata_path = self.metadata_path(artifact.horizon);
        let json = serde_json::to_vec_pretty(&artifact.metadata())
            .map_err(|e| StoreError::Metadata(metadata_path.clone(), e))?;
        std::fs::write(&metadata_path, json)
            .map_err(|e| StoreError::Io(metadata_path.clone(), e))?;

        info!(
            "Saved {} ({} bytes) to {}",
            artifact.name,
            bytes.len(),
            model_path.display()
        );
        Ok(())
    }

    fn load(&self, horizon: Horizon) -> Result<ModelArtifact, StoreError> {
        let path = self.model_path(horizon);
        let bytes = self.read_existing(&path, horizon)?;
        let (artifact, _) =
            bincode::serde::decode_from_slice::<ModelArtifact, _>(&bytes, BINCODE_CONFIG)
                .map_err(|e| StoreError::ModelDecode(path.clone(), Box::new(e)))?;
        Ok(artifact)
    }

    fn metadata(&self, horizon: Horizon) -> Result<ModelMetadata, StoreError> {
        let path = self.metadata_path(horizon);
        let bytes = self.read_existing(&path, horizon)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Metadata(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::forest::ForestParams;
    use crate::training::trainer::tests::cyclic_features;
    use crate::training::trainer::train_horizon;

    #[test]
    fn test_save_load_metadata() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let registry = LocalModelRegistry::new(dir.path().join("models"));
        let features = cyclic_features(72)?;
        let artifact = train_horizon(
            &features,
            Horizon::Day1,
            &ForestParams::builder().n_estimators(5).build(),
        )?;

        registry.save(&artifact)?;
        assert!(registry.model_path(Horizon::Day1).ends_with("model_day1.bin"));

        let loaded = registry.load(Horizon::Day1)?;
        assert_eq!(loaded, artifact);
        assert_eq!(
            loaded.predict_frame(&features)?,
            artifact.predict_frame(&features)?
        );

        let metadata = registry.metadata(Horizon::Day1)?;
        assert_eq!(metadata, artifact.metadata());

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(registry.metadata_path(Horizon::Day1))?)?;
        assert_eq!(json["name"], "model_day1");
        assert!(json["metrics"]["rmse"].is_number());
        assert!(json["metrics"]["r2"].is_number());
        Ok(())
    }

    #[test]
    fn test_metadata_metrics_are_exact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let registry = LocalModelRegistry::new(dir.path());
        let mut artifact = train_horizon(
            &cyclic_features(48)?,
            Horizon::Day1,
            &ForestParams::builder().n_estimators(2).build(),
        )?;
        // Values that lose their last bit under approximate float parsing.
        artifact.metrics.rmse = 2.5940667263550665;
        artifact.metrics.mae = 2.0554699849514066;
        artifact.metrics.r2 = 0.989150609769056;

        registry.save(&artifact)?;
        assert_eq!(registry.metadata(Horizon::Day1)?.metrics, artifact.metrics);
        assert_eq!(registry.load(Horizon::Day1)?.metrics, artifact.metrics);
        Ok(())
    }

    #[test]
    fn test_missing_model() {
        let registry = LocalModelRegistry::new("no/such/dir");
        assert!(matches!(
            registry.load(Horizon::Day2),
            Err(StoreError::ModelNotFound(name)) if name == "model_day2"
        ));
        assert!(matches!(
            registry.metadata(Horizon::Day3),
            Err(StoreError::ModelNotFound(_))
        ));
    }
}
