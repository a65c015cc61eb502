//! Serving predictions from trained models.

use crate::store::error::StoreError;
use crate::store::model_registry::ModelRegistry;
use crate::training::error::TrainingError;
use crate::training::trainer::ModelArtifact;
use crate::types::aqi::AqiCategory;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::horizon::Horizon;
use chrono::NaiveDateTime;
use log::{info, warn};
use std::collections::BTreeMap;

/// Predicted AQI for every row of a feature table, for one horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub horizon: Horizon,
    /// Timestamp of the feature row each prediction was made from.
    pub timestamps: Vec<Option<NaiveDateTime>>,
    pub predictions: Vec<f64>,
    /// Model inputs ranked by importance, most important first.
    pub importances: Vec<(String, f64)>,
}

impl Forecast {
    /// The prediction made from the most recent row.
    pub fn latest(&self) -> Option<f64> {
        self.predictions.last().copied()
    }

    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied().flatten()
    }

    pub fn latest_category(&self) -> Option<AqiCategory> {
        self.latest().and_then(AqiCategory::from_aqi)
    }

    /// The `k` inputs that contributed most to the model's splits.
    pub fn top_features(&self, k: usize) -> &[(String, f64)] {
        &self.importances[..k.min(self.importances.len())]
    }
}

/// Holds one model per horizon and predicts with them.
///
/// ```no_run
/// use aqi_forecast::{
///     FeatureStore, Forecaster, Horizon, LocalFeatureStore, LocalModelRegistry,
/// };
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let features = LocalFeatureStore::new("data/features.csv").read()?;
/// let registry = LocalModelRegistry::new("data/models");
/// let forecaster = Forecaster::from_registry(&registry, &Horizon::ALL)?;
///
/// for forecast in forecaster.predict_all(&features.tail(1))? {
///     println!(
///         "{}: AQI {:.0} ({:?})",
///         forecast.horizon,
///         forecast.latest().unwrap_or(f64::NAN),
///         forecast.latest_category()
///     );
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Forecaster {
    artifacts: BTreeMap<Horizon, ModelArtifact>,
}

impl Forecaster {
    pub fn new(artifacts: impl IntoIterator<Item = ModelArtifact>) -> Self {
        Self {
            artifacts: artifacts.into_iter().map(|a| (a.horizon, a)).collect(),
        }
    }

    /// Loads the models for `horizons`, skipping the ones that were never trained.
    ///
    /// # Errors
    ///
    /// Any registry failure other than [`StoreError::ModelNotFound`].
    pub fn from_registry(
        registry: &impl ModelRegistry,
        horizons: &[Horizon],
    ) -> Result<Self, StoreError> {
        let mut artifacts = BTreeMap::new();
        for &horizon in horizons {
            match registry.load(horizon) {
                Ok(artifact) => {
                    info!("Loaded {} ({})", artifact.name, artifact.metrics);
                    artifacts.insert(horizon, artifact);
                }
                Err(StoreError::ModelNotFound(name)) => {
                    warn!("No model '{}' in the registry, skipping {}", name, horizon);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self { artifacts })
    }

    pub fn horizons(&self) -> Vec<Horizon> {
        self.artifacts.keys().copied().collect()
    }

    pub fn artifact(&self, horizon: Horizon) -> Option<&ModelArtifact> {
        self.artifacts.get(&horizon)
    }

    /// Predicts one AQI per row of `features` with the model for `horizon`.
    ///
    /// Returns `Ok(None)` when no model is loaded for `horizon`.
    pub fn predict(
        &self,
        horizon: Horizon,
        features: &FeatureFrame,
    ) -> Result<Option<Forecast>, TrainingError> {
        let Some(artifact) = self.artifacts.get(&horizon) else {
            return Ok(None);
        };
        Ok(Some(Forecast {
            horizon,
            timestamps: features.timestamps()?,
            predictions: artifact.predict_frame(features)?,
            importances: artifact.ranked_importances(),
        }))
    }

    /// Forecasts for every loaded horizon, shortest first.
    pub fn predict_all(&self, features: &FeatureFrame) -> Result<Vec<Forecast>, TrainingError> {
        self.artifacts
            .keys()
            .filter_map(|&h| self.predict(h, features).transpose())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model_registry::LocalModelRegistry;
    use crate::training::forest::ForestParams;
    use crate::training::trainer::tests::cyclic_features;
    use crate::training::trainer::train_horizon;
    use polars::prelude::*;

    #[test]
    fn test_forecast_from_registry() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let registry = LocalModelRegistry::new(dir.path());
        let features = cyclic_features(72)?;
        let params = ForestParams::builder().n_estimators(5).build();
        registry.save(&train_horizon(&features, Horizon::Day1, &params)?)?;

        let forecaster = Forecaster::from_registry(&registry, &Horizon::ALL)?;
        assert_eq!(forecaster.horizons(), vec![Horizon::Day1]);

        let latest = features.tail(1);
        let forecasts = forecaster.predict_all(&latest)?;
        assert_eq!(forecasts.len(), 1);

        let forecast = &forecasts[0];
        assert_eq!(forecast.predictions.len(), 1);
        assert_eq!(forecast.latest_timestamp(), latest.timestamps()?[0]);
        let aqi = forecast.latest().unwrap();
        assert_eq!(forecast.latest_category(), AqiCategory::from_aqi(aqi));
        assert_eq!(forecast.top_features(3).len(), 3);
        assert_eq!(forecast.top_features(1000).len(), forecast.importances.len());

        assert!(forecaster.predict(Horizon::Day2, &latest)?.is_none());
        Ok(())
    }

    #[test]
    fn test_predict_uses_training_columns() -> Result<(), Box<dyn std::error::Error>> {
        let features = cyclic_features(72)?;
        let artifact = train_horizon(
            &features,
            Horizon::Day1,
            &ForestParams::builder().n_estimators(3).build(),
        )?;
        let expected = artifact.predict_frame(&features)?;

        // Extra columns are ignored.
        let mut wider = features.clone();
        wider
            .frame
            .with_column(Series::new("extra".into(), vec![1.0; 72]))?;

        let forecaster = Forecaster::new([artifact]);
        let forecast = forecaster.predict(Horizon::Day1, &wider)?.unwrap();
        assert_eq!(forecast.predictions, expected);
        Ok(())
    }
}
