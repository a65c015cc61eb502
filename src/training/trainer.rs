use crate::training::dataset::{
    train_test_split, FeatureMatrix, TrainingSet, SPLIT_SEED, TEST_FRACTION,
};
use crate::training::error::TrainingError;
use crate::training::forest::{ForestParams, RandomForestRegressor};
use crate::training::metrics::Metrics;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::horizon::Horizon;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// A fitted model for one horizon together with what is needed to use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// `model_day{N}`.
    pub name: String,
    pub horizon: Horizon,
    pub model: RandomForestRegressor,
    /// Input columns in the order the model expects them.
    pub feature_columns: Vec<String>,
    /// Scores on the held-out split.
    pub metrics: Metrics,
    pub trained_at: DateTime<Utc>,
}

/// The descriptive part of a [`ModelArtifact`], stored next to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    /// Horizon in days.
    pub horizon: u32,
    pub metrics: Metrics,
    pub feature_columns: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: self.name.clone(),
            horizon: self.horizon.days(),
            metrics: self.metrics,
            feature_columns: self.feature_columns.clone(),
            trained_at: self.trained_at,
        }
    }

    /// Predicts one AQI per row of `frame`.
    ///
    /// Columns are looked up by the names used at training time; a column the
    /// frame lacks, or a null cell, is read as `0.0`.
    pub fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<f64>, TrainingError> {
        let matrix = FeatureMatrix::from_frame(frame, &self.feature_columns)?;
        self.model.predict(&matrix.rows)
    }

    /// Feature names paired with their importance, most important first.
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(self.model.feature_importances().iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Trains and evaluates the model for one horizon.
///
/// Uses every numeric non-time, non-target column as input, drops rows with a
/// null target, holds out 20% of the rows (seed 42) and scores the fitted
/// forest on them.
///
/// # Errors
///
/// * [`TrainingError::MissingTarget`] / [`TrainingError::EmptyTrainingSet`] when
///   the horizon has nothing to learn from.
/// * [`TrainingError::InsufficientSamples`] with fewer than two usable rows.
pub fn train_horizon(
    frame: &FeatureFrame,
    horizon: Horizon,
    params: &ForestParams,
) -> Result<ModelArtifact, TrainingError> {
    let set = TrainingSet::for_horizon(frame, horizon)?;
    let (train, test) = train_test_split(&set, TEST_FRACTION, SPLIT_SEED)?;

    let mut model = RandomForestRegressor::new(*params);
    model.fit(&train.features.rows, &train.targets)?;
    let predictions = model.predict(&test.features.rows)?;
    let metrics = Metrics::evaluate(&test.targets, &predictions);
    info!("{} -> {}", horizon, metrics);

    Ok(ModelArtifact {
        name: horizon.model_name(),
        horizon,
        model,
        feature_columns: set.features.columns,
        metrics,
        trained_at: Utc::now(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{aggregate_pollutants, build_features};
    use chrono::{Duration, NaiveDate};
    use polars::prelude::*;

    /// Hourly feature table with a daily PM2.5 cycle.
    pub(crate) fn cyclic_features(
        hours: usize,
    ) -> Result<FeatureFrame, Box<dyn std::error::Error>> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let times: Vec<String> = (0..hours)
            .map(|h| (start + Duration::hours(h as i64)).to_string())
            .collect();
        let pm25: Vec<f64> = (0..hours)
            .map(|h| 30.0 + 20.0 * ((h % 24) as f64 / 24.0 * std::f64::consts::TAU).sin())
            .collect();
        let raw = DataFrame::new(vec![
            Series::new("time".into(), times).into(),
            Series::new("pm2_5".into(), pm25).into(),
        ])?;
        Ok(build_features(&aggregate_pollutants(raw)?, None)?)
    }

    #[test]
    fn test_train_horizon() -> Result<(), Box<dyn std::error::Error>> {
        let features = cyclic_features(96)?;
        let params = ForestParams::builder().n_estimators(10).build();
        let artifact = train_horizon(&features, Horizon::Day1, &params)?;

        assert_eq!(artifact.name, "model_day1");
        assert!(artifact.feature_columns.contains(&"aqi_pm25".to_string()));
        assert!(!artifact.feature_columns.iter().any(|c| c.starts_with("target_")));
        assert!(artifact.metrics.rmse.is_finite());
        assert!(artifact.metrics.mae >= 0.0);

        let predictions = artifact.predict_frame(&features)?;
        assert_eq!(predictions.len(), features.height());
        assert!(predictions.iter().all(|p| (0.0..=500.0).contains(p)));

        let ranked = artifact.ranked_importances();
        assert_eq!(ranked.len(), artifact.feature_columns.len());
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));

        let metadata = artifact.metadata();
        assert_eq!(metadata.horizon, 1);
        assert_eq!(metadata.metrics, artifact.metrics);
        Ok(())
    }

    #[test]
    fn test_horizon_without_targets() -> Result<(), Box<dyn std::error::Error>> {
        let features = cyclic_features(30)?;
        let err = train_horizon(&features, Horizon::Day3, &ForestParams::default()).unwrap_err();
        assert!(matches!(err, TrainingError::EmptyTrainingSet { .. }));
        Ok(())
    }
}
