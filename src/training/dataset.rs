//! Turning a feature table into model inputs.

use crate::training::error::TrainingError;
use crate::types::frames::feature_frame::FeatureFrame;
use crate::types::horizon::Horizon;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Fraction of rows held out for evaluation.
pub const TEST_FRACTION: f64 = 0.2;
/// Seed for the train/test shuffle.
pub const SPLIT_SEED: u64 = 42;

/// Row-major numeric inputs with their column names.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Reads `columns` from `frame`, one row per frame row.
    ///
    /// Missing columns and null or NaN cells become `0.0`.
    pub fn from_frame(frame: &FeatureFrame, columns: &[String]) -> Result<Self, TrainingError> {
        let values = columns
            .iter()
            .map(|name| frame.values_or_null(name))
            .collect::<Result<Vec<_>, _>>()?;
        let rows = (0..frame.height())
            .map(|i| {
                values
                    .iter()
                    .map(|column| column[i].filter(|v| !v.is_nan()).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Ok(Self {
            columns: columns.to_vec(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Inputs and targets for one horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    /// Builds the training set for `horizon`: every numeric non-time,
    /// non-target column as input, rows with a null target dropped.
    ///
    /// # Errors
    ///
    /// * [`TrainingError::MissingTarget`] if the frame has no target column.
    /// * [`TrainingError::EmptyTrainingSet`] if every target is null.
    pub fn for_horizon(frame: &FeatureFrame, horizon: Horizon) -> Result<Self, TrainingError> {
        let target = horizon.target_column();
        if frame.frame.column(target).is_err() {
            return Err(TrainingError::MissingTarget(target.to_string()));
        }

        let columns = frame.feature_columns();
        let all = FeatureMatrix::from_frame(frame, &columns)?;
        let (rows, targets): (Vec<Vec<f64>>, Vec<f64>) = all
            .rows
            .into_iter()
            .zip(frame.values_or_null(target)?)
            .filter_map(|(row, y)| Some((row, y.filter(|y| !y.is_nan())?)))
            .unzip();

        if targets.is_empty() {
            return Err(TrainingError::EmptyTrainingSet {
                target: target.to_string(),
            });
        }
        Ok(Self {
            features: FeatureMatrix { columns, rows },
            targets,
        })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            features: FeatureMatrix {
                columns: self.features.columns.clone(),
                rows: indices.iter().map(|&i| self.features.rows[i].clone()).collect(),
            },
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }
}

/// Shuffles with `seed` and holds out `ceil(test_fraction * n)` rows.
///
/// Returns `(train, test)`; both are non-empty.
///
/// # Errors
///
/// [`TrainingError::InsufficientSamples`] with fewer than two rows.
pub fn train_test_split(
    set: &TrainingSet,
    test_fraction: f64,
    seed: u64,
) -> Result<(TrainingSet, TrainingSet), TrainingError> {
    let n = set.len();
    if n < 2 {
        return Err(TrainingError::InsufficientSamples { needed: 2, found: n });
    }
    let n_test = ((test_fraction * n as f64).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test, train) = indices.split_at(n_test);
    Ok((set.subset(train), set.subset(test)))
}
