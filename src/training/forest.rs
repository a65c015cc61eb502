//! Bagged CART regression trees.

use crate::training::error::TrainingError;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Hyperparameters of a [`RandomForestRegressor`].
///
/// ```
/// use aqi_forecast::ForestParams;
///
/// let params = ForestParams::builder().n_estimators(10).max_depth(6).build();
/// assert_eq!(params.seed, 42);
/// assert_eq!(ForestParams::default().n_estimators, 120);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct ForestParams {
    /// Number of trees.
    #[builder(default = 120)]
    pub n_estimators: usize,
    /// Maximum tree depth; unlimited when `None`.
    pub max_depth: Option<usize>,
    /// A node with fewer samples is not split.
    #[builder(default = 2)]
    pub min_samples_split: usize,
    /// Every leaf keeps at least this many samples.
    #[builder(default = 1)]
    pub min_samples_leaf: usize,
    /// Features considered per split; all of them when `None`.
    pub max_features: Option<usize>,
    /// Seed for bootstrap sampling and feature selection.
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    cost: f64,
}

struct TreeGrower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    params: &'a ForestParams,
    n_features: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeGrower<'_> {
    fn grow(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let n = indices.len();
        let (sum, sq) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let y = self.y[i];
            (s + y, q + y * y)
        });
        let sse = sq - sum * sum / n as f64;

        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: sum / n as f64,
        });

        let depth_ok = self.params.max_depth.map_or(true, |max| depth < max);
        let min_leaf = self.params.min_samples_leaf.max(1);
        if !depth_ok || n < self.params.min_samples_split.max(2) || n < 2 * min_leaf || sse <= 1e-12
        {
            return id;
        }

        let Some(best) = self.best_split(indices, sum, sq, min_leaf, rng) else {
            return id;
        };

        let mut mid = 0;
        for i in 0..n {
            if self.x[indices[i]][best.feature] <= best.threshold {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == n {
            return id;
        }

        self.importances[best.feature] += (sse - best.cost).max(0.0);
        let (left_indices, right_indices) = indices.split_at_mut(mid);
        let left = self.grow(left_indices, depth + 1, rng);
        let right = self.grow(right_indices, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        id
    }

    /// Lowest summed squared error over the candidate features.
    fn best_split(
        &self,
        indices: &[usize],
        total_sum: f64,
        total_sq: f64,
        min_leaf: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < self.n_features => {
                rand::seq::index::sample(rng, self.n_features, k.max(1)).into_vec()
            }
            _ => (0..self.n_features).collect(),
        };

        let mut best: Option<SplitCandidate> = None;
        let mut order = indices.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for i in 0..n - 1 {
                let y = self.y[order[i]];
                left_sum += y;
                left_sq += y * y;

                let (n_left, n_right) = (i + 1, n - i - 1);
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let (current, next) = (self.x[order[i]][feature], self.x[order[i + 1]][feature]);
                if next <= current {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let cost = (left_sq - left_sum * left_sum / n_left as f64)
                    + ((total_sq - left_sq) - right_sum * right_sum / n_right as f64);
                if best.as_ref().map_or(true, |b| cost < b.cost) {
                    let mut threshold = current / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = current;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        cost,
                    });
                }
            }
        }
        best
    }
}

/// Random forest of regression trees fitted on bootstrap samples.
///
/// Splits minimize the summed squared error of the two children. Predictions
/// average the trees.
///
/// ```
/// use aqi_forecast::{ForestParams, RandomForestRegressor};
///
/// # fn main() -> Result<(), aqi_forecast::TrainingError> {
/// let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
/// let y: Vec<f64> = (0..20).map(|i| if i < 10 { 0.0 } else { 10.0 }).collect();
///
/// let mut forest = RandomForestRegressor::new(ForestParams::builder().n_estimators(20).build());
/// forest.fit(&x, &y)?;
/// assert_eq!(forest.predict(&[vec![2.0], vec![15.0]])?, vec![0.0, 10.0]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: 0,
            trees: Vec::new(),
            importances: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fits the forest, replacing any previous fit.
    ///
    /// # Errors
    ///
    /// * [`TrainingError::InsufficientSamples`] for an empty training set.
    /// * [`TrainingError::TargetLengthMismatch`] if `x` and `y` differ in length.
    /// * [`TrainingError::FeatureMismatch`] if rows differ in width.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), TrainingError> {
        if x.is_empty() {
            return Err(TrainingError::InsufficientSamples {
                needed: 1,
                found: 0,
            });
        }
        if x.len() != y.len() {
            return Err(TrainingError::TargetLengthMismatch {
                rows: x.len(),
                targets: y.len(),
            });
        }
        let n_features = x[0].len();
        if let Some(row) = x.iter().find(|row| row.len() != n_features) {
            return Err(TrainingError::FeatureMismatch {
                expected: n_features,
                found: row.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n = x.len();
        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.params.n_estimators {
            let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut grower = TreeGrower {
                x,
                y,
                params: &self.params,
                n_features,
                nodes: Vec::new(),
                importances: vec![0.0; n_features],
            };
            grower.grow(&mut sample, 0, &mut rng);

            let total: f64 = grower.importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&grower.importances) {
                    *acc += v / total;
                }
            }
            trees.push(RegressionTree {
                nodes: grower.nodes,
            });
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            "Fitted {} trees on {} samples x {} features",
            trees.len(),
            n,
            n_features
        );
        self.n_features = n_features;
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    /// Mean prediction of all trees for every row.
    ///
    /// # Errors
    ///
    /// [`TrainingError::NotFitted`] before [`fit`](Self::fit), and
    /// [`TrainingError::FeatureMismatch`] if a row has the wrong width.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, TrainingError> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64, TrainingError> {
        if self.trees.is_empty() {
            return Err(TrainingError::NotFitted);
        }
        if row.len() != self.n_features {
            return Err(TrainingError::FeatureMismatch {
                expected: self.n_features,
                found: row.len(),
            });
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Impurity-based importance of every feature, summing to 1 (or all zero
    /// when no tree ever split).
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = (0..40).map(|i| vec![i as f64, 7.0]).collect();
        let y = (0..40).map(|i| if i < 20 { 0.0 } else { 10.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_fits_step_function() -> Result<(), TrainingError> {
        let (x, y) = step_data();
        let mut forest =
            RandomForestRegressor::new(ForestParams::builder().n_estimators(25).build());
        forest.fit(&x, &y)?;

        let predictions = forest.predict(&[vec![3.0, 7.0], vec![35.0, 7.0]])?;
        assert!(predictions[0].abs() < 1e-9);
        assert!((predictions[1] - 10.0).abs() < 1e-9);
        assert_eq!(forest.trees().len(), 25);
        Ok(())
    }

    #[test]
    fn test_importances_ignore_constant_feature() -> Result<(), TrainingError> {
        let (x, y) = step_data();
        let mut forest =
            RandomForestRegressor::new(ForestParams::builder().n_estimators(10).build());
        forest.fit(&x, &y)?;

        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 2);
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
        Ok(())
    }

    #[test]
    fn test_same_seed_same_model() -> Result<(), TrainingError> {
        let x: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i as f64 * 0.7).sin(), (i % 7) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 * r[0] + r[1]).collect();
        let params = ForestParams::builder()
            .n_estimators(15)
            .max_features(1)
            .build();

        let mut a = RandomForestRegressor::new(params);
        let mut b = RandomForestRegressor::new(params);
        a.fit(&x, &y)?;
        b.fit(&x, &y)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_max_depth_limits_tree() -> Result<(), TrainingError> {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let mut forest = RandomForestRegressor::new(
            ForestParams::builder().n_estimators(3).max_depth(1).build(),
        );
        forest.fit(&x, &y)?;
        assert!(forest.trees().iter().all(|t| t.node_count() <= 3));
        Ok(())
    }

    #[test]
    fn test_errors() {
        let mut forest = RandomForestRegressor::new(ForestParams::default());
        assert!(matches!(
            forest.predict_row(&[1.0]),
            Err(TrainingError::NotFitted)
        ));
        assert!(matches!(
            forest.fit(&[], &[]),
            Err(TrainingError::InsufficientSamples { .. })
        ));
        assert!(matches!(
            forest.fit(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]),
            Err(TrainingError::FeatureMismatch { .. })
        ));
        assert!(matches!(
            forest.fit(&[vec![1.0]], &[1.0, 2.0]),
            Err(TrainingError::TargetLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_predict_checks_width() -> Result<(), TrainingError> {
        let (x, y) = step_data();
        let mut forest =
            RandomForestRegressor::new(ForestParams::builder().n_estimators(2).build());
        forest.fit(&x, &y)?;
        assert!(matches!(
            forest.predict_row(&[1.0]),
            Err(TrainingError::FeatureMismatch { expected: 2, found: 1 })
        ));
        Ok(())
    }
}
