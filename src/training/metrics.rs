use serde::{Deserialize, Serialize};
use std::fmt;

/// Regression quality on a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl Metrics {
    /// Compares predictions against the true values.
    ///
    /// `r2` follows the usual convention for a constant `y_true`: `1.0` for a
    /// perfect prediction, `0.0` otherwise. Empty input gives `NaN` everywhere.
    ///
    /// ```
    /// use aqi_forecast::Metrics;
    ///
    /// let m = Metrics::evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
    /// assert!((m.mae - 1.0 / 3.0).abs() < 1e-12);
    /// assert!((m.r2 - 0.5).abs() < 1e-12);
    /// ```
    pub fn evaluate(y_true: &[f64], y_pred: &[f64]) -> Self {
        let n = y_true.len().min(y_pred.len());
        if n == 0 {
            return Self {
                rmse: f64::NAN,
                mae: f64::NAN,
                r2: f64::NAN,
            };
        }
        let (y_true, y_pred) = (&y_true[..n], &y_pred[..n]);
        let n = n as f64;

        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t - p).powi(2))
            .sum();
        let abs: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };

        Self {
            rmse: (ss_res / n).sqrt(),
            mae: abs / n,
            r2,
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSE={:.2}, MAE={:.2}, R²={:.3}",
            self.rmse, self.mae, self.r2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let m = Metrics::evaluate(&[3.0, 5.0], &[3.0, 5.0]);
        assert_eq!(m, Metrics { rmse: 0.0, mae: 0.0, r2: 1.0 });
    }

    #[test]
    fn test_known_errors() {
        let m = Metrics::evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        assert!((m.rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((m.mae - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.r2 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_truth() {
        assert_eq!(Metrics::evaluate(&[2.0, 2.0], &[2.0, 2.0]).r2, 1.0);
        assert_eq!(Metrics::evaluate(&[2.0, 2.0], &[1.0, 2.0]).r2, 0.0);
        assert!(Metrics::evaluate(&[], &[]).rmse.is_nan());
    }
}
