//! Evaluation metrics.

use bourse_traits::{BourseError, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::Predictions;

/// Fraction of rows where the predicted class equals the actual class.
///
/// NaN for empty input.
pub fn accuracy(predicted: &[f64], actual: &[f64]) -> f64 {
    if predicted.is_empty() {
        return f64::NAN;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / predicted.len() as f64
}

/// Regression error summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean squared error.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Coefficient of determination. NaN when the actual values are constant.
    pub r2: f64,
    /// Rows evaluated.
    pub count: usize,
}

impl RegressionMetrics {
    /// Computes every metric. All are NaN for empty input.
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Self {
        let count = predicted.len().min(actual.len());
        if count == 0 {
            return Self {
                mse: f64::NAN,
                rmse: f64::NAN,
                mae: f64::NAN,
                r2: f64::NAN,
                count,
            };
        }
        let n = count as f64;
        let mean = actual.iter().take(count).sum::<f64>() / n;

        let mut ss_res = 0.0;
        let mut abs = 0.0;
        let mut ss_tot = 0.0;
        for (&p, &a) in predicted.iter().zip(actual) {
            ss_res += (a - p).powi(2);
            abs += (a - p).abs();
            ss_tot += (a - mean).powi(2);
        }

        let mse = ss_res / n;
        let r2 = if ss_tot == 0.0 {
            f64::NAN
        } else {
            1.0 - ss_res / ss_tot
        };
        Self {
            mse,
            rmse: mse.sqrt(),
            mae: abs / n,
            r2,
            count,
        }
    }
}

/// Metric used to score predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Classification accuracy.
    Accuracy,
    /// Root mean squared error.
    #[default]
    Rmse,
    /// Mean squared error.
    Mse,
    /// Mean absolute error.
    Mae,
    /// Coefficient of determination.
    R2,
}

impl Metric {
    /// Display name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Rmse => "rmse",
            Self::Mse => "mse",
            Self::Mae => "mae",
            Self::R2 => "r2",
        }
    }

    /// Whether a larger value means a better model.
    pub const fn larger_is_better(&self) -> bool {
        matches!(self, Self::Accuracy | Self::R2)
    }

    /// Scores predicted against actual values.
    pub fn score(&self, predicted: &[f64], actual: &[f64]) -> f64 {
        match self {
            Self::Accuracy => accuracy(predicted, actual),
            Self::Rmse => RegressionMetrics::compute(predicted, actual).rmse,
            Self::Mse => RegressionMetrics::compute(predicted, actual).mse,
            Self::Mae => RegressionMetrics::compute(predicted, actual).mae,
            Self::R2 => RegressionMetrics::compute(predicted, actual).r2,
        }
    }

    /// Scores a prediction set against its label column.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::InvalidData`] if the predictions carry no label.
    pub fn evaluate(&self, predictions: &Predictions) -> Result<f64> {
        let label = predictions.label().ok_or_else(|| {
            BourseError::InvalidData(format!("cannot compute {} without a label", self.name()))
        })?;
        Ok(self.score(predictions.prediction(), label))
    }

    /// `true` if `candidate` beats `incumbent`. NaN never wins.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        if incumbent.is_nan() {
            return true;
        }
        if self.larger_is_better() {
            candidate > incumbent
        } else {
            candidate < incumbent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_accuracy() {
        assert_abs_diff_eq!(accuracy(&[0.0, 1.0, 1.0, 2.0], &[0.0, 1.0, 2.0, 2.0]), 0.75);
        assert!(accuracy(&[], &[]).is_nan());
    }

    #[test]
    fn test_regression_metrics() {
        let m = RegressionMetrics::compute(&[2.5, 0.0, 2.0, 8.0], &[3.0, -0.5, 2.0, 7.0]);
        assert_abs_diff_eq!(m.mse, 0.375);
        assert_abs_diff_eq!(m.rmse, 0.375f64.sqrt());
        assert_abs_diff_eq!(m.mae, 0.5);
        assert_abs_diff_eq!(m.r2, 0.948_608_137_044_968_0, epsilon = 1e-12);
        assert_eq!(m.count, 4);
    }

    #[test]
    fn test_r2_undefined_for_constant_actuals() {
        let m = RegressionMetrics::compute(&[1.0, 2.0], &[1.0, 1.0]);
        assert!(m.r2.is_nan());
        assert_abs_diff_eq!(m.mae, 0.5);
    }

    #[test]
    fn test_metric_direction() {
        assert!(Metric::Accuracy.is_better(0.8, 0.7));
        assert!(Metric::Rmse.is_better(0.7, 0.8));
        assert!(!Metric::Rmse.is_better(0.8, 0.8));
        assert!(!Metric::Rmse.is_better(f64::NAN, 0.8));
        assert!(Metric::R2.is_better(-1.0, f64::NAN));
        assert_eq!(Metric::default(), Metric::Rmse);
    }
}
