//! Multinomial logistic regression with an elastic-net penalty.
//!
//! Minimises
//!
//! ```text
//! -1/n * sum_i log p(y_i | x_i) + reg * (alpha * |W|_1 + (1 - alpha) / 2 * |W|_2^2)
//! ```
//!
//! over a softmax model with one weight row and one intercept per class. The
//! penalty applies to weights on standardized features and never to the
//! intercepts. Optimisation is proximal gradient descent with a fixed step
//! from the softmax curvature bound.

use bourse_traits::{BourseError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::linalg::{Scaler, soft_threshold};

/// Logistic regression hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Overall penalty strength.
    pub reg_param: f64,
    /// L1 share of the penalty, in `[0, 1]`.
    pub elastic_net_param: f64,
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Relative objective change below which fitting stops.
    pub tol: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            reg_param: 0.0,
            elastic_net_param: 0.0,
            max_iter: 100,
            tol: 1e-6,
        }
    }
}

fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row /= total;
    }
}

impl LogisticRegression {
    fn validate(&self) -> Result<()> {
        if self.reg_param.is_nan() || self.reg_param < 0.0 {
            return Err(BourseError::Fit(format!("reg_param must be >= 0, got {}", self.reg_param)));
        }
        if !(0.0..=1.0).contains(&self.elastic_net_param) {
            return Err(BourseError::Fit(format!(
                "elastic_net_param must be in [0, 1], got {}",
                self.elastic_net_param
            )));
        }
        Ok(())
    }

    /// Fits on `x` with class indices `y` in `0..n_classes`.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::Fit`] for an empty training set, out-of-range
    /// labels, invalid hyper-parameters, or a diverging objective.
    pub fn fit(&self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<LogisticModel> {
        self.validate()?;
        let (n, d) = x.dim();
        if n == 0 {
            return Err(BourseError::Fit("empty training set".to_string()));
        }
        if y.len() != n {
            return Err(BourseError::Fit(format!("{} labels for {} rows", y.len(), n)));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(BourseError::Fit(format!(
                "label index {bad} outside {n_classes} classes"
            )));
        }

        let scaler = Scaler::fit(x);
        let xs = scaler.apply(x);
        let mut targets = Array2::<f64>::zeros((n, n_classes));
        for (i, &c) in y.iter().enumerate() {
            targets[[i, c]] = 1.0;
        }

        let l1 = self.reg_param * self.elastic_net_param;
        let l2 = self.reg_param * (1.0 - self.elastic_net_param);
        let lipschitz = 0.5 * (scaler.active_count() as f64 + 1.0) + l2;
        let step = 1.0 / lipschitz;
        let n_f = n as f64;

        let mut weights = Array2::<f64>::zeros((n_classes, d));
        let mut intercepts = Array1::<f64>::zeros(n_classes);
        let mut previous = f64::INFINITY;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let mut probs = xs.dot(&weights.t()) + &intercepts;
            softmax_rows(&mut probs);

            let data_loss = -y
                .iter()
                .enumerate()
                .map(|(i, &c)| probs[[i, c]].max(1e-15).ln())
                .sum::<f64>()
                / n_f;
            let objective = data_loss
                + l1 * weights.mapv(f64::abs).sum()
                + 0.5 * l2 * weights.mapv(|w| w * w).sum();
            if !objective.is_finite() {
                return Err(BourseError::Fit(format!(
                    "objective diverged at iteration {iterations}"
                )));
            }
            if (previous - objective).abs() <= self.tol * objective.abs().max(1.0) {
                break;
            }
            previous = objective;

            let residual = probs - &targets;
            let grad_w = residual.t().dot(&xs) / n_f + &weights * l2;
            let grad_b = residual.sum_axis(Axis(0)) / n_f;

            weights = (&weights - &(grad_w * step)).mapv(|w| soft_threshold(w, step * l1));
            intercepts = &intercepts - &(grad_b * step);
        }
        debug!(
            "Logistic regression (reg {}, alpha {}) stopped after {} iterations",
            self.reg_param, self.elastic_net_param, iterations
        );

        let mut coefficients = Array2::<f64>::zeros((n_classes, d));
        let mut raw_intercepts = intercepts.clone();
        for k in 0..n_classes {
            let (row, shift) = scaler.unscale(weights.row(k));
            coefficients.row_mut(k).assign(&row);
            raw_intercepts[k] += shift;
        }

        Ok(LogisticModel {
            coefficients,
            intercepts: raw_intercepts,
            iterations,
        })
    }
}

/// A fitted multinomial logistic model on raw feature scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
    iterations: usize,
}

impl LogisticModel {
    /// Weights, one row per class.
    pub const fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Intercept per class.
    pub const fn intercepts(&self) -> &Array1<f64> {
        &self.intercepts
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.intercepts.len()
    }

    /// Iterations used during fitting.
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Class probabilities, one row per input row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scores = x.dot(&self.coefficients.t()) + &self.intercepts;
        softmax_rows(&mut scores);
        scores
    }

    /// Most probable class per row. Ties go to the lower index.
    pub fn predict(&self, x: &Array2<f64>) -> Vec<usize> {
        self.predict_proba(x)
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (k, &p)| if p > best.1 { (k, p) } else { best })
                    .0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 1.0],
            [0.2, 0.9],
            [0.1, 1.1],
            [3.0, 0.0],
            [3.2, 0.1],
            [2.9, -0.1],
            [6.0, 1.0],
            [6.1, 0.9],
            [5.9, 1.2],
        ];
        (x, vec![0, 0, 0, 1, 1, 1, 2, 2, 2])
    }

    #[test]
    fn test_fits_separable_classes() {
        let (x, y) = separable();
        let model = LogisticRegression {
            max_iter: 1000,
            tol: 1e-10,
            ..LogisticRegression::default()
        }
        .fit(&x, &y, 3)
        .unwrap();

        assert_eq!(model.predict(&x), y);
        let proba = model.predict_proba(&x);
        for row in proba.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_l1_penalty_zeroes_noise_feature() {
        let x = array![
            [-2.0, 0.3],
            [-1.0, -0.2],
            [-1.5, 0.1],
            [1.0, 0.2],
            [2.0, -0.3],
            [1.5, -0.1],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let model = LogisticRegression {
            reg_param: 0.3,
            elastic_net_param: 1.0,
            max_iter: 300,
            tol: 1e-9,
        }
        .fit(&x, &y, 2)
        .unwrap();

        assert_eq!(model.coefficients()[[0, 1]], 0.0);
        assert_eq!(model.coefficients()[[1, 1]], 0.0);
        assert_eq!(model.predict(&x), y);
    }

    #[test]
    fn test_constant_feature_gets_zero_weight() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = vec![0, 0, 1, 1];
        let model = LogisticRegression::default().fit(&x, &y, 2).unwrap();
        assert_eq!(model.coefficients()[[0, 0]], 0.0);
        assert_eq!(model.coefficients()[[1, 0]], 0.0);
    }

    #[test]
    fn test_single_class_training_set() {
        let x = array![[1.0], [2.0]];
        let model = LogisticRegression::default().fit(&x, &[0, 0], 1).unwrap();
        assert_eq!(model.predict(&x), vec![0, 0]);
    }

    #[test]
    fn test_rejects_bad_input() {
        let x = Array2::<f64>::zeros((0, 2));
        assert!(LogisticRegression::default().fit(&x, &[], 2).is_err());

        let x = array![[1.0], [2.0]];
        assert!(LogisticRegression::default().fit(&x, &[0, 3], 2).is_err());

        let bad = LogisticRegression {
            elastic_net_param: 1.5,
            ..LogisticRegression::default()
        };
        assert!(bad.fit(&x, &[0, 1], 2).is_err());
    }
}
