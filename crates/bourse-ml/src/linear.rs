//! Linear regression with an elastic-net penalty.
//!
//! Minimises
//!
//! ```text
//! 1/(2n) * |y - X b - c|^2 + reg * (alpha * |b|_1 + (1 - alpha) / 2 * |b|^2)
//! ```
//!
//! with the penalty on coefficients of standardized features. A pure L2
//! penalty is solved in closed form via Cholesky; any L1 share switches to
//! cyclic coordinate descent.

use bourse_traits::{BourseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::linalg::{Scaler, cholesky_solve, soft_threshold};

/// Diagonal jitter for the unpenalized normal equations.
const RIDGE_JITTER: f64 = 1e-10;

/// Linear regression hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Overall penalty strength.
    pub reg_param: f64,
    /// L1 share of the penalty, in `[0, 1]`.
    pub elastic_net_param: f64,
    /// Maximum coordinate-descent sweeps.
    pub max_iter: usize,
    /// Largest coefficient change below which coordinate descent stops.
    pub tol: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            reg_param: 0.0,
            elastic_net_param: 0.0,
            max_iter: 100,
            tol: 1e-6,
        }
    }
}

impl LinearRegression {
    /// Fits `y` on `x`.
    ///
    /// # Errors
    ///
    /// Returns [`BourseError::Fit`] for an empty training set, mismatched
    /// lengths, invalid hyper-parameters, or a singular system.
    pub fn fit(&self, x: &Array2<f64>, y: &[f64]) -> Result<LinearModel> {
        if self.reg_param.is_nan() || self.reg_param < 0.0 {
            return Err(BourseError::Fit(format!("reg_param must be >= 0, got {}", self.reg_param)));
        }
        if !(0.0..=1.0).contains(&self.elastic_net_param) {
            return Err(BourseError::Fit(format!(
                "elastic_net_param must be in [0, 1], got {}",
                self.elastic_net_param
            )));
        }
        let (n, d) = x.dim();
        if n == 0 {
            return Err(BourseError::Fit("empty training set".to_string()));
        }
        if y.len() != n {
            return Err(BourseError::Fit(format!("{} labels for {} rows", y.len(), n)));
        }

        let scaler = Scaler::fit(x);
        let xs = scaler.apply(x);
        let y = Array1::from(y.to_vec());
        let y_mean = y.mean().unwrap_or(0.0);
        let yc = &y - y_mean;

        let scaled = if self.elastic_net_param == 0.0 {
            self.solve_ridge(&xs, &yc, &scaler)?
        } else {
            self.coordinate_descent(&xs, &yc, &scaler)
        };

        let (coefficients, shift) = scaler.unscale(scaled.view());
        let intercept = y_mean + shift;
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(BourseError::Fit("non-finite coefficients".to_string()));
        }
        debug!(
            "Linear regression (reg {}, alpha {}) fitted {} coefficients",
            self.reg_param, self.elastic_net_param, d
        );

        Ok(LinearModel {
            coefficients,
            intercept,
        })
    }

    fn solve_ridge(&self, xs: &Array2<f64>, yc: &Array1<f64>, scaler: &Scaler) -> Result<Array1<f64>> {
        let n = xs.nrows() as f64;
        let d = xs.ncols();
        let mut gram = xs.t().dot(xs) / n;
        let rhs = xs.t().dot(yc) / n;
        for j in 0..d {
            // Inactive columns are all zero; pin their coefficient at zero.
            gram[[j, j]] += if scaler.is_active(j) {
                self.reg_param.max(RIDGE_JITTER)
            } else {
                1.0
            };
        }
        cholesky_solve(&gram, &rhs)
    }

    /// Used whenever `elastic_net_param > 0`; the run configuration reaches it
    /// through a non-zero `regressor.elastic_net` value.
    fn coordinate_descent(&self, xs: &Array2<f64>, yc: &Array1<f64>, scaler: &Scaler) -> Array1<f64> {
        let n = xs.nrows() as f64;
        let d = xs.ncols();
        let l1 = self.reg_param * self.elastic_net_param;
        let l2 = self.reg_param * (1.0 - self.elastic_net_param);

        // Standardized columns have unit mean square.
        let mut beta = Array1::<f64>::zeros(d);
        let mut residual = yc.clone();
        let mut sweeps = 0;

        for _ in 0..self.max_iter {
            sweeps += 1;
            let mut max_change = 0.0_f64;
            for j in (0..d).filter(|&j| scaler.is_active(j)) {
                let column = xs.column(j);
                let old = beta[j];
                let rho = column.dot(&residual) / n + old;
                let new = soft_threshold(rho, l1) / (1.0 + l2);
                if new != old {
                    residual.scaled_add(old - new, &column);
                    beta[j] = new;
                    max_change = max_change.max((new - old).abs());
                }
            }
            if max_change < self.tol {
                break;
            }
        }
        debug!("Coordinate descent stopped after {} sweeps", sweeps);
        beta
    }
}

/// A fitted linear model on raw feature scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearModel {
    /// One coefficient per feature.
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// The intercept.
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Predicted value per row.
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coefficients) + self.intercept
    }
}
