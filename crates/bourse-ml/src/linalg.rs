//! Dense helpers shared by the linear models.

use bourse_traits::stats::MIN_STD_THRESHOLD;
use bourse_traits::{BourseError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Column means and population standard deviations of a design matrix.
///
/// Columns whose deviation is below [`MIN_STD_THRESHOLD`] are inactive: they
/// are zeroed when scaling and get a zero coefficient.
#[derive(Debug, Clone)]
pub(crate) struct Scaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl Scaler {
    pub(crate) fn fit(x: &Array2<f64>) -> Self {
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(x.ncols()));
        let std = if x.nrows() == 0 {
            Array1::zeros(x.ncols())
        } else {
            x.std_axis(Axis(0), 0.0)
        };
        Self { mean, std }
    }

    pub(crate) fn is_active(&self, j: usize) -> bool {
        self.std[j] >= MIN_STD_THRESHOLD
    }

    pub(crate) fn active_count(&self) -> usize {
        (0..self.std.len()).filter(|&j| self.is_active(j)).count()
    }

    /// Centred and scaled copy of `x`.
    pub(crate) fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scaled = x - &self.mean;
        for (j, mut column) in scaled.columns_mut().into_iter().enumerate() {
            if self.is_active(j) {
                column /= self.std[j];
            } else {
                column.fill(0.0);
            }
        }
        scaled
    }

    /// Maps weights on the scaled columns back to the raw columns.
    ///
    /// Returns the raw coefficients and the intercept shift they imply.
    pub(crate) fn unscale(&self, weights: ArrayView1<'_, f64>) -> (Array1<f64>, f64) {
        let coefficients = Array1::from_iter(weights.iter().enumerate().map(|(j, &w)| {
            if self.is_active(j) {
                w / self.std[j]
            } else {
                0.0
            }
        }));
        let shift = -coefficients.dot(&self.mean);
        (coefficients, shift)
    }
}

pub(crate) fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Solves `a x = b` for a symmetric positive definite `a`.
pub(crate) fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(BourseError::Fit(
                        "normal equations are not positive definite".to_string(),
                    ));
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}
