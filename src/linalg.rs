//! Dense solves for small symmetric positive-definite systems

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Lower-triangular Cholesky factor of a symmetric positive-definite matrix
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor `a = L Lᵀ`.
    ///
    /// Returns `None` if a pivot is not clearly positive relative to its own
    /// diagonal entry, i.e. the matrix is singular or indefinite to working
    /// precision. Columns on very different scales are fine. No diagonal
    /// ridge is added.
    pub fn new(a: ArrayView2<'_, f64>) -> Option<Self> {
        let n = a.nrows();
        if n == 0 || a.ncols() != n {
            return None;
        }

        let mut l = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let mut sum = a[[i, j]];
                for k in 0..j {
                    sum -= l[[i, k]] * l[[j, k]];
                }
                if i == j {
                    if !(sum > n as f64 * f64::EPSILON * a[[i, i]].abs()) {
                        return None;
                    }
                    l[[i, j]] = sum.sqrt();
                } else {
                    l[[i, j]] = sum / l[[j, j]];
                }
            }
        }
        Some(Self { l })
    }

    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Solve `a x = b`
    pub fn solve(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let l = &self.l;

        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l[[i, j]] * y[j];
            }
            y[i] = sum / l[[i, i]];
        }

        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l[[j, i]] * x[j];
            }
            x[i] = sum / l[[i, i]];
        }
        x
    }

    /// Inverse of the factored matrix
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.dim();
        let mut result = Array2::<f64>::zeros((n, n));
        let mut e = Array1::<f64>::zeros(n);
        for i in 0..n {
            e.fill(0.0);
            e[i] = 1.0;
            result.column_mut(i).assign(&self.solve(e.view()));
        }
        result
    }
}

/// Ordinary least squares of `y` on the columns of `x` through a precomputed
/// factor of `xᵀx`
pub fn ols_coefficients(chol: &Cholesky, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Array1<f64> {
    chol.solve(x.t().dot(&y).view())
}
