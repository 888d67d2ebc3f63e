//! Standardization of features against the design matrix
//!
//! Each feature is regressed on the design by ordinary least squares. The
//! batch coefficients are averaged (weighted by batch size) into a grand mean,
//! covariate effects are kept in the baseline, and the residual mean square is
//! the pooled variance. Standardized values are
//! `(y - grand_mean - covariate_effects) / sqrt(pooled_variance)`.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::data::{BatchLayout, ExpressionMatrix};
use crate::design::DesignMatrix;
use crate::error::{CombatError, Result};
use crate::linalg::{ols_coefficients, Cholesky};

/// Output of the standardization step
#[derive(Debug, Clone)]
pub struct Standardized {
    /// Standardized values (features x samples), NaN where the input is missing
    pub data: Array2<f64>,
    /// OLS coefficients (design columns x features)
    pub coefficients: Array2<f64>,
    /// Batch-size weighted average of batch coefficients, per feature
    pub grand_mean: Array1<f64>,
    /// Mean squared residual per feature
    pub var_pooled: Array1<f64>,
    /// Grand mean plus covariate effects (features x samples)
    pub stand_mean: Array2<f64>,
}

impl Standardized {
    /// Map standardized-scale values back to the data scale
    pub fn restore(&self, adjusted: &Array2<f64>) -> Array2<f64> {
        let scale = self.var_pooled.mapv(f64::sqrt).insert_axis(Axis(1));
        adjusted * &scale + &self.stand_mean
    }
}

/// Per-feature least squares fit: coefficients and mean squared residual
fn fit_feature(
    y: ArrayView1<'_, f64>,
    design: &DesignMatrix,
    projection: &Array2<f64>,
    feature_id: &str,
) -> Result<(Array1<f64>, f64)> {
    let x = design.matrix();
    let observed: Vec<usize> = (0..y.len()).filter(|&i| !y[i].is_nan()).collect();

    let beta = if observed.len() == y.len() {
        projection.dot(&y)
    } else {
        if observed.is_empty() {
            return Err(CombatError::DegenerateVariance {
                reason: format!("feature '{}' has no non-missing values", feature_id),
            });
        }
        let x_obs = x.select(Axis(0), &observed);
        let y_obs = y.select(Axis(0), &observed);
        let chol = Cholesky::new(x_obs.t().dot(&x_obs).view()).ok_or_else(|| {
            CombatError::SingularDesignMatrix {
                reason: format!(
                    "design restricted to the {} non-missing samples of feature '{}' is not invertible",
                    observed.len(),
                    feature_id
                ),
            }
        })?;
        ols_coefficients(&chol, x_obs.view(), y_obs.view())
    };

    let fitted = x.dot(&beta);
    let sse: f64 = observed
        .iter()
        .map(|&i| {
            let r = y[i] - fitted[i];
            r * r
        })
        .sum();

    let n_obs = observed.len() as f64;
    let var = sse / n_obs;
    // residual variance at the rounding level of the values means no variance at all
    let mean_sq = observed.iter().map(|&i| y[i] * y[i]).sum::<f64>() / n_obs;
    if !(var.is_finite() && var > n_obs * f64::EPSILON * mean_sq) {
        return Err(CombatError::DegenerateVariance {
            reason: format!(
                "pooled variance of feature '{}' is {:e} (constant or perfectly fitted feature)",
                feature_id, var
            ),
        });
    }

    Ok((beta, var))
}

/// Fit every feature against the design and standardize the data
pub fn standardize(data: &ExpressionMatrix, design: &DesignMatrix, layout: &BatchLayout) -> Result<Standardized> {
    let n_features = data.n_features();
    let n_samples = data.n_samples();
    let n_batch = layout.n_batch();

    if design.n_samples() != n_samples || layout.n_samples() != n_samples {
        return Err(CombatError::DimensionMismatch {
            expected: format!("{} samples", n_samples),
            got: format!("design {} / batches {}", design.n_samples(), layout.n_samples()),
        });
    }

    log::info!("Standardizing data across features");

    let x = design.matrix();
    let chol = Cholesky::new(x.t().dot(&x).view()).ok_or_else(|| CombatError::SingularDesignMatrix {
        reason: "XᵀX of the design matrix is not invertible".to_string(),
    })?;
    // (XᵀX)⁻¹ Xᵀ, shared by every complete feature
    let projection = chol.inverse().dot(&x.t());

    let values = data.values();
    let fits: Vec<(Array1<f64>, f64)> = (0..n_features)
        .into_par_iter()
        .map(|f| fit_feature(values.row(f), design, &projection, &data.feature_ids()[f]))
        .collect::<Result<Vec<_>>>()?;

    let mut coefficients = Array2::<f64>::zeros((design.n_columns(), n_features));
    let mut var_pooled = Array1::<f64>::zeros(n_features);
    for (f, (beta, var)) in fits.into_iter().enumerate() {
        coefficients.column_mut(f).assign(&beta);
        var_pooled[f] = var;
    }

    let weights: Array1<f64> = layout
        .sizes()
        .iter()
        .map(|&n| n as f64 / n_samples as f64)
        .collect();
    let grand_mean = weights.dot(&coefficients.slice(s![..n_batch, ..]));

    // covariate effects only; batch columns are left out of the baseline
    let covariate_effects = design
        .covariate_block()
        .dot(&coefficients.slice(s![n_batch.., ..]))
        .reversed_axes();
    let stand_mean = covariate_effects + &grand_mean.view().insert_axis(Axis(1));

    let sd = var_pooled.mapv(f64::sqrt).insert_axis(Axis(1));
    let standardized = (&values - &stand_mean) / &sd;

    Ok(Standardized {
        data: standardized,
        coefficients,
        grand_mean,
        var_pooled,
        stand_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CovariateTable;
    use crate::design::{build_design_matrix, prepare_covariates};
    use ndarray::array;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn matrix(values: Array2<f64>) -> ExpressionMatrix {
        let features = (0..values.nrows()).map(|i| format!("f{}", i)).collect();
        let samples = (0..values.ncols()).map(|i| format!("s{}", i)).collect();
        ExpressionMatrix::new(values, features, samples).unwrap()
    }

    fn batch_design(batches: &[&str]) -> (BatchLayout, DesignMatrix) {
        let layout = BatchLayout::from_labels(&labels(batches)).unwrap();
        let prepared = prepare_covariates(None, batches.len(), &[]).unwrap();
        let design = build_design_matrix(&prepared, &layout).unwrap();
        (layout, design)
    }

    #[test]
    fn test_batch_only_standardization() {
        let (layout, design) = batch_design(&["a", "a", "a", "b", "b", "b"]);
        let data = matrix(array![[6.0, 7.0, 5.5, 1.0, 2.0, 0.5]]);
        let st = standardize(&data, &design, &layout).unwrap();

        // batch means 6.1667 and 1.1667, equal weights
        assert!((st.coefficients[[0, 0]] - 37.0 / 6.0).abs() < 1e-12);
        assert!((st.coefficients[[1, 0]] - 7.0 / 6.0).abs() < 1e-12);
        assert!((st.grand_mean[0] - 22.0 / 6.0).abs() < 1e-12);
        // residuals per batch: -1/6, 5/6, -2/3 in both batches
        assert!((st.var_pooled[0] - 7.0 / 18.0).abs() < 1e-12);
        for s in 0..6 {
            assert!((st.stand_mean[[0, s]] - 22.0 / 6.0).abs() < 1e-12);
        }
        let pop_var = st.data.row(0).mapv(|v| v * v).mean().unwrap();
        // mean of standardized values is zero, so this is the variance of the
        // batch shift plus the unit residual variance
        assert!(pop_var > 1.0);
    }

    #[test]
    fn test_no_effect_feature_has_unit_variance() {
        let (layout, design) = batch_design(&["a", "a", "a", "b", "b", "b"]);
        let data = matrix(array![[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]]);
        let st = standardize(&data, &design, &layout).unwrap();
        let row = st.data.row(0);
        let mean = row.mean().unwrap();
        let var = row.mapv(|v| (v - mean) * (v - mean)).mean().unwrap();
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_covariate_effect_kept_in_baseline() {
        let batches = ["a", "a", "a", "b", "b", "b"];
        let layout = BatchLayout::from_labels(&labels(&batches)).unwrap();
        let mut table = CovariateTable::new(6);
        let dose = vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        table.add_numeric("dose", dose.clone()).unwrap();
        let prepared = prepare_covariates(Some(&table), 6, &["dose".into()]).unwrap();
        let design = build_design_matrix(&prepared, &layout).unwrap();

        // y = 3 * dose + batch shift + noise
        let noise = [0.1, -0.2, 0.1, -0.1, 0.2, -0.1];
        let y: Vec<f64> = (0..6)
            .map(|i| 3.0 * dose[i] + if i < 3 { 10.0 } else { 4.0 } + noise[i])
            .collect();
        let data = matrix(Array2::from_shape_vec((1, 6), y).unwrap());
        let st = standardize(&data, &design, &layout).unwrap();

        assert!((st.coefficients[[2, 0]] - 3.0).abs() < 0.2);
        // baseline moves with dose but not with batch
        assert!((st.stand_mean[[0, 2]] - st.stand_mean[[0, 0]] - 2.0 * st.coefficients[[2, 0]]).abs() < 1e-10);
        assert!((st.stand_mean[[0, 0]] - st.stand_mean[[0, 3]]).abs() < 1e-10);
    }

    #[test]
    fn test_constant_feature_is_degenerate() {
        let (layout, design) = batch_design(&["a", "a", "b", "b"]);
        let data = matrix(array![[1.0, 2.0, 3.0, 5.0], [4.0, 4.0, 4.0, 4.0]]);
        let result = standardize(&data, &design, &layout);
        assert!(matches!(result, Err(CombatError::DegenerateVariance { .. })));
    }

    #[test]
    fn test_perfectly_fitted_feature_is_degenerate() {
        let batches = ["a", "a", "a", "b", "b", "b"];
        let layout = BatchLayout::from_labels(&labels(&batches)).unwrap();
        let mut table = CovariateTable::new(6);
        table.add_numeric("dose", vec![0.1, 0.7, 1.3, 0.2, 0.9, 1.6]).unwrap();
        let prepared = prepare_covariates(Some(&table), 6, &["dose".into()]).unwrap();
        let design = build_design_matrix(&prepared, &layout).unwrap();

        // exact linear function of batch and dose, residuals are rounding noise
        let y: Vec<f64> = [0.1, 0.7, 1.3, 0.2, 0.9, 1.6]
            .iter()
            .enumerate()
            .map(|(i, d)| 2.7 * d + if i < 3 { 5.3 } else { 1.9 })
            .collect();
        let data = matrix(Array2::from_shape_vec((1, 6), y).unwrap());
        let result = standardize(&data, &design, &layout);
        assert!(matches!(result, Err(CombatError::DegenerateVariance { .. })));
    }

    #[test]
    fn test_large_scale_covariate_accepted() {
        let batches = ["a", "a", "a", "b", "b", "b"];
        let layout = BatchLayout::from_labels(&labels(&batches)).unwrap();
        let depth = vec![1.02e9, 1.31e9, 0.87e9, 1.13e9, 1.24e9, 0.95e9];
        let mut table = CovariateTable::new(6);
        table.add_numeric("depth", depth.clone()).unwrap();
        let prepared = prepare_covariates(Some(&table), 6, &["depth".into()]).unwrap();
        let design = build_design_matrix(&prepared, &layout).unwrap();

        let noise = [0.3, -0.1, -0.2, 0.15, -0.25, 0.1];
        let y: Vec<f64> = (0..6)
            .map(|i| 2e-9 * depth[i] + if i < 3 { 6.0 } else { 3.0 } + noise[i])
            .collect();
        let data = matrix(Array2::from_shape_vec((1, 6), y).unwrap());
        let st = standardize(&data, &design, &layout).unwrap();

        assert!(st.var_pooled[0] > 0.0);
        let restored = st.restore(&st.data);
        for (a, b) in restored.iter().zip(data.values().iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_values_fit_on_observed_samples() {
        let (layout, design) = batch_design(&["a", "a", "a", "b", "b", "b"]);
        let data = matrix(array![[6.0, f64::NAN, 5.0, 1.0, 2.0, 0.0]]);
        let st = standardize(&data, &design, &layout).unwrap();
        assert!((st.coefficients[[0, 0]] - 5.5).abs() < 1e-12);
        assert!((st.coefficients[[1, 0]] - 1.0).abs() < 1e-12);
        // residuals: 0.5, -0.5, 0, 1, -1 over 5 observed samples
        assert!((st.var_pooled[0] - 2.5 / 5.0).abs() < 1e-12);
        assert!(st.data[[0, 1]].is_nan());
        assert!(st.data[[0, 0]].is_finite());
    }

    #[test]
    fn test_missing_whole_batch_is_singular() {
        let (layout, design) = batch_design(&["a", "a", "b", "b"]);
        let data = matrix(array![[1.0, 2.0, f64::NAN, f64::NAN]]);
        let result = standardize(&data, &design, &layout);
        assert!(matches!(result, Err(CombatError::SingularDesignMatrix { .. })));
    }

    #[test]
    fn test_restore_inverts_standardization() {
        let (layout, design) = batch_design(&["a", "a", "b", "b", "b"]);
        let data = matrix(array![[1.0, 2.5, 3.0, 5.0, 4.2], [10.0, 9.0, 12.0, 11.5, 13.0]]);
        let st = standardize(&data, &design, &layout).unwrap();
        let restored = st.restore(&st.data);
        for (a, b) in restored.iter().zip(data.values().iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}
