//! Per-batch location/scale statistics and hyperparameters

use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;
use statrs::statistics::Statistics;

use super::prior::{InverseGammaPrior, NormalPrior};
use crate::data::BatchLayout;
use crate::error::{CombatError, Result};

/// Raw estimates and priors for one batch
#[derive(Debug, Clone)]
pub struct BatchStatistics {
    /// Batch label
    pub level: String,
    /// Per-feature mean of standardized values in the batch
    pub gamma_hat: Array1<f64>,
    /// Per-feature sample variance of standardized values in the batch
    pub delta_hat: Array1<f64>,
    /// Per-feature count of non-missing values in the batch
    pub n_observed: Array1<f64>,
    /// Prior on locations (`gamma_bar`, `t2`)
    pub location_prior: NormalPrior,
    /// Prior on scales (`a`, `b`)
    pub scale_prior: InverseGammaPrior,
}

/// Mean and sample variance of the non-missing values of one feature
fn observed_moments(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    let observed: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
    let n = observed.len() as f64;
    let mean = observed.iter().mean();
    let variance = observed.iter().variance();
    (n, mean, variance)
}

/// Statistics of one batch. `sdat` is features x (samples of this batch).
pub fn batch_statistics(sdat: ArrayView2<'_, f64>, level: &str, feature_ids: &[String]) -> Result<BatchStatistics> {
    let n_features = sdat.nrows();
    let mut gamma_hat = Array1::<f64>::zeros(n_features);
    let mut delta_hat = Array1::<f64>::zeros(n_features);
    let mut n_observed = Array1::<f64>::zeros(n_features);

    for (f, row) in sdat.rows().into_iter().enumerate() {
        let (n, mean, variance) = observed_moments(row.iter().copied());
        if n < 2.0 || !variance.is_finite() {
            return Err(CombatError::DegenerateVariance {
                reason: format!(
                    "feature '{}' has {} non-missing value(s) in batch '{}'; at least 2 are needed for a variance",
                    feature_ids[f], n, level
                ),
            });
        }
        // identical values leave only rounding noise in the variance
        if variance <= n * f64::EPSILON * mean * mean {
            return Err(CombatError::DegenerateVariance {
                reason: format!(
                    "feature '{}' is constant within batch '{}'; its batch variance is zero",
                    feature_ids[f], level
                ),
            });
        }
        gamma_hat[f] = mean;
        delta_hat[f] = variance;
        n_observed[f] = n;
    }

    let location_prior = NormalPrior {
        mean: gamma_hat.iter().mean(),
        variance: gamma_hat.iter().population_variance(),
    };

    let m = delta_hat.iter().mean();
    let s2 = delta_hat.iter().variance();
    let scale_prior = InverseGammaPrior::from_moments(m, s2).ok_or_else(|| CombatError::DegenerateVariance {
        reason: format!(
            "variance prior for batch '{}' is undefined (mean {}, variance {} across {} features)",
            level, m, s2, n_features
        ),
    })?;

    log::debug!(
        "batch '{}': gamma_bar={:.6} t2={:.6} a={:.6} b={:.6}",
        level,
        location_prior.mean,
        location_prior.variance,
        scale_prior.a(),
        scale_prior.b()
    );

    Ok(BatchStatistics {
        level: level.to_string(),
        gamma_hat,
        delta_hat,
        n_observed,
        location_prior,
        scale_prior,
    })
}

/// Statistics for every batch, in layout order
pub fn estimate_batch_statistics(
    standardized: ArrayView2<'_, f64>,
    layout: &BatchLayout,
    feature_ids: &[String],
) -> Result<Vec<BatchStatistics>> {
    log::info!("Fitting L/S model and finding priors");
    (0..layout.n_batch())
        .into_par_iter()
        .map(|b| {
            let sdat = standardized.select(ndarray::Axis(1), layout.members(b));
            batch_statistics(sdat.view(), layout.level(b), feature_ids)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_batch_statistics() {
        let sdat = array![[1.0, 2.0, 3.0], [0.0, 0.0, 3.0], [-1.0, 1.0, 0.0]];
        let stats = batch_statistics(sdat.view(), "a", &ids(3)).unwrap();

        assert_eq!(stats.gamma_hat.to_vec(), vec![2.0, 1.0, 0.0]);
        assert_eq!(stats.delta_hat.to_vec(), vec![1.0, 3.0, 1.0]);
        assert_eq!(stats.n_observed.to_vec(), vec![3.0, 3.0, 3.0]);

        assert!((stats.location_prior.mean - 1.0).abs() < 1e-12);
        // population variance of [2, 1, 0]
        assert!((stats.location_prior.variance - 2.0 / 3.0).abs() < 1e-12);

        // delta_hat: mean 5/3, sample variance 4/3
        let (m, s2) = (5.0 / 3.0, 4.0 / 3.0);
        assert!((stats.scale_prior.a() - (2.0 * s2 + m * m) / s2).abs() < 1e-10);
        assert!((stats.scale_prior.b() - (m * s2 + m * m * m) / s2).abs() < 1e-10);
    }

    #[test]
    fn test_missing_values_skipped() {
        let sdat = array![[1.0, f64::NAN, 3.0], [0.0, 2.0, 4.0]];
        let stats = batch_statistics(sdat.view(), "a", &ids(2)).unwrap();
        assert_eq!(stats.gamma_hat[0], 2.0);
        assert_eq!(stats.delta_hat[0], 2.0);
        assert_eq!(stats.n_observed[0], 2.0);
    }

    #[test]
    fn test_single_sample_batch_is_degenerate() {
        let sdat = array![[0.4], [1.2]];
        let result = batch_statistics(sdat.view(), "solo", &ids(2));
        assert!(matches!(result, Err(CombatError::DegenerateVariance { .. })));
    }

    #[test]
    fn test_constant_within_batch_is_degenerate() {
        let sdat = array![[0.7, 0.7, 0.7, 0.7], [0.1, 1.3, -0.4, 0.6]];
        let result = batch_statistics(sdat.view(), "flat", &ids(2));
        match result {
            Err(CombatError::DegenerateVariance { reason }) => {
                assert!(reason.contains("f0") && reason.contains("flat"), "got: {}", reason);
            }
            other => panic!("expected DegenerateVariance, got {:?}", other.map(|s| s.level)),
        }
    }

    #[test]
    fn test_estimate_follows_layout_order() {
        let layout = BatchLayout::from_labels(&["y".to_string(), "x".to_string(), "y".to_string(), "x".to_string()])
            .unwrap();
        let standardized = array![[1.0, 5.0, 3.0, 7.0], [2.0, 0.0, 2.5, 1.0]];
        let stats = estimate_batch_statistics(standardized.view(), &layout, &ids(2)).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].level, "x");
        assert_eq!(stats[0].gamma_hat.to_vec(), vec![6.0, 0.5]);
        assert_eq!(stats[1].level, "y");
        assert_eq!(stats[1].gamma_hat.to_vec(), vec![2.0, 2.25]);
    }
}
