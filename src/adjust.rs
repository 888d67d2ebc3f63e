//! Removal of the shrunk batch effects and rescaling to the data scale

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use crate::data::BatchLayout;
use crate::empirical_bayes::ShrinkageEstimate;
use crate::error::{CombatError, Result};
use crate::standardize::Standardized;

/// Subtract `gamma_star` and divide by `sqrt(delta_star)` in standardized
/// space, batch by batch, then undo the standardization.
pub fn adjust(standardized: &Standardized, layout: &BatchLayout, estimates: &[ShrinkageEstimate]) -> Result<Array2<f64>> {
    if estimates.len() != layout.n_batch() {
        return Err(CombatError::DimensionMismatch {
            expected: format!("{} batch estimates", layout.n_batch()),
            got: format!("{} batch estimates", estimates.len()),
        });
    }

    log::info!("Adjusting data");

    let sdata = standardized.data.view();
    let blocks: Vec<Array2<f64>> = estimates
        .par_iter()
        .enumerate()
        .map(|(b, est)| {
            let block = sdata.select(Axis(1), layout.members(b));
            let gamma = est.gamma_star.view().insert_axis(Axis(1));
            let scale = est.delta_star.mapv(f64::sqrt).insert_axis(Axis(1));
            (&block - &gamma) / &scale
        })
        .collect();

    let mut adjusted = Array2::<f64>::zeros(sdata.raw_dim());
    for (b, block) in blocks.iter().enumerate() {
        for (col, &sample) in layout.members(b).iter().enumerate() {
            adjusted.column_mut(sample).assign(&block.column(col));
        }
    }

    Ok(standardized.restore(&adjusted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn standardized_fixture() -> Standardized {
        Standardized {
            data: array![[1.0, -1.0, 2.0, 0.0], [0.5, f64::NAN, -0.5, 1.5]],
            coefficients: Array2::zeros((2, 2)),
            grand_mean: array![10.0, 20.0],
            var_pooled: array![4.0, 9.0],
            stand_mean: array![[10.0, 10.0, 10.0, 10.0], [20.0, 20.0, 20.0, 20.0]],
        }
    }

    fn estimate(gamma: [f64; 2], delta: [f64; 2]) -> ShrinkageEstimate {
        ShrinkageEstimate {
            gamma_star: Array1::from(gamma.to_vec()),
            delta_star: Array1::from(delta.to_vec()),
            iterations: 1,
            change: 0.0,
        }
    }

    #[test]
    fn test_adjust_per_batch() {
        let layout = BatchLayout::from_labels(&["p", "q", "p", "q"].map(String::from)).unwrap();
        let st = standardized_fixture();
        let estimates = vec![estimate([1.0, 0.5], [1.0, 4.0]), estimate([-1.0, 0.0], [4.0, 1.0])];
        let out = adjust(&st, &layout, &estimates).unwrap();

        // sample 0 (batch p): (1 - 1) / 1 * 2 + 10
        assert!((out[[0, 0]] - 10.0).abs() < 1e-12);
        // sample 1 (batch q): (-1 + 1) / 2 * 2 + 10
        assert!((out[[0, 1]] - 10.0).abs() < 1e-12);
        // sample 2 (batch p): (2 - 1) / 1 * 2 + 10
        assert!((out[[0, 2]] - 12.0).abs() < 1e-12);
        // sample 3 (batch q): (0 + 1) / 2 * 2 + 10
        assert!((out[[0, 3]] - 11.0).abs() < 1e-12);
        // feature 1, sample 2 (batch p): (-0.5 - 0.5) / 2 * 3 + 20
        assert!((out[[1, 2]] - 18.5).abs() < 1e-12);
        assert!(out[[1, 1]].is_nan());
    }

    #[test]
    fn test_estimate_count_checked() {
        let layout = BatchLayout::from_labels(&["p", "q", "p", "q"].map(String::from)).unwrap();
        let result = adjust(&standardized_fixture(), &layout, &[estimate([0.0, 0.0], [1.0, 1.0])]);
        assert!(result.is_err());
    }
}
