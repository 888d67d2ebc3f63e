//! Iterative posterior shrinkage of batch locations and scales
//!
//! Alternates between the posterior mean of the location given the current
//! scale and the posterior mode of the scale given the new location, until
//! the largest relative change across features drops below the threshold.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use serde::Serialize;

use super::estimate::BatchStatistics;
use super::prior::{InverseGammaPrior, NormalPrior};
use crate::data::BatchLayout;
use crate::error::{CombatError, Result};

/// Configurable parameters for the shrinkage iteration
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ShrinkageParams {
    /// Stop once the largest relative change is below this value
    pub conv: f64,
    /// Iteration bound; exceeding it is a `NonConvergence` error
    pub max_iter: usize,
}

impl Default for ShrinkageParams {
    fn default() -> Self {
        Self {
            conv: 1e-4,
            max_iter: 1000,
        }
    }
}

/// Shrunk location/scale estimates for one batch
#[derive(Debug, Clone)]
pub struct ShrinkageEstimate {
    pub gamma_star: Array1<f64>,
    pub delta_star: Array1<f64>,
    pub iterations: usize,
    /// Convergence metric of the final iteration
    pub change: f64,
}

fn relative_change(new: f64, old: f64) -> f64 {
    let diff = (new - old).abs();
    if diff == 0.0 {
        0.0
    } else {
        diff / old.abs()
    }
}

/// State of the fixed-point iteration for one batch
pub struct ShrinkageSolver<'a> {
    sdat: ArrayView2<'a, f64>,
    gamma_hat: ArrayView1<'a, f64>,
    n: ArrayView1<'a, f64>,
    location_prior: NormalPrior,
    scale_prior: InverseGammaPrior,
    g: Array1<f64>,
    d: Array1<f64>,
    iterations: usize,
}

impl<'a> ShrinkageSolver<'a> {
    /// Start from the raw estimates. `sdat` is features x (samples of the batch).
    pub fn new(sdat: ArrayView2<'a, f64>, stats: &'a BatchStatistics) -> Self {
        Self {
            sdat,
            gamma_hat: stats.gamma_hat.view(),
            n: stats.n_observed.view(),
            location_prior: stats.location_prior,
            scale_prior: stats.scale_prior,
            g: stats.gamma_hat.clone(),
            d: stats.delta_hat.clone(),
            iterations: 0,
        }
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// One update of every feature; returns the convergence metric
    pub fn step(&mut self) -> f64 {
        let mut change = 0.0f64;
        for (f, row) in self.sdat.axis_iter(Axis(0)).enumerate() {
            let n = self.n[f];
            let g_new = self.location_prior.posterior_mean(self.gamma_hat[f], n, self.d[f]);
            let sum2: f64 = row
                .iter()
                .filter(|v| !v.is_nan())
                .map(|&v| (v - g_new) * (v - g_new))
                .sum();
            let d_new = self.scale_prior.posterior_variance(sum2, n);

            let feature_change = relative_change(g_new, self.g[f]).max(relative_change(d_new, self.d[f]));
            // f64::max would drop a NaN
            if feature_change.is_nan() || feature_change > change {
                change = feature_change;
            }

            self.g[f] = g_new;
            self.d[f] = d_new;
        }
        self.iterations += 1;
        change
    }

    /// Iterate until the metric drops below `params.conv`
    pub fn solve(mut self, level: &str, params: &ShrinkageParams) -> Result<ShrinkageEstimate> {
        let mut change = f64::INFINITY;
        while self.iterations < params.max_iter {
            change = self.step();
            if change < params.conv {
                log::debug!("batch '{}' converged after {} iterations", level, self.iterations);
                return Ok(ShrinkageEstimate {
                    gamma_star: self.g,
                    delta_star: self.d,
                    iterations: self.iterations,
                    change,
                });
            }
        }
        Err(CombatError::NonConvergence {
            batch: level.to_string(),
            iterations: self.iterations,
            change,
        })
    }
}

/// Shrink every batch independently, in layout order
pub fn fit_shrinkage(
    standardized: ArrayView2<'_, f64>,
    layout: &BatchLayout,
    stats: &[BatchStatistics],
    params: &ShrinkageParams,
) -> Result<Vec<ShrinkageEstimate>> {
    log::info!("Finding parametric adjustments");
    stats
        .par_iter()
        .enumerate()
        .map(|(b, batch_stats)| {
            let sdat = standardized.select(Axis(1), layout.members(b));
            ShrinkageSolver::new(sdat.view(), batch_stats).solve(&batch_stats.level, params)
        })
        .collect()
}
