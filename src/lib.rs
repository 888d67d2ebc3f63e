//! rust_combat: empirical-Bayes batch effect correction
//!
//! Each batch is modelled as an additive location shift and a multiplicative
//! scale shift on every feature. Per-feature estimates of those shifts are
//! shrunk toward a prior fitted across all features of the batch, then
//! removed from the data.
//!
//! Pipeline:
//! 1. prepare the covariate model (drop intercept columns, resolve numerical covariates)
//! 2. build the design matrix (batch indicators, then covariates)
//! 3. standardize features against the design
//! 4. estimate per-batch statistics and priors
//! 5. shrink location/scale estimates (bounded fixed-point iteration)
//! 6. adjust and rescale back to the data scale
//!
//! # Example
//!
//! ```ignore
//! use rust_combat::prelude::*;
//!
//! let data = read_expression_matrix("expression.tsv")?;
//! let sheet = read_sample_sheet("samples.tsv")?.align(data.sample_ids())?;
//! let batch = sheet.column("batch")?.to_vec();
//!
//! let result = combat(&data, &batch, None, &[], &ShrinkageParams::default())?;
//! write_expression_matrix("corrected.tsv", &result.corrected)?;
//! ```

pub mod adjust;
pub mod cli;
pub mod data;
pub mod design;
pub mod empirical_bayes;
pub mod error;
pub mod io;
pub mod linalg;
pub mod standardize;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{BatchLayout, CovariateColumn, CovariateTable, ExpressionMatrix, SampleSheet};
    pub use crate::design::{build_design_matrix, prepare_covariates, DesignMatrix, NumericalCovariate};
    pub use crate::empirical_bayes::{estimate_batch_statistics, fit_shrinkage, BatchStatistics, ShrinkageParams};
    pub use crate::error::{CombatError, Result};
    pub use crate::io::{read_expression_matrix, read_sample_sheet, write_expression_matrix, write_fit_report};
    pub use crate::standardize::{standardize, Standardized};
    pub use crate::{combat, BatchFit, CombatFit, CombatResult};
}

use serde::Serialize;

use prelude::*;

/// Fitted parameters of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchFit {
    pub level: String,
    pub size: usize,
    pub gamma_bar: f64,
    pub t2: f64,
    pub a: f64,
    pub b: f64,
    pub iterations: usize,
    pub gamma_hat: Vec<f64>,
    pub delta_hat: Vec<f64>,
    pub gamma_star: Vec<f64>,
    pub delta_star: Vec<f64>,
}

/// Diagnostics of a correction run
#[derive(Debug, Clone, Serialize)]
pub struct CombatFit {
    pub feature_ids: Vec<String>,
    pub design_columns: Vec<String>,
    pub dropped_covariates: Vec<String>,
    pub params: ShrinkageParams,
    pub grand_mean: Vec<f64>,
    pub var_pooled: Vec<f64>,
    pub batches: Vec<BatchFit>,
}

/// Corrected data plus the fitted parameters
#[derive(Debug, Clone)]
pub struct CombatResult {
    /// Same shape, feature ids and sample ids as the input
    pub corrected: ExpressionMatrix,
    pub fit: CombatFit,
}

/// Correct batch effects in `data`.
///
/// * `data` - features x samples, NaN for missing values
/// * `batch` - batch label of every sample, in column order
/// * `covariates` - optional sample x covariate table, rows in column order
/// * `numerical` - covariates entered unmodified (names or positions)
/// * `params` - shrinkage convergence settings
pub fn combat(
    data: &ExpressionMatrix,
    batch: &[String],
    covariates: Option<&CovariateTable>,
    numerical: &[NumericalCovariate],
    params: &ShrinkageParams,
) -> Result<CombatResult> {
    if data.n_features() == 0 || data.n_samples() == 0 {
        return Err(CombatError::EmptyData {
            reason: format!("data has {} features and {} samples", data.n_features(), data.n_samples()),
        });
    }
    if batch.len() != data.n_samples() {
        return Err(CombatError::DimensionMismatch {
            expected: format!("{} batch labels", data.n_samples()),
            got: format!("{} batch labels", batch.len()),
        });
    }

    let layout = BatchLayout::from_labels(batch)?;
    let prepared = prepare_covariates(covariates, data.n_samples(), numerical)?;
    let design = build_design_matrix(&prepared, &layout)?;

    let standardized = standardize(data, &design, &layout)?;
    let stats = estimate_batch_statistics(standardized.data.view(), &layout, data.feature_ids())?;
    let estimates = fit_shrinkage(standardized.data.view(), &layout, &stats, params)?;
    let corrected = adjust::adjust(&standardized, &layout, &estimates)?;

    let batches = stats
        .iter()
        .zip(&estimates)
        .zip(layout.sizes())
        .map(|((s, e), size)| BatchFit {
            level: s.level.clone(),
            size,
            gamma_bar: s.location_prior.mean,
            t2: s.location_prior.variance,
            a: s.scale_prior.a(),
            b: s.scale_prior.b(),
            iterations: e.iterations,
            gamma_hat: s.gamma_hat.to_vec(),
            delta_hat: s.delta_hat.to_vec(),
            gamma_star: e.gamma_star.to_vec(),
            delta_star: e.delta_star.to_vec(),
        })
        .collect();

    let fit = CombatFit {
        feature_ids: data.feature_ids().to_vec(),
        design_columns: design.column_names().to_vec(),
        dropped_covariates: prepared.dropped,
        params: *params,
        grand_mean: standardized.grand_mean.to_vec(),
        var_pooled: standardized.var_pooled.to_vec(),
        batches,
    };

    Ok(CombatResult {
        corrected: data.with_values(corrected)?,
        fit,
    })
}
