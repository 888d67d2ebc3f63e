//! Design matrix construction: batch indicators followed by covariates

use ndarray::{s, Array2, ArrayView2};

use super::prepare::{PreparedCovariates, BATCH_COLUMN};
use crate::data::{levels, BatchLayout, CovariateColumn};
use crate::error::{CombatError, Result};

/// Sample x (batch indicators + covariates) numeric design.
///
/// Columns are `[batch_1 .. batch_k, categorical/other covariates.., numerical covariates..]`.
/// There is no intercept column: the batch indicators sum to one in every row.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    column_names: Vec<String>,
    n_batch: usize,
}

impl DesignMatrix {
    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_batch(&self) -> usize {
        self.n_batch
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.matrix.ncols()
    }

    /// Batch indicator columns only
    pub fn batch_block(&self) -> ArrayView2<'_, f64> {
        self.matrix.slice(s![.., ..self.n_batch])
    }

    /// Covariate columns only (may have zero columns)
    pub fn covariate_block(&self) -> ArrayView2<'_, f64> {
        self.matrix.slice(s![.., self.n_batch..])
    }
}

/// Expand a categorical column into one indicator per non-reference level.
/// The reference is the first level in sorted order.
fn encode_categorical(name: &str, values: &[String]) -> Vec<(String, Vec<f64>)> {
    levels(values)
        .iter()
        .skip(1)
        .map(|level| {
            let indicator = values.iter().map(|v| if v == level { 1.0 } else { 0.0 }).collect();
            (format!("{}_{}", name, level), indicator)
        })
        .collect()
}

/// Build the design matrix from the prepared covariates and the batch layout
pub fn build_design_matrix(prepared: &PreparedCovariates, layout: &BatchLayout) -> Result<DesignMatrix> {
    let n_samples = layout.n_samples();
    let n_batch = layout.n_batch();

    if prepared.table.n_samples() != n_samples {
        return Err(CombatError::DimensionMismatch {
            expected: format!("{} covariate rows", n_samples),
            got: format!("{} covariate rows", prepared.table.n_samples()),
        });
    }

    let mut columns: Vec<(String, Vec<f64>)> = Vec::new();

    for (b, level) in layout.levels().iter().enumerate() {
        let indicator = (0..n_samples)
            .map(|i| if layout.batch_of(i) == b { 1.0 } else { 0.0 })
            .collect();
        columns.push((format!("{}_{}", BATCH_COLUMN, level), indicator));
    }
    log::info!("found {} batches", n_batch);

    let mut other_names = Vec::new();
    for (idx, (name, column)) in prepared.table.iter().enumerate() {
        if prepared.numerical.contains(&idx) {
            continue;
        }
        other_names.push(name.to_string());
        match column {
            CovariateColumn::Numeric(values) => columns.push((name.to_string(), values.clone())),
            CovariateColumn::Categorical(values) => columns.extend(encode_categorical(name, values)),
        }
    }

    if !prepared.numerical.is_empty() {
        log::info!("found {} numerical covariates...", prepared.numerical.len());
    }
    for &idx in &prepared.numerical {
        let name = &prepared.table.names()[idx];
        log::info!("\t{}", name);
        match prepared.table.column(idx) {
            Some(CovariateColumn::Numeric(values)) => columns.push((name.clone(), values.clone())),
            _ => {
                return Err(CombatError::InvalidCovariate {
                    reason: format!("numerical covariate '{}' is not a numeric column", name),
                })
            }
        }
    }
    log::info!("found {} categorical variables:\t{}", other_names.len(), other_names.join(", "));

    let mut matrix = Array2::zeros((n_samples, columns.len()));
    for (j, (_, values)) in columns.iter().enumerate() {
        for (i, &v) in values.iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }

    check_full_rank(&matrix)?;

    Ok(DesignMatrix {
        matrix,
        column_names: columns.into_iter().map(|(name, _)| name).collect(),
        n_batch,
    })
}

/// Check that a design matrix has full column rank.
///
/// Uses Householder QR with column pivoting. The rank is the number of
/// diagonal elements of R whose magnitude exceeds
/// `max(nrow, ncol) * eps * max(|diag(R)|)`.
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();

    if nrow == 0 || ncol == 0 {
        return Err(CombatError::SingularDesignMatrix {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }

    if qr_rank(matrix) < ncol {
        let has_zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if has_zero_column {
            "the design matrix is not full rank: a batch or covariate level without any \
             samples produced a column of zeros"
        } else {
            "the design matrix is not full rank: one or more covariates are linear \
             combinations of the batch indicators or of each other"
        };
        return Err(CombatError::SingularDesignMatrix {
            reason: reason.to_string(),
        });
    }

    Ok(())
}

/// Numerical rank via Householder QR with column pivoting
fn qr_rank(matrix: &Array2<f64>) -> usize {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();
    let k = nrow.min(ncol);

    let mut r = matrix.to_owned();
    let mut col_norms_sq: Vec<f64> = (0..ncol).map(|j| r.column(j).iter().map(|&v| v * v).sum()).collect();

    for step in 0..k {
        let mut best_col = step;
        for j in (step + 1)..ncol {
            if col_norms_sq[j] > col_norms_sq[best_col] {
                best_col = j;
            }
        }
        if best_col != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best_col]);
            }
            col_norms_sq.swap(step, best_col);
        }

        let mut alpha = (step..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break;
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }

        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq = v0 * v0 + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>();
        if v_norm_sq < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let dot = v0 * r[[step, j]] + ((step + 1)..nrow).map(|i| r[[i, step]] * r[[i, j]]).sum::<f64>();
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
        }

        for j in (step + 1)..ncol {
            col_norms_sq[j] = (col_norms_sq[j] - r[[step, j]] * r[[step, j]]).max(0.0);
        }
    }

    let max_abs_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_abs_diag;

    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
