//! Covariate model preparation: intercept removal and numerical-covariate resolution

use crate::data::CovariateTable;
use crate::error::{CombatError, Result};

/// Column name reserved for the batch assignment
pub const BATCH_COLUMN: &str = "batch";

/// Reference to a covariate that should enter the design matrix unmodified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericalCovariate {
    /// Column name in the covariate table
    Name(String),
    /// Zero-based column position in the covariate table as supplied
    Index(usize),
}

impl From<&str> for NumericalCovariate {
    fn from(name: &str) -> Self {
        NumericalCovariate::Name(name.to_string())
    }
}

impl From<String> for NumericalCovariate {
    fn from(name: String) -> Self {
        NumericalCovariate::Name(name)
    }
}

impl From<usize> for NumericalCovariate {
    fn from(idx: usize) -> Self {
        NumericalCovariate::Index(idx)
    }
}

impl std::fmt::Display for NumericalCovariate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericalCovariate::Name(name) => write!(f, "'{}'", name),
            NumericalCovariate::Index(idx) => write!(f, "#{}", idx),
        }
    }
}

/// Covariate model after intercept columns are removed
#[derive(Debug, Clone)]
pub struct PreparedCovariates {
    /// Remaining covariate columns, original order
    pub table: CovariateTable,
    /// Positions of numerical covariates in `table`, ascending
    pub numerical: Vec<usize>,
    /// Names of removed intercept-like columns
    pub dropped: Vec<String>,
}

/// Shift an original column index left by the number of dropped columns before it
fn adjust_index(idx: usize, dropped: &[usize]) -> usize {
    idx - dropped.iter().filter(|&&d| d < idx).count()
}

/// Validate the covariate table and resolve numerical covariate references.
///
/// Columns equal to 1 for every sample are removed, since the batch
/// indicators already span the intercept. References are resolved against the
/// caller's table and renumbered to positions in the reduced table. The
/// caller's table is never modified.
pub fn prepare_covariates(
    covariates: Option<&CovariateTable>,
    n_samples: usize,
    numerical: &[NumericalCovariate],
) -> Result<PreparedCovariates> {
    let table = match covariates {
        Some(t) => t,
        None => {
            if let Some(first) = numerical.first() {
                return Err(CombatError::InvalidCovariate {
                    reason: format!("numerical covariate {} given without a covariate table", first),
                });
            }
            return Ok(PreparedCovariates {
                table: CovariateTable::new(n_samples),
                numerical: Vec::new(),
                dropped: Vec::new(),
            });
        }
    };

    if table.n_samples() != n_samples {
        return Err(CombatError::DimensionMismatch {
            expected: format!("{} covariate rows", n_samples),
            got: format!("{} covariate rows", table.n_samples()),
        });
    }

    if table.position(BATCH_COLUMN).is_some() {
        return Err(CombatError::InvalidCovariate {
            reason: format!("'{}' is reserved for the batch assignment", BATCH_COLUMN),
        });
    }

    let dropped_idx: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, (_, column))| column.is_intercept())
        .map(|(i, _)| i)
        .collect();
    let dropped: Vec<String> = dropped_idx.iter().map(|&i| table.names()[i].clone()).collect();
    for name in &dropped {
        log::warn!("Dropping intercept-like covariate '{}' (constant 1)", name);
    }

    let mut resolved = Vec::with_capacity(numerical.len());
    for reference in numerical {
        let original = match reference {
            NumericalCovariate::Name(name) => table.position(name).ok_or_else(|| CombatError::InvalidCovariate {
                reason: format!("numerical covariate '{}' not found in covariate table", name),
            })?,
            NumericalCovariate::Index(idx) => {
                if *idx >= table.n_columns() {
                    return Err(CombatError::InvalidCovariate {
                        reason: format!(
                            "numerical covariate index {} out of range for {} covariate columns",
                            idx,
                            table.n_columns()
                        ),
                    });
                }
                *idx
            }
        };

        if dropped_idx.contains(&original) {
            return Err(CombatError::InvalidCovariate {
                reason: format!(
                    "numerical covariate {} is an intercept column and was removed",
                    reference
                ),
            });
        }

        let is_numeric = table.column(original).map_or(false, |c| c.is_numeric());
        if !is_numeric {
            return Err(CombatError::InvalidCovariate {
                reason: format!("numerical covariate {} is not a numeric column", reference),
            });
        }

        let position = adjust_index(original, &dropped_idx);
        if !resolved.contains(&position) {
            resolved.push(position);
        }
    }
    resolved.sort_unstable();

    let keep: Vec<usize> = (0..table.n_columns()).filter(|i| !dropped_idx.contains(i)).collect();

    Ok(PreparedCovariates {
        table: table.select(&keep),
        numerical: resolved,
        dropped,
    })
}
