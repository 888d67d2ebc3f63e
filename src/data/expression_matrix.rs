//! Feature-by-sample measurement matrix

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{CombatError, Result};

/// Deduplicate names by appending _1, _2, etc. to repeated entries
fn deduplicate_names(names: Vec<String>, kind: &str) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate {} name '{}' renamed to '{}'", kind, name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// Measurements such as expression or methylation values.
/// Rows are features, columns are samples. `NaN` marks a missing entry.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    values: Array2<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new matrix from raw values and axis labels
    pub fn new(values: Array2<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_features, n_samples) = values.dim();

        if feature_ids.len() != n_features {
            return Err(CombatError::DimensionMismatch {
                expected: format!("{} feature IDs", n_features),
                got: format!("{} feature IDs", feature_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(CombatError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if values.iter().any(|x| x.is_infinite()) {
            return Err(CombatError::InvalidMatrix {
                reason: "Values must be finite (use NaN for missing entries)".to_string(),
            });
        }

        let feature_ids = deduplicate_names(feature_ids, "feature");

        Ok(Self {
            values,
            feature_ids,
            sample_ids,
        })
    }

    /// Build a matrix with the same axis labels and new values
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        if values.dim() != self.values.dim() {
            return Err(CombatError::DimensionMismatch {
                expected: format!("{:?}", self.values.dim()),
                got: format!("{:?}", values.dim()),
            });
        }
        Ok(Self {
            values,
            feature_ids: self.feature_ids.clone(),
            sample_ids: self.sample_ids.clone(),
        })
    }

    pub fn n_features(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Values of one feature across all samples
    pub fn feature(&self, feature_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(feature_idx)
    }

    /// Number of missing (NaN) entries
    pub fn n_missing(&self) -> usize {
        self.values.iter().filter(|x| x.is_nan()).count()
    }
}
