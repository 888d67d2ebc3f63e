//! Sample-level covariate table

use crate::error::{CombatError, Result};

/// One covariate column, one value per sample
#[derive(Debug, Clone, PartialEq)]
pub enum CovariateColumn {
    /// Numeric values, used as-is in the design matrix
    Numeric(Vec<f64>),
    /// Categorical labels, expanded into indicator columns
    Categorical(Vec<String>),
}

impl CovariateColumn {
    pub fn len(&self) -> usize {
        match self {
            CovariateColumn::Numeric(v) => v.len(),
            CovariateColumn::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CovariateColumn::Numeric(_))
    }

    /// A numeric column equal to 1 for every sample acts as an intercept
    pub fn is_intercept(&self) -> bool {
        match self {
            CovariateColumn::Numeric(v) => !v.is_empty() && v.iter().all(|&x| x == 1.0),
            CovariateColumn::Categorical(_) => false,
        }
    }
}

/// Sorted unique labels of a categorical column
pub fn levels(values: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = values.to_vec();
    unique.sort();
    unique.dedup();
    unique
}

/// Ordered sample x covariate table.
/// Rows follow the sample (column) order of the measurement matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CovariateTable {
    n_samples: usize,
    names: Vec<String>,
    columns: Vec<CovariateColumn>,
}

impl CovariateTable {
    /// Create an empty table for `n_samples` samples
    pub fn new(n_samples: usize) -> Self {
        Self {
            n_samples,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a column, keeping insertion order
    pub fn add_column(&mut self, name: &str, column: CovariateColumn) -> Result<()> {
        if column.len() != self.n_samples {
            return Err(CombatError::DimensionMismatch {
                expected: format!("{} values", self.n_samples),
                got: format!("{} values", column.len()),
            });
        }
        if self.position(name).is_some() {
            return Err(CombatError::InvalidCovariate {
                reason: format!("duplicate covariate column '{}'", name),
            });
        }
        if let CovariateColumn::Numeric(values) = &column {
            if values.iter().any(|x| !x.is_finite()) {
                return Err(CombatError::InvalidCovariate {
                    reason: format!("numeric covariate '{}' contains non-finite values", name),
                });
            }
        }
        self.names.push(name.to_string());
        self.columns.push(column);
        Ok(())
    }

    /// Append a numeric column
    pub fn add_numeric(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.add_column(name, CovariateColumn::Numeric(values))
    }

    /// Append a categorical column
    pub fn add_categorical(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        self.add_column(name, CovariateColumn::Categorical(values))
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, idx: usize) -> Option<&CovariateColumn> {
        self.columns.get(idx)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterate over (name, column) pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CovariateColumn)> {
        self.names.iter().map(|s| s.as_str()).zip(self.columns.iter())
    }

    /// New table holding only the columns at `keep`, in that order
    pub fn select(&self, keep: &[usize]) -> Self {
        Self {
            n_samples: self.n_samples,
            names: keep.iter().map(|&i| self.names[i].clone()).collect(),
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
        }
    }
}
