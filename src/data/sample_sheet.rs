//! Raw per-sample annotation table as loaded from disk

use std::collections::HashSet;

use super::covariates::{CovariateColumn, CovariateTable};
use crate::error::{CombatError, Result};

/// Sample annotations with string cells, columns in file order.
/// The batch column and covariates are both pulled from here.
#[derive(Debug, Clone)]
pub struct SampleSheet {
    sample_ids: Vec<String>,
    names: Vec<String>,
    columns: Vec<Vec<String>>,
}

impl SampleSheet {
    pub fn new(sample_ids: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        for id in &sample_ids {
            if !seen.insert(id) {
                log::warn!("Duplicate sample ID detected: '{}'. Sample IDs should be unique.", id);
            }
        }
        Self {
            sample_ids,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Append a column of raw values
    pub fn add_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.sample_ids.len() {
            return Err(CombatError::DimensionMismatch {
                expected: format!("{} values", self.sample_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        self.names.push(name.to_string());
        self.columns.push(values);
        Ok(())
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Values of a named column
    pub fn column(&self, name: &str) -> Result<&[String]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| CombatError::InvalidInput {
                reason: format!("column '{}' not found in sample sheet", name),
            })
    }

    /// Reorder rows to follow `sample_ids`
    pub fn align(&self, sample_ids: &[String]) -> Result<Self> {
        let missing: Vec<&str> = sample_ids
            .iter()
            .filter(|id| !self.sample_ids.contains(id))
            .map(|s| s.as_str())
            .collect();
        let extra: Vec<&str> = self
            .sample_ids
            .iter()
            .filter(|id| !sample_ids.contains(id))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() || !extra.is_empty() {
            let mut msg = String::from("Sample IDs do not match between data and sample sheet.");
            if !missing.is_empty() {
                msg.push_str(&format!(" In data but not sample sheet: {:?}.", missing));
            }
            if !extra.is_empty() {
                msg.push_str(&format!(" In sample sheet but not data: {:?}.", extra));
            }
            return Err(CombatError::InvalidInput { reason: msg });
        }

        let order: Vec<usize> = sample_ids
            .iter()
            .filter_map(|id| self.sample_ids.iter().position(|s| s == id))
            .collect();

        let mut aligned = SampleSheet::new(sample_ids.to_vec());
        for (name, values) in self.names.iter().zip(&self.columns) {
            aligned.add_column(name, order.iter().map(|&i| values[i].clone()).collect())?;
        }
        Ok(aligned)
    }

    /// Build a typed covariate table from the named columns, in the order given.
    ///
    /// A column becomes numeric when every cell parses as a number. Columns
    /// listed in `numerical` must be numeric.
    pub fn covariate_table(&self, names: &[String], numerical: &[String]) -> Result<CovariateTable> {
        let mut table = CovariateTable::new(self.n_samples());
        for name in names {
            let raw = self.column(name).map_err(|_| CombatError::InvalidCovariate {
                reason: format!("covariate '{}' not found in sample sheet", name),
            })?;
            let parsed: Option<Vec<f64>> = raw.iter().map(|v| v.trim().parse::<f64>().ok()).collect();
            let column = match parsed {
                Some(values) => CovariateColumn::Numeric(values),
                None if numerical.contains(name) => {
                    return Err(CombatError::InvalidCovariate {
                        reason: format!("numerical covariate '{}' has non-numeric values", name),
                    });
                }
                None => CovariateColumn::Categorical(raw.to_vec()),
            };
            table.add_column(name, column)?;
        }
        Ok(table)
    }
}
