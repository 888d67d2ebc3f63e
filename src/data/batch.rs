//! Batch assignment and the fixed batch-level ordering

use super::covariates::levels;
use crate::error::{CombatError, Result};

/// Partition of samples into batches.
///
/// The level order is computed once (sorted, deduplicated labels) and every
/// later stage indexes batches through this layout, so design columns,
/// statistics and adjustments always refer to the same batch.
#[derive(Debug, Clone)]
pub struct BatchLayout {
    levels: Vec<String>,
    /// Batch index for each sample
    assignment: Vec<usize>,
    /// Sample indices for each batch, in sample order
    members: Vec<Vec<usize>>,
}

impl BatchLayout {
    /// Group samples by their batch label
    pub fn from_labels(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(CombatError::EmptyData {
                reason: "batch assignment is empty".to_string(),
            });
        }
        if let Some(pos) = labels.iter().position(|l| l.trim().is_empty()) {
            return Err(CombatError::InvalidInput {
                reason: format!("sample {} has an empty batch label", pos),
            });
        }

        let levels = levels(labels);
        let mut members = vec![Vec::new(); levels.len()];
        let mut assignment = Vec::with_capacity(labels.len());
        for (sample, label) in labels.iter().enumerate() {
            let idx = levels.binary_search(label).map_err(|_| CombatError::InvalidInput {
                reason: format!("batch label '{}' missing from level list", label),
            })?;
            assignment.push(idx);
            members[idx].push(sample);
        }

        Ok(Self {
            levels,
            assignment,
            members,
        })
    }

    pub fn n_batch(&self) -> usize {
        self.levels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.assignment.len()
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn level(&self, batch: usize) -> &str {
        &self.levels[batch]
    }

    /// Sample indices belonging to one batch
    pub fn members(&self, batch: usize) -> &[usize] {
        &self.members[batch]
    }

    /// Batch index of a sample
    pub fn batch_of(&self, sample: usize) -> usize {
        self.assignment[sample]
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.len()).collect()
    }
}
