//! Error types for rust_combat

use thiserror::Error;

/// Main error type for batch correction
#[derive(Error, Debug)]
pub enum CombatError {
    #[error("Invalid covariate: {reason}")]
    InvalidCovariate { reason: String },

    #[error("Singular design matrix: {reason}")]
    SingularDesignMatrix { reason: String },

    #[error("Degenerate variance: {reason}")]
    DegenerateVariance { reason: String },

    #[error("Shrinkage for batch '{batch}' did not converge after {iterations} iterations (last change {change:.3e})")]
    NonConvergence {
        batch: String,
        iterations: usize,
        change: f64,
    },

    #[error("Invalid expression matrix: {reason}")]
    InvalidMatrix { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for batch correction
pub type Result<T> = std::result::Result<T, CombatError>;
