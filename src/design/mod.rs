//! Covariate model preparation and design matrix construction

mod matrix;
mod prepare;

pub use matrix::{build_design_matrix, check_full_rank, DesignMatrix};
pub use prepare::{prepare_covariates, NumericalCovariate, PreparedCovariates, BATCH_COLUMN};
