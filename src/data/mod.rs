//! Data structures for batch correction

mod batch;
mod covariates;
mod expression_matrix;
mod sample_sheet;

pub use batch::BatchLayout;
pub use covariates::{levels, CovariateColumn, CovariateTable};
pub use expression_matrix::ExpressionMatrix;
pub use sample_sheet::SampleSheet;
