//! Input/Output operations for batch correction

mod csv;
mod report;

pub use self::csv::{read_expression_matrix, read_sample_sheet, write_expression_matrix};
pub use report::write_fit_report;
