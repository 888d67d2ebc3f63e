//! Empirical Bayes estimation of batch location and scale effects

mod estimate;
mod prior;
mod solver;

pub use estimate::{batch_statistics, estimate_batch_statistics, BatchStatistics};
pub use prior::{InverseGammaPrior, NormalPrior};
pub use solver::{fit_shrinkage, ShrinkageEstimate, ShrinkageParams, ShrinkageSolver};
