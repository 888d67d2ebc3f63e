//! Command-line interface for rust_combat

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_combat")]
#[command(version)]
#[command(about = "Empirical-Bayes batch effect correction (ComBat) in Rust")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove batch effects from a features x samples matrix
    #[command(
        long_about = "Remove batch effects from a features x samples matrix\n\n\
            Fits a location/scale model per batch, shrinks the per-feature batch\n\
            effects toward a prior shared by all features of the batch, and removes\n\
            them. Covariates listed with --covariate or --numerical are protected\n\
            from the correction.",
        after_long_help = "\
Examples:
  # Batch only
  rust_combat correct -d expression.tsv -s samples.tsv -o corrected.tsv

  # Protect a categorical and a numerical covariate
  rust_combat correct -d expression.tsv -s samples.tsv -b run \\
    --covariate treatment --numerical age -o corrected.tsv

  # Also write the fitted priors and shrunk estimates
  rust_combat correct -d expression.tsv -s samples.tsv -o corrected.tsv --report fit.json"
    )]
    Correct {
        /// Path to expression matrix file
        #[arg(short, long,
            long_help = "Path to expression matrix file.\n\
                Format: first column = feature IDs, remaining columns = samples.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).\n\
                NA, NaN and empty cells are treated as missing values.")]
        data: String,

        /// Path to sample sheet file
        #[arg(short, long,
            long_help = "Path to sample sheet file.\n\
                Format: first column = sample IDs (matching matrix columns),\n\
                remaining columns = batch labels and covariates.")]
        samples: String,

        /// Sample sheet column holding batch labels [default: batch]
        #[arg(short, long, default_value = "batch")]
        batch: String,

        /// Covariate to protect
        #[arg(long, value_name = "VAR",
            long_help = "Covariate whose effect is kept in the data.\n\
                Columns that parse as numbers enter the model as-is, others are\n\
                dummy encoded. The name 'batch' is reserved for the batch\n\
                assignment and cannot be used as a covariate.\n\
                Can be specified multiple times.")]
        covariate: Vec<String>,

        /// Numerical covariate to protect
        #[arg(long, value_name = "VAR",
            long_help = "Covariate entered as a single numeric column.\n\
                Every value must parse as a number. Can be specified multiple times.")]
        numerical: Vec<String>,

        /// Output file path [default: combat_corrected.tsv]
        #[arg(short, long, default_value = "combat_corrected.tsv")]
        output: String,

        /// Write fitted parameters as JSON to this path
        #[arg(long, value_name = "PATH")]
        report: Option<String>,

        /// Maximum shrinkage iterations per batch [default: 1000]
        #[arg(long, default_value = "1000")]
        max_iter: usize,

        /// Shrinkage convergence threshold on the relative change [default: 1e-4]
        #[arg(long, default_value = "1e-4")]
        conv: f64,

        /// Number of threads (0 = auto) [default: 0]
        #[arg(short = 't', long, default_value = "0")]
        threads: usize,
    },
}
