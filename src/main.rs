//! rust_combat command-line interface

use clap::{CommandFactory, Parser};
use log::{info, LevelFilter};

use rust_combat::cli::{Cli, Commands};
use rust_combat::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Correct {
            data,
            samples,
            batch,
            covariate,
            numerical,
            output,
            report,
            max_iter,
            conv,
            threads,
        }) => run_correct(
            &data,
            &samples,
            &batch,
            &covariate,
            &numerical,
            &output,
            report.as_deref(),
            ShrinkageParams { conv, max_iter },
            threads,
        ),
        None => {
            let _ = Cli::command().print_help();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_correct(
    data_path: &str,
    samples_path: &str,
    batch_column: &str,
    covariates: &[String],
    numerical: &[String],
    output_path: &str,
    report_path: Option<&str>,
    params: ShrinkageParams,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    if params.conv.is_nan() || params.conv <= 0.0 || params.max_iter == 0 {
        return Err(CombatError::InvalidInput {
            reason: "--conv must be positive and --max-iter at least 1".to_string(),
        });
    }

    info!("Loading expression matrix from: {}", data_path);
    let data = read_expression_matrix(data_path)?;

    info!("Loading sample sheet from: {}", samples_path);
    let sheet = read_sample_sheet(samples_path)?.align(data.sample_ids())?;
    let batch = sheet.column(batch_column)?.to_vec();

    // numerical covariates may be listed under either flag
    let mut names: Vec<String> = covariates.to_vec();
    for name in numerical {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    let table = if names.is_empty() {
        None
    } else {
        Some(sheet.covariate_table(&names, numerical)?)
    };
    let numerical: Vec<NumericalCovariate> = numerical.iter().map(|n| NumericalCovariate::from(n.as_str())).collect();

    let result = combat(&data, &batch, table.as_ref(), &numerical, &params)?;

    info!("Writing corrected matrix to: {}", output_path);
    write_expression_matrix(output_path, &result.corrected)?;

    if let Some(path) = report_path {
        info!("Writing fit report to: {}", path);
        write_fit_report(path, &result.fit)?;
    }

    for fit in &result.fit.batches {
        info!(
            "  batch '{}': {} samples, converged in {} iterations",
            fit.level, fit.size, fit.iterations
        );
    }

    Ok(())
}
