//! Delimited text reading and writing for expression matrices and sample sheets

use std::fs;
use std::path::Path;

use ndarray::Array2;

use crate::data::{ExpressionMatrix, SampleSheet};
use crate::error::{CombatError, Result};

/// Cells read as a missing value
const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "NULL"];

/// Tab if the header line has one, comma otherwise
fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Tab unless the file name ends in `.csv`
fn output_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

fn delimited_reader(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

/// Read the header and data rows of a labelled table.
///
/// The header may either name the label column or omit it, in which case
/// it is one field shorter than the data rows.
fn read_table(path: &Path, what: &str) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
    let content = fs::read_to_string(path)?;
    let mut records = delimited_reader(&content).into_records();

    let header = records.next().ok_or_else(|| CombatError::EmptyData {
        reason: format!("{} file {} is empty", what, path.display()),
    })??;

    let rows: Vec<csv::StringRecord> = records
        .filter(|r| r.as_ref().map_or(true, |rec| rec.iter().any(|f| !f.is_empty())))
        .collect::<std::result::Result<_, _>>()?;

    let width = rows.first().map_or(header.len(), |r| r.len());
    let columns: Vec<String> = if header.len() + 1 == width {
        header.iter().map(String::from).collect()
    } else {
        header.iter().skip(1).map(String::from).collect()
    };

    for (line, row) in rows.iter().enumerate() {
        if row.len() != columns.len() + 1 {
            return Err(CombatError::InvalidInput {
                reason: format!(
                    "{} row {} has {} fields, expected {}",
                    what,
                    line + 2,
                    row.len(),
                    columns.len() + 1
                ),
            });
        }
    }

    Ok((columns, rows))
}

fn parse_value(cell: &str, feature: &str, sample: &str) -> Result<f64> {
    if MISSING_TOKENS.contains(&cell) {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| CombatError::InvalidMatrix {
        reason: format!("invalid value '{}' for feature '{}' in sample '{}'", cell, feature, sample),
    })
}

/// Read a features x samples matrix.
/// Expected format: first column is feature IDs, first row is sample IDs.
/// Tab or comma delimited (auto-detected); NA, NaN and empty cells are missing.
pub fn read_expression_matrix<P: AsRef<Path>>(path: P) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let (sample_ids, rows) = read_table(path, "expression")?;

    if rows.is_empty() {
        return Err(CombatError::EmptyData {
            reason: format!("no features found in {}", path.display()),
        });
    }
    if sample_ids.is_empty() {
        return Err(CombatError::EmptyData {
            reason: format!("no samples found in {}", path.display()),
        });
    }

    let n_samples = sample_ids.len();
    let mut values = Array2::<f64>::zeros((rows.len(), n_samples));
    let mut feature_ids = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let feature = &row[0];
        for (j, cell) in row.iter().skip(1).enumerate() {
            values[[i, j]] = parse_value(cell, feature, &sample_ids[j])?;
        }
        feature_ids.push(feature.to_string());
    }

    let matrix = ExpressionMatrix::new(values, feature_ids, sample_ids)?;
    log::info!(
        "Read {} features x {} samples ({} missing values)",
        matrix.n_features(),
        matrix.n_samples(),
        matrix.n_missing()
    );
    Ok(matrix)
}

/// Read per-sample annotations.
/// Expected format: first column is sample IDs, remaining columns are
/// batch labels and covariates. Cells are kept as text.
pub fn read_sample_sheet<P: AsRef<Path>>(path: P) -> Result<SampleSheet> {
    let path = path.as_ref();
    let (names, rows) = read_table(path, "sample sheet")?;

    if rows.is_empty() {
        return Err(CombatError::EmptyData {
            reason: format!("no samples found in {}", path.display()),
        });
    }

    let sample_ids: Vec<String> = rows.iter().map(|r| r[0].to_string()).collect();
    let mut sheet = SampleSheet::new(sample_ids);
    for (c, name) in names.iter().enumerate() {
        let values: Vec<String> = rows.iter().map(|r| r[c + 1].to_string()).collect();
        sheet.add_column(name, values)?;
    }
    Ok(sheet)
}

/// Write a matrix with feature IDs as the first column and sample IDs as
/// the header. Missing values are written as `NA`.
pub fn write_expression_matrix<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(output_delimiter(path))
        .from_path(path)?;

    let mut header = Vec::with_capacity(matrix.n_samples() + 1);
    header.push("feature_id".to_string());
    header.extend(matrix.sample_ids().iter().cloned());
    writer.write_record(&header)?;

    for (feature, row) in matrix.feature_ids().iter().zip(matrix.values().rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(feature.clone());
        record.extend(row.iter().map(|v| if v.is_nan() { "NA".to_string() } else { v.to_string() }));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
