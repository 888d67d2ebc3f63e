//! JSON report of the fitted correction parameters

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::CombatFit;

/// Write design columns, standardization moments and per-batch
/// hyperparameters and estimates as pretty-printed JSON
pub fn write_fit_report<P: AsRef<Path>>(path: P, fit: &CombatFit) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, fit)?;
    Ok(())
}
