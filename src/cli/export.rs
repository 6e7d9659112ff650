use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use mzextract::formats::mzcsv::write_mzcsv;
use mzextract::sample::Sample;

/// Write a loaded sample as mzCSV
pub fn run(sample: &Sample, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_mzcsv(sample, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let points: usize = sample.scans().iter().map(|s| s.nobs()).sum();
    info!(
        "Exported {} scans ({} points) to {}",
        sample.scan_count(),
        points,
        output.display()
    );
    Ok(())
}
