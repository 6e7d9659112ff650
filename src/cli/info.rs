use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mzextract::formats::Format;
use mzextract::sample::{sample_extents, LoadOutcome, Loader, SampleRanges};

use super::{caution, heading};

/// What `info` reports for one file
#[derive(Debug, Serialize)]
struct FileSummary {
    file: String,
    name: String,
    format: Format,
    complete: bool,
    error: Option<String>,
    blank: bool,
    scans: usize,
    ms_levels: BTreeMap<i16, usize>,
    average_full_scan_time: f32,
    srm_transitions: usize,
    ranges: SampleRanges,
    instrument: BTreeMap<String, String>,
}

impl FileSummary {
    fn from_outcome(path: &Path, outcome: &LoadOutcome) -> Self {
        let sample = &outcome.sample;
        Self {
            file: path.display().to_string(),
            name: sample.name.clone(),
            format: Format::from_path(path),
            complete: outcome.is_complete(),
            error: outcome.error.as_ref().map(|e| e.to_string()),
            blank: sample.is_blank,
            scans: sample.scan_count(),
            ms_levels: sample.ms_levels(),
            average_full_scan_time: sample.average_full_scan_time(),
            srm_transitions: sample.srm_index().len(),
            ranges: *sample.ranges(),
            instrument: sample.instrument_info().clone(),
        }
    }

    fn print(&self) {
        println!("{}", heading(&format!("{} ({})", self.name, self.format)));
        println!("  File: {}", self.file);
        if let Some(error) = &self.error {
            println!("  {}", caution(&format!("Incomplete: {}", error)));
        }
        if self.blank {
            println!("  Blank: yes");
        }
        println!("  Scans: {}", self.scans);
        for (level, count) in &self.ms_levels {
            println!("    MS{}: {}", level, count);
        }
        println!(
            "  Retention time: {:.3} - {:.3} min",
            self.ranges.min_rt, self.ranges.max_rt
        );
        println!("  m/z: {:.4} - {:.4}", self.ranges.min_mz, self.ranges.max_mz);
        println!(
            "  Intensity: {:.0} - {:.0} (total {:.3e})",
            self.ranges.min_intensity, self.ranges.max_intensity, self.ranges.total_intensity
        );
        if self.average_full_scan_time > 0.0 {
            println!(
                "  MS1 cycle time: {:.2} s",
                self.average_full_scan_time * 60.0
            );
        }
        if self.srm_transitions > 0 {
            println!("  SRM transitions: {}", self.srm_transitions);
        }
        if !self.instrument.is_empty() {
            println!("  Instrument:");
            for (key, value) in &self.instrument {
                println!("    {}: {}", key, value);
            }
        }
        println!();
    }
}

/// Summarise one or more files
pub fn run(loader: &Loader, files: &[PathBuf], json: bool) -> Result<()> {
    for file in files {
        if !file.exists() {
            anyhow::bail!("File does not exist: {}", file.display());
        }
    }

    let outcomes = loader.load_all(files);
    let summaries: Vec<FileSummary> = files
        .iter()
        .zip(&outcomes)
        .map(|(path, outcome)| FileSummary::from_outcome(path, outcome))
        .collect();

    if json {
        let text =
            serde_json::to_string_pretty(&summaries).context("Failed to serialize summary")?;
        println!("{}", text);
        return Ok(());
    }

    for summary in &summaries {
        summary.print();
    }

    if outcomes.len() > 1 {
        let samples: Vec<_> = outcomes.into_iter().map(|o| o.sample).collect();
        let extents = sample_extents(&samples);
        println!("{}", heading("All files"));
        println!(
            "  Retention time: {:.3} - {:.3} min",
            extents.rt_min, extents.rt_max
        );
        println!("  m/z: {:.4} - {:.4}", extents.mz_min, extents.mz_max);
    }

    Ok(())
}
