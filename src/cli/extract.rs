use anyhow::{Context, Result};
use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use mzextract::extract::{Eic, SrmQuery};
use mzextract::sample::Sample;
use mzextract::scan::Polarity;

/// Which trace the eic command builds
pub enum TraceQuery {
    /// Most intense point per scan in an m/z window
    MzRange {
        mz_min: f32,
        mz_max: f32,
        rt_min: f32,
        rt_max: f32,
        ms_level: i16,
    },
    /// Transition identifier lookup
    SrmId(String),
    /// Precursor/product m/z match
    SrmTransition {
        precursor: f32,
        collision_energy: f32,
        product: f32,
    },
}

fn open_output(output: Option<&Path>) -> Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    Ok(csv::Writer::from_writer(sink))
}

fn write_trace(eic: &Eic<'_>, output: Option<&Path>) -> Result<()> {
    let mut writer = open_output(output)?;
    for point in eic.points() {
        writer.serialize(point).context("Failed to write trace")?;
    }
    writer.flush()?;

    info!(
        "{}: {} points, max intensity {:.0}, total {:.0}",
        eic.sample().name,
        eic.len(),
        eic.max_intensity(),
        eic.total_intensity()
    );
    Ok(())
}

/// Extract an ion chromatogram
pub fn run_eic(sample: &Sample, query: &TraceQuery, output: Option<&Path>) -> Result<()> {
    let eic = match query {
        TraceQuery::MzRange {
            mz_min,
            mz_max,
            rt_min,
            rt_max,
            ms_level,
        } => sample.eic(*mz_min, *mz_max, *rt_min, *rt_max, *ms_level),
        TraceQuery::SrmId(id) => sample.srm_eic_by_id(id),
        TraceQuery::SrmTransition {
            precursor,
            collision_energy,
            product,
        } => sample.srm_eic(&SrmQuery::new(*precursor, *collision_energy, *product)),
    };
    if eic.is_empty() {
        eprintln!("{}", super::caution("No scans matched; the trace is empty"));
    }
    write_trace(&eic, output)
}

/// Extract the total ion chromatogram
pub fn run_tic(
    sample: &Sample,
    rt_min: f32,
    rt_max: f32,
    ms_level: i16,
    output: Option<&Path>,
) -> Result<()> {
    write_trace(&sample.tic(rt_min, rt_max, ms_level), output)
}

/// Average the spectra of a retention time window
pub fn run_average(
    sample: &Sample,
    rt_min: f32,
    rt_max: f32,
    ms_level: i16,
    polarity: Polarity,
    resolution: f32,
    output: Option<&Path>,
) -> Result<()> {
    let average = sample.average_scan(rt_min, rt_max, ms_level, polarity, resolution);
    let mut writer = open_output(output)?;
    writer.write_record(["mz", "intensity"])?;
    for (mz, intensity) in average.peaks() {
        writer.write_record([mz.to_string(), intensity.to_string()])?;
    }
    writer.flush()?;

    info!(
        "Averaged spectrum at {:.2} min: {} points",
        average.rt,
        average.nobs()
    );
    Ok(())
}
