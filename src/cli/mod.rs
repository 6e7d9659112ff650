use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::warn;
use std::path::{Path, PathBuf};

use mzextract::filter::FilterConfig;
use mzextract::sample::{Loader, Sample};
use mzextract::scan::Polarity;

mod config;
mod export;
mod extract;
mod info;

use config::Config;

/// mzextract - mass spectrometry ingestion and chromatogram extraction
#[derive(Parser)]
#[command(name = "mzextract")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Ingestion filters, shared by every command
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Load filter settings from a TOML config file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Drop points below this intensity
    #[arg(long, global = true)]
    min_intensity: Option<f32>,

    /// Centroid every scan while loading
    #[arg(long, global = true)]
    centroid: bool,

    /// Drop points at or below this per-scan intensity percentile
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=100))]
    intensity_quantile: Option<u8>,

    /// Only load scans of this MS level
    #[arg(long, global = true)]
    only_ms_level: Option<i16>,

    /// Only load scans of this polarity
    #[arg(long, global = true, value_enum)]
    only_polarity: Option<PolarityArg>,
}

impl FilterArgs {
    /// Config file values, overridden by any flag given
    pub fn resolve(&self) -> Result<FilterConfig> {
        let mut filters = match &self.config {
            Some(path) => Config::from_file(path)?.filters,
            None => FilterConfig::default(),
        };
        if let Some(min_intensity) = self.min_intensity {
            filters.min_intensity = Some(min_intensity);
        }
        if self.centroid {
            filters.centroid_scans = true;
        }
        if let Some(quantile) = self.intensity_quantile {
            filters.intensity_quantile = quantile;
        }
        if let Some(level) = self.only_ms_level {
            filters.ms_level = Some(level);
        }
        if let Some(polarity) = self.only_polarity {
            filters.polarity = Some(polarity.into());
        }
        Ok(filters)
    }
}

/// Ion polarity argument
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolarityArg {
    /// Positive ion mode
    Positive,
    /// Negative ion mode
    Negative,
}

impl From<PolarityArg> for Polarity {
    fn from(arg: PolarityArg) -> Self {
        match arg {
            PolarityArg::Positive => Polarity::Positive,
            PolarityArg::Negative => Polarity::Negative,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise one or more files
    Info {
        /// Input files
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print the summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract an ion chromatogram (m/z range or SRM transition) as CSV
    Eic {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Lower m/z bound
        #[arg(long, requires = "mz_max")]
        mz_min: Option<f32>,

        /// Upper m/z bound
        #[arg(long, requires = "mz_min")]
        mz_max: Option<f32>,

        /// SRM transition identifier (filter line)
        #[arg(long, conflicts_with_all = ["mz_min", "precursor"])]
        srm: Option<String>,

        /// SRM precursor (Q1) m/z
        #[arg(long, conflicts_with = "mz_min")]
        precursor: Option<f32>,

        /// SRM product (Q3) m/z
        #[arg(long, requires = "precursor")]
        product: Option<f32>,

        /// SRM collision energy (reported, not matched)
        #[arg(long, default_value_t = 0.0)]
        collision_energy: f32,

        /// Start of the retention time window (minutes)
        #[arg(long, default_value_t = 0.0)]
        rt_min: f32,

        /// End of the retention time window (minutes)
        #[arg(long, default_value_t = f32::MAX)]
        rt_max: f32,

        /// MS level of an m/z range trace
        #[arg(long, default_value_t = 1)]
        ms_level: i16,

        /// Output CSV path (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Extract the total ion chromatogram as CSV
    Tic {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Start of the retention time window (minutes)
        #[arg(long, default_value_t = 0.0)]
        rt_min: f32,

        /// End of the retention time window (minutes)
        #[arg(long, default_value_t = f32::MAX)]
        rt_max: f32,

        /// MS level to sum
        #[arg(long, default_value_t = 1)]
        ms_level: i16,

        /// Output CSV path (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Average the spectra of a retention time window, as CSV
    Average {
        /// Input file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Start of the retention time window (minutes)
        #[arg(long)]
        rt_min: f32,

        /// End of the retention time window (minutes)
        #[arg(long)]
        rt_max: f32,

        /// MS level to average
        #[arg(long, default_value_t = 1)]
        ms_level: i16,

        /// Polarity of the scans to average
        #[arg(long, value_enum, default_value = "positive")]
        polarity: PolarityArg,

        /// m/z bins per unit (100 bins at 0.01)
        #[arg(long, default_value_t = 100.0)]
        resolution: f32,

        /// Output CSV path (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Convert a file to mzCSV
    Export {
        /// Input file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output mzCSV path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    let loader = Loader::new(cli.filters.resolve()?);
    #[cfg(feature = "netcdf")]
    let loader = loader.with_andi_opener(mzextract::formats::andi::netcdf::open);

    match cli.command {
        Commands::Info { files, json } => info::run(&loader, &files, json),
        Commands::Eic {
            file,
            mz_min,
            mz_max,
            srm,
            precursor,
            product,
            collision_energy,
            rt_min,
            rt_max,
            ms_level,
            output,
        } => {
            let sample = load_sample(&loader, &file)?;
            let query = match (srm, precursor, mz_min.zip(mz_max)) {
                (Some(id), _, _) => extract::TraceQuery::SrmId(id),
                (None, Some(precursor), _) => extract::TraceQuery::SrmTransition {
                    precursor,
                    collision_energy,
                    product: product.unwrap_or(0.0),
                },
                (None, None, Some((mz_min, mz_max))) => extract::TraceQuery::MzRange {
                    mz_min,
                    mz_max,
                    rt_min,
                    rt_max,
                    ms_level,
                },
                (None, None, None) => {
                    anyhow::bail!("eic needs --mz-min/--mz-max, --srm, or --precursor")
                }
            };
            extract::run_eic(&sample, &query, output.as_deref())
        }
        Commands::Tic {
            file,
            rt_min,
            rt_max,
            ms_level,
            output,
        } => {
            let sample = load_sample(&loader, &file)?;
            extract::run_tic(&sample, rt_min, rt_max, ms_level, output.as_deref())
        }
        Commands::Average {
            file,
            rt_min,
            rt_max,
            ms_level,
            polarity,
            resolution,
            output,
        } => {
            let sample = load_sample(&loader, &file)?;
            extract::run_average(
                &sample,
                rt_min,
                rt_max,
                ms_level,
                polarity.into(),
                resolution,
                output.as_deref(),
            )
        }
        Commands::Export { input, output } => {
            let sample = load_sample(&loader, &input)?;
            export::run(&sample, &output)
        }
    }
}

/// Load one file for a single-file command.
///
/// A failure after some scans were read keeps the partial sample; a failure
/// with nothing read is an error.
fn load_sample(loader: &Loader, path: &Path) -> Result<Sample> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    let outcome = loader.load(path);
    match outcome.error {
        Some(e) if outcome.sample.is_empty() => {
            Err(e).with_context(|| format!("Failed to load {}", path.display()))
        }
        Some(e) => {
            warn!(
                "Using {} scans read from {} before: {}",
                outcome.sample.scan_count(),
                path.display(),
                e
            );
            Ok(outcome.sample)
        }
        None => Ok(outcome.sample),
    }
}

/// Style a section heading
pub(crate) fn heading(text: &str) -> String {
    #[cfg(feature = "colorized_output")]
    {
        console::style(text).bold().cyan().to_string()
    }
    #[cfg(not(feature = "colorized_output"))]
    {
        text.to_string()
    }
}

/// Style a warning line
pub(crate) fn caution(text: &str) -> String {
    #[cfg(feature = "colorized_output")]
    {
        console::style(text).yellow().to_string()
    }
    #[cfg(not(feature = "colorized_output"))]
    {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mzextract.toml");
        std::fs::write(
            &path,
            "[filters]\nmin_intensity = 100.0\nms_level = 1\n",
        )
        .unwrap();

        let args = FilterArgs {
            config: Some(path),
            min_intensity: Some(500.0),
            only_polarity: Some(PolarityArg::Negative),
            ..Default::default()
        };
        let filters = args.resolve().unwrap();
        assert_eq!(filters.min_intensity, Some(500.0));
        assert_eq!(filters.ms_level, Some(1));
        assert_eq!(filters.polarity, Some(Polarity::Negative));
        assert!(!filters.centroid_scans);
    }

    #[test]
    fn test_parse_eic_command() {
        let cli = Cli::try_parse_from([
            "mzextract",
            "-vv",
            "--min-intensity",
            "10",
            "eic",
            "run.mzXML",
            "--mz-min",
            "100",
            "--mz-max",
            "101",
        ])
        .unwrap();
        assert_eq!(cli.verbosity(), 2);
        assert_eq!(cli.filters.min_intensity, Some(10.0));
        assert!(matches!(cli.command, Commands::Eic { mz_min: Some(_), .. }));
    }

    #[test]
    fn test_srm_conflicts_with_mz_range() {
        let result = Cli::try_parse_from([
            "mzextract", "eic", "run.mzML", "--srm", "t1", "--mz-min", "1", "--mz-max", "2",
        ]);
        assert!(result.is_err());
    }
}
