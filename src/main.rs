//! # mzextract
//!
//! Command-line front end: inspect raw LC-MS files and extract
//! chromatograms from them.
//!
//! ## Usage
//!
//! ```bash
//! # Summarise one or more files
//! mzextract info run01.mzXML run02.mzML --json
//!
//! # Extracted ion chromatogram, written as CSV
//! mzextract eic run01.mzXML --mz-min 180.05 --mz-max 180.07 -o eic.csv
//!
//! # SRM transition trace
//! mzextract eic run03.mzML --srm "SRM SIC Q1=300 Q3=150"
//!
//! # Convert to mzCSV, dropping points below 1000 counts
//! mzextract --min-intensity 1000 export run01.mzXML run01.mzCSV
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
