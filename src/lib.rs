//! # mzextract - mass spectrometry ingestion and chromatogram extraction
//!
//! `mzextract` loads raw LC-MS acquisitions from several file formats into
//! one in-memory sample model and extracts chromatographic traces from it:
//! extracted ion chromatograms (EIC), SRM transition traces, total ion
//! chromatograms (TIC), averaged spectra, and intensity statistics.
//!
//! ## Supported Input Formats
//!
//! | Format | Detected by | Notes |
//! |--------|-------------|-------|
//! | mzCSV | `mzcsv` in the file name | one row per point, grouped by scan number |
//! | mzData | `mzdata`, and any unrecognised name | legacy PSI XML |
//! | mzXML | `mzxml` | nested MS/MS scans, interleaved peak pairs |
//! | mzML | `mzml` | spectrum lists and SRM chromatogram lists |
//! | ANDI-MS | `cdf` | netCDF container read through [`formats::andi::AndiSource`], built in with the `netcdf` feature |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mzextract::prelude::*;
//!
//! let config = FilterConfig {
//!     min_intensity: Some(500.0),
//!     ..Default::default()
//! };
//! let loader = Loader::new(config);
//!
//! let sample = loader.load("run01.mzXML").into_result()?;
//! println!("{}: {} scans", sample.name, sample.scan_count());
//!
//! // Extracted ion chromatogram for m/z 180.0634 +/- 5 ppm, MS1, whole run
//! let tol = 180.0634 * 5e-6;
//! let eic = sample.eic(180.0634 - tol, 180.0634 + tol, 0.0, f32::MAX, 1);
//! println!("max intensity {}", eic.max_intensity());
//! # Ok::<(), mzextract::formats::DecodeError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`binary`]: Base64 binary array codec (precision, byte order, zlib)
//! - [`scan`]: one spectrum and its in-place transforms
//! - [`filter`]: the ingestion filter pipeline configuration
//! - [`formats`]: format sniffing and one decoder per format
//! - [`sample`]: sample model, loading, ranges, SRM index
//! - [`extract`]: trace extraction and aggregate queries
//! - [`stats`]: quantiles and correlation

// Documentation lints - enforce complete documentation for publication
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
// Allow some patterns common in scientific code
#![allow(clippy::too_many_arguments)]

pub mod binary;
pub mod extract;
pub mod filter;
pub mod formats;
pub mod sample;
pub mod scan;
pub mod stats;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::binary::{BinaryDecoder, BinaryEncoding, ByteOrder, CompressionType};
    pub use crate::extract::{Eic, EicPoint, SrmQuery};
    pub use crate::filter::FilterConfig;
    pub use crate::formats::andi::{AndiHeader, AndiScanRecord, AndiSource};
    pub use crate::formats::mzcsv::write_mzcsv;
    pub use crate::formats::{DecodeError, Format};
    pub use crate::sample::{
        max_retention_time, sample_extents, LoadOutcome, Loader, Sample, SampleBuilder,
        SampleExtents, SampleRanges,
    };
    pub use crate::scan::{Polarity, Scan};
}
