//! Format decoders
//!
//! Each supported container has one decoder that turns the file into a
//! stream of [`Scan`](crate::scan::Scan)s handed to a
//! [`SampleBuilder`]:
//!
//! - [`mzcsv`] - delimited-text scan dump (also the export format)
//! - [`mzml`] - HUPO-PSI mzML, spectrum list or SRM chromatogram list
//! - [`mzdata`] - legacy PSI mzData
//! - [`mzxml`] - legacy ISB mzXML
//! - [`andi`] - ANDI-MS / netCDF, through an external reader
//!
//! The format is picked from the file name alone by [`Format::from_path`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;

use crate::sample::SampleBuilder;

pub mod andi;
pub mod cv;
pub mod mzcsv;
pub mod mzdata;
pub mod mzml;
pub mod mzxml;

use andi::AndiOpener;

/// Read buffer used when opening files
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 1 << 16;

/// Supported input containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    /// Delimited-text scan dump
    MzCsv,
    /// PSI mzData
    MzData,
    /// ISB mzXML
    MzXml,
    /// HUPO-PSI mzML
    MzMl,
    /// ANDI-MS (netCDF)
    Cdf,
}

impl Format {
    /// Pick the decoder for a file name.
    ///
    /// Case-insensitive substring match, checked in the order mzcsv, mzdata,
    /// mzxml, mzml, cdf. Anything else is read as mzData.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let name = path.as_ref().to_string_lossy().to_ascii_lowercase();
        const PATTERNS: [(&str, Format); 5] = [
            ("mzcsv", Format::MzCsv),
            ("mzdata", Format::MzData),
            ("mzxml", Format::MzXml),
            ("mzml", Format::MzMl),
            ("cdf", Format::Cdf),
        ];
        PATTERNS
            .iter()
            .find(|(pattern, _)| name.contains(pattern))
            .map(|&(_, format)| format)
            .unwrap_or(Format::MzData)
    }

    /// Decode the file at `path`, admitting scans into `builder`.
    ///
    /// Scans admitted before a failure stay in the builder.
    pub fn decode(
        &self,
        path: &Path,
        builder: &mut SampleBuilder,
        andi_opener: Option<&AndiOpener>,
    ) -> Result<(), DecodeError> {
        match self {
            Format::Cdf => {
                let opener = andi_opener.ok_or_else(|| {
                    DecodeError::MissingReader(format!(
                        "no ANDI/netCDF reader registered for {}",
                        path.display()
                    ))
                })?;
                let mut source = opener(path)?;
                andi::decode(source.as_mut(), builder)
            }
            Format::MzCsv => mzcsv::decode(open(path)?, builder),
            Format::MzData => mzdata::decode(open(path)?, builder),
            Format::MzXml => mzxml::decode(open(path)?, builder),
            Format::MzMl => mzml::decode(open(path)?, builder),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Format::MzCsv => "mzCSV",
            Format::MzData => "mzData",
            Format::MzXml => "mzXML",
            Format::MzMl => "mzML",
            Format::Cdf => "ANDI/netCDF",
        };
        f.write_str(label)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, DecodeError> {
    let file = File::open(path)?;
    Ok(BufReader::with_capacity(DEFAULT_INPUT_BUFFER_SIZE, file))
}

/// Errors that abort decoding of one file
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing XML
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error reading delimited text
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// UTF-8 encoding error in text content
    #[error("UTF-8 encoding error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Document structure the decoder cannot follow
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// No reader is available for a vendor container
    #[error("Missing reader: {0}")]
    MissingReader(String),

    /// The vendor reader reported a failure
    #[error("Vendor reader error: {0}")]
    Vendor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path("run01.mzML"), Format::MzMl);
        assert_eq!(Format::from_path("/data/RUN01.MZXML"), Format::MzXml);
        assert_eq!(Format::from_path("dump.mzcsv"), Format::MzCsv);
        assert_eq!(Format::from_path("legacy.mzData"), Format::MzData);
        assert_eq!(Format::from_path("gc_run.CDF"), Format::Cdf);
        assert_eq!(Format::from_path("unknown.xml"), Format::MzData);
    }

    #[test]
    fn test_format_sniff_order() {
        // "mzxml" is checked before "mzml" and would also match a directory
        assert_eq!(Format::from_path("mzxml_exports/run.mzML"), Format::MzXml);
        assert_eq!(Format::from_path("run.mzML.mzcsv"), Format::MzCsv);
    }

    #[test]
    fn test_cdf_without_reader() {
        let config = crate::filter::FilterConfig::default();
        let mut builder = SampleBuilder::new(&config);
        let err = Format::Cdf
            .decode(Path::new("missing.cdf"), &mut builder, None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingReader(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let config = crate::filter::FilterConfig::default();
        let mut builder = SampleBuilder::new(&config);
        let err = Format::MzMl
            .decode(Path::new("/nonexistent/run.mzML"), &mut builder, None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
