//! ANDI-MS (netCDF) decoding
//!
//! The container itself is read by an external toolkit exposed through
//! [`AndiSource`]: one global header, then per-scan records in order. This
//! module turns those records into scans: typed axis values are widened to
//! floating point and scaled by the header's factors, acquisition times are
//! converted to minutes, and the first scan with no points ends the data.
//!
//! A reader is registered on the [`Loader`](crate::sample::Loader) with
//! [`Loader::with_andi_opener`](crate::sample::Loader::with_andi_opener);
//! without one, ANDI files fail to load with
//! [`DecodeError::MissingReader`]. With the `netcdf` feature,
//! [`netcdf::open`] reads netCDF classic files directly.

use std::path::Path;
use std::sync::Arc;

use log::debug;

use super::DecodeError;
use crate::sample::SampleBuilder;
use crate::scan::{Polarity, Scan};

#[cfg(feature = "netcdf")]
pub mod netcdf;

/// Sentinel the ANDI toolkit uses for unset floating point attributes
pub const ANDI_NULL_FLOAT: f64 = -9999.0;

/// Opens an ANDI file and returns its record source
pub type AndiOpener =
    Arc<dyn Fn(&Path) -> Result<Box<dyn AndiSource>, DecodeError> + Send + Sync>;

/// Sequential access to an open ANDI container.
///
/// Dropping the source closes the file.
pub trait AndiSource {
    /// Read the global header. Called once, before any scan.
    fn read_global_header(&mut self) -> Result<AndiHeader, DecodeError>;

    /// Read the next scan record, `None` once all scans were read
    fn read_next_scan(&mut self) -> Result<Option<AndiScanRecord>, DecodeError>;
}

/// Acquisition mode recorded in the ANDI admin data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExperimentType {
    /// Centroided spectra
    Centroid,
    /// Profile spectra
    #[default]
    Continuum,
    /// Library spectra
    Library,
    /// Any other code
    Other(i32),
}

impl ExperimentType {
    /// Map the numeric ANDI experiment code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExperimentType::Centroid,
            1 => ExperimentType::Continuum,
            2 => ExperimentType::Library,
            other => ExperimentType::Other(other),
        }
    }

    fn label(&self) -> String {
        match self {
            ExperimentType::Centroid => "Centroid".to_string(),
            ExperimentType::Continuum => "Continuum".to_string(),
            ExperimentType::Library => "Library".to_string(),
            ExperimentType::Other(code) => format!("Unknown ({})", code),
        }
    }
}

/// File-level information from the ANDI global header
#[derive(Debug, Clone, PartialEq)]
pub struct AndiHeader {
    /// Centroid vs profile, for every scan of the file
    pub experiment_type: ExperimentType,
    /// Multiplier applied to every mass value
    pub mass_factor: f64,
    /// Multiplier applied to every intensity value
    pub intensity_factor: f64,
    /// Offset added to every scaled intensity
    pub intensity_offset: f64,
    /// Ionization mode of the run
    pub polarity: Polarity,
    /// Instrument manufacturer, if recorded
    pub manufacturer: Option<String>,
    /// Instrument model, if recorded
    pub model: Option<String>,
}

impl Default for AndiHeader {
    fn default() -> Self {
        Self {
            experiment_type: ExperimentType::default(),
            mass_factor: 1.0,
            intensity_factor: 1.0,
            intensity_offset: 0.0,
            polarity: Polarity::Unknown,
            manufacturer: None,
            model: None,
        }
    }
}

impl AndiHeader {
    /// Replace unset scale factors with identity values
    pub fn normalized(mut self) -> Self {
        let is_null = |v: f64| v as i64 == ANDI_NULL_FLOAT as i64 || !v.is_finite();
        if is_null(self.mass_factor) {
            self.mass_factor = 1.0;
        }
        if is_null(self.intensity_factor) {
            self.intensity_factor = 1.0;
        }
        if is_null(self.intensity_offset) {
            self.intensity_offset = 0.0;
        }
        self
    }
}

/// Axis values in the storage type declared by the file
#[derive(Debug, Clone, PartialEq)]
pub enum AxisValues {
    /// 8-bit integers
    Byte(Vec<i8>),
    /// 16-bit integers
    Short(Vec<i16>),
    /// 32-bit integers
    Long(Vec<i32>),
    /// 32-bit floats
    Float(Vec<f32>),
    /// 64-bit floats
    Double(Vec<f64>),
}

impl AxisValues {
    /// Number of values
    pub fn len(&self) -> usize {
        match self {
            AxisValues::Byte(v) => v.len(),
            AxisValues::Short(v) => v.len(),
            AxisValues::Long(v) => v.len(),
            AxisValues::Float(v) => v.len(),
            AxisValues::Double(v) => v.len(),
        }
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen to f64 and apply `value * factor + offset`
    pub fn scaled(&self, factor: f64, offset: f64) -> Vec<f32> {
        fn map<T: Copy + Into<f64>>(values: &[T], factor: f64, offset: f64) -> Vec<f32> {
            values
                .iter()
                .map(|&v| (v.into() * factor + offset) as f32)
                .collect()
        }
        match self {
            AxisValues::Byte(v) => map(v, factor, offset),
            AxisValues::Short(v) => map(v, factor, offset),
            AxisValues::Long(v) => map(v, factor, offset),
            AxisValues::Float(v) => map(v, factor, offset),
            AxisValues::Double(v) => map(v, factor, offset),
        }
    }
}

/// One per-scan record
#[derive(Debug, Clone, PartialEq)]
pub struct AndiScanRecord {
    /// Scan number reported by the file
    pub scan_number: i64,
    /// Acquisition time in seconds
    pub acquisition_time: f64,
    /// Mass axis
    pub masses: AxisValues,
    /// Intensity axis
    pub intensities: AxisValues,
    /// Number of point flags set on the scan (ignored)
    pub flags: usize,
}

impl AndiScanRecord {
    /// Number of complete (mass, intensity) points
    pub fn points(&self) -> usize {
        self.masses.len().min(self.intensities.len())
    }
}

/// Decode every scan of an open ANDI container
pub fn decode(source: &mut dyn AndiSource, builder: &mut SampleBuilder) -> Result<(), DecodeError> {
    let header = source.read_global_header()?.normalized();
    debug!("ANDI header: {:?}", header);

    if let Some(manufacturer) = &header.manufacturer {
        builder.set_instrument_info("msManufacturer", manufacturer.as_str());
    }
    if let Some(model) = &header.model {
        builder.set_instrument_info("msModel", model.as_str());
    }
    builder.set_instrument_info("experimentType", header.experiment_type.label());

    let centroided = header.experiment_type == ExperimentType::Centroid;

    while let Some(record) = source.read_next_scan()? {
        if record.points() == 0 {
            debug!("ANDI scan {} has no points, end of data", record.scan_number);
            break;
        }
        if record.flags > 0 {
            debug!(
                "ANDI scan {} has {} flagged points (ignored)",
                record.scan_number, record.flags
            );
        }

        let mz = record.masses.scaled(header.mass_factor, 0.0);
        let intensity = record
            .intensities
            .scaled(header.intensity_factor, header.intensity_offset);

        let mut scan = Scan::new(
            1,
            (record.acquisition_time / 60.0) as f32,
            0.0,
            header.polarity,
        );
        scan.centroided = centroided;
        scan.set_peaks(mz, intensity);
        builder.admit(scan);
    }

    Ok(())
}
