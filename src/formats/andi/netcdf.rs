//! [`AndiSource`] over a netCDF classic file, read with `netcdf3`
//!
//! ANDI-MS stores every scan's points back to back in two flat variables,
//! `mass_values` and `intensity_values`, with per-scan `scan_index` offsets,
//! `point_count` lengths and `scan_acquisition_time`. The file is read in
//! full when opened; records are then sliced out one scan at a time.

use std::fmt;
use std::path::Path;

use log::debug;
use netcdf3::{DataSet, DataVector, FileReader};

use super::{AndiHeader, AndiScanRecord, AndiSource, AxisValues, ExperimentType};
use crate::formats::DecodeError;
use crate::scan::Polarity;

const SCAN_TIME: &str = "scan_acquisition_time";
const SCAN_INDEX: &str = "scan_index";
const POINT_COUNT: &str = "point_count";
const SCAN_NUMBER: &str = "actual_scan_number";
const FLAG_COUNT: &str = "flag_count";
const MASS_VALUES: &str = "mass_values";
const INTENSITY_VALUES: &str = "intensity_values";
const INSTRUMENT_MFR: &str = "instrument_mfr";
const INSTRUMENT_MODEL: &str = "instrument_model";

/// Open `path` as an ANDI source. Matches [`AndiOpener`](super::AndiOpener).
pub fn open(path: &Path) -> Result<Box<dyn AndiSource>, DecodeError> {
    Ok(Box::new(NetcdfSource::open(path)?))
}

/// An ANDI-MS file loaded into memory
#[derive(Debug)]
pub struct NetcdfSource {
    header: AndiHeader,
    times: Vec<f64>,
    offsets: Vec<i64>,
    counts: Vec<i64>,
    scan_numbers: Vec<i64>,
    flags: Vec<i64>,
    masses: AxisValues,
    intensities: AxisValues,
    next: usize,
}

impl NetcdfSource {
    /// Read the header attributes and every per-scan variable of `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let vendor = |e| vendor_error(path, e);

        let mut reader = FileReader::open(path).map_err(vendor)?;
        let mut header = read_header(reader.data_set());
        header.manufacturer = reader.read_var(INSTRUMENT_MFR).ok().and_then(char_text);
        header.model = reader.read_var(INSTRUMENT_MODEL).ok().and_then(char_text);

        let times = floats(reader.read_var(SCAN_TIME).map_err(vendor)?);
        let counts = integers(reader.read_var(POINT_COUNT).map_err(vendor)?);
        let offsets = match reader.read_var(SCAN_INDEX) {
            Ok(data) => integers(data),
            Err(_) => running_offsets(&counts),
        };
        let scan_numbers = reader
            .read_var(SCAN_NUMBER)
            .map(integers)
            .unwrap_or_else(|_| (0..times.len() as i64).collect());
        let flags = reader.read_var(FLAG_COUNT).map(integers).unwrap_or_default();
        let masses = axis_values(reader.read_var(MASS_VALUES).map_err(vendor)?);
        let intensities = axis_values(reader.read_var(INTENSITY_VALUES).map_err(vendor)?);

        debug!(
            "{}: {} ANDI scans, {} points",
            path.display(),
            times.len(),
            masses.len()
        );

        Ok(Self {
            header,
            times,
            offsets,
            counts,
            scan_numbers,
            flags,
            masses,
            intensities,
            next: 0,
        })
    }
}

impl AndiSource for NetcdfSource {
    fn read_global_header(&mut self) -> Result<AndiHeader, DecodeError> {
        Ok(self.header.clone())
    }

    fn read_next_scan(&mut self) -> Result<Option<AndiScanRecord>, DecodeError> {
        let i = self.next;
        let (Some(&time), Some(&count)) = (self.times.get(i), self.counts.get(i)) else {
            return Ok(None);
        };
        self.next += 1;

        let start = self.offsets.get(i).copied().unwrap_or(0).max(0) as usize;
        let end = start + count.max(0) as usize;
        let (Some(masses), Some(intensities)) =
            (slice(&self.masses, start, end), slice(&self.intensities, start, end))
        else {
            return Err(DecodeError::Vendor(format!(
                "scan {} points {}..{} lie outside the point arrays",
                i, start, end
            )));
        };

        Ok(Some(AndiScanRecord {
            scan_number: self.scan_numbers.get(i).copied().unwrap_or(i as i64),
            acquisition_time: time,
            masses,
            intensities,
            flags: self.flags.get(i).copied().unwrap_or(0).max(0) as usize,
        }))
    }
}

fn vendor_error(path: &Path, err: impl fmt::Debug) -> DecodeError {
    DecodeError::Vendor(format!("{}: {:?}", path.display(), err))
}

fn read_header(data_set: &DataSet) -> AndiHeader {
    let experiment_type = data_set
        .get_global_attr_as_string("experiment_type")
        .map(|label| experiment_type_from_label(&label))
        .unwrap_or_default();
    let polarity = data_set
        .get_global_attr_as_string("test_ionization_polarity")
        .map(|label| polarity_from_label(&label))
        .unwrap_or(Polarity::Unknown);

    AndiHeader {
        experiment_type,
        mass_factor: var_attr(data_set, MASS_VALUES, "scale_factor").unwrap_or(1.0),
        intensity_factor: var_attr(data_set, INTENSITY_VALUES, "scale_factor").unwrap_or(1.0),
        intensity_offset: var_attr(data_set, INTENSITY_VALUES, "add_offset").unwrap_or(0.0),
        polarity,
        manufacturer: None,
        model: None,
    }
}

fn var_attr(data_set: &DataSet, var: &str, attr: &str) -> Option<f64> {
    data_set
        .get_var_attr_f64(var, attr)
        .and_then(|v| v.first().copied())
        .or_else(|| {
            data_set
                .get_var_attr_f32(var, attr)
                .and_then(|v| v.first().map(|&x| x as f64))
        })
}

/// "Centroided Mass Spectrum", "Continuum Mass Spectrum", ...
fn experiment_type_from_label(label: &str) -> ExperimentType {
    let label = label.to_ascii_lowercase();
    if label.contains("centroid") {
        ExperimentType::Centroid
    } else if label.contains("library") {
        ExperimentType::Library
    } else {
        ExperimentType::Continuum
    }
}

/// "Positive Polarity" / "Negative Polarity"
fn polarity_from_label(label: &str) -> Polarity {
    match label.trim_start().chars().next() {
        Some('P' | 'p' | '+') => Polarity::Positive,
        Some('N' | 'n' | '-') => Polarity::Negative,
        _ => Polarity::Unknown,
    }
}

/// First row of a char variable, up to the first NUL
fn char_text(data: DataVector) -> Option<String> {
    let DataVector::U8(bytes) = data else {
        return None;
    };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn running_offsets(counts: &[i64]) -> Vec<i64> {
    counts
        .iter()
        .scan(0i64, |next, &count| {
            let start = *next;
            *next += count.max(0);
            Some(start)
        })
        .collect()
}

fn axis_values(data: DataVector) -> AxisValues {
    match data {
        DataVector::I8(v) => AxisValues::Byte(v),
        DataVector::U8(v) => AxisValues::Short(v.into_iter().map(i16::from).collect()),
        DataVector::I16(v) => AxisValues::Short(v),
        DataVector::I32(v) => AxisValues::Long(v),
        DataVector::F32(v) => AxisValues::Float(v),
        DataVector::F64(v) => AxisValues::Double(v),
    }
}

fn integers(data: DataVector) -> Vec<i64> {
    match data {
        DataVector::I8(v) => v.into_iter().map(i64::from).collect(),
        DataVector::U8(v) => v.into_iter().map(i64::from).collect(),
        DataVector::I16(v) => v.into_iter().map(i64::from).collect(),
        DataVector::I32(v) => v.into_iter().map(i64::from).collect(),
        DataVector::F32(v) => v.into_iter().map(|x| x as i64).collect(),
        DataVector::F64(v) => v.into_iter().map(|x| x as i64).collect(),
    }
}

fn floats(data: DataVector) -> Vec<f64> {
    match data {
        DataVector::I8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::U8(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I16(v) => v.into_iter().map(f64::from).collect(),
        DataVector::I32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F32(v) => v.into_iter().map(f64::from).collect(),
        DataVector::F64(v) => v,
    }
}

fn slice(values: &AxisValues, start: usize, end: usize) -> Option<AxisValues> {
    Some(match values {
        AxisValues::Byte(v) => AxisValues::Byte(v.get(start..end)?.to_vec()),
        AxisValues::Short(v) => AxisValues::Short(v.get(start..end)?.to_vec()),
        AxisValues::Long(v) => AxisValues::Long(v.get(start..end)?.to_vec()),
        AxisValues::Float(v) => AxisValues::Float(v.get(start..end)?.to_vec()),
        AxisValues::Double(v) => AxisValues::Double(v.get(start..end)?.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterConfig;
    use crate::sample::SampleBuilder;
    use netcdf3::{FileWriter, Version};
    use tempfile::tempdir;

    fn write_andi(path: &Path, point_counts: &[i32]) {
        let mut data_set = DataSet::new();
        data_set.add_fixed_dim("scan_number", point_counts.len()).unwrap();
        data_set.add_fixed_dim("point_number", 3).unwrap();
        data_set.add_var_f64(SCAN_TIME, &["scan_number"]).unwrap();
        data_set.add_var_i32(SCAN_INDEX, &["scan_number"]).unwrap();
        data_set.add_var_i32(POINT_COUNT, &["scan_number"]).unwrap();
        data_set.add_var_i16(MASS_VALUES, &["point_number"]).unwrap();
        data_set.add_var_f32(INTENSITY_VALUES, &["point_number"]).unwrap();
        data_set
            .add_global_attr_string("experiment_type", "Centroided Mass Spectrum")
            .unwrap();
        data_set
            .add_global_attr_string("test_ionization_polarity", "Negative Polarity")
            .unwrap();

        let times: Vec<f64> = (1..=point_counts.len()).map(|i| i as f64 * 60.0).collect();
        let offsets = running_offsets(&point_counts.iter().map(|&c| c as i64).collect::<Vec<_>>());
        let offsets: Vec<i32> = offsets.into_iter().map(|o| o as i32).collect();

        let mut writer = FileWriter::open(path).unwrap();
        writer.set_def(&data_set, Version::Classic, 0).unwrap();
        writer.write_var_f64(SCAN_TIME, &times).unwrap();
        writer.write_var_i32(SCAN_INDEX, &offsets).unwrap();
        writer.write_var_i32(POINT_COUNT, point_counts).unwrap();
        writer.write_var_i16(MASS_VALUES, &[100, 200, 150]).unwrap();
        writer.write_var_f32(INTENSITY_VALUES, &[10.0, 20.0, 30.0]).unwrap();
        writer.close().unwrap();
    }

    fn load(path: &Path) -> crate::sample::Sample {
        let config = FilterConfig::default();
        let mut builder = SampleBuilder::new(&config);
        let mut source = NetcdfSource::open(path).unwrap();
        super::super::decode(&mut source, &mut builder).unwrap();
        builder.finish(path)
    }

    #[test]
    fn test_read_andi_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.cdf");
        write_andi(&path, &[2, 1]);

        let sample = load(&path);
        assert_eq!(sample.scan_count(), 2);
        let first = &sample.scans()[0];
        assert_eq!(first.rt, 1.0);
        assert_eq!(first.polarity, Polarity::Negative);
        assert!(first.centroided);
        assert_eq!(first.mz(), &[100.0, 200.0]);
        assert_eq!(first.intensity(), &[10.0, 20.0]);
        assert_eq!(sample.scans()[1].rt, 2.0);
        assert_eq!(sample.scans()[1].mz(), &[150.0]);
        assert_eq!(sample.instrument_info()["experimentType"], "Centroid");
    }

    #[test]
    fn test_zero_point_scan_ends_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.cdf");
        write_andi(&path, &[2, 0, 1]);

        let sample = load(&path);
        assert_eq!(sample.scan_count(), 1);
    }

    #[test]
    fn test_not_a_netcdf_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.cdf");
        std::fs::write(&path, b"not a netcdf file").unwrap();
        assert!(matches!(NetcdfSource::open(&path), Err(DecodeError::Vendor(_))));
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            experiment_type_from_label("Continuum Mass Spectrum"),
            ExperimentType::Continuum
        );
        assert_eq!(
            experiment_type_from_label("Library Mass Spectrum"),
            ExperimentType::Library
        );
        assert_eq!(polarity_from_label("Positive Polarity"), Polarity::Positive);
        assert_eq!(polarity_from_label(""), Polarity::Unknown);
        assert_eq!(running_offsets(&[2, 0, 3]), vec![0, 2, 2]);
        assert_eq!(
            char_text(DataVector::U8(b"Agilent\0\0\0".to_vec())),
            Some("Agilent".to_string())
        );
    }
}
