//! Streaming mzML decoder using quick-xml
//!
//! A run carries either a spectrum list (full scans, MS/MS) or, for SRM
//! acquisitions, a chromatogram list with one pre-extracted trace per
//! transition. Spectra are admitted in document order. Chromatogram traces
//! are exploded into one single-point MS2 scan per time point and admitted
//! after the whole list has been read, sorted by retention time.
//!
//! When a run contains spectra, its chromatograms (usually TIC/BPC
//! summaries) are ignored.

use std::io::BufRead;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::cv::{
    get_attribute, parse_cv_param, retention_time_minutes, text_content, CvParam,
    MS_CV_ACCESSIONS,
};
use super::DecodeError;
use crate::binary::{BinaryDecoder, BinaryEncoding, ByteOrder, CompressionType};
use crate::sample::SampleBuilder;
use crate::scan::{Polarity, Scan};

/// Selected ion m/z, used when a precursor has no isolation window
const SELECTED_ION_MZ: &str = "MS:1000744";

/// Decode an mzML document
pub fn decode<R: BufRead>(reader: R, builder: &mut SampleBuilder) -> Result<(), DecodeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut spectra_seen = 0usize;
    let mut instrument_seen = false;
    let mut traces: Vec<Scan> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"instrumentConfiguration" => {
                    let info = parse_instrument_configuration(&mut xml)?;
                    if !instrument_seen {
                        for (key, value) in info {
                            builder.set_instrument_info(key, value);
                        }
                        instrument_seen = true;
                    }
                }
                b"spectrum" => {
                    spectra_seen += 1;
                    match parse_spectrum(&mut xml, e)? {
                        Some(scan) => {
                            builder.admit(scan);
                        }
                        None => builder.skip_record("mzML spectrum without binary data arrays"),
                    }
                }
                b"chromatogram" => {
                    let scans = parse_chromatogram(&mut xml, e)?;
                    if spectra_seen == 0 {
                        traces.extend(scans);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"spectrum" {
                    spectra_seen += 1;
                    builder.skip_record("mzML spectrum without binary data arrays");
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if spectra_seen == 0 && !traces.is_empty() {
        // Traces arrive grouped by transition; the sample needs time order.
        traces.sort_by(|a, b| a.rt.total_cmp(&b.rt));
        debug!("Admitting {} chromatogram points in time order", traces.len());
        for scan in traces {
            builder.admit(scan);
        }
    }

    Ok(())
}

/// Kind of a binary data array
#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum ArrayKind {
    #[default]
    Other,
    Mz,
    Intensity,
    Time,
}

/// Binary data array being read
#[derive(Debug, Default)]
struct BinaryArrayContext {
    kind: ArrayKind,
    encoding: BinaryEncoding,
    compression: CompressionType,
    time_unit: Option<String>,
    base64_data: String,
}

impl BinaryArrayContext {
    fn apply_cv_param(&mut self, cv: &CvParam) {
        if let Some(encoding) = BinaryEncoding::from_cv_accession(&cv.accession) {
            self.encoding = encoding;
        } else if let Some(compression) = CompressionType::from_cv_accession(&cv.accession) {
            self.compression = compression;
        } else {
            match cv.accession.as_str() {
                MS_CV_ACCESSIONS::MZ_ARRAY => self.kind = ArrayKind::Mz,
                MS_CV_ACCESSIONS::INTENSITY_ARRAY => self.kind = ArrayKind::Intensity,
                MS_CV_ACCESSIONS::TIME_ARRAY => {
                    self.kind = ArrayKind::Time;
                    self.time_unit = cv.unit_accession.clone();
                }
                _ => {}
            }
        }
    }

    fn decode(&self) -> Vec<f32> {
        BinaryDecoder::decode(
            &self.base64_data,
            self.encoding,
            ByteOrder::Little,
            self.compression,
        )
    }
}

/// Where in the element tree the next cvParam belongs
#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Body,
    Precursor,
    PrecursorWindow,
    Product,
    ProductWindow,
    BinaryArray,
}

/// Accumulator for one spectrum or chromatogram element
#[derive(Debug)]
struct ElementState {
    section: Section,
    ms_level: i16,
    polarity: Polarity,
    rt: f32,
    precursor_mz: f32,
    selected_ion_mz: f32,
    product_mz: f32,
    collision_energy: f32,
    centroided: bool,
    filter_string: Option<String>,
    has_binary_list: bool,
    current_array: Option<BinaryArrayContext>,
    mz: Vec<f32>,
    intensity: Vec<f32>,
    time: Vec<f32>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            section: Section::Body,
            ms_level: 1,
            polarity: Polarity::Unknown,
            rt: 0.0,
            precursor_mz: 0.0,
            selected_ion_mz: 0.0,
            product_mz: 0.0,
            collision_energy: 0.0,
            centroided: false,
            filter_string: None,
            has_binary_list: false,
            current_array: None,
            mz: Vec::new(),
            intensity: Vec::new(),
            time: Vec::new(),
        }
    }
}

impl ElementState {
    fn open(&mut self, name: &[u8]) {
        match name {
            b"precursor" => self.section = Section::Precursor,
            b"product" => self.section = Section::Product,
            b"isolationWindow" => match self.section {
                Section::Precursor => self.section = Section::PrecursorWindow,
                Section::Product => self.section = Section::ProductWindow,
                _ => {}
            },
            b"binaryDataArrayList" => self.has_binary_list = true,
            b"binaryDataArray" => {
                self.section = Section::BinaryArray;
                self.current_array = Some(BinaryArrayContext::default());
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"precursor" | b"product" => self.section = Section::Body,
            b"isolationWindow" => match self.section {
                Section::PrecursorWindow => self.section = Section::Precursor,
                Section::ProductWindow => self.section = Section::Product,
                _ => {}
            },
            b"binaryDataArray" => {
                self.section = Section::Body;
                if let Some(ctx) = self.current_array.take() {
                    let values = ctx.decode();
                    match ctx.kind {
                        ArrayKind::Mz => self.mz = values,
                        ArrayKind::Intensity => self.intensity = values,
                        ArrayKind::Time => {
                            let unit = ctx.time_unit.as_deref();
                            self.time = values
                                .into_iter()
                                .map(|t| retention_time_minutes(t as f64, unit))
                                .collect();
                        }
                        ArrayKind::Other => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn apply_cv_param(&mut self, cv: &CvParam) {
        match self.section {
            Section::BinaryArray => {
                if let Some(ctx) = self.current_array.as_mut() {
                    ctx.apply_cv_param(cv);
                }
            }
            Section::PrecursorWindow => {
                if cv.accession == MS_CV_ACCESSIONS::ISOLATION_WINDOW_TARGET_MZ
                    && self.precursor_mz == 0.0
                {
                    self.precursor_mz = positive(cv);
                }
            }
            Section::ProductWindow => {
                if cv.accession == MS_CV_ACCESSIONS::ISOLATION_WINDOW_TARGET_MZ
                    && self.product_mz == 0.0
                {
                    self.product_mz = positive(cv);
                }
            }
            Section::Precursor => match cv.accession.as_str() {
                SELECTED_ION_MZ if self.selected_ion_mz == 0.0 => {
                    self.selected_ion_mz = positive(cv);
                }
                MS_CV_ACCESSIONS::COLLISION_ENERGY => {
                    self.collision_energy = cv.value_as_f32().unwrap_or(0.0);
                }
                _ => {}
            },
            Section::Product => {}
            Section::Body => match cv.accession.as_str() {
                MS_CV_ACCESSIONS::MS_LEVEL => {
                    self.ms_level = cv.value_as_i64().unwrap_or(1) as i16;
                }
                MS_CV_ACCESSIONS::POSITIVE_SCAN => self.polarity = Polarity::Positive,
                MS_CV_ACCESSIONS::NEGATIVE_SCAN => self.polarity = Polarity::Negative,
                MS_CV_ACCESSIONS::CENTROID_SPECTRUM => self.centroided = true,
                MS_CV_ACCESSIONS::PROFILE_SPECTRUM => self.centroided = false,
                MS_CV_ACCESSIONS::SCAN_START_TIME => {
                    if let Some(value) = cv.value_as_f64() {
                        self.rt = retention_time_minutes(value, cv.unit_accession.as_deref());
                    }
                }
                MS_CV_ACCESSIONS::FILTER_STRING => {
                    self.filter_string = cv.value.clone().filter(|v| !v.is_empty());
                }
                _ => {}
            },
        }
    }

    fn append_text(&mut self, text: &str) {
        if let Some(ctx) = self.current_array.as_mut() {
            ctx.base64_data.push_str(text);
        }
    }

    fn precursor(&self) -> f32 {
        if self.precursor_mz > 0.0 {
            self.precursor_mz
        } else {
            self.selected_ion_mz
        }
    }
}

fn positive(cv: &CvParam) -> f32 {
    cv.value_as_f32().filter(|v| *v > 0.0).unwrap_or(0.0)
}

/// Read events up to the matching end tag of `element`, feeding them to
/// the accumulator
fn read_element<R: BufRead>(
    xml: &mut Reader<R>,
    element: &[u8],
    state: &mut ElementState,
) -> Result<(), DecodeError> {
    let mut depth = 1;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                if e.name().as_ref() == b"cvParam" {
                    state.apply_cv_param(&parse_cv_param(e));
                } else {
                    state.open(e.name().as_ref());
                }
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"cvParam" => state.apply_cv_param(&parse_cv_param(e)),
                b"binaryDataArrayList" => state.has_binary_list = true,
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                state.append_text(&text_content(t));
            }
            Ok(Event::End(ref e)) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == element {
                    break;
                }
                state.close(e.name().as_ref());
            }
            Ok(Event::Eof) => {
                return Err(DecodeError::InvalidStructure(format!(
                    "Unexpected EOF in {}",
                    String::from_utf8_lossy(element)
                )));
            }
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Parse a single spectrum element. Returns `None` for spectra without a
/// binary data array list.
fn parse_spectrum<R: BufRead>(
    xml: &mut Reader<R>,
    start_event: &BytesStart,
) -> Result<Option<Scan>, DecodeError> {
    let id = get_attribute(start_event, "id").unwrap_or_default();

    let mut state = ElementState::default();
    read_element(xml, b"spectrum", &mut state)?;

    if !state.has_binary_list {
        return Ok(None);
    }

    let mut scan = Scan::new(state.ms_level, state.rt, state.precursor(), state.polarity);
    scan.product_mz = state.product_mz;
    scan.collision_energy = state.collision_energy;
    scan.centroided = state.centroided;
    scan.filter_line = state.filter_string.take().unwrap_or(id);
    scan.set_peaks(std::mem::take(&mut state.mz), std::mem::take(&mut state.intensity));
    Ok(Some(scan))
}

/// Parse a single chromatogram element into one MS2 scan per time point.
///
/// Traces without both a precursor and a product m/z are not SRM
/// transitions and yield no scans.
fn parse_chromatogram<R: BufRead>(
    xml: &mut Reader<R>,
    start_event: &BytesStart,
) -> Result<Vec<Scan>, DecodeError> {
    let id = get_attribute(start_event, "id").unwrap_or_default();

    let mut state = ElementState::default();
    read_element(xml, b"chromatogram", &mut state)?;

    let precursor_mz = state.precursor();
    if precursor_mz == 0.0 || state.product_mz == 0.0 {
        debug!("Skipping chromatogram '{}': not an SRM transition", id);
        return Ok(Vec::new());
    }

    let scans = state
        .time
        .iter()
        .zip(&state.intensity)
        .map(|(&rt, &intensity)| {
            let mut scan = Scan::new(2, rt, precursor_mz, state.polarity);
            scan.product_mz = state.product_mz;
            scan.collision_energy = state.collision_energy;
            scan.filter_line = id.clone();
            scan.centroided = true;
            scan.with_peaks(vec![state.product_mz], vec![intensity])
        })
        .collect();
    Ok(scans)
}

/// Read the first component of each kind from an instrumentConfiguration
fn parse_instrument_configuration<R: BufRead>(
    xml: &mut Reader<R>,
) -> Result<Vec<(&'static str, String)>, DecodeError> {
    let mut info: Vec<(&'static str, String)> = Vec::new();
    let mut component: Option<&'static str> = None;
    let mut depth = 1;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                component = match e.name().as_ref() {
                    b"source" => Some("msIonisation"),
                    b"analyzer" => Some("msMassAnalyzer"),
                    b"detector" => Some("msDetector"),
                    _ => component,
                };
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"cvParam" {
                    let cv = parse_cv_param(e);
                    // Direct children name the instrument model
                    let key = if depth == 1 { Some("msModel") } else { component };
                    if let Some(key) = key {
                        if !info.iter().any(|(k, _)| *k == key) {
                            let value = match cv.value {
                                Some(v) if !v.is_empty() => v,
                                _ => cv.name,
                            };
                            info.push((key, value));
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                depth -= 1;
                match e.name().as_ref() {
                    b"instrumentConfiguration" if depth == 0 => break,
                    b"source" | b"analyzer" | b"detector" => component = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => {
                return Err(DecodeError::InvalidStructure(
                    "Unexpected EOF in instrumentConfiguration".to_string(),
                ));
            }
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(info)
}
