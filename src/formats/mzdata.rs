//! Legacy PSI mzData decoder
//!
//! Acquisition settings live under
//! `spectrumDesc/spectrumSettings/spectrumInstrument`: the MS level as an
//! attribute, retention time and polarity as cvParams matched by name
//! (accessions are not reliable in this dialect). Peaks are two separate
//! Base64 arrays, `mzArrayBinary/data` and `intenArrayBinary/data`, each
//! with its own precision and byte order.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::cv::{get_attribute, parse_cv_param, text_content, CvParam};
use super::DecodeError;
use crate::binary::{BinaryDecoder, BinaryEncoding, ByteOrder, CompressionType};
use crate::sample::SampleBuilder;
use crate::scan::{Polarity, Scan};

/// Decode an mzData document
pub fn decode<R: BufRead>(reader: R, builder: &mut SampleBuilder) -> Result<(), DecodeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut in_instrument_name = false;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"instrumentName" => in_instrument_name = true,
                b"spectrum" => {
                    let scan = parse_spectrum(&mut xml)?;
                    builder.admit(scan);
                }
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if in_instrument_name {
                    builder.set_instrument_info("msModel", text_content(t).trim());
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"instrumentName" {
                    in_instrument_name = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Which peak array a `data` element belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
enum PeakArray {
    Mz,
    Intensity,
}

/// A `data` element being read
#[derive(Debug)]
struct DataContext {
    array: PeakArray,
    encoding: BinaryEncoding,
    byte_order: ByteOrder,
    base64_data: String,
}

impl DataContext {
    fn from_element(array: PeakArray, e: &BytesStart) -> Self {
        let bits = get_attribute(e, "precision")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(32);
        let byte_order = match get_attribute(e, "endian").as_deref() {
            Some(endian) if endian.eq_ignore_ascii_case("big") => ByteOrder::Big,
            _ => ByteOrder::Little,
        };
        Self {
            array,
            encoding: BinaryEncoding::from_bits(bits),
            byte_order,
            base64_data: String::new(),
        }
    }

    fn decode(&self) -> Vec<f32> {
        BinaryDecoder::decode(
            &self.base64_data,
            self.encoding,
            self.byte_order,
            CompressionType::None,
        )
    }
}

/// Per-spectrum accumulator
#[derive(Debug, Default)]
struct SpectrumState {
    ms_level: i16,
    rt: f32,
    polarity: Polarity,
    precursor_mz: f32,
    in_instrument: bool,
    in_ion_selection: bool,
    current_array: Option<PeakArray>,
    current_data: Option<DataContext>,
    mz: Vec<f32>,
    intensity: Vec<f32>,
}

impl SpectrumState {
    fn apply_cv_param(&mut self, cv: &CvParam) {
        if self.in_instrument {
            let value = cv.value.as_deref().unwrap_or("").trim();
            if cv.name_starts_with("TimeInMinu") {
                self.rt = value.parse().unwrap_or(0.0);
            } else if cv.name_starts_with("time in se") {
                self.rt = value.parse::<f32>().unwrap_or(0.0) / 60.0;
            } else if cv.name_starts_with("polar") {
                self.polarity = match value.chars().next() {
                    Some('p') | Some('P') => Polarity::Positive,
                    _ => Polarity::Negative,
                };
            }
        } else if self.in_ion_selection
            && (cv.name_starts_with("MassToChargeRatio") || cv.name.eq_ignore_ascii_case("mz"))
            && self.precursor_mz == 0.0
        {
            self.precursor_mz = cv.value_as_f32().filter(|v| *v > 0.0).unwrap_or(0.0);
        }
    }

    fn open(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"spectrumInstrument" => {
                self.ms_level = get_attribute(e, "msLevel")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                self.in_instrument = true;
            }
            b"ionSelection" => self.in_ion_selection = true,
            b"mzArrayBinary" => self.current_array = Some(PeakArray::Mz),
            b"intenArrayBinary" => self.current_array = Some(PeakArray::Intensity),
            b"data" => {
                if let Some(array) = self.current_array {
                    self.current_data = Some(DataContext::from_element(array, e));
                }
            }
            b"cvParam" => self.apply_cv_param(&parse_cv_param(e)),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"spectrumInstrument" => self.in_instrument = false,
            b"ionSelection" => self.in_ion_selection = false,
            b"mzArrayBinary" | b"intenArrayBinary" => self.current_array = None,
            b"data" => {
                if let Some(ctx) = self.current_data.take() {
                    let values = ctx.decode();
                    match ctx.array {
                        PeakArray::Mz => self.mz = values,
                        PeakArray::Intensity => self.intensity = values,
                    }
                }
            }
            _ => {}
        }
    }

    fn into_scan(self) -> Scan {
        let mut scan = Scan::new(self.ms_level, self.rt, self.precursor_mz, self.polarity);
        scan.set_peaks(self.mz, self.intensity);
        scan
    }
}

/// Parse one spectrum element
fn parse_spectrum<R: BufRead>(xml: &mut Reader<R>) -> Result<Scan, DecodeError> {
    let mut state = SpectrumState::default();
    let mut depth = 1;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                state.open(e);
            }
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"spectrumInstrument" => {
                    state.open(e);
                    state.close(b"spectrumInstrument");
                }
                b"cvParam" => state.apply_cv_param(&parse_cv_param(e)),
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if let Some(ctx) = state.current_data.as_mut() {
                    ctx.base64_data.push_str(&text_content(t));
                }
            }
            Ok(Event::End(ref e)) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == b"spectrum" {
                    break;
                }
                state.close(e.name().as_ref());
            }
            Ok(Event::Eof) => {
                return Err(DecodeError::InvalidStructure(
                    "Unexpected EOF in spectrum".to_string(),
                ));
            }
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(state.into_scan())
}
