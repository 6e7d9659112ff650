//! Legacy ISB mzXML decoder
//!
//! Scan metadata is carried in attributes on `<scan>` (matched by
//! case-insensitive prefix, as writers disagree on exact spelling), the
//! precursor m/z in a `<precursorMz>` child, and the peaks in one Base64
//! blob of interleaved (m/z, intensity) pairs, network byte order unless
//! stated otherwise.
//!
//! Scans may be nested (MS/MS scans inside their survey scan). Each scan is
//! admitted as soon as it is complete or a child scan starts, so parents
//! always precede their children.

use std::io::BufRead;

use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::cv::{attributes, get_attribute, leading_float, text_content};
use super::DecodeError;
use crate::binary::{BinaryDecoder, BinaryEncoding, ByteOrder, CompressionType};
use crate::sample::SampleBuilder;
use crate::scan::{Polarity, Scan};

/// Instrument description elements copied into the sample metadata
const INSTRUMENT_FIELDS: [&str; 5] = [
    "msManufacturer",
    "msModel",
    "msIonisation",
    "msMassAnalyzer",
    "msDetector",
];

/// Offset of the polarity sign in a Thermo filter line ("FTMS + p ESI ...")
const FILTER_LINE_POLARITY_OFFSET: usize = 12;

/// Decode an mzXML document
pub fn decode<R: BufRead>(reader: R, builder: &mut SampleBuilder) -> Result<(), DecodeError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut stack: Vec<ScanFrame> = Vec::new();
    let mut text_target = TextTarget::None;
    let mut in_instrument = false;
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"scan" => {
                    // A nested scan means its parent's own data is complete
                    if let Some(parent) = stack.last_mut() {
                        parent.emit(builder);
                    }
                    stack.push(ScanFrame::from_element(e));
                }
                b"precursorMz" if !stack.is_empty() => text_target = TextTarget::Precursor,
                b"peaks" => {
                    if let Some(frame) = stack.last_mut() {
                        frame.peaks = Some(PeaksContext::from_element(e));
                        text_target = TextTarget::Peaks;
                    }
                }
                b"msInstrument" => in_instrument = true,
                name if in_instrument => record_instrument_field(name, e, builder),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"scan" => {
                    if let Some(parent) = stack.last_mut() {
                        parent.emit(builder);
                    }
                    let mut frame = ScanFrame::from_element(e);
                    frame.emit(builder);
                }
                b"peaks" => {
                    if let Some(frame) = stack.last_mut() {
                        frame.peaks = Some(PeaksContext::from_element(e));
                    }
                }
                name if in_instrument => record_instrument_field(name, e, builder),
                _ => {}
            },
            Ok(Event::Text(ref t)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = text_content(t);
                    match text_target {
                        TextTarget::Precursor => {
                            frame.precursor_mz = leading_float(&text) as f32;
                        }
                        TextTarget::Peaks => {
                            if let Some(peaks) = frame.peaks.as_mut() {
                                peaks.base64_data.push_str(&text);
                            }
                        }
                        TextTarget::None => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"scan" => {
                    if let Some(mut frame) = stack.pop() {
                        frame.emit(builder);
                    }
                }
                b"precursorMz" | b"peaks" => text_target = TextTarget::None,
                b"msInstrument" => in_instrument = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DecodeError::InvalidStructure(
            "Unexpected EOF in scan".to_string(),
        ));
    }
    Ok(())
}

fn record_instrument_field(name: &[u8], e: &BytesStart, builder: &mut SampleBuilder) {
    let Some(&field) = INSTRUMENT_FIELDS.iter().find(|f| f.as_bytes() == name) else {
        return;
    };
    if let Some(value) = get_attribute(e, "value") {
        builder.set_instrument_info(field, value);
    }
}

/// Element whose text is being read
#[derive(Debug, Clone, Copy, PartialEq)]
enum TextTarget {
    None,
    Precursor,
    Peaks,
}

/// The `<peaks>` element of a scan
#[derive(Debug)]
struct PeaksContext {
    encoding: BinaryEncoding,
    byte_order: ByteOrder,
    compression: CompressionType,
    base64_data: String,
}

impl PeaksContext {
    fn from_element(e: &BytesStart) -> Self {
        let bits = get_attribute(e, "precision")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(32);
        let byte_order = match get_attribute(e, "byteOrder").as_deref() {
            None | Some("") => ByteOrder::Big,
            Some(order) if order.len() >= 5 && order[..5].eq_ignore_ascii_case("netwo") => {
                ByteOrder::Big
            }
            Some(_) => ByteOrder::Little,
        };
        let compression = get_attribute(e, "compressionType")
            .map(|c| CompressionType::from_attribute(&c))
            .unwrap_or_default();
        Self {
            encoding: BinaryEncoding::from_bits(bits),
            byte_order,
            compression,
            base64_data: String::new(),
        }
    }

    /// Decode and drop pairs where either value is not positive
    fn decode(&self) -> (Vec<f32>, Vec<f32>) {
        let values = BinaryDecoder::decode(
            &self.base64_data,
            self.encoding,
            self.byte_order,
            self.compression,
        );
        values
            .chunks_exact(2)
            .map(|pair| (pair[0], pair[1]))
            .filter(|&(mz, intensity)| mz > 0.0 && intensity > 0.0)
            .unzip()
    }
}

/// Case-insensitive attribute-name prefix match
fn name_matches(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len() && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Retention time attribute ("PT12.5S", "P12.5", "12.5") in minutes
fn parse_retention_time(value: &str) -> f32 {
    let value = value.trim();
    let seconds = if name_matches(value, "PT") {
        leading_float(&value[2..])
    } else if name_matches(value, "P") {
        leading_float(&value[1..])
    } else {
        leading_float(value)
    };
    (seconds / 60.0) as f32
}

/// One `<scan>` element being read
#[derive(Debug, Default)]
struct ScanFrame {
    ms_level: i16,
    rt: f32,
    polarity: Polarity,
    filter_line: String,
    scan_type: String,
    centroided: bool,
    product_mz: f32,
    collision_energy: f32,
    precursor_mz: f32,
    peaks: Option<PeaksContext>,
    emitted: bool,
}

impl ScanFrame {
    fn from_element(e: &BytesStart) -> Self {
        let mut frame = ScanFrame {
            ms_level: 1,
            ..Default::default()
        };

        for (name, value) in attributes(e) {
            if name_matches(&name, "retentionT") {
                frame.rt = parse_retention_time(&value);
            } else if name_matches(&name, "polar") {
                frame.polarity = Polarity::from_token(&value);
            } else if name_matches(&name, "filterLin") {
                frame.filter_line = value;
            } else if name_matches(&name, "msLev") {
                frame.ms_level = leading_float(&value) as i16;
            } else if name_matches(&name, "basePeakM") {
                frame.product_mz = leading_float(&value) as f32;
            } else if name_matches(&name, "collisionEne") {
                frame.collision_energy = leading_float(&value) as f32;
            } else if name_matches(&name, "scanType") {
                frame.scan_type = value;
            } else if name_matches(&name, "centroided") {
                let value = value.trim();
                frame.centroided = value == "1" || value.eq_ignore_ascii_case("true");
            }
        }

        if frame.polarity == Polarity::Unknown && frame.filter_line.len() > 13 {
            frame.polarity = match frame.filter_line.as_bytes()[FILTER_LINE_POLARITY_OFFSET] {
                b'+' => Polarity::Positive,
                _ => Polarity::Negative,
            };
        }

        frame
    }

    /// Admit the scan once. Scans without peak data are dropped.
    fn emit(&mut self, builder: &mut SampleBuilder) {
        if self.emitted {
            return;
        }
        self.emitted = true;

        let Some(peaks) = self.peaks.take() else {
            debug!("mzXML scan without peaks element, skipped");
            return;
        };
        if peaks.base64_data.trim().is_empty() {
            debug!("mzXML scan with empty peaks, skipped");
            return;
        }

        let (mz, intensity) = peaks.decode();
        let mut scan = Scan::new(self.ms_level, self.rt, self.precursor_mz, self.polarity);
        scan.product_mz = self.product_mz;
        scan.collision_energy = self.collision_energy;
        scan.centroided = self.centroided;
        scan.scan_type = std::mem::take(&mut self.scan_type);
        scan.filter_line = if self.filter_line.is_empty() && self.precursor_mz > 0.0 {
            format!(
                "{}:{:.4} [{:.4}]",
                scan.scan_type, self.precursor_mz, self.product_mz
            )
        } else {
            std::mem::take(&mut self.filter_line)
        };
        scan.set_peaks(mz, intensity);
        builder.admit(scan);
    }
}

#[cfg(test)]
mod tests;
