//! Controlled Vocabulary (CV) parameter handling for the XML dialects
//!
//! mzML (and, by name only, mzData) describe spectra with PSI-MS CV terms.
//! This module holds the parameter model, the accessions the decoders
//! react to, and the small attribute helpers shared by every XML decoder.

use std::borrow::Cow;

use log::debug;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, BytesText};

/// A controlled vocabulary parameter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CvParam {
    /// Accession number (e.g., "MS:1000511")
    pub accession: String,

    /// Human-readable name
    pub name: String,

    /// Optional value
    pub value: Option<String>,

    /// Unit accession
    pub unit_accession: Option<String>,

    /// Unit name
    pub unit_name: Option<String>,
}

impl CvParam {
    /// Get the value as f64 if possible
    pub fn value_as_f64(&self) -> Option<f64> {
        self.value.as_ref()?.trim().parse().ok()
    }

    /// Get the value as f32 if possible
    pub fn value_as_f32(&self) -> Option<f32> {
        self.value_as_f64().map(|v| v as f32)
    }

    /// Get the value as i64 if possible, accepting "2.0" style integers
    pub fn value_as_i64(&self) -> Option<i64> {
        let raw = self.value.as_ref()?.trim();
        raw.parse()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|v| v as i64))
    }

    /// Case-insensitive prefix match on the parameter name
    pub fn name_starts_with(&self, prefix: &str) -> bool {
        self.name.len() >= prefix.len()
            && self.name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }
}

/// MS CV accessions the decoders react to
#[allow(non_snake_case)]
pub mod MS_CV_ACCESSIONS {
    /// MS level
    pub const MS_LEVEL: &str = "MS:1000511";

    /// Centroid spectrum
    pub const CENTROID_SPECTRUM: &str = "MS:1000127";

    /// Profile spectrum
    pub const PROFILE_SPECTRUM: &str = "MS:1000128";

    /// Positive scan
    pub const POSITIVE_SCAN: &str = "MS:1000130";

    /// Negative scan
    pub const NEGATIVE_SCAN: &str = "MS:1000129";

    /// Scan start time (retention time)
    pub const SCAN_START_TIME: &str = "MS:1000016";

    /// Filter string
    pub const FILTER_STRING: &str = "MS:1000512";

    /// Isolation window target m/z
    pub const ISOLATION_WINDOW_TARGET_MZ: &str = "MS:1000827";

    /// Collision energy
    pub const COLLISION_ENERGY: &str = "MS:1000045";

    /// m/z array
    pub const MZ_ARRAY: &str = "MS:1000514";

    /// Intensity array
    pub const INTENSITY_ARRAY: &str = "MS:1000515";

    /// Time array
    pub const TIME_ARRAY: &str = "MS:1000595";

    /// Second
    pub const UNIT_SECOND: &str = "UO:0000010";

    /// Minute
    pub const UNIT_MINUTE: &str = "UO:0000031";

    /// Millisecond
    pub const UNIT_MILLISECOND: &str = "UO:0000028";
}

/// Convert a time value to minutes using its unit accession.
///
/// A missing or unrecognised unit is taken as minutes.
pub fn retention_time_minutes(value: f64, unit_accession: Option<&str>) -> f32 {
    let minutes = match unit_accession {
        Some(MS_CV_ACCESSIONS::UNIT_SECOND) => value / 60.0,
        Some(MS_CV_ACCESSIONS::UNIT_MILLISECOND) => value / 60_000.0,
        _ => value,
    };
    minutes as f32
}

/// Decode one attribute value. Invalid UTF-8 is replaced and a broken
/// entity leaves the raw text.
fn attribute_value(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape(&text) {
        Ok(value) => value.into_owned(),
        Err(_) => text.into_owned(),
    }
}

/// Iterate the well-formed attributes of a start tag as (name, value).
///
/// A malformed attribute is skipped with a diagnostic; it never fails the
/// element it belongs to.
fn well_formed_attributes<'a>(e: &'a BytesStart) -> impl Iterator<Item = (String, String)> + 'a {
    e.attributes().filter_map(|attr| match attr {
        Ok(attr) => Some((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attribute_value(&attr.value),
        )),
        Err(err) => {
            debug!("Ignoring malformed attribute: {}", err);
            None
        }
    })
}

/// Get an attribute value from a start tag
pub(crate) fn get_attribute(e: &BytesStart, name: &str) -> Option<String> {
    well_formed_attributes(e)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// Collect every attribute of a start tag as (name, value) pairs
pub(crate) fn attributes(e: &BytesStart) -> Vec<(String, String)> {
    well_formed_attributes(e).collect()
}

/// Text content of an element, read lossily when it is not valid UTF-8 or
/// carries an unknown entity
pub(crate) fn text_content<'a>(t: &'a BytesText) -> Cow<'a, str> {
    match t.unescape() {
        Ok(text) => text,
        Err(err) => {
            debug!("Reading undecodable text content lossily: {}", err);
            String::from_utf8_lossy(t)
        }
    }
}

/// Parse a cvParam element
pub(crate) fn parse_cv_param(e: &BytesStart) -> CvParam {
    CvParam {
        accession: get_attribute(e, "accession").unwrap_or_default(),
        name: get_attribute(e, "name").unwrap_or_default(),
        value: get_attribute(e, "value"),
        unit_accession: get_attribute(e, "unitAccession"),
        unit_name: get_attribute(e, "unitName"),
    }
}

/// Parse the leading numeric part of a token, ignoring trailing text
/// ("12.5s" reads as 12.5). Returns 0 when nothing numeric is present.
pub(crate) fn leading_float(text: &str) -> f64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0) || c == 'e' || c == 'E')
        })
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    // Back off until the prefix parses ("1.5e" -> "1.5")
    let mut candidate = &text[..end];
    while !candidate.is_empty() {
        if let Ok(v) = candidate.parse::<f64>() {
            return v;
        }
        candidate = &candidate[..candidate.len() - 1];
    }
    0.0
}
