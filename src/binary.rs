//! Binary array decoding for the XML dialects
//!
//! mzML, mzXML and mzData store numerical arrays (m/z, intensity, time) as
//! Base64-encoded binary blobs. This module handles the decoding pipeline:
//!
//! 1. Strip whitespace and Base64 decode the text (padding optional)
//! 2. Decompress if needed (zlib)
//! 3. Reinterpret 4- or 8-byte groups in the declared byte order
//! 4. Narrow every value to single precision
//!
//! Decoding one array must never abort ingestion of a whole sample, so the
//! main entry point [`BinaryDecoder::decode`] reports failures through the
//! log and returns an empty vector. [`BinaryDecoder::try_decode`] keeps the
//! error for callers that want it.

use std::io::Read;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use flate2::read::ZlibDecoder;
use log::warn;

/// Standard alphabet, accepting both padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Compression applied to the binary payload before Base64 encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// No compression (raw binary)
    #[default]
    None,
    /// zlib compression
    Zlib,
    /// MS-Numpress (any flavour); recognised but not decoded
    Numpress,
}

impl CompressionType {
    /// Determine compression type from an mzML CV accession
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        match accession {
            "MS:1000574" => Some(CompressionType::Zlib),
            "MS:1000576" => Some(CompressionType::None),
            "MS:1002312" | "MS:1002313" | "MS:1002314" => Some(CompressionType::Numpress),
            _ => None,
        }
    }

    /// Determine compression type from an mzXML `compressionType` attribute
    pub fn from_attribute(value: &str) -> Self {
        if value.len() >= 4 && value[..4].eq_ignore_ascii_case("zlib") {
            CompressionType::Zlib
        } else {
            CompressionType::None
        }
    }
}

/// Binary encoding precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryEncoding {
    /// 32-bit floating point (CV: MS:1000521)
    Float32,
    /// 64-bit floating point (CV: MS:1000523)
    #[default]
    Float64,
}

impl BinaryEncoding {
    /// Determine encoding from CV accession
    pub fn from_cv_accession(accession: &str) -> Option<Self> {
        match accession {
            "MS:1000521" => Some(BinaryEncoding::Float32),
            "MS:1000523" => Some(BinaryEncoding::Float64),
            _ => None,
        }
    }

    /// Determine encoding from a bit count (`precision="32"` style attributes).
    ///
    /// Anything other than 64 is read as 32-bit, matching the legacy dialects
    /// where 32 is the default.
    pub fn from_bits(bits: u32) -> Self {
        if bits == 64 {
            BinaryEncoding::Float64
        } else {
            BinaryEncoding::Float32
        }
    }

    /// Get the byte size per value
    pub fn byte_size(&self) -> usize {
        match self {
            BinaryEncoding::Float32 => 4,
            BinaryEncoding::Float64 => 8,
        }
    }
}

/// Byte order of the encoded values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Least significant byte first (mzML, mzData default)
    #[default]
    Little,
    /// Network order, most significant byte first (mzXML default)
    Big,
}

/// Errors that can occur during binary decoding
#[derive(Debug, thiserror::Error)]
pub enum BinaryDecodeError {
    /// The text is not valid Base64
    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// zlib inflation failed
    #[error("Decompression error: {0}")]
    DecompressionError(#[from] std::io::Error),

    /// The payload uses a compression scheme this decoder does not implement
    #[error("Unsupported compression: {0:?}")]
    UnsupportedCompression(CompressionType),
}

/// Decoder for Base64 binary data arrays
pub struct BinaryDecoder;

impl BinaryDecoder {
    /// Decode a Base64-encoded binary array, returning an empty vector on
    /// any failure.
    ///
    /// # Arguments
    /// * `base64_data` - The Base64 text (may contain line breaks)
    /// * `encoding` - The numerical precision (32 or 64 bit)
    /// * `byte_order` - Byte order of each encoded value
    /// * `compression` - The compression type (none, zlib)
    pub fn decode(
        base64_data: &str,
        encoding: BinaryEncoding,
        byte_order: ByteOrder,
        compression: CompressionType,
    ) -> Vec<f32> {
        match Self::try_decode(base64_data, encoding, byte_order, compression) {
            Ok(values) => values,
            Err(e) => {
                warn!("Discarding undecodable binary array: {}", e);
                Vec::new()
            }
        }
    }

    /// Decode a Base64-encoded binary array, keeping the failure reason
    pub fn try_decode(
        base64_data: &str,
        encoding: BinaryEncoding,
        byte_order: ByteOrder,
        compression: CompressionType,
    ) -> Result<Vec<f32>, BinaryDecodeError> {
        let compact: String = base64_data
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        if compact.is_empty() {
            return Ok(Vec::new());
        }

        let decoded_bytes = LENIENT_BASE64.decode(compact.as_bytes())?;

        let uncompressed = match compression {
            CompressionType::None => decoded_bytes,
            CompressionType::Zlib => {
                let mut decoder = ZlibDecoder::new(&decoded_bytes[..]);
                let mut uncompressed = Vec::new();
                decoder.read_to_end(&mut uncompressed)?;
                uncompressed
            }
            CompressionType::Numpress => {
                return Err(BinaryDecodeError::UnsupportedCompression(compression));
            }
        };

        Ok(Self::bytes_to_floats(&uncompressed, encoding, byte_order))
    }

    /// Reinterpret raw bytes as floats. A trailing partial group is ignored.
    pub fn bytes_to_floats(bytes: &[u8], encoding: BinaryEncoding, byte_order: ByteOrder) -> Vec<f32> {
        let chunks = bytes.chunks_exact(encoding.byte_size());
        match (encoding, byte_order) {
            (BinaryEncoding::Float32, ByteOrder::Little) => {
                chunks.map(LittleEndian::read_f32).collect()
            }
            (BinaryEncoding::Float32, ByteOrder::Big) => chunks.map(BigEndian::read_f32).collect(),
            (BinaryEncoding::Float64, ByteOrder::Little) => {
                chunks.map(|c| LittleEndian::read_f64(c) as f32).collect()
            }
            (BinaryEncoding::Float64, ByteOrder::Big) => {
                chunks.map(|c| BigEndian::read_f64(c) as f32).collect()
            }
        }
    }
}

/// Encode values the way the XML dialects store them (uncompressed).
///
/// Used by tests and fixtures; the decoders never need it.
pub fn encode_floats(values: &[f64], encoding: BinaryEncoding, byte_order: ByteOrder) -> String {
    let mut bytes = Vec::with_capacity(values.len() * encoding.byte_size());
    for &v in values {
        match (encoding, byte_order) {
            (BinaryEncoding::Float32, ByteOrder::Little) => {
                bytes.extend_from_slice(&(v as f32).to_le_bytes())
            }
            (BinaryEncoding::Float32, ByteOrder::Big) => {
                bytes.extend_from_slice(&(v as f32).to_be_bytes())
            }
            (BinaryEncoding::Float64, ByteOrder::Little) => bytes.extend_from_slice(&v.to_le_bytes()),
            (BinaryEncoding::Float64, ByteOrder::Big) => bytes.extend_from_slice(&v.to_be_bytes()),
        }
    }
    base64::prelude::BASE64_STANDARD.encode(bytes)
}
