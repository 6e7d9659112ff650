use super::*;
use std::io::Write;

use base64::prelude::*;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::binary::encode_floats;
use crate::filter::FilterConfig;
use crate::sample::Sample;

fn peaks(pairs: &[(f64, f64)], byte_order: ByteOrder) -> String {
    let values: Vec<f64> = pairs.iter().flat_map(|&(mz, i)| [mz, i]).collect();
    encode_floats(&values, BinaryEncoding::Float32, byte_order)
}

fn document(scans: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<mzXML xmlns="http://sashimi.sourceforge.net/schema_revision/mzXML_3.2">
  <msRun scanCount="3" startTime="PT90S" endTime="PT120S">
    <msInstrument msInstrumentID="1">
      <msManufacturer category="msManufacturer" value="Thermo Scientific"/>
      <msModel category="msModel" value="TSQ Quantiva"/>
      <msIonisation category="msIonisation" value="ESI"/>
      <msMassAnalyzer category="msMassAnalyzer" value="Quadrupole"/>
      <msDetector category="msDetector" value="EMT"/>
    </msInstrument>
{scans}
  </msRun>
</mzXML>"#
    )
}

fn load(xml: &str) -> Sample {
    let config = FilterConfig::default();
    let mut builder = SampleBuilder::new(&config);
    decode(xml.as_bytes(), &mut builder).unwrap();
    builder.finish("test.mzXML")
}

#[test]
fn test_nested_scans_parent_first() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" peaksCount="3" polarity="+" retentionTime="PT90S">
      <peaks precision="32" byteOrder="network" pairOrder="m/z-int">{survey}</peaks>
      <scan num="2" msLevel="2" peaksCount="1" retentionTime="PT91.5S" scanType="SRM" basePeakMz="100" collisionEnergy="25">
        <precursorMz precursorIntensity="0">445.12</precursorMz>
        <peaks precision="32" byteOrder="network" pairOrder="m/z-int">{product}</peaks>
      </scan>
    </scan>
    <scan num="3" msLevel="1" peaksCount="1" retentionTime="PT120S" filterLine="FTMS {{1,2}}  - c ESI Full ms">
      <peaks precision="32" byteOrder="network">{last}</peaks>
    </scan>"#,
        survey = peaks(&[(100.0, 10.0), (200.0, 0.0), (300.0, 30.0)], ByteOrder::Big),
        product = peaks(&[(100.0, 5.0)], ByteOrder::Big),
        last = peaks(&[(150.0, 7.0)], ByteOrder::Big),
    ));

    let sample = load(&xml);
    assert_eq!(sample.scan_count(), 3);

    let survey = &sample.scans()[0];
    assert_eq!(survey.ms_level, 1);
    assert_eq!(survey.rt, 1.5);
    assert_eq!(survey.polarity, Polarity::Positive);
    assert_eq!(survey.mz(), &[100.0, 300.0]);
    assert_eq!(survey.intensity(), &[10.0, 30.0]);

    let product = &sample.scans()[1];
    assert_eq!(product.index, 1);
    assert_eq!(product.ms_level, 2);
    assert!((product.rt - 1.525).abs() < 1e-6);
    assert_eq!(product.polarity, Polarity::Unknown);
    assert!((product.precursor_mz - 445.12).abs() < 1e-3);
    assert_eq!(product.product_mz, 100.0);
    assert_eq!(product.collision_energy, 25.0);
    assert_eq!(product.scan_type, "SRM");
    assert_eq!(product.filter_line, "SRM:445.1200 [100.0000]");
    assert_eq!(sample.srm_scans("SRM:445.1200 [100.0000]"), &[1]);

    let last = &sample.scans()[2];
    assert_eq!(last.rt, 2.0);
    assert_eq!(last.polarity, Polarity::Negative);
    assert_eq!(last.filter_line, "FTMS {1,2}  - c ESI Full ms");
}

#[test]
fn test_instrument_info() {
    let sample = load(&document(""));
    let info = sample.instrument_info();
    assert_eq!(info["msManufacturer"], "Thermo Scientific");
    assert_eq!(info["msModel"], "TSQ Quantiva");
    assert_eq!(info["msIonisation"], "ESI");
    assert_eq!(info["msMassAnalyzer"], "Quadrupole");
    assert_eq!(info["msDetector"], "EMT");
    assert!(sample.is_empty());
}

#[test]
fn test_retention_time_forms() {
    assert_eq!(parse_retention_time("PT90S"), 1.5);
    assert_eq!(parse_retention_time("pt30.0S"), 0.5);
    assert_eq!(parse_retention_time("P120"), 2.0);
    assert_eq!(parse_retention_time("60"), 1.0);
    assert_eq!(parse_retention_time(""), 0.0);
}

#[test]
fn test_scans_without_peaks_are_dropped() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" retentionTime="PT60S"><peaks precision="32" byteOrder="network"></peaks></scan>
    <scan num="2" msLevel="1" retentionTime="PT61S"/>
    <scan num="3" msLevel="1" retentionTime="PT62S"><peaks precision="32" byteOrder="network">{}</peaks></scan>"#,
        peaks(&[(250.0, 2.0)], ByteOrder::Big)
    ));

    let sample = load(&xml);
    assert_eq!(sample.scan_count(), 1);
    assert_eq!(sample.scans()[0].index, 0);
    assert_eq!(sample.scans()[0].mz(), &[250.0]);
}

#[test]
fn test_little_endian_double_precision() {
    let values = [120.5, 1000.0, 240.25, 2000.0];
    let data = encode_floats(&values, BinaryEncoding::Float64, ByteOrder::Little);
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" polarity="-" retentionTime="PT30S">
      <peaks precision="64" byteOrder="little" contentType="m/z-int">{data}</peaks>
    </scan>"#
    ));

    let sample = load(&xml);
    let scan = &sample.scans()[0];
    assert_eq!(scan.polarity, Polarity::Negative);
    assert_eq!(scan.mz(), &[120.5, 240.25]);
    assert_eq!(scan.intensity(), &[1000.0, 2000.0]);
}

#[test]
fn test_zlib_compressed_peaks() {
    let mut raw = Vec::new();
    for v in [300.0f32, 50.0, 310.0, 60.0] {
        raw.extend_from_slice(&v.to_be_bytes());
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    let data = BASE64_STANDARD.encode(encoder.finish().unwrap());

    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" retentionTime="PT6S">
      <peaks precision="32" byteOrder="network" compressionType="zlib" compressedLen="0">{data}</peaks>
    </scan>"#
    ));

    let sample = load(&xml);
    let scan = &sample.scans()[0];
    assert!((scan.rt - 0.1).abs() < 1e-6);
    assert_eq!(scan.mz(), &[300.0, 310.0]);
    assert_eq!(scan.intensity(), &[50.0, 60.0]);
}

#[test]
fn test_unclosed_scan_is_an_error() {
    let xml = r#"<mzXML><msRun><scan num="1" msLevel="1" retentionTime="PT1S">"#;
    let config = FilterConfig::default();
    let mut builder = SampleBuilder::new(&config);
    assert!(decode(xml.as_bytes(), &mut builder).is_err());
}

#[test]
fn test_ms_level_filter_applies_to_nested_scans() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" retentionTime="PT60S">
      <peaks precision="32" byteOrder="network">{a}</peaks>
      <scan num="2" msLevel="2" retentionTime="PT61S">
        <precursorMz>300.0</precursorMz>
        <peaks precision="32" byteOrder="network">{b}</peaks>
      </scan>
    </scan>"#,
        a = peaks(&[(100.0, 1.0)], ByteOrder::Big),
        b = peaks(&[(50.0, 1.0)], ByteOrder::Big),
    ));
    let config = FilterConfig {
        ms_level: Some(2),
        ..Default::default()
    };
    let mut builder = SampleBuilder::new(&config);
    decode(xml.as_bytes(), &mut builder).unwrap();
    assert_eq!(builder.offered(), 2);
    let sample = builder.finish("filtered.mzXML");
    assert_eq!(sample.scan_count(), 1);
    assert_eq!(sample.scans()[0].index, 0);
    assert_eq!(sample.scans()[0].precursor_mz, 300.0);
}

#[test]
fn test_polarity_from_filter_line_offset() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" retentionTime="PT1S" filterLine="FTMS {{1,1}}  + p ESI Full ms">
      <peaks precision="32" byteOrder="network">{p}</peaks>
    </scan>
    <scan num="2" msLevel="1" retentionTime="PT2S" filterLine="ITMS {{1,1}}  c ESI Full ms">
      <peaks precision="32" byteOrder="network">{p}</peaks>
    </scan>
    <scan num="3" msLevel="1" retentionTime="PT3S" filterLine="FTMS + p ESI">
      <peaks precision="32" byteOrder="network">{p}</peaks>
    </scan>
    <scan num="4" msLevel="1" polarity="-" retentionTime="PT4S" filterLine="FTMS {{1,1}}  + p ESI Full ms">
      <peaks precision="32" byteOrder="network">{p}</peaks>
    </scan>"#,
        p = peaks(&[(150.0, 7.0)], ByteOrder::Big),
    ));

    let sample = load(&xml);
    let polarities: Vec<Polarity> = sample.scans().iter().map(|s| s.polarity).collect();
    assert_eq!(
        polarities,
        vec![
            Polarity::Positive,
            Polarity::Negative,
            Polarity::Unknown,
            Polarity::Negative
        ]
    );
}

#[test]
fn test_invalid_utf8_attribute_does_not_abort_the_file() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" retentionTime="PT1S"><peaks precision="32" byteOrder="network">{p}</peaks></scan>
    <scan num="2" msLevel="1" retentionTime="PT2S" filterLine="FTMS {{1,1}}  + p ESI BROKEN"><peaks precision="32" byteOrder="network">{p}</peaks></scan>
    <scan num="3" msLevel="1" retentionTime="PT3S"><peaks precision="32" byteOrder="network">{p}</peaks></scan>"#,
        p = peaks(&[(150.0, 7.0)], ByteOrder::Big),
    ));
    let (head, tail) = xml.split_once("BROKEN").unwrap();
    let mut bytes = head.as_bytes().to_vec();
    bytes.push(0xFF);
    bytes.extend_from_slice(tail.as_bytes());

    let config = FilterConfig::default();
    let mut builder = SampleBuilder::new(&config);
    decode(&bytes[..], &mut builder).unwrap();
    let sample = builder.finish("test.mzXML");

    assert_eq!(sample.scan_count(), 3);
    let scan = &sample.scans()[1];
    assert_eq!(scan.polarity, Polarity::Positive);
    assert!(scan.filter_line.starts_with("FTMS {1,1}  + p ESI "));
    assert!(scan.filter_line.ends_with('\u{FFFD}'));
}

#[test]
fn test_centroided_attribute() {
    let xml = document(&format!(
        r#"<scan num="1" msLevel="1" centroided="1" retentionTime="PT1S"><peaks precision="32" byteOrder="network">{p}</peaks></scan>
    <scan num="2" msLevel="1" centroided="0" retentionTime="PT2S"><peaks precision="32" byteOrder="network">{p}</peaks></scan>
    <scan num="3" msLevel="1" centroided="true" retentionTime="PT3S"><peaks precision="32" byteOrder="network">{p}</peaks></scan>"#,
        p = peaks(&[(150.0, 7.0), (150.01, 9.0), (150.02, 3.0)], ByteOrder::Big),
    ));

    let sample = load(&xml);
    let flags: Vec<bool> = sample.scans().iter().map(|s| s.centroided).collect();
    assert_eq!(flags, vec![true, false, true]);

    // Centroiding on load leaves the flagged scans alone
    let config = FilterConfig {
        centroid_scans: true,
        ..Default::default()
    };
    let mut builder = SampleBuilder::new(&config);
    decode(xml.as_bytes(), &mut builder).unwrap();
    let sample = builder.finish("test.mzXML");
    let counts: Vec<usize> = sample.scans().iter().map(|s| s.nobs()).collect();
    assert_eq!(counts, vec![3, 1, 3]);
}
