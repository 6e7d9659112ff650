#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use mzextract::filter::FilterConfig;
use mzextract::formats::{mzcsv, mzdata, mzml, mzxml};
use mzextract::sample::SampleBuilder;

fuzz_target!(|data: &[u8]| {
    // Every decoder must either succeed or return an error on arbitrary
    // input. It must NEVER panic.
    let config = FilterConfig::default();

    let mut builder = SampleBuilder::new(&config);
    let _ = mzml::decode(Cursor::new(data), &mut builder);
    let _ = builder.finish("fuzz.mzML");

    let mut builder = SampleBuilder::new(&config);
    let _ = mzxml::decode(Cursor::new(data), &mut builder);
    let _ = builder.finish("fuzz.mzXML");

    let mut builder = SampleBuilder::new(&config);
    let _ = mzdata::decode(Cursor::new(data), &mut builder);
    let _ = builder.finish("fuzz.mzData");

    let mut builder = SampleBuilder::new(&config);
    let _ = mzcsv::decode(Cursor::new(data), &mut builder);
    let sample = builder.finish("fuzz.mzCSV");

    // Queries on whatever was decoded must not panic either
    let _ = sample.eic(0.0, f32::MAX, 0.0, f32::MAX, 1);
    let _ = sample.tic(0.0, f32::MAX, 1);
});
