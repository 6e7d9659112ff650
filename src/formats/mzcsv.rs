//! Delimited-text scan dump (mzCSV)
//!
//! One row per point:
//!
//! ```text
//! scannum,rt,mz,intensity,mslevel,precursorMz,polarity,srmid
//! 1,60.5,100.0,50,1,0,+,
//! ```
//!
//! Retention time is in seconds on disk and minutes in memory. Consecutive
//! rows sharing a scan number form one scan.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use log::debug;

use super::DecodeError;
use crate::sample::{Sample, SampleBuilder};
use crate::scan::{Polarity, Scan};

/// Column header written by [`write_mzcsv`]
pub const MZCSV_HEADER: [&str; 8] = [
    "scannum",
    "rt",
    "mz",
    "intensity",
    "mslevel",
    "precursorMz",
    "polarity",
    "srmid",
];

/// One parsed row
#[derive(Debug)]
struct Row {
    scan_number: i64,
    rt_seconds: f32,
    mz: f32,
    intensity: f32,
    ms_level: i16,
    precursor_mz: f32,
    polarity: String,
    srm_id: Option<String>,
}

impl Row {
    fn parse(record: &StringRecord) -> Option<Self> {
        if record.len() < 5 {
            return None;
        }
        let field = |i: usize| record.get(i).unwrap_or("");
        Some(Self {
            scan_number: field(0).parse().ok()?,
            rt_seconds: field(1).parse().ok()?,
            mz: field(2).parse().ok()?,
            intensity: field(3).parse().ok()?,
            ms_level: field(4).parse().ok()?,
            precursor_mz: field(5).parse().unwrap_or(0.0),
            polarity: field(6).to_string(),
            srm_id: record.get(7).map(str::to_string),
        })
    }

    /// Start a new scan from the first row of a scan-number group
    fn start_scan(&self) -> Scan {
        let token = if self.polarity.is_empty() {
            self.srm_id.as_deref().unwrap_or("")
        } else {
            self.polarity.as_str()
        };

        let mut scan = Scan::new(
            self.ms_level,
            self.rt_seconds / 60.0,
            self.precursor_mz,
            Polarity::from_token(token),
        );
        if scan.ms_level > 1 {
            scan.product_mz = self.mz;
        }
        if let Some(srm_id) = &self.srm_id {
            scan.filter_line = srm_id.clone();
        }
        scan
    }
}

/// Scan being accumulated from consecutive rows
struct Pending {
    scan_number: i64,
    scan: Scan,
    mz: Vec<f32>,
    intensity: Vec<f32>,
}

impl Pending {
    fn admit(self, builder: &mut SampleBuilder) {
        let Pending {
            scan_number,
            mut scan,
            mz,
            intensity,
        } = self;
        scan.set_peaks(mz, intensity);
        if !builder.admit(scan) {
            debug!("mzCSV scan {} rejected by filters", scan_number);
        }
    }
}

/// Decode mzCSV rows, admitting one scan per run of equal scan numbers.
///
/// Rows that fail to parse are skipped and counted; I/O failures abort.
pub fn decode<R: Read>(reader: R, builder: &mut SampleBuilder) -> Result<(), DecodeError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut pending: Option<Pending> = None;
    let mut record = StringRecord::new();

    loop {
        match csv_reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => {
                if let Some(scan) = pending.take() {
                    scan.admit(builder);
                }
                return Err(e.into());
            }
            Err(e) => {
                builder.skip_record(format_args!("unreadable mzCSV row: {}", e));
                continue;
            }
        }

        let Some(row) = Row::parse(&record) else {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            builder.skip_record(format_args!("malformed mzCSV row at line {}", line));
            continue;
        };

        let continues = matches!(&pending, Some(p) if p.scan_number == row.scan_number);
        if !continues {
            if let Some(scan) = pending.take() {
                scan.admit(builder);
            }
            pending = Some(Pending {
                scan_number: row.scan_number,
                scan: row.start_scan(),
                mz: Vec::new(),
                intensity: Vec::new(),
            });
        }
        if let Some(p) = pending.as_mut() {
            p.mz.push(row.mz);
            p.intensity.push(row.intensity);
        }
    }

    if let Some(scan) = pending {
        scan.admit(builder);
    }
    Ok(())
}

/// Write a sample as mzCSV: one row per point, scan numbers 1-based,
/// retention time in seconds.
pub fn write_mzcsv<W: Write>(sample: &Sample, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(MZCSV_HEADER)?;

    for scan in sample.scans() {
        let scan_number = (scan.index + 1).to_string();
        let rt = (scan.rt * 60.0).to_string();
        let ms_level = scan.ms_level.to_string();
        let precursor = scan.precursor_mz.to_string();
        let polarity = if scan.polarity.as_sign() > 0 { "+" } else { "-" };

        for (mz, intensity) in scan.peaks() {
            let mz = mz.to_string();
            let intensity = intensity.to_string();
            csv_writer.write_record([
                scan_number.as_str(),
                rt.as_str(),
                mz.as_str(),
                intensity.as_str(),
                ms_level.as_str(),
                precursor.as_str(),
                polarity,
                scan.filter_line.as_str(),
            ])?;
        }
    }

    csv_writer.flush()?;
    Ok(())
}
