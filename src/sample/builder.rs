use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::{debug, info};

use super::Sample;
use crate::filter::FilterConfig;
use crate::scan::Scan;

/// A sample in the Loading state.
///
/// Decoders offer scans through [`SampleBuilder::admit`]; each passes the
/// filter pipeline and, if it survives, is appended with the next index.
/// [`SampleBuilder::finish`] moves to the Ready state.
#[derive(Debug)]
pub struct SampleBuilder<'a> {
    config: &'a FilterConfig,
    scans: Vec<Scan>,
    instrument_info: BTreeMap<String, String>,
    offered: usize,
    skipped_records: usize,
}

impl<'a> SampleBuilder<'a> {
    /// Start an empty sample that filters with `config`
    pub fn new(config: &'a FilterConfig) -> Self {
        Self {
            config,
            scans: Vec::new(),
            instrument_info: BTreeMap::new(),
            offered: 0,
            skipped_records: 0,
        }
    }

    /// Offer one decoded scan. Returns whether it was kept.
    pub fn admit(&mut self, scan: Scan) -> bool {
        self.offered += 1;
        match self.config.apply(scan) {
            Some(mut scan) => {
                scan.index = self.scans.len();
                self.scans.push(scan);
                true
            }
            None => false,
        }
    }

    /// Record instrument metadata; the first value for a key wins
    pub fn set_instrument_info(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.instrument_info
            .entry(key.into())
            .or_insert_with(|| value.into());
    }

    /// Note a record that could not be decoded
    pub fn skip_record(&mut self, reason: impl fmt::Display) {
        debug!("Skipping record: {}", reason);
        self.skipped_records += 1;
    }

    /// Scans admitted so far
    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    /// Scans offered so far, admitted or not
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Records skipped as malformed
    pub fn skipped_records(&self) -> usize {
        self.skipped_records
    }

    /// Finish loading.
    ///
    /// Scans offered out of time order are stable-sorted and renumbered.
    pub fn finish(self, path: impl AsRef<Path>) -> Sample {
        let path = path.as_ref();
        let mut scans = self.scans;

        if !scans.windows(2).all(|w| w[0].rt <= w[1].rt) {
            info!("{}: scans out of time order, sorting", path.display());
            scans.sort_by(|a, b| a.rt.total_cmp(&b.rt));
            for (index, scan) in scans.iter_mut().enumerate() {
                scan.index = index;
            }
        }

        Sample::new(path, scans, self.instrument_info)
    }
}
