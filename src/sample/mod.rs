//! One acquisition run and its derived state
//!
//! A [`Sample`] is produced by a [`SampleBuilder`] once a decoder has
//! offered every scan of a file, usually through a [`Loader`]. After that
//! the scan sequence never changes length or order; the only permitted
//! mutations are the normalization factor, labels, and a reversible
//! retention-time transform applied by an alignment step.
//!
//! ```rust,no_run
//! use mzextract::filter::FilterConfig;
//! use mzextract::sample::Loader;
//!
//! let loader = Loader::new(FilterConfig::default());
//! let outcome = loader.load("run01.mzML");
//! if let Some(err) = &outcome.error {
//!     eprintln!("partial load: {}", err);
//! }
//! println!("{} scans", outcome.sample.scan_count());
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, warn};
use serde::Serialize;

use crate::scan::Scan;

mod builder;
mod loader;


pub use builder::SampleBuilder;
pub use loader::{LoadOutcome, Loader};

/// Upper clamp for reported retention times (minutes)
pub const MAX_REPORTED_RT: f32 = 1e4;

/// Upper sanity bound for m/z values counted in ranges
pub const MAX_SANE_MZ: f32 = 1e9;

/// Global extrema of a sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleRanges {
    /// Retention time of the first scan (minutes)
    pub min_rt: f32,
    /// Retention time of the last scan (minutes)
    pub max_rt: f32,
    /// Smallest positive m/z
    pub min_mz: f32,
    /// Largest m/z below the sanity bound
    pub max_mz: f32,
    /// Smallest point intensity
    pub min_intensity: f32,
    /// Largest point intensity
    pub max_intensity: f32,
    /// Sum of all point intensities
    pub total_intensity: f64,
}

impl SampleRanges {
    /// Single pass over all points. Scans must already be in time order.
    pub fn compute(scans: &[Scan]) -> Self {
        let (Some(first), Some(last)) = (scans.first(), scans.last()) else {
            warn!("Sample has no scans; ranges are zero");
            return Self::default();
        };

        let mut min_mz = f32::MAX;
        let mut max_mz = 0.0f32;
        let mut min_intensity = f32::MAX;
        let mut max_intensity = 0.0f32;
        let mut total_intensity = 0.0f64;

        for (mz, intensity) in scans.iter().flat_map(Scan::peaks) {
            total_intensity += intensity as f64;
            if mz > 0.0 && mz < min_mz {
                min_mz = mz;
            }
            if mz < MAX_SANE_MZ && mz > max_mz {
                max_mz = mz;
            }
            min_intensity = min_intensity.min(intensity);
            max_intensity = max_intensity.max(intensity);
        }

        if min_mz == f32::MAX {
            min_mz = 0.0;
        }
        if min_intensity == f32::MAX {
            min_intensity = 0.0;
        }

        let ranges = Self {
            min_rt: first.rt.clamp(0.0, MAX_REPORTED_RT),
            max_rt: last.rt.clamp(0.0, MAX_REPORTED_RT),
            min_mz,
            max_mz,
            min_intensity,
            max_intensity,
            total_intensity,
        };
        debug!(
            "Sample ranges rt={}-{} mz={}-{}",
            ranges.min_rt, ranges.max_rt, ranges.min_mz, ranges.max_mz
        );
        ranges
    }
}

/// Bounding box over several samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleExtents {
    /// Smallest minimum retention time
    pub rt_min: f32,
    /// Largest maximum retention time
    pub rt_max: f32,
    /// Smallest minimum m/z
    pub mz_min: f32,
    /// Largest maximum m/z
    pub mz_max: f32,
}

/// One acquisition run in the Ready state
#[derive(Debug, Clone)]
pub struct Sample {
    file_name: String,
    /// Display name, the file stem by default
    pub name: String,
    /// Set-membership label assigned by the caller
    pub set_name: String,
    /// Intensity scale applied to every extracted trace
    pub normalization: f32,
    /// Whether this run is a blank
    pub is_blank: bool,
    scans: Vec<Scan>,
    ranges: SampleRanges,
    instrument_info: BTreeMap<String, String>,
    srm_index: OnceLock<HashMap<String, Vec<usize>>>,
    original_rts: Option<Vec<f32>>,
}

impl Sample {
    pub(crate) fn new(
        path: &Path,
        scans: Vec<Scan>,
        instrument_info: BTreeMap<String, String>,
    ) -> Self {
        let file_name = path.to_string_lossy().into_owned();
        let base_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| base_name.clone());

        let ranges = SampleRanges::compute(&scans);
        Self {
            file_name,
            is_blank: base_name.to_ascii_lowercase().contains("blank"),
            name,
            set_name: String::new(),
            normalization: 1.0,
            scans,
            ranges,
            instrument_info,
            srm_index: OnceLock::new(),
            original_rts: None,
        }
    }

    /// Build a sample from already-decoded scans, without filtering.
    ///
    /// Scans are renumbered and time-sorted exactly as a decoder's output
    /// would be.
    pub fn from_scans(path: impl AsRef<Path>, scans: Vec<Scan>) -> Self {
        let config = crate::filter::FilterConfig::default();
        let mut builder = SampleBuilder::new(&config);
        for scan in scans {
            builder.admit(scan);
        }
        builder.finish(path)
    }

    /// Path the sample was loaded from
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// All scans in time order
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// Number of scans
    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    /// Whether no scan was admitted
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Scan by position. Positions past the end return the last scan;
    /// `None` only for an empty sample.
    pub fn scan(&self, index: usize) -> Option<&Scan> {
        self.scans.get(index.min(self.scans.len().saturating_sub(1)))
    }

    /// Global extrema
    pub fn ranges(&self) -> &SampleRanges {
        &self.ranges
    }

    /// Instrument metadata found by the decoder
    pub fn instrument_info(&self) -> &BTreeMap<String, String> {
        &self.instrument_info
    }

    /// Number of scans per MS level
    pub fn ms_levels(&self) -> BTreeMap<i16, usize> {
        let mut levels = BTreeMap::new();
        for scan in &self.scans {
            *levels.entry(scan.ms_level).or_insert(0) += 1;
        }
        levels
    }

    /// Position of the first scan with `rt >= rt_min`
    pub(crate) fn lower_bound_rt(&self, rt_min: f32) -> usize {
        self.scans.partition_point(|s| s.rt < rt_min)
    }

    /// Scans with `rt_min <= rt <= rt_max`, optionally of one MS level
    pub fn scans_in_rt_window(
        &self,
        rt_min: f32,
        rt_max: f32,
        ms_level: Option<i16>,
    ) -> impl Iterator<Item = &Scan> + '_ {
        let start = self.lower_bound_rt(rt_min);
        self.scans[start..]
            .iter()
            .take_while(move |s| s.rt <= rt_max)
            .filter(move |s| ms_level.map_or(true, |level| s.ms_level == level))
    }

    /// Mean time between consecutive MS1 scans, 0 with fewer than two
    pub fn average_full_scan_time(&self) -> f32 {
        let full_scans: Vec<f32> = self
            .scans
            .iter()
            .filter(|s| s.ms_level == 1)
            .map(|s| s.rt)
            .collect();
        if full_scans.len() < 2 {
            return 0.0;
        }
        let total: f32 = full_scans.windows(2).map(|w| w[1] - w[0]).sum();
        total / (full_scans.len() - 1) as f32
    }

    /// Scan positions grouped by transition identifier.
    ///
    /// Built on first use. Concurrent first calls may race to build it;
    /// only one result is kept.
    pub fn srm_index(&self) -> &HashMap<String, Vec<usize>> {
        self.srm_index.get_or_init(|| {
            let mut index: HashMap<String, Vec<usize>> = HashMap::new();
            for (position, scan) in self.scans.iter().enumerate() {
                if !scan.filter_line.is_empty() {
                    index
                        .entry(scan.filter_line.clone())
                        .or_default()
                        .push(position);
                }
            }
            debug!("Built SRM index with {} transitions", index.len());
            index
        })
    }

    /// Scan positions for one transition identifier
    pub fn srm_scans(&self, srm_id: &str) -> &[usize] {
        self.srm_index()
            .get(srm_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop the SRM index so the next lookup rebuilds it
    pub fn invalidate_srm_index(&mut self) {
        self.srm_index = OnceLock::new();
    }

    /// Keep a copy of the current retention times, unless one is already kept
    pub fn save_original_retention_times(&mut self) {
        if self.original_rts.is_some() {
            return;
        }
        self.original_rts = Some(self.scans.iter().map(|s| s.rt).collect());
    }

    /// Whether a saved copy of the original retention times exists
    pub fn has_original_retention_times(&self) -> bool {
        self.original_rts.is_some()
    }

    /// Put back the saved retention times, if any
    pub fn restore_original_retention_times(&mut self) {
        let Some(original) = &self.original_rts else {
            return;
        };
        for (scan, &rt) in self.scans.iter_mut().zip(original) {
            scan.rt = rt;
        }
        self.ranges = SampleRanges::compute(&self.scans);
    }

    /// Map every retention time through `f`, saving the originals first.
    ///
    /// `f` must be non-decreasing; scans are not reordered.
    pub fn align_retention_times<F>(&mut self, mut f: F)
    where
        F: FnMut(f32) -> f32,
    {
        self.save_original_retention_times();
        for scan in &mut self.scans {
            scan.rt = f(scan.rt);
        }
        if !self.scans.windows(2).all(|w| w[0].rt <= w[1].rt) {
            warn!(
                "Retention time alignment of {} broke scan time order",
                self.name
            );
        }
        self.ranges = SampleRanges::compute(&self.scans);
    }
}

/// Bounding box of retention time and m/z across samples; all zero for
/// an empty slice
pub fn sample_extents(samples: &[Sample]) -> SampleExtents {
    let Some(first) = samples.first() else {
        return SampleExtents::default();
    };
    let start = SampleExtents {
        rt_min: first.ranges.min_rt,
        rt_max: first.ranges.max_rt,
        mz_min: first.ranges.min_mz,
        mz_max: first.ranges.max_mz,
    };
    samples[1..].iter().fold(start, |acc, s| SampleExtents {
        rt_min: acc.rt_min.min(s.ranges.min_rt),
        rt_max: acc.rt_max.max(s.ranges.max_rt),
        mz_min: acc.mz_min.min(s.ranges.min_mz),
        mz_max: acc.mz_max.max(s.ranges.max_mz),
    })
}

/// Largest maximum retention time across samples (0 for none)
pub fn max_retention_time(samples: &[Sample]) -> f32 {
    samples
        .iter()
        .map(|s| s.ranges.max_rt)
        .fold(0.0, f32::max)
}
