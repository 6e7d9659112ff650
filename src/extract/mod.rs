//! Chromatographic traces and aggregate queries over a loaded sample
//!
//! All queries are read-only on a [`Sample`] and return fresh values. A
//! trace ([`Eic`]) borrows its sample, so it cannot outlive it.
//!
//! ```rust,no_run
//! use mzextract::sample::Loader;
//!
//! let sample = Loader::default().load("run01.mzXML").sample;
//! let eic = sample.eic(180.06, 180.07, 0.0, 10.0, 1);
//! for point in eic.points() {
//!     println!("{:.3}\t{:.0}", point.rt, point.intensity);
//! }
//! ```

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::sample::Sample;
use crate::scan::{Polarity, Scan};
use crate::stats;

#[cfg(test)]
mod tests;

/// How far before `rt_min` the binary search starts (minutes)
const RT_SEARCH_MARGIN: f32 = 0.1;

/// Default precursor (Q1) tolerance for SRM queries, in amu
pub const DEFAULT_AMU_Q1: f32 = 0.1;

/// Default product (Q3) tolerance for SRM queries, in amu
pub const DEFAULT_AMU_Q2: f32 = 0.5;

/// One point of a trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EicPoint {
    /// Position of the contributing scan in the sample
    pub scan_index: usize,
    /// Retention time (minutes)
    pub rt: f32,
    /// Representative m/z (0 for total-intensity traces)
    pub mz: f32,
    /// Normalized intensity
    pub intensity: f32,
}

/// An extracted ion chromatogram: one point per contributing scan, in
/// retention-time order, intensities already scaled by the sample's
/// normalization factor.
#[derive(Debug, Clone)]
pub struct Eic<'a> {
    sample: &'a Sample,
    scan_index: Vec<usize>,
    rt: Vec<f32>,
    mz: Vec<f32>,
    intensity: Vec<f32>,
    mz_min: f32,
    mz_max: f32,
    total_intensity: f64,
    max_intensity: f32,
    rt_min: f32,
    rt_max: f32,
}

impl<'a> Eic<'a> {
    fn new(sample: &'a Sample, mz_min: f32, mz_max: f32) -> Self {
        Self {
            sample,
            scan_index: Vec::new(),
            rt: Vec::new(),
            mz: Vec::new(),
            intensity: Vec::new(),
            mz_min,
            mz_max,
            total_intensity: 0.0,
            max_intensity: 0.0,
            rt_min: 0.0,
            rt_max: 0.0,
        }
    }

    fn push(&mut self, scan: &Scan, mz: f32, intensity: f32) {
        self.scan_index.push(scan.index);
        self.rt.push(scan.rt);
        self.mz.push(mz);
        self.intensity.push(intensity);
    }

    /// Scale by the sample's normalization and compute the summary values
    fn finish(mut self) -> Self {
        let scale = self.sample.normalization;
        if scale != 1.0 {
            for v in &mut self.intensity {
                *v *= scale;
            }
        }
        self.total_intensity = self.intensity.iter().map(|&v| v as f64).sum();
        self.max_intensity = self.intensity.iter().copied().fold(0.0, f32::max);
        if let (Some(&first), Some(&last)) = (self.rt.first(), self.rt.last()) {
            self.rt_min = first;
            self.rt_max = last;
        }
        self
    }

    /// The sample this trace was extracted from
    pub fn sample(&self) -> &'a Sample {
        self.sample
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.rt.len()
    }

    /// Whether no scan contributed
    pub fn is_empty(&self) -> bool {
        self.rt.is_empty()
    }

    /// Positions of the contributing scans
    pub fn scan_indices(&self) -> &[usize] {
        &self.scan_index
    }

    /// Retention times (minutes)
    pub fn rts(&self) -> &[f32] {
        &self.rt
    }

    /// Representative m/z per point
    pub fn mzs(&self) -> &[f32] {
        &self.mz
    }

    /// Normalized intensities
    pub fn intensities(&self) -> &[f32] {
        &self.intensity
    }

    /// Iterate the trace point by point
    pub fn points(&self) -> impl Iterator<Item = EicPoint> + '_ {
        (0..self.len()).map(move |i| EicPoint {
            scan_index: self.scan_index[i],
            rt: self.rt[i],
            mz: self.mz[i],
            intensity: self.intensity[i],
        })
    }

    /// The m/z window used for extraction, after clamping (0, 0 for SRM
    /// and total-intensity traces)
    pub fn mz_window(&self) -> (f32, f32) {
        (self.mz_min, self.mz_max)
    }

    /// Sum of all point intensities
    pub fn total_intensity(&self) -> f64 {
        self.total_intensity
    }

    /// Largest point intensity
    pub fn max_intensity(&self) -> f32 {
        self.max_intensity
    }

    /// First and last retention time observed, (0, 0) when empty
    pub fn rt_range(&self) -> (f32, f32) {
        (self.rt_min, self.rt_max)
    }
}

/// An SRM transition to trace.
///
/// Collision energy is carried for callers but not used when matching
/// scans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrmQuery {
    /// Q1 m/z; 0 matches any precursor
    pub precursor_mz: f32,
    /// Collision energy (not matched)
    pub collision_energy: f32,
    /// Q3 m/z; 0 matches any product
    pub product_mz: f32,
    /// Precursor tolerance (amu)
    pub amu_q1: f32,
    /// Product tolerance (amu)
    pub amu_q2: f32,
}

impl SrmQuery {
    /// Query with the default Q1/Q3 tolerances
    pub fn new(precursor_mz: f32, collision_energy: f32, product_mz: f32) -> Self {
        Self {
            precursor_mz,
            collision_energy,
            product_mz,
            amu_q1: DEFAULT_AMU_Q1,
            amu_q2: DEFAULT_AMU_Q2,
        }
    }

    /// Override both tolerances
    pub fn with_tolerances(mut self, amu_q1: f32, amu_q2: f32) -> Self {
        self.amu_q1 = amu_q1;
        self.amu_q2 = amu_q2;
        self
    }

    fn matches(&self, scan: &Scan) -> bool {
        if scan.ms_level < 2 {
            return false;
        }
        if self.precursor_mz != 0.0 && (scan.precursor_mz - self.precursor_mz).abs() > self.amu_q1 {
            return false;
        }
        if self.product_mz != 0.0 && (scan.product_mz - self.product_mz).abs() > self.amu_q2 {
            return false;
        }
        true
    }
}

impl Sample {
    /// Trace the most intense point in `[mz_min, mz_max]` of every scan of
    /// `ms_level` within `[rt_min, rt_max]`.
    ///
    /// Both windows are clamped to the sample's own ranges. An inverted
    /// m/z window or an empty sample yields an empty trace.
    pub fn eic(&self, mz_min: f32, mz_max: f32, rt_min: f32, rt_max: f32, ms_level: i16) -> Eic<'_> {
        let ranges = self.ranges();
        let rt_min = rt_min.max(ranges.min_rt);
        let rt_max = rt_max.min(ranges.max_rt);
        let mz_min = mz_min.max(ranges.min_mz);
        let mz_max = mz_max.min(ranges.max_mz);

        let mut eic = Eic::new(self, mz_min, mz_max);
        if self.is_empty() || mz_min > mz_max {
            debug!(
                "eic({}-{}, {}-{}): nothing to extract from {}",
                mz_min, mz_max, rt_min, rt_max, self.name
            );
            return eic.finish();
        }

        let start = self.lower_bound_rt(rt_min - RT_SEARCH_MARGIN);
        for scan in &self.scans()[start..] {
            if scan.ms_level != ms_level || scan.rt < rt_min {
                continue;
            }
            if scan.rt > rt_max {
                break;
            }
            let (mz, intensity) = scan.find_highest_intensity_in(mz_min, mz_max);
            eic.push(scan, mz, intensity);
        }

        if eic.is_empty() {
            debug!(
                "eic({}-{}, {}-{}, level {}): empty for {}",
                mz_min, mz_max, rt_min, rt_max, ms_level, self.name
            );
        }
        eic.finish()
    }

    /// Trace the base peak of every MS2+ scan matching an SRM transition
    pub fn srm_eic(&self, query: &SrmQuery) -> Eic<'_> {
        let mut eic = Eic::new(self, 0.0, 0.0);
        for scan in self.scans().iter().filter(|s| query.matches(s)) {
            let (mz, intensity) = scan.base_peak();
            eic.push(scan, mz, intensity);
        }
        if eic.is_empty() {
            debug!(
                "srm_eic({}, {}, {}): empty for {}",
                query.precursor_mz, query.collision_energy, query.product_mz, self.name
            );
        }
        eic.finish()
    }

    /// Trace the base peak of every scan with transition identifier `srm_id`
    pub fn srm_eic_by_id(&self, srm_id: &str) -> Eic<'_> {
        let mut eic = Eic::new(self, 0.0, 0.0);
        for &position in self.srm_scans(srm_id) {
            let scan = &self.scans()[position];
            let (mz, intensity) = scan.base_peak();
            eic.push(scan, mz, intensity);
        }
        if eic.is_empty() {
            debug!("srm_eic_by_id({}): empty for {}", srm_id, self.name);
        }
        eic.finish()
    }

    /// Total ion chromatogram: the summed intensity of every scan of
    /// `ms_level` within `[rt_min, rt_max]` (clamped to the sample)
    pub fn tic(&self, rt_min: f32, rt_max: f32, ms_level: i16) -> Eic<'_> {
        let ranges = self.ranges();
        let rt_min = rt_min.max(ranges.min_rt);
        let rt_max = rt_max.min(ranges.max_rt);

        let mut eic = Eic::new(self, 0.0, 0.0);
        for scan in self.scans_in_rt_window(rt_min, rt_max, Some(ms_level)) {
            eic.push(scan, 0.0, scan.total_intensity() as f32);
        }
        eic.finish()
    }

    /// Average the spectra of `ms_level` and `polarity` within
    /// `[rt_min, rt_max]`.
    ///
    /// Points are binned by m/z rounded to `1 / resolution`; each bin yields
    /// one point whose m/z is the intensity-weighted mean and whose
    /// intensity is the bin total divided by its point count. The result's
    /// retention time is the window midpoint.
    pub fn average_scan(
        &self,
        rt_min: f32,
        rt_max: f32,
        ms_level: i16,
        polarity: Polarity,
        resolution: f32,
    ) -> Scan {
        let mut average = Scan::new(ms_level, rt_min + (rt_max - rt_min) / 2.0, 0.0, polarity);
        if resolution.is_nan() || resolution <= 0.0 {
            warn!("average_scan: resolution must be positive, got {}", resolution);
            return average;
        }

        // bin -> (total intensity, intensity-weighted m/z, count)
        let mut bins: BTreeMap<i64, (f64, f64, u32)> = BTreeMap::new();
        let mut scan_count = 0usize;
        for scan in self
            .scans_in_rt_window(rt_min, rt_max, Some(ms_level))
            .filter(|s| s.polarity == polarity)
        {
            scan_count += 1;
            for (mz, intensity) in scan.peaks() {
                let bin = (mz * resolution + 0.5).floor() as i64;
                let entry = bins.entry(bin).or_insert((0.0, 0.0, 0));
                entry.0 += intensity as f64;
                entry.1 += intensity as f64 * mz as f64;
                entry.2 += 1;
            }
        }
        debug!(
            "average_scan({}-{}): {} scans, {} bins",
            rt_min,
            rt_max,
            scan_count,
            bins.len()
        );

        let (mz, intensity): (Vec<f32>, Vec<f32>) = bins
            .into_iter()
            .map(|(bin, (total, weighted, count))| {
                let mz = if total > 0.0 {
                    weighted / total
                } else {
                    bin as f64 / resolution as f64
                };
                (mz as f32, (total / count as f64) as f32)
            })
            .unzip();
        average.set_peaks(mz, intensity);
        average
    }

    /// Pearson correlation of the MS1 traces of two m/z values, each
    /// extracted at ± `ppm` within `[rt_min, rt_max]`. 0 when the traces
    /// differ in length or either is flat.
    pub fn correlation(&self, mz1: f32, mz2: f32, ppm: f32, rt_min: f32, rt_max: f32) -> f32 {
        let tol1 = ppm * mz1 / 1e6;
        let tol2 = ppm * mz2 / 1e6;
        let a = self.eic(mz1 - tol1, mz1 + tol1, rt_min, rt_max, 1);
        let b = self.eic(mz2 - tol2, mz2 + tol2, rt_min, rt_max, 1);
        stats::correlation(a.intensities(), b.intensities())
    }

    /// Percentile table (101 entries) of every point intensity at
    /// `ms_level`
    pub fn intensity_distribution(&self, ms_level: i16) -> Vec<f32> {
        let intensities: Vec<f32> = self
            .scans()
            .iter()
            .filter(|s| s.ms_level == ms_level)
            .flat_map(|s| s.intensity().iter().copied())
            .collect();
        stats::quantile_distribution(&intensities)
    }
}
