//! In-place filtering transforms applied by the ingestion pipeline

use super::Scan;
use crate::stats::quantile_distribution;

/// A step wider than this multiple of the scan's median m/z step ends a peak
const PROFILE_GAP_FACTOR: f32 = 3.0;

/// Widest m/z step (Da) still sampled within one profile peak
const MAX_PROFILE_STEP: f32 = 0.5;

impl Scan {
    /// Collapse each profile peak into one centroid.
    ///
    /// Points are split into peaks at intensity valleys (a rise after a
    /// descent), at zero-intensity points, and at gaps in m/z wider than the
    /// profile sampling (several median steps, capped at
    /// [`MAX_PROFILE_STEP`]). Sparse or already-centroided points therefore
    /// stay separate. Each peak becomes one point:
    /// m/z is the intensity-weighted mean, intensity is the summed intensity
    /// of the peak. Zero-intensity runs are dropped. Point count never
    /// increases and total intensity is preserved.
    pub fn centroid(&mut self) {
        let n = self.mz.len();
        let max_step = (PROFILE_GAP_FACTOR * median_step(&self.mz)).min(MAX_PROFILE_STEP);
        let mut c_mz = Vec::new();
        let mut c_intensity = Vec::new();
        let mut start = 0;
        let mut descending = false;

        for i in 1..=n {
            let split = i == n || {
                let (prev, cur) = (self.intensity[i - 1], self.intensity[i]);
                cur == 0.0
                    || prev == 0.0
                    || (descending && cur > prev)
                    || self.mz[i] - self.mz[i - 1] > max_step
            };
            if !split {
                if self.intensity[i] < self.intensity[i - 1] {
                    descending = true;
                }
                continue;
            }

            if let Some((mz, intensity)) = collapse(&self.mz[start..i], &self.intensity[start..i]) {
                c_mz.push(mz);
                c_intensity.push(intensity);
            }
            start = i;
            descending = false;
        }

        self.mz = c_mz;
        self.intensity = c_intensity;
        self.centroided = true;
    }

    /// Drop points at or below the given intensity percentile of this scan.
    ///
    /// `percentile` outside 1..=99 leaves the scan untouched.
    pub fn quantile_filter(&mut self, percentile: u8) {
        if self.intensity.is_empty() || percentile == 0 || percentile >= 100 {
            return;
        }
        let cutoff = quantile_distribution(&self.intensity)[percentile as usize];
        self.retain_peaks(|_, intensity| intensity > cutoff);
    }

    /// Drop points below an absolute intensity floor
    pub fn intensity_filter(&mut self, min_intensity: f32) {
        self.retain_peaks(|_, intensity| intensity >= min_intensity);
    }

    /// Keep only points matching the predicate, preserving order
    pub fn retain_peaks<F>(&mut self, mut keep: F)
    where
        F: FnMut(f32, f32) -> bool,
    {
        let mut write = 0;
        for read in 0..self.mz.len() {
            let (mz, intensity) = (self.mz[read], self.intensity[read]);
            if keep(mz, intensity) {
                self.mz[write] = mz;
                self.intensity[write] = intensity;
                write += 1;
            }
        }
        self.mz.truncate(write);
        self.intensity.truncate(write);
    }
}

fn median_step(mz: &[f32]) -> f32 {
    let mut steps: Vec<f32> = mz.windows(2).map(|w| w[1] - w[0]).collect();
    if steps.is_empty() {
        return 0.0;
    }
    let mid = steps.len() / 2;
    *steps.select_nth_unstable_by(mid, f32::total_cmp).1
}

fn collapse(mz: &[f32], intensity: &[f32]) -> Option<(f32, f32)> {
    let total: f64 = intensity.iter().map(|&v| v as f64).sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = mz
        .iter()
        .zip(intensity)
        .map(|(&m, &i)| m as f64 * i as f64)
        .sum();
    Some(((weighted / total) as f32, total as f32))
}
