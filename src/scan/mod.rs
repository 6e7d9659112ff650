//! The atomic unit of a sample: one spectrum plus its acquisition metadata.
//!
//! A [`Scan`] owns two co-indexed arrays (m/z ascending, intensity
//! non-negative). The arrays are private so that every decoder and every
//! filter goes through [`Scan::set_peaks`], which enforces those invariants.

use serde::{Deserialize, Serialize};

mod transforms;

#[cfg(test)]
mod tests;

/// Ion source polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Positive ion mode
    Positive,
    /// Negative ion mode
    Negative,
    /// Not reported by the instrument
    #[default]
    Unknown,
}

impl Polarity {
    /// Map the integer convention (1, -1, 0) used by instrument files
    pub fn from_sign(sign: i32) -> Self {
        match sign.signum() {
            1 => Polarity::Positive,
            -1 => Polarity::Negative,
            _ => Polarity::Unknown,
        }
    }

    /// Integer convention: 1 positive, -1 negative, 0 unknown
    pub fn as_sign(&self) -> i8 {
        match self {
            Polarity::Positive => 1,
            Polarity::Negative => -1,
            Polarity::Unknown => 0,
        }
    }

    /// Parse a leading `+` / `-` token
    pub fn from_token(token: &str) -> Self {
        match token.trim_start().chars().next() {
            Some('+') => Polarity::Positive,
            Some('-') => Polarity::Negative,
            _ => Polarity::Unknown,
        }
    }
}

/// One spectrum
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scan {
    /// Position in the owning sample (zero-based, assigned on admission)
    pub index: usize,
    /// MS level (1 for full scan, 2+ for fragmentation scans)
    pub ms_level: i16,
    /// Retention time in minutes
    pub rt: f32,
    /// Ion polarity
    pub polarity: Polarity,
    /// Precursor m/z, 0 when not applicable
    pub precursor_mz: f32,
    /// Product (or base peak) m/z, 0 when not applicable
    pub product_mz: f32,
    /// Collision energy
    pub collision_energy: f32,
    /// Vendor filter line / SRM transition identifier
    pub filter_line: String,
    /// Free-text scan type label
    pub scan_type: String,
    /// Whether the peaks are centroided
    pub centroided: bool,
    mz: Vec<f32>,
    intensity: Vec<f32>,
}

impl Scan {
    /// Create an empty scan with acquisition metadata
    pub fn new(ms_level: i16, rt: f32, precursor_mz: f32, polarity: Polarity) -> Self {
        Self {
            ms_level: ms_level.max(1),
            rt,
            precursor_mz,
            polarity,
            ..Default::default()
        }
    }

    /// Builder-style variant of [`Scan::set_peaks`]
    pub fn with_peaks(mut self, mz: Vec<f32>, intensity: Vec<f32>) -> Self {
        self.set_peaks(mz, intensity);
        self
    }

    /// Replace the peak arrays.
    ///
    /// Arrays of unequal length are truncated to the shorter one, negative or
    /// NaN intensities become 0, and the pairs are sorted by m/z if the source
    /// did not deliver them ascending.
    pub fn set_peaks(&mut self, mut mz: Vec<f32>, mut intensity: Vec<f32>) {
        let n = mz.len().min(intensity.len());
        mz.truncate(n);
        intensity.truncate(n);
        for v in intensity.iter_mut() {
            if v.is_nan() || *v < 0.0 {
                *v = 0.0;
            }
        }

        if !mz.windows(2).all(|w| w[0] <= w[1]) {
            let mut pairs: Vec<(f32, f32)> = mz.into_iter().zip(intensity).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            (mz, intensity) = pairs.into_iter().unzip();
        }

        self.mz = mz;
        self.intensity = intensity;
    }

    /// m/z values, ascending
    pub fn mz(&self) -> &[f32] {
        &self.mz
    }

    /// Intensities, co-indexed with [`Scan::mz`]
    pub fn intensity(&self) -> &[f32] {
        &self.intensity
    }

    /// Iterate over (m/z, intensity) pairs
    pub fn peaks(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Number of points
    pub fn nobs(&self) -> usize {
        self.mz.len()
    }

    /// Whether the scan has no points
    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    /// Sum of all intensities
    pub fn total_intensity(&self) -> f64 {
        self.intensity.iter().map(|&v| v as f64).sum()
    }

    /// The most intense point as (m/z, intensity), or (0, 0) for an empty scan
    pub fn base_peak(&self) -> (f32, f32) {
        highest_in(&self.mz, &self.intensity)
    }

    /// The most intense point with `mzmin <= m/z <= mzmax`, or (0, 0) if none.
    ///
    /// Binary search for the lower bound, then a linear walk until the upper
    /// bound is passed.
    pub fn find_highest_intensity_in(&self, mzmin: f32, mzmax: f32) -> (f32, f32) {
        let lb = self.mz.partition_point(|&mz| mz < mzmin);
        let ub = lb + self.mz[lb..].partition_point(|&mz| mz <= mzmax);
        highest_in(&self.mz[lb..ub], &self.intensity[lb..ub])
    }
}

fn highest_in(mz: &[f32], intensity: &[f32]) -> (f32, f32) {
    let mut best = (0.0, 0.0);
    for (&m, &i) in mz.iter().zip(intensity) {
        if i > best.1 {
            best = (m, i);
        }
    }
    best
}
