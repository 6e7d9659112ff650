//! Ingestion filter configuration
//!
//! Every scan offered by a decoder passes, in order, through:
//!
//! 1. an MS-level filter (reject on mismatch)
//! 2. a polarity filter (reject on mismatch)
//! 3. optional centroiding (skipped for scans the source marks centroided)
//! 4. optional per-scan intensity quantile filter
//! 5. optional absolute intensity floor
//!
//! The configuration is an immutable value handed to each load, so all
//! concurrent loads of a batch see the same settings.
//!
//! ```toml
//! [filters]
//! min_intensity = 500.0
//! centroid_scans = true
//! intensity_quantile = 10
//! ms_level = 1
//! polarity = "positive"
//! ```

use serde::{Deserialize, Serialize};

use crate::scan::{Polarity, Scan};

/// Per-scan ingestion filters applied identically by every decoder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop points below this intensity
    pub min_intensity: Option<f32>,
    /// Centroid every admitted scan
    pub centroid_scans: bool,
    /// Drop points at or below this per-scan intensity percentile (0 = off)
    pub intensity_quantile: u8,
    /// Only admit scans of this MS level
    pub ms_level: Option<i16>,
    /// Only admit scans of this polarity
    pub polarity: Option<Polarity>,
}

impl FilterConfig {
    /// Build from the integer encoding used by external configuration
    /// collaborators, where -1 or 0 means "disabled".
    pub fn from_legacy(
        min_intensity: i32,
        centroid_scans: bool,
        intensity_quantile: i32,
        ms_level: i32,
        polarity: i32,
    ) -> Self {
        Self {
            min_intensity: (min_intensity > 0).then_some(min_intensity as f32),
            centroid_scans,
            intensity_quantile: intensity_quantile.clamp(0, 100) as u8,
            ms_level: (ms_level != 0).then_some(ms_level as i16),
            polarity: (polarity != 0).then(|| Polarity::from_sign(polarity)),
        }
    }

    /// Whether any filter or transform is active
    pub fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }

    /// Run a scan through the pipeline. Returns `None` if the scan is
    /// rejected, otherwise the transformed scan.
    pub fn apply(&self, mut scan: Scan) -> Option<Scan> {
        if let Some(level) = self.ms_level {
            if scan.ms_level != level {
                return None;
            }
        }
        if let Some(polarity) = self.polarity {
            if scan.polarity != polarity {
                return None;
            }
        }

        if self.centroid_scans && !scan.centroided {
            scan.centroid();
        }
        if self.intensity_quantile > 0 {
            scan.quantile_filter(self.intensity_quantile);
        }
        if let Some(floor) = self.min_intensity {
            if floor > 0.0 {
                scan.intensity_filter(floor);
            }
        }

        Some(scan)
    }
}
