//! TOML configuration file support.
//!
//! Ingestion filters can be kept in a file instead of passed as flags:
//!
//! ```toml
//! # mzextract.toml
//! [filters]
//! min_intensity = 1000.0
//! centroid_scans = true
//! intensity_quantile = 5
//! ms_level = 1
//! polarity = "negative"
//! ```
//!
//! Flags given on the command line override values from the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use mzextract::filter::FilterConfig;

/// Root configuration structure for mzextract.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Ingestion filters applied to every loaded file.
    #[serde(default)]
    pub filters: FilterConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}
