use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;

use super::{Sample, SampleBuilder};
use crate::filter::FilterConfig;
use crate::formats::andi::{AndiOpener, AndiSource};
use crate::formats::{DecodeError, Format};

/// Result of loading one file.
///
/// Decoding failures keep whatever scans were admitted before the error.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The sample, possibly partial
    pub sample: Sample,
    /// Why decoding stopped early, if it did
    pub error: Option<DecodeError>,
}

impl LoadOutcome {
    /// Whether the whole file was decoded
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Discard partial data on failure
    pub fn into_result(self) -> Result<Sample, DecodeError> {
        match self.error {
            None => Ok(self.sample),
            Some(e) => Err(e),
        }
    }
}

/// Loads files into samples with one fixed filter configuration.
///
/// The loader is immutable once built and can be shared across threads,
/// so every load of a batch sees the same filters.
#[derive(Clone, Default)]
pub struct Loader {
    config: FilterConfig,
    andi_opener: Option<AndiOpener>,
}

impl Loader {
    /// Create a loader that filters with `config`
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            andi_opener: None,
        }
    }

    /// Register the reader used for ANDI/netCDF files
    pub fn with_andi_opener<F>(mut self, opener: F) -> Self
    where
        F: Fn(&Path) -> Result<Box<dyn AndiSource>, DecodeError> + Send + Sync + 'static,
    {
        self.andi_opener = Some(Arc::new(opener));
        self
    }

    /// The filter configuration applied to every load
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Load one file, picking the decoder from its name
    pub fn load(&self, path: impl AsRef<Path>) -> LoadOutcome {
        let path = path.as_ref();
        let format = Format::from_path(path);
        info!("Loading {} as {}", path.display(), format);

        let mut builder = SampleBuilder::new(&self.config);
        let error = format
            .decode(path, &mut builder, self.andi_opener.as_ref())
            .err();

        if let Some(e) = &error {
            warn!(
                "Failed to decode {} after {} scans: {}",
                path.display(),
                builder.scan_count(),
                e
            );
        }
        if builder.skipped_records() > 0 {
            warn!(
                "{}: skipped {} malformed records",
                path.display(),
                builder.skipped_records()
            );
        }

        let offered = builder.offered();
        let sample = builder.finish(path);
        info!(
            "Loaded {}: {} of {} scans kept, rt {:.2}-{:.2} min",
            sample.name,
            sample.scan_count(),
            offered,
            sample.ranges().min_rt,
            sample.ranges().max_rt
        );

        LoadOutcome { sample, error }
    }

    /// Load independent files in parallel; outcomes keep input order
    pub fn load_all<P>(&self, paths: &[P]) -> Vec<LoadOutcome>
    where
        P: AsRef<Path> + Sync,
    {
        paths.par_iter().map(|path| self.load(path)).collect()
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("config", &self.config)
            .field("andi_reader", &self.andi_opener.is_some())
            .finish()
    }
}
