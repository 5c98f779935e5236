//! Pre-materializing variants ahead of traffic.
//!
//! Each job goes through the same validate / check / materialize path a
//! request would, so warming a variant that is already fresh costs one stat.
//! Jobs run in parallel on the global rayon pool; the binary sizes that pool
//! from `processing.max_processes`.

use crate::handler::{HandleError, ImagePrinter, Outcome};
use crate::options::OptionSet;
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// One variant to warm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmJob {
    pub source: String,
    pub options: OptionSet,
}

impl WarmJob {
    pub fn new(source: impl Into<String>, options: OptionSet) -> Self {
        Self {
            source: source.into(),
            options,
        }
    }
}

/// Result of one job.
#[derive(Debug)]
pub struct WarmResult {
    pub job: WarmJob,
    pub outcome: Result<(PathBuf, Outcome), HandleError>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmStats {
    pub cached: u32,
    pub rendered: u32,
    pub failed: u32,
}

impl WarmStats {
    pub fn record(&mut self, result: &WarmResult) {
        match &result.outcome {
            Ok((_, Outcome::Cached)) => self.cached += 1,
            Ok((_, Outcome::Rendered)) => self.rendered += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cached + self.rendered + self.failed
    }
}

impl fmt::Display for WarmStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached > 0 || self.failed > 0 {
            if self.failed > 0 {
                write!(
                    f,
                    "{} cached, {} rendered, {} failed ({} total)",
                    self.cached,
                    self.rendered,
                    self.failed,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} rendered ({} total)",
                    self.cached,
                    self.rendered,
                    self.total()
                )
            }
        } else {
            write!(f, "{} rendered", self.rendered)
        }
    }
}

#[derive(Debug, Default)]
pub struct WarmReport {
    pub results: Vec<WarmResult>,
    pub stats: WarmStats,
}

/// Materialize every job that is not already cached. Results keep job order.
pub fn warm(printer: &ImagePrinter, jobs: Vec<WarmJob>) -> WarmReport {
    let results: Vec<WarmResult> = jobs
        .into_par_iter()
        .map(|job| {
            let outcome = printer
                .variant(&job.source, &job.options)
                .map(|variant| (variant.path, variant.outcome));
            match &outcome {
                Ok((path, outcome)) => {
                    info!(source = %job.source, path = %path.display(), %outcome, "warmed")
                }
                Err(e) => warn!(source = %job.source, error = %e, "warm-up failed"),
            }
            WarmResult { job, outcome }
        })
        .collect();

    let mut stats = WarmStats::default();
    for result in &results {
        stats.record(result);
    }
    WarmReport { results, stats }
}
