//! # Jobstats
//!
//! A crate for reading and reducing the per-job statistics files a compiler writes
//! into a `-stats-output-dir`.
//!
//! Each compilation job leaves one JSON file named
//! `stats-<start_usec>-<tool>-<kind>-<random_id>.json` holding a flat map of metric
//! names to numbers. This crate turns those files into [`JobStats`] records, folds
//! records into composites with [`merge_all`], and derives reports from the
//! composites:
//!
//! - [`JobStats::incrementality_percentage`] for driver jobs
//! - [`compare_frontend_stats`] for old/new frontend regressions
//! - [`TraceEvent`] for a Chrome trace-viewer timeline
//!
//! # Examples
//!
//! ```
//! use jobstats::{compare_stats, JobStats, Thresholds};
//!
//! let old = JobStats::builder().stat("count.y", 50.0).build();
//! let new = JobStats::builder().stat("count.y", 100.0).build();
//!
//! let comparison = compare_stats(&old, &new, &Thresholds::default());
//! assert_eq!(comparison.regressions, 1);
//! assert_eq!(comparison.rows[0].delta_pct, 100.0);
//! ```

pub mod aggregate;
pub mod compare;
pub mod incrementality;
pub mod loader;
pub mod parser;
pub mod record;
pub mod trace;

pub use aggregate::*;
pub use compare::*;
pub use incrementality::*;
pub use loader::*;
pub use parser::*;
pub use record::*;
pub use trace::*;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or reducing job statistics
#[derive(Error, Debug)]
pub enum Error {
    /// A stats directory or file could not be read
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stats payload was not a flat mapping of names to numbers
    #[error("stats payload is not a flat numeric mapping: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// A file with a stats file name held an invalid payload
    #[error("malformed stats file {}: {source}", path.display())]
    MalformedFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A file name did not follow `stats-<start>-<tool>-<kind>-<id>.json`
    #[error("file name {0:?} is not a stats file name")]
    UnrecognizedFileName(String),

    /// A driver-only calculation was applied to another kind of job
    #[error("job {0} is not a driver job")]
    NotDriverJob(JobId),

    /// A driver job that neither ran nor skipped any job has no incrementality
    #[error("driver job {0} ran and skipped no jobs")]
    ZeroJobTotal(JobId),

    /// A metric pattern failed to compile
    #[error("invalid metric pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Rounds a percentage to two decimal places
pub(crate) fn round_pct(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
