use log::warn;

use crate::aggregate::merge_all;
use crate::record::JobStats;
use crate::{round_pct, Error};

/// Driver metric counting the jobs that ran
pub const DRIVER_JOBS_RUN: &str = "Driver.NumDriverJobsRun";

/// Driver metric counting the jobs skipped as up to date
pub const DRIVER_JOBS_SKIPPED: &str = "Driver.NumDriverJobsSkipped";

/// Incrementality of one driver job
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalityRow {
    pub incrementality_pct: f64,
    pub name: String,
}

/// Incrementality of the same build in an old and a new stats tree
#[derive(Debug, Clone, PartialEq)]
pub struct PairedIncrementalityRow {
    pub old_pct: f64,
    pub old_skip: f64,
    pub new_pct: f64,
    pub new_skip: f64,
    pub delta_pct: f64,
    pub delta_skip: f64,
    pub name: String,
}

impl JobStats {
    pub fn driver_jobs_ran(&self) -> f64 {
        self.stat(DRIVER_JOBS_RUN)
    }

    pub fn driver_jobs_skipped(&self) -> f64 {
        self.stat(DRIVER_JOBS_SKIPPED)
    }

    pub fn driver_jobs_total(&self) -> f64 {
        self.driver_jobs_ran() + self.driver_jobs_skipped()
    }

    /// Percentage of the driver's jobs that ran, rounded to two places.
    ///
    /// # Errors
    ///
    /// * `NotDriverJob` if this is not a driver record
    /// * `ZeroJobTotal` if the driver neither ran nor skipped any job
    pub fn incrementality_percentage(&self) -> Result<f64, Error> {
        if !self.is_driver_job() {
            return Err(Error::NotDriverJob(self.id));
        }

        let total = self.driver_jobs_total();
        if total == 0.0 {
            return Err(Error::ZeroJobTotal(self.id));
        }

        Ok(round_pct(self.driver_jobs_ran() / total * 100.0))
    }
}

/// Reports the incrementality of every driver job in `jobs` under `name`.
///
/// Driver jobs whose incrementality cannot be computed are logged and left out.
pub fn incrementality_rows(name: &str, jobs: &[JobStats]) -> Vec<IncrementalityRow> {
    jobs.iter()
        .filter(|job| job.is_driver_job())
        .filter_map(|job| match job.incrementality_percentage() {
            Ok(incrementality_pct) => Some(IncrementalityRow {
                incrementality_pct,
                name: name.to_string(),
            }),
            Err(e) => {
                warn!("Skipping incrementality of {}: {}", name, e);
                None
            }
        })
        .collect()
}

/// Compares the merged driver jobs of an old and a new build.
///
/// Returns `None` when either side has no driver job or its incrementality
/// cannot be computed.
pub fn paired_incrementality(
    name: &str,
    old: &[JobStats],
    new: &[JobStats],
) -> Option<PairedIncrementalityRow> {
    let old_driver = merge_all(old.iter().filter(|job| job.is_driver_job()))?;
    let new_driver = merge_all(new.iter().filter(|job| job.is_driver_job()))?;

    let (old_pct, new_pct) = match (
        old_driver.incrementality_percentage(),
        new_driver.incrementality_percentage(),
    ) {
        (Ok(old_pct), Ok(new_pct)) => (old_pct, new_pct),
        (Err(e), _) | (_, Err(e)) => {
            warn!("Skipping incrementality of {}: {}", name, e);
            return None;
        }
    };

    let old_skip = old_driver.driver_jobs_skipped();
    let new_skip = new_driver.driver_jobs_skipped();

    Some(PairedIncrementalityRow {
        old_pct,
        old_skip,
        new_pct,
        new_skip,
        delta_pct: round_pct(new_pct - old_pct),
        delta_skip: new_skip - old_skip,
        name: name.to_string(),
    })
}
