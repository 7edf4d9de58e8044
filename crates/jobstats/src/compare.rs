use crate::aggregate::merge_all;
use crate::record::{JobStats, TIME_PREFIX};
use crate::round_pct;

/// Noise floors below which a metric change is not reported
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Smallest relative change worth reporting, in percent
    pub delta_pct: f64,
    /// Smallest absolute change of a `time.` metric worth reporting, in microseconds
    pub delta_usec: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            delta_pct: 0.01,
            delta_usec: 100_000,
        }
    }
}

/// A reported change of one metric
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub old: f64,
    pub new: f64,
    pub delta_pct: f64,
    pub name: String,
}

/// Outcome of comparing two builds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Changes above the thresholds, in metric name order
    pub rows: Vec<ComparisonRow>,
    /// Number of reported changes that went up
    pub regressions: usize,
}

/// Compares every metric of `old` that `new` also reports.
///
/// Metrics that are zero on either side are skipped. A change is reported when
/// its relative size reaches `thresholds.delta_pct` and, for `time.` metrics,
/// its absolute size reaches `thresholds.delta_usec`. Every reported increase
/// counts as a regression.
pub fn compare_stats(old: &JobStats, new: &JobStats, thresholds: &Thresholds) -> Comparison {
    let mut comparison = Comparison::default();

    for (name, &old_value) in &old.stats {
        let Some(&new_value) = new.stats.get(name) else {
            continue;
        };
        if old_value == 0.0 || new_value == 0.0 {
            continue;
        }

        let delta = new_value - old_value;
        let delta_pct = round_pct(delta / old_value * 100.0);

        if name.starts_with(TIME_PREFIX) && delta.abs() < thresholds.delta_usec as f64 {
            continue;
        }
        if delta_pct.abs() < thresholds.delta_pct {
            continue;
        }

        comparison.rows.push(ComparisonRow {
            old: old_value,
            new: new_value,
            delta_pct,
            name: name.clone(),
        });
        if delta > 0.0 {
            comparison.regressions += 1;
        }
    }

    comparison
}

/// Merges the frontend jobs of each build and compares the composites.
///
/// A build without frontend jobs yields an empty comparison.
pub fn compare_frontend_stats(
    old: &[JobStats],
    new: &[JobStats],
    thresholds: &Thresholds,
) -> Comparison {
    let old_merged = merge_all(old.iter().filter(|job| job.is_frontend_job()));
    let new_merged = merge_all(new.iter().filter(|job| job.is_frontend_job()));

    match (old_merged, new_merged) {
        (Some(old), Some(new)) => compare_stats(&old, &new, thresholds),
        _ => Comparison::default(),
    }
}
