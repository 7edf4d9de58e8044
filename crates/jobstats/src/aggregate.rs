use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::record::{JobId, JobStats};

impl JobStats {
    /// Merges this record with another into a composite record.
    ///
    /// The composite spans the wall-clock envelope of both inputs and sums their
    /// metrics, a metric missing on one side counting as zero. Args are
    /// concatenated in order. Kind and module survive only while both sides agree. Its id is synthesized from the two
    /// input ids and means nothing on its own.
    pub fn merged_with(&self, other: &JobStats) -> JobStats {
        let mut stats = self.stats.clone();
        for (name, value) in &other.stats {
            *stats.entry(name.clone()).or_insert(0.0) += value;
        }

        let start_usec = self.start_usec.min(other.start_usec);
        let end_usec = self.end_usec().max(other.end_usec());

        let args = match (&self.args, &other.args) {
            (None, None) => None,
            (a, b) => Some(
                a.iter()
                    .chain(b.iter())
                    .flatten()
                    .cloned()
                    .collect(),
            ),
        };

        JobStats {
            kind: self.kind.combine(&other.kind),
            id: merged_id(self.id, other.id),
            module: self.module.combine(&other.module),
            start_usec,
            dur_usec: end_usec - start_usec,
            args,
            stats,
        }
    }
}

/// Merges two records, see [`JobStats::merged_with`]
pub fn merge(a: &JobStats, b: &JobStats) -> JobStats {
    a.merged_with(b)
}

/// Folds records left to right into one composite.
///
/// Returns `None` for an empty sequence and a copy of the record for a single
/// one.
///
/// # Examples
///
/// ```
/// use jobstats::{merge_all, JobKind, JobStats};
///
/// let jobs = vec![
///     JobStats::builder().kind(JobKind::Driver).start_usec(0).dur_usec(10).build(),
///     JobStats::builder().kind(JobKind::Frontend).start_usec(5).dur_usec(20).build(),
///     JobStats::builder().kind(JobKind::Driver).start_usec(40).dur_usec(5).build(),
/// ];
///
/// let drivers = merge_all(jobs.iter().filter(|j| j.is_driver_job())).unwrap();
/// assert_eq!(drivers.start_usec, 0);
/// assert_eq!(drivers.dur_usec, 45);
///
/// assert!(merge_all(jobs.iter().filter(|j| j.stats.contains_key("missing"))).is_none());
/// ```
pub fn merge_all<'a, I>(jobs: I) -> Option<JobStats>
where
    I: IntoIterator<Item = &'a JobStats>,
{
    let mut jobs = jobs.into_iter();
    let first = jobs.next()?.clone();
    Some(jobs.fold(first, |merged, job| merged.merged_with(job)))
}

fn merged_id(a: JobId, b: JobId) -> JobId {
    let mut hasher = DefaultHasher::new();
    (a, b).hash(&mut hasher);
    JobId(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{JobKind, Merged};
    use rstest::rstest;

    fn job(start_usec: u64, dur_usec: u64) -> JobStats {
        JobStats::builder()
            .start_usec(start_usec)
            .dur_usec(dur_usec)
            .build()
    }

    #[rstest]
    #[case((0, 10), (5, 20), 0, 25)]
    #[case((5, 20), (0, 10), 0, 25)]
    #[case((0, 100), (10, 5), 0, 100)]
    #[case((100, 1), (0, 1), 0, 101)]
    fn test_duration_spans_envelope(
        #[case] a: (u64, u64),
        #[case] b: (u64, u64),
        #[case] start_usec: u64,
        #[case] dur_usec: u64,
    ) {
        let a = job(a.0, a.1);
        let b = job(b.0, b.1);
        let merged = merge(&a, &b);

        assert_eq!(merged.start_usec, start_usec);
        assert_eq!(merged.dur_usec, dur_usec);
        assert_eq!(
            merged.dur_usec,
            a.end_usec().max(b.end_usec()) - a.start_usec.min(b.start_usec)
        );
    }

    #[test]
    fn test_metrics_union_and_sum() {
        let a = JobStats::builder()
            .stat("count.x", 1.0)
            .stat("count.y", 2.0)
            .build();
        let b = JobStats::builder()
            .stat("count.y", 3.0)
            .stat("count.z", 4.0)
            .build();

        let ab = merge(&a, &b);
        let ba = merge(&b, &a);

        assert_eq!(ab.stats.len(), 3);
        assert_eq!(ab.stats["count.x"], 1.0);
        assert_eq!(ab.stats["count.y"], 5.0);
        assert_eq!(ab.stats["count.z"], 4.0);
        assert_eq!(ab.stats, ba.stats);
    }

    #[test]
    fn test_kind_and_module_collapse() {
        let driver = JobStats::builder()
            .kind(JobKind::Driver)
            .module("A")
            .build();
        let other_driver = JobStats::builder()
            .kind(JobKind::Driver)
            .module("B")
            .build();
        let frontend = JobStats::builder()
            .kind(JobKind::Frontend)
            .module("A")
            .build();

        let drivers = merge(&driver, &other_driver);
        assert_eq!(drivers.kind, Merged::Single(JobKind::Driver));
        assert_eq!(drivers.module, Merged::Mixed);

        let mixed = merge(&driver, &frontend);
        assert_eq!(mixed.kind, Merged::Mixed);
        assert_eq!(mixed.module, Merged::Single("A".to_string()));

        // Merging back a matching record does not restore the kind
        let still_mixed = merge(&mixed, &driver);
        assert_eq!(still_mixed.kind, Merged::Mixed);
    }

    #[test]
    fn test_args_concatenate_in_merge_order() {
        let a = JobStats::builder().arg("a.swift").build();
        let b = JobStats::builder().build();
        let c = JobStats::builder().arg("c.swift").build();

        let merged = merge_all([&a, &b, &c]).unwrap();
        assert_eq!(
            merged.args,
            Some(vec!["a.swift".to_string(), "c.swift".to_string()])
        );

        assert_eq!(merge(&b, &b).args, None);
    }

    #[test]
    fn test_merge_all_empty_is_none() {
        let jobs: Vec<JobStats> = Vec::new();
        assert!(merge_all(&jobs).is_none());
    }

    #[test]
    fn test_merge_all_single_is_identity() {
        let x = JobStats::builder()
            .kind(JobKind::Driver)
            .id(7)
            .module("M")
            .start_usec(3)
            .dur_usec(9)
            .arg("f.swift")
            .stat("Driver.NumDriverJobsRun", 2.0)
            .build();

        assert_eq!(merge_all([&x]), Some(x));
    }

    #[test]
    fn test_merge_all_folds_left_to_right() {
        let jobs = vec![
            job(10, 5).merged_with(&job(0, 1)),
            job(30, 10),
            job(20, 1),
        ];

        let merged = merge_all(&jobs).unwrap();
        assert_eq!(merged.start_usec, 0);
        assert_eq!(merged.dur_usec, 40);
    }

    #[test]
    fn test_merged_id_is_deterministic() {
        let a = JobStats::builder().id(1).build();
        let b = JobStats::builder().id(2).build();

        assert_eq!(merge(&a, &b).id, merge(&a, &b).id);
    }
}
