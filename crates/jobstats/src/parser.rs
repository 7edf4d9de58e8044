use regex::Regex;

use crate::record::{JobId, JobKind, JobStats, Merged, Metrics, DEFAULT_MODULE, TIME_PREFIX};
use crate::Error;

const STATS_FILE_PATTERN: &str =
    r"^stats-(?P<start>\d+)-(?P<tool>[^-]+)-(?P<kind>\w+)-(?P<id>\d+)\.json$";

/// Metadata encoded in a stats file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsFileName {
    pub start_usec: u64,
    /// Name of the tool that wrote the file, e.g. `swift`
    pub tool: String,
    pub kind: JobKind,
    /// Random per-file number, not a unix pid
    pub id: JobId,
}

/// Recognizes `stats-<start_usec>-<tool>-<kind>-<random_id>.json` file names
pub struct StatsFileMatcher {
    pattern: Regex,
}

impl StatsFileMatcher {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            pattern: Regex::new(STATS_FILE_PATTERN)?,
        })
    }

    /// Extracts the job metadata from a file name.
    ///
    /// # Errors
    ///
    /// Returns `UnrecognizedFileName` if the name does not follow the stats file
    /// naming pattern.
    pub fn parse(&self, file_name: &str) -> Result<StatsFileName, Error> {
        let unrecognized = || Error::UnrecognizedFileName(file_name.to_string());

        let caps = self.pattern.captures(file_name).ok_or_else(unrecognized)?;

        // Digit runs too long for u64 are not names we produced
        let start_usec = caps["start"].parse().map_err(|_| unrecognized())?;
        let id = caps["id"].parse().map_err(|_| unrecognized())?;

        Ok(StatsFileName {
            start_usec,
            tool: caps["tool"].to_string(),
            kind: JobKind::from_tag(&caps["kind"]),
            id: JobId(id),
        })
    }
}

/// Parses the JSON payload of a stats file into a flat metric map.
///
/// A key repeated in the payload keeps its last value.
pub fn parse_raw_stats(payload: &str) -> Result<Metrics, Error> {
    Ok(serde_json::from_str(payload)?)
}

/// Builds the record for one job from its file metadata and raw metrics.
///
/// Metrics under `time.` hold seconds and are converted to whole microseconds.
/// A metric named `time.<kind>.<module><suffix>.wall` (the kind optionally
/// prefixed with `<tool>-`) sets the job's duration and module, and its suffix,
/// without the leading separator, becomes the job's only argument. When several
/// metrics match, the last in name order wins.
pub fn job_stats_from_raw(file: &StatsFileName, raw: Metrics) -> Result<JobStats, Error> {
    let wall_pattern = wall_clock_pattern(&file.tool, &file.kind)?;

    let mut dur_usec = 1;
    let mut module = DEFAULT_MODULE.to_string();
    let mut args = None;
    let mut stats = Metrics::new();

    for (name, value) in raw {
        let value = if name.starts_with(TIME_PREFIX) {
            (value * 1_000_000.0).trunc()
        } else {
            value
        };

        if let Some(caps) = wall_pattern.captures(&name) {
            // A sub-microsecond wall time still has to show up in a trace
            dur_usec = (value as u64).max(1);
            module = caps["module"].to_string();

            let suffix = &caps["suffix"];
            let suffix = suffix.strip_prefix('.').unwrap_or(suffix);
            args = if suffix.is_empty() {
                None
            } else {
                Some(vec![suffix.to_string()])
            };
        }

        stats.insert(name, value);
    }

    Ok(JobStats {
        kind: Merged::Single(file.kind.clone()),
        id: file.id,
        module: Merged::Single(module),
        start_usec: file.start_usec,
        dur_usec,
        args,
        stats,
    })
}

/// Parses one stats file given its metadata and JSON payload
pub fn parse_job_stats(file: &StatsFileName, payload: &str) -> Result<JobStats, Error> {
    let raw = parse_raw_stats(payload)?;
    job_stats_from_raw(file, raw)
}

fn wall_clock_pattern(tool: &str, kind: &JobKind) -> Result<Regex, Error> {
    let pattern = format!(
        r"^time\.(?:{}-)?{}\.(?P<module>[^.]+)(?P<suffix>.*)\.wall$",
        regex::escape(tool),
        regex::escape(kind.as_str())
    );
    Ok(Regex::new(&pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frontend_file() -> StatsFileName {
        StatsFileName {
            start_usec: 1000,
            tool: "swift".to_string(),
            kind: JobKind::Frontend,
            id: JobId(42),
        }
    }

    #[rstest]
    #[case("stats-1000-swift-frontend-42.json", 1000, "swift", JobKind::Frontend, 42)]
    #[case("stats-7-swift-driver-9.json", 7, "swift", JobKind::Driver, 9)]
    #[case("stats-5-clang-backend-1.json", 5, "clang", JobKind::Other("backend".to_string()), 1)]
    fn test_parse_file_name(
        #[case] name: &str,
        #[case] start_usec: u64,
        #[case] tool: &str,
        #[case] kind: JobKind,
        #[case] id: u64,
    ) {
        let matcher = StatsFileMatcher::new().unwrap();
        let file = matcher.parse(name).unwrap();

        assert_eq!(file.start_usec, start_usec);
        assert_eq!(file.tool, tool);
        assert_eq!(file.kind, kind);
        assert_eq!(file.id, JobId(id));
    }

    #[rstest]
    #[case("stats-1000-swift-frontend-42.txt")]
    #[case("stats-abc-swift-frontend-42.json")]
    #[case("prefix-stats-1000-swift-frontend-42.json")]
    #[case("stats-1000-frontend-42.json")]
    #[case("stats-99999999999999999999999-swift-frontend-42.json")]
    fn test_reject_file_name(#[case] name: &str) {
        let matcher = StatsFileMatcher::new().unwrap();
        assert!(matches!(
            matcher.parse(name),
            Err(Error::UnrecognizedFileName(n)) if n == name
        ));
    }

    #[test]
    fn test_wall_clock_sets_duration_module_and_args() {
        let payload = r#"{"time.frontend.MyModule.foo.wall": 1.5}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.dur_usec, 1_500_000);
        assert_eq!(job.module, Merged::Single("MyModule".to_string()));
        assert_eq!(job.args, Some(vec!["foo".to_string()]));
        assert_eq!(job.stats["time.frontend.MyModule.foo.wall"], 1_500_000.0);
    }

    #[test]
    fn test_wall_clock_with_tool_qualified_kind() {
        let payload = r#"{"time.swift-frontend.Core.Array.swift.wall": 0.25}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.dur_usec, 250_000);
        assert_eq!(job.module, Merged::Single("Core".to_string()));
        assert_eq!(job.args, Some(vec!["Array.swift".to_string()]));
    }

    #[test]
    fn test_wall_clock_without_suffix_has_no_args() {
        let payload = r#"{"time.swift-frontend.Core.wall": 2}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.dur_usec, 2_000_000);
        assert_eq!(job.module, Merged::Single("Core".to_string()));
        assert_eq!(job.args, None);
    }

    #[test]
    fn test_wall_clock_of_other_kind_is_ignored() {
        let payload = r#"{"time.swift-driver.Core.wall": 2}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.dur_usec, 1);
        assert_eq!(job.module, Merged::Single("module".to_string()));
        assert_eq!(job.args, None);
        assert_eq!(job.stats["time.swift-driver.Core.wall"], 2_000_000.0);
    }

    #[test]
    fn test_defaults_without_wall_clock() {
        let payload = r#"{"AST.NumSourceLines": 120, "time.Sema.typecheck": 0.0000009}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.kind, Merged::Single(JobKind::Frontend));
        assert_eq!(job.id, JobId(42));
        assert_eq!(job.start_usec, 1000);
        assert_eq!(job.dur_usec, 1);
        assert_eq!(job.module, Merged::Single("module".to_string()));
        assert_eq!(job.args, None);

        // Non-time metrics are kept as they are, time metrics truncate
        assert_eq!(job.stats["AST.NumSourceLines"], 120.0);
        assert_eq!(job.stats["time.Sema.typecheck"], 0.0);
    }

    #[test]
    fn test_tiny_wall_clock_keeps_minimum_duration() {
        let payload = r#"{"time.frontend.M.wall": 0.0000001}"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.dur_usec, 1);
        assert_eq!(job.module, Merged::Single("M".to_string()));
    }

    #[test]
    fn test_last_matching_key_in_name_order_wins() {
        let payload = r#"{
            "time.frontend.Zeta.b.wall": 2.0,
            "time.frontend.Alpha.a.wall": 1.0
        }"#;
        let job = parse_job_stats(&frontend_file(), payload).unwrap();

        assert_eq!(job.module, Merged::Single("Zeta".to_string()));
        assert_eq!(job.dur_usec, 2_000_000);
        assert_eq!(job.args, Some(vec!["b".to_string()]));
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        let raw = parse_raw_stats(r#"{"count.y": 1, "count.y": 7}"#).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw["count.y"], 7.0);
    }

    #[rstest]
    #[case("[1, 2, 3]")]
    #[case(r#"{"count.y": "many"}"#)]
    #[case(r#"{"nested": {"count.y": 1}}"#)]
    #[case("not json")]
    fn test_reject_non_numeric_payload(#[case] payload: &str) {
        assert!(matches!(
            parse_job_stats(&frontend_file(), payload),
            Err(Error::InvalidPayload(_))
        ));
    }
}
