use std::collections::BTreeMap;
use std::fmt;

/// Prefix of metrics that hold durations, converted to microseconds on load
pub const TIME_PREFIX: &str = "time.";

/// Module name used when a job's stats do not name one
pub const DEFAULT_MODULE: &str = "module";

/// How a mixed categorical field is rendered in reports
pub const MERGED_LABEL: &str = "<merged>";

/// Metric name to value, iterated in name order
pub type Metrics = BTreeMap<String, f64>;

/// Role of a compilation job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKind {
    /// The build-orchestration process
    Driver,
    /// A per-file compilation
    Frontend,
    /// Any other tag reported by the instrumentation
    Other(String),
}

impl JobKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "driver" => JobKind::Driver,
            "frontend" => JobKind::Frontend,
            other => JobKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobKind::Driver => "driver",
            JobKind::Frontend => "frontend",
            JobKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorical field of a possibly merged record.
///
/// A record built from one job holds `Single`. Merging two records keeps the
/// value while both sides agree and collapses to `Mixed` as soon as they differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Merged<T> {
    Single(T),
    Mixed,
}

impl<T: Clone + PartialEq> Merged<T> {
    /// Combines two field values under the collapse-on-mismatch rule
    pub fn combine(&self, other: &Merged<T>) -> Merged<T> {
        match (self, other) {
            (Merged::Single(a), Merged::Single(b)) if a == b => Merged::Single(a.clone()),
            _ => Merged::Mixed,
        }
    }
}

impl<T> Merged<T> {
    /// Returns the common value, or `None` for a mixed field
    pub fn single(&self) -> Option<&T> {
        match self {
            Merged::Single(value) => Some(value),
            Merged::Mixed => None,
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Merged::Mixed)
    }
}

impl<T: fmt::Display> fmt::Display for Merged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Merged::Single(value) => value.fmt(f),
            Merged::Mixed => f.write_str(MERGED_LABEL),
        }
    }
}

/// Opaque job identifier taken from the stats file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Measured execution of one job, or the composite of several merged jobs
#[derive(Debug, Clone, PartialEq)]
pub struct JobStats {
    pub kind: Merged<JobKind>,
    pub id: JobId,
    pub module: Merged<String>,
    /// Start timestamp in microseconds
    pub start_usec: u64,
    /// Duration in microseconds, never zero
    pub dur_usec: u64,
    /// Display-only annotations, usually the source file of the job
    pub args: Option<Vec<String>>,
    pub stats: Metrics,
}

impl JobStats {
    pub fn builder() -> JobStatsBuilder {
        JobStatsBuilder::default()
    }

    pub fn is_driver_job(&self) -> bool {
        self.kind == Merged::Single(JobKind::Driver)
    }

    pub fn is_frontend_job(&self) -> bool {
        self.kind == Merged::Single(JobKind::Frontend)
    }

    /// End timestamp in microseconds
    pub fn end_usec(&self) -> u64 {
        self.start_usec.saturating_add(self.dur_usec)
    }

    /// Value of a metric, or zero when the job did not report it
    pub fn stat(&self, name: &str) -> f64 {
        self.stats.get(name).copied().unwrap_or(0.0)
    }
}

/// Builder for [`JobStats`] values assembled outside of a stats directory
#[derive(Debug, Clone)]
pub struct JobStatsBuilder {
    stats: JobStats,
}

impl Default for JobStatsBuilder {
    fn default() -> Self {
        Self {
            stats: JobStats {
                kind: Merged::Single(JobKind::Frontend),
                id: JobId(0),
                module: Merged::Single(DEFAULT_MODULE.to_string()),
                start_usec: 0,
                dur_usec: 1,
                args: None,
                stats: Metrics::new(),
            },
        }
    }
}

impl JobStatsBuilder {
    pub fn kind(mut self, kind: JobKind) -> Self {
        self.stats.kind = Merged::Single(kind);
        self
    }

    pub fn id(mut self, id: u64) -> Self {
        self.stats.id = JobId(id);
        self
    }

    pub fn module(mut self, module: &str) -> Self {
        self.stats.module = Merged::Single(module.to_string());
        self
    }

    pub fn start_usec(mut self, start_usec: u64) -> Self {
        self.stats.start_usec = start_usec;
        self
    }

    /// Sets the duration, clamped to at least one microsecond
    pub fn dur_usec(mut self, dur_usec: u64) -> Self {
        self.stats.dur_usec = dur_usec.max(1);
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.stats
            .args
            .get_or_insert_with(Vec::new)
            .push(arg.to_string());
        self
    }

    pub fn stat(mut self, name: &str, value: f64) -> Self {
        self.stats.stats.insert(name.to_string(), value);
        self
    }

    pub fn build(self) -> JobStats {
        self.stats
    }
}
