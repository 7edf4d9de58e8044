//! Chrome trace-viewer events for job records.
//!
//! Each record becomes one complete event (`"ph": "X"`) on thread 1 of a
//! process named after the job id, so a list of events serializes directly into
//! the JSON array form accepted by `chrome://tracing` and Perfetto.

use serde::{Deserialize, Serialize};

use crate::record::JobStats;

/// Thread id shared by all job events
pub const TRACE_THREAD_ID: u32 = 1;

/// Event phase of a trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Complete event with start timestamp and duration
    #[serde(rename = "X")]
    Complete,
}

/// One complete event in the Chrome trace format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Module of the job
    pub name: String,
    /// Kind of the job
    pub cat: String,
    pub ph: Phase,
    /// Job id
    pub pid: u64,
    pub tid: u32,
    /// Start timestamp in microseconds
    pub ts: u64,
    /// Duration in microseconds
    pub dur: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl From<&JobStats> for TraceEvent {
    fn from(job: &JobStats) -> Self {
        Self {
            name: job.module.to_string(),
            cat: job.kind.to_string(),
            ph: Phase::Complete,
            pid: job.id.0,
            tid: TRACE_THREAD_ID,
            ts: job.start_usec,
            dur: job.dur_usec,
            args: job.args.clone(),
        }
    }
}
