use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Status of a single job node, and of a runner as a whole.
///
/// `Queue -> Running -> {Done, Failed}`. The terminal states only go back to
/// `Queue` through an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queue,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Queue
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queue => "QUEUE",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One step of the job lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load,
    Cache,
    Uncache,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Cache => "cache",
            Stage::Uncache => "uncache",
        };
        f.write_str(s)
    }
}

/// What the runner does when a job's `uncache()` hook fails.
///
/// - `Fail`: record the failure on the producer node like any other
///   lifecycle failure, so it counts as a failed root cause (default
///   behaviour). A node that already failed keeps its earlier error.
/// - `Warn`: log and move on, treating the release as best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncacheFailure {
    Warn,
    Fail,
}

impl Default for UncacheFailure {
    fn default() -> Self {
        UncacheFailure::Fail
    }
}

impl FromStr for UncacheFailure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(UncacheFailure::Warn),
            "fail" => Ok(UncacheFailure::Fail),
            other => Err(format!(
                "invalid uncache_failure: {other} (expected \"warn\" or \"fail\")"
            )),
        }
    }
}

/// Log level as accepted in config files and the `ETLDAG_LOG` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}
