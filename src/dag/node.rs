// src/dag/node.rs

//! Scheduling state attached to each job in the graph.

use std::fmt;

use thiserror::Error;

use crate::dag::graph::Keyed;
use crate::job::{Dependency, Job, JobId};
use crate::types::{JobStatus, Stage};

/// Why a node ended up `Failed`.
#[derive(Error, Debug)]
pub enum JobError {
    /// The job's own lifecycle call failed: a genuine root cause.
    #[error("{stage} failed: {source}")]
    Lifecycle {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// The job was skipped because upstream jobs failed.
    ///
    /// Lists every failed parent, in parent order.
    #[error("skipped: upstream job(s) {} failed", .parents.join(", "))]
    ParentFailed { parents: Vec<JobId> },
}

impl JobError {
    /// `true` for a job's own failure, `false` for an inherited one.
    pub fn is_root_cause(&self) -> bool {
        matches!(self, JobError::Lifecycle { .. })
    }

    /// The lifecycle stage that failed, for genuine failures.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            JobError::Lifecycle { stage, .. } => Some(*stage),
            JobError::ParentFailed { .. } => None,
        }
    }

    /// Failed parents recorded by an inherited failure.
    pub fn failed_parents(&self) -> &[JobId] {
        match self {
            JobError::ParentFailed { parents } => parents,
            JobError::Lifecycle { .. } => &[],
        }
    }
}

/// A job plus its scheduling state.
///
/// `job` is `None` while the node only exists because a consumer declared it
/// by key; such a node must receive an instance before the graph can run.
pub struct JobNode {
    id: JobId,
    job: Option<Box<dyn Job>>,
    pub(crate) status: JobStatus,
    pub(crate) error: Option<JobError>,
    /// `cache()` succeeded and `uncache()` has not run since.
    pub(crate) cached: bool,
    /// `uncache()` already ran in this run.
    pub(crate) released: bool,
}

impl JobNode {
    pub fn new(job: Box<dyn Job>) -> Self {
        Self {
            id: job.id().to_string(),
            job: Some(job),
            status: JobStatus::Queue,
            error: None,
            cached: false,
            released: false,
        }
    }

    /// Stand-in node for a declared producer.
    ///
    /// Carries a default-constructed instance when the declaration has a
    /// placeholder, otherwise no instance at all.
    pub fn placeholder(dep: &Dependency) -> Self {
        Self {
            id: dep.producer.clone(),
            job: dep.placeholder.map(|make| make()),
            status: JobStatus::Queue,
            error: None,
            cached: false,
            released: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn job(&self) -> Option<&dyn Job> {
        self.job.as_deref()
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut (dyn Job + 'static)> {
        self.job.as_deref_mut()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Record that `parent` failed, so this node will not run.
    ///
    /// Nodes that already finished on their own are left untouched.
    pub(crate) fn mark_parent_failed(&mut self, parent: &str) {
        match (self.status, self.error.as_mut()) {
            (JobStatus::Failed, Some(JobError::ParentFailed { parents })) => {
                if !parents.iter().any(|p| p == parent) {
                    parents.push(parent.to_string());
                }
            }
            (JobStatus::Queue, _) => {
                self.status = JobStatus::Failed;
                self.error = Some(JobError::ParentFailed {
                    parents: vec![parent.to_string()],
                });
            }
            _ => {}
        }
    }

    pub(crate) fn fail(&mut self, stage: Stage, source: anyhow::Error) {
        self.status = JobStatus::Failed;
        self.error = Some(JobError::Lifecycle { stage, source });
    }

    /// Back to `Queue` with no error; the job instance is kept.
    pub(crate) fn reset(&mut self) {
        self.status = JobStatus::Queue;
        self.error = None;
        self.cached = false;
        self.released = false;
    }
}

impl Keyed for JobNode {
    fn key(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for JobNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobNode")
            .field("id", &self.id)
            .field("has_instance", &self.job.is_some())
            .field("status", &self.status)
            .field("error", &self.error)
            .field("cached", &self.cached)
            .field("released", &self.released)
            .finish()
    }
}
