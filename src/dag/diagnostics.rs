// src/dag/diagnostics.rs

//! Post-run queries: which jobs failed, which of them are the real causes,
//! and through which paths a failure was reached.

use std::collections::BTreeMap;

use crate::dag::runner::JobRunner;
use crate::errors::Result;
use crate::job::JobId;
use crate::types::JobStatus;

impl JobRunner {
    /// Children of `id` that have not started yet.
    pub fn children_in_queue(&self, id: &str) -> Result<Vec<JobId>> {
        Ok(self
            .graph()
            .child_nodes(id)?
            .into_iter()
            .filter(|child| child.status() == JobStatus::Queue)
            .map(|child| child.id().to_string())
            .collect())
    }

    /// Every job that ended `Failed`, whether on its own or by inheritance.
    pub fn failed_jobs(&self) -> Vec<JobId> {
        self.graph()
            .nodes()
            .filter(|node| node.status() == JobStatus::Failed)
            .map(|node| node.id().to_string())
            .collect()
    }

    /// Jobs whose own lifecycle failed: the root causes of a failed run.
    pub fn failed_job_roots(&self) -> Vec<JobId> {
        self.graph()
            .nodes()
            .filter(|node| node.error().is_some_and(|e| e.is_root_cause()))
            .map(|node| node.id().to_string())
            .collect()
    }

    /// Every root-cause job mapped to all paths from a graph root down to it.
    pub fn failed_job_root_paths(&self) -> BTreeMap<JobId, Vec<Vec<JobId>>> {
        self.failed_job_roots()
            .into_iter()
            .filter_map(|id| {
                let paths = self.graph().all_paths(&id).ok()?;
                Some((id, paths))
            })
            .collect()
    }

    /// All paths from a graph root down to `id`, root first.
    pub fn all_paths(&self, id: &str) -> Result<Vec<Vec<JobId>>> {
        self.graph().all_paths(id)
    }
}
