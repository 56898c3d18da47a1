#![allow(dead_code)]

use std::collections::HashSet;

use etldag::config::RunnerConfig;
use etldag::dag::JobRunner;
use etldag::types::Stage;

use crate::spy::{CallLog, SpyJob};

/// Builder for a `JobRunner` made of spy jobs sharing one `CallLog`.
pub struct RunnerBuilder {
    log: CallLog,
    config: RunnerConfig,
    jobs: Vec<SpyJob>,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            log: CallLog::new(),
            config: RunnerConfig::default(),
            jobs: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add job `id` depending on each of `after`.
    pub fn job(mut self, id: &str, after: &[&str]) -> Self {
        let mut job = SpyJob::new(id, &self.log);
        for dep in after {
            job = job.after(dep);
        }
        self.jobs.push(job);
        self
    }

    /// Add job `id` depending on `after`, failing at `stage`.
    pub fn failing_job(mut self, id: &str, after: &[&str], stage: Stage) -> Self {
        let mut job = SpyJob::new(id, &self.log).failing_at(stage);
        for dep in after {
            job = job.after(dep);
        }
        self.jobs.push(job);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn build(self) -> (JobRunner, CallLog) {
        let mut runner = JobRunner::with_config(self.config);
        runner.add_jobs(self.jobs.into_iter().map(SpyJob::boxed));
        (runner, self.log)
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a runner of spy jobs `job_0..job_{n-1}` from `(producer, consumer)`
/// index pairs; `failing` jobs fail during transform.
pub fn graph_from_edges(
    n: usize,
    edges: &[(usize, usize)],
    failing: &HashSet<usize>,
) -> (JobRunner, CallLog) {
    let mut builder = RunnerBuilder::new();
    for i in 0..n {
        let name = format!("job_{i}");
        let deps: Vec<String> = edges
            .iter()
            .filter(|(_, consumer)| *consumer == i)
            .map(|(producer, _)| format!("job_{producer}"))
            .collect();
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        builder = if failing.contains(&i) {
            builder.failing_job(&name, &deps, Stage::Transform)
        } else {
            builder.job(&name, &deps)
        };
    }
    builder.build()
}
