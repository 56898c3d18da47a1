// src/dag/runner.rs

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RunnerConfig;
use crate::dag::graph::DependencyGraph;
use crate::dag::node::{JobError, JobNode};
use crate::dag::validate::{ensure_acyclic, ensure_producers_present};
use crate::errors::{EtlError, Result};
use crate::job::{Dependencies, Inputs, Job, JobId};
use crate::types::{JobStatus, Stage, UncacheFailure};

/// JobRunner owns the job graph plus the state of the current run.
///
/// It is responsible for:
/// - inferring producer nodes from each job's declared dependencies
/// - running every job after all of its producers, at most once per run
/// - caching results that queued consumers still need, and releasing them
///   once no consumer is queued
/// - marking consumers of failed jobs as failed without running them
#[derive(Debug)]
pub struct JobRunner {
    graph: DependencyGraph<JobNode>,
    status: JobStatus,
    config: RunnerConfig,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self::with_config(RunnerConfig::default())
    }

    pub fn with_config(config: RunnerConfig) -> Self {
        Self {
            graph: DependencyGraph::new(),
            status: JobStatus::Queue,
            config,
        }
    }

    /// Construct a runner and register `jobs` in order.
    pub fn from_jobs(jobs: impl IntoIterator<Item = Box<dyn Job>>) -> Self {
        let mut runner = Self::new();
        runner.add_jobs(jobs);
        runner
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Overall status of the last (or current) run.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Read-only access to the underlying graph.
    pub fn graph(&self) -> &DependencyGraph<JobNode> {
        &self.graph
    }

    pub fn add_job<J: Job + 'static>(&mut self, job: J) -> &mut Self {
        self.add_boxed_job(Box::new(job))
    }

    /// Register `job` and infer nodes for the producers it declares.
    ///
    /// Explicit registration always wins: an existing node with the same id,
    /// whether a placeholder or an earlier registration, gets `job` as its
    /// instance.
    pub fn add_boxed_job(&mut self, job: Box<dyn Job>) -> &mut Self {
        let id = job.id().to_string();
        let deps = job.dependencies();

        if self.graph.contains(&id) {
            debug!(job = %id, "replacing existing instance with explicit registration");
        }

        let previous = match self.graph.parents(&id) {
            Ok(parents) => parents.to_vec(),
            Err(_) => Vec::new(),
        };

        let (parents, inferred) = self.producer_nodes(&deps);
        self.graph.add_node(JobNode::new(job), parents);
        self.infer_placeholder_lines(inferred);
        self.prune_unclaimed(&previous);

        debug!(job = %id, deps = deps.len(), "registered job");
        self
    }

    pub fn add_jobs(&mut self, jobs: impl IntoIterator<Item = Box<dyn Job>>) -> &mut Self {
        for job in jobs {
            self.add_boxed_job(job);
        }
        self
    }

    /// Placeholder parent nodes for `deps`, plus the producer ids that are
    /// not in the graph yet.
    fn producer_nodes(&self, deps: &Dependencies) -> (Vec<JobNode>, Vec<JobId>) {
        let mut parents = Vec::with_capacity(deps.len());
        let mut inferred: Vec<JobId> = Vec::new();

        for dep in deps {
            if !self.graph.contains(&dep.producer) && !inferred.contains(&dep.producer) {
                inferred.push(dep.producer.clone());
            }
            parents.push(JobNode::placeholder(dep));
        }

        (parents, inferred)
    }

    /// Newly inserted placeholders declare dependencies of their own; wire
    /// those too so the graph is complete without explicit registration.
    fn infer_placeholder_lines(&mut self, mut pending: Vec<JobId>) {
        while let Some(id) = pending.pop() {
            let deps = match self.graph.get(&id).ok().and_then(|n| n.job()) {
                Some(job) => job.dependencies(),
                None => continue,
            };
            if deps.is_empty() {
                continue;
            }

            debug!(job = %id, deps = deps.len(), "inferring dependencies of placeholder");
            let (parents, inferred) = self.producer_nodes(&deps);
            self.graph.link(&id, parents);
            pending.extend(inferred);
        }
    }

    /// Drop producers declared by key only that no consumer declares any
    /// more; nothing could ever run them.
    fn prune_unclaimed(&mut self, candidates: &[JobId]) {
        for id in candidates {
            let unclaimed = self.graph.get(id).is_ok_and(|n| n.job().is_none())
                && self.graph.children(id).is_ok_and(|c| c.is_empty());
            if unclaimed {
                debug!(job = %id, "dropping producer no job depends on");
                self.graph.remove(id);
            }
        }
    }

    /// Collect the current outputs of `id`'s producers, keyed by parameter.
    ///
    /// A producer that has produced nothing contributes `Value::Null`.
    pub fn resolve_inputs(&self, id: &str) -> Result<Inputs> {
        let node = self.graph.get(id)?;
        let mut inputs = Inputs::new();
        let Some(job) = node.job() else {
            return Ok(inputs);
        };

        for dep in job.dependencies().iter() {
            let producer = self
                .graph
                .get(&dep.producer)
                .ok()
                .and_then(|p| p.job())
                .ok_or_else(|| EtlError::MissingDependency {
                    job: id.to_string(),
                    param: dep.param.clone(),
                    producer: dep.producer.clone(),
                })?;

            let value = producer.output().cloned().unwrap_or(Value::Null);
            inputs.insert(dep.param.clone(), value);
        }

        Ok(inputs)
    }

    /// Run every job in the graph.
    ///
    /// Job failures never surface here: inspect [`JobRunner::failed_jobs`]
    /// and friends afterwards. An `Err` means the graph itself is unusable
    /// (a cycle, or a declared producer that was never supplied).
    pub fn run(&mut self) -> Result<JobStatus> {
        ensure_acyclic(&self.graph)?;
        ensure_producers_present(&self.graph)?;

        self.status = JobStatus::Running;
        let sinks = self.graph.sink_ids();
        info!(jobs = self.graph.len(), sinks = sinks.len(), "starting run");

        for sink in &sinks {
            if let Err(err) = self.run_line(sink) {
                self.status = JobStatus::Failed;
                return Err(err);
            }
        }

        let failed = self.failed_jobs();
        if failed.is_empty() {
            self.status = JobStatus::Done;
            info!("run finished; all jobs done");
        } else {
            self.status = JobStatus::Failed;
            warn!(
                ?failed,
                roots = ?self.failed_job_roots(),
                "run finished with failed jobs"
            );
        }

        Ok(self.status)
    }

    /// Resuming from a given job is not supported.
    pub fn run_from(&mut self, start: &str) -> Result<JobStatus> {
        Err(EtlError::Unsupported(format!(
            "running from a starting job ('{start}')"
        )))
    }

    /// Run the line ending in `id`: its producers first (recursively, each at
    /// most once), then `id` itself, then release producers nobody queued
    /// still needs.
    fn run_line(&mut self, id: &str) -> Result<JobStatus> {
        let parents = self.graph.parents(id)?.to_vec();

        for parent in &parents {
            // Producers already terminal in this run are not walked again.
            let mut parent_status = self.graph.get(parent)?.status;
            if parent_status == JobStatus::Queue {
                parent_status = self.run_line(parent)?;
            }

            if parent_status == JobStatus::Failed {
                debug!(job = %id, parent = %parent, "upstream job failed; job will not run");
                self.graph.get_mut(id)?.mark_parent_failed(parent);
            }
        }

        if self.graph.get(id)?.status == JobStatus::Queue {
            self.run_single_node(id)?;
        }

        for parent in &parents {
            self.release_if_unneeded(parent)?;
        }

        Ok(self.graph.get(id)?.status)
    }

    /// Drive one job through `extract -> transform -> [cache] -> load`.
    ///
    /// The first failing stage ends the job; its error is stored verbatim.
    fn run_single_node(&mut self, id: &str) -> Result<()> {
        self.graph.get_mut(id)?.status = JobStatus::Running;
        info!(job = %id, "running job");

        if let Err(source) = self.job_mut(id)?.extract() {
            return self.fail(id, Stage::Extract, source);
        }

        let inputs = self.resolve_inputs(id)?;
        if let Err(source) = self.job_mut(id)?.transform(&inputs) {
            return self.fail(id, Stage::Transform, source);
        }

        if self.config.caching && !self.children_in_queue(id)?.is_empty() {
            debug!(job = %id, "consumers still queued; caching result");
            if let Err(source) = self.job_mut(id)?.cache() {
                return self.fail(id, Stage::Cache, source);
            }
            self.graph.get_mut(id)?.cached = true;
        }

        if let Err(source) = self.job_mut(id)?.load() {
            return self.fail(id, Stage::Load, source);
        }

        self.graph.get_mut(id)?.status = JobStatus::Done;
        debug!(job = %id, "job done");
        Ok(())
    }

    /// Call `uncache()` on `id` once none of its children is still queued.
    ///
    /// Fires whatever `id` ended up as, so a producer that failed part way
    /// through (or whose `cache()` failed) still gets to release its state.
    /// At most once per run.
    fn release_if_unneeded(&mut self, id: &str) -> Result<()> {
        if !self.config.caching
            || self.graph.get(id)?.released
            || !self.children_in_queue(id)?.is_empty()
        {
            return Ok(());
        }

        debug!(job = %id, "no queued consumers left; uncaching result");
        let outcome = self.job_mut(id)?.uncache();

        let node = self.graph.get_mut(id)?;
        node.cached = false;
        node.released = true;

        if let Err(source) = outcome {
            match self.config.uncache_failure {
                UncacheFailure::Warn => {
                    warn!(job = %id, error = %source, "uncache failed; ignoring");
                }
                // An earlier failure stays the recorded cause.
                UncacheFailure::Fail if node.status == JobStatus::Failed => {
                    warn!(job = %id, error = %source, "uncache failed on an already failed job");
                }
                UncacheFailure::Fail => {
                    warn!(job = %id, error = %source, "uncache failed; marking job failed");
                    node.fail(Stage::Uncache, source);
                }
            }
        }

        Ok(())
    }

    fn fail(&mut self, id: &str, stage: Stage, source: anyhow::Error) -> Result<()> {
        warn!(job = %id, %stage, error = %source, "job failed");
        self.graph.get_mut(id)?.fail(stage, source);
        Ok(())
    }

    fn job_mut(&mut self, id: &str) -> Result<&mut (dyn Job + 'static)> {
        self.graph
            .get_mut(id)?
            .job_mut()
            .ok_or_else(|| EtlError::NotFound(id.to_string()))
    }

    /// Status of a single job.
    pub fn status_of(&self, id: &str) -> Result<JobStatus> {
        Ok(self.graph.get(id)?.status)
    }

    /// Why a job failed, if it did.
    pub fn error_of(&self, id: &str) -> Result<Option<&JobError>> {
        Ok(self.graph.get(id)?.error())
    }

    pub fn node(&self, id: &str) -> Result<&JobNode> {
        self.graph.get(id)
    }

    /// The instance currently registered (or inferred) for `id`.
    pub fn job(&self, id: &str) -> Result<&dyn Job> {
        self.graph
            .get(id)?
            .job()
            .ok_or_else(|| EtlError::NotFound(id.to_string()))
    }

    /// Every job instance in the graph, in insertion order.
    pub fn jobs(&self) -> Vec<&dyn Job> {
        self.graph.nodes().filter_map(|n| n.job()).collect()
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.graph.ids().map(str::to_string).collect()
    }

    /// Put every job back in `Queue` with no error, keeping the graph.
    pub fn reset_jobs(&mut self) {
        for node in self.graph.nodes_mut() {
            node.reset();
        }
        self.status = JobStatus::Queue;
        debug!(jobs = self.graph.len(), "reset all jobs to queue");
    }

    /// Drop every job and edge.
    pub fn clear_jobs(&mut self) {
        self.graph.clear();
        self.status = JobStatus::Queue;
        debug!("cleared job graph");
    }
}
