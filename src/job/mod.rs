// src/job/mod.rs

//! The job contract consumed by the runner.
//!
//! A job is a unit of work with a fixed lifecycle
//! (`extract -> transform -> [cache] -> load`, later `uncache`) and an
//! optional declaration of which other jobs feed its `transform` inputs.
//!
//! - [`fn_job`] builds jobs out of plain closures.
//! - [`patch`] layers extra lifecycle behaviour onto an existing job.

pub mod fn_job;
pub mod patch;

use std::collections::BTreeMap;

use serde_json::Value;

pub use fn_job::FnJob;
pub use patch::{Patch, Patched};

/// Canonical job key type used throughout the crate.
///
/// One logical job kind maps to exactly one key; the runner tracks at most
/// one instance per key.
pub type JobId = String;

/// Upstream results handed to [`Job::transform`], keyed by parameter name.
pub type Inputs = BTreeMap<String, Value>;

/// Factory for a default instance of a producer job.
pub type Placeholder = fn() -> Box<dyn Job>;

/// A unit of work the runner can schedule.
///
/// Every lifecycle method defaults to a successful no-op, so implementors
/// only override what they need. Errors are arbitrary: whatever a lifecycle
/// method returns is stored on the job's node as the root cause.
pub trait Job: Send {
    /// Stable key identifying this kind of job.
    fn id(&self) -> &str;

    /// Producers this job needs, keyed by the parameter name its `transform`
    /// receives their output under.
    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn transform(&mut self, _inputs: &Inputs) -> anyhow::Result<()> {
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Keep the transformed result around for consumers that have not run yet.
    fn cache(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release whatever `cache` kept; called once no consumer is queued.
    fn uncache(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The transformed result, read by consumers when resolving their inputs.
    fn output(&self) -> Option<&Value> {
        None
    }
}

/// One declared input: `param` is filled from the output of `producer`.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub param: String,
    pub producer: JobId,
    /// Builds a stand-in producer when none has been registered explicitly.
    pub placeholder: Option<Placeholder>,
}

/// Ordered set of declared inputs, unique by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    entries: Vec<Dependency>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `param` as produced by job type `J`.
    ///
    /// The producer key is read from `J::default()`, and the same default
    /// constructor is kept as the placeholder used until a real `J` instance
    /// is registered.
    pub fn on<J>(mut self, param: impl Into<String>) -> Self
    where
        J: Job + Default + 'static,
    {
        let producer = J::default().id().to_string();
        self.insert(Dependency {
            param: param.into(),
            producer,
            placeholder: Some(placeholder::<J>),
        });
        self
    }

    /// Declare `param` as produced by the job with key `producer`.
    ///
    /// No placeholder exists for such a producer: it has to be registered
    /// before the graph can run.
    pub fn on_id(mut self, param: impl Into<String>, producer: impl Into<JobId>) -> Self {
        self.insert(Dependency {
            param: param.into(),
            producer: producer.into(),
            placeholder: None,
        });
        self
    }

    /// Add a declaration, replacing any previous one for the same parameter.
    pub fn insert(&mut self, dep: Dependency) {
        match self.entries.iter_mut().find(|d| d.param == dep.param) {
            Some(existing) => *existing = dep,
            None => self.entries.push(dep),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.entries.iter()
    }

    /// Distinct producer keys, in declaration order.
    pub fn producers(&self) -> Vec<JobId> {
        let mut out: Vec<JobId> = Vec::with_capacity(self.entries.len());
        for dep in &self.entries {
            if !out.contains(&dep.producer) {
                out.push(dep.producer.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dependencies {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn placeholder<J>() -> Box<dyn Job>
where
    J: Job + Default + 'static,
{
    Box::new(J::default())
}
