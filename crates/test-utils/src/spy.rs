use std::sync::{Arc, Mutex};

use anyhow::bail;
use serde_json::{json, Value};

use etldag::job::{Dependencies, Inputs, Job};
use etldag::types::Stage;

type ComputeFn = Box<dyn FnMut(&Inputs) -> anyhow::Result<Value> + Send>;

/// Shared, ordered record of every lifecycle call made on spy jobs.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(String, Stage)>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, job: &str, stage: Stage) {
        self.calls.lock().unwrap().push((job.to_string(), stage));
    }

    pub fn calls(&self) -> Vec<(String, Stage)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, job: &str, stage: Stage) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(j, s)| j == job && *s == stage)
            .count()
    }

    /// Index of the first `stage` call on `job`.
    pub fn position(&self, job: &str, stage: Stage) -> Option<usize> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .position(|(j, s)| j == job && *s == stage)
    }

    /// Stages called on `job`, in order.
    pub fn stages_of(&self, job: &str) -> Vec<Stage> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(j, _)| j == job)
            .map(|(_, s)| *s)
            .collect()
    }

    /// Whether `job` was touched at all.
    pub fn touched(&self, job: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|(j, _)| j == job)
    }
}

/// A job that records each lifecycle call and can be told to fail.
///
/// Without a compute closure its output is its own id as a JSON string.
pub struct SpyJob {
    id: String,
    deps: Dependencies,
    log: CallLog,
    fail_at: Option<Stage>,
    compute: Option<ComputeFn>,
    output: Option<Value>,
}

impl SpyJob {
    pub fn new(id: &str, log: &CallLog) -> Self {
        Self {
            id: id.to_string(),
            deps: Dependencies::new(),
            log: log.clone(),
            fail_at: None,
            compute: None,
            output: None,
        }
    }

    /// Depend on `producer`, received under a parameter of the same name.
    pub fn after(self, producer: &str) -> Self {
        self.input(producer, producer)
    }

    pub fn input(mut self, param: &str, producer: &str) -> Self {
        self.deps = self.deps.on_id(param, producer);
        self
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn computing<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Inputs) -> anyhow::Result<Value> + Send + 'static,
    {
        self.compute = Some(Box::new(f));
        self
    }

    pub fn boxed(self) -> Box<dyn Job> {
        Box::new(self)
    }

    fn step(&self, stage: Stage) -> anyhow::Result<()> {
        self.log.record(&self.id, stage);
        if self.fail_at == Some(stage) {
            bail!("{} failed during {}", self.id, stage);
        }
        Ok(())
    }
}

impl Job for SpyJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> Dependencies {
        self.deps.clone()
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        self.step(Stage::Extract)
    }

    fn transform(&mut self, inputs: &Inputs) -> anyhow::Result<()> {
        self.step(Stage::Transform)?;
        self.output = Some(match self.compute.as_mut() {
            Some(f) => f(inputs)?,
            None => json!(self.id),
        });
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.step(Stage::Load)
    }

    fn cache(&mut self) -> anyhow::Result<()> {
        self.step(Stage::Cache)
    }

    fn uncache(&mut self) -> anyhow::Result<()> {
        self.step(Stage::Uncache)
    }

    fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }
}
