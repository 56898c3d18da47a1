// src/job/fn_job.rs

//! Jobs assembled from plain closures.
//!
//! Data flows the same way for every `FnJob`:
//! - `extract` produces the extracted value, then each named extractor runs;
//! - `transform` receives the extracted value plus the upstream inputs and
//!   produces the output, which chained transformers then refine in order;
//! - `load`, `cache` and `uncache` receive the output.
//!
//! Stages without a closure are successful no-ops.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::{Dependencies, Inputs, Job, JobId};

type ExtractFn = Box<dyn FnMut() -> anyhow::Result<Value> + Send>;
type TransformFn = Box<dyn FnMut(Option<&Value>, &Inputs) -> anyhow::Result<Value> + Send>;
type ChainFn = Box<dyn FnMut(Value, &Inputs) -> anyhow::Result<Value> + Send>;
type OutputFn = Box<dyn FnMut(Option<&Value>) -> anyhow::Result<()> + Send>;

/// A job whose lifecycle is made of closures, built with a fluent API.
///
/// ```
/// use etldag::job::{FnJob, Job};
/// use serde_json::json;
///
/// let mut job = FnJob::new("numbers")
///     .extract_with(|| Ok(json!([1, 2, 3])))
///     .transform_with(|data, _inputs| {
///         let sum: i64 = data
///             .and_then(|v| v.as_array())
///             .map(|xs| xs.iter().filter_map(|x| x.as_i64()).sum())
///             .unwrap_or(0);
///         Ok(json!(sum))
///     });
///
/// job.extract().unwrap();
/// job.transform(&Default::default()).unwrap();
/// assert_eq!(job.output(), Some(&json!(6)));
/// ```
pub struct FnJob {
    id: JobId,
    deps: Dependencies,
    extract: Option<ExtractFn>,
    extractors: Vec<(String, ExtractFn)>,
    transform: Option<TransformFn>,
    transformers: Vec<ChainFn>,
    load: Option<OutputFn>,
    cache: Option<OutputFn>,
    uncache: Option<OutputFn>,
    extracted: Option<Value>,
    extras: BTreeMap<String, Value>,
    transformed: Option<Value>,
}

impl FnJob {
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            deps: Dependencies::new(),
            extract: None,
            extractors: Vec::new(),
            transform: None,
            transformers: Vec::new(),
            load: None,
            cache: None,
            uncache: None,
            extracted: None,
            extras: BTreeMap::new(),
            transformed: None,
        }
    }

    /// Declare `param` as the output of the job keyed `producer`.
    pub fn depends_on(mut self, param: impl Into<String>, producer: impl Into<JobId>) -> Self {
        self.deps = self.deps.on_id(param, producer);
        self
    }

    /// Declare `param` as the output of job type `J` (with placeholder).
    pub fn depends_on_job<J>(mut self, param: impl Into<String>) -> Self
    where
        J: Job + Default + 'static,
    {
        self.deps = self.deps.on::<J>(param);
        self
    }

    pub fn extract_with<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<Value> + Send + 'static,
    {
        self.extract = Some(Box::new(f));
        self
    }

    /// Append a named extractor, run after the main extract closure.
    ///
    /// Its result is available through [`FnJob::extra`].
    pub fn extractor<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<Value> + Send + 'static,
    {
        self.extractors.push((name.into(), Box::new(f)));
        self
    }

    pub fn transform_with<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<&Value>, &Inputs) -> anyhow::Result<Value> + Send + 'static,
    {
        self.transform = Some(Box::new(f));
        self
    }

    /// Append a transformer that refines the previous result.
    ///
    /// The first chained transformer starts from the `transform_with` output,
    /// or from the extracted value when there is no such closure.
    pub fn then_transform<F>(mut self, f: F) -> Self
    where
        F: FnMut(Value, &Inputs) -> anyhow::Result<Value> + Send + 'static,
    {
        self.transformers.push(Box::new(f));
        self
    }

    pub fn load_with<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<&Value>) -> anyhow::Result<()> + Send + 'static,
    {
        self.load = Some(Box::new(f));
        self
    }

    pub fn cache_with<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<&Value>) -> anyhow::Result<()> + Send + 'static,
    {
        self.cache = Some(Box::new(f));
        self
    }

    pub fn uncache_with<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<&Value>) -> anyhow::Result<()> + Send + 'static,
    {
        self.uncache = Some(Box::new(f));
        self
    }

    pub fn extracted(&self) -> Option<&Value> {
        self.extracted.as_ref()
    }

    /// Result of the named extractor from the last `extract`.
    pub fn extra(&self, name: &str) -> Option<&Value> {
        self.extras.get(name)
    }
}

impl Job for FnJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> Dependencies {
        self.deps.clone()
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        if let Some(f) = self.extract.as_mut() {
            self.extracted = Some(f()?);
        }
        for (name, f) in self.extractors.iter_mut() {
            self.extras.insert(name.clone(), f()?);
        }
        Ok(())
    }

    fn transform(&mut self, inputs: &Inputs) -> anyhow::Result<()> {
        let mut result = match self.transform.as_mut() {
            Some(f) => Some(f(self.extracted.as_ref(), inputs)?),
            None => None,
        };

        if !self.transformers.is_empty() {
            let mut next = result
                .or_else(|| self.extracted.clone())
                .unwrap_or(Value::Null);
            for f in self.transformers.iter_mut() {
                next = f(next, inputs)?;
            }
            result = Some(next);
        }

        if result.is_some() {
            self.transformed = result;
        }
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        match self.load.as_mut() {
            Some(f) => f(self.transformed.as_ref()),
            None => Ok(()),
        }
    }

    fn cache(&mut self) -> anyhow::Result<()> {
        match self.cache.as_mut() {
            Some(f) => f(self.transformed.as_ref()),
            None => Ok(()),
        }
    }

    fn uncache(&mut self) -> anyhow::Result<()> {
        match self.uncache.as_mut() {
            Some(f) => f(self.transformed.as_ref()),
            None => Ok(()),
        }
    }

    fn output(&self) -> Option<&Value> {
        self.transformed.as_ref()
    }
}

impl fmt::Debug for FnJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJob")
            .field("id", &self.id)
            .field("deps", &self.deps)
            .field("extractors", &self.extractors.len())
            .field("transformers", &self.transformers.len())
            .field("extracted", &self.extracted)
            .field("transformed", &self.transformed)
            .finish()
    }
}
