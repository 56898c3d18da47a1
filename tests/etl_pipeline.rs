// tests/etl_pipeline.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use serde_json::{Value, json};

use etldag::dag::{JobError, JobRunner};
use etldag::job::{Dependencies, Inputs, Job};
use etldag::types::{JobStatus, Stage};
use etldag_test_utils::init_tracing;

/// A: sums its numbers.
struct Numbers {
    numbers: Vec<i64>,
    extracted: Vec<i64>,
    total: Option<Value>,
}

impl Numbers {
    fn with(numbers: Vec<i64>) -> Self {
        Self {
            numbers,
            extracted: Vec::new(),
            total: None,
        }
    }
}

impl Default for Numbers {
    fn default() -> Self {
        Self::with(vec![1, 2, 3])
    }
}

impl Job for Numbers {
    fn id(&self) -> &str {
        "A"
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        self.extracted = self.numbers.clone();
        Ok(())
    }

    fn transform(&mut self, _inputs: &Inputs) -> anyhow::Result<()> {
        self.total = Some(json!(self.extracted.iter().sum::<i64>()));
        Ok(())
    }

    fn output(&self) -> Option<&Value> {
        self.total.as_ref()
    }
}

/// B: doubles A.
#[derive(Default)]
struct Doubler {
    doubled: Option<Value>,
}

impl Job for Doubler {
    fn id(&self) -> &str {
        "B"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new().on::<Numbers>("total")
    }

    fn transform(&mut self, inputs: &Inputs) -> anyhow::Result<()> {
        let total = inputs.get("total").and_then(Value::as_i64).unwrap_or(0);
        self.doubled = Some(json!(total * 2));
        Ok(())
    }

    fn output(&self) -> Option<&Value> {
        self.doubled.as_ref()
    }
}

/// C: always fails while transforming A's total.
#[derive(Default)]
struct Broken;

impl Job for Broken {
    fn id(&self) -> &str {
        "C"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new().on::<Numbers>("total")
    }

    fn transform(&mut self, _inputs: &Inputs) -> anyhow::Result<()> {
        bail!("cannot transform")
    }
}

/// D: consumes C and counts every lifecycle call it receives.
struct Downstream {
    calls: Arc<AtomicUsize>,
}

impl Job for Downstream {
    fn id(&self) -> &str {
        "D"
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new().on::<Broken>("broken")
    }

    fn extract(&mut self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn transform(&mut self, _inputs: &Inputs) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&mut self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn output_of(runner: &JobRunner, id: &str) -> Option<Value> {
    runner.job(id).unwrap().output().cloned()
}

#[test]
fn test_failed_branch_is_attributed_to_its_root() {
    init_tracing();

    let mut runner = JobRunner::new();
    runner
        .add_job(Numbers::default())
        .add_job(Doubler::default())
        .add_job(Broken);

    let status = runner.run().expect("run should not error");

    assert_eq!(status, JobStatus::Failed);
    assert_eq!(runner.status(), JobStatus::Failed);
    assert_eq!(runner.status_of("A").unwrap(), JobStatus::Done);
    assert_eq!(runner.status_of("B").unwrap(), JobStatus::Done);
    assert_eq!(runner.status_of("C").unwrap(), JobStatus::Failed);

    assert_eq!(output_of(&runner, "A"), Some(json!(6)));
    assert_eq!(output_of(&runner, "B"), Some(json!(12)));

    let err = runner.error_of("C").unwrap().expect("C should carry an error");
    assert!(err.is_root_cause());
    assert_eq!(err.stage(), Some(Stage::Transform));
    assert!(err.to_string().contains("cannot transform"));

    assert_eq!(runner.failed_jobs(), vec!["C".to_string()]);
    assert_eq!(runner.failed_job_roots(), vec!["C".to_string()]);

    let paths = runner.failed_job_root_paths();
    assert_eq!(paths.len(), 1);
    assert!(paths["C"].contains(&vec!["A".to_string(), "C".to_string()]));
}

#[test]
fn test_descendant_of_failed_job_never_runs() {
    init_tracing();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = JobRunner::new();
    runner
        .add_job(Numbers::default())
        .add_job(Doubler::default())
        .add_job(Broken)
        .add_job(Downstream {
            calls: Arc::clone(&calls),
        });

    runner.run().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0, "D must not run any stage");
    assert_eq!(runner.status_of("D").unwrap(), JobStatus::Failed);

    match runner.error_of("D").unwrap() {
        Some(JobError::ParentFailed { parents }) => assert_eq!(parents, &vec!["C".to_string()]),
        other => panic!("expected ParentFailed marker, got {other:?}"),
    }

    let mut failed = runner.failed_jobs();
    failed.sort();
    assert_eq!(failed, vec!["C".to_string(), "D".to_string()]);
    assert_eq!(runner.failed_job_roots(), vec!["C".to_string()]);
}

#[test]
fn test_inferred_producer_runs_as_placeholder() {
    init_tracing();

    // Only B is registered; A is inferred from B's declaration.
    let mut runner = JobRunner::new();
    runner.add_job(Doubler::default());

    assert!(runner.graph().contains("A"));
    assert_eq!(runner.run().unwrap(), JobStatus::Done);
    assert_eq!(output_of(&runner, "A"), Some(json!(6)));
    assert_eq!(output_of(&runner, "B"), Some(json!(12)));
}

#[test]
fn test_explicit_instance_replaces_placeholder() {
    init_tracing();

    let mut runner = JobRunner::new();
    runner.add_job(Doubler::default());
    runner.add_job(Numbers::with(vec![10, 20]));

    runner.run().unwrap();

    assert_eq!(output_of(&runner, "A"), Some(json!(30)));
    assert_eq!(output_of(&runner, "B"), Some(json!(60)));
    // The explicit registration must not disturb the inferred edge.
    assert_eq!(runner.graph().parents("B").unwrap(), ["A".to_string()]);
}

#[test]
fn test_later_registration_of_same_type_wins() {
    init_tracing();

    let mut runner = JobRunner::new();
    runner
        .add_job(Numbers::with(vec![1]))
        .add_job(Doubler::default())
        .add_job(Numbers::with(vec![5, 5]));

    runner.run().unwrap();

    assert_eq!(runner.job_ids().len(), 2);
    assert_eq!(output_of(&runner, "A"), Some(json!(10)));
    assert_eq!(output_of(&runner, "B"), Some(json!(20)));
}

#[test]
fn test_placeholder_dependencies_are_inferred_transitively() {
    init_tracing();

    // D -> C -> A, only D registered.
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = JobRunner::new();
    runner.add_job(Downstream {
        calls: Arc::clone(&calls),
    });

    let mut ids = runner.job_ids();
    ids.sort();
    assert_eq!(ids, vec!["A", "C", "D"]);
    assert_eq!(runner.graph().parents("C").unwrap(), ["A".to_string()]);

    runner.run().unwrap();
    assert_eq!(runner.failed_job_roots(), vec!["C".to_string()]);
    assert_eq!(
        runner.all_paths("D").unwrap(),
        vec![vec!["A".to_string(), "C".to_string(), "D".to_string()]]
    );
}

#[test]
fn test_runner_from_boxed_jobs_with_computed_outputs() {
    use etldag_test_utils::{CallLog, SpyJob};

    init_tracing();
    let log = CallLog::new();
    let jobs = vec![
        SpyJob::new("left", &log).computing(|_| Ok(json!(2))).boxed(),
        SpyJob::new("right", &log).computing(|_| Ok(json!(5))).boxed(),
        SpyJob::new("product", &log)
            .input("a", "left")
            .input("b", "right")
            .computing(|inputs| {
                let get = |k: &str| inputs.get(k).and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(get("a") * get("b")))
            })
            .boxed(),
    ];

    let mut runner = JobRunner::from_jobs(jobs);
    assert_eq!(
        runner.job("product").unwrap().dependencies().producers(),
        vec!["left".to_string(), "right".to_string()]
    );
    assert!(!runner.status().is_terminal());

    assert_eq!(runner.run().unwrap(), JobStatus::Done);
    assert!(runner.status().is_terminal());
    assert_eq!(output_of(&runner, "product"), Some(json!(10)));

    // Producers first, in declaration order.
    let order: Vec<String> = log
        .calls()
        .into_iter()
        .filter(|(_, stage)| *stage == Stage::Extract)
        .map(|(job, _)| job)
        .collect();
    assert_eq!(order, vec!["left", "right", "product"]);
}
