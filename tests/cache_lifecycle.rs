// tests/cache_lifecycle.rs

use etldag::config::RunnerConfig;
use etldag::dag::JobRunner;
use etldag::job::FnJob;
use etldag::types::{JobStatus, Stage, UncacheFailure};
use etldag_test_utils::{init_tracing, RunnerBuilder, SpyJob};

/// Diamond: A feeds B and C, both feed D.
fn diamond() -> RunnerBuilder {
    RunnerBuilder::new()
        .job("A", &[])
        .job("B", &["A"])
        .job("C", &["A"])
        .job("D", &["B", "C"])
}

#[test]
fn test_producer_caches_only_while_consumers_queued() {
    init_tracing();
    let (mut runner, log) = diamond().build();

    assert_eq!(runner.run().unwrap(), JobStatus::Done);

    // A, B and C each had a queued child when they finished transforming.
    assert_eq!(log.count("A", Stage::Cache), 1);
    assert_eq!(log.count("B", Stage::Cache), 1);
    assert_eq!(log.count("C", Stage::Cache), 1);
    // D is a sink: nothing waits on it.
    assert_eq!(log.count("D", Stage::Cache), 0);
    assert_eq!(log.count("D", Stage::Uncache), 0);

    // Lifecycle order within one job.
    assert_eq!(
        log.stages_of("B"),
        vec![
            Stage::Extract,
            Stage::Transform,
            Stage::Cache,
            Stage::Load,
            Stage::Uncache
        ]
    );
}

#[test]
fn test_uncache_waits_for_every_consumer() {
    init_tracing();
    let (mut runner, log) = diamond().build();

    runner.run().unwrap();

    let a_uncached = log.position("A", Stage::Uncache).expect("A uncached");
    let b_loaded = log.position("B", Stage::Load).unwrap();
    let c_loaded = log.position("C", Stage::Load).unwrap();
    assert!(a_uncached > b_loaded, "A released before B finished");
    assert!(a_uncached > c_loaded, "A released before C finished");

    let b_uncached = log.position("B", Stage::Uncache).unwrap();
    let d_loaded = log.position("D", Stage::Load).unwrap();
    assert!(b_uncached > d_loaded);

    // Released exactly once each.
    for id in ["A", "B", "C"] {
        assert_eq!(log.count(id, Stage::Uncache), 1, "{id} uncache count");
    }
}

#[test]
fn test_each_job_runs_once_in_diamond() {
    init_tracing();
    let (mut runner, log) = diamond().build();

    runner.run().unwrap();

    for id in ["A", "B", "C", "D"] {
        assert_eq!(log.count(id, Stage::Extract), 1, "{id} extract count");
        assert_eq!(log.count(id, Stage::Load), 1, "{id} load count");
        assert_eq!(runner.status_of(id).unwrap(), JobStatus::Done);
    }

    // Producers finish before consumers start.
    let a_done = log.position("A", Stage::Load).unwrap();
    let b_start = log.position("B", Stage::Extract).unwrap();
    let d_start = log.position("D", Stage::Extract).unwrap();
    let c_done = log.position("C", Stage::Load).unwrap();
    assert!(a_done < b_start);
    assert!(c_done < d_start);
}

#[test]
fn test_failed_consumer_still_releases_producer() {
    init_tracing();
    let (mut runner, log) = RunnerBuilder::new()
        .job("A", &[])
        .failing_job("B", &["A"], Stage::Transform)
        .build();

    assert_eq!(runner.run().unwrap(), JobStatus::Failed);
    assert_eq!(log.count("A", Stage::Cache), 1);
    assert_eq!(log.count("A", Stage::Uncache), 1);
    assert_eq!(log.count("B", Stage::Load), 0);
}

#[test]
fn test_cache_failure_fails_the_job() {
    init_tracing();
    let (mut runner, log) = RunnerBuilder::new()
        .failing_job("A", &[], Stage::Cache)
        .job("B", &["A"])
        .build();

    runner.run().unwrap();

    let err = runner.error_of("A").unwrap().unwrap();
    assert_eq!(err.stage(), Some(Stage::Cache));
    // Whatever the failed cache() left behind is still released.
    assert_eq!(
        log.stages_of("A"),
        vec![Stage::Extract, Stage::Transform, Stage::Cache, Stage::Uncache]
    );
    assert!(!log.touched("B"));
    assert_eq!(runner.failed_job_roots(), vec!["A".to_string()]);
}

#[test]
fn test_failed_producer_is_still_released() {
    init_tracing();
    let (mut runner, log) = RunnerBuilder::new()
        .failing_job("A", &[], Stage::Transform)
        .job("B", &["A"])
        .build();

    assert_eq!(runner.run().unwrap(), JobStatus::Failed);
    assert_eq!(
        log.stages_of("A"),
        vec![Stage::Extract, Stage::Transform, Stage::Uncache]
    );
    assert!(runner.node("A").unwrap().is_released());
    // The original failure is still the one on record.
    assert_eq!(
        runner.error_of("A").unwrap().and_then(|e| e.stage()),
        Some(Stage::Transform)
    );
}

#[test]
fn test_skipped_producer_is_released_without_running() {
    init_tracing();
    let (mut runner, log) = RunnerBuilder::new()
        .failing_job("X", &[], Stage::Extract)
        .job("Y", &["X"])
        .job("Z", &["Y"])
        .build();

    runner.run().unwrap();

    // Y never ran, but once Z left the queue nothing needs it any more.
    assert_eq!(log.stages_of("Y"), vec![Stage::Uncache]);
    assert_eq!(log.count("X", Stage::Uncache), 1);
    assert!(!log.touched("Z"));
}

#[test]
fn test_caching_disabled_skips_both_hooks() {
    init_tracing();
    let config = RunnerConfig {
        caching: false,
        ..RunnerConfig::default()
    };
    let (mut runner, log) = diamond().with_config(config).build();

    assert_eq!(runner.run().unwrap(), JobStatus::Done);
    for id in ["A", "B", "C", "D"] {
        assert_eq!(log.count(id, Stage::Cache), 0);
        assert_eq!(log.count(id, Stage::Uncache), 0);
    }
}

#[test]
fn test_uncache_failure_is_ignored_when_warning() {
    init_tracing();
    let config = RunnerConfig {
        uncache_failure: UncacheFailure::Warn,
        ..RunnerConfig::default()
    };
    let builder = RunnerBuilder::new().with_config(config);
    let log = builder.log();
    let (mut runner, _) = builder.job("B", &["A"]).build();
    runner.add_job(SpyJob::new("A", &log).failing_at(Stage::Uncache));

    assert_eq!(runner.run().unwrap(), JobStatus::Done);
    assert_eq!(log.count("A", Stage::Uncache), 1);
    assert_eq!(runner.status_of("A").unwrap(), JobStatus::Done);
    assert!(runner.error_of("A").unwrap().is_none());
}

#[test]
fn test_uncache_failure_fails_the_producer_by_default() {
    init_tracing();
    assert_eq!(RunnerConfig::default().uncache_failure, UncacheFailure::Fail);
    let builder = RunnerBuilder::new();
    let log = builder.log();
    let (mut runner, _) = builder.job("B", &["A"]).build();
    runner.add_job(SpyJob::new("A", &log).failing_at(Stage::Uncache));

    assert_eq!(runner.run().unwrap(), JobStatus::Failed);
    // The consumer already finished with the cached data.
    assert_eq!(runner.status_of("B").unwrap(), JobStatus::Done);
    assert_eq!(runner.failed_job_roots(), vec!["A".to_string()]);
    assert_eq!(
        runner.error_of("A").unwrap().and_then(|e| e.stage()),
        Some(Stage::Uncache)
    );
}

#[test]
fn test_uncache_failure_keeps_earlier_error() {
    init_tracing();
    let mut runner = JobRunner::new();
    runner
        .add_job(
            FnJob::new("A")
                .transform_with(|_, _| anyhow::bail!("bad rows"))
                .uncache_with(|_| anyhow::bail!("cannot release")),
        )
        .add_job(FnJob::new("B").depends_on("rows", "A"));

    assert_eq!(runner.run().unwrap(), JobStatus::Failed);
    let err = runner.error_of("A").unwrap().unwrap();
    assert_eq!(err.stage(), Some(Stage::Transform));
    assert!(err.to_string().contains("bad rows"));
    assert!(runner.node("A").unwrap().is_released());
}
