// tests/scheduler_semantics.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use devflow::actions::{Action, CleanAction};
use devflow::graph::{leaf, parallel, series, Scheduler};
use devflow_test_utils::probes::{ProbeAction, ProbeLog};
use devflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn probe(name: &str, log: &ProbeLog) -> Arc<devflow::graph::TaskNode> {
    leaf(name, Arc::new(ProbeAction::new(name, log.clone())) as Arc<dyn Action>)
}

#[tokio::test]
async fn series_runs_children_in_declaration_order() -> TestResult {
    init_tracing();
    let log = ProbeLog::new();

    let graph = series("root", [probe("a", &log), probe("b", &log), probe("c", &log)]);
    with_timeout(Scheduler.run(&graph)).await?;

    assert_eq!(
        log.events(),
        vec!["a:start", "a:end", "b:start", "b:end", "c:start", "c:end"]
    );
    Ok(())
}

#[tokio::test]
async fn series_failure_aborts_remaining_siblings() -> TestResult {
    init_tracing();
    let log = ProbeLog::new();

    let failing = leaf(
        "b",
        Arc::new(ProbeAction::new("b", log.clone()).failing()) as Arc<dyn Action>,
    );
    let graph = series("root", [probe("a", &log), failing, probe("c", &log)]);

    let result = with_timeout(Scheduler.run(&graph)).await;
    assert!(result.is_err());

    // `c` was never started.
    assert!(log.contains("a:end"));
    assert!(log.contains("b:fail"));
    assert!(!log.contains("c:start"));
    Ok(())
}

#[tokio::test]
async fn parallel_waits_for_all_children_even_after_a_failure() -> TestResult {
    init_tracing();
    let log = ProbeLog::new();

    let fail_fast = leaf(
        "fast-fail",
        Arc::new(ProbeAction::new("fast-fail", log.clone()).failing()) as Arc<dyn Action>,
    );
    let slow = leaf(
        "slow",
        Arc::new(
            ProbeAction::new("slow", log.clone()).with_delay(Duration::from_millis(100)),
        ) as Arc<dyn Action>,
    );

    let graph = parallel("root", [fail_fast, slow]);
    let result = with_timeout(Scheduler.run(&graph)).await;
    assert!(result.is_err());

    // Join barrier: the slow sibling reached its terminal state before
    // the composite reported the failure.
    assert!(log.contains("slow:end"));
    Ok(())
}

#[tokio::test]
async fn parallel_reports_earliest_declared_failure() -> TestResult {
    init_tracing();
    let log = ProbeLog::new();

    let first = leaf(
        "first",
        Arc::new(ProbeAction::new("first", log.clone()).with_delay(Duration::from_millis(50)).failing())
            as Arc<dyn Action>,
    );
    let second = leaf(
        "second",
        Arc::new(ProbeAction::new("second", log.clone()).failing()) as Arc<dyn Action>,
    );

    // `second` fails before `first`, but `first` is declared first.
    let graph = parallel("root", [first, second]);
    let err = with_timeout(Scheduler.run(&graph)).await.unwrap_err();
    assert!(err.to_string().contains("first"));
    Ok(())
}

#[tokio::test]
async fn nested_composites_run_to_completion() -> TestResult {
    init_tracing();
    let log = ProbeLog::new();

    let graph = series(
        "root",
        [
            parallel("stage-1", [probe("a", &log), probe("b", &log)]),
            probe("c", &log),
        ],
    );
    with_timeout(Scheduler.run(&graph)).await?;

    let events = log.events();
    // `c` strictly after both parallel children finished.
    let c_start = events.iter().position(|e| e == "c:start").unwrap();
    let a_end = events.iter().position(|e| e == "a:end").unwrap();
    let b_end = events.iter().position(|e| e == "b:end").unwrap();
    assert!(c_start > a_end);
    assert!(c_start > b_end);
    Ok(())
}

#[tokio::test]
async fn clean_is_idempotent_and_deduplicated_per_run() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let dest = tmp.path().join("dist");
    std::fs::create_dir_all(dest.join("sub"))?;
    std::fs::write(dest.join("sub/stale.txt"), "old")?;

    // Two clean leaves for the same destination in one run: the second
    // claim is a no-op rather than a second removal.
    let graph = parallel(
        "clean",
        [
            leaf("clean:1", Arc::new(CleanAction::new(dest.clone())) as Arc<dyn Action>),
            leaf("clean:2", Arc::new(CleanAction::new(dest.clone())) as Arc<dyn Action>),
        ],
    );
    with_timeout(Scheduler.run(&graph)).await?;
    assert!(!dest.exists());

    // A fresh run against the already-missing destination still succeeds.
    let graph = leaf("clean:3", Arc::new(CleanAction::new(dest.clone())) as Arc<dyn Action>);
    with_timeout(Scheduler.run(&graph)).await?;
    assert!(!dest.exists());
    Ok(())
}
