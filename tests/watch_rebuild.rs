// tests/watch_rebuild.rs

//! End-to-end watch test against a real filesystem and notify backend:
//! edit a source file, expect exactly that target to rebuild.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use devflow::config::TargetKind;
use devflow::graph::Scheduler;
use devflow::plan;
use devflow::registry::{Overrides, TargetRegistry};
use devflow::watch::{arm, RebuildOutcome};
use devflow_test_utils::builders::{ManifestBuilder, TargetSpecBuilder};
use devflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn editing_a_source_file_rebuilds_its_target() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;
    std::fs::write(src.join("favicon.ico"), "v1")?;

    let manifest = ManifestBuilder::new()
        .with_debounce("50ms")
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*.ico")
                .build(),
        )
        .build();

    let overrides = Overrides {
        dest: Some(tmp.path().join("dist").to_string_lossy().into_owned()),
        ..Overrides::default()
    };
    let registry = TargetRegistry::from_manifest(&manifest, &overrides)?;
    let target = registry.resolve("assets")?;
    let scheduler = Arc::new(Scheduler);

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<RebuildOutcome>(8);
    let _handle = arm(
        Arc::clone(target),
        plan::rebuild_graph(target),
        Arc::clone(&scheduler),
        manifest.debounce,
        Some(outcome_tx),
    )?;

    // Give the notify backend a moment to settle before producing events.
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(src.join("favicon.ico"), "v2")?;

    let outcome = with_timeout(outcome_rx.recv()).await.expect("watch session ended");
    assert_eq!(outcome.target, "assets");
    assert!(outcome.ok);
    assert!(!outcome.restart_server);

    let dest = tmp.path().join("dist/static/favicon.ico");
    assert_eq!(std::fs::read_to_string(dest)?, "v2");
    Ok(())
}

#[tokio::test]
async fn a_burst_of_edits_triggers_exactly_one_rebuild() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;

    let manifest = ManifestBuilder::new()
        .with_debounce("50ms")
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*.ico")
                .build(),
        )
        .build();

    let overrides = Overrides {
        dest: Some(tmp.path().join("dist").to_string_lossy().into_owned()),
        ..Overrides::default()
    };
    let registry = TargetRegistry::from_manifest(&manifest, &overrides)?;
    let target = registry.resolve("assets")?;
    let scheduler = Arc::new(Scheduler);

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<RebuildOutcome>(8);
    let _handle = arm(
        Arc::clone(target),
        plan::rebuild_graph(target),
        Arc::clone(&scheduler),
        manifest.debounce,
        Some(outcome_tx),
    )?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    for i in 0..5 {
        std::fs::write(src.join(format!("icon-{i}.ico")), "x")?;
    }

    let outcome = with_timeout(outcome_rx.recv()).await.expect("watch session ended");
    assert!(outcome.ok);

    // The whole burst coalesced: no second rebuild follows.
    let waited =
        tokio::time::timeout(Duration::from_millis(500), outcome_rx.recv()).await;
    assert!(waited.is_err(), "burst produced a second rebuild");
    Ok(())
}

#[tokio::test]
async fn non_matching_files_do_not_trigger_a_rebuild() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let src = tmp.path().join("assets");
    std::fs::create_dir_all(&src)?;

    let manifest = ManifestBuilder::new()
        .with_debounce("50ms")
        .with_target(
            "assets",
            TargetSpecBuilder::new(TargetKind::Assets, &src.to_string_lossy(), "static")
                .glob("**/*.ico")
                .build(),
        )
        .build();

    let overrides = Overrides {
        dest: Some(tmp.path().join("dist").to_string_lossy().into_owned()),
        ..Overrides::default()
    };
    let registry = TargetRegistry::from_manifest(&manifest, &overrides)?;
    let target = registry.resolve("assets")?;
    let scheduler = Arc::new(Scheduler);

    let (outcome_tx, mut outcome_rx) = mpsc::channel::<RebuildOutcome>(8);
    let _handle = arm(
        Arc::clone(target),
        plan::rebuild_graph(target),
        Arc::clone(&scheduler),
        manifest.debounce,
        Some(outcome_tx),
    )?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(src.join("notes.md"), "not watched")?;

    // No outcome within a generous window.
    let waited =
        tokio::time::timeout(Duration::from_millis(500), outcome_rx.recv()).await;
    assert!(waited.is_err(), "unexpected rebuild for a non-matching file");
    Ok(())
}
