// tests/supervisor_lifecycle.rs

//! Lifecycle tests for the server supervisor, driving real child
//! processes through `sh`. Unix-only.

#![cfg(unix)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use devflow::errors::DevflowError;
use devflow::serve::{spawn_supervisor, ServerState, SupervisorSettings};
use devflow_test_utils::probes::RecordingReloader;
use devflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn settings(script: &str, ready_pattern: Option<&str>) -> SupervisorSettings {
    SupervisorSettings {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        port: 4000,
        ready_pattern: ready_pattern.map(|s| s.to_string()),
        startup_timeout: Duration::from_millis(500),
        shutdown_timeout: Duration::from_secs(2),
        settle_delay: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn start_waits_for_the_ready_pattern() -> TestResult {
    init_tracing();
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(
        settings("echo 'listening on 4000'; sleep 30", Some("listening on")),
        reloader,
    );

    with_timeout(supervisor.start()).await?;
    assert_eq!(supervisor.state().await, ServerState::Running);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn start_times_out_when_the_server_never_reports_ready() -> TestResult {
    init_tracing();
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(settings("sleep 30", Some("ready")), reloader);

    let err = with_timeout(supervisor.start()).await.unwrap_err();
    assert!(matches!(err, DevflowError::StartupTimeout(_)));
    assert_eq!(supervisor.state().await, ServerState::Stopped);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn start_fails_when_the_server_exits_before_ready() -> TestResult {
    init_tracing();
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(settings("exit 3", Some("ready")), reloader);

    let err = with_timeout(supervisor.start()).await.unwrap_err();
    assert!(matches!(err, DevflowError::ProcessCrash(_)));

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn restart_notifies_clients_after_the_settle_delay() -> TestResult {
    init_tracing();
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(
        settings("echo ready; sleep 30", Some("ready")),
        Arc::clone(&reloader) as Arc<dyn devflow::serve::ReloadNotifier>,
    );

    with_timeout(supervisor.start()).await?;
    assert_eq!(reloader.notifications(), 0);

    with_timeout(supervisor.restart()).await?;
    assert_eq!(supervisor.state().await, ServerState::Running);

    // Reload fires only after the settle delay.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(reloader.notifications(), 1);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn crash_leads_to_an_automatic_restart() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let marker = tmp.path().join("second-run");

    // First run crashes shortly after becoming ready; the restarted
    // instance stays up and leaves the marker behind.
    let script = format!(
        "if [ -f {m} ]; then echo ready; sleep 30; \
         else touch {m}; echo ready; sleep 0.2; fi",
        m = marker.display()
    );
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(
        settings(&script, Some("ready")),
        Arc::clone(&reloader) as Arc<dyn devflow::serve::ReloadNotifier>,
    );

    with_timeout(supervisor.start()).await?;
    assert_eq!(supervisor.state().await, ServerState::Running);

    // Wait out the crash and the recovery.
    let recovered = with_timeout(async {
        loop {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if marker.is_file() && supervisor.state().await == ServerState::Running {
                // The marker proves the first instance already ran.
                tokio::time::sleep(Duration::from_millis(300)).await;
                if supervisor.state().await == ServerState::Running {
                    break true;
                }
            }
        }
    })
    .await;
    assert!(recovered);

    // Crash recovery signals a reload after the settle delay.
    assert!(reloader.notifications() >= 1);

    supervisor.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn shutdown_is_idempotent() -> TestResult {
    init_tracing();
    let reloader = Arc::new(RecordingReloader::new());
    let supervisor = spawn_supervisor(
        settings("echo ready; sleep 30", Some("ready")),
        reloader,
    );

    with_timeout(supervisor.start()).await?;
    supervisor.shutdown().await;
    supervisor.shutdown().await;
    assert_eq!(supervisor.state().await, ServerState::Stopped);

    // Requests after shutdown fail cleanly instead of hanging.
    let err = with_timeout(supervisor.start()).await.unwrap_err();
    assert!(matches!(err, DevflowError::Other(_)));
    Ok(())
}
