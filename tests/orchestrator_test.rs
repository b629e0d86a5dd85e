//! End-to-end orchestrator runs against a fake Cursor binary. Unix-only:
//! the fake editor is a shell script.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use autoforge::config::{Config, DeploymentSettings, Timeouts};
use autoforge::controller::COMPLETED_SENTINEL;
use autoforge::events::AutomationEvent;
use autoforge::idea::IdeaInput;
use autoforge::orchestrator::{Orchestrator, OrchestratorError};
use autoforge::status::AutomationStatus;

fn short_timeouts() -> Timeouts {
    Timeouts {
        launch_settle: Duration::from_millis(50),
        sentinel_ack: Duration::from_millis(50),
        close_grace: Duration::from_millis(500),
        completion: Duration::from_millis(300),
        debounce: Duration::from_millis(50),
        job_retention: Duration::from_secs(1),
    }
}

fn fake_cursor(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-cursor.sh");
    std::fs::write(&path, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Config over a temp root with a fake editor and a pre-written completion
/// sentinel, so the MONITORING phase resolves immediately.
fn make_config(root: &Path, service_mode: bool) -> Arc<Config> {
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();
    std::fs::write(work.join(COMPLETED_SENTINEL), "").unwrap();
    Arc::new(Config {
        cursor_path: fake_cursor(root),
        working_dir: work,
        deployment: DeploymentSettings::default(),
        log: "info".into(),
        log_format: "pretty".into(),
        service_mode,
        port: 0,
        timeouts: short_timeouts(),
    })
}

fn demo_idea(targets: &[&str]) -> IdeaInput {
    serde_json::from_value(serde_json::json!({
        "name": "demo-app",
        "title": "Demo App",
        "description": "a tiny demo application",
        "applicationType": "web_app",
        "features": ["landing page"],
        "deploymentTarget": targets,
    }))
    .unwrap()
}

fn drain(
    rx: &mut tokio::sync::broadcast::Receiver<AutomationEvent>,
) -> Vec<AutomationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn full_run_completes_without_deployment_targets() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(make_config(dir.path(), false));
    let mut rx = orchestrator.events().subscribe();

    let result = orchestrator.run(demo_idea(&[])).await;
    assert_eq!(result.status, AutomationStatus::Completed);
    assert!(result.deployment_urls.is_empty());
    assert!(result.errors.is_empty(), "{:?}", result.errors);

    let events = drain(&mut rx);
    let mut last = 0u8;
    let mut saw_completed = false;
    for event in &events {
        match event {
            AutomationEvent::Progress(p) => {
                assert!(p.percentage >= last, "progress regressed: {events:?}");
                last = p.percentage;
            }
            AutomationEvent::StatusChanged { status } => {
                if *status == AutomationStatus::Completed {
                    saw_completed = true;
                }
            }
            AutomationEvent::Error { .. } => {}
        }
    }
    assert_eq!(last, 100);
    assert!(saw_completed);
}

#[tokio::test]
async fn invalid_idea_fails_naming_the_field() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(make_config(dir.path(), false));

    let mut input = demo_idea(&[]);
    input.description = String::new();
    let result = orchestrator.run(input).await;

    assert_eq!(result.status, AutomationStatus::Failed);
    assert_eq!(result.errors.len(), 1);
    assert!(
        result.errors[0].contains("description"),
        "error names the field: {:?}",
        result.errors
    );
    assert_eq!(orchestrator.status().await, AutomationStatus::Failed);
}

#[tokio::test]
async fn per_target_failures_do_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(make_config(dir.path(), false));
    let mut rx = orchestrator.events().subscribe();

    // aws is a stub with a placeholder URL; flynn is not a known target
    let result = orchestrator.run(demo_idea(&["aws", "flynn"])).await;

    assert_eq!(result.status, AutomationStatus::Completed);
    assert_eq!(result.deployment_urls.len(), 1);
    assert_eq!(result.deployment_urls[0].target, "aws");
    assert_eq!(
        result.deployment_urls[0].url,
        "https://example-aws-deployment.com"
    );
    assert!(
        result.errors.is_empty(),
        "per-target failures stay out of the run errors: {:?}",
        result.errors
    );

    let saw_target_error = drain(&mut rx).iter().any(|e| {
        matches!(e, AutomationEvent::Error { message } if message.contains("flynn"))
    });
    assert!(saw_target_error, "failed target reported as an error event");
}

#[tokio::test]
async fn launch_failure_produces_failed_result() {
    let dir = tempfile::tempdir().unwrap();
    let config = make_config(dir.path(), false);
    let broken = Config {
        cursor_path: dir.path().join("no-such-cursor"),
        ..(*config).clone()
    };
    let orchestrator = Orchestrator::new(Arc::new(broken));

    let result = orchestrator.run(demo_idea(&[])).await;
    assert_eq!(result.status, AutomationStatus::Failed);
    assert!(result.errors[0].contains("cursor not found at path"));
}

#[tokio::test]
async fn service_lifecycle_requires_service_mode() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(make_config(dir.path(), false));

    let err = orchestrator.start_service().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::ServiceModeDisabled(_)));
    assert!(err.to_string().contains("serviceMode is disabled"));
    assert!(orchestrator.stop_service().await.is_err());
}

#[tokio::test]
async fn service_lifecycle_launches_and_returns_to_idle() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(make_config(dir.path(), true));

    orchestrator.start_service().await.unwrap();
    assert_eq!(orchestrator.status().await, AutomationStatus::Idle);

    orchestrator.stop_service().await.unwrap();
    assert_eq!(orchestrator.status().await, AutomationStatus::Idle);
}
