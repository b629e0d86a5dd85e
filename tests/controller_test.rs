//! Integration tests for the Cursor process controller against a fake
//! editor binary (a shell script that stays alive until signaled).

use std::path::PathBuf;
use std::time::Duration;

use autoforge::config::Timeouts;
use autoforge::controller::{
    ControllerError, CursorController, ACTIVATE_SENTINEL, COMPLETED_SENTINEL,
};

fn short_timeouts() -> Timeouts {
    Timeouts {
        launch_settle: Duration::from_millis(50),
        sentinel_ack: Duration::from_millis(50),
        close_grace: Duration::from_millis(500),
        completion: Duration::from_millis(200),
        debounce: Duration::from_millis(50),
        job_retention: Duration::from_secs(1),
    }
}

#[cfg(unix)]
fn fake_cursor(dir: &std::path::Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-cursor.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
async fn launch_fails_when_binary_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let controller = CursorController::new(
        dir.path().join("no-such-cursor"),
        dir.path().to_path_buf(),
        short_timeouts(),
    );
    let err = controller.launch().await.unwrap_err();
    assert!(matches!(err, ControllerError::NotFound(_)), "{err}");
    assert!(err.to_string().contains("cursor not found at path"));
}

#[tokio::test]
async fn operations_before_launch_fail_or_noop() {
    let dir = tempfile::tempdir().unwrap();
    let controller = CursorController::new(
        dir.path().join("cursor"),
        dir.path().to_path_buf(),
        short_timeouts(),
    );

    assert!(matches!(
        controller.check_completion(),
        Err(ControllerError::NotRunning)
    ));
    assert!(matches!(
        controller.activate().await,
        Err(ControllerError::NotRunning)
    ));
    assert!(matches!(
        controller.send_prompt("hello").await,
        Err(ControllerError::NotRunning)
    ));
    // close before launch is a warned no-op, not an error
    controller.close().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn launch_interact_and_close_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = fake_cursor(dir.path(), "sleep 30");
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let controller = CursorController::new(cursor, work.clone(), short_timeouts());
    controller.launch().await.unwrap();
    assert!(controller.is_running());

    // second launch while running is a no-op
    controller.launch().await.unwrap();

    // sentinel files are written even when nobody consumes them
    controller.activate().await.unwrap();
    assert!(work.join(ACTIVATE_SENTINEL).exists());
    controller.send_prompt("# Build me an app").await.unwrap();

    assert!(!controller.check_completion().unwrap());
    std::fs::write(work.join(COMPLETED_SENTINEL), "").unwrap();
    assert!(controller.check_completion().unwrap());
    controller
        .wait_for_completion(Duration::from_millis(200))
        .await
        .unwrap();

    controller.close().await.unwrap();
    assert!(!controller.is_running());
}

#[cfg(unix)]
#[tokio::test]
async fn wait_for_completion_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = fake_cursor(dir.path(), "sleep 30");
    let controller =
        CursorController::new(cursor, dir.path().to_path_buf(), short_timeouts());
    controller.launch().await.unwrap();

    let err = controller
        .wait_for_completion(Duration::from_millis(150))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Timeout { .. }), "{err}");

    controller.close().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn immediate_exit_during_startup_is_a_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = fake_cursor(dir.path(), "exit 1");
    let timeouts = Timeouts {
        launch_settle: Duration::from_millis(300),
        ..short_timeouts()
    };
    let controller = CursorController::new(cursor, dir.path().to_path_buf(), timeouts);

    let err = controller.launch().await.unwrap_err();
    assert!(matches!(err, ControllerError::LaunchFailed(_)), "{err}");
    assert!(!controller.is_running());
}
