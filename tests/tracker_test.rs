//! Integration tests for the file change tracker against a real watcher.
//! Debounce is shortened so each test settles in under a second.

use std::path::PathBuf;
use std::time::Duration;

use autoforge::tracker::ChangeTracker;

const DEBOUNCE: Duration = Duration::from_millis(100);
const SETTLE: Duration = Duration::from_millis(800);

fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    // Watch event paths come back canonicalized on some platforms.
    let root = dir.path().canonicalize().unwrap();
    (dir, root)
}

#[tokio::test]
async fn tracks_creates_and_ignores_hidden_files() {
    let (_dir, root) = canonical_tempdir();
    let tracker = ChangeTracker::new(root.clone(), DEBOUNCE);
    tracker.start_monitoring().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(root.join("app.js"), "console.log('hi')").unwrap();
    std::fs::write(root.join(".composer_prompt"), "sentinel").unwrap();
    tokio::time::sleep(SETTLE).await;

    let created = tracker.created_files();
    assert!(
        created.iter().any(|p| p.ends_with("app.js")),
        "app.js tracked: {created:?}"
    );
    assert!(
        !created.iter().any(|p| p.ends_with(".composer_prompt")),
        "hidden files stay untracked: {created:?}"
    );
    tracker.stop_monitoring();
}

#[tokio::test]
async fn deleted_files_leave_both_sets() {
    let (_dir, root) = canonical_tempdir();
    let path = root.join("scratch.txt");

    let tracker = ChangeTracker::new(root.clone(), DEBOUNCE);
    tracker.start_monitoring().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::write(&path, "temporary").unwrap();
    tokio::time::sleep(SETTLE).await;
    std::fs::remove_file(&path).unwrap();
    tokio::time::sleep(SETTLE).await;

    assert!(!tracker.created_files().iter().any(|p| p.ends_with("scratch.txt")));
    assert!(!tracker.modified_files().iter().any(|p| p.ends_with("scratch.txt")));
    tracker.stop_monitoring();
}

#[tokio::test]
async fn restart_clears_previous_session() {
    let (_dir, root) = canonical_tempdir();
    let tracker = ChangeTracker::new(root.clone(), DEBOUNCE);

    tracker.start_monitoring().unwrap();
    // second start while active is a no-op
    tracker.start_monitoring().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(root.join("first.txt"), "x").unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(!tracker.created_files().is_empty());
    tracker.stop_monitoring();
    // stop is idempotent
    tracker.stop_monitoring();

    tracker.start_monitoring().unwrap();
    assert!(
        tracker.created_files().is_empty(),
        "a new session starts from empty sets"
    );
    tracker.stop_monitoring();
}

#[tokio::test]
async fn materialize_preserves_relative_layout() {
    let (_dir, root) = canonical_tempdir();
    let tracker = ChangeTracker::new(root.clone(), DEBOUNCE);
    tracker.start_monitoring().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("src/index.html"), "<html></html>").unwrap();
    std::fs::write(root.join("package.json"), "{}").unwrap();
    tokio::time::sleep(SETTLE).await;
    tracker.stop_monitoring();

    let project = tracker.materialize_project("demo-app").unwrap();
    assert_eq!(project, root.join("demo-app"));
    assert!(project.join("src/index.html").exists());
    assert!(project.join("package.json").exists());
}
