//! Cursor process controller.
//!
//! Manages the lifecycle of one externally-launched Cursor instance and
//! approximates a request/response protocol with it through sentinel files in
//! the shared working directory; Cursor exposes no programmatic API, so the
//! fixed filenames below are the whole integration contract with the
//! companion watcher script. Renaming them breaks compatibility.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Timeouts;

/// Written by `activate()`; consumed by the companion watcher.
pub const ACTIVATE_SENTINEL: &str = ".activate_composer";
/// Written by `send_prompt()`; carries the prompt text.
pub const PROMPT_SENTINEL: &str = ".composer_prompt";
/// Created by the controlled application when it considers the task done.
pub const COMPLETED_SENTINEL: &str = ".composer_completed";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cursor not found at path: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cursor is not running")]
    NotRunning,
    #[error("failed to launch cursor: {0}")]
    LaunchFailed(String),
    #[error("timed out after {waited:?} waiting for {waiting_for}")]
    Timeout {
        waited: Duration,
        waiting_for: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct CursorController {
    cursor_path: PathBuf,
    working_dir: PathBuf,
    timeouts: Timeouts,
    /// The running Cursor subprocess. Shared with the exit-monitor task,
    /// which clears it when the process dies out from under us.
    child: Arc<Mutex<Option<Child>>>,
    running: Arc<AtomicBool>,
}

impl CursorController {
    pub fn new(cursor_path: PathBuf, working_dir: PathBuf, timeouts: Timeouts) -> Self {
        Self {
            cursor_path,
            working_dir,
            timeouts,
            child: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Launch Cursor detached from our own lifecycle.
    ///
    /// Readiness is a liveness probe, not a blind sleep: the child must still
    /// be running at every poll across the settle window, otherwise the
    /// launch is reported as failed with its exit status.
    pub async fn launch(&self) -> Result<(), ControllerError> {
        if self.is_running() {
            warn!("cursor is already running; launch is a no-op");
            return Ok(());
        }
        if !self.cursor_path.exists() {
            return Err(ControllerError::NotFound(self.cursor_path.clone()));
        }

        info!(path = %self.cursor_path.display(), "launching cursor");
        let mut cmd = Command::new(&self.cursor_path);
        cmd.arg(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);
        // Own process group so controller exit does not take Cursor with it.
        #[cfg(unix)]
        cmd.process_group(0);

        let spawned = cmd
            .spawn()
            .map_err(|e| ControllerError::LaunchFailed(e.to_string()))?;
        *self.child.lock().await = Some(spawned);

        self.settle().await?;
        self.running.store(true, Ordering::Release);
        self.spawn_exit_monitor();
        info!("cursor launched");
        Ok(())
    }

    async fn settle(&self) -> Result<(), ControllerError> {
        let deadline = Instant::now() + self.timeouts.launch_settle;
        loop {
            {
                let mut guard = self.child.lock().await;
                let child = guard
                    .as_mut()
                    .ok_or_else(|| ControllerError::LaunchFailed("process handle lost".into()))?;
                if let Some(status) = child.try_wait()? {
                    *guard = None;
                    return Err(ControllerError::LaunchFailed(format!(
                        "cursor exited during startup: {status}"
                    )));
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            tokio::time::sleep(remaining.min(Duration::from_millis(250))).await;
        }
    }

    /// Watch for the process dying out from under us and reset running state
    /// so later operations fail with `NotRunning` instead of hanging.
    fn spawn_exit_monitor(&self) {
        let child = Arc::clone(&self.child);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let mut guard = child.lock().await;
                match guard.as_mut() {
                    // close() already reaped it.
                    None => break,
                    Some(c) => match c.try_wait() {
                        Ok(Some(status)) => {
                            info!(%status, "cursor process exited");
                            *guard = None;
                            running.store(false, Ordering::Release);
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(err = %e, "cursor exit monitor failed");
                            break;
                        }
                    },
                }
            }
        });
    }

    /// Request graceful termination; force-kill when the grace window elapses.
    /// Running state is always cleared, whichever path was taken.
    pub async fn close(&self) -> Result<(), ControllerError> {
        if !self.is_running() {
            warn!("cursor is not running; close is a no-op");
            return Ok(());
        }

        let taken = self.child.lock().await.take();
        if let Some(mut child) = taken {
            info!("closing cursor");
            #[cfg(unix)]
            if let Some(pid) = child.id() {
                // SAFETY: pid belongs to our own spawned child.
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
            match tokio::time::timeout(self.timeouts.close_grace, child.wait()).await {
                Ok(status) => debug!(status = ?status.ok(), "cursor exited gracefully"),
                Err(_) => {
                    warn!(
                        grace = ?self.timeouts.close_grace,
                        "cursor ignored graceful termination; force-killing"
                    );
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }
        self.running.store(false, Ordering::Release);
        info!("cursor closed");
        Ok(())
    }

    /// Activate Composer in agent mode via the activation sentinel.
    pub async fn activate(&self) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Err(ControllerError::NotRunning);
        }
        let path = self.working_dir.join(ACTIVATE_SENTINEL);
        tokio::fs::write(&path, "agent_mode").await?;
        self.wait_for_ack(&path, "composer activation").await;
        Ok(())
    }

    /// Hand a prompt to Composer via the prompt sentinel.
    pub async fn send_prompt(&self, prompt: &str) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Err(ControllerError::NotRunning);
        }
        let path = self.working_dir.join(PROMPT_SENTINEL);
        tokio::fs::write(&path, prompt).await?;
        self.wait_for_ack(&path, "prompt processing").await;
        Ok(())
    }

    /// Poll for the companion watcher consuming (deleting) a sentinel file,
    /// backing off exponentially. The ack is advisory: the sentinel protocol
    /// has no guaranteed consumer, so an elapsed window is logged and the
    /// operation still counts as delivered.
    async fn wait_for_ack(&self, path: &Path, what: &str) {
        let deadline = Instant::now() + self.timeouts.sentinel_ack;
        let mut backoff = Duration::from_millis(50);
        loop {
            if !path.exists() {
                debug!(sentinel = %path.display(), "sentinel consumed");
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    sentinel = %path.display(),
                    "no watcher acknowledged {what} within {:?}; continuing",
                    self.timeouts.sentinel_ack
                );
                return;
            }
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(Duration::from_millis(800));
        }
    }

    /// True once the controlled application has persisted its completion
    /// marker. State on disk, not a push notification.
    pub fn check_completion(&self) -> Result<bool, ControllerError> {
        if !self.is_running() {
            return Err(ControllerError::NotRunning);
        }
        Ok(self.working_dir.join(COMPLETED_SENTINEL).exists())
    }

    /// Bounded poll over [`check_completion`] with exponential backoff.
    pub async fn wait_for_completion(&self, timeout: Duration) -> Result<(), ControllerError> {
        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(100);
        loop {
            if self.check_completion()? {
                return Ok(());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ControllerError::Timeout {
                    waited: timeout,
                    waiting_for: format!("completion sentinel {COMPLETED_SENTINEL}"),
                });
            }
            tokio::time::sleep(backoff.min(remaining)).await;
            backoff = (backoff * 2).min(Duration::from_secs(1));
        }
    }
}
